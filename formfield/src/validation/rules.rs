//! Declarative rule strings (`"required|email|min:3"`).
//!
//! The grammar is deliberately small. Rules are separated by `|`, arguments
//! follow a `:` and are comma separated. `regex:` consumes the rest of the
//! string so patterns may contain `|`.

use std::collections::BTreeMap;

use regex::Regex;

use super::driver::RuleEngine;
use crate::error::ConfigError;
use crate::field::Field;
use crate::value::Value;

#[derive(Debug, Clone)]
enum Rule {
    Required,
    Accepted,
    Email,
    Url,
    String,
    Numeric,
    Integer,
    Boolean,
    Alpha,
    AlphaNum,
    AlphaDash,
    Min(f64),
    Max(f64),
    Between(f64, f64),
    Regex(Regex),
    Same(String),
    Different(String),
    In(Vec<String>),
    NotIn(Vec<String>),
}

fn split_rules(rules: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = rules;
    while !rest.is_empty() {
        if rest.starts_with("regex:") {
            parts.push(rest);
            break;
        }
        match rest.split_once('|') {
            Some((head, tail)) => {
                parts.push(head);
                rest = tail;
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn number_arg(rule: &str, arg: Option<&str>) -> crate::Result<f64> {
    arg.and_then(|a| a.trim().parse::<f64>().ok())
        .ok_or_else(|| ConfigError::invalid_rule(rule, "expected a numeric argument"))
}

fn parse_rule(rule: &str) -> crate::Result<Rule> {
    let (name, arg) = match rule.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (rule, None),
    };
    let list = || -> Vec<String> {
        arg.unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    };
    let path = || -> crate::Result<String> {
        arg.map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::invalid_rule(rule, "expected a field path"))
    };

    Ok(match name {
        "required" => Rule::Required,
        "accepted" => Rule::Accepted,
        "email" => Rule::Email,
        "url" => Rule::Url,
        "string" => Rule::String,
        "numeric" => Rule::Numeric,
        "integer" => Rule::Integer,
        "boolean" => Rule::Boolean,
        "alpha" => Rule::Alpha,
        "alpha_num" => Rule::AlphaNum,
        "alpha_dash" => Rule::AlphaDash,
        "min" => Rule::Min(number_arg(rule, arg)?),
        "max" => Rule::Max(number_arg(rule, arg)?),
        "between" => {
            let bounds = list();
            match bounds.as_slice() {
                [lo, hi] => Rule::Between(
                    number_arg(rule, Some(lo.as_str()))?,
                    number_arg(rule, Some(hi.as_str()))?,
                ),
                _ => return Err(ConfigError::invalid_rule(rule, "expected two bounds")),
            }
        }
        "regex" => {
            let pattern = arg.unwrap_or_default();
            let pattern = pattern
                .strip_prefix('/')
                .and_then(|p| p.strip_suffix('/'))
                .unwrap_or(pattern);
            Rule::Regex(
                Regex::new(pattern).map_err(|e| ConfigError::invalid_rule(rule, e.to_string()))?,
            )
        }
        "same" => Rule::Same(path()?),
        "different" => Rule::Different(path()?),
        "in" => Rule::In(list()),
        "not_in" => Rule::NotIn(list()),
        other => return Err(ConfigError::invalid_rule(rule, format!("unknown rule '{other}'"))),
    })
}

fn default_messages() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("required", "The :attribute field is required."),
        ("accepted", "The :attribute must be accepted."),
        ("email", "The :attribute format is invalid."),
        ("url", "The :attribute format is invalid."),
        ("string", "The :attribute must be a string."),
        ("numeric", "The :attribute must be a number."),
        ("integer", "The :attribute must be an integer."),
        ("boolean", "The :attribute field must be true or false."),
        ("alpha", "The :attribute field must contain only alphabetic characters."),
        ("alpha_num", "The :attribute field must be alphanumeric."),
        (
            "alpha_dash",
            "The :attribute field may only contain alpha-numeric characters, as well as dashes and underscores.",
        ),
        ("min.numeric", "The :attribute must be at least :min."),
        ("min.string", "The :attribute must be at least :min characters."),
        ("max.numeric", "The :attribute may not be greater than :max."),
        ("max.string", "The :attribute may not be greater than :max characters."),
        ("between.numeric", "The :attribute field must be between :min and :max."),
        ("between.string", "The :attribute field must be between :min and :max characters."),
        ("regex", "The :attribute format is invalid."),
        ("same", "The :attribute and :other fields must match."),
        ("different", "The :attribute and :other must be different."),
        ("in", "The selected :attribute is invalid."),
        ("not_in", "The selected :attribute is invalid."),
    ])
}

/// Rule-string validation backend.
///
/// Rules other than `required` and `accepted` pass on empty values.
///
/// # Example
///
/// ```ignore
/// let form = Form::builder()
///     .rules(Dvr::new())
///     .field(FieldDef::named("email").rules("required|email"))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dvr {
    messages: BTreeMap<String, String>,
}

impl Dvr {
    /// Create the backend with the built-in messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the message for a rule. Keys are rule names, or
    /// `min.string`-style keys for size rules. Placeholders: `:attribute`,
    /// `:min`, `:max`, `:other`.
    pub fn message(mut self, rule: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(rule.into(), template.into());
        self
    }

    fn template(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .or_else(|| default_messages().get(key).map(|m| m.to_string()))
            .unwrap_or_else(|| "The :attribute is invalid.".to_string())
    }

    fn render(&self, key: &str, attribute: &str, args: &[(&str, String)]) -> String {
        let mut message = self.template(key).replace(":attribute", attribute);
        for (name, value) in args {
            message = message.replace(&format!(":{name}"), value);
        }
        message
    }
}

fn attribute_name(field: &Field) -> String {
    let label = field.label();
    if label.is_empty() {
        field.name().replace('_', " ")
    } else {
        label
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        _ => false,
    }
}

fn fmt_num(n: f64) -> String {
    Value::Number(n).to_text()
}

/// Numeric size when the value is (or is declared) numeric, else length.
fn size(value: &Value, numeric: bool) -> (f64, bool) {
    match value {
        Value::Number(n) => (*n, true),
        Value::Text(s) if numeric => match s.trim().parse::<f64>() {
            Ok(n) => (n, true),
            Err(_) => (s.chars().count() as f64, false),
        },
        Value::Text(s) => (s.chars().count() as f64, false),
        Value::List(items) => (items.len() as f64, false),
        Value::Map(map) => (map.len() as f64, false),
        Value::Bool(_) | Value::Date(_) | Value::Null => (0.0, false),
    }
}

fn text_matches(value: &Value, pred: impl Fn(char) -> bool) -> bool {
    match value {
        Value::Text(s) => s.chars().all(pred),
        Value::Number(_) => true,
        _ => false,
    }
}

impl RuleEngine for Dvr {
    fn check(&self, rules: &str) -> crate::Result<()> {
        split_rules(rules).into_iter().try_for_each(|rule| parse_rule(rule).map(|_| ()))
    }

    fn validate(&self, field: &Field, value: &Value, rules: &str) -> Vec<String> {
        let parsed: Vec<Rule> = split_rules(rules)
            .into_iter()
            .filter_map(|rule| parse_rule(rule).ok())
            .collect();
        let numeric = parsed
            .iter()
            .any(|r| matches!(r, Rule::Numeric | Rule::Integer));
        let attribute = attribute_name(field);
        let kind = |n: bool| if n { "numeric" } else { "string" };

        let mut errors = Vec::new();
        for rule in &parsed {
            let missing = is_missing(value);
            let failure = match rule {
                Rule::Required => {
                    let empty = match value {
                        Value::Null => true,
                        Value::Text(s) => s.chars().all(char::is_whitespace),
                        Value::List(items) => items.is_empty(),
                        _ => false,
                    };
                    empty.then(|| self.render("required", &attribute, &[]))
                }
                Rule::Accepted => {
                    let ok = match value {
                        Value::Bool(b) => *b,
                        Value::Number(n) => *n == 1.0,
                        Value::Text(s) => matches!(s.as_str(), "on" | "yes" | "1" | "true"),
                        _ => false,
                    };
                    (!ok).then(|| self.render("accepted", &attribute, &[]))
                }
                _ if missing => None,
                Rule::Email => (!value
                    .as_str()
                    .is_some_and(email_address::EmailAddress::is_valid))
                .then(|| self.render("email", &attribute, &[])),
                Rule::Url => {
                    let ok = value.as_str().is_some_and(|s| {
                        (s.starts_with("http://") || s.starts_with("https://"))
                            && s.split_once("://").is_some_and(|(_, host)| {
                                !host.is_empty() && !host.contains(char::is_whitespace)
                            })
                    });
                    (!ok).then(|| self.render("url", &attribute, &[]))
                }
                Rule::String => value
                    .as_str()
                    .is_none()
                    .then(|| self.render("string", &attribute, &[])),
                Rule::Numeric => {
                    let ok = match value {
                        Value::Number(n) => n.is_finite(),
                        Value::Text(s) => s.trim().parse::<f64>().is_ok(),
                        _ => false,
                    };
                    (!ok).then(|| self.render("numeric", &attribute, &[]))
                }
                Rule::Integer => {
                    let ok = match value {
                        Value::Number(n) => n.fract() == 0.0,
                        Value::Text(s) => s.trim().parse::<i64>().is_ok(),
                        _ => false,
                    };
                    (!ok).then(|| self.render("integer", &attribute, &[]))
                }
                Rule::Boolean => {
                    let ok = match value {
                        Value::Bool(_) => true,
                        Value::Number(n) => *n == 0.0 || *n == 1.0,
                        Value::Text(s) => matches!(s.as_str(), "true" | "false" | "0" | "1"),
                        _ => false,
                    };
                    (!ok).then(|| self.render("boolean", &attribute, &[]))
                }
                Rule::Alpha => (!text_matches(value, char::is_alphabetic))
                    .then(|| self.render("alpha", &attribute, &[])),
                Rule::AlphaNum => (!text_matches(value, char::is_alphanumeric))
                    .then(|| self.render("alpha_num", &attribute, &[])),
                Rule::AlphaDash => (!text_matches(value, |c| {
                    c.is_alphanumeric() || c == '-' || c == '_'
                }))
                .then(|| self.render("alpha_dash", &attribute, &[])),
                Rule::Min(min) => {
                    let (n, is_num) = size(value, numeric);
                    (n < *min).then(|| {
                        self.render(
                            &format!("min.{}", kind(is_num)),
                            &attribute,
                            &[("min", fmt_num(*min))],
                        )
                    })
                }
                Rule::Max(max) => {
                    let (n, is_num) = size(value, numeric);
                    (n > *max).then(|| {
                        self.render(
                            &format!("max.{}", kind(is_num)),
                            &attribute,
                            &[("max", fmt_num(*max))],
                        )
                    })
                }
                Rule::Between(min, max) => {
                    let (n, is_num) = size(value, numeric);
                    (n < *min || n > *max).then(|| {
                        self.render(
                            &format!("between.{}", kind(is_num)),
                            &attribute,
                            &[("min", fmt_num(*min)), ("max", fmt_num(*max))],
                        )
                    })
                }
                Rule::Regex(re) => {
                    (!re.is_match(&value.to_text())).then(|| self.render("regex", &attribute, &[]))
                }
                Rule::Same(path) | Rule::Different(path) => {
                    let other = field.lookup(path);
                    let other_value = other.as_ref().map(Field::value).unwrap_or_default();
                    let other_name = other
                        .as_ref()
                        .map(attribute_name)
                        .unwrap_or_else(|| path.clone());
                    let same = other_value == *value;
                    let (failed, key) = match rule {
                        Rule::Same(_) => (!same, "same"),
                        _ => (same, "different"),
                    };
                    failed.then(|| self.render(key, &attribute, &[("other", other_name)]))
                }
                Rule::In(allowed) => (!allowed.contains(&value.to_text()))
                    .then(|| self.render("in", &attribute, &[])),
                Rule::NotIn(denied) => denied
                    .contains(&value.to_text())
                    .then(|| self.render("not_in", &attribute, &[])),
            };
            errors.extend(failure);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_regex_pipes() {
        assert_eq!(
            split_rules("required|regex:^(a|b)$"),
            vec!["required", "regex:^(a|b)$"]
        );
        assert_eq!(split_rules("required| email |"), vec!["required", "email"]);
    }

    #[test]
    fn test_check_rejects_unknown_and_malformed_rules() {
        let dvr = Dvr::new();
        assert!(dvr.check("required|email|min:3|between:1,5").is_ok());
        assert!(matches!(
            dvr.check("required|shiny"),
            Err(ConfigError::InvalidRule { .. })
        ));
        assert!(dvr.check("min:abc").is_err());
        assert!(dvr.check("regex:(").is_err());
    }

    #[test]
    fn test_size_picks_numeric_or_length() {
        assert_eq!(size(&Value::from("12"), true), (12.0, true));
        assert_eq!(size(&Value::from("12"), false), (2.0, false));
        assert_eq!(size(&Value::from(7), false), (7.0, true));
    }
}
