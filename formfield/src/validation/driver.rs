//! Validation backend traits and the form's backend registry.

use std::sync::Arc;

use crate::field::Field;
use crate::value::Value;

/// Outcome of one validator function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// The value is acceptable.
    Pass,
    /// The value is rejected with a message.
    Fail(String),
    /// The result will arrive later through
    /// [`Field::set_validation_async_data`].
    Deferred,
}

impl Check {
    /// Build from a predicate result.
    pub fn from_bool(ok: bool, message: impl Into<String>) -> Self {
        if ok { Check::Pass } else { Check::Fail(message.into()) }
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Check::Fail(message) => Some(message),
            _ => None,
        }
    }
}

/// A user-supplied validator function.
///
/// Compared by identity, so attribute cells can tell when the list changed.
#[derive(Clone)]
pub struct ValidatorFn(Arc<dyn Fn(&Value, &Field) -> Check + Send + Sync>);

impl ValidatorFn {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Value, &Field) -> Check + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Wrap a predicate with a fixed failure message.
    pub fn predicate(
        message: impl Into<String>,
        f: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        let message = message.into();
        Self::new(move |value, _| Check::from_bool(f(value), message.clone()))
    }

    /// Run the validator.
    pub fn call(&self, value: &Value, field: &Field) -> Check {
        (self.0)(value, field)
    }
}

impl PartialEq for ValidatorFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ValidatorFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValidatorFn")
    }
}

/// Evaluates declarative rule strings (`"required|email"`).
pub trait RuleEngine: Send + Sync {
    /// Backend name used by `validation_plugins_order`.
    fn name(&self) -> &str {
        "dvr"
    }

    /// Reject rules this engine cannot evaluate. Called at construction.
    fn check(&self, rules: &str) -> crate::Result<()>;

    /// Evaluate `rules` against `value`. Returns failure messages in rule
    /// order.
    fn validate(&self, field: &Field, value: &Value, rules: &str) -> Vec<String>;
}

/// Runs user validator functions.
pub trait FunctionEngine: Send + Sync {
    /// Backend name used by `validation_plugins_order`.
    fn name(&self) -> &str {
        "vjf"
    }

    /// Run every validator in order.
    fn validate(&self, field: &Field, value: &Value, validators: &[ValidatorFn]) -> Vec<Check>;
}

/// One registered backend.
#[derive(Clone)]
pub enum Driver {
    Rules(Arc<dyn RuleEngine>),
    Functions(Arc<dyn FunctionEngine>),
}

impl Driver {
    /// Backend name.
    pub fn name(&self) -> &str {
        match self {
            Driver::Rules(engine) => engine.name(),
            Driver::Functions(engine) => engine.name(),
        }
    }
}

/// The validation backends registered on a form.
#[derive(Clone, Default)]
pub struct Plugins {
    rules: Option<Arc<dyn RuleEngine>>,
    functions: Option<Arc<dyn FunctionEngine>>,
}

impl std::fmt::Debug for Plugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugins")
            .field("rules", &self.rules.as_ref().map(|e| e.name().to_string()))
            .field("functions", &self.functions.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

impl Plugins {
    /// No backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule engine.
    pub fn with_rules(mut self, engine: impl RuleEngine + 'static) -> Self {
        self.rules = Some(Arc::new(engine));
        self
    }

    /// Register the function engine.
    pub fn with_functions(mut self, engine: impl FunctionEngine + 'static) -> Self {
        self.functions = Some(Arc::new(engine));
        self
    }

    /// The rule engine, if registered.
    pub fn rules(&self) -> Option<&Arc<dyn RuleEngine>> {
        self.rules.as_ref()
    }

    /// The function engine, if registered.
    pub fn functions(&self) -> Option<&Arc<dyn FunctionEngine>> {
        self.functions.as_ref()
    }

    /// Registered drivers in run order.
    ///
    /// Without an explicit order, functions run before rules. Names missing
    /// from an explicit order keep their relative default position after the
    /// named ones.
    pub fn ordered(&self, order: Option<&[String]>) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = Vec::with_capacity(2);
        if let Some(engine) = &self.functions {
            drivers.push(Driver::Functions(Arc::clone(engine)));
        }
        if let Some(engine) = &self.rules {
            drivers.push(Driver::Rules(Arc::clone(engine)));
        }
        if let Some(order) = order {
            drivers.sort_by_key(|driver| {
                order
                    .iter()
                    .position(|name| name == driver.name())
                    .unwrap_or(usize::MAX)
            });
        }
        drivers
    }
}
