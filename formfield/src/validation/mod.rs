//! Validation backends and results.
//!
//! Fields declare rule strings (`rules`) and validator functions
//! (`validators`). The form registers a backend for each kind; a field that
//! declares a kind without a registered backend fails at construction.
//!
//! # Example
//!
//! ```ignore
//! use formfield::validation::{Dvr, Vjf, checks};
//!
//! let form = Form::builder()
//!     .rules(Dvr::new())
//!     .functions(Vjf::new())
//!     .field(FieldDef::named("username").rules("required|min:3"))
//!     .field(FieldDef::named("email").validator(checks::email("Please enter a valid email")))
//!     .build()?;
//!
//! if form.validate().is_valid() {
//!     // Proceed with form submission
//! }
//! ```

mod driver;
mod functions;
mod result;
mod rules;

pub use driver::{Check, Driver, FunctionEngine, Plugins, RuleEngine, ValidatorFn};
pub use functions::{Vjf, checks};
pub use result::{AsyncData, FieldError, ValidationResult, ValidationStatus};
pub use rules::Dvr;
