//! Reactive form fields.
//!
//! A [`Form`] owns a tree of [`Field`]s. Each field keeps its attributes in
//! observable cells, derives its status (dirty, pristine, empty, valid, ...)
//! through memoized computeds, validates through pluggable rule and function
//! backends, and exposes path-scoped observers and interceptors.
//!
//! # Example
//!
//! ```
//! use formfield::prelude::*;
//!
//! let form = Form::builder()
//!     .options(Options::default().validate_on_init(false))
//!     .rules(Dvr::new())
//!     .field(FieldDef::named("email").label("Email").rules("required|email"))
//!     .build()
//!     .unwrap();
//!
//! let email = form.select("email").unwrap();
//! email.set_value("ada@example.com");
//! assert!(email.validate().is_valid());
//! assert!(email.is_dirty());
//! ```

pub mod bindings;
pub mod definition;
pub mod error;
pub mod events;
pub mod field;
pub mod form;
pub mod options;
pub mod parser;
pub mod reactive;
pub mod schedule;
pub mod state;
pub mod validation;
pub mod value;

pub use definition::FieldDef;
pub use error::{ConfigError, Result};
pub use events::{FieldEvent, InputEvent, Prop};
pub use field::{Field, FocusTarget};
pub use form::{Form, FormBuilder};
pub use options::{DebounceOptions, Options, OptionsPatch, ValidatedWith};
pub use state::FormSchema;
pub use value::Value;

pub mod prelude {
    pub use crate::bindings::{BindProps, Rewriter};
    pub use crate::definition::FieldDef;
    pub use crate::error::{ConfigError, Result};
    pub use crate::events::{
        FieldEvent, FileAttachment, InputEvent, InterceptorDef, ObserverDef, Occurrence, Prop,
    };
    pub use crate::field::{ErrorMessage, Field, FocusTarget, ValidateOptions};
    pub use crate::form::{Form, FormBuilder};
    pub use crate::options::{DebounceOptions, Options, OptionsPatch, ValidatedWith};
    pub use crate::reactive::Change;
    pub use crate::state::FormSchema;
    pub use crate::validation::{
        Check, Dvr, FieldError, ValidationResult, ValidationStatus, ValidatorFn, Vjf, checks,
    };
    pub use crate::value::Value;
}
