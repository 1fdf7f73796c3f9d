//! # typeroute validation
//!
//! Field constraints and section-scoped validation errors shared by the
//! decode pipeline and the schema compiler.
//!
//! ## Example
//!
//! ```rust
//! use typeroute_validate::{Constraints, Section, SectionErrors, ValidationError};
//! use serde_json::json;
//!
//! let age = Constraints::parse("required,min=0,max=150");
//!
//! let mut errors = SectionErrors::new();
//! for rule in age.check(&json!(-3)) {
//!     errors.add(ValidationError::from_rule(Section::Query, "age", rule));
//! }
//! assert_eq!(errors.section(Section::Query).len(), 1);
//! ```
//!
//! ## Error Format
//!
//! Aggregated errors serialize as:
//!
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "Request validation failed",
//!     "fields": [
//!       {
//!         "section": "body",
//!         "field": "name",
//!         "code": "required",
//!         "message": "missing required body field 'name'"
//!       }
//!     ]
//!   }
//! }
//! ```

mod constraints;
mod error;
mod format;
mod section;

pub use constraints::{Constraints, Pattern, RuleError};
pub use error::{SectionErrors, ValidationError};
pub use format::Format;
pub use section::{Section, UnknownSection};
