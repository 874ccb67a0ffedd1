//! Attribute rules and change detection of the user resource.

mod changes;
mod validation;

pub use changes::UserChanges;
pub use validation::{DEFAULT_PASSWORD_HOOK, validate_user};
