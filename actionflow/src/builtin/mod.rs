//! Built-in actions and helpers shared by most pipelines.

mod call;
mod catch;
mod env_set;

pub use call::{Call, Configure};
pub use catch::{catch_domain_error, catch_domain_error_async, record_domain_error};
pub use env_set::EnvSet;
