//! Shared domain types, the error taxonomy, environment configuration, and
//! the normative deadlines used across every pixie crate.

pub mod config;
pub mod deadlines;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::AppError;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::AppError;
    pub use crate::types::*;
}
