//! Utility module

mod diagnostic;
mod error;
mod position;

pub use diagnostic::{Diagnostic, Diagnostics, Report, Severity};
pub use error::{Error, Result};
pub use position::Position;
