/// Core Module
///
/// The data-access core: the classified error taxonomy and the database
/// layer built on it.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Error, ErrorKind, ErrorMessage, Result};
