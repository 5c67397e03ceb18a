//! Result type alias for Veil
//!
//! This module provides a convenient Result type alias that uses DeidError
//! as the error type.

use super::errors::DeidError;

/// Result type alias for Veil operations
///
/// # Examples
///
/// ```
/// use veil::domain::result::Result;
/// use veil::domain::errors::DeidError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(DeidError::Config("Invalid template".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, DeidError>;
