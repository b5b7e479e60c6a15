//! Shared utility functions used across the codebase.

use std::str::FromStr;

/// Parse an optional raw value, returning `default` when it is absent.
///
/// Blank values are treated as absent. On a parse failure the error message
/// is returned so callers can wrap it with the variable name.
pub fn parse_or<T>(raw: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse::<T>().map_err(|e| format!("{}", e))
        }
        _ => Ok(default),
    }
}

/// Describe the current thread for diagnostics, e.g. `thread: foreground`.
pub fn thread_label() -> String {
    let current = std::thread::current();
    match current.name() {
        Some(name) => format!("thread: {}", name),
        None => format!("thread: {:?}", current.id()),
    }
}
