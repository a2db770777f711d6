//! Validators used when checking a loaded configuration.

use crate::link::SUPPORTED_BAUD_RATES;
use std::ops::RangeInclusive;

/// Validates that a baud rate is one the rig firmware runs at.
///
/// # Arguments
///
/// * `baud_rate` - The rate to validate.
///
/// # Returns
///
/// * `Ok(())` if the rate is in [`SUPPORTED_BAUD_RATES`].
/// * `Err(&'static str)` otherwise.
pub fn is_supported_baud_rate(baud_rate: u32) -> Result<(), &'static str> {
    if SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        Ok(())
    } else {
        Err("Baud rate must be one of 9600, 19200, 38400, 57600, 115200")
    }
}

/// Validates if a given string is a valid file path.
///
/// # Arguments
///
/// * `path` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the file path is valid.
/// * `Err(&'static str)` if the file path is invalid.
pub fn is_valid_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates if a given string is not empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.trim().is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}
