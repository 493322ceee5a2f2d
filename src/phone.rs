//! Phone number normalization.
//!
//! A candidate is accepted when its decimal text is at least 10 characters long and
//! its rightmost 10 characters are all ASCII digits. Those 10 digits are the canonical
//! form, so a country prefix such as `+7` or `8` is dropped. Batches are processed
//! value by value: a rejected value never stops the others.

use serde::Serialize;

use crate::descriptor::{Numbers, PhoneValue};
use crate::error::{ClientbookError, Result};

/// Length of a stored phone number
pub const PHONE_LENGTH: usize = 10;

/// Canonicalize one candidate phone value
pub fn normalize(value: &PhoneValue) -> Result<String> {
    let text = value.to_string();
    let len = text.chars().count();
    if len < PHONE_LENGTH {
        return Err(ClientbookError::invalid_phone(text));
    }
    let number: String = text.chars().skip(len - PHONE_LENGTH).collect();
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClientbookError::invalid_phone(text));
    }
    Ok(number)
}

/// Outcome of normalizing a batch of candidates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhoneBatch {
    /// Canonical numbers, in caller order
    pub accepted: Vec<String>,

    /// Raw text of every rejected candidate, in caller order
    pub rejected: Vec<String>,
}

/// Normalize every value of `numbers`, partitioning them into accepted and rejected
pub fn normalize_batch(numbers: &Numbers) -> PhoneBatch {
    let mut batch = PhoneBatch::default();
    for value in numbers {
        match normalize(value) {
            Ok(number) => batch.accepted.push(number),
            Err(_) => batch.rejected.push(value.to_string()),
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ten_digits_unchanged() {
        assert_eq!(normalize(&PhoneValue::from("9991234567")).unwrap(), "9991234567");
        assert_eq!(normalize(&PhoneValue::Int(9_991_234_567)).unwrap(), "9991234567");
    }

    #[test]
    fn test_longer_input_keeps_last_ten() {
        assert_eq!(normalize(&PhoneValue::from("799912345678")).unwrap(), "9912345678");
        assert_eq!(normalize(&PhoneValue::Int(89_991_234_567)).unwrap(), "9991234567");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(&PhoneValue::from("+79991234567")).unwrap();
        let twice = normalize(&PhoneValue::from(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_short_input_rejected() {
        let err = normalize(&PhoneValue::Int(123)).unwrap_err();
        assert_eq!(err, ClientbookError::InvalidPhoneFormat("123".to_string()));

        assert!(normalize(&PhoneValue::from("999123456")).is_err());
    }

    #[test]
    fn test_non_digit_tail_rejected() {
        let err = normalize(&PhoneValue::from("999-123-45-67")).unwrap_err();
        assert_eq!(err, ClientbookError::InvalidPhoneFormat("999-123-45-67".to_string()));

        assert!(normalize(&PhoneValue::from("99912345 7")).is_err());
        assert_eq!(normalize(&PhoneValue::from("+7 9991234567")).unwrap(), "9991234567");
    }

    #[test]
    fn test_batch_partitions_in_order() {
        let numbers = Numbers::from(vec![123_u64, 9_991_234_567, 45, 89_998_887_766]);
        let batch = normalize_batch(&numbers);

        assert_eq!(batch.accepted, vec!["9991234567".to_string(), "9998887766".to_string()]);
        assert_eq!(batch.rejected, vec!["123".to_string(), "45".to_string()]);
    }

    #[test]
    fn test_batch_single_value() {
        let batch = normalize_batch(&Numbers::from(9_991_234_567_u64));
        assert_eq!(batch.accepted, vec!["9991234567".to_string()]);
        assert!(batch.rejected.is_empty());
    }
}
