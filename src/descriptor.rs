//! Client Descriptors
//!
//! A `ClientDescriptor` is the partially-filled description of a client that every
//! operation consumes. Any subset of the identifying keys (`client_id`, `name`,
//! `surname`, `mail`, `number`) may be set, together with `new_*` replacement values
//! used by updates. Empty strings and empty number lists count as absent.
//!
//! Descriptors deserialize from the same JSON shape the CLI accepts:
//!
//! ```json
//! { "mail": "x@test", "number": [9991234567, "89997654321"], "new_name": "oleg" }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single phone number candidate, given as an integer or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhoneValue {
    Int(u64),
    Text(String),
}

impl fmt::Display for PhoneValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PhoneValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PhoneValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PhoneValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One phone value or an ordered collection of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numbers {
    One(PhoneValue),
    Many(Vec<PhoneValue>),
}

impl Numbers {
    /// Iterate the values in caller order
    pub fn iter(&self) -> std::slice::Iter<'_, PhoneValue> {
        match self {
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
    }

    /// First value (the one used when a single number is needed)
    #[must_use]
    pub fn first(&self) -> Option<&PhoneValue> {
        self.iter().next()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> IntoIterator for &'a Numbers {
    type Item = &'a PhoneValue;
    type IntoIter = std::slice::Iter<'a, PhoneValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<PhoneValue> for Numbers {
    fn from(value: PhoneValue) -> Self {
        Self::One(value)
    }
}

impl From<u64> for Numbers {
    fn from(value: u64) -> Self {
        Self::One(value.into())
    }
}

impl From<&str> for Numbers {
    fn from(value: &str) -> Self {
        Self::One(value.into())
    }
}

impl From<String> for Numbers {
    fn from(value: String) -> Self {
        Self::One(value.into())
    }
}

impl From<Vec<PhoneValue>> for Numbers {
    fn from(values: Vec<PhoneValue>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<u64>> for Numbers {
    fn from(values: Vec<u64>) -> Self {
        Self::Many(values.into_iter().map(PhoneValue::Int).collect())
    }
}

impl From<Vec<&str>> for Numbers {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(PhoneValue::from).collect())
    }
}

/// Partially-filled client description passed into every operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Numbers>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_surname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_mail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_number: Option<Numbers>,
}

impl ClientDescriptor {
    /// Empty descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor identifying a client by its id only
    #[must_use]
    pub fn by_id(client_id: i64) -> Self {
        Self { client_id: Some(client_id), ..Self::default() }
    }

    /// Descriptor identifying a client by mail only
    #[must_use]
    pub fn by_mail(mail: impl Into<String>) -> Self {
        Self::default().with_mail(mail)
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_surname(mut self, surname: impl Into<String>) -> Self {
        self.surname = Some(surname.into());
        self
    }

    #[must_use]
    pub fn with_mail(mut self, mail: impl Into<String>) -> Self {
        self.mail = Some(mail.into());
        self
    }

    #[must_use]
    pub fn with_number(mut self, number: impl Into<Numbers>) -> Self {
        self.number = Some(number.into());
        self
    }

    #[must_use]
    pub fn with_new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_new_surname(mut self, surname: impl Into<String>) -> Self {
        self.new_surname = Some(surname.into());
        self
    }

    #[must_use]
    pub fn with_new_mail(mut self, mail: impl Into<String>) -> Self {
        self.new_mail = Some(mail.into());
        self
    }

    #[must_use]
    pub fn with_new_number(mut self, number: impl Into<Numbers>) -> Self {
        self.new_number = Some(number.into());
        self
    }

    /// Explicit id; 0 never names a stored client and counts as absent
    pub fn client_id(&self) -> Option<i64> {
        self.client_id.filter(|&id| id != 0)
    }

    pub fn name(&self) -> Option<&str> {
        present(self.name.as_deref())
    }

    pub fn surname(&self) -> Option<&str> {
        present(self.surname.as_deref())
    }

    pub fn mail(&self) -> Option<&str> {
        present(self.mail.as_deref())
    }

    pub fn numbers(&self) -> Option<&Numbers> {
        self.number.as_ref().filter(|n| !n.is_empty())
    }

    pub fn new_name(&self) -> Option<&str> {
        present(self.new_name.as_deref())
    }

    pub fn new_surname(&self) -> Option<&str> {
        present(self.new_surname.as_deref())
    }

    pub fn new_mail(&self) -> Option<&str> {
        present(self.new_mail.as_deref())
    }

    pub fn new_numbers(&self) -> Option<&Numbers> {
        self.new_number.as_ref().filter(|n| !n.is_empty())
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_single_and_list_numbers() {
        let single: ClientDescriptor = serde_json::from_str(r#"{"number": 9991234567}"#).unwrap();
        assert_eq!(single.number, Some(Numbers::One(PhoneValue::Int(9_991_234_567))));

        let list: ClientDescriptor =
            serde_json::from_str(r#"{"number": [123, "89991234567"]}"#).unwrap();
        assert_eq!(
            list.number,
            Some(Numbers::Many(vec![
                PhoneValue::Int(123),
                PhoneValue::Text("89991234567".to_string())
            ]))
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = serde_json::from_str::<ClientDescriptor>(r#"{"phone": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let descriptor = ClientDescriptor::new()
            .with_mail("")
            .with_name("")
            .with_number(Vec::<PhoneValue>::new());

        assert_eq!(descriptor.mail(), None);
        assert_eq!(descriptor.name(), None);
        assert!(descriptor.numbers().is_none());
    }

    #[test]
    fn test_numbers_first_and_iter() {
        let numbers = Numbers::from(vec![1_u64, 2, 3]);
        assert_eq!(numbers.first(), Some(&PhoneValue::Int(1)));
        assert_eq!(numbers.iter().count(), 3);

        let one = Numbers::from("9991234567");
        assert_eq!(one.len(), 1);
        assert_eq!(one.first().map(ToString::to_string).as_deref(), Some("9991234567"));
    }

    #[test]
    fn test_serialization_skips_absent_keys() {
        let descriptor = ClientDescriptor::by_mail("x@test").with_new_number(9_998_887_766_u64);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(json, r#"{"mail":"x@test","new_number":9998887766}"#);
    }
}
