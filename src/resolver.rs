//! Identity resolution.
//!
//! Maps a partially-filled descriptor to exactly one `client_id`. Strategies are
//! tried in a fixed order and the first key present decides:
//!
//! 1. `client_id`, used as is without touching the database
//! 2. `mail`
//! 3. `number` (first value when a list is given)
//! 4. `name` and `surname` together
//!
//! A strategy that matches nothing fails with `ClientNotFound`; weaker strategies are
//! never consulted afterwards. When several clients share a name and surname the one
//! with the lowest id wins.

use tracing::{debug, info, warn};

use crate::descriptor::{ClientDescriptor, Numbers};
use crate::engine::{ClientLookup, Session};
use crate::error::{ClientbookError, Result};

/// Strategy chosen for a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy<'a> {
    ClientId(i64),
    Mail(&'a str),
    Number(String),
    Name { name: &'a str, surname: &'a str },
}

/// Pick the resolution strategy for a descriptor without querying anything
pub fn strategy(descriptor: &ClientDescriptor) -> Result<Strategy<'_>> {
    if let Some(client_id) = descriptor.client_id() {
        return Ok(Strategy::ClientId(client_id));
    }
    if let Some(mail) = descriptor.mail() {
        return Ok(Strategy::Mail(mail));
    }
    if let Some(number) = descriptor.numbers().and_then(Numbers::first) {
        return Ok(Strategy::Number(number.to_string()));
    }
    if let (Some(name), Some(surname)) = (descriptor.name(), descriptor.surname()) {
        return Ok(Strategy::Name { name, surname });
    }
    Err(ClientbookError::InsufficientIdentifyingData)
}

/// Resolve a descriptor to a client id inside an open session
pub async fn resolve<S: Session>(session: &mut S, descriptor: &ClientDescriptor) -> Result<i64> {
    let strategy = strategy(descriptor).inspect_err(|_| {
        warn!("Not enough data to identify a client; no lookup performed");
    })?;

    let lookup = match &strategy {
        Strategy::ClientId(client_id) => {
            debug!(client_id, "Using explicit client id");
            return Ok(*client_id);
        }
        Strategy::Mail(mail) => ClientLookup::Mail(mail),
        Strategy::Number(number) => ClientLookup::Number(number),
        Strategy::Name { name, surname } => ClientLookup::Name { name, surname },
    };

    info!("Looking up client by {lookup}");
    match session.find_client_id(&lookup).await? {
        Some(client_id) => {
            debug!(client_id, "Client resolved by {lookup}");
            Ok(client_id)
        }
        None => {
            warn!("No client found by {lookup}");
            Err(ClientbookError::client_not_found(format!("no client with {lookup}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_client_id_beats_everything() {
        let descriptor = ClientDescriptor::by_id(7)
            .with_mail("x@test")
            .with_number(9_991_234_567_u64)
            .with_name("Ivan")
            .with_surname("Petrov");

        assert_eq!(strategy(&descriptor).unwrap(), Strategy::ClientId(7));
    }

    #[test]
    fn test_mail_beats_number_and_name() {
        let descriptor = ClientDescriptor::by_mail("x@test")
            .with_number(9_991_234_567_u64)
            .with_name("Ivan")
            .with_surname("Petrov");

        assert_eq!(strategy(&descriptor).unwrap(), Strategy::Mail("x@test"));
    }

    #[test]
    fn test_number_uses_first_value() {
        let descriptor = ClientDescriptor::new()
            .with_number(vec!["9991234567", "9998887766"])
            .with_name("Ivan")
            .with_surname("Petrov");

        assert_eq!(strategy(&descriptor).unwrap(), Strategy::Number("9991234567".to_string()));
    }

    #[test]
    fn test_name_needs_both_parts() {
        let both = ClientDescriptor::new().with_name("Ivan").with_surname("Petrov");
        assert_eq!(strategy(&both).unwrap(), Strategy::Name { name: "Ivan", surname: "Petrov" });

        let only_name = ClientDescriptor::new().with_name("Ivan");
        assert_eq!(strategy(&only_name).unwrap_err(), ClientbookError::InsufficientIdentifyingData);
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let descriptor = ClientDescriptor::by_mail("").with_name("Ivan").with_surname("Petrov");
        assert_eq!(
            strategy(&descriptor).unwrap(),
            Strategy::Name { name: "Ivan", surname: "Petrov" }
        );
    }

    #[test]
    fn test_zero_client_id_is_skipped() {
        let descriptor = ClientDescriptor::by_mail("x@test").with_client_id(0);
        assert_eq!(strategy(&descriptor).unwrap(), Strategy::Mail("x@test"));

        assert_eq!(
            strategy(&ClientDescriptor::by_id(0)).unwrap_err(),
            ClientbookError::InsufficientIdentifyingData
        );
    }

    #[test]
    fn test_new_values_do_not_identify() {
        let descriptor = ClientDescriptor::new().with_new_mail("x@test").with_new_number(1_u64);
        assert_eq!(
            strategy(&descriptor).unwrap_err(),
            ClientbookError::InsufficientIdentifyingData
        );
    }
}
