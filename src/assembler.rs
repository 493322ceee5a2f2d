//! Assembles joined client/phone rows into a single client view.

use serde::{Deserialize, Serialize};

use crate::engine::ClientRow;

/// One client with all of its phone numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientView {
    pub client_id: i64,
    pub name: String,
    pub surname: String,
    pub mail: String,
    /// Phone numbers in insertion order, empty when the client has none
    pub numbers: Vec<String>,
}

/// Build the view of the client on the first row.
///
/// Rows of any other client are ignored, and a null phone column (a client without
/// phones on the outer join) contributes no number. `None` for no rows.
#[must_use]
pub fn assemble(rows: Vec<ClientRow>) -> Option<ClientView> {
    let mut rows = rows.into_iter();
    let ClientRow { client_id, name, surname, mail, number } = rows.next()?;

    let numbers = number
        .into_iter()
        .chain(rows.filter(|row| row.client_id == client_id).filter_map(|row| row.number))
        .collect();

    Some(ClientView { client_id, name, surname, mail, numbers })
}
