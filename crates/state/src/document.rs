//! The persisted state document.

use filedrop_core::UserRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// The full state document: every known user keyed by user key.
///
/// An absent backing file deserializes to the empty document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

impl StateDocument {
    /// Look up a user record.
    pub fn user(&self, key: &str) -> Option<&UserRecord> {
        self.users.get(key)
    }

    /// Look up a user record for mutation.
    pub fn user_mut(&mut self, key: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(key)
    }

    /// Fetch a user record, creating it if absent.
    pub fn ensure_user(&mut self, key: &str, now: OffsetDateTime) -> &mut UserRecord {
        self.users
            .entry(key.to_string())
            .or_insert_with(|| UserRecord::new(key.to_string(), now))
    }
}
