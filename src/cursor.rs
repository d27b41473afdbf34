use std::collections::HashMap;
use std::sync::RwLock;

/// Last observed UID state of a mailbox. `uid_next` never decreases while
/// `uid_validity` stays the same; a validity change resets the cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub uid_validity: u32,
    pub uid_next: u32,
}

impl Cursor {
    pub fn new(uid_validity: u32, uid_next: u32) -> Self {
        Cursor {
            uid_validity,
            uid_next,
        }
    }

    /// A cursor that has never observed the mailbox.
    pub fn is_unseen(&self) -> bool {
        self.uid_next == 0
    }
}

/// Concurrent per-login cursor map. Readers proceed in parallel, writers are
/// exclusive, and no lock is ever held across I/O. In-memory only: restart
/// discards all cursors and every mailbox re-anchors on its next cycle.
#[derive(Debug, Default)]
pub struct CursorStore {
    inner: RwLock<HashMap<String, Cursor>>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, login: &str) -> Option<Cursor> {
        match self.inner.read() {
            Ok(map) => map.get(login).copied(),
            Err(_) => None,
        }
    }

    pub fn set(&self, login: &str, cursor: Cursor) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(login.to_string(), cursor);
        }
    }

    pub fn remove(&self, login: &str) -> bool {
        match self.inner.write() {
            Ok(mut map) => map.remove(login).is_some(),
            Err(_) => false,
        }
    }
}
