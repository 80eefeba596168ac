//! Server Object Handle Table.
//!
//! Maps the small per-call indices ROPs name to the opaque handles the
//! server assigned. One table per session; it is only mutated by the
//! session after a round trip completes.
//!
//! Index 0 is where callers conventionally place the Logon object, the
//! input of most first ROPs in a buffer. Nothing reserves it: any ROP
//! naming output index 0 overwrites the logon.

use oxcrops_protocol::{ServerObjectHandle, INVALID_HANDLE};
use std::collections::BTreeMap;
use thiserror::Error;

/// Lookup of an index with no object behind it.
///
/// Not fatal: the call can still be sent with [`INVALID_HANDLE`] in that
/// slot, and the server answers with a ROP failure.
/// Conventional index of the Logon object.
pub const LOGON_ANCHOR_INDEX: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no server object at handle index {index}")]
pub struct InvalidHandle {
    pub index: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleTable {
    entries: BTreeMap<u8, ServerObjectHandle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` at `index`, replacing whatever was there.
    ///
    /// Returns the replaced handle.
    pub fn install(&mut self, index: u8, handle: ServerObjectHandle) -> Option<ServerObjectHandle> {
        self.entries.insert(index, handle)
    }

    pub fn resolve(&self, index: u8) -> Result<ServerObjectHandle, InvalidHandle> {
        self.entries
            .get(&index)
            .copied()
            .ok_or(InvalidHandle { index })
    }

    /// Removes the mapping at `index`.
    pub fn release(&mut self, index: u8) -> Option<ServerObjectHandle> {
        self.entries.remove(&index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installed entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, ServerObjectHandle)> + '_ {
        self.entries.iter().map(|(index, handle)| (*index, *handle))
    }

    /// Handle at [`LOGON_ANCHOR_INDEX`], if any.
    pub fn logon_anchor(&self) -> Option<ServerObjectHandle> {
        self.entries.get(&LOGON_ANCHOR_INDEX).copied()
    }

    /// Raw handle for the handle list sent with a call.
    pub fn wire_handle(&self, index: u8) -> u32 {
        self.resolve(index).map_or(INVALID_HANDLE, |handle| handle.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_resolve_release() {
        let mut table = HandleTable::new();
        assert_eq!(table.resolve(0), Err(InvalidHandle { index: 0 }));

        assert_eq!(table.install(0, ServerObjectHandle(0x10)), None);
        assert_eq!(table.resolve(0), Ok(ServerObjectHandle(0x10)));

        // Overwrite is unconditional.
        assert_eq!(
            table.install(0, ServerObjectHandle(0x20)),
            Some(ServerObjectHandle(0x10))
        );
        assert_eq!(table.wire_handle(0), 0x20);

        assert_eq!(table.release(0), Some(ServerObjectHandle(0x20)));
        assert!(table.resolve(0).is_err());
        assert_eq!(table.wire_handle(0), INVALID_HANDLE);
        assert_eq!(table.release(0), None);
    }

    #[test]
    fn test_iter_in_index_order() {
        let mut table = HandleTable::new();
        table.install(3, ServerObjectHandle(3));
        table.install(1, ServerObjectHandle(1));
        let indices: Vec<u8> = table.iter().map(|(index, _)| index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(table.len(), 2);

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_logon_anchor() {
        let mut table = HandleTable::new();
        assert_eq!(table.logon_anchor(), None);
        table.install(1, ServerObjectHandle(0x11));
        assert_eq!(table.logon_anchor(), None);
        table.install(LOGON_ANCHOR_INDEX, ServerObjectHandle(0x10));
        assert_eq!(table.logon_anchor(), Some(ServerObjectHandle(0x10)));
    }

    #[test]
    fn test_invalid_handle_message() {
        assert_eq!(
            InvalidHandle { index: 7 }.to_string(),
            "no server object at handle index 7"
        );
    }
}
