//! Dual-indexed connection registry (spec §3 I1, §4.2).

use crate::connection::Connection;
use crate::error::TableError;
use std::collections::HashMap;

/// Keeps every [`Connection`] reachable by both its host-assigned handle
/// and its LL access address, so that the two indexes are always mutated
/// together (spec invariant I1).
#[derive(Debug, Default)]
pub struct ConnectionTable {
    by_handle: HashMap<u16, Connection>,
    aa_to_handle: HashMap<u32, u16>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new connection under both indexes. Fails with
    /// [`TableError::DuplicateHandle`] if the handle is already registered
    /// (spec §4.2); the caller decides whether to destroy the old record
    /// first (spec §7 DuplicateHandle).
    pub fn insert(&mut self, connection: Connection) -> Result<(), TableError> {
        if self.by_handle.contains_key(&connection.conn_handle) {
            return Err(TableError::DuplicateHandle(connection.conn_handle));
        }
        self.aa_to_handle
            .insert(connection.access_address, connection.conn_handle);
        self.by_handle.insert(connection.conn_handle, connection);
        Ok(())
    }

    pub fn lookup_by_handle(&self, handle: u16) -> Option<&Connection> {
        self.by_handle.get(&handle)
    }

    pub fn lookup_by_handle_mut(&mut self, handle: u16) -> Option<&mut Connection> {
        self.by_handle.get_mut(&handle)
    }

    pub fn lookup_by_aa(&self, access_address: u32) -> Option<&Connection> {
        let handle = *self.aa_to_handle.get(&access_address)?;
        self.by_handle.get(&handle)
    }

    pub fn lookup_by_aa_mut(&mut self, access_address: u32) -> Option<&mut Connection> {
        let handle = *self.aa_to_handle.get(&access_address)?;
        self.by_handle.get_mut(&handle)
    }

    /// Removes both index entries for `handle`. Idempotent: removing an
    /// unknown handle is a no-op, matching spec §3's "destruction is always
    /// idempotent".
    pub fn remove(&mut self, handle: u16) -> Option<Connection> {
        let connection = self.by_handle.remove(&handle)?;
        self.aa_to_handle.remove(&connection.access_address);
        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::NewConnectionParams;

    fn conn(handle: u16, aa: u32) -> Connection {
        Connection::new(NewConnectionParams {
            conn_handle: handle,
            access_address: aa,
            crc_init: 0x123456,
            hop_increment: 7,
            init_addr: [0; 6],
            init_addr_type: 0,
            adv_addr: [0; 6],
            adv_addr_type: 0,
            interval: 0,
            latency: 0,
            timeout: 0,
        })
    }

    #[test]
    fn insert_then_lookup_by_both_indexes() {
        let mut table = ConnectionTable::new();
        table.insert(conn(0x40, 0xAABB_CCDD)).unwrap();
        assert_eq!(
            table.lookup_by_handle(0x40).unwrap().access_address,
            0xAABB_CCDD
        );
        assert_eq!(table.lookup_by_aa(0xAABB_CCDD).unwrap().conn_handle, 0x40);
    }

    #[test]
    fn duplicate_handle_is_rejected() {
        let mut table = ConnectionTable::new();
        table.insert(conn(0x40, 0x1111_1111)).unwrap();
        let err = table.insert(conn(0x40, 0x2222_2222)).unwrap_err();
        assert_eq!(err, TableError::DuplicateHandle(0x40));
    }

    #[test]
    fn remove_clears_both_indexes_and_is_idempotent() {
        let mut table = ConnectionTable::new();
        table.insert(conn(0x40, 0xAABB_CCDD)).unwrap();
        assert!(table.remove(0x40).is_some());
        assert!(table.lookup_by_handle(0x40).is_none());
        assert!(table.lookup_by_aa(0xAABB_CCDD).is_none());
        // Second removal is a no-op, not an error.
        assert!(table.remove(0x40).is_none());
    }

    #[test]
    fn consistency_holds_after_create_destroy_sequences() {
        let mut table = ConnectionTable::new();
        table.insert(conn(1, 10)).unwrap();
        table.insert(conn(2, 20)).unwrap();
        table.remove(1);
        table.insert(conn(3, 30)).unwrap();
        for (handle, aa) in [(2u16, 20u32), (3, 30)] {
            let by_aa = table.lookup_by_aa(aa).map(|c| c.conn_handle);
            let by_handle = table.lookup_by_handle(handle).map(|c| c.access_address);
            assert_eq!(by_aa, Some(handle));
            assert_eq!(by_handle, Some(aa));
        }
        assert!(table.lookup_by_handle(1).is_none());
    }
}
