//! Privacy groups held by the development node.
//!
//! The node runs no private transactions, so nonces are always zero and
//! private transaction lookups find nothing. Groups themselves are fully
//! managed: created, found by exact membership and deleted.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crosslink_core::{Address, Base64String, PrivacyGroup};

use crate::ledger::LedgerError;

/// Address of the privacy precompile on a default-configured node.
pub const PRIVACY_PRECOMPILE: Address = {
    let mut bytes = [0u8; 20];
    bytes[19] = 0x7e;
    Address(bytes)
};

/// Type reported for groups created over RPC.
pub const GROUP_KIND: &str = "PANTHEON";

#[derive(Default)]
pub struct PrivacyGroups {
    groups: BTreeMap<Base64String, PrivacyGroup>,
    created: u64,
}

impl PrivacyGroups {
    pub fn create(
        &mut self,
        members: Vec<Base64String>,
        name: String,
        description: String,
    ) -> Result<Base64String, LedgerError> {
        if members.is_empty() {
            return Err(LedgerError::InvalidParams("privacy group needs at least one member".into()));
        }
        self.created += 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.created.to_be_bytes());
        hasher.update(name.as_bytes());
        for member in &members {
            hasher.update(member.as_bytes());
        }
        let id = Base64String::from_bytes(hasher.finalize().as_bytes().to_vec());

        info!(group = %id, name, members = members.len(), "privacy group created");
        self.groups.insert(
            id.clone(),
            PrivacyGroup { id: id.clone(), name, description, kind: GROUP_KIND.to_string(), members },
        );
        Ok(id)
    }

    /// Groups whose member set equals `members`, in id order.
    pub fn find(&self, members: &[Base64String]) -> Vec<PrivacyGroup> {
        let wanted: BTreeSet<&Base64String> = members.iter().collect();
        self.groups
            .values()
            .filter(|g| g.members.iter().collect::<BTreeSet<_>>() == wanted)
            .cloned()
            .collect()
    }

    pub fn delete(&mut self, id: &Base64String) -> Result<(), LedgerError> {
        if self.groups.remove(id).is_none() {
            return Err(LedgerError::InvalidParams(format!("privacy group {id} not found")));
        }
        info!(group = %id, "privacy group deleted");
        Ok(())
    }

    /// Private nonce of `address` within the group.
    pub fn transaction_count(&self, _address: &Address, id: &Base64String) -> Result<u64, LedgerError> {
        if !self.groups.contains_key(id) {
            return Err(LedgerError::InvalidParams(format!("privacy group {id} not found")));
        }
        Ok(0)
    }
}
