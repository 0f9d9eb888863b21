// 5.0: the naming and group registers. names map a unique string to an owner and
// a data blob; groups have sequential ids, an owner (implicitly a member) and
// explicit memberships. membership rows keep the joining transaction's signature
// so orphaning is a pure function of the row.

use crate::store::Ledger;
use crate::types::{Address, GroupId, Signature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    pub name: String,
    pub owner: Address,
    pub data: String,
    /// Signature of the registering transaction.
    pub reference: Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub owner: Address,
    pub name: String,
    pub reference: Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group: GroupId,
    pub address: Address,
    /// Signature of the joining transaction.
    pub join_reference: Signature,
}

impl Ledger {
    pub fn name_record(&self, name: &str) -> Option<&NameRecord> {
        self.state.names.get(name)
    }

    pub(crate) fn insert_name(&mut self, record: NameRecord) {
        self.state.names.insert(record.name.clone(), record);
    }

    pub(crate) fn remove_name(&mut self, name: &str) {
        self.state.names.remove(name);
    }

    pub(crate) fn set_name_owner_data(&mut self, name: &str, owner: Address, data: String) {
        if let Some(record) = self.state.names.get_mut(name) {
            record.owner = owner;
            record.data = data;
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.state.groups.get(&id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.state
            .group_names
            .get(name)
            .and_then(|id| self.state.groups.get(id))
    }

    /// Register a group under the next sequential id (0 is reserved for "none").
    pub(crate) fn insert_group(
        &mut self,
        owner: Address,
        name: String,
        reference: Signature,
    ) -> GroupId {
        let id = GroupId(self.state.next_group_id);
        self.state.next_group_id += 1;
        self.state.group_names.insert(name.clone(), id);
        self.state.groups.insert(
            id,
            Group {
                id,
                owner,
                name,
                reference,
            },
        );
        id
    }

    /// Reverse of `insert_group`; reverse apply order guarantees this is the
    /// most recently created group.
    pub(crate) fn remove_group(&mut self, id: GroupId) {
        debug_assert_eq!(id.0 + 1, self.state.next_group_id);
        if let Some(group) = self.state.groups.remove(&id) {
            self.state.group_names.remove(&group.name);
            self.state.next_group_id = id.0;
        }
    }

    /// Group owners are members without an explicit membership row.
    pub fn is_member(&self, group: GroupId, address: Address) -> bool {
        if let Some(g) = self.state.groups.get(&group) {
            if g.owner == address {
                return true;
            }
        }
        self.state.members.contains_key(&(group, address))
    }

    pub(crate) fn add_member(&mut self, group: GroupId, address: Address, join_reference: Signature) {
        self.state.members.insert(
            (group, address),
            GroupMember {
                group,
                address,
                join_reference,
            },
        );
    }

    pub(crate) fn remove_member(&mut self, group: GroupId, address: Address) {
        self.state.members.remove(&(group, address));
    }

    pub fn data_record(&self, signature: Signature) -> Option<&[u8]> {
        self.state.data_records.get(&signature).map(|d| d.as_slice())
    }

    pub(crate) fn insert_data_record(&mut self, signature: Signature, data: Vec<u8>) {
        self.state.data_records.insert(signature, data);
    }

    pub(crate) fn remove_data_record(&mut self, signature: Signature) {
        self.state.data_records.remove(&signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_are_sequential_from_one() {
        let mut ledger = Ledger::new();
        let owner = Address::from_seed(1);
        let a = ledger.insert_group(owner, "miners".into(), Signature::from_seed(1));
        let b = ledger.insert_group(owner, "traders".into(), Signature::from_seed(2));
        assert_eq!(a, GroupId(1));
        assert_eq!(b, GroupId(2));
        assert_eq!(ledger.group_by_name("miners").unwrap().id, a);
    }

    #[test]
    fn owner_is_implicit_member() {
        let mut ledger = Ledger::new();
        let owner = Address::from_seed(1);
        let outsider = Address::from_seed(2);
        let g = ledger.insert_group(owner, "miners".into(), Signature::from_seed(1));

        assert!(ledger.is_member(g, owner));
        assert!(!ledger.is_member(g, outsider));

        ledger.add_member(g, outsider, Signature::from_seed(2));
        assert!(ledger.is_member(g, outsider));
        ledger.remove_member(g, outsider);
        assert!(!ledger.is_member(g, outsider));
    }

    #[test]
    fn remove_group_rewinds_sequence() {
        let mut ledger = Ledger::new();
        let owner = Address::from_seed(1);
        ledger.insert_group(owner, "a".into(), Signature::from_seed(1));
        let b = ledger.insert_group(owner, "b".into(), Signature::from_seed(2));

        ledger.remove_group(b);
        assert!(ledger.group(b).is_none());
        let again = ledger.insert_group(owner, "c".into(), Signature::from_seed(3));
        assert_eq!(again, b);
    }
}
