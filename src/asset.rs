// 4.0: the asset register. ids are assigned sequentially at issuance and only
// issue/genesis transactions create supply. indivisible assets move in whole
// units only; that rule is enforced at validation and again in the match loop.

use crate::store::Ledger;
use crate::types::{Address, Amount, AssetId, Signature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub owner: Address,
    /// Unique across all assets, living and orphaned issuances excluded.
    pub name: String,
    pub description: String,
    pub quantity: Amount,
    pub divisible: bool,
    /// Signature of the issuing transaction.
    pub reference: Signature,
}

impl Ledger {
    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.state.assets.get(&id)
    }

    pub fn asset_by_name(&self, name: &str) -> Option<&Asset> {
        self.state
            .asset_names
            .get(name)
            .and_then(|id| self.state.assets.get(id))
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.state.assets.contains_key(&id)
    }

    /// Register a new asset under the next sequential id.
    pub fn insert_asset(
        &mut self,
        owner: Address,
        name: String,
        description: String,
        quantity: Amount,
        divisible: bool,
        reference: Signature,
    ) -> AssetId {
        let id = AssetId(self.state.next_asset_id);
        self.state.next_asset_id += 1;
        self.state.asset_names.insert(name.clone(), id);
        self.state.assets.insert(
            id,
            Asset {
                id,
                owner,
                name,
                description,
                quantity,
                divisible,
                reference,
            },
        );
        id
    }

    /// Remove an asset during orphaning. Reverse apply order guarantees this is
    /// always the most recently issued asset, so the sequence counter rewinds.
    pub(crate) fn remove_asset(&mut self, id: AssetId) {
        debug_assert_eq!(id.0 + 1, self.state.next_asset_id);
        if let Some(asset) = self.state.assets.remove(&id) {
            self.state.asset_names.remove(&asset.name);
            self.state.next_asset_id = id.0;
        }
    }

    pub(crate) fn set_asset_owner(&mut self, id: AssetId, owner: Address) {
        if let Some(asset) = self.state.assets.get_mut(&id) {
            asset.owner = owner;
        }
    }

    pub(crate) fn set_asset_description(&mut self, id: AssetId, description: String) {
        if let Some(asset) = self.state.assets.get_mut(&id) {
            asset.description = description;
        }
    }
}
