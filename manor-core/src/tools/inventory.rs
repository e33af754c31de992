//! Item transfers and inventory.

use super::{MutationTool, required};
use crate::error::ValidationError;
use crate::mutation::{ArgMap, Mutation};

/// `transfer_item(item, from_location, to_location)`.
pub struct TransferItemTool;

impl MutationTool for TransferItemTool {
    fn name(&self) -> &'static str {
        "transfer_item"
    }

    fn description(&self) -> &'static str {
        "Move an item between a location, the player (\"player\") or an NPC"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::TransferItem {
            item: required(args, self.name(), "item")?,
            from_location: required(args, self.name(), "from_location")?,
            to_location: required(args, self.name(), "to_location")?,
        })
    }
}

/// `add_to_inventory(item)`.
pub struct AddToInventoryTool;

impl MutationTool for AddToInventoryTool {
    fn name(&self) -> &'static str {
        "add_to_inventory"
    }

    fn description(&self) -> &'static str {
        "Pick up an item from the acting character's location"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::AddToInventory {
            item: required(args, self.name(), "item")?,
        })
    }
}

/// `remove_from_inventory(item)`.
pub struct RemoveFromInventoryTool;

impl MutationTool for RemoveFromInventoryTool {
    fn name(&self) -> &'static str {
        "remove_from_inventory"
    }

    fn description(&self) -> &'static str {
        "Drop a carried item at the acting character's location"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::RemoveFromInventory {
            item: required(args, self.name(), "item")?,
        })
    }
}
