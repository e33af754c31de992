//! Movement and doors.

use super::{MutationTool, required};
use crate::error::ValidationError;
use crate::mutation::{ArgMap, Mutation};

/// `move_player(location)`: moves whoever is acting.
pub struct MoveActorTool;

impl MutationTool for MoveActorTool {
    fn name(&self) -> &'static str {
        "move_player"
    }

    fn description(&self) -> &'static str {
        "Move the acting character to an adjacent location"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::MoveActor {
            location: required(args, self.name(), "location")?,
        })
    }
}

/// `move_npc(npc_id, location)`.
pub struct MoveNpcTool;

impl MutationTool for MoveNpcTool {
    fn name(&self) -> &'static str {
        "move_npc"
    }

    fn description(&self) -> &'static str {
        "Move a named NPC to an adjacent location"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::MoveNpc {
            npc_id: required(args, self.name(), "npc_id")?,
            location: required(args, self.name(), "location")?,
        })
    }
}

/// `unlock_door(from_location, to_location)`.
pub struct UnlockDoorTool;

impl MutationTool for UnlockDoorTool {
    fn name(&self) -> &'static str {
        "unlock_door"
    }

    fn description(&self) -> &'static str {
        "Unlock the door leading from one location to an adjacent one"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        let from_location = required(args, self.name(), "from_location")?;
        let to_location = required(args, self.name(), "to_location")?;
        if from_location == to_location {
            return Err(ValidationError::Invalid {
                tool: self.name(),
                reason: "needs two different locations",
            });
        }
        Ok(Mutation::UnlockDoor { from_location, to_location })
    }
}
