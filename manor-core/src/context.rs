//! Plain-text world context for reasoning calls.
//!
//! Everything here is deterministic string building over a [`WorldState`];
//! the prompts decide what to do with it.

use crate::perception::HeardSound;
use crate::world::{Actor, WorldState};

/// How many history entries the director sees.
const HISTORY_WINDOW: usize = 6;

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

/// One line per entry, each newline-terminated.
fn render(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

/// Context for the director and perception prompts, from `actor`'s point of view.
#[must_use]
pub fn world_context(world: &WorldState, actor: &Actor, history: &[String]) -> String {
    render(&world_lines(world, actor, history))
}

fn world_lines(world: &WorldState, actor: &Actor, history: &[String]) -> Vec<String> {
    let Some(here) = world.actor_location(actor).and_then(|id| world.location(id)) else {
        return vec!["CURRENT LOCATION: unknown".to_string()];
    };

    let mut lines = vec![
        format!("ACTING CHARACTER: {}", actor.tag()),
        format!("CURRENT LOCATION: {} ({})", here.name, here.id),
    ];
    if !here.facts.is_empty() {
        lines.push(format!("LOCATION FACTS: {}", here.facts.as_slice().join("; ")));
    }

    lines.push("EXITS:".to_string());
    lines.extend(here.exits.iter().map(|(direction, dest)| match here.doors.get(direction) {
        Some(door) if door.locked => format!("- {direction}: {dest} (blocked by {}, locked)", door.description),
        _ => format!("- {direction}: {dest}"),
    }));

    lines.push(format!("ITEMS HERE: {}", list_or(&here.items, "none")));

    let others: Vec<String> = world
        .npcs_at(&here.id)
        .into_iter()
        .filter(|id| *id != actor.id())
        .filter_map(|id| world.npc(id))
        .map(|npc| {
            if world.met_npcs.contains(&npc.id) || !actor.is_player() {
                format!("{} ({})", npc.id, npc.description)
            } else {
                format!("unknown person ({}, id {})", npc.description, npc.id)
            }
        })
        .collect();
    if !others.is_empty() {
        lines.push(format!("NPCS PRESENT: {}", others.join("; ")));
    }
    if !actor.is_player() && world.player_location == here.id {
        lines.push("THE PLAYER IS HERE".to_string());
    }

    lines.push(format!("INVENTORY: {}", list_or(world.inventory_of(actor), "empty")));

    if !history.is_empty() {
        lines.push("RECENT HISTORY:".to_string());
        let skip = history.len().saturating_sub(HISTORY_WINDOW);
        lines.extend(history[skip..].iter().cloned());
    }
    lines
}

/// Context for an NPC's thought and action prompts.
#[must_use]
pub fn npc_context(world: &WorldState, npc_id: &str, perceived: &[String], heard: &[HeardSound]) -> String {
    let actor = Actor::npc(npc_id);
    let mut lines = world_lines(world, &actor, &[]);

    if let Some(npc) = world.npc(npc_id) {
        if !npc.recent_thoughts.is_empty() {
            lines.push(format!("YOUR RECENT THOUGHTS: {}", npc.recent_thoughts.join(" | ")));
        }
        if !npc.recent_actions.is_empty() {
            lines.push(format!("YOUR RECENT ACTIONS: {}", npc.recent_actions.join(" | ")));
        }
    }

    lines.push("WHAT YOU PERCEIVED SINCE YOUR LAST TURN:".to_string());
    if perceived.is_empty() {
        lines.push("- nothing".to_string());
    }
    lines.extend(perceived.iter().map(|line| format!("- {line}")));

    if !heard.is_empty() {
        lines.push("SOUNDS YOU HEARD:".to_string());
        lines.extend(heard.iter().map(HeardSound::render));
    }
    render(&lines)
}

/// Entity listing for fact attribution: every id with its current facts.
#[must_use]
pub fn entity_listing(world: &WorldState) -> String {
    let mut lines = vec!["LOCATIONS:".to_string()];
    lines.extend(
        world
            .locations
            .values()
            .map(|loc| format!("- {} ({}): {}", loc.id, loc.name, loc.facts.as_slice().join("; "))),
    );
    lines.push("NPCS:".to_string());
    lines.extend(
        world
            .npcs
            .values()
            .map(|npc| format!("- {} at {}: {}", npc.id, npc.location, npc.facts.as_slice().join("; "))),
    );
    lines.push("ITEMS:".to_string());
    lines.extend(
        world
            .items
            .values()
            .map(|item| format!("- {} ({}): {}", item.id, item.name, item.facts.as_slice().join("; "))),
    );
    render(&lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StoreSnapshot;

    #[test]
    fn player_context_hides_unmet_names() {
        let mut snapshot = StoreSnapshot::manor();
        snapshot.player.location = "library".into();
        let world: WorldState = snapshot.into();

        let ctx = world_context(&world, &Actor::Player, &["Player: hello?".into()]);
        assert!(ctx.contains("CURRENT LOCATION: Dusty Library (library)"));
        assert!(ctx.contains("unknown person"));
        assert!(ctx.contains("ITEMS HERE: silver_key"));
        assert!(ctx.contains("Player: hello?"));
    }

    #[test]
    fn locked_exits_are_marked() {
        let world: WorldState = StoreSnapshot::manor().into();
        let ctx = world_context(&world, &Actor::Player, &[]);
        assert!(ctx.contains("- north: study (blocked by locked oak door, locked)"));
        assert!(ctx.contains("- east: library\n"));
    }

    #[test]
    fn every_section_ends_its_line() {
        let world: WorldState = StoreSnapshot::manor().into();
        let listing = entity_listing(&world);
        assert!(listing.starts_with("LOCATIONS:\n- attic (Cramped Attic): \n"));
        assert!(listing.contains("NPCS:\n- elena at library: \n"));
        assert!(listing.ends_with("ITEMS:\n- silver_key (Silver Key): \n"));

        let lost = world_context(&WorldState::default(), &Actor::Player, &[]);
        assert_eq!(lost, "CURRENT LOCATION: unknown\n");
    }

    #[test]
    fn director_sees_only_recent_history() {
        let world: WorldState = StoreSnapshot::manor().into();
        let history: Vec<String> = (0..9).map(|i| format!("Player: step {i}")).collect();
        let ctx = world_context(&world, &Actor::Player, &history);
        assert!(!ctx.contains("step 2"));
        assert!(ctx.ends_with("RECENT HISTORY:\nPlayer: step 3\nPlayer: step 4\nPlayer: step 5\nPlayer: step 6\nPlayer: step 7\nPlayer: step 8\n"));
    }

    #[test]
    fn npc_context_lists_perceptions() {
        let world: WorldState = StoreSnapshot::manor().into();
        let ctx = npc_context(&world, "elena", &["Player@foyer: shout \"hello\"".into()], &[]);
        assert!(ctx.contains("ACTING CHARACTER: elena"));
        assert!(ctx.contains("- Player@foyer: shout \"hello\""));
        assert!(!ctx.contains("SOUNDS YOU HEARD"));
    }
}
