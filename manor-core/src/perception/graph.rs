//! Shortest-path distance over the location graph.
//!
//! Exits are directed edges: `A → B` does not imply `B → A`. Distance is
//! measured from the listener outward, following outgoing exits only.

use std::collections::{HashSet, VecDeque};

use crate::world::WorldState;

/// Hop count from `from` to `to` following outgoing exits.
///
/// `Some(0)` for the same location, `None` if `to` cannot be reached.
#[must_use]
pub fn room_distance(world: &WorldState, from: &str, to: &str) -> Option<usize> {
    if from == to {
        return Some(0);
    }

    let mut visited: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from, 0)]);

    while let Some((current, dist)) = queue.pop_front() {
        let Some(location) = world.location(current) else {
            continue;
        };
        for next in location.neighbours() {
            if next == to {
                return Some(dist + 1);
            }
            if visited.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
    None
}

/// Whether `origin` is the listener's location or one outgoing hop away.
#[must_use]
pub fn is_within_one_hop(world: &WorldState, listener: &str, origin: &str) -> bool {
    room_distance(world, listener, origin).is_some_and(|d| d <= 1)
}
