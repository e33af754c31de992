//! Deterministic pieces of event-line perception.

use std::collections::HashSet;

use super::graph::is_within_one_hop;
use crate::events::EventLine;
use crate::world::WorldState;

/// Utterance markers. Any of these in a line's content makes it speech-like.
const SPEECH_MARKERS: &[&str] = &[
    "\"",
    "shout",
    "yell",
    "call out",
    "calls out",
    "called out",
    "say ",
    "say:",
    "says",
    "said",
    "scream",
];

/// Whether `content` carries an utterance.
#[must_use]
pub fn is_speech_like(content: &str) -> bool {
    let lower = content.to_lowercase();
    SPEECH_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Lines a listener at `listener` perceives regardless of the semantic filter.
///
/// Untagged lines are ambient and always included. Tagged speech-like lines
/// are included when their location is the listener's or one outgoing hop
/// away. `listener` of `None` (unknown position) only receives ambient lines.
#[must_use]
pub fn adjacency_override(world: &WorldState, listener: Option<&str>, lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| match EventLine::parse(line) {
            None => true,
            Some(tagged) => {
                listener.is_some_and(|here| is_within_one_hop(world, here, tagged.location))
                    && is_speech_like(tagged.content)
            }
        })
        .cloned()
        .collect()
}

/// Keep only candidates that are verbatim members of `inputs`, deduplicated.
#[must_use]
pub fn restrict_to_inputs(candidates: Vec<String>, inputs: &[String]) -> Vec<String> {
    let allowed: HashSet<&str> = inputs.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| allowed.contains(c.as_str()) && seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StoreSnapshot;

    #[test]
    fn speech_markers() {
        assert!(is_speech_like("shouts for help"));
        assert!(is_speech_like("I say: hello"));
        assert!(is_speech_like("\"Is anyone there?\""));
        assert!(is_speech_like("Calls Out into the dark"));
        assert!(!is_speech_like("walks to the kitchen"));
        assert!(!is_speech_like("picks up the silver key"));
    }

    #[test]
    fn override_routes_by_hop() {
        let world: WorldState = StoreSnapshot::manor().into();
        let lines = vec![
            "Player@foyer: shouts \"Elena!\"".to_string(),
            "Player@foyer: walks around".to_string(),
            "Player@kitchen: yells for help".to_string(),
            "A bell tolls somewhere.".to_string(),
        ];
        let heard = adjacency_override(&world, Some("library"), &lines);
        assert_eq!(heard, ["Player@foyer: shouts \"Elena!\"", "A bell tolls somewhere."]);

        let nowhere = adjacency_override(&world, None, &lines);
        assert_eq!(nowhere, ["A bell tolls somewhere."]);
    }

    #[test]
    fn restriction_drops_invented_lines() {
        let inputs = vec!["a".to_string(), "b".to_string()];
        let out = restrict_to_inputs(vec!["b".into(), "c".into(), "b".into(), "A".into()], &inputs);
        assert_eq!(out, ["b"]);
    }
}
