//! Sensory events and volume decay.
//!
//! | origin   | d=0        | d=1          | d=2       | d≥3 |
//! |----------|------------|--------------|-----------|-----|
//! | loud     | loudly     | moderately   | faintly   | -   |
//! | moderate | moderately | faintly      | -         | -   |
//! | quiet    | quietly    | -            | -         | -   |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::graph::room_distance;
use crate::world::WorldState;

/// Volume at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Volume {
    /// Only audible in the same room.
    Quiet,
    /// Carries one room.
    Moderate,
    /// Carries two rooms.
    Loud,
}

impl Volume {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Moderate => "moderate",
            Self::Loud => "loud",
        }
    }
}

impl FromStr for Volume {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "moderate" => Ok(Self::Moderate),
            "loud" => Ok(Self::Loud),
            other => Err(format!("unknown volume '{other}'")),
        }
    }
}

impl TryFrom<String> for Volume {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sound reaches a listener. Ordered by perceptibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audibility {
    /// Barely.
    Faintly,
    /// A quiet sound heard up close.
    Quietly,
    /// Clearly but not loudly.
    Moderately,
    /// At full volume.
    Loudly,
}

impl Audibility {
    /// Adverb used in context lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faintly => "faintly",
            Self::Quietly => "quietly",
            Self::Moderately => "moderately",
            Self::Loudly => "loudly",
        }
    }
}

impl fmt::Display for Audibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decay `volume` over `distance` hops. `None` distance is unreachable.
///
/// Returns `None` when the sound is inaudible.
#[must_use]
pub fn decay(volume: Volume, distance: Option<usize>) -> Option<Audibility> {
    use Audibility::{Faintly, Loudly, Moderately, Quietly};

    match (volume, distance?) {
        (Volume::Loud, 0) => Some(Loudly),
        (Volume::Loud, 1) | (Volume::Moderate, 0) => Some(Moderately),
        (Volume::Loud, 2) | (Volume::Moderate, 1) => Some(Faintly),
        (Volume::Quiet, 0) => Some(Quietly),
        _ => None,
    }
}

fn auditory() -> String {
    "auditory".to_string()
}

/// A sound produced during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensoryEvent {
    /// Sense involved; only `auditory` is produced today.
    #[serde(rename = "type", default = "auditory")]
    pub kind: String,
    /// Objective description: "footsteps", "someone shouted 'hello'".
    pub description: String,
    /// Origin location id.
    #[serde(default)]
    pub location: String,
    /// Volume at the origin.
    pub volume: Volume,
}

impl SensoryEvent {
    /// An auditory event.
    #[must_use]
    pub fn auditory(description: impl Into<String>, location: impl Into<String>, volume: Volume) -> Self {
        Self {
            kind: auditory(),
            description: description.into(),
            location: location.into(),
            volume,
        }
    }
}

/// A sound as one listener hears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeardSound {
    /// What was heard.
    pub description: String,
    /// Where it came from.
    pub origin: String,
    /// Hops from the listener.
    pub distance: usize,
    /// Decayed volume.
    pub audibility: Audibility,
}

impl HeardSound {
    /// Context line: `- desc (heard clearly)` or `- desc (heard faintly from foyer)`.
    #[must_use]
    pub fn render(&self) -> String {
        if self.distance == 0 {
            format!("- {} (heard clearly)", self.description)
        } else {
            format!("- {} (heard {} from {})", self.description, self.audibility, self.origin)
        }
    }
}

/// The subset of `events` audible at `listener`, decayed by distance.
#[must_use]
pub fn audible_sounds(world: &WorldState, listener: &str, events: &[SensoryEvent]) -> Vec<HeardSound> {
    events
        .iter()
        .filter_map(|event| {
            let distance = room_distance(world, listener, &event.location);
            let audibility = decay(event.volume, distance)?;
            Some(HeardSound {
                description: event.description.clone(),
                origin: event.location.clone(),
                distance: distance?,
                audibility,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StoreSnapshot;

    #[test]
    fn decay_table() {
        assert_eq!(decay(Volume::Loud, Some(0)), Some(Audibility::Loudly));
        assert_eq!(decay(Volume::Loud, Some(1)), Some(Audibility::Moderately));
        assert_eq!(decay(Volume::Loud, Some(2)), Some(Audibility::Faintly));
        assert_eq!(decay(Volume::Loud, Some(3)), None);
        assert_eq!(decay(Volume::Moderate, Some(0)), Some(Audibility::Moderately));
        assert_eq!(decay(Volume::Moderate, Some(1)), Some(Audibility::Faintly));
        assert_eq!(decay(Volume::Moderate, Some(2)), None);
        assert_eq!(decay(Volume::Quiet, Some(0)), Some(Audibility::Quietly));
        assert_eq!(decay(Volume::Quiet, Some(1)), None);
        assert_eq!(decay(Volume::Loud, None), None);
    }

    #[test]
    fn loud_foyer_event_reaches_library_but_not_cellar() {
        let world: WorldState = StoreSnapshot::manor().into();
        let shout = [SensoryEvent::auditory("someone shouted 'hello'", "foyer", Volume::Loud)];

        let heard = audible_sounds(&world, "library", &shout);
        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0].audibility, Audibility::Moderately);
        assert_eq!(heard[0].render(), "- someone shouted 'hello' (heard moderately from foyer)");

        let in_cellar = [SensoryEvent::auditory("a crash", "cellar", Volume::Loud)];
        assert!(audible_sounds(&world, "library", &in_cellar).is_empty());
    }

    #[test]
    fn same_room_is_heard_clearly() {
        let world: WorldState = StoreSnapshot::manor().into();
        let steps = [SensoryEvent::auditory("footsteps", "library", Volume::Quiet)];
        let heard = audible_sounds(&world, "library", &steps);
        assert_eq!(heard[0].render(), "- footsteps (heard clearly)");
    }

    #[test]
    fn lenient_wire_shape() {
        let event: SensoryEvent =
            serde_json::from_str(r#"{"description": "a thud", "location": "attic", "volume": "LOUD"}"#)
                .expect("parse");
        assert_eq!(event.kind, "auditory");
        assert_eq!(event.volume, Volume::Loud);
        assert!(serde_json::from_str::<SensoryEvent>(r#"{"description": "x", "volume": "deafening"}"#).is_err());
    }
}
