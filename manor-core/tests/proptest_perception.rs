//! Property-based tests for perception, event lines and the retry bound.

mod common;

use std::sync::Arc;

use manor_core::events::{EventLine, attempt_line, ensure_attempt_line};
use manor_core::perception::{Volume, adjacency_override, decay, restrict_to_inputs, room_distance};
use manor_core::world::LocationInfo;
use manor_core::{Actor, InMemoryWorldStore, WorldState};
use manor_llm::PromptId;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn volume_strategy() -> impl Strategy<Value = Volume> {
    prop_oneof![Just(Volume::Quiet), Just(Volume::Moderate), Just(Volume::Loud)]
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,20}",
        ("[a-z]{1,8}", "[a-z]{1,8}", "[a-z \"]{1,20}").prop_map(|(a, l, c)| format!("{a}@{l}: {c}")),
    ]
}

/// A one-way chain `r0 → r1 → … → r{n-1}`.
fn chain(n: usize) -> WorldState {
    let mut world = WorldState::default();
    for i in 0..n {
        let id = format!("r{i}");
        let mut location = LocationInfo { id: id.clone(), name: id.to_uppercase(), ..LocationInfo::default() };
        if i + 1 < n {
            location.exits.insert("forward".into(), format!("r{}", i + 1));
        }
        world.locations.insert(id, location);
    }
    world
}

// ---------------------------------------------------------------------------
// Sound decay
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_never_grows_with_distance(volume in volume_strategy(), d in 0usize..10) {
        prop_assert!(decay(volume, Some(d + 1)) <= decay(volume, Some(d)));
    }

    #[test]
    fn louder_sounds_carry_at_least_as_far(d in 0usize..10) {
        prop_assert!(decay(Volume::Quiet, Some(d)) <= decay(Volume::Moderate, Some(d)));
        prop_assert!(decay(Volume::Moderate, Some(d)) <= decay(Volume::Loud, Some(d)));
    }

    #[test]
    fn nothing_is_heard_beyond_two_hops(volume in volume_strategy(), d in 3usize..50) {
        prop_assert_eq!(decay(volume, Some(d)), None);
        prop_assert_eq!(decay(volume, None), None);
    }
}

// ---------------------------------------------------------------------------
// Room distance
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn chain_distance_follows_exit_direction(n in 1usize..12, i in 0usize..12, j in 0usize..12) {
        prop_assume!(i < n && j < n);
        let world = chain(n);
        let expected = (j >= i).then(|| j - i);
        prop_assert_eq!(room_distance(&world, &format!("r{i}"), &format!("r{j}")), expected);
    }
}

#[test]
fn unknown_rooms_are_unreachable() {
    let world = chain(3);
    assert_eq!(room_distance(&world, "r0", "nowhere"), None);
    assert_eq!(room_distance(&world, "nowhere", "r0"), None);
}

// ---------------------------------------------------------------------------
// Perception filtering
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn restricted_output_is_a_duplicate_free_subset(
        inputs in proptest::collection::vec(line_strategy(), 0..8),
        extra in proptest::collection::vec(line_strategy(), 0..8),
        picks in proptest::collection::vec(0usize..16, 0..16),
    ) {
        let mut pool = inputs.clone();
        pool.extend(extra);
        let candidates: Vec<String> = picks.iter().filter_map(|&i| pool.get(i).cloned()).collect();

        let kept = restrict_to_inputs(candidates, &inputs);
        for (k, line) in kept.iter().enumerate() {
            prop_assert!(inputs.contains(line));
            prop_assert!(!kept[..k].contains(line));
        }
    }

    #[test]
    fn override_keeps_untagged_lines_and_invents_nothing(
        lines in proptest::collection::vec(line_strategy(), 0..10),
    ) {
        let world = chain(3);
        let kept = adjacency_override(&world, Some("r0"), &lines);
        for line in &kept {
            prop_assert!(lines.contains(line));
        }
        for line in lines.iter().filter(|l| EventLine::parse(l).is_none()) {
            prop_assert!(kept.contains(line));
        }
    }
}

// ---------------------------------------------------------------------------
// Attempt line
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn exactly_one_attempt_line_survives(
        input in "[a-zA-Z ]{1,20}",
        events in proptest::collection::vec(line_strategy(), 0..6),
        copies in 0usize..3,
    ) {
        prop_assume!(!input.trim().is_empty());
        let attempt = attempt_line(&Actor::Player, "foyer", &input);
        let mut events = events;
        for _ in 0..copies {
            events.push(attempt.to_uppercase());
        }

        let out = ensure_attempt_line(events, &attempt);
        let wanted = attempt.trim().to_lowercase();
        let matches = out.iter().filter(|l| l.trim().to_lowercase() == wanted).count();
        prop_assert_eq!(matches, 1);
        prop_assert!(out.iter().all(|l| !l.trim().is_empty()));
    }
}

// ---------------------------------------------------------------------------
// Retry bound
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn failing_plans_run_at_most_two_batches(tool in "[a-z_]{3,12}") {
        prop_assume!(manor_core::ToolRegistry::standard().get(&tool).is_err());
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        let reply = format!(r#"{{"mutations": [{{"tool": "{tool}", "args": {{}}}}]}}"#);
        let llm = Arc::new(common::ScriptedLlm::new().reply(PromptId::Director, &reply));
        let store = Arc::new(InMemoryWorldStore::manor());

        let report = runtime.block_on(async {
            let mut scheduler = common::scheduler(Arc::clone(&llm), store).await;
            scheduler.player_turn("try something", &CancellationToken::new()).await
        }).expect("player's turn");

        prop_assert_eq!(report.attempts, 2);
        prop_assert_eq!(report.replans, 1);
        prop_assert_eq!(llm.requests_for(PromptId::Director).len(), 2);
    }
}
