//! Profile resolution: merging a per-scope override onto its kind-level
//! base profile.
//!
//! The merge never downgrades: empty strings and zero numbers in the
//! override mean "inherit the base", boolean inclusion flags are OR'd,
//! and an empty trigger list keeps the base list. This is what lets a
//! sparse override JSON tweak a single knob without restating the rest.

use chronicle_types::Profile;

/// Merge an optional override onto a base profile.
///
/// Returns the base unchanged when no override exists.
pub fn merge(base: &Profile, override_profile: Option<&Profile>) -> Profile {
    let Some(over) = override_profile else {
        return base.clone();
    };

    Profile {
        time_window: pick_string(&base.time_window, &over.time_window),
        buffer_limit: pick_u32(base.buffer_limit, over.buffer_limit),
        evict_overflow: base.evict_overflow || over.evict_overflow,
        trigger_interval_ms: pick_u64(base.trigger_interval_ms, over.trigger_interval_ms),
        max_events: pick_u32(base.max_events, over.max_events),
        narrative_triggers: if over.narrative_triggers.is_empty() {
            base.narrative_triggers.clone()
        } else {
            over.narrative_triggers.clone()
        },
        snapshot_namespace: pick_string(&base.snapshot_namespace, &over.snapshot_namespace),
        visibility_buffer: if over.visibility_buffer > 0.0 {
            over.visibility_buffer
        } else {
            base.visibility_buffer
        },
    }
}

/// Non-empty override string replaces the base.
fn pick_string(base: &str, over: &str) -> String {
    if over.is_empty() { base.to_owned() } else { over.to_owned() }
}

/// Non-zero override value replaces the base.
const fn pick_u32(base: u32, over: u32) -> u32 {
    if over == 0 { base } else { over }
}

/// Non-zero override value replaces the base.
const fn pick_u64(base: u64, over: u64) -> u64 {
    if over == 0 { base } else { over }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Profile {
        Profile {
            time_window: "10m".to_owned(),
            max_events: 50,
            ..Profile::default()
        }
    }

    #[test]
    fn zero_override_does_not_replace() {
        let over = Profile {
            max_events: 0,
            time_window: String::new(),
            ..Profile::default()
        };
        let merged = merge(&base(), Some(&over));
        assert_eq!(merged.max_events, 50);
        assert_eq!(merged.time_window, "10m");
    }

    #[test]
    fn non_empty_override_replaces() {
        let over = Profile {
            time_window: "5m".to_owned(),
            ..base()
        };
        let merged = merge(&base(), Some(&over));
        assert_eq!(merged.time_window, "5m");
    }

    #[test]
    fn booleans_are_ored_never_downgraded() {
        let mut b = base();
        b.evict_overflow = true;
        let over = Profile {
            evict_overflow: false,
            ..Profile::default()
        };
        let merged = merge(&b, Some(&over));
        assert!(merged.evict_overflow);

        let mut b2 = base();
        b2.evict_overflow = false;
        let over2 = Profile {
            evict_overflow: true,
            ..Profile::default()
        };
        assert!(merge(&b2, Some(&over2)).evict_overflow);
    }

    #[test]
    fn trigger_list_replaces_only_when_non_empty() {
        let mut b = base();
        b.narrative_triggers = vec!["player_died".to_owned()];

        let empty_over = Profile {
            narrative_triggers: Vec::new(),
            ..Profile::default()
        };
        assert_eq!(
            merge(&b, Some(&empty_over)).narrative_triggers,
            vec!["player_died".to_owned()]
        );

        let over = Profile {
            narrative_triggers: vec!["boss_spawned".to_owned()],
            ..Profile::default()
        };
        assert_eq!(
            merge(&b, Some(&over)).narrative_triggers,
            vec!["boss_spawned".to_owned()]
        );
    }

    #[test]
    fn no_override_returns_base() {
        let merged = merge(&base(), None);
        assert_eq!(merged, base());
    }
}
