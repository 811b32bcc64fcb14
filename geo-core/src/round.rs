use std::collections::HashMap;

use geo_types::{LatLng, RoundStatus};

/// Automatic rerolls allowed per round before the host must intervene.
pub const MAX_AUTO_REROLLS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guess {
    pub location: LatLng,
    pub submitted_at_ms: i64,
}

/// One timed challenge: a sampled seed, the provider-confirmed true
/// location, and per-player guesses.
#[derive(Debug, Clone)]
pub struct Round {
    pub number: u32,
    pub seed: LatLng,
    /// Monotonically increasing per-seed counter; asynchronous panorama
    /// confirmations carrying a different generation are stale and dropped.
    pub generation: u64,
    pub auto_rerolls: u32,
    pub status: RoundStatus,
    pub true_location: Option<LatLng>,
    pub guesses: HashMap<String, Guess>,
    pub started_at_ms: Option<i64>,
    pub deadline_at_ms: Option<i64>,
    pub reveal_ends_at_ms: Option<i64>,
}

impl Round {
    pub fn new(number: u32, seed: LatLng, generation: u64) -> Self {
        Self {
            number,
            seed,
            generation,
            auto_rerolls: 0,
            status: RoundStatus::Pending,
            true_location: None,
            guesses: HashMap::new(),
            started_at_ms: None,
            deadline_at_ms: None,
            reveal_ends_at_ms: None,
        }
    }

    /// True once the resolver has confirmed a panorama for the current seed.
    pub fn is_resolved(&self) -> bool {
        self.true_location.is_some()
    }

    /// Record the confirmed true location and open the guessing window.
    ///
    /// The first confirmation wins; returns false (and changes nothing)
    /// if the round already has one.
    pub fn confirm_true_location(
        &mut self,
        location: LatLng,
        now_ms: i64,
        round_seconds: u32,
    ) -> bool {
        if self.true_location.is_some() || self.status != RoundStatus::Pending {
            return false;
        }
        self.true_location = Some(location);
        self.status = RoundStatus::Running;
        self.started_at_ms = Some(now_ms);
        self.deadline_at_ms = Some(now_ms + i64::from(round_seconds) * 1000);
        true
    }

    /// Replace the seed after a resolver miss or a manual host reroll.
    /// Invalidates the previous generation so a late confirmation for the
    /// old seed cannot attach to the new one.
    pub fn reroll(&mut self, seed: LatLng, generation: u64, auto: bool) {
        debug_assert!(generation > self.generation);
        self.seed = seed;
        self.generation = generation;
        self.true_location = None;
        if auto {
            self.auto_rerolls += 1;
        }
    }

    pub fn auto_reroll_exhausted(&self) -> bool {
        self.auto_rerolls >= MAX_AUTO_REROLLS
    }

    /// Store a guess. The latest guess before the deadline overwrites
    /// the previous one.
    pub fn add_guess(&mut self, user_id: &str, location: LatLng, now_ms: i64) {
        self.guesses.insert(
            user_id.to_string(),
            Guess {
                location,
                submitted_at_ms: now_ms,
            },
        );
    }

    /// Whether a guess can still be accepted right now.
    pub fn accepting_guesses(&self, now_ms: i64) -> bool {
        self.status == RoundStatus::Running
            && self.deadline_at_ms.is_some_and(|deadline| now_ms < deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> LatLng {
        LatLng {
            lat: 10.0,
            lng: 20.0,
        }
    }

    fn paris() -> LatLng {
        LatLng {
            lat: 48.8566,
            lng: 2.3522,
        }
    }

    #[test]
    fn test_first_confirmation_wins() {
        let mut round = Round::new(1, seed(), 1);
        assert!(round.confirm_true_location(paris(), 1_000, 90));
        assert_eq!(round.status, RoundStatus::Running);
        assert_eq!(round.deadline_at_ms, Some(91_000));

        let other = LatLng {
            lat: 0.0,
            lng: 0.0,
        };
        assert!(!round.confirm_true_location(other, 2_000, 90));
        assert_eq!(round.true_location, Some(paris()));
        assert_eq!(round.started_at_ms, Some(1_000));
    }

    #[test]
    fn test_reroll_bumps_generation_and_clears_resolution() {
        let mut round = Round::new(1, seed(), 1);
        round.reroll(paris(), 2, true);
        assert_eq!(round.generation, 2);
        assert_eq!(round.seed, paris());
        assert!(!round.is_resolved());
        assert_eq!(round.auto_rerolls, 1);
    }

    #[test]
    fn test_auto_reroll_bound() {
        let mut round = Round::new(1, seed(), 1);
        for i in 0..MAX_AUTO_REROLLS {
            assert!(!round.auto_reroll_exhausted());
            round.reroll(seed(), u64::from(i) + 2, true);
        }
        assert!(round.auto_reroll_exhausted());
    }

    #[test]
    fn test_latest_guess_overwrites() {
        let mut round = Round::new(1, seed(), 1);
        round.confirm_true_location(paris(), 0, 90);
        round.add_guess("alice", seed(), 1_000);
        round.add_guess("alice", paris(), 2_000);
        assert_eq!(round.guesses.len(), 1);
        assert_eq!(round.guesses["alice"].location, paris());
        assert_eq!(round.guesses["alice"].submitted_at_ms, 2_000);
    }

    #[test]
    fn test_guess_window_respects_deadline() {
        let mut round = Round::new(1, seed(), 1);
        assert!(!round.accepting_guesses(0), "pending round accepts nothing");
        round.confirm_true_location(paris(), 0, 90);
        assert!(round.accepting_guesses(89_999));
        assert!(!round.accepting_guesses(90_000));
    }
}
