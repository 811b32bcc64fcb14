use rand::Rng;
use tracing::{info, warn};

use geo_types::{
    GuessSnapshot, LatLng, PlayerSnapshot, RoomError, RoomSnapshot, RoomStatus, RoundSnapshot,
    RoundStatus, TimerPhase, ToastKind,
};

use crate::events::RoomEvent;
use crate::geo;
use crate::regions;
use crate::round::Round;

#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: String,
    pub name: String,
    pub total_score: u32,
    pub has_guessed: bool,
    pub last_distance_km: Option<f64>,
    pub last_score: Option<u32>,
    /// Liveness flag maintained by the gateway; the record itself persists
    /// for the room's lifetime so reconnects resume the same player.
    pub connected: bool,
    /// Whether the join carried a valid signature. Unsigned joins are
    /// accepted; downstream reporting can branch on this.
    pub verified: bool,
}

impl Player {
    fn new(user_id: String, name: String, verified: bool) -> Self {
        Self {
            user_id,
            name,
            total_score: 0,
            has_guessed: false,
            last_distance_km: None,
            last_score: None,
            connected: false,
            verified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub rounds_total: u32,
    pub round_seconds: u32,
    pub reveal_seconds: u32,
    pub countdown_seconds: u32,
    pub max_players: usize,
    pub region: String,
    pub country: String,
}

impl RoomSettings {
    /// Clamp client-supplied values into sane bounds and drop unknown
    /// region/country codes.
    pub fn clamped(
        rounds_total: u32,
        round_seconds: u32,
        reveal_seconds: u32,
        region: &str,
        country: &str,
        defaults: &RoomSettings,
    ) -> Self {
        let region = region.to_uppercase();
        let country = country.to_uppercase();
        Self {
            rounds_total: rounds_total.clamp(1, 20),
            round_seconds: round_seconds.clamp(15, 600),
            reveal_seconds: reveal_seconds.clamp(5, 40),
            countdown_seconds: defaults.countdown_seconds,
            max_players: defaults.max_players,
            region: if regions::is_region(&region) {
                region
            } else {
                regions::DEFAULT_REGION.to_string()
            },
            country: if regions::is_country(&country) {
                country
            } else {
                String::new()
            },
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            rounds_total: 5,
            round_seconds: 90,
            reveal_seconds: 12,
            countdown_seconds: 5,
            max_players: 30,
            region: regions::DEFAULT_REGION.to_string(),
            country: String::new(),
        }
    }
}

/// One multiplayer session. All mutation goes through the command methods
/// below, which return the events to broadcast; rejections come back as
/// `RoomError` and are toasted to the offending client only.
///
/// The caller provides `now_ms` so every transition is deterministic and
/// directly testable.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub host_user_id: String,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    players: Vec<Player>,
    pub round_number: u32,
    pub current_round: Option<Round>,
    pub countdown_ends_at_ms: i64,
    pub created_at_ms: i64,
    next_generation: u64,
}

fn coordinate_in_range(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

impl Room {
    pub fn new(
        code: String,
        host_user_id: String,
        host_name: String,
        settings: RoomSettings,
        now_ms: i64,
    ) -> Self {
        let host = Player::new(host_user_id.clone(), host_name, false);
        Self {
            code,
            host_user_id,
            status: RoomStatus::Lobby,
            settings,
            players: vec![host],
            round_number: 0,
            current_round: None,
            countdown_ends_at_ms: 0,
            created_at_ms: now_ms,
            next_generation: 0,
        }
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_user_id == user_id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    fn player_mut(&mut self, user_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    /// Register a player, or reattach an existing one after a reconnect.
    /// The player record keeps its score and guess-in-flight across
    /// disconnects.
    pub fn join(
        &mut self,
        user_id: &str,
        name: &str,
        verified: bool,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if let Some(player) = self.player_mut(user_id) {
            player.connected = true;
            if !name.is_empty() {
                player.name = name.to_string();
            }
            if verified {
                player.verified = true;
            }
            return Ok(vec![RoomEvent::StateChanged]);
        }

        if self.players.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull);
        }

        let name = if name.is_empty() {
            format!("User {user_id}")
        } else {
            name.to_string()
        };
        let mut player = Player::new(user_id.to_string(), name, verified);
        player.connected = true;
        self.players.push(player);
        Ok(vec![RoomEvent::StateChanged])
    }

    /// Clear the liveness flag. The host stays host across disconnects;
    /// there is no transfer-on-disconnect policy.
    pub fn mark_disconnected(&mut self, user_id: &str) -> Vec<RoomEvent> {
        match self.player_mut(user_id) {
            Some(player) => {
                player.connected = false;
                vec![RoomEvent::StateChanged]
            }
            None => Vec::new(),
        }
    }

    pub fn connected_players(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    /// Host-only, lobby-only: kick off the pre-game countdown. The end
    /// timestamp is computed once and broadcast so clients share one clock.
    pub fn start_game(&mut self, user_id: &str, now_ms: i64) -> Result<Vec<RoomEvent>, RoomError> {
        if !self.is_host(user_id) {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::NotInLobby);
        }

        self.status = RoomStatus::Countdown;
        self.countdown_ends_at_ms = now_ms + i64::from(self.settings.countdown_seconds) * 1000;
        info!(code = %self.code, "game starting");
        Ok(vec![
            RoomEvent::Countdown {
                ends_at_ms: self.countdown_ends_at_ms,
            },
            RoomEvent::StateChanged,
        ])
    }

    /// Host-only, lobby-only: change the guess-pool filter. Unknown codes
    /// are ignored rather than rejected.
    pub fn set_settings(
        &mut self,
        user_id: &str,
        region: &str,
        country: &str,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if !self.is_host(user_id) {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::NotInLobby);
        }

        let region = region.to_uppercase();
        let country = country.to_uppercase();
        if regions::is_region(&region) {
            self.settings.region = region;
        }
        if country.is_empty() || regions::is_country(&country) {
            self.settings.country = country;
        }
        Ok(vec![RoomEvent::StateChanged])
    }

    /// Accept a guess while the round is running and the deadline has not
    /// passed. Resubmission overwrites the earlier guess. Finalizes the
    /// round early once every registered player has guessed.
    pub fn submit_guess(
        &mut self,
        user_id: &str,
        lat: f64,
        lng: f64,
        now_ms: i64,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if !coordinate_in_range(lat, lng) {
            return Err(RoomError::InvalidCoordinate);
        }
        if self.player(user_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        if self.status != RoomStatus::Running {
            return Err(RoomError::GuessNotOpen);
        }
        let Some(round) = self.current_round.as_mut() else {
            return Err(RoomError::GuessNotOpen);
        };
        if !round.accepting_guesses(now_ms) {
            return Err(RoomError::GuessNotOpen);
        }

        round.add_guess(user_id, LatLng { lat, lng }, now_ms);
        if let Some(player) = self.player_mut(user_id) {
            player.has_guessed = true;
        }

        if self.players.iter().all(|p| p.has_guessed) {
            return Ok(self.finalize_round(now_ms));
        }
        Ok(vec![RoomEvent::StateChanged])
    }

    /// Record the resolver's confirmed panorama location. The first
    /// confirmation for the current seed generation wins; stale or
    /// duplicate confirmations are dropped without touching state.
    pub fn pano_ready(
        &mut self,
        user_id: &str,
        lat: f64,
        lng: f64,
        generation: Option<u64>,
        now_ms: i64,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if !coordinate_in_range(lat, lng) {
            return Err(RoomError::InvalidCoordinate);
        }
        if !self.is_host(user_id) {
            return Err(RoomError::NotHost);
        }
        let round_seconds = self.settings.round_seconds;
        let (round_number, rounds_total) = (self.round_number, self.settings.rounds_total);
        let Some(round) = self.current_round.as_mut() else {
            return Ok(Vec::new());
        };

        if let Some(generation) = generation {
            if generation != round.generation {
                info!(
                    code = %self.code,
                    stale = generation,
                    current = round.generation,
                    "dropping stale pano confirmation"
                );
                return Ok(Vec::new());
            }
        }

        if round.is_resolved() {
            // Two confirmations for one generation should not happen; keep
            // the first and log it.
            warn!(code = %self.code, round = round.number, "duplicate pano confirmation ignored");
            return Ok(Vec::new());
        }

        if !round.confirm_true_location(LatLng { lat, lng }, now_ms, round_seconds) {
            return Ok(Vec::new());
        }

        Ok(vec![
            RoomEvent::Toast {
                kind: ToastKind::Info,
                text: format!("Round {round_number}/{rounds_total} started!"),
            },
            RoomEvent::StateChanged,
        ])
    }

    /// Host-only: discard the current seed and sample a new one. Allowed
    /// only while no true location is confirmed. Automatic rerolls (the
    /// host client reacting to a resolver miss) are bounded per round.
    pub fn reroll<R: Rng + ?Sized>(
        &mut self,
        user_id: &str,
        auto: bool,
        rng: &mut R,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if !self.is_host(user_id) {
            return Err(RoomError::NotHost);
        }
        {
            let Some(round) = self.current_round.as_ref() else {
                return Err(RoomError::RerollNotAllowed);
            };
            if round.is_resolved() || round.status != RoundStatus::Pending {
                return Err(RoomError::RerollNotAllowed);
            }
            if auto && round.auto_reroll_exhausted() {
                return Err(RoomError::RerollExhausted);
            }
        }

        let bbox = regions::bbox_for(&self.settings.region, &self.settings.country);
        let seed = regions::sample_point(&bbox, rng);
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(round) = self.current_round.as_mut() {
            round.reroll(seed, generation, auto);
        }
        Ok(vec![
            RoomEvent::Toast {
                kind: ToastKind::Info,
                text: "Trying a new location".to_string(),
            },
            RoomEvent::StateChanged,
        ])
    }

    /// Timer-driven transitions, called on the tick cadence by the room's
    /// ticker task. Command processing and ticks share one lock, so a
    /// deadline firing can never race a last-moment guess.
    pub fn tick<R: Rng + ?Sized>(&mut self, now_ms: i64, rng: &mut R) -> Vec<RoomEvent> {
        match self.status {
            RoomStatus::Countdown => {
                if now_ms < self.countdown_ends_at_ms {
                    return Vec::new();
                }
                self.status = RoomStatus::Running;
                self.begin_round(rng);
                vec![RoomEvent::StateChanged]
            }
            RoomStatus::Running => self.tick_round(now_ms, rng),
            _ => Vec::new(),
        }
    }

    fn tick_round<R: Rng + ?Sized>(&mut self, now_ms: i64, rng: &mut R) -> Vec<RoomEvent> {
        let Some(round) = self.current_round.as_mut() else {
            return Vec::new();
        };

        match round.status {
            // Waiting on the resolver; no deadline exists yet.
            RoundStatus::Pending => Vec::new(),
            RoundStatus::Running => {
                let Some(deadline) = round.deadline_at_ms else {
                    return Vec::new();
                };
                if now_ms >= deadline {
                    self.finalize_round(now_ms)
                } else {
                    vec![RoomEvent::Timer {
                        phase: TimerPhase::Guess,
                        ms_left: deadline - now_ms,
                    }]
                }
            }
            RoundStatus::Reveal => {
                let Some(reveal_end) = round.reveal_ends_at_ms else {
                    return Vec::new();
                };
                if now_ms < reveal_end {
                    return vec![RoomEvent::Timer {
                        phase: TimerPhase::Reveal,
                        ms_left: reveal_end - now_ms,
                    }];
                }
                round.status = RoundStatus::Ended;
                if self.round_number >= self.settings.rounds_total {
                    self.status = RoomStatus::Finished;
                    info!(code = %self.code, "game finished");
                    return vec![
                        RoomEvent::Toast {
                            kind: ToastKind::Ok,
                            text: "Game finished!".to_string(),
                        },
                        RoomEvent::StateChanged,
                    ];
                }
                self.begin_round(rng);
                vec![RoomEvent::StateChanged]
            }
            RoundStatus::Ended => Vec::new(),
        }
    }

    fn begin_round<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.round_number += 1;
        for player in &mut self.players {
            player.has_guessed = false;
            player.last_distance_km = None;
            player.last_score = None;
        }
        let bbox = regions::bbox_for(&self.settings.region, &self.settings.country);
        let seed = regions::sample_point(&bbox, rng);
        self.next_generation += 1;
        self.current_round = Some(Round::new(self.round_number, seed, self.next_generation));
        info!(code = %self.code, round = self.round_number, "round pending resolution");
    }

    /// Score every player against the true location and open the reveal
    /// window. Guarded on round status so it runs exactly once per round,
    /// whether triggered by the deadline or by the last guess arriving.
    fn finalize_round(&mut self, now_ms: i64) -> Vec<RoomEvent> {
        let reveal_seconds = self.settings.reveal_seconds;
        let Some(round) = self.current_round.as_mut() else {
            return Vec::new();
        };
        if round.status != RoundStatus::Running {
            return Vec::new();
        }
        let Some(true_location) = round.true_location else {
            warn!(code = %self.code, round = round.number, "finalizing without a true location");
            return Vec::new();
        };

        round.status = RoundStatus::Reveal;
        round.reveal_ends_at_ms = Some(now_ms + i64::from(reveal_seconds) * 1000);

        let mut best_distance: Option<f64> = None;
        let mut winners: Vec<String> = Vec::new();
        let mut no_guess: Vec<String> = Vec::new();

        let guesses = round.guesses.clone();
        for player in &mut self.players {
            let Some(guess) = guesses.get(&player.user_id) else {
                player.last_distance_km = None;
                player.last_score = Some(0);
                no_guess.push(player.user_id.clone());
                continue;
            };

            let distance = geo::distance_km(true_location, guess.location);
            let score = geo::score_from_distance(distance);
            player.last_distance_km = Some(distance);
            player.last_score = Some(score);
            player.total_score += score;

            match best_distance {
                Some(best) if distance > best => {}
                Some(best) if distance == best => winners.push(player.user_id.clone()),
                _ => {
                    best_distance = Some(distance);
                    winners = vec![player.user_id.clone()];
                }
            }
        }

        info!(code = %self.code, round = self.round_number, winners = winners.len(), "round finalized");
        vec![
            RoomEvent::RoundEnd {
                winners,
                no_guess,
                best_distance_km: best_distance,
            },
            RoomEvent::StateChanged,
        ]
    }

    /// Full state pushed to clients on any mutation. Players are sorted by
    /// total score descending; the stable sort keeps join order on ties.
    pub fn snapshot(&self) -> RoomSnapshot {
        let mut sorted: Vec<&Player> = self.players.iter().collect();
        sorted.sort_by(|a, b| b.total_score.cmp(&a.total_score));

        let revealed = self
            .current_round
            .as_ref()
            .is_some_and(|r| matches!(r.status, RoundStatus::Reveal | RoundStatus::Ended));

        let guesses = sorted
            .iter()
            .filter_map(|player| {
                let round = self.current_round.as_ref()?;
                let guess = round.guesses.get(&player.user_id)?;
                Some(GuessSnapshot {
                    user_id: player.user_id.clone(),
                    name: player.name.clone(),
                    lat: guess.location.lat,
                    lng: guess.location.lng,
                    distance_km: if revealed { player.last_distance_km } else { None },
                    score: if revealed { player.last_score } else { None },
                })
            })
            .collect();

        RoomSnapshot {
            code: self.code.clone(),
            host_user_id: self.host_user_id.clone(),
            status: self.status,
            countdown_ends_at_ms: self.countdown_ends_at_ms,
            round_number: self.round_number,
            rounds_total: self.settings.rounds_total,
            round_seconds: self.settings.round_seconds,
            reveal_seconds: self.settings.reveal_seconds,
            region: self.settings.region.clone(),
            country: self.settings.country.clone(),
            regions: regions::region_catalog(),
            countries: regions::country_catalog(),
            current_round: self.current_round.as_ref().map(|round| RoundSnapshot {
                number: round.number,
                seed_lat: round.seed.lat,
                seed_lng: round.seed.lng,
                generation: round.generation,
                status: round.status,
                started_at_ms: round.started_at_ms,
                deadline_at_ms: round.deadline_at_ms,
                reveal_ends_at_ms: round.reveal_ends_at_ms,
                true_location: round.true_location,
            }),
            players: sorted
                .iter()
                .map(|p| PlayerSnapshot {
                    user_id: p.user_id.clone(),
                    name: p.name.clone(),
                    total_score: p.total_score,
                    has_guessed: p.has_guessed,
                    last_distance_km: p.last_distance_km,
                    last_score: p.last_score,
                    is_host: p.user_id == self.host_user_id,
                    connected: p.connected,
                    verified: p.verified,
                })
                .collect(),
            guesses,
        }
    }
}
