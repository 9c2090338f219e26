//! Authoritative rules engine for a simultaneous multiplayer, turn-based
//! card/combat game.
//!
//! The engine owns match state, enforces turn order, resolves actions
//! (basic attacks, skills, card play), applies and decays status effects,
//! manages the shared draw/discard pile and detects match termination. It
//! is transport-agnostic: callers hand in player intents keyed by match id
//! and broadcast the returned snapshot however they like. One logical
//! writer per match id at a time; serialization at the boundary is the
//! caller's job.

pub mod game;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use game::{
    actions, catalog, deck, effects, state, store, turns, BalanceSet, CardDef, CardId, Catalog,
    CatalogError, CharacterDef, CharacterId, DamageSource, DeckEntry, EffectGrant, EffectKind,
    EffectParams, LobbyPlayer, MatchEvent, MatchId, MatchOutcome, MatchPhase, MatchRules,
    MatchState, MatchStore, PlayerId, PlayerPatch, PlayerState, RulesError, SetupMode, SkillDef,
    SkillId, StatusEffect, TargetKind, TurnPhase, UpkeepOutcome, DEFAULT_VERSION,
};

/// Result of a successful mutating operation: the updated snapshot for the
/// caller to broadcast, the events it produced, and the outcome once the
/// match has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResolution {
    pub state: MatchState,
    pub events: Vec<MatchEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
}

impl ActionResolution {
    pub fn finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Facade over the match store, content catalog and the process-wide
/// randomness source.
pub struct MatchEngine {
    store: MatchStore,
    catalog: Catalog,
    rng: SmallRng,
}

impl MatchEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            store: MatchStore::new(),
            catalog,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seeded constructor so shuffles and dice are reproducible in tests.
    pub fn with_seed(catalog: Catalog, seed: u64) -> Self {
        Self {
            store: MatchStore::new(),
            catalog,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Engine over the built-in ruleset.
    pub fn with_default_ruleset() -> Self {
        Self::new(Catalog::default_ruleset())
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Registers a lobby roster under a fresh match id. The match stays in
    /// `Lobby` until [`MatchEngine::start_match`].
    pub fn create_match(
        &mut self,
        match_id: &str,
        roster: Vec<LobbyPlayer>,
        mode: SetupMode,
        balance_version: Option<&str>,
    ) -> Result<MatchState, RulesError> {
        if roster.is_empty() {
            return Err(RulesError::EmptyRoster);
        }
        let version = balance_version.unwrap_or(&self.catalog.active_version);
        self.catalog.balance(version)?;

        let mut state = MatchState::new(match_id, version);
        state.setup_mode = mode;
        for entry in roster {
            if state.player(&entry.id).is_some() {
                return Err(RulesError::DuplicatePlayer {
                    player_id: entry.id,
                });
            }
            state.players.push(PlayerState {
                id: entry.id,
                display_name: entry.display_name,
                character_id: entry.character.unwrap_or_default(),
                hp: 0,
                max_hp: 0,
                shield: 0,
                hand: Vec::new(),
                effects: Vec::new(),
                cooldowns: Default::default(),
                ready: entry.ready,
            });
        }

        let snapshot = state.clone();
        if !self.store.create(state) {
            return Err(RulesError::MatchAlreadyExists {
                match_id: match_id.to_string(),
            });
        }
        Ok(snapshot)
    }

    /// Validates the lobby, fixes the turn order, builds the shared deck
    /// and deals opening hands.
    pub fn start_match(&mut self, match_id: &str) -> Result<ActionResolution, RulesError> {
        let (store, catalog, rng) = (&mut self.store, &self.catalog, &mut self.rng);
        Self::run(store, catalog, match_id, |state, balance| {
            turns::setup_match(state, balance, rng)
        })
    }

    /// Runs the start phase of the current player's turn.
    pub fn start_turn(&mut self, match_id: &str) -> Result<ActionResolution, RulesError> {
        let (store, catalog, rng) = (&mut self.store, &self.catalog, &mut self.rng);
        Self::run(store, catalog, match_id, |state, balance| {
            turns::start_turn(state, balance, rng)
        })
    }

    /// Ends the current player's turn and queues up the next one.
    pub fn end_turn(&mut self, match_id: &str) -> Result<ActionResolution, RulesError> {
        let (store, catalog) = (&mut self.store, &self.catalog);
        Self::run(store, catalog, match_id, turns::end_turn)
    }

    pub fn perform_attack(
        &mut self,
        match_id: &str,
        attacker_id: &str,
        target_id: &str,
    ) -> Result<ActionResolution, RulesError> {
        let (store, catalog, rng) = (&mut self.store, &self.catalog, &mut self.rng);
        Self::run(store, catalog, match_id, |state, balance| {
            actions::perform_attack(state, balance, rng, attacker_id, target_id)
        })
    }

    pub fn use_skill(
        &mut self,
        match_id: &str,
        player_id: &str,
        skill_id: &str,
        target_id: Option<&str>,
    ) -> Result<ActionResolution, RulesError> {
        let (store, catalog, rng) = (&mut self.store, &self.catalog, &mut self.rng);
        Self::run(store, catalog, match_id, |state, balance| {
            actions::use_skill(state, balance, rng, player_id, skill_id, target_id)
        })
    }

    pub fn play_card(
        &mut self,
        match_id: &str,
        player_id: &str,
        card_id: &str,
        target_id: Option<&str>,
    ) -> Result<ActionResolution, RulesError> {
        let (store, catalog, rng) = (&mut self.store, &self.catalog, &mut self.rng);
        Self::run(store, catalog, match_id, |state, balance| {
            actions::play_card(state, balance, rng, player_id, card_id, target_id)
        })
    }

    pub fn match_state(&self, match_id: &str) -> Option<&MatchState> {
        self.store.get(match_id)
    }

    pub fn remove_match(&mut self, match_id: &str) -> Option<MatchState> {
        self.store.remove(match_id)
    }

    /// Merges a partial update into one player (external collaborator
    /// hook, e.g. a display-name change from the lobby).
    pub fn update_player(&mut self, match_id: &str, player_id: &str, patch: PlayerPatch) -> bool {
        self.store.update_player(match_id, player_id, patch)
    }

    /// Snapshot hook: the stored state as JSON.
    pub fn snapshot_json(&self, match_id: &str) -> Result<String, RulesError> {
        let state = self.store.get(match_id).ok_or(RulesError::MatchNotFound {
            match_id: match_id.to_string(),
        })?;
        serde_json::to_string(state).map_err(|error| RulesError::Serialization {
            message: error.to_string(),
        })
    }

    /// Restore hook: parses a snapshot and stores it under its own match
    /// id, replacing any state already held for that id.
    pub fn restore_json(&mut self, json: &str) -> Result<MatchState, RulesError> {
        let state: MatchState =
            serde_json::from_str(json).map_err(|error| RulesError::Serialization {
                message: error.to_string(),
            })?;
        self.catalog.balance(&state.balance_version)?;
        let snapshot = state.clone();
        self.store.set(state);
        Ok(snapshot)
    }

    fn run<F>(
        store: &mut MatchStore,
        catalog: &Catalog,
        match_id: &str,
        op: F,
    ) -> Result<ActionResolution, RulesError>
    where
        F: FnOnce(&mut MatchState, &BalanceSet) -> Result<Vec<MatchEvent>, RulesError>,
    {
        let state = store.get_mut(match_id).ok_or(RulesError::MatchNotFound {
            match_id: match_id.to_string(),
        })?;
        let balance = catalog.balance(&state.balance_version)?;
        let events = op(state, balance)?;
        for event in &events {
            state.record_event(event.clone());
        }
        Ok(ActionResolution {
            state: state.clone(),
            outcome: state.outcome.clone(),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<LobbyPlayer> {
        vec![
            LobbyPlayer {
                id: "alice".into(),
                display_name: "Alice".into(),
                character: Some("maga".into()),
                ready: true,
            },
            LobbyPlayer {
                id: "bob".into(),
                display_name: "Bob".into(),
                character: Some("guerrero".into()),
                ready: true,
            },
        ]
    }

    #[test]
    fn full_turn_cycle_through_the_facade() {
        let mut engine = MatchEngine::with_seed(Catalog::default_ruleset(), 11);
        engine
            .create_match("m1", roster(), SetupMode::Select, None)
            .expect("create should succeed");

        let started = engine.start_match("m1").expect("start should succeed");
        assert_eq!(started.state.phase, MatchPhase::Playing);
        // maga (speed 5) outpaces guerrero (speed 3).
        assert_eq!(started.state.turn_order[0], "alice");

        engine.start_turn("m1").expect("alice's start phase");
        let attack = engine
            .perform_attack("m1", "alice", "bob")
            .expect("attack should resolve");
        assert!(!attack.finished());
        assert_eq!(attack.state.player("bob").unwrap().hp, 27, "maga hits for 3");

        engine.end_turn("m1").expect("alice ends");
        let state = engine.match_state("m1").expect("match exists");
        assert_eq!(state.current_player_id().unwrap(), "bob");
        assert_eq!(state.turn_phase, TurnPhase::Start);
    }

    #[test]
    fn operations_on_unknown_matches_are_rejected() {
        let mut engine = MatchEngine::with_default_ruleset();
        let error = engine
            .perform_attack("nope", "alice", "bob")
            .expect_err("match does not exist");
        assert_eq!(
            error,
            RulesError::MatchNotFound {
                match_id: "nope".into()
            }
        );
    }

    #[test]
    fn duplicate_match_ids_and_rosters_are_rejected() {
        let mut engine = MatchEngine::with_default_ruleset();
        engine
            .create_match("m1", roster(), SetupMode::Select, None)
            .expect("first create succeeds");

        let error = engine
            .create_match("m1", roster(), SetupMode::Select, None)
            .expect_err("second create collides");
        assert_eq!(
            error,
            RulesError::MatchAlreadyExists {
                match_id: "m1".into()
            }
        );

        let mut twins = roster();
        twins[1].id = "alice".into();
        let error = engine
            .create_match("m2", twins, SetupMode::Select, None)
            .expect_err("duplicate player ids collide");
        assert_eq!(
            error,
            RulesError::DuplicatePlayer {
                player_id: "alice".into()
            }
        );
    }

    #[test]
    fn snapshot_and_restore_round_trip_the_stored_state() {
        let mut engine = MatchEngine::with_seed(Catalog::default_ruleset(), 7);
        engine
            .create_match("m1", roster(), SetupMode::Select, None)
            .expect("create should succeed");
        engine.start_match("m1").expect("start should succeed");

        let json = engine.snapshot_json("m1").expect("snapshot succeeds");
        let before = engine.match_state("m1").unwrap().clone();

        engine.remove_match("m1");
        let restored = engine.restore_json(&json).expect("restore succeeds");

        assert_eq!(restored, before);
        assert_eq!(engine.match_state("m1"), Some(&before));
    }

    #[test]
    fn restored_snapshots_with_unknown_turn_entries_fail_cleanly() {
        let mut engine = MatchEngine::with_default_ruleset();
        let mut state = MatchState::new("m1", "1");
        state.phase = MatchPhase::Playing;
        state.turn_phase = TurnPhase::Start;
        state.turn_order = vec!["ghost".into()];
        let json = serde_json::to_string(&state).expect("state serializes");
        engine.restore_json(&json).expect("restore succeeds");

        let error = engine
            .start_turn("m1")
            .expect_err("ghost is not in the roster");
        assert_eq!(
            error,
            RulesError::PlayerNotFound {
                player_id: "ghost".into()
            }
        );
    }

    #[test]
    fn unknown_balance_versions_are_rejected_at_create() {
        let mut engine = MatchEngine::with_default_ruleset();
        let error = engine
            .create_match("m1", roster(), SetupMode::Select, Some("99"))
            .expect_err("version 99 is not seeded");
        assert!(matches!(error, RulesError::Catalog { .. }));
    }

    #[test]
    fn event_log_accumulates_across_operations() {
        let mut engine = MatchEngine::with_seed(Catalog::default_ruleset(), 3);
        engine
            .create_match("m1", roster(), SetupMode::Select, None)
            .expect("create should succeed");
        let started = engine.start_match("m1").expect("start should succeed");
        let logged = engine.match_state("m1").unwrap().event_log.len();
        assert_eq!(logged, started.events.len());

        let turn = engine.start_turn("m1").expect("start turn");
        assert_eq!(
            engine.match_state("m1").unwrap().event_log.len(),
            logged + turn.events.len()
        );
    }
}
