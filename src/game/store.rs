use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::state::{CardId, MatchId, MatchState, SkillId, StatusEffect};

/// Partial update for a single player; only present fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<CardId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<StatusEffect>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldowns: Option<BTreeMap<SkillId, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

/// In-memory store of active matches, keyed by match id.
///
/// One logical writer per match id at a time; callers serialize at the
/// boundary. No operation ever reads across matches.
#[derive(Debug, Default)]
pub struct MatchStore {
    matches: HashMap<MatchId, MatchState>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new match. Returns `false` if the id is already taken.
    pub fn create(&mut self, state: MatchState) -> bool {
        if self.matches.contains_key(&state.match_id) {
            return false;
        }
        self.matches.insert(state.match_id.clone(), state);
        true
    }

    pub fn get(&self, match_id: &str) -> Option<&MatchState> {
        self.matches.get(match_id)
    }

    pub fn get_mut(&mut self, match_id: &str) -> Option<&mut MatchState> {
        self.matches.get_mut(match_id)
    }

    /// Inserts or replaces the state for its own match id.
    pub fn set(&mut self, state: MatchState) {
        self.matches.insert(state.match_id.clone(), state);
    }

    /// Merges `patch` into the named player without touching the rest of
    /// the match. Returns `false` if the match or player is absent.
    pub fn update_player(&mut self, match_id: &str, player_id: &str, patch: PlayerPatch) -> bool {
        let Some(state) = self.matches.get_mut(match_id) else {
            return false;
        };
        let Some(player) = state.player_mut(player_id) else {
            return false;
        };

        if let Some(display_name) = patch.display_name {
            player.display_name = display_name;
        }
        if let Some(hp) = patch.hp {
            player.hp = hp;
        }
        if let Some(shield) = patch.shield {
            player.shield = shield;
        }
        if let Some(hand) = patch.hand {
            player.hand = hand;
        }
        if let Some(effects) = patch.effects {
            player.effects = effects;
        }
        if let Some(cooldowns) = patch.cooldowns {
            player.cooldowns = cooldowns;
        }
        if let Some(ready) = patch.ready {
            player.ready = ready;
        }
        true
    }

    pub fn remove(&mut self, match_id: &str) -> Option<MatchState> {
        self.matches.remove(match_id)
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.matches.contains_key(match_id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerState;

    fn match_with_player() -> MatchState {
        let mut state = MatchState::new("m1", "1");
        state.players.push(PlayerState {
            id: "alice".into(),
            display_name: "Alice".into(),
            character_id: "maga".into(),
            hp: 20,
            max_hp: 24,
            shield: 1,
            hand: vec!["pocion-vital".into()],
            effects: Vec::new(),
            cooldowns: BTreeMap::new(),
            ready: true,
        });
        state
    }

    #[test]
    fn create_rejects_duplicate_match_ids() {
        let mut store = MatchStore::new();
        assert!(store.create(match_with_player()));
        assert!(!store.create(match_with_player()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_player_merges_only_present_fields() {
        let mut store = MatchStore::new();
        store.create(match_with_player());

        let patch = PlayerPatch {
            hp: Some(12),
            shield: Some(0),
            ..PlayerPatch::default()
        };
        assert!(store.update_player("m1", "alice", patch));

        let player = store
            .get("m1")
            .and_then(|state| state.player("alice"))
            .expect("player should exist");
        assert_eq!(player.hp, 12);
        assert_eq!(player.shield, 0);
        // Untouched fields keep their values.
        assert_eq!(player.display_name, "Alice");
        assert_eq!(player.hand, vec!["pocion-vital".to_string()]);
    }

    #[test]
    fn update_player_reports_missing_match_or_player() {
        let mut store = MatchStore::new();
        store.create(match_with_player());

        assert!(!store.update_player("nope", "alice", PlayerPatch::default()));
        assert!(!store.update_player("m1", "bob", PlayerPatch::default()));
    }

    #[test]
    fn remove_returns_the_stored_state() {
        let mut store = MatchStore::new();
        store.create(match_with_player());

        let removed = store.remove("m1").expect("match should be stored");
        assert_eq!(removed.match_id, "m1");
        assert!(store.is_empty());
    }
}
