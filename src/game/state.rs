use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Match identifier, assigned by the lobby.
pub type MatchId = String;
/// Player identifier.
pub type PlayerId = String;
/// Character identifier from the content catalog.
pub type CharacterId = String;
/// Card identifier from the content catalog.
pub type CardId = String;
/// Skill identifier from the content catalog.
pub type SkillId = String;

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    Lobby,
    Setup,
    Playing,
    Finished,
}

impl Default for MatchPhase {
    fn default() -> Self {
        MatchPhase::Lobby
    }
}

/// Phase of the current player's turn while the match is `Playing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Start,
    Main,
    End,
}

impl Default for TurnPhase {
    fn default() -> Self {
        TurnPhase::Start
    }
}

/// How characters are assigned when the match starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SetupMode {
    Select,
    Random,
}

impl Default for SetupMode {
    fn default() -> Self {
        SetupMode::Select
    }
}

/// Status-effect tags. The effect-parameter table of the active balance
/// version decides what each tag actually does; unknown tags are inert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Burn,
    Paralysis,
    Freeze,
    PowerStrike,
    FireShield,
    Invisibility,
    ExtraAction,
    ActionReduction,
    PhysicalResistance,
    Counter,
    Stun,
    ActionLimit,
    Shield,
}

/// A status effect attached to a player.
///
/// `remaining_turns <= 0` together with a non-decaying catalog entry marks
/// the effect as persistent: it survives end-of-turn decay and is only
/// cleared by an explicit game event (an opponent being eliminated).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEffect {
    pub kind: EffectKind,
    pub remaining_turns: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
}

impl StatusEffect {
    pub fn new(kind: EffectKind, remaining_turns: i32) -> Self {
        Self {
            kind,
            remaining_turns,
            value: None,
        }
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = Some(value);
        self
    }
}

/// What produced a damage application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DamageSource {
    Attack,
    Skill,
    Card,
    Effect,
    Counter,
}

/// Why the match ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MatchOutcome {
    Winner { player_id: PlayerId },
    Draw,
}

/// One player's slice of the match state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub character_id: CharacterId,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub shield: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hand: Vec<CardId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<StatusEffect>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cooldowns: BTreeMap<SkillId, u32>,
    #[serde(default)]
    pub ready: bool,
}

impl PlayerState {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn find_card_in_hand_index(&self, card_id: &str) -> Option<usize> {
        self.hand.iter().position(|card| card == card_id)
    }

    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|effect| effect.kind == kind)
    }
}

/// Event stream emitted by every mutating operation and appended to the
/// match event log for caller telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MatchEvent {
    MatchStarted {
        turn_order: Vec<PlayerId>,
    },
    CardDrawn {
        player_id: PlayerId,
        card_id: CardId,
    },
    CardDiscarded {
        player_id: PlayerId,
        card_id: CardId,
    },
    DeckRecycled {
        recycled: usize,
    },
    CardPlayed {
        player_id: PlayerId,
        card_id: CardId,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_id: Option<PlayerId>,
    },
    SkillUsed {
        player_id: PlayerId,
        skill_id: SkillId,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_id: Option<PlayerId>,
    },
    AttackPerformed {
        attacker_id: PlayerId,
        target_id: PlayerId,
        damage: i32,
    },
    DiceRolled {
        player_id: PlayerId,
        roll: u8,
    },
    DamageResolved {
        target_id: PlayerId,
        source: DamageSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        attacker_id: Option<PlayerId>,
        amount: i32,
        shield_absorbed: i32,
        hp_damage: i32,
        #[serde(default, skip_serializing_if = "is_zero")]
        reflected: i32,
    },
    Healed {
        player_id: PlayerId,
        amount: i32,
    },
    ShieldGained {
        player_id: PlayerId,
        amount: i32,
    },
    EffectApplied {
        player_id: PlayerId,
        effect: StatusEffect,
    },
    EffectExpired {
        player_id: PlayerId,
        kind: EffectKind,
    },
    CooldownExpired {
        player_id: PlayerId,
        skill_id: SkillId,
    },
    TurnStarted {
        player_id: PlayerId,
        round: u32,
    },
    TurnEnded {
        player_id: PlayerId,
    },
    RoundAdvanced {
        round: u32,
    },
    PlayerEliminated {
        player_id: PlayerId,
    },
    MatchEnded {
        outcome: MatchOutcome,
    },
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Full mutable state of one match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchState {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    #[serde(default)]
    pub setup_mode: SetupMode,
    #[serde(default)]
    pub players: Vec<PlayerState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub turn_order: Vec<PlayerId>,
    #[serde(default)]
    pub current_player_index: usize,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub turn_phase: TurnPhase,
    #[serde(default)]
    pub actions_remaining: u32,
    #[serde(default)]
    pub actions_per_turn: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_draw: Vec<CardId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_discard: Vec<CardId>,
    pub balance_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<MatchEvent>,
}

impl MatchState {
    pub fn new(match_id: impl Into<MatchId>, balance_version: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            phase: MatchPhase::default(),
            setup_mode: SetupMode::default(),
            players: Vec::new(),
            turn_order: Vec::new(),
            current_player_index: 0,
            current_round: 0,
            turn_phase: TurnPhase::default(),
            actions_remaining: 0,
            actions_per_turn: 0,
            shared_draw: Vec::new(),
            shared_discard: Vec::new(),
            balance_version: balance_version.into(),
            outcome: None,
            event_log: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: MatchEvent) {
        self.event_log.push(event);
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn player_index(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    /// Id of the player whose turn it is. `None` before setup fixes the
    /// turn order.
    pub fn current_player_id(&self) -> Option<&PlayerId> {
        self.turn_order.get(self.current_player_index)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|player| player.is_alive())
    }

    pub fn living_count(&self) -> usize {
        self.living_players().count()
    }

    /// Living opponents of `player_id`, in roster (join) order.
    pub fn living_opponents(&self, player_id: &str) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|player| player.is_alive() && player.id != player_id)
            .map(|player| player.id.clone())
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Conserved card count: draw pile + discard pile + every hand.
    pub fn total_cards(&self) -> usize {
        self.shared_draw.len()
            + self.shared_discard.len()
            + self
                .players
                .iter()
                .map(|player| player.hand.len())
                .sum::<usize>()
    }

    /// Fixes the outcome and moves the match to `Finished`. The first
    /// declared outcome wins; later calls are ignored.
    pub fn declare_outcome(&mut self, outcome: MatchOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
            self.phase = MatchPhase::Finished;
        }
    }
}
