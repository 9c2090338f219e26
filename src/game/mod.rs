//! Core rules: state, catalog, deck, effects, turn machine and actions.

pub mod actions;
pub mod catalog;
pub mod deck;
pub mod effects;
pub mod state;
pub mod store;
pub mod turns;

pub use actions::{perform_attack, play_card, use_skill, RulesError};
pub use catalog::{
    BalanceSet, CardDef, Catalog, CatalogError, CharacterDef, DeckEntry, EffectGrant,
    EffectParams, MatchRules, SkillDef, TargetKind, DEFAULT_VERSION,
};
pub use effects::UpkeepOutcome;
pub use state::{
    CardId, CharacterId, DamageSource, EffectKind, MatchEvent, MatchId, MatchOutcome, MatchPhase,
    MatchState, PlayerId, PlayerState, SetupMode, SkillId, StatusEffect, TurnPhase,
};
pub use store::{MatchStore, PlayerPatch};
pub use turns::{end_turn, setup_match, start_turn, LobbyPlayer};
