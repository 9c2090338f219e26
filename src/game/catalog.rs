use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::state::{CardId, CharacterId, EffectKind, SkillId};

/// Fault raised when a live match references catalog data that does not
/// exist. Not expected with a correctly seeded catalog; aborts the single
/// operation and leaves match state untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no balance version '{version}' in the catalog")]
    UnknownBalanceVersion { version: String },
    #[error("character '{id}' not found in the catalog")]
    UnknownCharacter { id: CharacterId },
    #[error("card '{id}' not found in the catalog")]
    UnknownCard { id: CardId },
    #[error("skill '{id}' not found in the catalog")]
    UnknownSkill { id: SkillId },
}

/// Who an offensive or effect payload resolves against.
///
/// `Area` and `All` resolve identically (every living opponent); `Area` is
/// reserved for future positional targeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[serde(rename = "self")]
    SelfTarget,
    Single,
    All,
    Area,
}

/// A status effect granted by a card or skill on resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectGrant {
    pub kind: EffectKind,
    pub duration: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
}

/// Per-tag behavior knobs, one table per balance version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectParams {
    /// Damage applied at the owner's start of turn.
    #[serde(default)]
    pub per_turn_damage: i32,
    /// Cards discarded from the owner's hand at start of turn.
    #[serde(default)]
    pub discard_on_tick: u32,
    /// Actions removed from the owner's turn budget.
    #[serde(default)]
    pub action_penalty: u32,
    /// Percentage of incoming damage reflected back at the attacker.
    #[serde(default)]
    pub reflect_percent: u32,
    /// Whether reflection requires a die roll.
    #[serde(default)]
    pub roll_gated: bool,
    /// Minimum d6 roll for a gated reflection to fire.
    #[serde(default = "default_roll_threshold")]
    pub roll_threshold: u8,
    /// Whether the effect counts down at end of turn. Persistent tags are
    /// cleared by game events instead.
    #[serde(default = "default_decays")]
    pub decays: bool,
}

fn default_roll_threshold() -> u8 {
    4
}

fn default_decays() -> bool {
    true
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            per_turn_damage: 0,
            discard_on_tick: 0,
            action_penalty: 0,
            reflect_percent: 0,
            roll_gated: false,
            roll_threshold: default_roll_threshold(),
            decays: default_decays(),
        }
    }
}

/// One entry of a character's contribution to the shared deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckEntry {
    pub card_id: CardId,
    pub copies: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterDef {
    pub id: CharacterId,
    pub name: String,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    #[serde(default)]
    pub deck: Vec<DeckEntry>,
    #[serde(default)]
    pub skills: Vec<SkillId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDef {
    pub id: CardId,
    pub name: String,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub heal: i32,
    #[serde(default)]
    pub shield: i32,
    /// Reserved, not currently enforced.
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub effects: Vec<EffectGrant>,
    pub target: TargetKind,
    /// Rolls one d6 per living player; rolls above 3 become flat damage to
    /// every living opponent.
    #[serde(default)]
    pub dice_damage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillDef {
    pub id: SkillId,
    pub name: String,
    pub character_id: CharacterId,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub heal: i32,
    #[serde(default)]
    pub shield: i32,
    #[serde(default)]
    pub effects: Vec<EffectGrant>,
    pub target: TargetKind,
    #[serde(default)]
    pub cooldown: u32,
}

/// Knobs that apply to the match as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRules {
    pub actions_per_turn: u32,
    pub cards_per_turn: u32,
    pub starting_hand: u32,
    pub max_hand_size: usize,
}

/// One complete ruleset, selected per match by `balance_version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSet {
    pub characters: HashMap<CharacterId, CharacterDef>,
    pub cards: HashMap<CardId, CardDef>,
    pub skills: HashMap<SkillId, SkillDef>,
    pub effects: HashMap<EffectKind, EffectParams>,
    pub rules: MatchRules,
}

impl BalanceSet {
    pub fn character(&self, id: &str) -> Result<&CharacterDef, CatalogError> {
        self.characters
            .get(id)
            .ok_or_else(|| CatalogError::UnknownCharacter { id: id.to_string() })
    }

    pub fn card(&self, id: &str) -> Result<&CardDef, CatalogError> {
        self.cards
            .get(id)
            .ok_or_else(|| CatalogError::UnknownCard { id: id.to_string() })
    }

    pub fn skill(&self, id: &str) -> Result<&SkillDef, CatalogError> {
        self.skills
            .get(id)
            .ok_or_else(|| CatalogError::UnknownSkill { id: id.to_string() })
    }

    /// Effect tags without an entry are inert, not an error.
    pub fn effect_params(&self, kind: EffectKind) -> Option<&EffectParams> {
        self.effects.get(&kind)
    }
}

/// Read-only content catalog: named balance versions, one marked active for
/// new matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub versions: HashMap<String, BalanceSet>,
    pub active_version: String,
}

impl Catalog {
    pub fn new(active_version: impl Into<String>, versions: HashMap<String, BalanceSet>) -> Self {
        Self {
            versions,
            active_version: active_version.into(),
        }
    }

    /// Catalog containing only the built-in ruleset (version "1").
    pub fn default_ruleset() -> Self {
        let mut versions = HashMap::new();
        versions.insert(DEFAULT_VERSION.to_string(), DEFAULT_BALANCE.clone());
        Self::new(DEFAULT_VERSION, versions)
    }

    pub fn balance(&self, version: &str) -> Result<&BalanceSet, CatalogError> {
        self.versions
            .get(version)
            .ok_or_else(|| CatalogError::UnknownBalanceVersion {
                version: version.to_string(),
            })
    }

    pub fn active(&self) -> Result<&BalanceSet, CatalogError> {
        self.balance(&self.active_version)
    }
}

pub const DEFAULT_VERSION: &str = "1";

fn character(
    id: &str,
    name: &str,
    max_hp: i32,
    attack: i32,
    defense: i32,
    speed: i32,
    deck: &[(&str, u32)],
    skills: &[&str],
) -> CharacterDef {
    CharacterDef {
        id: id.into(),
        name: name.into(),
        max_hp,
        attack,
        defense,
        speed,
        deck: deck
            .iter()
            .map(|(card_id, copies)| DeckEntry {
                card_id: (*card_id).into(),
                copies: *copies,
            })
            .collect(),
        skills: skills.iter().map(|skill| (*skill).to_string()).collect(),
    }
}

fn grant(kind: EffectKind, duration: i32) -> EffectGrant {
    EffectGrant {
        kind,
        duration,
        value: None,
    }
}

fn card(id: &str, name: &str, damage: i32, heal: i32, shield: i32, target: TargetKind) -> CardDef {
    CardDef {
        id: id.into(),
        name: name.into(),
        damage,
        heal,
        shield,
        defense: 0,
        effects: Vec::new(),
        target,
        dice_damage: false,
    }
}

#[allow(clippy::too_many_arguments)]
fn skill(
    id: &str,
    name: &str,
    character_id: &str,
    damage: i32,
    heal: i32,
    shield: i32,
    target: TargetKind,
    cooldown: u32,
) -> SkillDef {
    SkillDef {
        id: id.into(),
        name: name.into(),
        character_id: character_id.into(),
        damage,
        heal,
        shield,
        effects: Vec::new(),
        target,
        cooldown,
    }
}

static DEFAULT_BALANCE: Lazy<BalanceSet> = Lazy::new(|| {
    let characters = [
        character(
            "guerrero",
            "Guerrero",
            30,
            5,
            3,
            3,
            &[("golpe-certero", 2), ("muro-de-piedra", 2), ("embate-furioso", 1)],
            &["tajo-brutal", "grito-de-guerra"],
        ),
        character(
            "maga",
            "Maga",
            24,
            3,
            2,
            5,
            &[("llama-persistente", 2), ("rayos-cosmicos", 1), ("pocion-vital", 2)],
            &["bola-de-fuego", "escarcha"],
        ),
        character(
            "picaro",
            "Pícaro",
            26,
            4,
            2,
            6,
            &[("golpe-certero", 2), ("red-paralizante", 2), ("pocion-vital", 1)],
            &["punalada", "humo-evasivo"],
        ),
        character(
            "clerigo",
            "Clérigo",
            28,
            3,
            3,
            4,
            &[("pocion-vital", 2), ("postura-reflejo", 2), ("muro-de-piedra", 1)],
            &["plegaria", "castigo-divino"],
        ),
    ]
    .into_iter()
    .map(|def| (def.id.clone(), def))
    .collect();

    let cards = [
        card("golpe-certero", "Golpe Certero", 4, 0, 0, TargetKind::Single),
        card("pocion-vital", "Poción Vital", 0, 5, 0, TargetKind::SelfTarget),
        CardDef {
            defense: 1,
            ..card("muro-de-piedra", "Muro de Piedra", 0, 0, 4, TargetKind::SelfTarget)
        },
        CardDef {
            effects: vec![grant(EffectKind::Burn, 2)],
            ..card("llama-persistente", "Llama Persistente", 1, 0, 0, TargetKind::Single)
        },
        CardDef {
            effects: vec![grant(EffectKind::Paralysis, 1)],
            ..card("red-paralizante", "Red Paralizante", 0, 0, 0, TargetKind::Single)
        },
        CardDef {
            effects: vec![grant(EffectKind::Counter, 2)],
            ..card("postura-reflejo", "Postura Reflejo", 0, 0, 0, TargetKind::SelfTarget)
        },
        CardDef {
            dice_damage: true,
            ..card("embate-furioso", "Embate Furioso", 0, 0, 0, TargetKind::All)
        },
        CardDef {
            dice_damage: true,
            ..card("rayos-cosmicos", "Rayos Cósmicos", 0, 0, 0, TargetKind::Area)
        },
    ]
    .into_iter()
    .map(|def| (def.id.clone(), def))
    .collect();

    let skills = [
        skill("tajo-brutal", "Tajo Brutal", "guerrero", 6, 0, 0, TargetKind::Single, 2),
        SkillDef {
            effects: vec![grant(EffectKind::PowerStrike, 2)],
            ..skill("grito-de-guerra", "Grito de Guerra", "guerrero", 0, 0, 3, TargetKind::SelfTarget, 3)
        },
        SkillDef {
            effects: vec![grant(EffectKind::Burn, 2)],
            ..skill("bola-de-fuego", "Bola de Fuego", "maga", 4, 0, 0, TargetKind::Single, 2)
        },
        SkillDef {
            effects: vec![grant(EffectKind::Freeze, 1)],
            ..skill("escarcha", "Escarcha", "maga", 2, 0, 0, TargetKind::Single, 3)
        },
        skill("punalada", "Puñalada", "picaro", 5, 0, 0, TargetKind::Single, 2),
        SkillDef {
            effects: vec![grant(EffectKind::Invisibility, 2)],
            ..skill("humo-evasivo", "Humo Evasivo", "picaro", 0, 0, 2, TargetKind::SelfTarget, 3)
        },
        skill("plegaria", "Plegaria", "clerigo", 0, 6, 0, TargetKind::SelfTarget, 2),
        skill("castigo-divino", "Castigo Divino", "clerigo", 3, 0, 0, TargetKind::All, 4),
    ]
    .into_iter()
    .map(|def| (def.id.clone(), def))
    .collect();

    let default = EffectParams::default;
    let effects = [
        (
            EffectKind::Burn,
            EffectParams { per_turn_damage: 2, discard_on_tick: 1, ..default() },
        ),
        (EffectKind::Paralysis, EffectParams { action_penalty: 1, ..default() }),
        (EffectKind::Freeze, EffectParams { action_penalty: 2, ..default() }),
        (EffectKind::Stun, EffectParams { action_penalty: 1, ..default() }),
        (EffectKind::ActionReduction, EffectParams { action_penalty: 1, ..default() }),
        (
            EffectKind::Counter,
            EffectParams { reflect_percent: 50, roll_gated: true, roll_threshold: 4, ..default() },
        ),
        (EffectKind::PhysicalResistance, EffectParams { decays: false, ..default() }),
        (EffectKind::PowerStrike, default()),
        (EffectKind::Invisibility, default()),
    ]
    .into_iter()
    .collect();

    BalanceSet {
        characters,
        cards,
        skills,
        effects,
        rules: MatchRules {
            actions_per_turn: 2,
            cards_per_turn: 1,
            starting_hand: 3,
            max_hand_size: 6,
        },
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_resolves_its_own_references() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().expect("active version should exist");

        for character in balance.characters.values() {
            for entry in &character.deck {
                balance
                    .card(&entry.card_id)
                    .expect("deck entry should reference a known card");
            }
            for skill_id in &character.skills {
                let skill = balance
                    .skill(skill_id)
                    .expect("skill list should reference a known skill");
                assert_eq!(skill.character_id, character.id);
            }
        }
    }

    #[test]
    fn dice_damage_cards_are_flagged() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().expect("active version should exist");

        assert!(balance.card("embate-furioso").unwrap().dice_damage);
        assert!(balance.card("rayos-cosmicos").unwrap().dice_damage);
        assert!(!balance.card("golpe-certero").unwrap().dice_damage);
    }

    #[test]
    fn unknown_balance_version_is_a_fault() {
        let catalog = Catalog::default_ruleset();
        let error = catalog.balance("99").expect_err("version 99 is not seeded");
        assert_eq!(
            error,
            CatalogError::UnknownBalanceVersion {
                version: "99".into()
            }
        );
    }

    #[test]
    fn effect_table_marks_physical_resistance_persistent() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().expect("active version should exist");

        let params = balance
            .effect_params(crate::game::EffectKind::PhysicalResistance)
            .expect("entry should exist");
        assert!(!params.decays);

        // Tags without entries are simply inert.
        assert!(balance
            .effect_params(crate::game::EffectKind::ActionLimit)
            .is_none());
    }
}
