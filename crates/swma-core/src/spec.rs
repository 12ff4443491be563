//! Per-unit change requests and unit identity
//!
//! These types mirror the declarative configuration one-to-one. The engine
//! treats them as read-only input for a single run.

use crate::directive::Directive;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::resolver::HardpointAdjustment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag through which a unit declares the type it is a variant of
pub const BASIS_TAG: &str = "Variant_Of_Existing_Type";
/// Basis prefix that marks a unit as built on a shared template
pub const TEMPLATE_PREFIX: &str = "Template_";
/// Highest tech level the game data defines roster tags for
pub const MAX_TECH_LEVEL: u8 = 5;

/// Which game the run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Skirmish,
    Campaign,
}

/// Ship size class, selects the template and hardpoint files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipClass {
    Frigate,
    Capital,
}

impl ShipClass {
    const FRIGATE_KEYWORDS: &'static [&'static str] =
        &["acclamator", "venator", "victory", "frigate"];
    const CAPITAL_KEYWORDS: &'static [&'static str] = &[
        "star_destroyer",
        "tector",
        "secutor",
        "capital",
        "praetor",
        "procurator",
        "mandator",
        "maelstrom",
        "battlecruiser",
        "dreadnought",
        "imperator",
    ];

    /// Guess the class from a unit name, defaulting to frigate
    pub fn detect(unit_name: &str) -> Self {
        let lower = unit_name.to_ascii_lowercase();
        if Self::FRIGATE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            ShipClass::Frigate
        } else if Self::CAPITAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            ShipClass::Capital
        } else {
            ShipClass::Frigate
        }
    }
}

impl fmt::Display for ShipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipClass::Frigate => write!(f, "frigate"),
            ShipClass::Capital => write!(f, "capital"),
        }
    }
}

/// A unit's full declarative intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSpec {
    /// Template entity the unit is built on, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Unit name in the skirmish store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_unit: Option<String>,
    /// Unit name in the campaign store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_unit: Option<String>,
    /// Explicit ship class; detected from the unit name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_class: Option<ShipClass>,
    /// Substring selecting this unit's hardpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardpoint_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub template_changes: IndexMap<String, Directive>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub hardpoints: IndexMap<HardpointAdjustment, Directive>,
    /// Skirmish purchase cost changes
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub cost_changes: IndexMap<String, Directive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squadrons: Option<SquadronBlock>,
}

impl ChangeSpec {
    pub fn ship_class(&self, unit_name: &str) -> ShipClass {
        self.ship_class
            .unwrap_or_else(|| ShipClass::detect(unit_name))
    }

    pub fn hardpoint_prefix<'a>(&'a self, unit_name: &'a str) -> &'a str {
        self.hardpoint_prefix
            .as_deref()
            .unwrap_or_else(|| unit_name.split('_').next().unwrap_or(unit_name))
    }

    pub fn is_empty(&self) -> bool {
        self.template_changes.is_empty()
            && self.hardpoints.is_empty()
            && self.cost_changes.is_empty()
            && self.squadrons.is_none()
    }
}

/// Generated squadron configuration for one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadronBlock {
    /// Seconds between squadron spawns
    #[serde(default, alias = "spawn_delay", skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,
    /// Squadrons present when the unit spawns, per tech level
    #[serde(default)]
    pub starting: BTreeMap<TechLevel, Vec<SquadronEntry>>,
    /// Replacement squadrons, per tech level
    #[serde(default)]
    pub reserve: BTreeMap<TechLevel, Vec<SquadronEntry>>,
}

/// One squadron type and how many of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadronEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
}

/// Roster key: a concrete tech level or every level the unit already uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTechLevel", into = "RawTechLevel")]
pub enum TechLevel {
    Level(u8),
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTechLevel {
    Number(u64),
    Text(String),
}

impl TryFrom<RawTechLevel> for TechLevel {
    type Error = Error;

    fn try_from(raw: RawTechLevel) -> Result<Self> {
        let level = match raw {
            RawTechLevel::Number(n) => n,
            RawTechLevel::Text(s) => match s.trim() {
                "all" | "*" => return Ok(TechLevel::All),
                other => other
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid tech level '{s}'")))?,
            },
        };
        u8::try_from(level)
            .ok()
            .filter(|l| *l <= MAX_TECH_LEVEL)
            .map(TechLevel::Level)
            .ok_or_else(|| Error::Config(format!("tech level {level} exceeds {MAX_TECH_LEVEL}")))
    }
}

impl From<TechLevel> for RawTechLevel {
    fn from(level: TechLevel) -> Self {
        match level {
            TechLevel::Level(l) => RawTechLevel::Number(u64::from(l)),
            TechLevel::All => RawTechLevel::Text("all".to_string()),
        }
    }
}

/// A unit's identity as the game data defines it at the start of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitIdentity {
    pub name: String,
    /// `Variant_Of_Existing_Type` of the skirmish unit
    pub basis_reference: Option<String>,
    pub skirmish_unit: Option<String>,
    pub campaign_unit: Option<String>,
}

impl UnitIdentity {
    /// Read the basis reference from the (restored) skirmish store
    pub fn resolve(name: &str, spec: &ChangeSpec, skirmish_store: Option<&Document>) -> Self {
        let basis_reference = match (skirmish_store, spec.base_unit.as_deref()) {
            (Some(doc), Some(unit)) => doc
                .find_entity(unit)
                .and_then(|el| el.child(BASIS_TAG))
                .map(|basis| doc.text_of(basis).to_string())
                .filter(|basis| !basis.is_empty()),
            _ => None,
        };
        Self {
            name: name.to_string(),
            basis_reference,
            skirmish_unit: spec.base_unit.clone(),
            campaign_unit: spec.campaign_unit.clone(),
        }
    }

    pub fn is_template_based(&self) -> bool {
        self.basis_reference
            .as_deref()
            .is_some_and(|basis| basis.starts_with(TEMPLATE_PREFIX))
    }
}
