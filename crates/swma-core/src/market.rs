//! Market script fragments
//!
//! Renders the ship market configuration into Lua assignment statements.
//! The fragments are appended to the restored market scripts, so every run
//! starts again from the pristine tables and later assignments override the
//! pristine entries.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Lowest market weight
pub const MIN_PROBABILITY: i32 = 0;
/// Highest market weight
pub const MAX_PROBABILITY: i32 = 100;

const FRAGMENT_HEADER: &str = "-- Generated by swma. Assignments below override the tables above.";

/// A ship's base market row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketShipEntry {
    /// Weight in the market draw
    #[serde(default, alias = "chance")]
    pub probability: i32,
    #[serde(default)]
    pub locked: bool,
    /// Display name; the ship id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable_name: Option<String>,
    #[serde(default)]
    pub requirement_text: String,
    #[serde(default = "default_order")]
    pub order: i32,
}

fn default_order() -> i32 {
    1
}

impl Default for MarketShipEntry {
    fn default() -> Self {
        Self {
            probability: 0,
            locked: false,
            readable_name: None,
            requirement_text: String::new(),
            order: default_order(),
        }
    }
}

/// A named set of market changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub name: String,
    /// Signed weight deltas
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub adjustments: IndexMap<String, i32>,
    /// `true` locks the ship
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub locks: IndexMap<String, bool>,
    /// `true` unlocks the ship
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub unlocks: IndexMap<String, bool>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub requirements: IndexMap<String, String>,
}

impl MarketEvent {
    /// Lock rows in emission order: locks, then unlocks as inverted lock flags
    fn lock_rows(&self) -> impl Iterator<Item = (&str, bool)> {
        self.locks
            .iter()
            .map(|(ship, locked)| (ship.as_str(), *locked))
            .chain(self.unlocks.iter().map(|(ship, unlocked)| (ship.as_str(), !*unlocked)))
    }

    fn ships(&self) -> impl Iterator<Item = &str> {
        self.adjustments
            .keys()
            .chain(self.locks.keys())
            .chain(self.unlocks.keys())
            .chain(self.requirements.keys())
            .map(String::as_str)
    }
}

/// Which faction, market and script tables the fragments address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTarget {
    pub faction: String,
    pub market: String,
    pub base_table: String,
    pub adjustments_table: String,
}

impl Default for MarketTarget {
    fn default() -> Self {
        Self {
            faction: default_faction(),
            market: default_market(),
            base_table: default_base_table(),
            adjustments_table: default_adjustments_table(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_faction() -> String {
    "EMPIRE".to_string()
}

fn default_market() -> String {
    "KDY_MARKET".to_string()
}

fn default_base_table() -> String {
    "ShipMarketOptions".to_string()
}

fn default_adjustments_table() -> String {
    "ShipMarketAdjustments".to_string()
}

/// Market section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSpec {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_faction")]
    pub faction: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_base_table")]
    pub base_table: String,
    #[serde(default = "default_adjustments_table")]
    pub adjustments_table: String,
    #[serde(default)]
    pub ships: IndexMap<String, MarketShipEntry>,
    #[serde(default)]
    pub events: Vec<MarketEvent>,
}

impl Default for MarketSpec {
    fn default() -> Self {
        let target = MarketTarget::default();
        Self {
            enabled: true,
            faction: target.faction,
            market: target.market,
            base_table: target.base_table,
            adjustments_table: target.adjustments_table,
            ships: IndexMap::new(),
            events: Vec::new(),
        }
    }
}

impl MarketSpec {
    pub fn target(&self) -> MarketTarget {
        MarketTarget {
            faction: self.faction.clone(),
            market: self.market.clone(),
            base_table: self.base_table.clone(),
            adjustments_table: self.adjustments_table.clone(),
        }
    }

    pub fn render(&self) -> Result<RenderedMarket> {
        render(&self.ships, &self.events, &self.target())
    }
}

/// A ship's market state after all events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketState {
    pub probability: i32,
    pub locked: bool,
    pub requirement_text: String,
}

/// The two generated fragments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMarket {
    pub base_table: String,
    pub adjustments_table: String,
}

/// Reject weights outside [0, 100] and events naming unknown ships
fn validate(base: &IndexMap<String, MarketShipEntry>, events: &[MarketEvent]) -> Result<()> {
    for (ship, entry) in base {
        if !(MIN_PROBABILITY..=MAX_PROBABILITY).contains(&entry.probability) {
            return Err(Error::InvalidProbability {
                ship: ship.clone(),
                value: entry.probability,
            });
        }
    }
    for event in events {
        if let Some(ship) = event.ships().find(|ship| !base.contains_key(*ship)) {
            return Err(Error::UnknownMarketShip {
                event: event.name.clone(),
                ship: ship.to_string(),
            });
        }
    }
    Ok(())
}

/// Run the events in declaration order, clamping each weight to [0, 100]
fn simulate(base: &IndexMap<String, MarketShipEntry>, events: &[MarketEvent]) -> IndexMap<String, MarketState> {
    let mut states: IndexMap<String, MarketState> = base
        .iter()
        .map(|(ship, entry)| {
            (
                ship.clone(),
                MarketState {
                    probability: entry.probability,
                    locked: entry.locked,
                    requirement_text: entry.requirement_text.clone(),
                },
            )
        })
        .collect();

    for event in events {
        for (ship, delta) in &event.adjustments {
            if let Some(state) = states.get_mut(ship) {
                state.probability = state
                    .probability
                    .saturating_add(*delta)
                    .clamp(MIN_PROBABILITY, MAX_PROBABILITY);
            }
        }
        for (ship, locked) in event.lock_rows() {
            if let Some(state) = states.get_mut(ship) {
                state.locked = locked;
            }
        }
        for (ship, text) in &event.requirements {
            if let Some(state) = states.get_mut(ship) {
                state.requirement_text = text.clone();
            }
        }
    }
    states
}

/// Final market state of every ship after applying `events` in order
pub fn apply_events(
    base: &IndexMap<String, MarketShipEntry>,
    events: &[MarketEvent],
) -> Result<IndexMap<String, MarketState>> {
    validate(base, events)?;
    Ok(simulate(base, events))
}

/// Render the base and adjustment fragments
///
/// Event deltas are emitted as declared; the game clamps weights when it
/// fires the events.
pub fn render(
    base: &IndexMap<String, MarketShipEntry>,
    events: &[MarketEvent],
    target: &MarketTarget,
) -> Result<RenderedMarket> {
    validate(base, events)?;

    let faction = lua_string(&target.faction);
    let market = lua_string(&target.market);

    let mut ships: Vec<(&String, &MarketShipEntry)> = base.iter().collect();
    ships.sort_by(|a, b| a.1.order.cmp(&b.1.order).then_with(|| a.0.cmp(b.0)));

    let mut base_table = String::new();
    write_base_table(&mut base_table, &target.base_table, &faction, &market, &ships)?;
    let mut adjustments_table = String::new();
    write_adjustments_table(&mut adjustments_table, &target.adjustments_table, &faction, &market, events)?;

    tracing::debug!(ships = base.len(), events = events.len(), "rendered market fragments");
    Ok(RenderedMarket {
        base_table,
        adjustments_table,
    })
}

fn write_base_table(
    out: &mut String,
    table: &str,
    faction: &str,
    market: &str,
    ships: &[(&String, &MarketShipEntry)],
) -> fmt::Result {
    writeln!(out, "{FRAGMENT_HEADER}")?;
    writeln!(out, "{table} = {table} or {{}}")?;
    writeln!(out, "{table}[{faction}] = {table}[{faction}] or {{}}")?;
    writeln!(out, "{table}[{faction}][{market}] = {table}[{faction}][{market}] or {{}}")?;
    for (ship, entry) in ships {
        let readable = entry.readable_name.as_deref().unwrap_or(ship);
        writeln!(out, "{table}[{faction}][{market}][{}] = {{", lua_string(ship))?;
        writeln!(out, "\tlocked = {},", entry.locked)?;
        writeln!(out, "\tgc_locked = false,")?;
        writeln!(out, "\tamount = 0,")?;
        writeln!(out, "\tchance = {},", entry.probability)?;
        writeln!(out, "\tperception_modifier = nil,")?;
        writeln!(out, "\tassociation = nil,")?;
        writeln!(out, "\treadable_name = {},", lua_string(readable))?;
        writeln!(out, "\ttext_requirement = {},", lua_string(&entry.requirement_text))?;
        writeln!(out, "\torder = {},", entry.order)?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn write_adjustments_table(
    out: &mut String,
    table: &str,
    faction: &str,
    market: &str,
    events: &[MarketEvent],
) -> fmt::Result {
    writeln!(out, "{FRAGMENT_HEADER}")?;
    writeln!(out, "{table} = {table} or {{}}")?;
    for event in events {
        writeln!(out, "{table}[{}] = {{", lua_string(&event.name))?;
        if !event.adjustments.is_empty() {
            writeln!(out, "\tadjustment_lists = {{")?;
            for (ship, delta) in &event.adjustments {
                writeln!(out, "\t\t{{{faction}, {market}, {}, {delta}}},", lua_string(ship))?;
            }
            writeln!(out, "\t}},")?;
        }
        let locks: Vec<(&str, bool)> = event.lock_rows().collect();
        if !locks.is_empty() {
            writeln!(out, "\tlock_lists = {{")?;
            for (ship, locked) in locks {
                writeln!(out, "\t\t{{{faction}, {market}, {}, {locked}}},", lua_string(ship))?;
            }
            writeln!(out, "\t}},")?;
        }
        if !event.requirements.is_empty() {
            writeln!(out, "\trequirement_lists = {{")?;
            for (ship, text) in &event.requirements {
                writeln!(out, "\t\t{{{faction}, {market}, {}, {}}},", lua_string(ship), lua_string(text))?;
            }
            writeln!(out, "\t}},")?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Append a fragment to the pristine script
pub fn splice_into(pristine: &str, fragment: &str) -> String {
    let mut out = String::with_capacity(pristine.len() + fragment.len() + 2);
    out.push_str(pristine);
    if !pristine.is_empty() && !pristine.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(fragment);
    out
}

/// Double-quoted Lua string literal
fn lua_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
