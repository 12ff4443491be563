//! Squadron block placement between the skirmish and campaign unit stores
//!
//! The game does not deduplicate spawned squadrons across the two stores, so
//! a unit whose block exists in both spawns its roster twice. Exactly one
//! store owns the block: the skirmish store for units built directly on a
//! `Template_` basis, the campaign store otherwise. The other copy is deleted.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::patcher::DocumentSet;
use crate::report::DiffEntry;
use crate::spec::{GameMode, SquadronBlock, SquadronEntry, TechLevel, UnitIdentity, MAX_TECH_LEVEL};
use std::collections::BTreeSet;
use std::fmt;

/// Tag holding the delay between squadron spawns
pub const DELAY_TAG: &str = "Spawned_Squadron_Delay_Seconds";

const STARTING_PREFIX: &str = "Starting_Spawned_Units_Tech_";
const RESERVE_PREFIX: &str = "Reserve_Spawned_Units_Tech_";

/// Tech levels used when a wildcard roster meets a unit without any roster tags
const SKIRMISH_DEFAULT_LEVELS: &[u8] = &[0];
const CAMPAIGN_DEFAULT_LEVELS: &[u8] = &[1, 2, 4];

/// One of the two unit stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Skirmish,
    Campaign,
}

impl Store {
    fn default_levels(&self) -> &'static [u8] {
        match self {
            Store::Skirmish => SKIRMISH_DEFAULT_LEVELS,
            Store::Campaign => CAMPAIGN_DEFAULT_LEVELS,
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Skirmish => write!(f, "skirmish store"),
            Store::Campaign => write!(f, "campaign store"),
        }
    }
}

/// File ids of the two stores; either may be unmanaged
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFiles<'a> {
    pub skirmish: Option<&'a str>,
    pub campaign: Option<&'a str>,
}

impl<'a> StoreFiles<'a> {
    fn file(&self, store: Store) -> Option<&'a str> {
        match store {
            Store::Skirmish => self.skirmish,
            Store::Campaign => self.campaign,
        }
    }
}

/// Where a unit's squadron block goes and where it must not be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub owner: Store,
    /// Unit name in the owning store
    pub owner_unit: String,
    /// Store and unit name to delete the block from
    pub cleared: Option<(Store, String)>,
}

/// Decide the owning store for a unit
pub fn decide(identity: &UnitIdentity, mode: GameMode) -> Result<Placement> {
    let (owner, cleared) = match mode {
        GameMode::Campaign => (Store::Campaign, None),
        GameMode::Skirmish if identity.is_template_based() => (Store::Skirmish, Some(Store::Campaign)),
        GameMode::Skirmish => (Store::Campaign, Some(Store::Skirmish)),
    };
    let unit_for = |store: Store| match store {
        Store::Skirmish => identity.skirmish_unit.clone(),
        Store::Campaign => identity.campaign_unit.clone(),
    };

    let owner_unit = unit_for(owner).ok_or_else(|| {
        Error::Config(format!(
            "unit '{}' needs a {} name to place squadrons",
            identity.name,
            match owner {
                Store::Skirmish => "base_unit",
                Store::Campaign => "campaign_unit",
            }
        ))
    })?;
    let cleared = cleared.and_then(|store| unit_for(store).map(|unit| (store, unit)));

    Ok(Placement {
        owner,
        owner_unit,
        cleared,
    })
}

/// True for roster and delay tags, including the legacy `Tech_tech_N` spelling
pub fn is_squadron_tag(tag: &str) -> bool {
    if tag.eq_ignore_ascii_case(DELAY_TAG) {
        return true;
    }
    roster_level(tag).is_some()
}

/// Tech level encoded in a roster tag name
fn roster_level(tag: &str) -> Option<u8> {
    let lower = tag.to_ascii_lowercase();
    let rest = [STARTING_PREFIX, RESERVE_PREFIX]
        .iter()
        .find_map(|prefix| lower.strip_prefix(&prefix.to_ascii_lowercase()))?;
    let digits = rest.strip_prefix("tech_").unwrap_or(rest);
    digits.parse().ok().filter(|l| *l <= MAX_TECH_LEVEL)
}

/// Tech levels the unit's current roster tags use
fn current_levels(doc: &Document, unit: &str) -> BTreeSet<u8> {
    doc.find_entity(unit)
        .map(|el| el.children.iter().filter_map(|c| roster_level(&c.name)).collect())
        .unwrap_or_default()
}

/// Delete the unit's squadron block; an absent unit or block is a no-op
pub fn clear_block(doc: &mut Document, unit: &str) -> Result<Vec<DiffEntry>> {
    if doc.find_entity(unit).is_none() {
        return Ok(Vec::new());
    }
    let file_id = doc.file_id().to_string();
    let removed = doc.remove_children(unit, is_squadron_tag)?;
    Ok(removed
        .into_iter()
        .map(|(tag, text)| DiffEntry {
            file_id: file_id.clone(),
            entity: unit.to_string(),
            attribute: tag,
            old: Some(text),
            new: None,
        })
        .collect())
}

/// Expand a roster map to concrete levels
///
/// Explicit levels always apply; a wildcard fills every level in `existing`
/// (or the store defaults when the unit has none) not listed explicitly.
fn expand<'a>(
    roster: &'a std::collections::BTreeMap<TechLevel, Vec<SquadronEntry>>,
    existing: &BTreeSet<u8>,
    store: Store,
) -> Vec<(u8, &'a [SquadronEntry])> {
    let mut levels: BTreeSet<u8> = roster
        .keys()
        .filter_map(|k| match k {
            TechLevel::Level(l) => Some(*l),
            TechLevel::All => None,
        })
        .collect();
    if roster.contains_key(&TechLevel::All) {
        if existing.is_empty() {
            levels.extend(store.default_levels());
        } else {
            levels.extend(existing);
        }
    }
    levels
        .into_iter()
        .filter_map(|level| {
            roster
                .get(&TechLevel::Level(level))
                .or_else(|| roster.get(&TechLevel::All))
                .map(|entries| (level, entries.as_slice()))
        })
        .collect()
}

/// Replace the unit's squadron block with `block`
pub fn write_block(doc: &mut Document, unit: &str, block: &SquadronBlock, store: Store) -> Result<Vec<DiffEntry>> {
    if doc.find_entity(unit).is_none() {
        return Err(Error::UnitNotFound {
            unit: unit.to_string(),
            file_id: doc.file_id().to_string(),
        });
    }
    let existing = current_levels(doc, unit);
    let mut changes = clear_block(doc, unit)?;
    let file_id = doc.file_id().to_string();

    let mut tags: Vec<(String, String)> = Vec::new();
    if let Some(delay) = block.delay_seconds {
        tags.push((DELAY_TAG.to_string(), format_delay(delay)));
    }
    for (prefix, roster) in [(STARTING_PREFIX, &block.starting), (RESERVE_PREFIX, &block.reserve)] {
        for (level, entries) in expand(roster, &existing, store) {
            for entry in entries {
                tags.push((format!("{prefix}{level}"), format!("{}, {}", entry.kind, entry.count)));
            }
        }
    }

    for (tag, value) in tags {
        doc.insert_child(unit, &tag, &value)?;
        changes.push(DiffEntry {
            file_id: file_id.clone(),
            entity: unit.to_string(),
            attribute: tag,
            old: None,
            new: Some(value),
        });
    }
    Ok(changes)
}

fn format_delay(delay: f64) -> String {
    if delay.fract() == 0.0 {
        format!("{}", delay as i64)
    } else {
        format!("{delay}")
    }
}

/// Place the unit's squadron block in its owning store and delete it from the other
///
/// Removed-then-rewritten tags with identical content are dropped from the
/// returned changes, so an already correct placement reports nothing.
pub fn resolve(
    docs: &mut DocumentSet,
    stores: StoreFiles<'_>,
    identity: &UnitIdentity,
    block: &SquadronBlock,
    mode: GameMode,
) -> Result<Vec<DiffEntry>> {
    let placement = decide(identity, mode)?;
    tracing::debug!(
        unit = %identity.name,
        owner = %placement.owner,
        template_based = identity.is_template_based(),
        "placing squadron block"
    );

    let owner_file = stores
        .file(placement.owner)
        .ok_or_else(|| Error::NoFileForRole(placement.owner.to_string()))?;
    let owner_doc = docs.document_mut(owner_file)?;
    let mut changes = write_block(owner_doc, &placement.owner_unit, block, placement.owner)?;

    if let Some((store, unit)) = &placement.cleared {
        if let Some(file) = stores.file(*store) {
            if let Some(doc) = docs.get_mut(file) {
                changes.extend(clear_block(doc, unit)?);
            }
        }
    }

    Ok(net_changes(changes))
}

/// Cancel out removals that were re-added with the same value
fn net_changes(changes: Vec<DiffEntry>) -> Vec<DiffEntry> {
    let mut removed: Vec<DiffEntry> = Vec::new();
    let mut added: Vec<DiffEntry> = Vec::new();
    for change in changes {
        if change.new.is_none() {
            removed.push(change);
        } else if let Some(pos) = removed.iter().position(|r| {
            r.file_id == change.file_id
                && r.entity == change.entity
                && r.attribute == change.attribute
                && r.old == change.new
        }) {
            removed.remove(pos);
        } else {
            added.push(change);
        }
    }
    removed.extend(added);
    removed
}
