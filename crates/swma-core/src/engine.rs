//! Run orchestration
//!
//! A run restores every managed file from its pristine baseline, then applies
//! its stages to the restored content: attribute directives (with the tooltip
//! text that shows them), squadron placement and market fragments. Nothing a previous run wrote is ever read,
//! so running the same plan twice yields the same bytes as running it once.

use crate::baseline::{BaselineBackend, BaselineStore};
use crate::directive::Directive;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::market::{self, MarketSpec};
use crate::patcher::{self, AttributePath, DocumentSet};
use crate::placement::{self, StoreFiles};
use crate::report::{DiffEntry, Report, RunStatus};
use crate::resolver::{self, AttributeClass};
use crate::spec::{ChangeSpec, GameMode, ShipClass, UnitIdentity};
use crate::tooltip::{self, StatValues, TooltipRewriter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a managed file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// Shared `Template_` unit definitions
    Templates,
    Hardpoints,
    /// Skirmish unit store
    SkirmishUnits,
    /// Campaign unit store
    CampaignUnits,
    /// Market base table script
    MarketBase,
    /// Market event script
    MarketAdjustments,
    /// `KEY,text` tooltip and encyclopedia strings
    Text,
}

impl FileRole {
    /// Plain text rather than XML
    pub fn is_text(&self) -> bool {
        matches!(self, FileRole::MarketBase | FileRole::MarketAdjustments | FileRole::Text)
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileRole::Templates => "templates",
            FileRole::Hardpoints => "hardpoints",
            FileRole::SkirmishUnits => "skirmish_units",
            FileRole::CampaignUnits => "campaign_units",
            FileRole::MarketBase => "market_base",
            FileRole::MarketAdjustments => "market_adjustments",
            FileRole::Text => "text",
        };
        write!(f, "{name}")
    }
}

/// One row of the file table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Location of the file, relative to the data root
    pub path: PathBuf,
    pub role: FileRole,
    /// Ship class for class-specific template and hardpoint files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ShipClass>,
}

/// Explicit `file_id -> role` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTable(IndexMap<String, FileEntry>);

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_id: impl Into<String>, entry: FileEntry) {
        self.0.insert(file_id.into(), entry);
    }

    pub fn get(&self, file_id: &str) -> Option<&FileEntry> {
        self.0.get(file_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.0.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every file id with `role`, in table order
    pub fn with_role(&self, role: FileRole) -> impl Iterator<Item = &str> {
        self.iter().filter(move |(_, e)| e.role == role).map(|(id, _)| id)
    }

    /// File id for a role; a class-specific entry wins over a classless one
    pub fn find(&self, role: FileRole, class: Option<ShipClass>) -> Option<&str> {
        let mut fallback = None;
        for (id, entry) in self.iter().filter(|(_, e)| e.role == role) {
            match (class, entry.class) {
                (Some(wanted), Some(have)) if wanted == have => return Some(id),
                (_, None) | (None, _) => {
                    fallback.get_or_insert(id);
                }
                _ => {}
            }
        }
        fallback
    }
}

/// Everything one run is asked to do
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(default)]
    pub units: IndexMap<String, ChangeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketSpec>,
}

/// Current on-disk content of a managed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub file_id: String,
    pub content: Vec<u8>,
}

impl ManagedFile {
    pub fn new(file_id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_id: file_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Resolve everything but write neither baselines nor files
    pub preview: bool,
}

/// Result for one managed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file_id: String,
    pub role: FileRole,
    pub pristine: Vec<u8>,
    /// Content to write; the pristine content when the file failed
    pub patched: Vec<u8>,
    pub changes: Vec<DiffEntry>,
    /// Why the file could not be processed
    pub failed: Option<String>,
}

impl FileOutcome {
    pub fn is_modified(&self) -> bool {
        self.patched != self.pristine
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub files: Vec<FileOutcome>,
    pub report: Report,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.report.status()
    }

    pub fn file(&self, file_id: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.file_id == file_id)
    }
}

/// The patching engine over a baseline store and a file table
#[derive(Debug)]
pub struct Engine<B> {
    store: BaselineStore<B>,
    files: FileTable,
}

/// Per-run working state
struct Workspace {
    /// Restored documents, read for original values
    pristine: DocumentSet,
    /// Documents being patched
    docs: DocumentSet,
    /// Restored scripts and text files
    texts: HashMap<String, String>,
    /// Text content after this run's edits
    patched_texts: HashMap<String, String>,
    failed: HashMap<String, String>,
}

impl<B: BaselineBackend> Engine<B> {
    pub fn new(store: BaselineStore<B>, files: FileTable) -> Self {
        Self { store, files }
    }

    pub fn store(&self) -> &BaselineStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BaselineStore<B> {
        &mut self.store
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    /// Restore every file and apply `plan` to the restored content
    ///
    /// Baseline and file-table errors abort the run before anything is
    /// mutated. Per-unit and per-file problems are reported in the outcome.
    pub fn run(&mut self, inputs: &[ManagedFile], plan: &RunPlan, options: RunOptions) -> Result<RunOutcome> {
        for input in inputs {
            if self.files.get(&input.file_id).is_none() {
                return Err(Error::UnknownFile(input.file_id.clone()));
            }
        }

        let restored = self.restore_all(inputs, options)?;
        info!(files = restored.len(), preview = options.preview, "restored baselines");

        let mut report = Report::new(options.preview);
        let mut ws = self.load(&restored, &mut report);

        // Identities come from the restored skirmish store, before any stage runs
        let skirmish_file = self.loaded(&ws, FileRole::SkirmishUnits, None);
        let identities: Vec<UnitIdentity> = plan
            .units
            .iter()
            .map(|(name, spec)| UnitIdentity::resolve(name, spec, skirmish_file.and_then(|f| ws.pristine.get(f))))
            .collect();

        info!(units = plan.units.len(), "applying attribute directives");
        let stats: Vec<StatValues> = plan
            .units
            .iter()
            .map(|(name, spec)| self.apply_attributes(&mut ws, name, spec, plan.game_mode, &mut report))
            .collect();

        if stats.iter().any(|s| !s.is_empty()) && self.files.with_role(FileRole::Text).next().is_some() {
            info!("updating tooltip text");
            self.apply_tooltips(&mut ws, &identities, &stats, &mut report);
        }

        info!("placing squadron blocks");
        for ((name, spec), identity) in plan.units.iter().zip(&identities) {
            if let Some(block) = &spec.squadrons {
                let stores = StoreFiles {
                    skirmish: self.loaded(&ws, FileRole::SkirmishUnits, None),
                    campaign: self.loaded(&ws, FileRole::CampaignUnits, None),
                };
                match placement::resolve(&mut ws.docs, stores, identity, block, plan.game_mode) {
                    Ok(changes) => report.extend(changes),
                    Err(e) => report.warn(Some(name.as_str()), format!("{name}/squadrons"), &e),
                }
            }
        }

        if let Some(market) = plan.market.as_ref().filter(|m| m.enabled) {
            info!("rendering market fragments");
            self.apply_market(&mut ws, market, &mut report);
        }

        let files = restored
            .into_iter()
            .map(|input| self.outcome(&ws, input, &report))
            .collect();
        Ok(RunOutcome { files, report })
    }

    /// Pristine content per file, capturing baselines on first sight
    fn restore_all(&mut self, inputs: &[ManagedFile], options: RunOptions) -> Result<Vec<ManagedFile>> {
        let mut restored = Vec::with_capacity(inputs.len());
        for input in inputs {
            let pristine = if options.preview {
                self.store
                    .pristine(&input.file_id)?
                    .unwrap_or_else(|| input.content.clone())
            } else {
                self.store.ensure_baseline(&input.file_id, &input.content)?;
                self.store.snapshot_before_run(&input.file_id, &input.content)?;
                self.store.restore(&input.file_id)?
            };
            restored.push(ManagedFile::new(input.file_id.clone(), pristine));
        }
        Ok(restored)
    }

    /// Parse restored content; unparsable files are reported and left pristine
    fn load(&self, restored: &[ManagedFile], report: &mut Report) -> Workspace {
        let mut ws = Workspace {
            pristine: DocumentSet::new(),
            docs: DocumentSet::new(),
            texts: HashMap::new(),
            patched_texts: HashMap::new(),
            failed: HashMap::new(),
        };
        for file in restored {
            let Some(entry) = self.files.get(&file.file_id) else {
                continue;
            };
            let parsed = if entry.role.is_text() {
                String::from_utf8(file.content.clone())
                    .map(|text| {
                        ws.texts.insert(file.file_id.clone(), text);
                    })
                    .map_err(|_| Error::Encoding {
                        file_id: file.file_id.clone(),
                    })
            } else {
                Document::from_bytes(file.file_id.clone(), &file.content).map(|doc| {
                    ws.pristine.insert(doc.clone());
                    ws.docs.insert(doc);
                })
            };
            if let Err(e) = parsed {
                report.fail_stage(file.file_id.clone(), &e);
                ws.failed.insert(file.file_id.clone(), e.to_string());
            }
        }
        ws
    }

    /// File id for a role, only if it was loaded this run
    fn loaded<'a>(&'a self, ws: &Workspace, role: FileRole, class: Option<ShipClass>) -> Option<&'a str> {
        self.files
            .find(role, class)
            .filter(|id| ws.docs.contains(id) || ws.texts.contains_key(*id))
    }

    fn require(&self, ws: &Workspace, role: FileRole, class: Option<ShipClass>) -> Result<&str> {
        self.loaded(ws, role, class).ok_or_else(|| {
            let role = match class {
                Some(class) => format!("{role} ({class})"),
                None => role.to_string(),
            };
            Error::NoFileForRole(role)
        })
    }

    /// Template, hardpoint and cost directives of one unit
    ///
    /// Returns the new values of the template attributes tooltips show.
    fn apply_attributes(
        &self,
        ws: &mut Workspace,
        name: &str,
        spec: &ChangeSpec,
        mode: GameMode,
        report: &mut Report,
    ) -> StatValues {
        let class = spec.ship_class(name);
        let mut stats = StatValues::default();

        if !spec.template_changes.is_empty() {
            // Without a template the campaign unit carries the changes
            let target = match &spec.template {
                Some(template) => self
                    .require(ws, FileRole::Templates, Some(class))
                    .map(|file| (file, template.as_str())),
                None => self
                    .require(ws, FileRole::CampaignUnits, None)
                    .map(|file| (file, spec.campaign_unit.as_deref().unwrap_or(name))),
            };
            match target {
                Ok((file, entity)) => {
                    for (attribute, directive) in &spec.template_changes {
                        let path = AttributePath::new(entity, attribute.as_str());
                        let class = AttributeClass::for_attribute(attribute);
                        if let Some(value) = self.patch(ws, name, file, &path, class, *directive, report) {
                            stats.record(attribute, value);
                        }
                    }
                }
                Err(e) => report.warn(Some(name), format!("{name}/template_changes"), &e),
            }
        }

        if !spec.hardpoints.is_empty() {
            match self.require(ws, FileRole::Hardpoints, Some(class)) {
                Ok(file) => {
                    let prefix = spec.hardpoint_prefix(name);
                    let hardpoints = hardpoints_matching(&ws.pristine, file, prefix);
                    if hardpoints.is_empty() {
                        let e = Error::UnitNotFound {
                            unit: format!("hardpoints matching '{prefix}'"),
                            file_id: file.to_string(),
                        };
                        report.warn(Some(name), format!("{name}/hardpoints"), &e);
                    }
                    for (adjustment, directive) in &spec.hardpoints {
                        for tag in adjustment.target_tags() {
                            // Engines, shield generators and hangars carry no fire tags
                            let paths: Vec<AttributePath> = hardpoints
                                .iter()
                                .map(|hardpoint| AttributePath::new(hardpoint.as_str(), *tag))
                                .filter(|path| patcher::read_attribute(&ws.pristine, file, path).is_ok())
                                .collect();
                            if paths.is_empty() && !hardpoints.is_empty() {
                                let e = Error::AttributeNotFound {
                                    file_id: file.to_string(),
                                    entity: format!("hardpoints matching '{prefix}'"),
                                    attribute: tag.to_string(),
                                };
                                report.warn(Some(name), format!("{name}/hardpoints"), &e);
                            }
                            for path in &paths {
                                self.patch(ws, name, file, path, adjustment.class(), *directive, report);
                            }
                        }
                    }
                }
                Err(e) => report.warn(Some(name), format!("{name}/hardpoints"), &e),
            }
        }

        if !spec.cost_changes.is_empty() {
            if mode == GameMode::Campaign {
                debug!(unit = name, "campaign mode, skipping cost changes");
            } else {
                match self.require(ws, FileRole::SkirmishUnits, None) {
                    Ok(file) => {
                        let entity = spec.base_unit.as_deref().unwrap_or(name);
                        for (attribute, directive) in &spec.cost_changes {
                            let path = AttributePath::new(entity, attribute.as_str());
                            self.patch(ws, name, file, &path, AttributeClass::Integer, *directive, report);
                        }
                    }
                    Err(e) => report.warn(Some(name), format!("{name}/cost_changes"), &e),
                }
            }
        }
        stats
    }

    /// Resolve one directive against the pristine value and write it
    ///
    /// Returns the resolved value when the write succeeded.
    #[allow(clippy::too_many_arguments)]
    fn patch(
        &self,
        ws: &mut Workspace,
        unit: &str,
        file_id: &str,
        path: &AttributePath,
        class: AttributeClass,
        directive: Directive,
        report: &mut Report,
    ) -> Option<f64> {
        let result = patcher::read_attribute(&ws.pristine, file_id, path).and_then(|original| {
            let value = resolver::parse_number(&original.raw, &path.entity, &original.tag)?;
            let resolved = resolver::resolve(class, value, directive)?;
            let text = resolver::format_like(class, resolved, &original.raw);
            patcher::apply(&mut ws.docs, file_id, path, &text).map(|change| (change, resolved))
        });
        match result {
            Ok((change, resolved)) => {
                debug!(
                    unit,
                    path = %change.path(),
                    old = change.old.as_deref().unwrap_or(""),
                    new = change.new.as_deref().unwrap_or(""),
                    "applied {directive}"
                );
                report.record(change);
                Some(resolved)
            }
            Err(e) => {
                report.warn(Some(unit), format!("{file_id}:{path}"), &e);
                None
            }
        }
    }

    /// Rewrite the stat lines named in each changed unit's encyclopedia text
    fn apply_tooltips(&self, ws: &mut Workspace, identities: &[UnitIdentity], stats: &[StatValues], report: &mut Report) {
        let rewriter = match TooltipRewriter::new() {
            Ok(rewriter) => rewriter,
            Err(e) => {
                report.fail_stage("tooltips", &e);
                return;
            }
        };
        let text_files: Vec<&str> = self
            .files
            .with_role(FileRole::Text)
            .filter(|id| ws.texts.contains_key(*id))
            .collect();
        let stores: Vec<&str> = [FileRole::CampaignUnits, FileRole::SkirmishUnits]
            .into_iter()
            .filter_map(|role| self.loaded(ws, role, None))
            .collect();

        for (identity, values) in identities.iter().zip(stats).filter(|(_, v)| !v.is_empty()) {
            let units = [
                Some(identity.campaign_unit.as_deref().unwrap_or(&identity.name)),
                identity.skirmish_unit.as_deref(),
            ];
            let mut keys: Vec<String> = Vec::new();
            for store in &stores {
                let Some(doc) = ws.pristine.get(store) else {
                    continue;
                };
                for unit in units.iter().flatten() {
                    for key in tooltip::encyclopedia_keys(doc, unit) {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }

            for key in keys.iter().filter(|k| rewriter.is_stat_key(k)) {
                let current = |id: &str| ws.patched_texts.get(id).or_else(|| ws.texts.get(id));
                let Some(file) = text_files
                    .iter()
                    .copied()
                    .find(|&id| current(id).is_some_and(|text| tooltip::defines_key(text, key)))
                else {
                    debug!(unit = %identity.name, key = %key, "no text file defines key");
                    continue;
                };
                let Some(edit) = current(file).and_then(|text| rewriter.update_entry(text, key, values)) else {
                    continue;
                };
                debug!(unit = %identity.name, key = %key, new = %edit.new, "updated tooltip");
                ws.patched_texts.insert(file.to_string(), edit.content);
                report.record(DiffEntry {
                    file_id: file.to_string(),
                    entity: key.clone(),
                    attribute: "text".to_string(),
                    old: Some(edit.old),
                    new: Some(edit.new),
                });
            }
        }
    }

    /// Render the market and append the fragments to the restored scripts
    fn apply_market(&self, ws: &mut Workspace, market: &MarketSpec, report: &mut Report) {
        let rendered = match market.render() {
            Ok(rendered) => rendered,
            Err(e) => {
                report.fail_stage("market", &e);
                return;
            }
        };
        let states = match market::apply_events(&market.ships, &market.events) {
            Ok(states) => states,
            Err(e) => {
                report.fail_stage("market", &e);
                return;
            }
        };

        let targets = [
            (FileRole::MarketBase, rendered.base_table),
            (FileRole::MarketAdjustments, rendered.adjustments_table),
        ];
        for (role, fragment) in targets {
            let file = match self.require(ws, role, None) {
                Ok(file) => file,
                Err(e) => {
                    report.fail_stage("market", &e);
                    continue;
                }
            };
            let Some(pristine) = ws.texts.get(file) else {
                continue;
            };
            ws.patched_texts
                .insert(file.to_string(), market::splice_into(pristine, &fragment));

            match role {
                FileRole::MarketBase => {
                    for (ship, entry) in &market.ships {
                        report.record(DiffEntry {
                            file_id: file.to_string(),
                            entity: ship.clone(),
                            attribute: "chance".to_string(),
                            old: None,
                            new: Some(entry.probability.to_string()),
                        });
                    }
                }
                _ => {
                    for event in &market.events {
                        report.record(DiffEntry {
                            file_id: file.to_string(),
                            entity: event.name.clone(),
                            attribute: "event".to_string(),
                            old: None,
                            new: Some(format!(
                                "{} adjustments, {} lock changes, {} requirements",
                                event.adjustments.len(),
                                event.locks.len() + event.unlocks.len(),
                                event.requirements.len()
                            )),
                        });
                    }
                    for (ship, state) in &states {
                        debug!(ship = %ship, chance = state.probability, locked = state.locked, "market state after events");
                    }
                }
            }
        }
    }

    fn outcome(&self, ws: &Workspace, restored: ManagedFile, report: &Report) -> FileOutcome {
        let ManagedFile { file_id, content } = restored;
        let role = self
            .files
            .get(&file_id)
            .map(|e| e.role)
            .unwrap_or(FileRole::Templates);
        let patched = if let Some(doc) = ws.docs.get(&file_id) {
            doc.source().as_bytes().to_vec()
        } else if let Some(script) = ws.patched_texts.get(&file_id) {
            script.as_bytes().to_vec()
        } else {
            content.clone()
        };
        FileOutcome {
            changes: report.changes_for(&file_id).cloned().collect(),
            failed: ws.failed.get(&file_id).cloned(),
            file_id,
            role,
            pristine: content,
            patched,
        }
    }

    /// Pristine content of every file `plan` touches, or only the files `unit` touches
    ///
    /// No directives are applied; writing the returned content undoes all
    /// patches in those files.
    pub fn reset(&self, plan: &RunPlan, unit: Option<&str>) -> Result<Vec<ManagedFile>> {
        let ids: Vec<&str> = match unit {
            None => self.files.ids().collect(),
            Some(unit) => {
                let spec = plan.units.get(unit).ok_or_else(|| Error::UnitNotFound {
                    unit: unit.to_string(),
                    file_id: "configuration".to_string(),
                })?;
                self.files_touched(unit, spec, plan.game_mode)
            }
        };

        let mut restored = Vec::with_capacity(ids.len());
        for id in ids {
            restored.push(ManagedFile::new(id, self.store.restore(id)?));
        }
        info!(files = restored.len(), unit = unit.unwrap_or("*"), "reset to pristine");
        Ok(restored)
    }

    fn files_touched(&self, name: &str, spec: &ChangeSpec, mode: GameMode) -> Vec<&str> {
        let class = Some(spec.ship_class(name));
        let mut roles = Vec::new();
        if !spec.template_changes.is_empty() {
            if spec.template.is_some() {
                roles.push((FileRole::Templates, class));
            } else {
                roles.push((FileRole::CampaignUnits, None));
            }
        }
        if !spec.hardpoints.is_empty() {
            roles.push((FileRole::Hardpoints, class));
        }
        if !spec.cost_changes.is_empty() && mode == GameMode::Skirmish {
            roles.push((FileRole::SkirmishUnits, None));
        }
        if spec.squadrons.is_some() {
            roles.push((FileRole::SkirmishUnits, None));
            roles.push((FileRole::CampaignUnits, None));
        }

        let mut ids: Vec<&str> = Vec::new();
        if spec.template_changes.keys().any(|a| tooltip::is_tooltip_attribute(a)) {
            ids.extend(self.files.with_role(FileRole::Text));
        }
        for (role, class) in roles {
            if let Some(id) = self.files.find(role, class) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Discard baselines and history and capture `current` as the new pristine content
    pub fn rebaseline(&mut self, current: &[ManagedFile]) -> Result<()> {
        for file in current {
            if self.files.get(&file.file_id).is_none() {
                return Err(Error::UnknownFile(file.file_id.clone()));
            }
        }
        for file in current {
            self.store.full_reset(&file.file_id)?;
            self.store.ensure_baseline(&file.file_id, &file.content)?;
        }
        Ok(())
    }
}

/// Names of `HardPoint` entities whose name contains `prefix`, ignoring case
fn hardpoints_matching(docs: &DocumentSet, file_id: &str, prefix: &str) -> Vec<String> {
    let Some(doc) = docs.get(file_id) else {
        return Vec::new();
    };
    let prefix = prefix.to_ascii_lowercase();
    doc.root()
        .descendants()
        .into_iter()
        .filter(|el| el.name.eq_ignore_ascii_case("HardPoint"))
        .filter_map(|el| el.entity_name())
        .filter(|name| name.to_ascii_lowercase().contains(&prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MemoryBackend;
    use crate::resolver::HardpointAdjustment;

    const TEMPLATES: &str = r#"<?xml version="1.0"?>
<SpaceUnits>
	<SpaceUnit Name="Template_Venator">
		<Shield_Points>1000</Shield_Points>
		<Tactical_Health>2000</Tactical_Health>
	</SpaceUnit>
</SpaceUnits>
"#;

    const HARDPOINTS: &str = r#"<?xml version="1.0"?>
<HardPoints>
	<HardPoint Name="HP_Venator_Turbolaser_L">
		<Fire_Min_Recharge_Seconds>4.0</Fire_Min_Recharge_Seconds>
		<Fire_Max_Recharge_Seconds>5.0</Fire_Max_Recharge_Seconds>
		<Fire_Pulse_Count>10</Fire_Pulse_Count>
		<Fire_Pulse_Delay_Seconds>0.2</Fire_Pulse_Delay_Seconds>
	</HardPoint>
	<HardPoint Name="HP_Acclamator_Laser">
		<Fire_Min_Recharge_Seconds>3.0</Fire_Min_Recharge_Seconds>
	</HardPoint>
</HardPoints>
"#;

    fn table() -> FileTable {
        let mut files = FileTable::new();
        let entry = |path: &str, role, class| FileEntry {
            path: PathBuf::from(path),
            role,
            class,
        };
        files.insert("frigate_templates", entry("templates.xml", FileRole::Templates, Some(ShipClass::Frigate)));
        files.insert("frigate_hardpoints", entry("hardpoints.xml", FileRole::Hardpoints, Some(ShipClass::Frigate)));
        files
    }

    fn inputs() -> Vec<ManagedFile> {
        vec![
            ManagedFile::new("frigate_templates", TEMPLATES),
            ManagedFile::new("frigate_hardpoints", HARDPOINTS),
        ]
    }

    fn venator_plan() -> RunPlan {
        let mut spec = ChangeSpec {
            template: Some("Template_Venator".into()),
            ..Default::default()
        };
        spec.template_changes.insert("Shield_Points".into(), Directive::Percent(30.0));
        spec.hardpoints
            .insert(HardpointAdjustment::FireRateIncrease, Directive::Percent(100.0));
        spec.hardpoints
            .insert(HardpointAdjustment::DamageIncrease, Directive::Percent(30.0));
        let mut plan = RunPlan::default();
        plan.units.insert("Venator".into(), spec);
        plan
    }

    #[test]
    fn test_find_prefers_matching_class() {
        let mut files = table();
        files.insert(
            "capital_templates",
            FileEntry {
                path: PathBuf::from("capital.xml"),
                role: FileRole::Templates,
                class: Some(ShipClass::Capital),
            },
        );
        assert_eq!(files.find(FileRole::Templates, Some(ShipClass::Capital)), Some("capital_templates"));
        assert_eq!(files.find(FileRole::Templates, Some(ShipClass::Frigate)), Some("frigate_templates"));
        assert_eq!(files.find(FileRole::SkirmishUnits, None), None);
    }

    #[test]
    fn test_run_applies_directives_from_pristine() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        let plan = venator_plan();

        let first = engine.run(&inputs(), &plan, RunOptions::default()).unwrap();
        assert_eq!(first.status(), RunStatus::Success);
        let templates = String::from_utf8(first.file("frigate_templates").unwrap().patched.clone()).unwrap();
        assert!(templates.contains("<Shield_Points>1300</Shield_Points>"));
        let hardpoints = String::from_utf8(first.file("frigate_hardpoints").unwrap().patched.clone()).unwrap();
        assert!(hardpoints.contains("<Fire_Min_Recharge_Seconds>2.0</Fire_Min_Recharge_Seconds>"));
        assert!(hardpoints.contains("<Fire_Max_Recharge_Seconds>2.5</Fire_Max_Recharge_Seconds>"));
        assert!(hardpoints.contains("<Fire_Pulse_Count>13</Fire_Pulse_Count>"));
        // Other ships' hardpoints are not selected
        assert!(hardpoints.contains("<Fire_Min_Recharge_Seconds>3.0</Fire_Min_Recharge_Seconds>"));

        // Feed the patched output back in, as it would be on disk
        let on_disk: Vec<ManagedFile> = first
            .files
            .iter()
            .map(|f| ManagedFile::new(f.file_id.clone(), f.patched.clone()))
            .collect();
        let second = engine.run(&on_disk, &plan, RunOptions::default()).unwrap();
        for (a, b) in first.files.iter().zip(&second.files) {
            assert_eq!(a.patched, b.patched);
        }
    }

    #[test]
    fn test_preview_writes_no_baseline() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        let outcome = engine
            .run(&inputs(), &venator_plan(), RunOptions { preview: true })
            .unwrap();
        assert!(!outcome.report.applied.is_empty());
        assert_eq!(outcome.status(), RunStatus::NothingChanged { warnings: 0 });
        assert!(engine.store().file_ids().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_file_aborts_before_baseline() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        let mut files = inputs();
        files.push(ManagedFile::new("stray", "<X/>"));
        let err = engine.run(&files, &RunPlan::default(), RunOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownFile(_)));
        assert!(engine.store().file_ids().unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_file_left_pristine() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        let files = vec![
            ManagedFile::new("frigate_templates", TEMPLATES),
            ManagedFile::new("frigate_hardpoints", "<HardPoints><HardPoint>"),
        ];
        let outcome = engine.run(&files, &venator_plan(), RunOptions::default()).unwrap();
        let broken = outcome.file("frigate_hardpoints").unwrap();
        assert!(broken.failed.is_some());
        assert!(!broken.is_modified());
        assert!(outcome.file("frigate_templates").unwrap().is_modified());
        assert!(matches!(outcome.status(), RunStatus::PartialSuccess { .. }));
    }

    #[test]
    fn test_reset_single_unit() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        let mut plan = venator_plan();
        plan.units["Venator"].hardpoints.clear();
        engine.run(&inputs(), &plan, RunOptions::default()).unwrap();

        let restored = engine.reset(&plan, Some("Venator")).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].file_id, "frigate_templates");
        assert_eq!(restored[0].content, TEMPLATES.as_bytes());

        let err = engine.reset(&plan, Some("Nobody")).unwrap_err();
        assert!(matches!(err, Error::UnitNotFound { .. }));
    }

    #[test]
    fn test_rebaseline_captures_current_content() {
        let mut engine = Engine::new(BaselineStore::new(MemoryBackend::new()), table());
        engine.run(&inputs(), &RunPlan::default(), RunOptions::default()).unwrap();

        let updated = TEMPLATES.replace("1000", "1200");
        engine
            .rebaseline(&[ManagedFile::new("frigate_templates", updated.clone())])
            .unwrap();
        assert_eq!(engine.store().restore("frigate_templates").unwrap(), updated.as_bytes());
        assert!(engine.store().history("frigate_templates").unwrap().is_empty());
    }
}
