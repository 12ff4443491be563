//! Declarative configuration and its files on disk
//!
//! A project is one configuration file. Its `data_root` and `backup_dir` are
//! resolved relative to the directory the configuration lives in.

use crate::baseline::{validate_file_id, BaselineStore, DirectoryBackend};
use crate::engine::{Engine, FileRole, FileTable, ManagedFile, RunOutcome, RunPlan};
use crate::error::{Error, Result};
use crate::market::MarketSpec;
use crate::spec::{ChangeSpec, GameMode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Starter configuration written by `swma init-config`
pub const STARTER_CONFIG: &str = r#"# swma configuration
game_mode: skirmish
data_root: Data
backup_dir: .swma

files:
  frigate_templates:
    path: XML/Units_Space_Templates_Frigates.xml
    role: templates
    class: frigate
  capital_templates:
    path: XML/Units_Space_Templates_Capitals.xml
    role: templates
    class: capital
  frigate_hardpoints:
    path: XML/HardPoints_Frigates.xml
    role: hardpoints
    class: frigate
  capital_hardpoints:
    path: XML/HardPoints_Capitals.xml
    role: hardpoints
    class: capital
  skirmish_units:
    path: XML/Units_Space_Skirmish.xml
    role: skirmish_units
  campaign_units:
    path: XML/Units_Space_Empire.xml
    role: campaign_units
  market_options:
    path: Scripts/Library/ShipMarketOptions.lua
    role: market_base
  market_adjustments:
    path: Scripts/Library/ShipMarketAdjustmentsLibrary.lua
    role: market_adjustments
  tooltips:
    path: Text/Tooltips_English.txt
    role: text

units:
  Venator:
    template: Template_Venator
    base_unit: Skirmish_Venator
    campaign_unit: Venator_Star_Destroyer
    template_changes:
      shield_points: "+10%"
      tactical_health: "+10%"
    hardpoints:
      fire_rate_increase: "+25%"
      damage_increase: "+20%"
    squadrons:
      delay_seconds: 8
      starting:
        all:
          - { type: Clone_ARC_170_Squadron, count: 2 }
      reserve:
        all:
          - { type: Clone_ARC_170_Squadron, count: 4 }

market:
  enabled: false
  ships:
    Venator_Star_Destroyer: { chance: 40, order: 1 }
  events:
    - name: KDY_CONTRACT
      adjustments: { Venator_Star_Destroyer: 10 }
"#;

fn default_data_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".swma")
}

/// The whole declarative configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game_mode: GameMode,
    /// Directory file paths are relative to
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Directory holding pristine baselines and run history
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    pub files: FileTable,
    #[serde(default)]
    pub units: IndexMap<String, ChangeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketSpec>,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

impl Config {
    /// Load from YAML, or JSON for a `.json` extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        if is_json(path.as_ref()) {
            serde_json::from_str(&content).map_err(Error::Json)
        } else {
            serde_yaml::from_str(&content).map_err(Error::Yaml)
        }
    }

    /// Save in the format the extension selects
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = if is_json(path.as_ref()) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path.as_ref(), content).map_err(|source| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    /// Check the file table and cross references
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(Error::Config("no managed files configured".into()));
        }

        let mut slots = HashSet::new();
        for (id, entry) in self.files.iter() {
            validate_file_id(id)?;
            // Text entries are searched in order, so any number may be configured
            if entry.role != FileRole::Text && !slots.insert((entry.role, entry.class)) {
                return Err(Error::Config(match entry.class {
                    Some(class) => format!("more than one {} file for class {class}", entry.role),
                    None => format!("more than one {} file", entry.role),
                }));
            }
        }

        if let Some(market) = self.market.as_ref().filter(|m| m.enabled) {
            for role in [FileRole::MarketBase, FileRole::MarketAdjustments] {
                if self.files.find(role, None).is_none() {
                    return Err(Error::Config(format!("market is enabled but no {role} file is configured")));
                }
            }
            if market.ships.is_empty() {
                warn!("market is enabled without any ships");
            }
        }

        for (name, spec) in &self.units {
            if spec.is_empty() {
                warn!(unit = %name, "unit has no directives");
            }
            if spec.squadrons.is_some() && spec.base_unit.is_none() && spec.campaign_unit.is_none() {
                return Err(Error::Config(format!(
                    "unit '{name}' has squadrons but neither base_unit nor campaign_unit"
                )));
            }
        }
        Ok(())
    }

    pub fn plan(&self) -> RunPlan {
        RunPlan {
            game_mode: self.game_mode,
            units: self.units.clone(),
            market: self.market.clone(),
        }
    }
}

/// A loaded configuration anchored at its directory
#[derive(Debug, Clone)]
pub struct Project {
    config: Config,
    base_dir: PathBuf,
}

impl Project {
    /// Load and validate the configuration at `config_path`
    pub fn open<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config = Config::load(config_path.as_ref())?;
        config.validate()?;
        let base_dir = config_path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self { config, base_dir })
    }

    pub fn from_config(config: Config, base_dir: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            base_dir: base_dir.into(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_root(&self) -> PathBuf {
        self.base_dir.join(&self.config.data_root)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.backup_dir)
    }

    pub fn file_path(&self, file_id: &str) -> Result<PathBuf> {
        self.config
            .files
            .get(file_id)
            .map(|entry| self.data_root().join(&entry.path))
            .ok_or_else(|| Error::UnknownFile(file_id.to_string()))
    }

    /// Engine over the project's baseline directory
    pub fn engine(&self) -> Result<Engine<DirectoryBackend>> {
        let backend = DirectoryBackend::open(self.backup_dir())?;
        Ok(Engine::new(BaselineStore::new(backend), self.config.files.clone()))
    }

    /// Current content of every managed file
    pub fn read_managed_files(&self) -> Result<Vec<ManagedFile>> {
        self.config
            .files
            .ids()
            .map(|id| self.read_file(id))
            .collect()
    }

    pub fn read_file(&self, file_id: &str) -> Result<ManagedFile> {
        let path = self.file_path(file_id)?;
        let content = fs::read(&path).map_err(|source| Error::FileRead { path, source })?;
        Ok(ManagedFile::new(file_id, content))
    }

    /// Write files whose content differs from what is on disk; returns how many were written
    pub fn write_files(&self, files: &[ManagedFile]) -> Result<usize> {
        let mut written = 0;
        for file in files {
            let path = self.file_path(&file.file_id)?;
            if fs::read(&path).is_ok_and(|current| current == file.content) {
                continue;
            }
            fs::write(&path, &file.content).map_err(|source| Error::FileWrite {
                path: path.clone(),
                source,
            })?;
            info!(file_id = %file.file_id, path = %path.display(), "wrote file");
            written += 1;
        }
        Ok(written)
    }

    /// Write the patched content of a run; previews write nothing
    pub fn write_outcome(&self, outcome: &RunOutcome) -> Result<usize> {
        if outcome.report.preview {
            return Ok(0);
        }
        let files: Vec<ManagedFile> = outcome
            .files
            .iter()
            .map(|f| ManagedFile::new(f.file_id.clone(), f.patched.clone()))
            .collect();
        self.write_files(&files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ShipClass;
    use tempfile::TempDir;

    #[test]
    fn test_starter_config_is_valid() {
        let config: Config = serde_yaml::from_str(STARTER_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.game_mode, GameMode::Skirmish);
        assert_eq!(config.files.len(), 9);
        assert_eq!(
            config.files.find(FileRole::Hardpoints, Some(ShipClass::Capital)),
            Some("capital_hardpoints")
        );
        assert!(config.units["Venator"].squadrons.is_some());
    }

    #[test]
    fn test_several_text_files_allowed() {
        let yaml = r#"
files:
  tooltips: { path: Text/Tooltips.txt, role: text }
  encyclopedia: { path: Text/Encyclopedia.txt, role: text }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let ids: Vec<&str> = config.files.with_role(FileRole::Text).collect();
        assert_eq!(ids, vec!["tooltips", "encyclopedia"]);
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let yaml = r#"
files:
  a: { path: a.xml, role: skirmish_units }
  b: { path: b.xml, role: skirmish_units }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_enabled_market_needs_script_files() {
        let yaml = r#"
files:
  a: { path: a.xml, role: skirmish_units }
market:
  ships: {}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("market_base"));
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let config: Config = serde_yaml::from_str(STARTER_CONFIG).unwrap();
        let path = dir.path().join("swma.json");
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_paths_relative_to_config() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Data/XML")).unwrap();
        fs::write(dir.path().join("Data/XML/units.xml"), "<Units/>").unwrap();
        fs::write(
            dir.path().join("swma.yaml"),
            "data_root: Data\nfiles:\n  units: { path: XML/units.xml, role: campaign_units }\n",
        )
        .unwrap();

        let project = Project::open(dir.path().join("swma.yaml")).unwrap();
        assert_eq!(project.backup_dir(), dir.path().join(".swma"));
        let files = project.read_managed_files().unwrap();
        assert_eq!(files[0].content, b"<Units/>");

        // Unchanged content is not rewritten
        assert_eq!(project.write_files(&files).unwrap(), 0);
        let changed = ManagedFile::new("units", "<Units></Units>");
        assert_eq!(project.write_files(&[changed]).unwrap(), 1);
    }
}
