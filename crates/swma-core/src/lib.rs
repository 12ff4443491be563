//! swma-core: Idempotent patching of Empire at War game data
//!
//! This library provides functionality to:
//! - Capture write-once pristine baselines of every managed game file
//! - Resolve percentage and absolute directives against pristine values
//! - Patch unit, template and hardpoint XML without touching shared bases
//! - Place squadron blocks in exactly one of the skirmish and campaign stores
//! - Keep tooltip and encyclopedia text in line with changed stats
//! - Render the ship market and its events as Lua fragments

pub mod baseline;
pub mod directive;
pub mod document;
pub mod engine;
pub mod error;
pub mod market;
pub mod patcher;
pub mod placement;
pub mod project;
pub mod report;
pub mod resolver;
pub mod spec;
pub mod tooltip;

pub use baseline::{BaselineBackend, BaselineRecord, BaselineStore, DirectoryBackend, MemoryBackend, Snapshot};
pub use directive::Directive;
pub use document::{Document, Element};
pub use engine::{Engine, FileEntry, FileOutcome, FileRole, FileTable, ManagedFile, RunOptions, RunOutcome, RunPlan};
pub use error::{Error, Result};
pub use market::{MarketEvent, MarketShipEntry, MarketSpec, MarketState, MarketTarget, RenderedMarket};
pub use patcher::{AttributePath, AttributeValue, DocumentSet, Slot};
pub use placement::{Placement, Store};
pub use project::{Config, Project, STARTER_CONFIG};
pub use report::{DiffEntry, Issue, Report, RunStatus, Severity};
pub use resolver::{AttributeClass, HardpointAdjustment};
pub use spec::{ChangeSpec, GameMode, ShipClass, SquadronBlock, SquadronEntry, TechLevel, UnitIdentity};
pub use tooltip::{StatValues, TextEdit, TooltipRewriter};
