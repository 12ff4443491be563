use std::fs;
use std::path::PathBuf;

use swma_core::{
    BaselineStore, ChangeSpec, Directive, Engine, FileEntry, FileRole, FileTable, GameMode,
    HardpointAdjustment, ManagedFile, MarketEvent, MarketShipEntry, MarketSpec, MemoryBackend,
    Project, RunOptions, RunOutcome, RunPlan, RunStatus, ShipClass, SquadronBlock, SquadronEntry,
    TechLevel,
};
use tempfile::TempDir;

const TEMPLATES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SpaceUnits>
	<!-- Shared frigate templates -->
	<SpaceUnit Name="Template_Acclamator">
		<Shield_Points>1000</Shield_Points>
		<Tactical_Health>1500</Tactical_Health>
	</SpaceUnit>
	<SpaceUnit Name="Template_Venator">
		<Shield_Points>2000</Shield_Points>
		<Tactical_Health>3000</Tactical_Health>
	</SpaceUnit>
</SpaceUnits>
"#;

const HARDPOINTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<HardPoints>
	<HardPoint Name="HP_Acclamator_Turbolaser">
		<Fire_Min_Recharge_Seconds>4.0</Fire_Min_Recharge_Seconds>
		<Fire_Max_Recharge_Seconds>6.0</Fire_Max_Recharge_Seconds>
		<Fire_Pulse_Count>10</Fire_Pulse_Count>
		<Fire_Pulse_Delay_Seconds>0.2</Fire_Pulse_Delay_Seconds>
	</HardPoint>
	<HardPoint Name="HP_Acclamator_Engine">
		<Type>HARD_POINT_ENGINE</Type>
		<Health>400</Health>
	</HardPoint>
	<HardPoint Name="HP_Acclamator_Shield_Generator">
		<Type>HARD_POINT_SHIELD_GENERATOR</Type>
		<Health>300</Health>
	</HardPoint>
	<HardPoint Name="HP_Venator_Turbolaser">
		<Fire_Min_Recharge_Seconds>3.0</Fire_Min_Recharge_Seconds>
		<Fire_Max_Recharge_Seconds>4.0</Fire_Max_Recharge_Seconds>
	</HardPoint>
</HardPoints>
"#;

const SKIRMISH: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SkirmishUnits>
	<SkirmishSpaceUnit Name="Skirmish_Acclamator">
		<Variant_Of_Existing_Type>Template_Acclamator</Variant_Of_Existing_Type>
		<Build_Cost_Credits>1200</Build_Cost_Credits>
		<Starting_Spawned_Units_Tech_0>Clone_Z95_Squadron, 1</Starting_Spawned_Units_Tech_0>
	</SkirmishSpaceUnit>
	<SkirmishSpaceUnit Name="Skirmish_Venator">
		<Variant_Of_Existing_Type>Venator_Star_Destroyer</Variant_Of_Existing_Type>
		<Build_Cost_Credits>3000</Build_Cost_Credits>
		<Starting_Spawned_Units_Tech_0>Clone_Z95_Squadron, 2</Starting_Spawned_Units_Tech_0>
	</SkirmishSpaceUnit>
</SkirmishUnits>
"#;

const CAMPAIGN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SpaceUnits>
	<SpaceUnit Name="Acclamator_Assault_Ship">
		<Variant_Of_Existing_Type>Template_Acclamator</Variant_Of_Existing_Type>
		<Encyclopedia_Text>TEXT_UNIT_ACCLAMATOR TEXT_TOOLTIP_ACCLAMATOR_SHIELD</Encyclopedia_Text>
		<Starting_Spawned_Units_Tech_1>Clone_Z95_Squadron, 1</Starting_Spawned_Units_Tech_1>
	</SpaceUnit>
	<SpaceUnit Name="Venator_Star_Destroyer">
		<Variant_Of_Existing_Type>Template_Venator</Variant_Of_Existing_Type>
		<Encyclopedia_Text>TEXT_UNIT_VENATOR, TEXT_STATBLOCK_VENATOR_BASE, TEXT_TOOLTIP_VENATOR_HULL</Encyclopedia_Text>
		<Starting_Spawned_Units_Tech_2>Clone_Z95_Squadron, 2</Starting_Spawned_Units_Tech_2>
	</SpaceUnit>
</SpaceUnits>
"#;

const MARKET_BASE: &str = "ShipMarketOptions = {}\n";
const MARKET_ADJUSTMENTS: &str = "ShipMarketAdjustments = {}\n";

const TOOLTIPS: &str = "TEXT_UNIT_ACCLAMATOR,Acclamator Assault Ship\r\n\
TEXT_TOOLTIP_ACCLAMATOR_SHIELD,Shields: 1000 / [9/R] (Frigate)\r\n\
TEXT_UNIT_VENATOR,Venator Star Destroyer\r\n\
TEXT_STATBLOCK_VENATOR_BASE,Health: 3000 | Shields: 2000\r\n\
TEXT_TOOLTIP_VENATOR_HULL,Hull: 3000 (Frigate)\r\n";

fn file_table() -> FileTable {
    let mut files = FileTable::new();
    let entry = |path: &str, role, class| FileEntry {
        path: PathBuf::from(path),
        role,
        class,
    };
    files.insert("frigate_templates", entry("templates.xml", FileRole::Templates, Some(ShipClass::Frigate)));
    files.insert("frigate_hardpoints", entry("hardpoints.xml", FileRole::Hardpoints, Some(ShipClass::Frigate)));
    files.insert("skirmish_units", entry("skirmish.xml", FileRole::SkirmishUnits, None));
    files.insert("campaign_units", entry("campaign.xml", FileRole::CampaignUnits, None));
    files.insert("market_options", entry("options.lua", FileRole::MarketBase, None));
    files.insert("market_adjustments", entry("adjustments.lua", FileRole::MarketAdjustments, None));
    files.insert("tooltips", entry("tooltips.txt", FileRole::Text, None));
    files
}

fn pristine_inputs() -> Vec<ManagedFile> {
    vec![
        ManagedFile::new("frigate_templates", TEMPLATES),
        ManagedFile::new("frigate_hardpoints", HARDPOINTS),
        ManagedFile::new("skirmish_units", SKIRMISH),
        ManagedFile::new("campaign_units", CAMPAIGN),
        ManagedFile::new("market_options", MARKET_BASE),
        ManagedFile::new("market_adjustments", MARKET_ADJUSTMENTS),
        ManagedFile::new("tooltips", TOOLTIPS),
    ]
}

fn squadrons(kind: &str, count: u32) -> SquadronBlock {
    let mut block = SquadronBlock {
        delay_seconds: Some(6.0),
        ..Default::default()
    };
    block.starting.insert(
        TechLevel::All,
        vec![SquadronEntry {
            kind: kind.to_string(),
            count,
        }],
    );
    block
}

fn acclamator() -> ChangeSpec {
    let mut spec = ChangeSpec {
        template: Some("Template_Acclamator".into()),
        base_unit: Some("Skirmish_Acclamator".into()),
        campaign_unit: Some("Acclamator_Assault_Ship".into()),
        squadrons: Some(squadrons("Clone_ARC_170_Squadron", 2)),
        ..Default::default()
    };
    spec.template_changes.insert("shield_points".into(), Directive::Percent(30.0));
    spec.hardpoints
        .insert(HardpointAdjustment::FireRateIncrease, Directive::Percent(100.0));
    spec.hardpoints
        .insert(HardpointAdjustment::DamageIncrease, Directive::Percent(30.0));
    spec.hardpoints
        .insert(HardpointAdjustment::BurstDelayAdjustment, Directive::Percent(-90.0));
    spec.cost_changes
        .insert("build_cost_credits".into(), Directive::Percent(-25.0));
    spec
}

fn venator() -> ChangeSpec {
    let mut spec = ChangeSpec {
        template: Some("Template_Venator".into()),
        base_unit: Some("Skirmish_Venator".into()),
        campaign_unit: Some("Venator_Star_Destroyer".into()),
        squadrons: Some(squadrons("Clone_V_Wing_Squadron", 4)),
        ..Default::default()
    };
    spec.template_changes.insert("tactical_health".into(), Directive::Absolute(3500.0));
    spec
}

fn market() -> MarketSpec {
    let mut spec = MarketSpec::default();
    spec.ships.insert(
        "Venator_Star_Destroyer".into(),
        MarketShipEntry {
            probability: 3,
            order: 2,
            ..Default::default()
        },
    );
    spec.ships.insert(
        "Acclamator_Assault_Ship".into(),
        MarketShipEntry {
            probability: 40,
            order: 1,
            ..Default::default()
        },
    );
    let mut event = MarketEvent {
        name: "CLONE_WARS_END".into(),
        ..Default::default()
    };
    event.adjustments.insert("Venator_Star_Destroyer".into(), -5);
    event.unlocks.insert("Acclamator_Assault_Ship".into(), true);
    spec.events.push(event);
    spec
}

fn full_plan() -> RunPlan {
    let mut plan = RunPlan {
        game_mode: GameMode::Skirmish,
        market: Some(market()),
        ..Default::default()
    };
    plan.units.insert("Acclamator".into(), acclamator());
    plan.units.insert("Venator".into(), venator());
    plan
}

fn memory_engine() -> Engine<MemoryBackend> {
    Engine::new(BaselineStore::new(MemoryBackend::new()), file_table())
}

fn patched(outcome: &RunOutcome, file_id: &str) -> String {
    String::from_utf8(outcome.file(file_id).unwrap().patched.clone()).unwrap()
}

fn as_disk(outcome: &RunOutcome) -> Vec<ManagedFile> {
    outcome
        .files
        .iter()
        .map(|f| ManagedFile::new(f.file_id.clone(), f.patched.clone()))
        .collect()
}

#[test]
fn test_full_run_applies_every_stage() {
    let mut engine = memory_engine();
    let outcome = engine.run(&pristine_inputs(), &full_plan(), RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::Success, "{:?}", outcome.report.issues);

    let templates = patched(&outcome, "frigate_templates");
    assert!(templates.contains("<Shield_Points>1300</Shield_Points>"));
    assert!(templates.contains("<Tactical_Health>3500</Tactical_Health>"));
    assert!(templates.contains("<!-- Shared frigate templates -->"));

    let hardpoints = patched(&outcome, "frigate_hardpoints");
    assert!(hardpoints.contains("<Fire_Min_Recharge_Seconds>2.0</Fire_Min_Recharge_Seconds>"));
    assert!(hardpoints.contains("<Fire_Max_Recharge_Seconds>3.0</Fire_Max_Recharge_Seconds>"));
    assert!(hardpoints.contains("<Fire_Pulse_Count>13</Fire_Pulse_Count>"));
    assert!(hardpoints.contains("<Fire_Pulse_Delay_Seconds>0.05</Fire_Pulse_Delay_Seconds>"));
    // Venator has no hardpoint directives
    assert!(hardpoints.contains("<Fire_Min_Recharge_Seconds>3.0</Fire_Min_Recharge_Seconds>"));
    assert!(hardpoints.contains("<Health>400</Health>"));

    let tooltips = patched(&outcome, "tooltips");
    assert!(tooltips.contains("TEXT_TOOLTIP_ACCLAMATOR_SHIELD,Shields: 1300 / [9/R] (Frigate)\r\n"));
    assert!(tooltips.contains("TEXT_STATBLOCK_VENATOR_BASE,Health: 3500 | Shields: 2000\r\n"));
    assert!(tooltips.contains("TEXT_TOOLTIP_VENATOR_HULL,Hull: 3500 (Frigate)\r\n"));

    let skirmish = patched(&outcome, "skirmish_units");
    assert!(skirmish.contains("<Build_Cost_Credits>900</Build_Cost_Credits>"));

    let market = patched(&outcome, "market_adjustments");
    assert!(market.starts_with(MARKET_ADJUSTMENTS));
    assert!(market.contains("{\"EMPIRE\", \"KDY_MARKET\", \"Venator_Star_Destroyer\", -5},"));
    assert!(market.contains("{\"EMPIRE\", \"KDY_MARKET\", \"Acclamator_Assault_Ship\", false},"));
}

#[test]
fn test_second_run_matches_first() {
    let mut engine = memory_engine();
    let plan = full_plan();

    let first = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    let second = engine.run(&as_disk(&first), &plan, RunOptions::default()).unwrap();
    let third = engine.run(&as_disk(&second), &plan, RunOptions::default()).unwrap();

    for ((a, b), c) in first.files.iter().zip(&second.files).zip(&third.files) {
        assert_eq!(a.patched, b.patched, "{} drifted on the second run", a.file_id);
        assert_eq!(b.patched, c.patched, "{} drifted on the third run", a.file_id);
    }

    // +30% stays x1.30, never x1.69
    assert!(patched(&third, "frigate_templates").contains("<Shield_Points>1300</Shield_Points>"));
    // Market fragments are appended once
    let market = patched(&third, "market_options");
    assert_eq!(market.matches("Generated by swma").count(), 1);
}

#[test]
fn test_squadron_blocks_live_in_one_store() {
    let mut engine = memory_engine();
    let plan = full_plan();
    let first = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    let second = engine.run(&as_disk(&first), &plan, RunOptions::default()).unwrap();

    let skirmish = patched(&second, "skirmish_units");
    let campaign = patched(&second, "campaign_units");

    // Template-based Acclamator belongs to the skirmish store
    assert!(skirmish.contains("<Starting_Spawned_Units_Tech_0>Clone_ARC_170_Squadron, 2</Starting_Spawned_Units_Tech_0>"));
    assert!(!campaign.contains("Clone_ARC_170_Squadron"));
    assert!(!campaign.contains("Clone_Z95_Squadron, 1"));

    // Campaign-based Venator belongs to the campaign store
    assert!(campaign.contains("<Starting_Spawned_Units_Tech_2>Clone_V_Wing_Squadron, 4</Starting_Spawned_Units_Tech_2>"));
    assert!(!skirmish.contains("Clone_V_Wing_Squadron"));
    assert!(!skirmish.contains("Clone_Z95_Squadron, 2"));
}

#[test]
fn test_missing_attribute_is_isolated() {
    let mut engine = memory_engine();
    let mut broken = ChangeSpec {
        template: Some("Template_Venator".into()),
        ..Default::default()
    };
    broken.template_changes.insert("hyperdrive_speed".into(), Directive::Percent(10.0));
    let mut healthy = ChangeSpec {
        template: Some("Template_Acclamator".into()),
        ..Default::default()
    };
    healthy.template_changes.insert("shield_points".into(), Directive::Percent(10.0));

    let mut plan = RunPlan::default();
    plan.units.insert("Venator".into(), broken);
    plan.units.insert("Acclamator".into(), healthy);

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::PartialSuccess { warnings: 1 });
    assert_eq!(outcome.report.applied.len(), 1);
    assert_eq!(outcome.report.issues[0].kind, "AttributeNotFound");
    assert_eq!(outcome.report.issues[0].unit.as_deref(), Some("Venator"));
    assert!(patched(&outcome, "frigate_templates").contains("<Shield_Points>1100</Shield_Points>"));
}

#[test]
fn test_invalid_market_fails_only_market_stage() {
    let mut engine = memory_engine();
    let mut plan = full_plan();
    if let Some(market) = plan.market.as_mut() {
        market.ships["Venator_Star_Destroyer"].probability = 150;
    }

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert!(matches!(outcome.status(), RunStatus::PartialSuccess { .. }));
    assert!(outcome.report.issues.iter().any(|i| i.kind == "InvalidProbability"));
    assert_eq!(patched(&outcome, "market_options"), MARKET_BASE);
    assert!(patched(&outcome, "frigate_templates").contains("<Shield_Points>1300</Shield_Points>"));
}

#[test]
fn test_baseline_is_write_once() {
    let mut engine = memory_engine();
    engine.run(&pristine_inputs(), &RunPlan::default(), RunOptions::default()).unwrap();

    // Something else rewrites the file between runs
    let mut inputs = pristine_inputs();
    inputs[0] = ManagedFile::new("frigate_templates", TEMPLATES.replace("1000", "5"));
    engine.run(&inputs, &RunPlan::default(), RunOptions::default()).unwrap();

    assert_eq!(engine.store().restore("frigate_templates").unwrap(), TEMPLATES.as_bytes());
    assert_eq!(engine.store().history("frigate_templates").unwrap().len(), 2);
}

#[test]
fn test_campaign_mode_skips_costs_and_skirmish_store() {
    let mut engine = memory_engine();
    let mut plan = full_plan();
    plan.game_mode = GameMode::Campaign;
    plan.market = None;

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(patched(&outcome, "skirmish_units"), SKIRMISH);
    let campaign = patched(&outcome, "campaign_units");
    assert!(campaign.contains("<Starting_Spawned_Units_Tech_1>Clone_ARC_170_Squadron, 2</Starting_Spawned_Units_Tech_1>"));
}

fn write_project(dir: &TempDir) -> PathBuf {
    let data = dir.path().join("Data");
    fs::create_dir_all(&data).unwrap();
    for (name, content) in [
        ("templates.xml", TEMPLATES),
        ("hardpoints.xml", HARDPOINTS),
        ("skirmish.xml", SKIRMISH),
        ("campaign.xml", CAMPAIGN),
    ] {
        fs::write(data.join(name), content).unwrap();
    }

    let config = r#"
game_mode: skirmish
data_root: Data
backup_dir: backups
files:
  frigate_templates: { path: templates.xml, role: templates, class: frigate }
  frigate_hardpoints: { path: hardpoints.xml, role: hardpoints, class: frigate }
  skirmish_units: { path: skirmish.xml, role: skirmish_units }
  campaign_units: { path: campaign.xml, role: campaign_units }
units:
  Acclamator:
    template: Template_Acclamator
    base_unit: Skirmish_Acclamator
    campaign_unit: Acclamator_Assault_Ship
    template_changes:
      shield_points: "+30%"
    hardpoints:
      fire_rate_increase: "+100%"
    squadrons:
      starting:
        all:
          - { type: Clone_ARC_170_Squadron, count: 2 }
"#;
    let path = dir.path().join("swma.yaml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_project_apply_reset_on_disk() {
    let dir = TempDir::new().unwrap();
    let config = write_project(&dir);
    let templates = dir.path().join("Data/templates.xml");

    let project = Project::open(&config).unwrap();
    let plan = project.config().plan();

    // Preview leaves disk and backups untouched
    let mut engine = project.engine().unwrap();
    let preview = engine
        .run(&project.read_managed_files().unwrap(), &plan, RunOptions { preview: true })
        .unwrap();
    assert_eq!(project.write_outcome(&preview).unwrap(), 0);
    assert!(!dir.path().join("backups/pristine").join("frigate_templates.orig").exists());
    assert_eq!(fs::read_to_string(&templates).unwrap(), TEMPLATES);

    // Apply twice; the second run has nothing new to write
    let outcome = engine
        .run(&project.read_managed_files().unwrap(), &plan, RunOptions::default())
        .unwrap();
    assert_eq!(project.write_outcome(&outcome).unwrap(), 4);
    assert!(fs::read_to_string(&templates).unwrap().contains("<Shield_Points>1300</Shield_Points>"));

    let mut reopened = Project::open(&config).unwrap().engine().unwrap();
    let again = reopened
        .run(&project.read_managed_files().unwrap(), &plan, RunOptions::default())
        .unwrap();
    assert_eq!(project.write_outcome(&again).unwrap(), 0);

    // Reset restores the pristine bytes
    let restored = reopened.reset(&plan, None).unwrap();
    project.write_files(&restored).unwrap();
    assert_eq!(fs::read_to_string(&templates).unwrap(), TEMPLATES);
    assert_eq!(fs::read_to_string(dir.path().join("Data/campaign.xml")).unwrap(), CAMPAIGN);
}

#[test]
fn test_non_weapon_hardpoints_are_skipped() {
    let mut engine = memory_engine();
    let mut spec = ChangeSpec::default();
    spec.hardpoints
        .insert(HardpointAdjustment::FireRateIncrease, Directive::Percent(50.0));
    spec.hardpoints
        .insert(HardpointAdjustment::DamageIncrease, Directive::Percent(30.0));
    let mut plan = RunPlan::default();
    plan.units.insert("Acclamator".into(), spec);

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::Success, "{:?}", outcome.report.issues);
    let changes = &outcome.file("frigate_hardpoints").unwrap().changes;
    assert_eq!(changes.len(), 3);
    assert!(changes.iter().all(|c| c.entity == "HP_Acclamator_Turbolaser"));
}

#[test]
fn test_tag_missing_on_every_hardpoint_warns_once() {
    let mut engine = memory_engine();
    let mut spec = ChangeSpec::default();
    spec.hardpoints
        .insert(HardpointAdjustment::FireRateIncrease, Directive::Percent(100.0));
    spec.hardpoints
        .insert(HardpointAdjustment::DamageIncrease, Directive::Percent(30.0));
    let mut plan = RunPlan::default();
    plan.units.insert("Venator".into(), spec);

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::PartialSuccess { warnings: 1 });
    let issue = &outcome.report.issues[0];
    assert_eq!(issue.kind, "AttributeNotFound");
    assert!(issue.message.contains("Fire_Pulse_Count"));
    assert!(patched(&outcome, "frigate_hardpoints")
        .contains("<Fire_Min_Recharge_Seconds>1.5</Fire_Min_Recharge_Seconds>"));
}

#[test]
fn test_invalid_directive_skips_only_its_unit() {
    let mut engine = memory_engine();
    let mut stalled = ChangeSpec::default();
    stalled
        .hardpoints
        .insert(HardpointAdjustment::FireRateIncrease, Directive::Percent(-100.0));
    let mut healthy = ChangeSpec {
        template: Some("Template_Acclamator".into()),
        ..Default::default()
    };
    healthy.template_changes.insert("shield_points".into(), Directive::Percent(10.0));

    let mut plan = RunPlan::default();
    plan.units.insert("Venator".into(), stalled);
    plan.units.insert("Acclamator".into(), healthy);

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::PartialSuccess { warnings: 2 });
    assert!(outcome
        .report
        .issues
        .iter()
        .all(|i| i.kind == "InvalidDirective" && i.unit.as_deref() == Some("Venator")));
    assert_eq!(patched(&outcome, "frigate_hardpoints"), HARDPOINTS);
    assert!(patched(&outcome, "frigate_templates").contains("<Shield_Points>1100</Shield_Points>"));
}

#[test]
fn test_tooltips_follow_template_changes() {
    let mut engine = memory_engine();
    let mut plan = RunPlan::default();
    let mut spec = venator();
    spec.squadrons = None;
    spec.template_changes.insert("shield_points".into(), Directive::Absolute(0.0));
    plan.units.insert("Venator".into(), spec);

    let outcome = engine.run(&pristine_inputs(), &plan, RunOptions::default()).unwrap();
    assert_eq!(outcome.status(), RunStatus::Success, "{:?}", outcome.report.issues);
    let tooltips = patched(&outcome, "tooltips");
    assert!(tooltips.contains("TEXT_STATBLOCK_VENATOR_BASE,Health: 3500 | Unshielded\r\n"));
    assert!(tooltips.contains("TEXT_TOOLTIP_VENATOR_HULL,Hull: 3500 (Frigate)\r\n"));
    // Other units' entries stay as they were
    assert!(tooltips.contains("TEXT_TOOLTIP_ACCLAMATOR_SHIELD,Shields: 1000 / [9/R] (Frigate)\r\n"));

    let changes = &outcome.file("tooltips").unwrap().changes;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].entity, "TEXT_STATBLOCK_VENATOR_BASE");
    assert_eq!(changes[0].old.as_deref(), Some("Health: 3000 | Shields: 2000"));

    let second = engine.run(&as_disk(&outcome), &plan, RunOptions::default()).unwrap();
    assert_eq!(patched(&second, "tooltips"), tooltips);

    let restored = engine.reset(&plan, Some("Venator")).unwrap();
    let text = restored.iter().find(|f| f.file_id == "tooltips").unwrap();
    assert_eq!(text.content, TOOLTIPS.as_bytes());
}
