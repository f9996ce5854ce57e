use std::collections::{HashMap, VecDeque};

use engine::{
    forward_to_yaw, step_toward, Collider, ColliderShape, EntityId, NavAgent, Scene, SceneCommand,
    SceneWorld, Transform, Vec3,
};
use tracing::{info, warn};

use crate::content::{HackableDef, LevelDef, PanelAction, ScriptedAction};
use crate::persistence::{JsonMemoryStore, MemoryStoreError};
use crate::tuning::GameplayTuning;

use super::collaborators::{HudLink, MemoryStore, PlayerLink};
use super::hackable::{AccessError, HackableConfig, HackableEntity, RoomRef};
use super::hud::HudState;
use super::patrol::{PatrolAgent, PatrolSettings, Waypoint};
use super::player::{PlayerState, StealthGauge};
use super::shield::ShieldGate;
use super::types::{ColorTag, HackAction, HackableId, HackableKind};
use super::visibility::{ViewSpec, VisibilityTester};
use super::{AssemblyError, BODIES, CONTROLLERS, HACKABLES, ROOMS, SIGHT, WALLS, WAYPOINTS};

const PLAYER_BODY_RADIUS: f32 = 0.4;
const PLAYER_CONTROLLER_RADIUS: f32 = 0.5;
const CAMERA_RADIUS: f32 = 0.3;
const AGENT_RADIUS: f32 = 0.4;
const PLAYER_ARRIVAL_THRESHOLD: f32 = 0.05;

/// Runs one level: assembles it into the world on load and ticks every component in a
/// fixed order so agents refresh their access flags before any detection pass.
pub struct StealthScene<S: MemoryStore = JsonMemoryStore> {
    level: LevelDef,
    tuning: GameplayTuning,
    store: S,
    tester: VisibilityTester,
    seed: u64,
    stage: Option<Stage>,
}

impl<S: MemoryStore> StealthScene<S> {
    /// Validates the level by assembling it once into a scratch world.
    pub fn new(
        level: LevelDef,
        tuning: GameplayTuning,
        store: S,
        seed: u64,
    ) -> Result<Self, AssemblyError> {
        assemble(&level, &tuning, &store, seed, &mut SceneWorld::default())?;
        Ok(Self {
            level,
            tuning,
            store,
            tester: VisibilityTester::new(SIGHT),
            seed,
            stage: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hackable_id(&self, key: &str) -> Option<HackableId> {
        self.stage.as_ref()?.hackable_keys.get(key).copied()
    }

    pub fn hackable(&self, id: HackableId) -> Option<&HackableEntity> {
        self.stage.as_ref()?.hackables.get(id.0)
    }

    pub fn agents(&self) -> &[PatrolAgent] {
        self.stage
            .as_ref()
            .map(|stage| stage.agents.as_slice())
            .unwrap_or_default()
    }

    pub fn player(&self) -> Option<&PlayerState> {
        self.stage.as_ref().map(|stage| &stage.player)
    }

    pub fn hud(&self) -> Option<&HudState> {
        self.stage.as_ref().map(|stage| &stage.hud)
    }

    pub fn try_hack(&mut self, id: HackableId) -> Result<(), AccessError> {
        match self.stage.as_mut() {
            Some(stage) => stage.try_hack(id),
            None => Err(AccessError::UnknownTarget),
        }
    }

    pub fn unhack(&mut self) {
        if let Some(stage) = self.stage.as_mut() {
            stage.unhack();
        }
    }

    pub fn try_wipe_memory(&mut self, id: HackableId) -> Result<(), AccessError> {
        match self.stage.as_mut() {
            Some(stage) => stage.try_wipe_memory(id),
            None => Err(AccessError::UnknownTarget),
        }
    }

    /// Toggles a panel by id; false when no such panel exists.
    pub fn activate_panel(&mut self, key: &str) -> bool {
        let Some(stage) = self.stage.as_mut() else {
            return false;
        };
        match stage.panel_keys.get(key).copied() {
            Some(index) => {
                stage.activate_panel(index);
                true
            }
            None => false,
        }
    }

    pub fn set_alarm(&mut self, world: &mut SceneWorld, raised: bool) {
        if let Some(stage) = self.stage.as_mut() {
            stage.set_alarm(world, raised);
        }
    }

    pub fn save_checkpoint(&mut self) -> Result<(), MemoryStoreError> {
        match self.stage.as_ref() {
            Some(stage) => stage.save_checkpoint(&mut self.store),
            None => Ok(()),
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        if let Some(stage) = self.stage.as_mut() {
            stage.hud.set_paused(paused);
        }
    }
}

impl<S: MemoryStore> Scene for StealthScene<S> {
    fn load(&mut self, world: &mut SceneWorld) {
        match assemble(&self.level, &self.tuning, &self.store, self.seed, world) {
            Ok(stage) => {
                info!(
                    level = %self.level.name,
                    checkpoint = self.level.checkpoint,
                    hackables = stage.hackables.len(),
                    agents = stage.agents.len(),
                    "level_assembled"
                );
                self.stage = Some(stage);
            }
            Err(error) => {
                warn!(error = %error, "level_assembly_failed");
                self.stage = None;
            }
        }
    }

    fn update(&mut self, fixed_dt_seconds: f32, world: &mut SceneWorld) -> SceneCommand {
        let Some(stage) = self.stage.as_mut() else {
            return SceneCommand::None;
        };
        stage.tick(world, &self.tester, &mut self.store, fixed_dt_seconds)
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        if self.stage.take().is_some() {
            info!(level = %self.level.name, "level_unloaded");
        }
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!(
            "{} (checkpoint {})",
            self.level.name, self.level.checkpoint
        ))
    }
}

#[derive(Debug)]
struct Panel {
    key: String,
    color: ColorTag,
    action: PanelAction,
    enabled: bool,
    targets: Vec<HackableId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimelineAction {
    Hack(HackableId),
    Unhack,
    Wipe(HackableId),
    Panel(usize),
    Alarm,
    ClearAlarm,
    Checkpoint,
    Pause,
    Resume,
}

#[derive(Debug)]
struct Stage {
    checkpoint: u32,
    player: PlayerState,
    player_route: VecDeque<Vec3>,
    player_speed: f32,
    hud: HudState,
    hackables: Vec<HackableEntity>,
    hackable_keys: HashMap<String, HackableId>,
    agents: Vec<PatrolAgent>,
    rooms: Vec<(EntityId, String)>,
    panels: Vec<Panel>,
    panel_keys: HashMap<String, usize>,
    timeline: Vec<(f32, TimelineAction)>,
    next_entry: usize,
    elapsed_seconds: f32,
}

impl Stage {
    fn tick(
        &mut self,
        world: &mut SceneWorld,
        tester: &VisibilityTester,
        store: &mut dyn MemoryStore,
        fixed_dt_seconds: f32,
    ) -> SceneCommand {
        self.elapsed_seconds += fixed_dt_seconds;
        self.run_due_actions(world, store);
        if self.hud.is_halted() {
            return SceneCommand::None;
        }

        self.walk_player(world, fixed_dt_seconds);
        self.refresh_player_view(world);

        for agent in &mut self.agents {
            if let Some(hackable) = self.hackables.get_mut(agent.hackable().0) {
                agent.tick(world, hackable, tester, &self.player, fixed_dt_seconds);
            }
        }
        for hackable in &mut self.hackables {
            hackable.refresh_white_dot(world, tester, &self.player);
            hackable.tick_detection(
                world,
                tester,
                fixed_dt_seconds,
                &mut self.player,
                &mut self.hud,
            );
        }
        for hackable in &mut self.hackables {
            if hackable.needs_forced_unhack() {
                hackable.forced_unhack(&mut self.player, &mut self.hud);
            }
        }
        self.track_rooms(world);

        if self.player.settle_gauge(fixed_dt_seconds) {
            self.hud.set_game_over();
            return SceneCommand::Restart;
        }
        SceneCommand::None
    }

    fn run_due_actions(&mut self, world: &mut SceneWorld, store: &mut dyn MemoryStore) {
        while let Some(&(at_seconds, action)) = self.timeline.get(self.next_entry) {
            if at_seconds > self.elapsed_seconds {
                break;
            }
            self.next_entry += 1;
            info!(at_seconds, action = ?action, "timeline_action");
            match action {
                TimelineAction::Hack(id) => {
                    let _ = self.try_hack(id);
                }
                TimelineAction::Unhack => self.unhack(),
                TimelineAction::Wipe(id) => {
                    let _ = self.try_wipe_memory(id);
                }
                TimelineAction::Panel(index) => self.activate_panel(index),
                TimelineAction::Alarm => self.set_alarm(world, true),
                TimelineAction::ClearAlarm => self.set_alarm(world, false),
                TimelineAction::Checkpoint => {
                    if let Err(error) = self.save_checkpoint(store) {
                        warn!(error = %error, "checkpoint_save_failed");
                    }
                }
                TimelineAction::Pause => self.hud.set_paused(true),
                TimelineAction::Resume => self.hud.set_paused(false),
            }
        }
    }

    fn walk_player(&mut self, world: &mut SceneWorld, fixed_dt_seconds: f32) {
        if self.player.is_embodying() {
            return;
        }
        let Some(&next) = self.player_route.front() else {
            return;
        };
        let Some(current) = world.transform(self.player.body()) else {
            return;
        };

        let (position, arrived) = step_toward(
            current.position,
            next,
            self.player_speed,
            fixed_dt_seconds,
            PLAYER_ARRIVAL_THRESHOLD,
        );
        let transform = Transform {
            position,
            yaw_radians: forward_to_yaw(next - current.position).unwrap_or(current.yaw_radians),
        };
        world.set_transform(self.player.body(), transform);
        world.set_transform(self.player.controller(), transform);
        if arrived {
            self.player_route.pop_front();
        }
    }

    fn refresh_player_view(&mut self, world: &SceneWorld) {
        let view = match self.player.hacked_target() {
            Some(id) => self
                .hackables
                .get(id.0)
                .and_then(|hackable| hackable.viewpoint(world)),
            None => world
                .transform(self.player.body())
                .map(|transform| self.player.view_spec().at(transform)),
        };
        self.player.refresh_view(view);
    }

    fn track_rooms(&mut self, world: &SceneWorld) {
        for hackable in &mut self.hackables {
            let Some(transform) = world.transform(hackable.entity()) else {
                continue;
            };
            let inside: Vec<RoomRef<'_>> = world
                .overlapping_triggers(transform.position, ROOMS)
                .into_iter()
                .filter_map(|id| {
                    self.rooms
                        .iter()
                        .find(|(room, _)| *room == id)
                        .map(|(room, name)| RoomRef {
                            id: *room,
                            name: name.as_str(),
                        })
                })
                .collect();
            hackable.track_rooms(&inside, &mut self.hud);
        }
    }

    fn try_hack(&mut self, id: HackableId) -> Result<(), AccessError> {
        let Some(target) = self.hackables.get(id.0) else {
            warn!(hackable = id.0, "hack_target_unknown");
            return Err(AccessError::UnknownTarget);
        };
        if let Err(error) = target.check_access(HackAction::Hack, self.player.is_embodying()) {
            info!(hackable = %target.display_name(), error = %error, "hack_rejected");
            self.hud.show_error(&error);
            return Err(error);
        }

        if let Some(previous) = self.player.hacked_target() {
            if let Some(previous) = self.hackables.get_mut(previous.0) {
                previous.on_unhack();
            }
        }
        if let Some(target) = self.hackables.get_mut(id.0) {
            target.on_hack();
            self.player.embody(id, target.entity());
        }
        self.hud.clear_error();
        Ok(())
    }

    fn unhack(&mut self) {
        let Some(id) = self.player.hacked_target() else {
            return;
        };
        if let Some(hackable) = self.hackables.get_mut(id.0) {
            hackable.on_unhack();
        }
        self.player.clear_hacked_target();
    }

    fn try_wipe_memory(&mut self, id: HackableId) -> Result<(), AccessError> {
        let Some(target) = self.hackables.get_mut(id.0) else {
            warn!(hackable = id.0, "wipe_target_unknown");
            return Err(AccessError::UnknownTarget);
        };
        if let Err(error) = target.check_access(HackAction::WipeMemory, self.player.is_embodying())
        {
            info!(hackable = %target.display_name(), error = %error, "wipe_rejected");
            self.hud.show_error(&error);
            return Err(error);
        }
        target.wipe_memory();
        self.hud.clear_error();
        Ok(())
    }

    fn activate_panel(&mut self, index: usize) {
        let Some(panel) = self.panels.get_mut(index) else {
            return;
        };
        panel.enabled = !panel.enabled;
        info!(panel = %panel.key, enabled = panel.enabled, "panel_activated");

        for target in &panel.targets {
            let Some(hackable) = self.hackables.get_mut(target.0) else {
                continue;
            };
            apply_panel(hackable, panel.action, panel.enabled, panel.color);
            if hackable.needs_forced_unhack() {
                hackable.forced_unhack(&mut self.player, &mut self.hud);
            }
        }
    }

    fn set_alarm(&mut self, world: &mut SceneWorld, raised: bool) {
        for agent in &mut self.agents {
            if raised {
                agent.raise_alarm();
            } else {
                agent.clear_alarm(world);
            }
        }
    }

    fn save_checkpoint(&self, store: &mut dyn MemoryStore) -> Result<(), MemoryStoreError> {
        for hackable in &self.hackables {
            hackable.persist_memory(store, self.checkpoint);
        }
        store.flush()?;
        info!(checkpoint = self.checkpoint, "checkpoint_saved");
        Ok(())
    }
}

fn apply_panel(hackable: &mut HackableEntity, action: PanelAction, enable: bool, color: ColorTag) {
    match action {
        PanelAction::Both => hackable.enable_disable(enable, color),
        PanelAction::ShieldsOnly => {
            hackable.enable_disable_shield(enable, color);
        }
        PanelAction::HackableOnly => {
            hackable.enable_disable_hackable(enable, color);
        }
    }
}

fn sphere(radius: f32, layers: engine::LayerMask) -> Option<Collider> {
    Some(Collider::solid(ColliderShape::Sphere { radius }, layers))
}

fn assemble(
    level: &LevelDef,
    tuning: &GameplayTuning,
    store: &dyn MemoryStore,
    seed: u64,
    world: &mut SceneWorld,
) -> Result<Stage, AssemblyError> {
    for wall in &level.walls {
        world.spawn(
            Transform::at(wall.center),
            "wall",
            Some(Collider::solid(
                ColliderShape::Box {
                    half_extents: wall.half_extents,
                },
                WALLS,
            )),
        );
    }
    let rooms = level
        .rooms
        .iter()
        .map(|room| {
            let id = world.spawn(
                Transform::at(room.bounds.center),
                format!("room:{}", room.name),
                Some(Collider::trigger(
                    ColliderShape::Box {
                        half_extents: room.bounds.half_extents,
                    },
                    ROOMS,
                )),
            );
            (id, room.name.clone())
        })
        .collect();

    let player_transform = Transform {
        position: level.player.position,
        yaw_radians: level.player.yaw_degrees.to_radians(),
    };
    let body = world.spawn(
        player_transform,
        "player_body",
        sphere(PLAYER_BODY_RADIUS, BODIES),
    );
    let controller = world.spawn(
        player_transform,
        "player_controller",
        sphere(PLAYER_CONTROLLER_RADIUS, CONTROLLERS),
    );
    let player = PlayerState::new(
        body,
        controller,
        ViewSpec::from_degrees(tuning.eye_height, tuning.fov_degrees, tuning.view_range),
        StealthGauge::new(
            tuning.stealth_threshold,
            tuning.detection_gain_per_second,
            tuning.detection_decay_per_second,
        ),
    );

    let mut hackables = Vec::with_capacity(level.hackables.len());
    let mut hackable_keys = HashMap::new();
    let mut agents = Vec::new();
    for (index, def) in level.hackables.iter().enumerate() {
        let id = HackableId(index);
        let entity = world.spawn(
            Transform {
                position: def.position,
                yaw_radians: def.yaw_degrees.to_radians(),
            },
            def.name.clone(),
            sphere(
                match def.kind {
                    HackableKind::Camera => CAMERA_RADIUS,
                    HackableKind::Agent => AGENT_RADIUS,
                },
                HACKABLES,
            ),
        );
        let mut hackable = HackableEntity::new(id, hackable_config(def, entity, tuning))?;
        hackable.restore_memory(store, level.checkpoint);

        if let Some(agent_def) = &def.agent {
            let route = agent_def
                .waypoints
                .iter()
                .map(|waypoint| Waypoint {
                    position: waypoint.position,
                    yaw_radians: waypoint.yaw_degrees.to_radians(),
                    randomise_idle: waypoint.randomise_idle,
                    always_idle: waypoint.always_idle,
                    trigger: world.spawn(
                        Transform::at(waypoint.position),
                        "waypoint",
                        Some(Collider::trigger(
                            ColliderShape::Sphere {
                                radius: tuning.waypoint_radius,
                            },
                            WAYPOINTS,
                        )),
                    ),
                })
                .collect();
            let settings = PatrolSettings {
                patrol: agent_def.patrol,
                idle_look_around: agent_def.idle_look_around,
                can_chase: agent_def.can_chase,
                idle_duration_seconds: agent_def
                    .idle_duration_seconds
                    .unwrap_or(tuning.idle_duration_seconds),
                min_stealth_percent: agent_def
                    .min_stealth_percent
                    .unwrap_or(tuning.min_stealth_percent),
                alarm_position: agent_def.alarm_position,
                marker_radius: tuning.marker_radius,
                scan: tuning.scan_timings(),
            };
            agents.push(PatrolAgent::new(
                def.name.clone(),
                id,
                NavAgent::new(def.position, tuning.agent_speed),
                route,
                settings,
                seed.wrapping_add(index as u64),
            )?
            .with_yaw(def.yaw_degrees.to_radians()));
        }

        hackable_keys.insert(def.key.clone(), id);
        hackables.push(hackable);
    }

    let mut panels = Vec::with_capacity(level.panels.len());
    let mut panel_keys = HashMap::new();
    for def in &level.panels {
        let targets = def
            .targets
            .iter()
            .map(|key| {
                hackable_keys
                    .get(key)
                    .copied()
                    .ok_or_else(|| AssemblyError::UnknownHackable {
                        referrer: format!("panel '{}'", def.key),
                        key: key.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !def.enabled {
            for target in &targets {
                apply_panel(&mut hackables[target.0], def.action, false, def.color);
            }
        }
        panel_keys.insert(def.key.clone(), panels.len());
        panels.push(Panel {
            key: def.key.clone(),
            color: def.color,
            action: def.action,
            enabled: def.enabled,
            targets,
        });
    }

    let resolve_hackable = |key: &str, at_seconds: f32| {
        hackable_keys
            .get(key)
            .copied()
            .ok_or_else(|| AssemblyError::UnknownHackable {
                referrer: format!("timeline entry at {at_seconds}s"),
                key: key.to_string(),
            })
    };
    let mut timeline = Vec::with_capacity(level.timeline.len());
    for entry in &level.timeline {
        let action = match &entry.action {
            ScriptedAction::Hack { target } => {
                TimelineAction::Hack(resolve_hackable(target, entry.at_seconds)?)
            }
            ScriptedAction::Unhack => TimelineAction::Unhack,
            ScriptedAction::Wipe { target } => {
                TimelineAction::Wipe(resolve_hackable(target, entry.at_seconds)?)
            }
            ScriptedAction::Panel { panel } => {
                TimelineAction::Panel(panel_keys.get(panel).copied().ok_or_else(|| {
                    AssemblyError::UnknownPanel {
                        referrer: format!("timeline entry at {}s", entry.at_seconds),
                        key: panel.clone(),
                    }
                })?)
            }
            ScriptedAction::Alarm => TimelineAction::Alarm,
            ScriptedAction::ClearAlarm => TimelineAction::ClearAlarm,
            ScriptedAction::Checkpoint => TimelineAction::Checkpoint,
            ScriptedAction::Pause => TimelineAction::Pause,
            ScriptedAction::Resume => TimelineAction::Resume,
        };
        timeline.push((entry.at_seconds, action));
    }

    world.apply_pending();

    Ok(Stage {
        checkpoint: level.checkpoint,
        player,
        player_route: level.player.route.iter().copied().collect(),
        player_speed: tuning.player_speed,
        hud: HudState::new(tuning.indicator_slots),
        hackables,
        hackable_keys,
        agents,
        rooms,
        panels,
        panel_keys,
        timeline,
        next_entry: 0,
        elapsed_seconds: 0.0,
    })
}

fn hackable_config(def: &HackableDef, entity: EntityId, tuning: &GameplayTuning) -> HackableConfig {
    let view = match (def.kind, def.view) {
        (_, Some(view)) => Some(view),
        (HackableKind::Agent, None) => Some(Default::default()),
        (HackableKind::Camera, None) => None,
    }
    .map(|view| {
        ViewSpec::from_degrees(
            view.eye_height.unwrap_or(tuning.eye_height),
            view.fov_degrees.unwrap_or(tuning.fov_degrees),
            view.range.unwrap_or(tuning.view_range),
        )
    });

    HackableConfig {
        kind: def.kind,
        color: def.color,
        display_name: def.name.clone(),
        room_name: def.room.clone(),
        entity,
        view,
        can_have_memory: def.can_have_memory,
        shields: def
            .shields
            .iter()
            .map(|shield| ShieldGate::new(shield.color, shield.disabled))
            .collect(),
        white_dot_height_offset: tuning.white_dot_height_offset,
    }
}
