use engine::{EntityId, SceneWorld, Vec3};
use thiserror::Error;
use tracing::{debug, info};

use super::collaborators::{HudLink, IndicatorSlot, MemoryKey, MemoryStore, PlayerLink};
use super::shield::{ShieldGate, ShieldSet};
use super::types::{ColorTag, HackAction, HackableId, HackableKind, Material, RenderGroup};
use super::visibility::{ViewSpec, Viewpoint, VisibilityTester};
use super::AssemblyError;

/// Why a hack or memory wipe was refused. `Display` is the message shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Error. System is Disabled.")]
    Disabled,
    #[error("Error. System Protection Level Too High.")]
    Shielded,
    #[error("Error. Entity is preventing further Action")]
    Forbidden,
    #[error("Error. Can only Wipe in Player Body")]
    WrongBody,
    #[error("Error. Entity is preventing further Action")]
    WipeForbidden,
    #[error("Error. No such System.")]
    UnknownTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomRef<'a> {
    pub id: EntityId,
    pub name: &'a str,
}

#[derive(Debug, Clone)]
pub struct HackableConfig {
    pub kind: HackableKind,
    pub color: ColorTag,
    pub display_name: String,
    pub room_name: String,
    pub entity: EntityId,
    pub view: Option<ViewSpec>,
    pub can_have_memory: bool,
    pub shields: Vec<ShieldGate>,
    pub white_dot_height_offset: f32,
}

#[derive(Debug, Clone)]
pub struct HackableEntity {
    id: HackableId,
    entity: EntityId,
    kind: HackableKind,
    color: ColorTag,
    display_name: String,
    room_name: String,
    view: Option<ViewSpec>,
    hacked: bool,
    disabled: bool,
    hackable: bool,
    can_wipe_memory: bool,
    can_have_memory: bool,
    has_player_memory: bool,
    shields: ShieldSet,
    exclamation_visible: bool,
    question_visible: bool,
    white_dot_visible: bool,
    indicator: Option<IndicatorSlot>,
    room_announced: bool,
    rooms_inside: Vec<EntityId>,
    render_group: RenderGroup,
    material: Material,
    white_dot_height_offset: f32,
}

impl HackableEntity {
    pub fn new(id: HackableId, config: HackableConfig) -> Result<Self, AssemblyError> {
        if config.kind == HackableKind::Camera && config.view.is_none() {
            return Err(AssemblyError::CameraWithoutViewpoint {
                name: config.display_name,
            });
        }

        Ok(Self {
            id,
            entity: config.entity,
            kind: config.kind,
            color: config.color,
            display_name: config.display_name,
            room_name: config.room_name,
            view: config.view,
            hacked: false,
            disabled: false,
            hackable: true,
            can_wipe_memory: true,
            can_have_memory: config.can_have_memory,
            has_player_memory: false,
            shields: ShieldSet::new(config.shields),
            exclamation_visible: false,
            question_visible: false,
            white_dot_visible: false,
            indicator: None,
            room_announced: false,
            rooms_inside: Vec::new(),
            render_group: RenderGroup::Interactable,
            material: Material::Tinted(config.color),
            white_dot_height_offset: config.white_dot_height_offset,
        })
    }

    pub fn id(&self) -> HackableId {
        self.id
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn kind(&self) -> HackableKind {
        self.kind
    }

    pub fn color(&self) -> ColorTag {
        self.color
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn is_hacked(&self) -> bool {
        self.hacked
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_hackable(&self) -> bool {
        self.hackable
    }

    pub fn can_wipe_memory(&self) -> bool {
        self.can_wipe_memory
    }

    pub fn can_have_memory(&self) -> bool {
        self.can_have_memory
    }

    pub fn has_player_memory(&self) -> bool {
        self.has_player_memory
    }

    pub fn shields(&self) -> &ShieldSet {
        &self.shields
    }

    pub fn has_no_shields(&self) -> bool {
        self.shields.has_no_shields()
    }

    pub fn exclamation_visible(&self) -> bool {
        self.exclamation_visible
    }

    pub fn question_visible(&self) -> bool {
        self.question_visible
    }

    pub fn white_dot_visible(&self) -> bool {
        self.white_dot_visible
    }

    pub fn indicator(&self) -> Option<IndicatorSlot> {
        self.indicator
    }

    pub fn render_group(&self) -> RenderGroup {
        self.render_group
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn viewpoint(&self, world: &SceneWorld) -> Option<Viewpoint> {
        let view = self.view?;
        let transform = world.transform(self.entity)?;
        Some(view.at(transform))
    }

    /// Pure transition; callers gate it with `check_access` first. Returns false when the
    /// entity was already hacked.
    pub fn on_hack(&mut self) -> bool {
        if self.hacked {
            return false;
        }
        self.hacked = true;
        self.room_announced = false;
        self.render_group = RenderGroup::CulledWhileHacked;
        info!(hackable = %self.display_name, "hack_started");
        true
    }

    /// Returns false when the entity was not hacked, so callers can skip follow-up work.
    pub fn on_unhack(&mut self) -> bool {
        let was_hacked = self.hacked;
        self.hacked = false;
        self.render_group = RenderGroup::Interactable;
        if was_hacked {
            info!(hackable = %self.display_name, "hack_ended");
        }
        was_hacked
    }

    pub fn needs_forced_unhack(&self) -> bool {
        self.hacked && (self.disabled || self.shields.enabled_count() > 0)
    }

    /// Ejects the player. `hacked` drops before any collaborator hears about it so a
    /// second trigger in the same tick finds nothing to do.
    pub fn forced_unhack(&mut self, player: &mut dyn PlayerLink, hud: &mut dyn HudLink) -> bool {
        if !self.hacked {
            return false;
        }
        self.hacked = false;
        self.render_group = RenderGroup::Interactable;
        info!(
            hackable = %self.display_name,
            disabled = self.disabled,
            enabled_shields = self.shields.enabled_count(),
            "forced_unhack"
        );

        hud.show_static_transition();
        if player.hacked_target() == Some(self.id) {
            player.clear_hacked_target();
        }
        true
    }

    /// Panel entry point for the disable flag. Returns false on a color mismatch.
    pub fn enable_disable_hackable(&mut self, enable: bool, panel_color: ColorTag) -> bool {
        if self.color != panel_color {
            return false;
        }
        self.disabled = !enable;
        self.exclamation_visible = false;
        self.question_visible = false;
        self.white_dot_visible = false;
        self.material = if enable {
            Material::Tinted(self.color)
        } else {
            Material::Disabled
        };
        info!(hackable = %self.display_name, enable, "hackable_toggled");
        true
    }

    pub fn enable_disable_shield(&mut self, enable: bool, panel_color: ColorTag) -> usize {
        let moved = self.shields.set_color(enable, panel_color);
        if moved > 0 {
            debug!(
                hackable = %self.display_name,
                enable,
                color = %panel_color,
                moved,
                "shields_toggled"
            );
        }
        moved
    }

    /// Shields first: access checks read the shield count against the pre-toggle disable flag.
    pub fn enable_disable(&mut self, enable: bool, panel_color: ColorTag) {
        self.enable_disable_shield(enable, panel_color);
        self.enable_disable_hackable(enable, panel_color);
    }

    pub fn check_access(&self, action: HackAction, embodying: bool) -> Result<(), AccessError> {
        if self.disabled {
            return Err(AccessError::Disabled);
        }
        if self.shields.enabled_count() > 0 {
            return Err(AccessError::Shielded);
        }
        if !self.hackable {
            return Err(AccessError::Forbidden);
        }
        if action == HackAction::WipeMemory {
            if embodying {
                return Err(AccessError::WrongBody);
            }
            if !self.can_wipe_memory {
                return Err(AccessError::WipeForbidden);
            }
        }
        Ok(())
    }

    /// Mirrors an agent's awareness into the access flags.
    pub fn apply_gating(&mut self, invincible: bool) {
        self.hackable = !invincible;
        self.can_wipe_memory = !invincible;
    }

    pub fn wipe_memory(&mut self) {
        self.has_player_memory = false;
        self.question_visible = false;
        info!(hackable = %self.display_name, "memory_wiped");
    }

    pub fn restore_memory(&mut self, store: &dyn MemoryStore, checkpoint: u32) {
        self.has_player_memory = store.recall(MemoryKey::new(checkpoint, self.id));
    }

    pub fn persist_memory(&self, store: &mut dyn MemoryStore, checkpoint: u32) {
        store.remember(MemoryKey::new(checkpoint, self.id), self.has_player_memory);
    }

    /// Per-tick detection pass. Returns whether the player was seen.
    pub fn tick_detection(
        &mut self,
        world: &SceneWorld,
        tester: &VisibilityTester,
        fixed_dt_seconds: f32,
        player: &mut dyn PlayerLink,
        hud: &mut dyn HudLink,
    ) -> bool {
        if self.disabled || self.hacked || self.view.is_none() {
            self.drop_indicator(hud);
            return false;
        }

        let viewpoint = self.viewpoint(world);
        let visible = tester.sees_player(world, viewpoint.as_ref(), self.entity, &*player);

        if visible {
            if self.indicator.is_none() {
                self.indicator = hud.claim_indicator();
            }
            if let (Some(slot), Some(transform)) = (self.indicator, world.transform(self.entity)) {
                hud.point_indicator(slot, transform.position);
            }
            player.increase_detection(fixed_dt_seconds);
            if !self.exclamation_visible {
                debug!(hackable = %self.display_name, "player_spotted");
            }
            self.exclamation_visible = true;
            if self.can_have_memory {
                self.has_player_memory = true;
                self.question_visible = false;
            }
        } else {
            self.drop_indicator(hud);
            self.exclamation_visible = false;
            if self.can_have_memory {
                self.question_visible = self.has_player_memory;
            }
        }

        visible
    }

    fn drop_indicator(&mut self, hud: &mut dyn HudLink) {
        if let Some(slot) = self.indicator.take() {
            hud.release_indicator(slot);
        }
    }

    /// Whether the player's camera has a clear line to this entity's marker point.
    pub fn refresh_white_dot(
        &mut self,
        world: &SceneWorld,
        tester: &VisibilityTester,
        player: &dyn PlayerLink,
    ) {
        if self.disabled {
            return;
        }
        let (Some(transform), Some(view)) = (world.transform(self.entity), player.viewpoint())
        else {
            self.white_dot_visible = false;
            return;
        };

        let origin = transform.position
            + Vec3 {
                x: 0.0,
                y: self.white_dot_height_offset,
                z: 0.0,
            };
        let allowed = if player.is_embodying() {
            vec![self.entity, player.controlled_body()]
        } else {
            vec![self.entity, player.body(), player.controller()]
        };

        self.white_dot_visible = !self.hacked
            && view.covers(transform.position)
            && tester.line_clear(world, origin, view.position, None, &allowed);
    }

    /// Trigger bookkeeping for room volumes. While hacked, the first room entered after
    /// the hack (or after leaving a room) renames this entity and is announced once.
    pub fn track_rooms(&mut self, inside: &[RoomRef<'_>], hud: &mut dyn HudLink) {
        if self.hacked
            && self
                .rooms_inside
                .iter()
                .any(|previous| inside.iter().all(|room| room.id != *previous))
        {
            self.room_announced = false;
        }

        if self.hacked && !self.room_announced {
            if let Some(room) = inside.first() {
                self.room_name = room.name.to_string();
                hud.show_hackable_name(&self.room_name, &self.display_name);
                self.room_announced = true;
            }
        }

        self.rooms_inside = inside.iter().map(|room| room.id).collect();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use engine::{Collider, ColliderShape, LayerMask, Transform};

    use super::super::hud::HudState;
    use super::super::player::{PlayerState, StealthGauge};
    use super::*;

    const SIGHT: LayerMask = LayerMask::ALL;

    struct Rig {
        world: SceneWorld,
        player: PlayerState,
        hud: HudState,
        tester: VisibilityTester,
        camera_entity: EntityId,
    }

    fn rig() -> Rig {
        let mut world = SceneWorld::default();
        let body = world.spawn(
            Transform::at(Vec3::new(0.0, 0.0, 6.0)),
            "player_body",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.4 }, SIGHT)),
        );
        let controller = world.spawn(
            Transform::at(Vec3::new(0.0, 0.0, 6.0)),
            "player_controller",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.5 }, SIGHT)),
        );
        let camera_entity = world.spawn(
            Transform::default(),
            "camera",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.3 }, SIGHT)),
        );
        world.apply_pending();

        let mut player = PlayerState::new(
            body,
            controller,
            ViewSpec::from_degrees(0.0, 90.0, 30.0),
            StealthGauge::new(10.0, 5.0, 1.0),
        );
        player.refresh_view(Some(Viewpoint {
            position: Vec3::new(0.0, 0.0, 6.0),
            yaw_radians: std::f32::consts::PI,
            half_fov_radians: std::f32::consts::FRAC_PI_4,
            range: 30.0,
        }));

        Rig {
            world,
            player,
            hud: HudState::new(2),
            tester: VisibilityTester::new(SIGHT),
            camera_entity,
        }
    }

    fn camera(rig: &Rig, color: ColorTag, shields: Vec<ShieldGate>) -> HackableEntity {
        HackableEntity::new(
            HackableId(0),
            HackableConfig {
                kind: HackableKind::Camera,
                color,
                display_name: "Lobby Cam".to_string(),
                room_name: "Lobby".to_string(),
                entity: rig.camera_entity,
                view: Some(ViewSpec::from_degrees(0.5, 90.0, 20.0)),
                can_have_memory: true,
                shields,
                white_dot_height_offset: 0.5,
            },
        )
        .expect("camera")
    }

    fn spawn_wall_between(rig: &mut Rig) -> EntityId {
        let wall = rig.world.spawn(
            Transform::at(Vec3::new(0.0, 0.0, 3.0)),
            "wall",
            Some(Collider::solid(
                ColliderShape::Box {
                    half_extents: Vec3::new(3.0, 3.0, 0.2),
                },
                SIGHT,
            )),
        );
        rig.world.apply_pending();
        wall
    }

    #[test]
    fn camera_without_viewpoint_is_rejected() {
        let rig = rig();
        let error = HackableEntity::new(
            HackableId(0),
            HackableConfig {
                kind: HackableKind::Camera,
                color: ColorTag::Red,
                display_name: "Blind Cam".to_string(),
                room_name: String::new(),
                entity: rig.camera_entity,
                view: None,
                can_have_memory: false,
                shields: Vec::new(),
                white_dot_height_offset: 0.5,
            },
        )
        .expect_err("camera needs a viewpoint");
        assert!(matches!(error, AssemblyError::CameraWithoutViewpoint { .. }));
    }

    #[test]
    fn access_errors_follow_fixed_priority() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Blue, vec![ShieldGate::new(ColorTag::Blue, false)]);
        entity.apply_gating(true);
        entity.enable_disable_hackable(false, ColorTag::Blue);

        assert_eq!(
            entity.check_access(HackAction::Hack, false),
            Err(AccessError::Disabled)
        );
        entity.enable_disable_hackable(true, ColorTag::Blue);
        assert_eq!(
            entity.check_access(HackAction::Hack, false),
            Err(AccessError::Shielded)
        );
        entity.enable_disable_shield(false, ColorTag::Blue);
        assert_eq!(
            entity.check_access(HackAction::Hack, false),
            Err(AccessError::Forbidden)
        );
        entity.apply_gating(false);
        assert_eq!(entity.check_access(HackAction::Hack, true), Ok(()));
        assert_eq!(
            entity.check_access(HackAction::WipeMemory, true),
            Err(AccessError::WrongBody)
        );
        assert_eq!(entity.check_access(HackAction::WipeMemory, false), Ok(()));
    }

    #[test]
    fn wipe_is_refused_when_wiping_is_forbidden() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.can_wipe_memory = false;
        assert_eq!(entity.check_access(HackAction::Hack, false), Ok(()));
        assert_eq!(
            entity.check_access(HackAction::WipeMemory, false),
            Err(AccessError::WipeForbidden)
        );
    }

    #[test]
    fn two_blue_shields_disabled_together_then_reenabled_block_hacking() {
        let rig = rig();
        let mut entity = camera(
            &rig,
            ColorTag::Blue,
            vec![
                ShieldGate::new(ColorTag::Blue, false),
                ShieldGate::new(ColorTag::Blue, false),
            ],
        );
        assert_eq!(
            entity.check_access(HackAction::Hack, false),
            Err(AccessError::Shielded)
        );

        assert_eq!(entity.enable_disable_shield(false, ColorTag::Blue), 2);
        assert!(entity.shields().disabled().iter().all(ShieldGate::is_disabled));
        assert_eq!(entity.check_access(HackAction::Hack, false), Ok(()));
        assert!(!entity.has_no_shields());

        assert_eq!(entity.enable_disable_shield(true, ColorTag::Blue), 2);
        assert_eq!(
            entity.check_access(HackAction::Hack, false),
            Err(AccessError::Shielded)
        );
    }

    #[test]
    fn color_mismatch_leaves_hackable_untouched() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Blue, Vec::new());
        entity.exclamation_visible = true;

        assert!(!entity.enable_disable_hackable(false, ColorTag::Red));
        assert!(!entity.is_disabled());
        assert!(entity.exclamation_visible());
        assert_eq!(entity.material(), Material::Tinted(ColorTag::Blue));
    }

    #[test]
    fn disabling_clears_presentation_and_swaps_material() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Green, Vec::new());
        entity.exclamation_visible = true;
        entity.question_visible = true;

        assert!(entity.enable_disable_hackable(false, ColorTag::Green));
        assert!(entity.is_disabled());
        assert!(!entity.exclamation_visible());
        assert!(!entity.question_visible());
        assert_eq!(entity.material(), Material::Disabled);
    }

    #[test]
    fn unhack_twice_reports_change_only_once() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.on_hack();
        assert_eq!(entity.render_group(), RenderGroup::CulledWhileHacked);

        assert!(entity.on_unhack());
        assert!(!entity.on_unhack());
        assert!(!entity.is_hacked());
        assert_eq!(entity.render_group(), RenderGroup::Interactable);
    }

    #[test]
    fn repeated_hack_keeps_the_room_announcement() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        let lobby = RoomRef {
            id: EntityId(900),
            name: "Lobby",
        };
        let annex = RoomRef {
            id: EntityId(901),
            name: "Annex",
        };

        assert!(entity.on_hack());
        entity.track_rooms(&[lobby], &mut rig.hud);
        assert_eq!(entity.room_name(), "Lobby");

        assert!(!entity.on_hack());
        assert!(entity.is_hacked());
        entity.track_rooms(&[annex, lobby], &mut rig.hud);
        assert_eq!(entity.room_name(), "Lobby");
    }

    #[test]
    fn forced_unhack_after_panel_disable_clears_player_target() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.on_hack();
        rig.player.embody(entity.id(), entity.entity());

        entity.enable_disable_hackable(false, ColorTag::Red);
        assert!(entity.needs_forced_unhack());

        assert!(entity.forced_unhack(&mut rig.player, &mut rig.hud));
        assert!(!entity.is_hacked());
        assert_eq!(rig.player.hacked_target(), None);
        assert_eq!(rig.hud.static_transitions(), 1);

        assert!(!entity.forced_unhack(&mut rig.player, &mut rig.hud));
        assert_eq!(rig.hud.static_transitions(), 1);
    }

    #[test]
    fn reenabled_shield_while_hacked_requires_forced_unhack() {
        let rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, vec![ShieldGate::new(ColorTag::Yellow, true)]);
        entity.on_hack();
        assert!(!entity.needs_forced_unhack());
        entity.enable_disable_shield(true, ColorTag::Yellow);
        assert!(entity.needs_forced_unhack());
    }

    #[test]
    fn detection_claims_indicator_and_latches_memory() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());

        let seen = entity.tick_detection(&rig.world, &rig.tester, 0.5, &mut rig.player, &mut rig.hud);

        assert!(seen);
        assert!(entity.exclamation_visible());
        assert!(!entity.question_visible());
        assert!(entity.has_player_memory());
        assert_eq!(entity.indicator(), Some(IndicatorSlot(0)));
        assert_eq!(rig.hud.active_indicator_count(), 1);
        assert!((rig.player.stealth_ratio() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn losing_sight_releases_indicator_and_shows_suspicion() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.tick_detection(&rig.world, &rig.tester, 0.1, &mut rig.player, &mut rig.hud);

        spawn_wall_between(&mut rig);
        let seen = entity.tick_detection(&rig.world, &rig.tester, 0.1, &mut rig.player, &mut rig.hud);

        assert!(!seen);
        assert!(!entity.exclamation_visible());
        assert!(entity.question_visible());
        assert_eq!(entity.indicator(), None);
        assert_eq!(rig.hud.active_indicator_count(), 0);
    }

    #[test]
    fn disabled_camera_neither_detects_nor_holds_indicator() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.tick_detection(&rig.world, &rig.tester, 0.1, &mut rig.player, &mut rig.hud);
        entity.enable_disable_hackable(false, ColorTag::Red);

        let seen = entity.tick_detection(&rig.world, &rig.tester, 0.1, &mut rig.player, &mut rig.hud);
        assert!(!seen);
        assert_eq!(rig.hud.active_indicator_count(), 0);
    }

    #[test]
    fn white_dot_needs_clear_line_and_unhacked_entity() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.refresh_white_dot(&rig.world, &rig.tester, &rig.player);
        assert!(entity.white_dot_visible());

        entity.on_hack();
        entity.refresh_white_dot(&rig.world, &rig.tester, &rig.player);
        assert!(!entity.white_dot_visible());

        entity.on_unhack();
        spawn_wall_between(&mut rig);
        entity.refresh_white_dot(&rig.world, &rig.tester, &rig.player);
        assert!(!entity.white_dot_visible());
    }

    #[test]
    fn room_name_is_announced_once_per_entry_while_hacked() {
        let mut rig = rig();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        let vault = RoomRef {
            id: EntityId(100),
            name: "Vault",
        };
        let hall = RoomRef {
            id: EntityId(101),
            name: "Hall",
        };

        entity.track_rooms(&[vault], &mut rig.hud);
        assert_eq!(rig.hud.hackable_line(), None);

        entity.on_hack();
        entity.track_rooms(&[vault], &mut rig.hud);
        assert_eq!(entity.room_name(), "Vault");
        assert_eq!(rig.hud.hackable_line(), Some("Vault / Lobby Cam"));

        entity.track_rooms(&[vault, hall], &mut rig.hud);
        assert_eq!(entity.room_name(), "Vault");

        entity.track_rooms(&[hall], &mut rig.hud);
        assert_eq!(entity.room_name(), "Hall");
        assert_eq!(rig.hud.hackable_line(), Some("Hall / Lobby Cam"));
    }

    #[test]
    fn memory_flag_round_trips_through_store() {
        let rig = rig();
        let mut store: HashMap<MemoryKey, bool> = HashMap::new();
        let mut entity = camera(&rig, ColorTag::Red, Vec::new());
        entity.has_player_memory = true;
        entity.persist_memory(&mut store, 3);

        let mut restored = camera(&rig, ColorTag::Red, Vec::new());
        restored.restore_memory(&store, 3);
        assert!(restored.has_player_memory());

        let mut other_checkpoint = camera(&rig, ColorTag::Red, Vec::new());
        other_checkpoint.restore_memory(&store, 4);
        assert!(!other_checkpoint.has_player_memory());

        restored.wipe_memory();
        assert!(!restored.has_player_memory());
        assert!(!restored.question_visible());
    }
}
