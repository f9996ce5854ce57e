use engine::{forward_to_yaw, Collider, ColliderShape, EntityId, NavAgent, SceneWorld, Transform, Vec3};
use tracing::{debug, info};

use super::collaborators::{Navigator, PlayerLink};
use super::hackable::HackableEntity;
use super::routine::{Routine, RoutineKind, ScanTimings};
use super::types::HackableId;
use super::visibility::VisibilityTester;
use super::{AssemblyError, MARKERS, WAYPOINTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Patrolling,
    IdleFacing,
    Alarmed,
    Chasing,
    Searching,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Vec3,
    /// Facing adopted by a stationary agent on arrival.
    pub yaw_radians: f32,
    pub randomise_idle: bool,
    pub always_idle: bool,
    /// Trigger volume whose overlap counts as arrival.
    pub trigger: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatrolSettings {
    /// Cycle through the route; otherwise hold at the first waypoint.
    pub patrol: bool,
    pub idle_look_around: bool,
    pub can_chase: bool,
    pub idle_duration_seconds: f32,
    pub min_stealth_percent: f32,
    pub alarm_position: Vec3,
    pub marker_radius: f32,
    pub scan: ScanTimings,
}

/// Movement and awareness state machine for a mobile hackable.
#[derive(Debug)]
pub struct PatrolAgent<N: Navigator = NavAgent> {
    name: String,
    hackable: HackableId,
    nav: N,
    route: Vec<Waypoint>,
    settings: PatrolSettings,
    rng: fastrand::Rng,
    yaw_radians: f32,
    current_index: usize,
    registered: bool,
    waypoints_inside: Vec<EntityId>,
    alarmed: bool,
    sent_back: bool,
    chasing: bool,
    finding: bool,
    reached_last_seen: bool,
    invincible: bool,
    reached_idle: bool,
    first_idle: bool,
    marker: Option<EntityId>,
    routine: Option<Routine>,
    state: AgentState,
}

impl<N: Navigator> PatrolAgent<N> {
    pub fn new(
        name: impl Into<String>,
        hackable: HackableId,
        nav: N,
        route: Vec<Waypoint>,
        settings: PatrolSettings,
        seed: u64,
    ) -> Result<Self, AssemblyError> {
        let name = name.into();
        if route.is_empty() {
            return Err(AssemblyError::EmptyRoute { agent: name });
        }
        let initial_state = if settings.patrol {
            AgentState::Patrolling
        } else {
            AgentState::IdleFacing
        };

        Ok(Self {
            name,
            hackable,
            nav,
            route,
            settings,
            rng: fastrand::Rng::with_seed(seed),
            yaw_radians: 0.0,
            current_index: 0,
            registered: false,
            waypoints_inside: Vec::new(),
            alarmed: false,
            sent_back: false,
            chasing: false,
            finding: false,
            reached_last_seen: false,
            invincible: false,
            reached_idle: false,
            first_idle: true,
            marker: None,
            routine: None,
            state: initial_state,
        })
    }

    /// Initial facing, written to the bound entity on the first tick.
    pub fn with_yaw(mut self, yaw_radians: f32) -> Self {
        self.yaw_radians = yaw_radians;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hackable(&self) -> HackableId {
        self.hackable
    }

    pub fn nav(&self) -> &N {
        &self.nav
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible
    }

    pub fn is_chasing(&self) -> bool {
        self.chasing
    }

    pub fn is_finding_player(&self) -> bool {
        self.finding
    }

    pub fn is_alarmed(&self) -> bool {
        self.alarmed
    }

    pub fn marker(&self) -> Option<EntityId> {
        self.marker
    }

    pub fn routine_kind(&self) -> Option<RoutineKind> {
        self.routine.as_ref().map(Routine::kind)
    }

    pub fn raise_alarm(&mut self) {
        if !self.alarmed {
            info!(agent = %self.name, "alarm_raised");
        }
        self.alarmed = true;
    }

    pub fn clear_alarm(&mut self, world: &mut SceneWorld) {
        if !self.alarmed {
            return;
        }
        self.alarmed = false;
        info!(agent = %self.name, "alarm_cleared");
        self.re_route(world);
    }

    /// Abandons any hunt and heads back to the route. Patrolling agents pick the nearest
    /// waypoint; ties keep the lowest index.
    pub fn re_route(&mut self, world: &mut SceneWorld) {
        self.drop_marker(world);
        self.sent_back = true;
        self.chasing = false;
        self.finding = false;
        self.registered = false;
        self.invincible = false;
        self.reached_idle = false;
        self.routine = None;
        self.nav.set_stopped(false);

        if self.settings.patrol {
            let position = self.nav.position();
            let mut nearest = 0;
            for (index, waypoint) in self.route.iter().enumerate().skip(1) {
                if waypoint.position.distance(position)
                    < self.route[nearest].position.distance(position)
                {
                    nearest = index;
                }
            }
            self.current_index = nearest;
        } else {
            self.current_index = 0;
        }
        self.nav.set_destination(self.route[self.current_index].position);
        debug!(agent = %self.name, waypoint = self.current_index, "agent_rerouted");
    }

    /// One fixed step. Must run before the bound hackable's own detection pass so the
    /// access flags it mirrors are current for the tick.
    pub fn tick(
        &mut self,
        world: &mut SceneWorld,
        hackable: &mut HackableEntity,
        tester: &VisibilityTester,
        player: &dyn PlayerLink,
        fixed_dt_seconds: f32,
    ) -> AgentState {
        let suspended = hackable.is_hacked() || hackable.is_disabled();

        if !suspended {
            self.advance_routine(world, fixed_dt_seconds);
            self.nav.advance(fixed_dt_seconds);
            if let Some(yaw) = forward_to_yaw(self.nav.velocity().flattened()) {
                self.yaw_radians = yaw;
            }
        }
        world.set_transform(
            hackable.entity(),
            Transform {
                position: self.nav.position(),
                yaw_radians: self.yaw_radians,
            },
        );

        self.handle_triggers(world, hackable);

        if !suspended && !self.invincible {
            if self.alarmed {
                self.nav.set_destination(self.settings.alarm_position);
            } else if !self.sent_back {
                self.re_route(world);
            }
        }

        let viewpoint = hackable.viewpoint(world);
        let visible = tester.sees_player(world, viewpoint.as_ref(), hackable.entity(), player);
        let exposed = player.stealth_ratio() >= self.settings.min_stealth_percent;

        if self.settings.can_chase && !suspended {
            if visible && exposed {
                self.start_chase(world, player);
            }
            if self.reached_last_seen {
                self.reached_last_seen = false;
                self.routine = Some(Routine::search(&self.settings.scan));
                info!(agent = %self.name, "search_started");
            }
        }

        self.invincible = exposed || self.finding || visible;
        hackable.apply_gating(self.invincible);

        if self.settings.idle_look_around
            && !self.settings.patrol
            && self.reached_idle
            && self.routine.is_none()
            && !self.finding
            && !suspended
        {
            self.routine = Some(Routine::idle_look_around(self.first_idle, &self.settings.scan));
            self.first_idle = false;
        }

        self.update_state(suspended);
        self.state
    }

    fn advance_routine(&mut self, world: &mut SceneWorld, fixed_dt_seconds: f32) {
        let Some(routine) = self.routine.as_mut() else {
            return;
        };
        if !routine.advance(fixed_dt_seconds, &mut self.yaw_radians) {
            return;
        }
        let kind = routine.kind();
        self.routine = None;

        match kind {
            RoutineKind::Search => {
                info!(agent = %self.name, alarmed = self.alarmed, "search_finished");
                if self.alarmed {
                    self.chase_alarm();
                } else {
                    self.re_route(world);
                }
            }
            RoutineKind::WaypointPause => self.nav.set_stopped(false),
            RoutineKind::IdleLookAround => {}
        }
    }

    fn chase_alarm(&mut self) {
        self.finding = false;
        self.invincible = false;
        self.nav.set_destination(self.settings.alarm_position);
    }

    fn start_chase(&mut self, world: &mut SceneWorld, player: &dyn PlayerLink) {
        let Some(target) = world.transform(player.body()).map(|transform| transform.position)
        else {
            return;
        };
        if !self.chasing {
            info!(agent = %self.name, x = target.x, z = target.z, "chase_started");
        }

        self.nav.set_destination(target);
        self.nav.set_stopped(false);
        self.chasing = true;
        self.finding = true;
        self.invincible = true;
        self.reached_last_seen = false;
        self.routine = None;

        self.drop_marker(world);
        self.marker = Some(world.spawn(
            Transform::at(target),
            "last_seen_marker",
            Some(Collider::trigger(
                ColliderShape::Sphere {
                    radius: self.settings.marker_radius,
                },
                MARKERS,
            )),
        ));
    }

    fn drop_marker(&mut self, world: &mut SceneWorld) {
        if let Some(marker) = self.marker.take() {
            world.despawn(marker);
        }
    }

    fn handle_triggers(&mut self, world: &mut SceneWorld, hackable: &HackableEntity) {
        let position = self.nav.position();
        let inside: Vec<EntityId> = world
            .overlapping_triggers(position, WAYPOINTS)
            .into_iter()
            .filter(|id| self.route.iter().any(|waypoint| waypoint.trigger == *id))
            .collect();

        let exited = self
            .waypoints_inside
            .iter()
            .any(|previous| !inside.contains(previous));
        if exited && !hackable.is_hacked() {
            self.registered = false;
        }

        if !inside.is_empty()
            && !hackable.is_hacked()
            && !hackable.is_disabled()
            && !self.registered
            && !self.alarmed
            && !self.chasing
        {
            self.registered = true;
            if self.settings.patrol && inside.contains(&self.route[self.current_index].trigger) {
                self.arrive_at_patrol_point();
            } else if !self.settings.patrol && inside.contains(&self.route[0].trigger) {
                self.arrive_at_idle_point();
            }
        }
        self.waypoints_inside = inside;

        if self.chasing && !hackable.is_disabled() {
            if let Some(marker) = self.marker {
                if world.contains_point(marker, position) {
                    self.reached_last_seen = true;
                    self.chasing = false;
                    self.drop_marker(world);
                    debug!(agent = %self.name, "last_seen_reached");
                }
            }
        }
    }

    fn arrive_at_patrol_point(&mut self) {
        let waypoint = self.route[self.current_index];
        let pause = if waypoint.randomise_idle {
            self.rng.bool()
        } else {
            waypoint.always_idle
        };
        if pause {
            self.nav.set_stopped(true);
            self.routine = Some(Routine::waypoint_pause(self.settings.idle_duration_seconds));
        }

        self.current_index = (self.current_index + 1) % self.route.len();
        self.nav.set_destination(self.route[self.current_index].position);
        debug!(
            agent = %self.name,
            next = self.current_index,
            paused = pause,
            "waypoint_reached"
        );
    }

    fn arrive_at_idle_point(&mut self) {
        self.nav.set_stopped(true);
        self.reached_idle = true;
        self.yaw_radians = self.route[0].yaw_radians;
        debug!(agent = %self.name, "idle_point_reached");
    }

    fn update_state(&mut self, suspended: bool) {
        let next = if suspended {
            AgentState::Disabled
        } else if self.routine_kind() == Some(RoutineKind::Search) {
            AgentState::Searching
        } else if self.chasing {
            AgentState::Chasing
        } else if self.alarmed {
            AgentState::Alarmed
        } else if self.settings.patrol {
            AgentState::Patrolling
        } else {
            AgentState::IdleFacing
        };

        if next != self.state {
            info!(agent = %self.name, from = ?self.state, to = ?next, "agent_state_changed");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::super::collaborators::PlayerLink;
    use super::super::hackable::HackableConfig;
    use super::super::player::{PlayerState, StealthGauge};
    use super::super::types::{ColorTag, HackableKind};
    use super::super::visibility::ViewSpec;
    use super::super::{BODIES, CONTROLLERS, HACKABLES, SIGHT};
    use super::*;

    const DT: f32 = 0.1;

    struct Rig {
        world: SceneWorld,
        player: PlayerState,
        tester: VisibilityTester,
        hackable: HackableEntity,
        agent: PatrolAgent,
        route: Vec<Waypoint>,
    }

    fn settings(patrol: bool) -> PatrolSettings {
        PatrolSettings {
            patrol,
            idle_look_around: true,
            can_chase: true,
            idle_duration_seconds: 1.0,
            min_stealth_percent: 0.1,
            alarm_position: Vec3::new(-8.0, 0.0, 0.0),
            marker_radius: 0.5,
            scan: ScanTimings::default(),
        }
    }

    fn waypoint(world: &mut SceneWorld, position: Vec3) -> Waypoint {
        let trigger = world.spawn(
            Transform::at(position),
            "waypoint",
            Some(Collider::trigger(ColliderShape::Sphere { radius: 0.5 }, WAYPOINTS)),
        );
        Waypoint {
            position,
            yaw_radians: 0.0,
            randomise_idle: false,
            always_idle: false,
            trigger,
        }
    }

    fn rig(start: Vec3, points: &[Vec3], settings: PatrolSettings, player_at: Vec3) -> Rig {
        let mut world = SceneWorld::default();
        let body = world.spawn(
            Transform::at(player_at),
            "player_body",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.4 }, BODIES)),
        );
        let controller = world.spawn(
            Transform::at(player_at),
            "player_controller",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.5 }, CONTROLLERS)),
        );
        let agent_entity = world.spawn(
            Transform::at(start),
            "guard",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.4 }, HACKABLES)),
        );
        let route = points
            .iter()
            .map(|point| waypoint(&mut world, *point))
            .collect::<Vec<_>>();
        world.apply_pending();

        let hackable = HackableEntity::new(
            HackableId(0),
            HackableConfig {
                kind: HackableKind::Agent,
                color: ColorTag::Red,
                display_name: "Guard".to_string(),
                room_name: String::new(),
                entity: agent_entity,
                view: Some(ViewSpec::from_degrees(1.0, 90.0, 20.0)),
                can_have_memory: false,
                shields: Vec::new(),
                white_dot_height_offset: 0.5,
            },
        )
        .expect("agent hackable");
        let agent = PatrolAgent::new(
            "guard",
            HackableId(0),
            NavAgent::new(start, 4.0),
            route.clone(),
            settings,
            7,
        )
        .expect("agent");

        Rig {
            world,
            player: PlayerState::new(
                body,
                controller,
                ViewSpec::from_degrees(1.6, 90.0, 30.0),
                StealthGauge::new(10.0, 5.0, 1.0),
            ),
            tester: VisibilityTester::new(SIGHT),
            hackable,
            agent,
            route,
        }
    }

    fn tick(rig: &mut Rig) -> AgentState {
        let state = rig.agent.tick(
            &mut rig.world,
            &mut rig.hackable,
            &rig.tester,
            &rig.player,
            DT,
        );
        rig.world.apply_pending();
        state
    }

    fn tick_until(rig: &mut Rig, max_ticks: u32, done: impl Fn(&Rig) -> bool) {
        for _ in 0..max_ticks {
            tick(rig);
            if done(&*rig) {
                return;
            }
        }
        panic!("condition not reached within {max_ticks} ticks");
    }

    fn move_player(rig: &mut Rig, position: Vec3) {
        for id in [rig.player.body(), rig.player.controller()] {
            assert!(rig.world.set_transform(id, Transform::at(position)));
        }
    }

    fn expose_player(rig: &mut Rig) {
        rig.player.increase_detection(1.0);
        assert!(rig.player.stealth_ratio() >= 0.5);
    }

    #[test]
    fn empty_route_is_rejected_at_assembly() {
        let error = PatrolAgent::new(
            "lost",
            HackableId(3),
            NavAgent::new(Vec3::ZERO, 1.0),
            Vec::new(),
            settings(true),
            1,
        )
        .expect_err("empty route");
        assert!(matches!(error, AssemblyError::EmptyRoute { agent } if agent == "lost"));
    }

    #[test]
    fn chase_then_search_then_reroute_to_nearest_waypoint() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 8.0),
        ];
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -1.0),
            &points,
            settings(true),
            Vec3::new(0.0, 0.0, 6.0),
        );
        expose_player(&mut rig);

        assert_eq!(tick(&mut rig), AgentState::Chasing);
        assert_eq!(rig.agent.current_index(), 0);
        assert_eq!(rig.agent.nav().destination(), Some(Vec3::new(0.0, 0.0, 6.0)));
        let marker = rig.agent.marker().expect("last seen marker");
        assert!(rig.world.find_entity(marker).is_some());
        assert!(rig.agent.is_invincible());
        assert!(!rig.hackable.is_hackable());
        assert!(!rig.hackable.can_wipe_memory());

        move_player(&mut rig, Vec3::new(0.0, 0.0, -30.0));
        tick_until(&mut rig, 40, |rig| rig.agent.state() == AgentState::Searching);
        assert_eq!(rig.agent.marker(), None);
        assert!(rig.world.find_entity(marker).is_none());
        assert!(rig.agent.is_finding_player());
        assert!(!rig.hackable.is_hackable());

        tick_until(&mut rig, 200, |rig| rig.agent.state() != AgentState::Searching);
        assert_eq!(rig.agent.state(), AgentState::Patrolling);
        assert_eq!(rig.agent.current_index(), 2);
        assert_eq!(rig.agent.nav().destination(), Some(points[2]));
        assert!(!rig.agent.is_finding_player());
        assert!(!rig.agent.is_chasing());
    }

    #[test]
    fn glimpse_below_threshold_grants_invincibility_without_chase() {
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -1.0),
            &[Vec3::ZERO],
            settings(true),
            Vec3::new(0.0, 0.0, 6.0),
        );

        assert_eq!(tick(&mut rig), AgentState::Patrolling);
        assert!(rig.agent.is_invincible());
        assert!(!rig.agent.is_chasing());
        assert!(!rig.hackable.is_hackable());
        assert_eq!(rig.agent.marker(), None);
    }

    #[test]
    fn unaware_agent_stays_hackable() {
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -1.0),
            &[Vec3::ZERO],
            settings(true),
            Vec3::new(0.0, 0.0, -30.0),
        );
        tick(&mut rig);
        assert!(!rig.agent.is_invincible());
        assert!(rig.hackable.is_hackable());
    }

    #[test]
    fn always_idle_waypoint_pauses_then_route_wraps() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 4.0),
        ];
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -2.0),
            &points,
            settings(true),
            Vec3::new(0.0, 0.0, -30.0),
        );
        rig.agent.route[0].always_idle = true;

        tick_until(&mut rig, 20, |rig| rig.agent.current_index() == 1);
        assert!(rig.agent.nav().is_stopped());
        assert_eq!(rig.agent.routine_kind(), Some(RoutineKind::WaypointPause));
        let paused_at = rig.agent.nav().position();

        for _ in 0..5 {
            tick(&mut rig);
        }
        assert_eq!(rig.agent.nav().position(), paused_at);

        tick_until(&mut rig, 20, |rig| !rig.agent.nav().is_stopped());
        tick_until(&mut rig, 40, |rig| rig.agent.current_index() == 2);
        tick_until(&mut rig, 40, |rig| rig.agent.current_index() == 0);
        assert_eq!(rig.agent.nav().destination(), Some(points[0]));
    }

    #[test]
    fn stationary_agent_faces_idle_point_and_looks_around() {
        let mut rig = rig(
            Vec3::ZERO,
            &[Vec3::new(0.0, 0.0, 3.0)],
            settings(false),
            Vec3::new(0.0, 0.0, -30.0),
        );
        rig.agent.route[0].yaw_radians = FRAC_PI_2;

        tick_until(&mut rig, 20, |rig| rig.agent.nav().is_stopped());
        assert_eq!(rig.agent.state(), AgentState::IdleFacing);
        assert_eq!(rig.agent.routine_kind(), Some(RoutineKind::IdleLookAround));
        assert!(!rig.agent.first_idle);

        tick(&mut rig);
        let transform = rig
            .world
            .transform(rig.hackable.entity())
            .expect("agent transform");
        assert!((transform.yaw_radians - FRAC_PI_2).abs() < 0.1);
    }

    #[test]
    fn alarm_overrides_route_until_cleared() {
        let points = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)];
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -1.0),
            &points,
            settings(true),
            Vec3::new(0.0, 0.0, -30.0),
        );
        tick(&mut rig);

        rig.agent.raise_alarm();
        assert_eq!(tick(&mut rig), AgentState::Alarmed);
        assert_eq!(
            rig.agent.nav().destination(),
            Some(Vec3::new(-8.0, 0.0, 0.0))
        );

        rig.agent.clear_alarm(&mut rig.world);
        assert!(!rig.agent.is_alarmed());
        assert_eq!(rig.agent.nav().destination(), Some(points[0]));
        assert_eq!(tick(&mut rig), AgentState::Patrolling);
    }

    #[test]
    fn hacked_agent_is_suspended_in_place() {
        let mut rig = rig(
            Vec3::new(0.0, 0.0, -3.0),
            &[Vec3::ZERO],
            settings(true),
            Vec3::new(0.0, 0.0, -30.0),
        );
        tick(&mut rig);
        rig.hackable.on_hack();
        let held = rig.agent.nav().position();

        for _ in 0..5 {
            assert_eq!(tick(&mut rig), AgentState::Disabled);
        }
        assert_eq!(rig.agent.nav().position(), held);
    }

    #[test]
    fn reroute_breaks_distance_ties_by_lowest_index() {
        let mut rig = rig(
            Vec3::ZERO,
            &[
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(-2.0, 0.0, 0.0),
            ],
            settings(true),
            Vec3::new(0.0, 0.0, -30.0),
        );
        rig.agent.re_route(&mut rig.world);
        assert_eq!(rig.agent.current_index(), 1);
        assert_eq!(rig.agent.nav().destination(), Some(rig.route[1].position));
    }
}
