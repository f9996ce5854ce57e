use engine::{yaw_to_forward, EntityId, LayerMask, SceneWorld, Transform, Vec3};

use super::collaborators::PlayerLink;

/// Eye placement and view cone relative to the owning entity's transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSpec {
    pub eye_height: f32,
    pub half_fov_radians: f32,
    pub range: f32,
}

impl ViewSpec {
    pub fn from_degrees(eye_height: f32, fov_degrees: f32, range: f32) -> Self {
        Self {
            eye_height,
            half_fov_radians: (fov_degrees.clamp(0.0, 360.0) * 0.5).to_radians(),
            range: range.max(0.0),
        }
    }

    pub fn at(&self, transform: Transform) -> Viewpoint {
        Viewpoint {
            position: transform.position
                + Vec3 {
                    x: 0.0,
                    y: self.eye_height,
                    z: 0.0,
                },
            yaw_radians: transform.yaw_radians,
            half_fov_radians: self.half_fov_radians,
            range: self.range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub position: Vec3,
    pub yaw_radians: f32,
    pub half_fov_radians: f32,
    pub range: f32,
}

impl Viewpoint {
    /// Range and horizontal cone test; occlusion is not considered.
    pub fn covers(&self, point: Vec3) -> bool {
        let offset = point - self.position;
        if offset.length() > self.range {
            return false;
        }
        let Some(direction) = offset.flattened().normalized() else {
            return true;
        };
        let forward = yaw_to_forward(self.yaw_radians);
        direction.dot(forward) >= self.half_fov_radians.cos() - 1e-5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityTester {
    mask: LayerMask,
}

impl VisibilityTester {
    pub const fn new(mask: LayerMask) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> LayerMask {
        self.mask
    }

    /// True when every solid collider between `from` and `to` is `target` or an exception.
    pub fn line_clear(
        &self,
        world: &SceneWorld,
        from: Vec3,
        to: Vec3,
        target: Option<EntityId>,
        exceptions: &[EntityId],
    ) -> bool {
        let offset = to - from;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return true;
        }
        world
            .raycast_all(from, offset, distance, self.mask)
            .iter()
            .all(|hit| {
                hit.trigger || Some(hit.entity) == target || exceptions.contains(&hit.entity)
            })
    }

    pub fn is_visible(
        &self,
        world: &SceneWorld,
        from: Vec3,
        target: EntityId,
        exceptions: &[EntityId],
    ) -> bool {
        let Some(entity) = world.find_entity(target) else {
            return false;
        };
        self.line_clear(
            world,
            from,
            entity.transform.position,
            Some(target),
            exceptions,
        )
    }

    /// Cone check followed by the occlusion ray. A missing viewpoint or target is "not visible".
    pub fn is_visible_from(
        &self,
        world: &SceneWorld,
        viewpoint: Option<&Viewpoint>,
        target: EntityId,
        exceptions: &[EntityId],
    ) -> bool {
        let Some(viewpoint) = viewpoint else {
            return false;
        };
        let Some(entity) = world.find_entity(target) else {
            return false;
        };
        viewpoint.covers(entity.transform.position)
            && self.is_visible(world, viewpoint.position, target, exceptions)
    }

    /// Whether `observer` currently sees the body the player is acting through. An
    /// observer the player is embodying never sees itself.
    pub fn sees_player(
        &self,
        world: &SceneWorld,
        viewpoint: Option<&Viewpoint>,
        observer: EntityId,
        player: &dyn PlayerLink,
    ) -> bool {
        if player.controlled_body() == observer {
            return false;
        }
        let exceptions = player.sight_exceptions(observer);
        self.is_visible_from(world, viewpoint, player.controlled_body(), &exceptions)
    }
}

#[cfg(test)]
mod tests {
    use engine::{Collider, ColliderShape};

    use super::*;

    const WALLS: LayerMask = LayerMask::bit(0);
    const BODIES: LayerMask = LayerMask::bit(1);

    fn spawn_sphere(world: &mut SceneWorld, position: Vec3, layers: LayerMask) -> EntityId {
        world.spawn(
            Transform::at(position),
            "sphere",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.4 }, layers)),
        )
    }

    fn spawn_wall(world: &mut SceneWorld, position: Vec3) -> EntityId {
        world.spawn(
            Transform::at(position),
            "wall",
            Some(Collider::solid(
                ColliderShape::Box {
                    half_extents: Vec3::new(2.0, 2.0, 0.2),
                },
                WALLS,
            )),
        )
    }

    fn eye_facing_positive_z() -> Viewpoint {
        ViewSpec::from_degrees(0.0, 90.0, 20.0).at(Transform::default())
    }

    #[test]
    fn cone_rejects_points_behind_and_out_of_range() {
        let view = eye_facing_positive_z();
        assert!(view.covers(Vec3::new(0.0, 0.0, 5.0)));
        assert!(view.covers(Vec3::new(4.9, 0.0, 5.0)));
        assert!(!view.covers(Vec3::new(6.0, 0.0, 5.0)));
        assert!(!view.covers(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!view.covers(Vec3::new(0.0, 0.0, 25.0)));
    }

    #[test]
    fn wall_between_observer_and_target_blocks_sight() {
        let mut world = SceneWorld::default();
        let target = spawn_sphere(&mut world, Vec3::new(0.0, 0.0, 8.0), BODIES);
        let wall = spawn_wall(&mut world, Vec3::new(0.0, 0.0, 4.0));
        world.apply_pending();

        let tester = VisibilityTester::new(WALLS.union(BODIES));
        let view = eye_facing_positive_z();
        assert!(!tester.is_visible_from(&world, Some(&view), target, &[]));
        assert!(tester.is_visible_from(&world, Some(&view), target, &[wall]));
    }

    #[test]
    fn exception_colliders_do_not_occlude() {
        let mut world = SceneWorld::default();
        let target = spawn_sphere(&mut world, Vec3::new(0.0, 0.0, 8.0), BODIES);
        let wrapper = world.spawn(
            Transform::at(Vec3::new(0.0, 0.0, 8.0)),
            "controller",
            Some(Collider::solid(ColliderShape::Sphere { radius: 0.6 }, BODIES)),
        );
        world.apply_pending();

        let tester = VisibilityTester::new(BODIES);
        let view = eye_facing_positive_z();
        assert!(!tester.is_visible_from(&world, Some(&view), target, &[]));
        assert!(tester.is_visible_from(&world, Some(&view), target, &[wrapper]));
    }

    #[test]
    fn missing_references_read_as_not_visible() {
        let mut world = SceneWorld::default();
        let target = spawn_sphere(&mut world, Vec3::new(0.0, 0.0, 3.0), BODIES);
        world.apply_pending();

        let tester = VisibilityTester::new(BODIES);
        assert!(!tester.is_visible_from(&world, None, target, &[]));
        let view = eye_facing_positive_z();
        assert!(!tester.is_visible_from(&world, Some(&view), EntityId(999), &[]));
    }

    #[test]
    fn masked_out_layers_are_ignored() {
        let mut world = SceneWorld::default();
        let target = spawn_sphere(&mut world, Vec3::new(0.0, 0.0, 8.0), BODIES);
        spawn_wall(&mut world, Vec3::new(0.0, 0.0, 4.0));
        world.apply_pending();

        let tester = VisibilityTester::new(BODIES);
        assert!(tester.is_visible(&world, Vec3::ZERO, target, &[]));
    }
}
