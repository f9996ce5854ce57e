use super::scene::{EntityId, SceneWorld, Vec3};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    pub const fn bit(index: u32) -> Self {
        Self(1 << (index % 32))
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Shapes are axis-aligned and centred on the owning entity's position; yaw is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    pub layers: LayerMask,
    /// Trigger volumes report overlaps and ray hits but never block a ray.
    pub trigger: bool,
}

impl Collider {
    pub fn solid(shape: ColliderShape, layers: LayerMask) -> Self {
        Self {
            shape,
            layers,
            trigger: false,
        }
    }

    pub fn trigger(shape: ColliderShape, layers: LayerMask) -> Self {
        Self {
            shape,
            layers,
            trigger: true,
        }
    }

    pub fn contains(&self, center: Vec3, point: Vec3) -> bool {
        let local = point - center;
        match self.shape {
            ColliderShape::Sphere { radius } => local.length_squared() <= radius * radius,
            ColliderShape::Box { half_extents } => {
                local.x.abs() <= half_extents.x
                    && local.y.abs() <= half_extents.y
                    && local.z.abs() <= half_extents.z
            }
        }
    }

    /// Distance along a unit `direction` to the first surface, `0.0` when `origin` is inside.
    pub fn ray_distance(&self, center: Vec3, origin: Vec3, direction: Vec3) -> Option<f32> {
        match self.shape {
            ColliderShape::Sphere { radius } => ray_sphere(origin, direction, center, radius),
            ColliderShape::Box { half_extents } => {
                ray_box(origin, direction, center - half_extents, center + half_extents)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: EntityId,
    pub distance: f32,
    pub trigger: bool,
}

impl SceneWorld {
    /// Every collider on `mask` the ray touches within `max_distance`, nearest first.
    pub fn raycast_all(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Vec<RayHit> {
        let Some(direction) = direction.normalized() else {
            return Vec::new();
        };
        if !origin.is_finite() || !(max_distance >= 0.0) {
            return Vec::new();
        }

        let mut hits: Vec<RayHit> = self
            .entities()
            .iter()
            .filter_map(|entity| {
                let collider = entity.collider.as_ref()?;
                if !collider.layers.intersects(mask) {
                    return None;
                }
                let distance =
                    collider.ray_distance(entity.transform.position, origin, direction)?;
                (distance <= max_distance).then_some(RayHit {
                    entity: entity.id,
                    distance,
                    trigger: collider.trigger,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        hits
    }

    /// Trigger volumes on `mask` containing `point`, in spawn order.
    pub fn overlapping_triggers(&self, point: Vec3, mask: LayerMask) -> Vec<EntityId> {
        self.entities()
            .iter()
            .filter(|entity| {
                entity.collider.as_ref().is_some_and(|collider| {
                    collider.trigger
                        && collider.layers.intersects(mask)
                        && collider.contains(entity.transform.position, point)
                })
            })
            .map(|entity| entity.id)
            .collect()
    }

    pub fn contains_point(&self, id: EntityId, point: Vec3) -> bool {
        self.find_entity(id).is_some_and(|entity| {
            entity
                .collider
                .as_ref()
                .is_some_and(|collider| collider.contains(entity.transform.position, point))
        })
    }
}

fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = offset.dot(direction);
    if b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some(-b - discriminant.sqrt())
}

fn ray_box(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_near = 0.0f32;
    let mut t_far = f32::INFINITY;

    for (o, d, lo, hi) in [
        (origin.x, direction.x, min.x, max.x),
        (origin.y, direction.y, min.y, max.y),
        (origin.z, direction.z, min.z, max.z),
    ] {
        if d.abs() <= f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = d.recip();
        let (t0, t1) = {
            let a = (lo - o) * inv;
            let b = (hi - o) * inv;
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        };
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    Some(t_near)
}

#[cfg(test)]
mod tests {
    use super::super::scene::Transform;
    use super::*;

    const WALLS: LayerMask = LayerMask::bit(0);
    const ACTORS: LayerMask = LayerMask::bit(1);

    fn spawn_at(world: &mut SceneWorld, position: Vec3, collider: Collider) -> EntityId {
        world.spawn(Transform::at(position), "body", Some(collider))
    }

    #[test]
    fn layer_mask_bits_compose() {
        let both = WALLS.union(ACTORS);
        assert!(both.intersects(WALLS));
        assert!(both.intersects(ACTORS));
        assert!(!WALLS.intersects(ACTORS));
        assert!(!LayerMask::NONE.intersects(LayerMask::ALL));
    }

    #[test]
    fn raycast_sorts_hits_by_distance() {
        let mut world = SceneWorld::default();
        let far = spawn_at(
            &mut world,
            Vec3::new(0.0, 0.0, 10.0),
            Collider::solid(ColliderShape::Sphere { radius: 1.0 }, ACTORS),
        );
        let near = spawn_at(
            &mut world,
            Vec3::new(0.0, 0.0, 4.0),
            Collider::solid(
                ColliderShape::Box {
                    half_extents: Vec3::new(2.0, 2.0, 0.5),
                },
                WALLS,
            ),
        );
        world.apply_pending();

        let hits = world.raycast_all(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), 20.0, LayerMask::ALL);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity, near);
        assert!((hits[0].distance - 3.5).abs() < 1e-4);
        assert_eq!(hits[1].entity, far);
        assert!((hits[1].distance - 9.0).abs() < 1e-4);
    }

    #[test]
    fn raycast_respects_mask_and_range() {
        let mut world = SceneWorld::default();
        spawn_at(
            &mut world,
            Vec3::new(0.0, 0.0, 10.0),
            Collider::solid(ColliderShape::Sphere { radius: 1.0 }, ACTORS),
        );
        world.apply_pending();

        let forward = Vec3::new(0.0, 0.0, 1.0);
        assert!(world.raycast_all(Vec3::ZERO, forward, 20.0, WALLS).is_empty());
        assert!(world.raycast_all(Vec3::ZERO, forward, 5.0, ACTORS).is_empty());
        assert!(world.raycast_all(Vec3::ZERO, -forward, 20.0, ACTORS).is_empty());
        assert!(world.raycast_all(Vec3::ZERO, Vec3::ZERO, 20.0, ACTORS).is_empty());
    }

    #[test]
    fn ray_starting_inside_reports_zero_distance() {
        let mut world = SceneWorld::default();
        let room = spawn_at(
            &mut world,
            Vec3::ZERO,
            Collider::trigger(
                ColliderShape::Box {
                    half_extents: Vec3::new(5.0, 5.0, 5.0),
                },
                WALLS,
            ),
        );
        world.apply_pending();

        let hits = world.raycast_all(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 1.0, WALLS);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, room);
        assert_eq!(hits[0].distance, 0.0);
        assert!(hits[0].trigger);
    }

    #[test]
    fn overlapping_triggers_skip_solid_colliders() {
        let mut world = SceneWorld::default();
        let zone = spawn_at(
            &mut world,
            Vec3::ZERO,
            Collider::trigger(ColliderShape::Sphere { radius: 2.0 }, WALLS),
        );
        let solid = spawn_at(
            &mut world,
            Vec3::ZERO,
            Collider::solid(ColliderShape::Sphere { radius: 2.0 }, WALLS),
        );
        world.apply_pending();

        let point = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(world.overlapping_triggers(point, WALLS), vec![zone]);
        assert!(world.contains_point(solid, point));
        assert!(!world.contains_point(solid, Vec3::new(3.0, 0.0, 0.0)));
    }
}
