use super::scene::Vec3;

pub const DEFAULT_ARRIVAL_THRESHOLD: f32 = 0.1;

/// Straight-line mover used in place of a navmesh agent.
#[derive(Debug, Clone, PartialEq)]
pub struct NavAgent {
    position: Vec3,
    destination: Option<Vec3>,
    velocity: Vec3,
    speed: f32,
    arrival_threshold: f32,
    stopped: bool,
}

impl NavAgent {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            position,
            destination: None,
            velocity: Vec3::ZERO,
            speed: speed.max(0.0),
            arrival_threshold: DEFAULT_ARRIVAL_THRESHOLD,
            stopped: false,
        }
    }

    pub fn with_arrival_threshold(mut self, arrival_threshold: f32) -> Self {
        self.arrival_threshold = arrival_threshold.max(0.0);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn warp(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::ZERO;
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
    }

    pub fn clear_destination(&mut self) {
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
        if stopped {
            self.velocity = Vec3::ZERO;
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn has_arrived(&self) -> bool {
        match self.destination {
            Some(destination) => self.position.distance(destination) <= self.arrival_threshold,
            None => true,
        }
    }

    /// Moves toward the destination; returns true once the agent stands on it.
    pub fn step(&mut self, fixed_dt_seconds: f32) -> bool {
        let Some(destination) = self.destination else {
            self.velocity = Vec3::ZERO;
            return true;
        };
        if self.stopped {
            self.velocity = Vec3::ZERO;
            return self.has_arrived();
        }

        let previous = self.position;
        let (next, arrived) = step_toward(
            previous,
            destination,
            self.speed,
            fixed_dt_seconds,
            self.arrival_threshold,
        );
        self.position = next;
        self.velocity = if fixed_dt_seconds > 0.0 {
            (next - previous) * fixed_dt_seconds.recip()
        } else {
            Vec3::ZERO
        };
        arrived
    }
}

pub fn step_toward(
    current: Vec3,
    target: Vec3,
    speed: f32,
    fixed_dt_seconds: f32,
    arrival_threshold: f32,
) -> (Vec3, bool) {
    let delta = target - current;
    let distance_sq = delta.length_squared();
    if distance_sq <= arrival_threshold * arrival_threshold {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    let max_step = speed * fixed_dt_seconds;
    if max_step >= distance {
        return (target, true);
    }

    (current + delta * (max_step / distance), false)
}
