use engine::EntityId;
use tracing::{info, warn};

use super::collaborators::PlayerLink;
use super::types::HackableId;
use super::visibility::{ViewSpec, Viewpoint};

/// Global detection accumulator. Observers push it up; it drains on ticks nobody sees the player.
#[derive(Debug, Clone, PartialEq)]
pub struct StealthGauge {
    value: f32,
    threshold: f32,
    gain_per_second: f32,
    decay_per_second: f32,
    observed_this_tick: bool,
}

impl StealthGauge {
    pub fn new(threshold: f32, gain_per_second: f32, decay_per_second: f32) -> Self {
        let threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            warn!(threshold, "stealth_threshold_invalid_using_one");
            1.0
        };
        Self {
            value: 0.0,
            threshold,
            gain_per_second: gain_per_second.max(0.0),
            decay_per_second: decay_per_second.max(0.0),
            observed_this_tick: false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn ratio(&self) -> f32 {
        self.value / self.threshold
    }

    pub fn is_full(&self) -> bool {
        self.value >= self.threshold
    }

    pub fn increase(&mut self, fixed_dt_seconds: f32) {
        self.value = (self.value + self.gain_per_second * fixed_dt_seconds).min(self.threshold);
        self.observed_this_tick = true;
    }

    /// Closes the tick: decays when no observer reported, then reports whether the gauge is full.
    pub fn settle(&mut self, fixed_dt_seconds: f32) -> bool {
        if !self.observed_this_tick {
            self.value = (self.value - self.decay_per_second * fixed_dt_seconds).max(0.0);
        }
        self.observed_this_tick = false;
        self.is_full()
    }
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    body: EntityId,
    controller: EntityId,
    view: ViewSpec,
    gauge: StealthGauge,
    hacked_target: Option<(HackableId, EntityId)>,
    current_view: Option<Viewpoint>,
}

impl PlayerState {
    pub fn new(body: EntityId, controller: EntityId, view: ViewSpec, gauge: StealthGauge) -> Self {
        Self {
            body,
            controller,
            view,
            gauge,
            hacked_target: None,
            current_view: None,
        }
    }

    pub fn view_spec(&self) -> ViewSpec {
        self.view
    }

    pub fn gauge(&self) -> &StealthGauge {
        &self.gauge
    }

    pub fn settle_gauge(&mut self, fixed_dt_seconds: f32) -> bool {
        self.gauge.settle(fixed_dt_seconds)
    }

    /// Switches control into a hacked entity's body.
    pub fn embody(&mut self, target: HackableId, target_body: EntityId) {
        self.hacked_target = Some((target, target_body));
    }

    /// Camera the player currently looks through, refreshed by the scene each tick.
    pub fn refresh_view(&mut self, viewpoint: Option<Viewpoint>) {
        self.current_view = viewpoint;
    }
}

impl PlayerLink for PlayerState {
    fn body(&self) -> EntityId {
        self.body
    }

    fn controller(&self) -> EntityId {
        self.controller
    }

    fn controlled_body(&self) -> EntityId {
        self.hacked_target
            .map(|(_, target_body)| target_body)
            .unwrap_or(self.body)
    }

    fn is_embodying(&self) -> bool {
        self.hacked_target.is_some()
    }

    fn viewpoint(&self) -> Option<Viewpoint> {
        self.current_view
    }

    fn increase_detection(&mut self, fixed_dt_seconds: f32) {
        self.gauge.increase(fixed_dt_seconds);
    }

    fn stealth_ratio(&self) -> f32 {
        self.gauge.ratio()
    }

    fn hacked_target(&self) -> Option<HackableId> {
        self.hacked_target.map(|(target, _)| target)
    }

    fn clear_hacked_target(&mut self) {
        if let Some((target, _)) = self.hacked_target.take() {
            info!(hackable = target.0, "player_returned_to_body");
        }
    }
}
