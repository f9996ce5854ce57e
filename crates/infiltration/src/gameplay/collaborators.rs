//! Contracts the detection-and-control core calls into. The scene passes concrete
//! implementations in on every tick; nothing here is reached through globals.

use std::collections::HashMap;
use std::fmt;

use engine::{EntityId, NavAgent, Vec3};

use crate::persistence::MemoryStoreError;

use super::types::HackableId;
use super::visibility::Viewpoint;

pub trait PlayerLink {
    /// The player's physical body collider.
    fn body(&self) -> EntityId;
    /// The character-controller collider wrapped around the body.
    fn controller(&self) -> EntityId;
    /// The body the player currently sees and acts through: the hacked entity while
    /// embodying, otherwise the physical body.
    fn controlled_body(&self) -> EntityId;
    fn is_embodying(&self) -> bool;
    fn viewpoint(&self) -> Option<Viewpoint>;
    fn increase_detection(&mut self, fixed_dt_seconds: f32);
    fn stealth_ratio(&self) -> f32;
    fn hacked_target(&self) -> Option<HackableId>;
    fn clear_hacked_target(&mut self);

    /// Colliders that never occlude a sight line toward the player.
    fn sight_exceptions(&self, observer: EntityId) -> Vec<EntityId> {
        let mut exceptions = vec![observer, self.controller()];
        if self.is_embodying() {
            exceptions.push(self.body());
        }
        exceptions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorSlot(pub usize);

pub trait HudLink {
    fn claim_indicator(&mut self) -> Option<IndicatorSlot>;
    fn release_indicator(&mut self, slot: IndicatorSlot);
    fn point_indicator(&mut self, slot: IndicatorSlot, target: Vec3);
    fn show_static_transition(&mut self);
    fn show_hackable_name(&mut self, room_name: &str, hackable_name: &str);
    /// Paused or game over; all per-tick gameplay stops while this holds.
    fn is_halted(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryKey {
    pub checkpoint: u32,
    pub hackable: HackableId,
}

impl MemoryKey {
    pub fn new(checkpoint: u32, hackable: HackableId) -> Self {
        Self {
            checkpoint,
            hackable,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (checkpoint, index) = raw.split_once(':')?;
        Some(Self {
            checkpoint: checkpoint.trim().parse().ok()?,
            hackable: HackableId(index.trim().parse().ok()?),
        })
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.checkpoint, self.hackable.0)
    }
}

pub trait MemoryStore {
    /// Unknown keys read as "no memory".
    fn recall(&self, key: MemoryKey) -> bool;
    fn remember(&mut self, key: MemoryKey, has_player_memory: bool);
    fn flush(&mut self) -> Result<(), MemoryStoreError> {
        Ok(())
    }
}

impl MemoryStore for HashMap<MemoryKey, bool> {
    fn recall(&self, key: MemoryKey) -> bool {
        self.get(&key).copied().unwrap_or(false)
    }

    fn remember(&mut self, key: MemoryKey, has_player_memory: bool) {
        self.insert(key, has_player_memory);
    }
}

/// Opaque path follower driven by a patrol agent.
pub trait Navigator {
    fn position(&self) -> Vec3;
    fn set_destination(&mut self, point: Vec3);
    fn destination(&self) -> Option<Vec3>;
    fn is_stopped(&self) -> bool;
    fn set_stopped(&mut self, stopped: bool);
    fn velocity(&self) -> Vec3;
    /// Moves along the current path; returns true when standing on the destination.
    fn advance(&mut self, fixed_dt_seconds: f32) -> bool;
}

impl Navigator for NavAgent {
    fn position(&self) -> Vec3 {
        NavAgent::position(self)
    }

    fn set_destination(&mut self, point: Vec3) {
        NavAgent::set_destination(self, point);
    }

    fn destination(&self) -> Option<Vec3> {
        NavAgent::destination(self)
    }

    fn is_stopped(&self) -> bool {
        NavAgent::is_stopped(self)
    }

    fn set_stopped(&mut self, stopped: bool) {
        NavAgent::set_stopped(self, stopped);
    }

    fn velocity(&self) -> Vec3 {
        NavAgent::velocity(self)
    }

    fn advance(&mut self, fixed_dt_seconds: f32) -> bool {
        self.step(fixed_dt_seconds)
    }
}
