//! Detection-and-control core: who can see the player, who can be hacked, and how
//! patrolling agents react. The scene in `scene.rs` wires the pieces together per tick.

use engine::LayerMask;
use thiserror::Error;

pub mod collaborators;
pub mod hackable;
pub mod hud;
pub mod patrol;
pub mod player;
pub mod routine;
pub mod scene;
pub mod shield;
pub mod types;
pub mod visibility;

pub use collaborators::{HudLink, IndicatorSlot, MemoryKey, MemoryStore, Navigator, PlayerLink};
pub use hackable::{AccessError, HackableConfig, HackableEntity, RoomRef};
pub use hud::HudState;
pub use patrol::{AgentState, PatrolAgent, PatrolSettings, Waypoint};
pub use player::{PlayerState, StealthGauge};
pub use routine::{Routine, RoutineKind, ScanTimings};
pub use scene::StealthScene;
pub use shield::{ShieldGate, ShieldSet};
pub use types::{ColorTag, HackAction, HackableId, HackableKind, Material, RenderGroup};
pub use visibility::{ViewSpec, Viewpoint, VisibilityTester};

pub const WALLS: LayerMask = LayerMask::bit(0);
pub const BODIES: LayerMask = LayerMask::bit(1);
pub const CONTROLLERS: LayerMask = LayerMask::bit(2);
pub const HACKABLES: LayerMask = LayerMask::bit(3);
pub const ROOMS: LayerMask = LayerMask::bit(4);
pub const WAYPOINTS: LayerMask = LayerMask::bit(5);
pub const MARKERS: LayerMask = LayerMask::bit(6);

/// Layers a sight line can be blocked by.
pub const SIGHT: LayerMask = WALLS.union(BODIES).union(CONTROLLERS).union(HACKABLES);

/// Level wiring that cannot produce a playable scene.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("camera '{name}' has no viewpoint")]
    CameraWithoutViewpoint { name: String },
    #[error("agent '{agent}' has no waypoints")]
    EmptyRoute { agent: String },
    #[error("{referrer} references unknown hackable '{key}'")]
    UnknownHackable { referrer: String, key: String },
    #[error("{referrer} references unknown panel '{key}'")]
    UnknownPanel { referrer: String, key: String },
}
