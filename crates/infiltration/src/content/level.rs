use std::str::FromStr;

use engine::Vec3;

use crate::gameplay::{ColorTag, HackableKind};

#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub name: String,
    pub checkpoint: u32,
    pub player: PlayerDef,
    pub walls: Vec<BoxDef>,
    pub rooms: Vec<RoomDef>,
    pub hackables: Vec<HackableDef>,
    pub panels: Vec<PanelDef>,
    /// Sorted by `at_seconds`; entries sharing a time keep document order.
    pub timeline: Vec<TimelineEntry>,
}

/// Scripted stand-in for the player's locomotion.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDef {
    pub position: Vec3,
    pub yaw_degrees: f32,
    pub route: Vec<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDef {
    pub center: Vec3,
    pub half_extents: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomDef {
    pub name: String,
    pub bounds: BoxDef,
}

/// Missing values fall back to the gameplay tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewDef {
    pub fov_degrees: Option<f32>,
    pub range: Option<f32>,
    pub eye_height: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShieldDef {
    pub color: ColorTag,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HackableDef {
    pub key: String,
    pub name: String,
    pub kind: HackableKind,
    pub color: ColorTag,
    pub room: String,
    pub position: Vec3,
    pub yaw_degrees: f32,
    pub view: Option<ViewDef>,
    pub can_have_memory: bool,
    pub shields: Vec<ShieldDef>,
    pub agent: Option<AgentDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDef {
    pub patrol: bool,
    pub idle_look_around: bool,
    pub can_chase: bool,
    pub idle_duration_seconds: Option<f32>,
    pub min_stealth_percent: Option<f32>,
    pub alarm_position: Vec3,
    pub waypoints: Vec<WaypointDef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointDef {
    pub position: Vec3,
    pub yaw_degrees: f32,
    pub randomise_idle: bool,
    pub always_idle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Both,
    ShieldsOnly,
    HackableOnly,
}

impl FromStr for PanelAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "both" => Ok(Self::Both),
            "shields" => Ok(Self::ShieldsOnly),
            "hackable" => Ok(Self::HackableOnly),
            other => Err(format!(
                "unknown panel action '{other}'; allowed values: both, shields, hackable"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelDef {
    pub key: String,
    pub color: ColorTag,
    pub action: PanelAction,
    /// State the targets are left in before the first activation.
    pub enabled: bool,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub at_seconds: f32,
    pub action: ScriptedAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAction {
    Hack { target: String },
    Unhack,
    Wipe { target: String },
    Panel { panel: String },
    Alarm,
    ClearAlarm,
    Checkpoint,
    Pause,
    Resume,
}
