mod compiler;
mod hashing;
mod level;

pub use compiler::{
    compile_level, parse_level, CompiledLevel, LevelError, LevelErrorCode, SourceLocation,
};
pub use hashing::level_fingerprint;
pub use level::{
    AgentDef, BoxDef, HackableDef, LevelDef, PanelAction, PanelDef, PlayerDef, RoomDef,
    ScriptedAction, ShieldDef, TimelineEntry, ViewDef, WaypointDef,
};
