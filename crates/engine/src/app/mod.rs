mod loop_runner;
mod metrics;
mod nav;
mod physics;
mod scene;

pub use loop_runner::{run_headless, LoopConfig, RunSummary};
pub use metrics::LoopMetricsSnapshot;
pub use nav::{step_toward, NavAgent};
pub use physics::{Collider, ColliderShape, LayerMask, RayHit};
pub use scene::{
    forward_to_yaw, yaw_to_forward, Entity, EntityId, Scene, SceneCommand, SceneRuntime,
    SceneWorld, Transform, Vec3,
};
