mod camera;
mod config;
mod drag;
mod fall;
mod pose;
mod rendering;
mod scale;
mod scene;
mod snapshot;
mod zones;

pub use camera::{
    Camera2D, CameraBounds, CameraHooks, FixedCamera, ViewportCamera, EDGE_SCROLL_SPEED,
    EDGE_SCROLL_THRESHOLD_PX,
};
pub use config::EngineConfig;
pub use drag::{DragController, DragEvent, DragSession, EntityPhase, PointerEvent};
pub use fall::{FallProcess, FallStatus};
pub use pose::{ArtHandle, HoldRejected, PoseArt, PoseAutomaton, PoseEvent};
pub use rendering::{screen_to_world, world_to_screen, Viewport, PIXELS_PER_WORLD};
pub use scale::{ScaleAnimation, ScaleStatus};
pub use scene::{
    Aabb, Entity, EntityId, EntityIdAllocator, EntityKind, EntityPayload, EntityRegistry,
    EntitySpawn, ItemState, LocalBox, PersonState, RegistryError, SpawnKind, Transform, Vec2,
    DEFAULT_SORTING_UNITS_PER_WORLD,
};
pub use snapshot::{EntityRecord, RestoreReport, SceneId, SnapshotError, SnapshotVec3};
pub use zones::{Zone, ZoneAnchor, ZoneHit, ZoneId, ZoneIndex};
