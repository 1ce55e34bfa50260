mod compiler;
mod database;

pub use compiler::{compile_pose_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    DefKind, LayerDef, LayerId, LayerMask, LayerSource, PoseDatabase, PoseDef, PoseId, PoseSource,
    PoseTableError, MAX_LAYERS, STANDING_POSE,
};
