use std::path::PathBuf;

use dollhouse_engine::{compile_pose_database, resolve_app_paths, AppPaths, PoseDatabase};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::demo_scene::{build_demo_scene, DemoController};
use super::trace::PointerTrace;

const TRACE_ENV_VAR: &str = "DOLLHOUSE_TRACE";
const TPS_ENV_VAR: &str = "DOLLHOUSE_TPS";
pub(crate) const DEFAULT_TICKS_PER_SECOND: u32 = 60;

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) controller: DemoController,
    pub(crate) trace: PointerTrace,
    pub(crate) ticks_per_second: u32,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Dollhouse Startup ===");

    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    info!(root = %paths.root.display(), "project_root_resolved");

    let poses = load_pose_database(&paths);
    let controller = build_demo_scene(&poses)?;
    let trace = load_trace()?;
    let ticks_per_second = parse_ticks_per_second(std::env::var(TPS_ENV_VAR).ok().as_deref());

    Ok(AppWiring {
        paths,
        controller,
        trace,
        ticks_per_second,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_pose_database(paths: &AppPaths) -> PoseDatabase {
    match compile_pose_database(&paths.base_content_dir) {
        Ok(poses) => poses,
        Err(error) => {
            warn!(error = %error, "content_compile_failed_using_builtin");
            PoseDatabase::builtin()
        }
    }
}

fn load_trace() -> Result<PointerTrace, String> {
    match std::env::var(TRACE_ENV_VAR) {
        Ok(raw) if !raw.trim().is_empty() => {
            let path = PathBuf::from(raw.trim());
            let trace = PointerTrace::load(&path)?;
            info!(path = %path.display(), steps = trace.steps.len(), "pointer_trace_loaded");
            Ok(trace)
        }
        _ => PointerTrace::builtin(),
    }
}

fn parse_ticks_per_second(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_TICKS_PER_SECOND;
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(value = raw, default = DEFAULT_TICKS_PER_SECOND, "invalid_ticks_per_second");
            DEFAULT_TICKS_PER_SECOND
        }
    }
}
