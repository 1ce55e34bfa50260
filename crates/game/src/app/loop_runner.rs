use std::process::ExitCode;
use std::time::Duration;

use dollhouse_engine::{DragEvent, EntityId, EntityPhase};
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::demo_scene::DemoController;
use super::save::{load_and_validate_save, save_to_disk, SceneSave};
use super::trace::{PointerTrace, TraceCursor};

/// Simulated seconds allowed after the last trace step for everything to
/// come to rest.
const SETTLE_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) pointer_steps: usize,
    pub(crate) events: usize,
    pub(crate) settled: bool,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        paths,
        mut controller,
        trace,
        ticks_per_second,
    } = app;
    let scene_id = controller.scene_id();

    match load_and_validate_save(&paths.saves_dir, scene_id) {
        Ok(Some(save)) => match controller.restore(save.scene_id, &save.records) {
            Ok(report) => info!(
                applied = report.applied,
                skipped = report.skipped,
                "save_loaded"
            ),
            Err(err) => warn!(error = %err, "save_restore_failed"),
        },
        Ok(None) => info!(scene = scene_id.0, "no_save_found"),
        Err(err) => warn!(error = %err, "save_load_failed"),
    }

    let summary = run_frames(&mut controller, trace, ticks_per_second);
    info!(
        ticks = summary.ticks,
        pointer_steps = summary.pointer_steps,
        events = summary.events,
        settled = summary.settled,
        "frame_loop_finished"
    );

    let save = SceneSave::new(scene_id, controller.capture());
    match save_to_disk(&paths.saves_dir, &save) {
        Ok(path) => {
            info!(path = %path.display(), records = save.records.len(), "save_written");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "save_failed");
            ExitCode::FAILURE
        }
    }
}

/// Drops everything onto the scene, replays `trace` and keeps ticking until
/// the scene is at rest or the settle window runs out.
pub(crate) fn run_frames(
    controller: &mut DemoController,
    trace: PointerTrace,
    ticks_per_second: u32,
) -> RunSummary {
    let fixed_dt = Duration::from_secs_f64(1.0 / f64::from(ticks_per_second.max(1)));
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let max_ticks = trace
        .last_tick()
        .saturating_add(SETTLE_SECONDS.saturating_mul(u64::from(ticks_per_second)));
    let mut cursor = TraceCursor::new(trace);
    let mut summary = RunSummary::default();

    controller.drop_unplaced();
    while summary.ticks <= max_ticks {
        for step in cursor.take_due(summary.ticks) {
            let event = step.to_pointer_event(controller.camera());
            debug!(tick = summary.ticks, ?event, "pointer_step");
            controller.handle_pointer(event);
            summary.pointer_steps += 1;
        }

        controller.tick(fixed_dt_seconds);
        controller.camera_mut().tick(fixed_dt_seconds);
        for event in controller.drain_events() {
            log_drag_event(controller, summary.ticks, &event);
            summary.events += 1;
        }
        summary.ticks += 1;

        if cursor.is_finished() && scene_at_rest(controller) {
            summary.settled = true;
            break;
        }
    }
    summary
}

fn scene_at_rest(controller: &DemoController) -> bool {
    controller.session().is_none()
        && controller
            .registry()
            .entities()
            .iter()
            .all(|entity| controller.phase(entity.id) == EntityPhase::Idle)
}

fn log_drag_event(controller: &DemoController, tick: u64, event: &DragEvent) {
    let key = |id: EntityId| {
        controller
            .registry()
            .find(id)
            .map(|entity| entity.key.as_str())
            .unwrap_or("?")
    };
    match *event {
        DragEvent::Placed {
            entity,
            zone,
            layer,
        } => info!(
            tick,
            entity = key(entity),
            zone = zone.0,
            layer = controller.poses().layer_name(layer),
            "scene_placed"
        ),
        DragEvent::HoldCommitted { person, item } => {
            info!(tick, person = key(person), item = key(item), "scene_hold")
        }
        DragEvent::ItemReleased { person, item } => {
            info!(tick, person = key(person), item = key(item), "scene_release")
        }
        DragEvent::Landed { entity, zone } => {
            debug!(tick, entity = key(entity), zone = zone.0, "scene_landed")
        }
        DragEvent::ResetToOrigin { entity } => {
            info!(tick, entity = key(entity), "scene_reset_to_origin")
        }
        DragEvent::DragStarted { entity }
        | DragEvent::FallStarted { entity }
        | DragEvent::ScaleSettled { entity } => {
            debug!(tick, entity = key(entity), ?event, "scene_event")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::demo_scene::build_demo_scene;
    use dollhouse_engine::PoseDatabase;

    fn person_state(controller: &DemoController, key: &str) -> (String, Option<String>) {
        let id = controller.registry().find_by_key(key).expect("person");
        let state = controller
            .registry()
            .find(id)
            .and_then(|entity| entity.person())
            .expect("state");
        let held = state
            .held_item
            .and_then(|item| controller.registry().find(item))
            .map(|item| item.key.clone());
        (controller.poses().pose_name(state.pose).to_string(), held)
    }

    #[test]
    fn demo_trace_plays_out_and_settles() {
        let mut controller = build_demo_scene(&PoseDatabase::builtin()).expect("scene");
        let summary = run_frames(
            &mut controller,
            PointerTrace::builtin().expect("trace"),
            60,
        );
        assert!(summary.settled);
        assert_eq!(summary.pointer_steps, 15);

        let (pose, held) = person_state(&controller, "ana");
        assert_eq!(pose, "sleeping");
        assert_eq!(held, None);

        let cup = controller.registry().find_by_key("cup").expect("cup");
        assert_eq!(controller.registry().find(cup).and_then(|entity| entity.holder()), None);
        assert_eq!(controller.phase(cup), EntityPhase::Idle);

        let book = controller.registry().find_by_key("book").expect("book");
        let book = controller.registry().find(book).expect("book entity");
        assert!(book.position().y <= -2.25);
    }

    #[test]
    fn empty_trace_only_runs_gravity() {
        let mut controller = build_demo_scene(&PoseDatabase::builtin()).expect("scene");
        let summary = run_frames(&mut controller, PointerTrace::default(), 60);
        assert!(summary.settled);
        assert_eq!(summary.pointer_steps, 0);
        assert!(summary.ticks < 60);
    }
}
