use std::fs;
use std::path::Path;

use dollhouse_engine::{PointerEvent, Vec2, ViewportCamera};
use serde::{Deserialize, Serialize};

/// Picks up the cup and hands it to ana, carries ana to the chair and then
/// to the bed (dropping the cup), and tosses the book into the air.
const DEMO_TRACE_JSON: &str = r#"{
  "steps": [
    { "tick": 60,  "pointer": "down", "x": 700, "y": 398 },
    { "tick": 70,  "pointer": "move", "x": 550, "y": 450 },
    { "tick": 80,  "pointer": "move", "x": 400, "y": 500 },
    { "tick": 81,  "pointer": "up" },
    { "tick": 120, "pointer": "down", "x": 380, "y": 450 },
    { "tick": 130, "pointer": "move", "x": 480, "y": 320 },
    { "tick": 140, "pointer": "move", "x": 580, "y": 201 },
    { "tick": 141, "pointer": "up" },
    { "tick": 200, "pointer": "down", "x": 580, "y": 250 },
    { "tick": 210, "pointer": "move", "x": 380, "y": 250 },
    { "tick": 220, "pointer": "move", "x": 180, "y": 250 },
    { "tick": 221, "pointer": "up" },
    { "tick": 300, "pointer": "down", "x": 750, "y": 398 },
    { "tick": 310, "pointer": "move", "x": 500, "y": 200 },
    { "tick": 311, "pointer": "up" }
  ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TracePointer {
    Down,
    Move,
    Up,
}

/// One pointer sample in screen pixels, applied at the start of `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct TraceStep {
    pub(crate) tick: u64,
    pub(crate) pointer: TracePointer,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
}

impl TraceStep {
    pub(crate) fn to_pointer_event(self, camera: &ViewportCamera) -> PointerEvent {
        let world = camera.screen_to_world(Vec2::new(self.x, self.y));
        match self.pointer {
            TracePointer::Down => PointerEvent::Began(world),
            TracePointer::Move => PointerEvent::Moved(world),
            TracePointer::Up => PointerEvent::Ended,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct PointerTrace {
    pub(crate) steps: Vec<TraceStep>,
}

impl PointerTrace {
    pub(crate) fn builtin() -> Result<Self, String> {
        Self::parse(DEMO_TRACE_JSON)
    }

    pub(crate) fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|error| format!("read trace '{}': {error}", path.display()))?;
        Self::parse(&raw)
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, String> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let trace = serde_path_to_error::deserialize::<_, PointerTrace>(&mut deserializer)
            .map_err(|error| {
                let path = error.path().to_string();
                format!("parse trace json at {path}: {}", error.into_inner())
            })?;
        trace.validate()?;
        Ok(trace)
    }

    fn validate(&self) -> Result<(), String> {
        let mut previous_tick = 0;
        for (index, step) in self.steps.iter().enumerate() {
            if step.tick < previous_tick {
                return Err(format!(
                    "validation failed at steps[{index}].tick: expected >= {previous_tick}, got {}",
                    step.tick
                ));
            }
            if !step.x.is_finite() || !step.y.is_finite() {
                return Err(format!(
                    "validation failed at steps[{index}]: expected finite coordinates"
                ));
            }
            previous_tick = step.tick;
        }
        Ok(())
    }

    pub(crate) fn last_tick(&self) -> u64 {
        self.steps.last().map(|step| step.tick).unwrap_or(0)
    }
}

/// Hands out trace steps in order as the frame loop advances.
#[derive(Debug, Clone)]
pub(crate) struct TraceCursor {
    trace: PointerTrace,
    next: usize,
}

impl TraceCursor {
    pub(crate) fn new(trace: PointerTrace) -> Self {
        Self { trace, next: 0 }
    }

    pub(crate) fn take_due(&mut self, tick: u64) -> Vec<TraceStep> {
        let start = self.next;
        while self
            .trace
            .steps
            .get(self.next)
            .is_some_and(|step| step.tick <= tick)
        {
            self.next += 1;
        }
        self.trace.steps[start..self.next].to_vec()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.next >= self.trace.steps.len()
    }
}
