use super::scene::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleStatus {
    Running,
    Converged,
}

/// Exponential ease toward a target scale. Replacing the animation for an
/// entity discards the previous target entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleAnimation {
    target: Vec2,
    speed: f32,
}

impl ScaleAnimation {
    pub fn new(target: Vec2, speed: f32) -> Self {
        Self { target, speed }
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn step(&self, current: Vec2, dt: f32, tolerance: f32) -> (Vec2, ScaleStatus) {
        let t = (dt * self.speed).clamp(0.0, 1.0);
        let next = current + (self.target - current) * t;
        let close = (next.x - self.target.x).abs() <= tolerance
            && (next.y - self.target.y).abs() <= tolerance;
        if close || !next.is_finite() {
            (self.target, ScaleStatus::Converged)
        } else {
            (next, ScaleStatus::Running)
        }
    }
}
