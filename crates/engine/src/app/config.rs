/// Tunables for drag, fall and scale behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub fall_initial_speed: f32,
    pub fall_acceleration: f32,
    pub scale_speed: f32,
    /// Multiple of base scale while picked up.
    pub pickup_scale_factor: f32,
    /// Multiple of base scale eased toward while falling. 1.0 keeps base.
    pub fall_scale_factor: f32,
    pub drag_sorting_key: i32,
    pub sorting_units_per_world: f32,
    pub scale_tolerance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fall_initial_speed: 5.0,
            fall_acceleration: 2.0,
            scale_speed: 8.0,
            pickup_scale_factor: 1.2,
            fall_scale_factor: 1.0,
            drag_sorting_key: 1000,
            sorting_units_per_world: 100.0,
            scale_tolerance: 1e-3,
        }
    }
}

impl EngineConfig {
    pub fn with_fall_scale_factor(mut self, factor: f32) -> Self {
        self.fall_scale_factor = factor;
        self
    }

    pub fn with_fall(mut self, initial_speed: f32, acceleration: f32) -> Self {
        self.fall_initial_speed = initial_speed;
        self.fall_acceleration = acceleration;
        self
    }
}
