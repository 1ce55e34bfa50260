mod transform;

pub use transform::{screen_to_world, world_to_screen, Viewport};

pub const PIXELS_PER_WORLD: f32 = 100.0;
