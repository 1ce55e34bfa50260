use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Screen position in pixels. Screen y grows downward.
pub fn world_to_screen(
    world: Vec2,
    camera: &Camera2D,
    viewport: Viewport,
    pixels_per_world: f32,
) -> (i32, i32) {
    let x = (world.x - camera.position.x) * pixels_per_world + viewport.width as f32 * 0.5;
    let y = viewport.height as f32 * 0.5 - (world.y - camera.position.y) * pixels_per_world;
    (x.round() as i32, y.round() as i32)
}

pub fn screen_to_world(
    screen: Vec2,
    camera: &Camera2D,
    viewport: Viewport,
    pixels_per_world: f32,
) -> Vec2 {
    let safe_ppw = if pixels_per_world > 0.0 {
        pixels_per_world
    } else {
        1.0
    };
    Vec2::new(
        camera.position.x + (screen.x - viewport.width as f32 * 0.5) / safe_ppw,
        camera.position.y + (viewport.height as f32 * 0.5 - screen.y) / safe_ppw,
    )
}
