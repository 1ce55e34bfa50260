use super::rendering::{screen_to_world, world_to_screen, Viewport, PIXELS_PER_WORLD};
use super::scene::Vec2;

/// Hooks the drag controller calls on whatever owns the view.
pub trait CameraHooks {
    /// Called after every drag move with the dragged entity's position.
    fn notify_entity_moved(&mut self, position: Vec2);

    /// Only the lower edge matters: falling entities leave through the bottom.
    fn is_on_screen(&self, position: Vec2) -> bool;

    fn notify_drag_ended(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
}

/// Range the camera center may take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl CameraBounds {
    fn clamp(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            position.x.clamp(self.min.x, self.max.x.max(self.min.x)),
            position.y.clamp(self.min.y, self.max.y.max(self.min.y)),
        )
    }
}

pub const EDGE_SCROLL_THRESHOLD_PX: f32 = 50.0;
pub const EDGE_SCROLL_SPEED: f32 = 1.0;

/// Reference camera: orthographic view over a fixed-size viewport that
/// scrolls while a dragged entity sits near a screen edge.
#[derive(Debug, Clone)]
pub struct ViewportCamera {
    camera: Camera2D,
    viewport: Viewport,
    pixels_per_world: f32,
    edge_threshold_px: f32,
    scroll_speed: f32,
    bounds: Option<CameraBounds>,
    scroll_direction: Vec2,
}

impl ViewportCamera {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            camera: Camera2D::default(),
            viewport,
            pixels_per_world: PIXELS_PER_WORLD,
            edge_threshold_px: EDGE_SCROLL_THRESHOLD_PX,
            scroll_speed: EDGE_SCROLL_SPEED,
            bounds: None,
            scroll_direction: Vec2::ZERO,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.camera.position = position;
        self
    }

    pub fn with_pixels_per_world(mut self, pixels_per_world: f32) -> Self {
        if pixels_per_world.is_finite() && pixels_per_world > 0.0 {
            self.pixels_per_world = pixels_per_world;
        }
        self
    }

    pub fn with_scroll_speed(mut self, scroll_speed: f32) -> Self {
        self.scroll_speed = scroll_speed;
        self
    }

    pub fn with_bounds(mut self, bounds: CameraBounds) -> Self {
        self.camera.position = bounds.clamp(self.camera.position);
        self.bounds = Some(bounds);
        self
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scroll_direction(&self) -> Vec2 {
        self.scroll_direction
    }

    pub fn world_to_screen(&self, world: Vec2) -> (i32, i32) {
        world_to_screen(world, &self.camera, self.viewport, self.pixels_per_world)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen_to_world(screen, &self.camera, self.viewport, self.pixels_per_world)
    }

    /// Advances edge scrolling by one frame.
    pub fn tick(&mut self, dt: f32) {
        if self.scroll_direction == Vec2::ZERO || !dt.is_finite() {
            return;
        }
        let next = self.camera.position + self.scroll_direction * (self.scroll_speed * dt);
        self.camera.position = match self.bounds {
            Some(bounds) => bounds.clamp(next),
            None => next,
        };
    }
}

impl CameraHooks for ViewportCamera {
    fn notify_entity_moved(&mut self, position: Vec2) {
        let (sx, sy) = self.world_to_screen(position);
        let (sx, sy) = (sx as f32, sy as f32);
        let width = self.viewport.width as f32;
        let height = self.viewport.height as f32;
        let threshold = self.edge_threshold_px;

        let x = if sx < threshold {
            -1.0
        } else if sx > width - threshold {
            1.0
        } else {
            0.0
        };
        // screen y grows downward
        let y = if sy < threshold {
            1.0
        } else if sy > height - threshold {
            -1.0
        } else {
            0.0
        };
        self.scroll_direction = Vec2::new(x, y);
    }

    fn is_on_screen(&self, position: Vec2) -> bool {
        let (_, sy) = self.world_to_screen(position);
        sy <= self.viewport.height as i32
    }

    fn notify_drag_ended(&mut self) {
        self.scroll_direction = Vec2::ZERO;
    }
}

/// Camera that never scrolls and treats everything above `floor_y` as
/// visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub floor_y: f32,
}

impl CameraHooks for FixedCamera {
    fn notify_entity_moved(&mut self, _position: Vec2) {}

    fn is_on_screen(&self, position: Vec2) -> bool {
        position.y >= self.floor_y
    }
}
