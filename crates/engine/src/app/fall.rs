use super::camera::CameraHooks;
use super::scene::{EntityId, EntityRegistry, Vec2};
use super::zones::{ZoneHit, ZoneIndex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallStatus {
    Falling,
    Landed(ZoneHit),
    /// Left the visible area; the entity is back at its origin.
    ResetToOrigin,
    /// The entity no longer exists.
    Abandoned,
}

/// Kinematic drop of one entity. Dropping the value cancels the fall with
/// the entity left wherever the last tick put it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallProcess {
    origin: Vec2,
    speed: f32,
}

impl FallProcess {
    pub fn start(origin: Vec2, initial_speed: f32) -> Self {
        Self {
            origin,
            speed: initial_speed,
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn tick(
        &mut self,
        dt: f32,
        acceleration: f32,
        entity: EntityId,
        registry: &mut EntityRegistry,
        zones: &ZoneIndex,
        camera: &dyn CameraHooks,
    ) -> FallStatus {
        let Some(position) = registry.find(entity).map(|found| found.transform.position) else {
            return FallStatus::Abandoned;
        };
        self.speed += acceleration * dt;
        registry.set_position(entity, position - Vec2::new(0.0, self.speed * dt));

        if let Some(hit) = zones.resolve_landing(registry, entity) {
            return FallStatus::Landed(hit);
        }

        let position = registry
            .find(entity)
            .map(|found| found.transform.position)
            .unwrap_or(self.origin);
        if !camera.is_on_screen(position) {
            registry.set_position(entity, self.origin);
            return FallStatus::ResetToOrigin;
        }
        FallStatus::Falling
    }
}
