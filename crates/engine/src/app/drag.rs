use std::collections::BTreeMap;

use tracing::{debug, info};

use super::camera::CameraHooks;
use super::config::EngineConfig;
use super::fall::{FallProcess, FallStatus};
use super::pose::{PoseArt, PoseAutomaton};
use super::scale::{ScaleAnimation, ScaleStatus};
use super::scene::{EntityId, EntityKind, EntityRegistry, Vec2};
use super::snapshot::SceneId;
use super::zones::{ZoneHit, ZoneId, ZoneIndex};
use crate::content::{LayerId, PoseDatabase};

/// World-space pointer input, single pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Began(Vec2),
    Moved(Vec2),
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPhase {
    Idle,
    Dragging,
    Falling,
    /// At rest but still easing its scale.
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    DragStarted { entity: EntityId },
    Placed { entity: EntityId, zone: ZoneId, layer: LayerId },
    HoldCommitted { person: EntityId, item: EntityId },
    ItemReleased { person: EntityId, item: EntityId },
    FallStarted { entity: EntityId },
    Landed { entity: EntityId, zone: ZoneId },
    ResetToOrigin { entity: EntityId },
    ScaleSettled { entity: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub entity: EntityId,
    pub original_position: Vec2,
    pub offset: Vec2,
    /// Person currently showing a pick-up preview for the dragged item.
    pub hovered_person: Option<EntityId>,
}

/// Owns one scene's entities and zones and runs the drag, fall and settle
/// state machine over them. Everything advances through pointer events and
/// `tick`.
pub struct DragController<C: CameraHooks, A: PoseArt> {
    pub(super) config: EngineConfig,
    pub(super) scene_id: SceneId,
    pub(super) registry: EntityRegistry,
    pub(super) zones: ZoneIndex,
    pub(super) poses: PoseDatabase,
    pub(super) camera: C,
    pub(super) art: A,
    pub(super) session: Option<DragSession>,
    pub(super) falls: BTreeMap<EntityId, FallProcess>,
    pub(super) scale_animations: BTreeMap<EntityId, ScaleAnimation>,
    pub(super) events: Vec<DragEvent>,
}

impl<C: CameraHooks, A: PoseArt> DragController<C, A> {
    pub fn new(
        scene_id: SceneId,
        registry: EntityRegistry,
        zones: ZoneIndex,
        poses: PoseDatabase,
        art: A,
        camera: C,
    ) -> Self {
        let mut controller = Self {
            config: EngineConfig::default(),
            scene_id,
            registry,
            zones,
            poses,
            camera,
            art,
            session: None,
            falls: BTreeMap::new(),
            scale_animations: BTreeMap::new(),
            events: Vec::new(),
        };
        controller.normalize_all_poses();
        controller
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.registry
            .set_sorting_units_per_world(config.sorting_units_per_world);
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    pub fn poses(&self) -> &PoseDatabase {
        &self.poses
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn phase(&self, entity: EntityId) -> EntityPhase {
        if self.session.is_some_and(|session| session.entity == entity) {
            EntityPhase::Dragging
        } else if self.falls.contains_key(&entity) {
            EntityPhase::Falling
        } else if self.scale_animations.contains_key(&entity) {
            EntityPhase::Settling
        } else {
            EntityPhase::Idle
        }
    }

    pub fn fall_origin(&self, entity: EntityId) -> Option<Vec2> {
        self.falls.get(&entity).map(FallProcess::origin)
    }

    pub fn scale_target(&self, entity: EntityId) -> Option<Vec2> {
        self.scale_animations.get(&entity).map(ScaleAnimation::target)
    }

    pub fn drain_events(&mut self) -> Vec<DragEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Began(position) => {
                self.begin_drag(position);
            }
            PointerEvent::Moved(position) => self.move_drag(position),
            PointerEvent::Ended => self.end_drag(),
        }
    }

    /// Starts dragging the topmost entity under `pointer`. Ignored while a
    /// session is active.
    pub fn begin_drag(&mut self, pointer: Vec2) -> Option<EntityId> {
        if let Some(session) = self.session {
            debug!(active = session.entity.0, "drag_ignored_session_active");
            return None;
        }
        let entity = self.registry.pick_topmost_at(pointer)?;
        self.begin_drag_entity(entity, pointer)
    }

    pub fn begin_drag_entity(&mut self, entity: EntityId, pointer: Vec2) -> Option<EntityId> {
        if let Some(session) = self.session {
            debug!(active = session.entity.0, requested = entity.0, "drag_ignored_session_active");
            return None;
        }
        let found = self.registry.find(entity)?;
        let position = found.transform.position;
        let base_scale = found.base_scale;
        let holder = found.holder();

        self.falls.remove(&entity);
        self.scale_animations.remove(&entity);
        if let Some(holder) = holder {
            self.release_item(holder);
        }
        self.registry
            .set_sorting_key(entity, self.config.drag_sorting_key);
        self.start_scale(entity, base_scale * self.config.pickup_scale_factor);

        self.session = Some(DragSession {
            entity,
            original_position: position,
            offset: position - pointer,
            hovered_person: None,
        });
        self.events.push(DragEvent::DragStarted { entity });
        info!(entity = entity.0, x = position.x, y = position.y, "drag_started");
        Some(entity)
    }

    pub fn move_drag(&mut self, pointer: Vec2) {
        let Some(session) = self.session else {
            return;
        };
        let entity = session.entity;
        let position = pointer + session.offset;
        self.registry.set_position(entity, position);
        self.camera.notify_entity_moved(position);

        match self.registry.find(entity).map(|found| found.kind()) {
            Some(EntityKind::Person) => self.hover_person(entity),
            Some(EntityKind::Item) => self.hover_item(entity),
            None => {}
        }
    }

    fn hover_person(&mut self, entity: EntityId) {
        let layer = self
            .zones
            .query_for_entity(&self.registry, entity)
            .first()
            .map(|hit| hit.layer);
        PoseAutomaton::new(&self.poses, &self.art).hover_preview(&mut self.registry, entity, layer);

        let rest_on_hover = layer
            .and_then(|layer| self.poses.layer(layer))
            .is_some_and(|def| def.rest_scale_on_hover);
        let factor = if rest_on_hover {
            1.0
        } else {
            self.config.pickup_scale_factor
        };
        if let Some(found) = self.registry.find(entity) {
            let target = found.base_scale * factor;
            let current = found.transform.scale;
            self.retarget_scale(entity, current, target);
        }
    }

    fn hover_item(&mut self, entity: EntityId) {
        let holdable = self
            .registry
            .find(entity)
            .and_then(|found| found.item())
            .is_some_and(|item| item.can_be_held);
        if !holdable {
            return;
        }
        let candidate = self
            .zones
            .query_for_entity(&self.registry, entity)
            .into_iter()
            .filter_map(|hit| hit.owner)
            .find(|owner| {
                self.registry
                    .find(*owner)
                    .is_some_and(|found| found.kind() == EntityKind::Person)
            });
        let previous = self.session.and_then(|session| session.hovered_person);

        let automaton = PoseAutomaton::new(&self.poses, &self.art);
        if let Some(previous) = previous.filter(|previous| Some(*previous) != candidate) {
            automaton.clear_preview(&mut self.registry, previous);
            self.registry
                .set_sorting_key(entity, self.config.drag_sorting_key);
        }
        let hovered = candidate.filter(|person| automaton.preview_pickup(&mut self.registry, *person));
        if let Some(person) = hovered {
            let above = self
                .registry
                .find(person)
                .map(|found| found.sorting_key.saturating_add(1))
                .unwrap_or(self.config.drag_sorting_key);
            self.registry.set_sorting_key(entity, above);
        } else if previous.is_some() && candidate == previous {
            // candidate stopped accepting; drop back to the drag layer
            self.registry
                .set_sorting_key(entity, self.config.drag_sorting_key);
        }
        if let Some(session) = self.session.as_mut() {
            session.hovered_person = hovered;
        }
    }

    /// Releases the active drag: commits onto the zone containing the entity
    /// or hands it to the fall simulator.
    pub fn end_drag(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let entity = session.entity;
        self.camera.notify_drag_ended();
        if let Some(person) = session.hovered_person {
            PoseAutomaton::new(&self.poses, &self.art).clear_preview(&mut self.registry, person);
        }
        self.registry.refresh_sorting_from_position(entity);

        let landing = self.zones.resolve_landing(&self.registry, entity);
        info!(entity = entity.0, placed = landing.is_some(), "drag_released");
        match landing {
            Some(hit) => {
                self.commit_placement(entity, hit, true);
                self.settle_to_base(entity);
            }
            None => self.start_fall(entity, session.original_position),
        }
    }

    fn commit_placement(&mut self, entity: EntityId, hit: ZoneHit, allow_hold: bool) {
        let Some(found) = self.registry.find(entity) else {
            return;
        };
        let kind = found.kind();
        let sorting_key = match hit.sorting_key {
            Some(owner_key) => owner_key.saturating_add(1),
            None => self.registry.position_sorting_key(found.transform.position.y),
        };
        self.registry.set_sorting_key(entity, sorting_key);
        self.events.push(DragEvent::Placed {
            entity,
            zone: hit.zone,
            layer: hit.layer,
        });
        info!(
            entity = entity.0,
            zone = hit.zone.0,
            layer = self.poses.layer_name(hit.layer),
            sorting_key,
            "placement_committed"
        );

        match kind {
            EntityKind::Person => {
                let dropped = PoseAutomaton::new(&self.poses, &self.art).enter_zone(
                    &mut self.registry,
                    entity,
                    Some(hit.layer),
                );
                if let Some(item) = dropped {
                    self.events.push(DragEvent::ItemReleased {
                        person: entity,
                        item,
                    });
                    let from = self
                        .registry
                        .find(item)
                        .map(|found| found.transform.position)
                        .unwrap_or(hit.bounds.center);
                    self.start_fall(item, from);
                }
            }
            EntityKind::Item => {
                let owner = hit.owner.filter(|owner| {
                    self.registry
                        .find(*owner)
                        .is_some_and(|found| found.kind() == EntityKind::Person)
                });
                if let (true, Some(person)) = (allow_hold, owner) {
                    self.hold_item(person, entity);
                }
            }
        }
    }

    /// Gives `item` to `person`, recording the outcome. Rejections change
    /// nothing.
    pub fn hold_item(&mut self, person: EntityId, item: EntityId) -> bool {
        let result = PoseAutomaton::new(&self.poses, &self.art).hold_item(&mut self.registry, person, item);
        match result {
            Ok(()) => {
                self.falls.remove(&item);
                self.events.push(DragEvent::HoldCommitted { person, item });
                true
            }
            Err(reason) => {
                debug!(person = person.0, item = item.0, %reason, "hold_rejected");
                false
            }
        }
    }

    pub fn release_item(&mut self, person: EntityId) -> Option<EntityId> {
        let item = PoseAutomaton::new(&self.poses, &self.art).release_item(&mut self.registry, person)?;
        self.events.push(DragEvent::ItemReleased { person, item });
        Some(item)
    }

    /// Starts a fall for `entity`, replacing any running one. Held items and
    /// the dragged entity are left alone.
    pub fn start_fall(&mut self, entity: EntityId, origin: Vec2) {
        let Some(found) = self.registry.find(entity) else {
            return;
        };
        if found.holder().is_some() || self.session.is_some_and(|session| session.entity == entity) {
            return;
        }
        let target = found.base_scale * self.config.fall_scale_factor;
        self.falls
            .insert(entity, FallProcess::start(origin, self.config.fall_initial_speed));
        self.start_scale(entity, target);
        self.events.push(DragEvent::FallStarted { entity });
        info!(entity = entity.0, x = origin.x, y = origin.y, "fall_started");
    }

    /// Drops every free entity onto whatever is below it.
    pub fn drop_unplaced(&mut self) {
        for entity in self.registry.ids() {
            if let Some(position) = self.registry.find(entity).map(|found| found.transform.position) {
                self.start_fall(entity, position);
            }
        }
    }

    fn start_scale(&mut self, entity: EntityId, target: Vec2) {
        self.scale_animations
            .insert(entity, ScaleAnimation::new(target, self.config.scale_speed));
    }

    fn retarget_scale(&mut self, entity: EntityId, current: Vec2, target: Vec2) {
        let unchanged = match self.scale_animations.get(&entity) {
            Some(animation) => animation.target() == target,
            None => current == target,
        };
        if !unchanged {
            self.start_scale(entity, target);
        }
    }

    fn settle_to_base(&mut self, entity: EntityId) {
        if let Some(base) = self.registry.find(entity).map(|found| found.base_scale) {
            self.start_scale(entity, base);
        }
    }

    /// Advances every fall and scale animation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let falling = self.falls.keys().copied().collect::<Vec<_>>();
        for entity in falling {
            let Some(mut process) = self.falls.get(&entity).copied() else {
                continue;
            };
            let status = process.tick(
                dt,
                self.config.fall_acceleration,
                entity,
                &mut self.registry,
                &self.zones,
                &self.camera,
            );
            match status {
                FallStatus::Falling => {
                    self.falls.insert(entity, process);
                }
                FallStatus::Landed(hit) => {
                    self.falls.remove(&entity);
                    self.registry.refresh_sorting_from_position(entity);
                    self.events.push(DragEvent::Landed {
                        entity,
                        zone: hit.zone,
                    });
                    info!(entity = entity.0, zone = hit.zone.0, "fall_landed");
                    self.commit_placement(entity, hit, false);
                    self.settle_to_base(entity);
                }
                FallStatus::ResetToOrigin => {
                    self.falls.remove(&entity);
                    self.registry.refresh_sorting_from_position(entity);
                    self.events.push(DragEvent::ResetToOrigin { entity });
                    info!(
                        entity = entity.0,
                        x = process.origin().x,
                        y = process.origin().y,
                        "fall_reset_to_origin"
                    );
                    if let Some(hit) = self.zones.resolve_landing(&self.registry, entity) {
                        self.commit_placement(entity, hit, false);
                    }
                    self.settle_to_base(entity);
                }
                FallStatus::Abandoned => {
                    self.falls.remove(&entity);
                }
            }
        }

        let animating = self.scale_animations.keys().copied().collect::<Vec<_>>();
        for entity in animating {
            let Some(animation) = self.scale_animations.get(&entity).copied() else {
                continue;
            };
            let Some(current) = self.registry.find(entity).map(|found| found.transform.scale) else {
                self.scale_animations.remove(&entity);
                continue;
            };
            let (next, status) = animation.step(current, dt, self.config.scale_tolerance);
            self.registry.set_scale(entity, next);
            if status == ScaleStatus::Converged {
                self.scale_animations.remove(&entity);
                self.events.push(DragEvent::ScaleSettled { entity });
            }
        }
    }

    pub(super) fn normalize_all_poses(&mut self) {
        let automaton = PoseAutomaton::new(&self.poses, &self.art);
        for entity in self.registry.ids() {
            automaton.normalize(&mut self.registry, entity);
        }
    }

    pub(super) fn cancel_motion(&mut self, entity: EntityId) {
        self.falls.remove(&entity);
        self.scale_animations.remove(&entity);
    }
}
