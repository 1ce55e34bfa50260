use thiserror::Error;
use tracing::{info, warn};

use super::scene::{Entity, EntityId, EntityRegistry};
use crate::content::{LayerId, PoseDatabase, PoseId, STANDING_POSE};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtHandle(pub String);

/// Art lookup for a pose name. The engine stores handles, never art data.
pub trait PoseArt {
    fn get_art(&self, pose: &str) -> Option<ArtHandle>;
}

impl PoseArt for PoseDatabase {
    fn get_art(&self, pose: &str) -> Option<ArtHandle> {
        self.pose_id_by_name(pose)
            .and_then(|id| self.pose(id))
            .map(|def| ArtHandle(def.art.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseEvent {
    EnterZone(Option<LayerId>),
    HoverPreview(Option<LayerId>),
    ItemPickedUp,
    ItemReleased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HoldRejected {
    #[error("entity {0:?} does not exist")]
    Missing(EntityId),
    #[error("entity {0:?} is not a person")]
    NotAPerson(EntityId),
    #[error("entity {0:?} is not an item")]
    NotAnItem(EntityId),
    #[error("person {person:?} already holds {held:?}")]
    AlreadyHolding { person: EntityId, held: EntityId },
    #[error("person {person:?} cannot hold anything in pose {pose:?}")]
    PoseCannotHold { person: EntityId, pose: PoseId },
    #[error("item {0:?} cannot be held")]
    NotHoldable(EntityId),
    #[error("item {item:?} is already held by {holder:?}")]
    HeldElsewhere { item: EntityId, holder: EntityId },
}

/// Pose transitions for persons. Every mutation recomputes the pose from
/// `(held item present, target layer)` so repeated events cannot drift.
pub struct PoseAutomaton<'a, A: PoseArt + ?Sized> {
    poses: &'a PoseDatabase,
    art: &'a A,
}

impl<'a, A: PoseArt + ?Sized> PoseAutomaton<'a, A> {
    pub fn new(poses: &'a PoseDatabase, art: &'a A) -> Self {
        Self { poses, art }
    }

    pub fn next_pose(&self, current: PoseId, holding: bool, event: PoseEvent) -> PoseId {
        match event {
            PoseEvent::EnterZone(layer) => {
                let base = self.poses.pose_for_layer(layer);
                if holding {
                    self.poses.holding_counterpart(base).unwrap_or(base)
                } else {
                    base
                }
            }
            PoseEvent::HoverPreview(layer) => {
                let base = self.poses.pose_for_layer(layer);
                if !holding {
                    return base;
                }
                // a held item is never dropped by hovering, so stay in a
                // holding pose even over layers that cannot hold
                self.poses
                    .holding_counterpart(base)
                    .or_else(|| self.poses.holding_counterpart(self.poses.standing()))
                    .unwrap_or(current)
            }
            PoseEvent::ItemPickedUp => self.poses.holding_counterpart(current).unwrap_or(current),
            PoseEvent::ItemReleased => self.poses.base_of_holding(current).unwrap_or(current),
        }
    }

    /// Pose consistent with the holding state: holding poses only while an
    /// item is held, unknown ids fall back to standing.
    pub fn normalized(&self, pose: PoseId, holding: bool) -> PoseId {
        let pose = if self.poses.pose(pose).is_some() {
            pose
        } else {
            self.poses.standing()
        };
        let is_holding_pose = self.poses.is_holding_pose(pose);
        match (holding, is_holding_pose) {
            (true, false) => self
                .poses
                .holding_counterpart(pose)
                .or_else(|| self.poses.holding_counterpart(self.poses.standing()))
                .unwrap_or(pose),
            (false, true) => self.poses.base_of_holding(pose).unwrap_or(pose),
            _ => pose,
        }
    }

    pub fn can_hold(&self, pose: PoseId) -> bool {
        self.poses.is_allowed_to_hold(pose)
            && (self.poses.holding_counterpart(pose).is_some() || self.poses.is_holding_pose(pose))
    }

    fn art_for(&self, pose: PoseId) -> Option<ArtHandle> {
        self.art
            .get_art(self.poses.pose_name(pose))
            .or_else(|| self.art.get_art(STANDING_POSE))
    }

    fn set_pose(&self, registry: &mut EntityRegistry, person: EntityId, pose: PoseId) {
        let Some(state) = registry.find_mut(person).and_then(Entity::person_mut) else {
            return;
        };
        state.pose = pose;
        let displayed = state.displayed_pose();
        state.art = self.art_for(displayed);
    }

    fn pose_and_holding(registry: &EntityRegistry, person: EntityId) -> Option<(PoseId, bool)> {
        let state = registry.find(person)?.person()?;
        Some((state.pose, state.held_item.is_some()))
    }

    fn apply(&self, registry: &mut EntityRegistry, person: EntityId, event: PoseEvent) {
        if let Some((pose, holding)) = Self::pose_and_holding(registry, person) {
            let next = self.next_pose(pose, holding, event);
            self.set_pose(registry, person, next);
        }
    }

    /// Gives `item` to `person`. On rejection nothing changes.
    pub fn hold_item(
        &self,
        registry: &mut EntityRegistry,
        person: EntityId,
        item: EntityId,
    ) -> Result<(), HoldRejected> {
        let person_entity = registry.find(person).ok_or(HoldRejected::Missing(person))?;
        let person_state = person_entity
            .person()
            .ok_or(HoldRejected::NotAPerson(person))?;
        let item_entity = registry.find(item).ok_or(HoldRejected::Missing(item))?;
        let item_state = item_entity.item().ok_or(HoldRejected::NotAnItem(item))?;

        if let Some(held) = person_state.held_item {
            return Err(HoldRejected::AlreadyHolding { person, held });
        }
        if !self.can_hold(person_state.pose) {
            return Err(HoldRejected::PoseCannotHold {
                person,
                pose: person_state.pose,
            });
        }
        if !item_state.can_be_held {
            return Err(HoldRejected::NotHoldable(item));
        }
        if let Some(holder) = item_state.holder {
            return Err(HoldRejected::HeldElsewhere { item, holder });
        }

        if let Some(state) = registry.find_mut(person).and_then(Entity::person_mut) {
            state.held_item = Some(item);
            state.preview_pose = None;
        }
        if let Some(state) = registry.find_mut(item).and_then(Entity::item_mut) {
            state.holder = Some(person);
        }
        self.apply(registry, person, PoseEvent::ItemPickedUp);
        registry.sync_held_item(person);
        info!(person = person.0, item = item.0, "hold_committed");
        Ok(())
    }

    /// Drops whatever `person` holds. The item keeps its position and
    /// re-derives its sorting key from it.
    pub fn release_item(&self, registry: &mut EntityRegistry, person: EntityId) -> Option<EntityId> {
        let item = registry.unlink_hold(person)?;
        self.apply(registry, person, PoseEvent::ItemReleased);
        registry.refresh_sorting_from_position(item);
        info!(person = person.0, item = item.0, "item_released");
        Some(item)
    }

    /// Commits the pose for a zone landing. Returns the item that had to be
    /// dropped because the new base pose cannot hold.
    pub fn enter_zone(
        &self,
        registry: &mut EntityRegistry,
        person: EntityId,
        layer: Option<LayerId>,
    ) -> Option<EntityId> {
        let (_, holding) = Self::pose_and_holding(registry, person)?;
        let base = self.poses.pose_for_layer(layer);
        let dropped = if holding && !self.can_hold(base) {
            self.release_item(registry, person)
        } else {
            None
        };
        self.apply(registry, person, PoseEvent::EnterZone(layer));
        dropped
    }

    pub fn hover_preview(&self, registry: &mut EntityRegistry, person: EntityId, layer: Option<LayerId>) {
        self.apply(registry, person, PoseEvent::HoverPreview(layer));
    }

    /// Shows the holding pose `person` would take if it picked up an item.
    /// Returns false (and shows nothing) when it could not hold one.
    pub fn preview_pickup(&self, registry: &mut EntityRegistry, person: EntityId) -> bool {
        let Some(state) = registry.find(person).and_then(Entity::person) else {
            return false;
        };
        if state.held_item.is_some() || !self.can_hold(state.pose) {
            return false;
        }
        let Some(preview) = self.poses.holding_counterpart(state.pose) else {
            return false;
        };
        let art = self.art_for(preview);
        if let Some(state) = registry.find_mut(person).and_then(Entity::person_mut) {
            state.preview_pose = Some(preview);
            state.art = art;
        }
        true
    }

    pub fn clear_preview(&self, registry: &mut EntityRegistry, person: EntityId) {
        let Some(state) = registry.find(person).and_then(Entity::person) else {
            return;
        };
        if state.preview_pose.is_none() {
            return;
        }
        let art = self.art_for(state.pose);
        if let Some(state) = registry.find_mut(person).and_then(Entity::person_mut) {
            state.preview_pose = None;
            state.art = art;
        }
    }

    /// Sets a pose by name without transition rules. Unknown names become
    /// standing.
    pub fn restore_pose(&self, registry: &mut EntityRegistry, person: EntityId, name: &str) {
        let pose = match self.poses.pose_id_by_name(name) {
            Some(pose) => pose,
            None => {
                warn!(person = person.0, pose = name, "unknown_pose_fallback_standing");
                self.poses.standing()
            }
        };
        if let Some(state) = registry.find_mut(person).and_then(Entity::person_mut) {
            state.preview_pose = None;
        }
        self.set_pose(registry, person, pose);
    }

    pub fn normalize(&self, registry: &mut EntityRegistry, person: EntityId) {
        if let Some((pose, holding)) = Self::pose_and_holding(registry, person) {
            let next = self.normalized(pose, holding);
            self.set_pose(registry, person, next);
        }
    }
}
