use std::collections::HashMap;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pose::ArtHandle;
use crate::content::{LayerMask, PoseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn mul_components(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x * other.x, self.y * other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned box in world units. Edges are inclusive for both overlap and
/// containment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Aabb {
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            half_extents: Vec2::new(size.x.abs() * 0.5, size.y.abs() * 0.5),
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        (self.center.x - other.center.x).abs() <= self.half_extents.x + other.half_extents.x
            && (self.center.y - other.center.y).abs() <= self.half_extents.y + other.half_extents.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        let min = self.min();
        let max = self.max();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }
}

/// Box authored relative to an entity; both size and offset follow the
/// entity's current scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalBox {
    pub size: Vec2,
    pub offset: Vec2,
}

impl Default for LocalBox {
    fn default() -> Self {
        Self {
            size: Vec2::ONE,
            offset: Vec2::ZERO,
        }
    }
}

impl LocalBox {
    pub fn new(size: Vec2, offset: Vec2) -> Self {
        Self { size, offset }
    }

    pub fn world_box(&self, position: Vec2, scale: Vec2) -> Aabb {
        Aabb::from_center_size(
            position + self.offset.mul_components(scale),
            self.size.mul_components(scale),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub z: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            z: 0.0,
            scale: Vec2::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonState {
    pub pose: PoseId,
    /// Shown instead of `pose` while an item is dragged over this person.
    pub preview_pose: Option<PoseId>,
    pub held_item: Option<EntityId>,
    pub hand_offset: Vec2,
    pub art: Option<ArtHandle>,
}

impl PersonState {
    pub fn displayed_pose(&self) -> PoseId {
        self.preview_pose.unwrap_or(self.pose)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemState {
    pub can_be_held: bool,
    pub holder: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    Person(PersonState),
    Item(ItemState),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    /// Stable name used by snapshots.
    pub key: String,
    pub transform: Transform,
    pub base_scale: Vec2,
    pub sorting_key: i32,
    pub overlap_shape: LocalBox,
    pub hit_shape: LocalBox,
    pub placement_mask: LayerMask,
    pub payload: EntityPayload,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self.payload {
            EntityPayload::Person(_) => EntityKind::Person,
            EntityPayload::Item(_) => EntityKind::Item,
        }
    }

    pub fn person(&self) -> Option<&PersonState> {
        match &self.payload {
            EntityPayload::Person(person) => Some(person),
            EntityPayload::Item(_) => None,
        }
    }

    pub fn person_mut(&mut self) -> Option<&mut PersonState> {
        match &mut self.payload {
            EntityPayload::Person(person) => Some(person),
            EntityPayload::Item(_) => None,
        }
    }

    pub fn item(&self) -> Option<&ItemState> {
        match &self.payload {
            EntityPayload::Item(item) => Some(item),
            EntityPayload::Person(_) => None,
        }
    }

    pub fn item_mut(&mut self) -> Option<&mut ItemState> {
        match &mut self.payload {
            EntityPayload::Item(item) => Some(item),
            EntityPayload::Person(_) => None,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    pub fn overlap_box(&self) -> Aabb {
        self.overlap_shape
            .world_box(self.transform.position, self.transform.scale)
    }

    pub fn hit_box(&self) -> Aabb {
        self.hit_shape
            .world_box(self.transform.position, self.transform.scale)
    }

    pub fn held_item(&self) -> Option<EntityId> {
        self.person().and_then(|person| person.held_item)
    }

    pub fn holder(&self) -> Option<EntityId> {
        self.item().and_then(|item| item.holder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnKind {
    Person { pose: PoseId, hand_offset: Vec2 },
    Item { can_be_held: bool },
}

#[derive(Debug, Clone)]
pub struct EntitySpawn {
    pub key: String,
    pub kind: SpawnKind,
    pub position: Vec2,
    pub z: f32,
    pub scale: Vec2,
    pub overlap_shape: LocalBox,
    pub hit_shape: LocalBox,
    pub placement_mask: LayerMask,
}

impl EntitySpawn {
    pub fn person(key: impl Into<String>, position: Vec2, pose: PoseId) -> Self {
        Self::new(
            key,
            SpawnKind::Person {
                pose,
                hand_offset: Vec2::ZERO,
            },
            position,
        )
    }

    pub fn item(key: impl Into<String>, position: Vec2, can_be_held: bool) -> Self {
        Self::new(key, SpawnKind::Item { can_be_held }, position)
    }

    fn new(key: impl Into<String>, kind: SpawnKind, position: Vec2) -> Self {
        Self {
            key: key.into(),
            kind,
            position,
            z: 0.0,
            scale: Vec2::ONE,
            overlap_shape: LocalBox::default(),
            hit_shape: LocalBox::default(),
            placement_mask: LayerMask::empty(),
        }
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn with_overlap_shape(mut self, shape: LocalBox) -> Self {
        self.overlap_shape = shape;
        self
    }

    pub fn with_hit_shape(mut self, shape: LocalBox) -> Self {
        self.hit_shape = shape;
        self
    }

    pub fn with_placement_mask(mut self, mask: LayerMask) -> Self {
        self.placement_mask = mask;
        self
    }

    /// No effect on items.
    pub fn with_hand_offset(mut self, offset: Vec2) -> Self {
        if let SpawnKind::Person { hand_offset, .. } = &mut self.kind {
            *hand_offset = offset;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entity key must not be empty")]
    EmptyKey,
    #[error("duplicate entity key '{key}'")]
    DuplicateKey { key: String },
    #[error("entity '{key}' has a zero or non-finite scale")]
    InvalidScale { key: String },
    #[error("entity '{key}' has a non-finite position")]
    InvalidPosition { key: String },
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

pub const DEFAULT_SORTING_UNITS_PER_WORLD: f32 = 100.0;

/// Owns every draggable entity of a scene. Entities are only added at scene
/// load; iteration order is spawn order.
#[derive(Debug)]
pub struct EntityRegistry {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    ids_by_key: HashMap<String, EntityId>,
    sorting_units_per_world: f32,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SORTING_UNITS_PER_WORLD)
    }
}

impl EntityRegistry {
    pub fn new(sorting_units_per_world: f32) -> Self {
        Self {
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            ids_by_key: HashMap::new(),
            sorting_units_per_world,
        }
    }

    pub fn spawn(&mut self, spawn: EntitySpawn) -> Result<EntityId, RegistryError> {
        if spawn.key.trim().is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if self.ids_by_key.contains_key(&spawn.key) {
            return Err(RegistryError::DuplicateKey { key: spawn.key });
        }
        if !spawn.scale.is_finite() || spawn.scale.x == 0.0 || spawn.scale.y == 0.0 {
            return Err(RegistryError::InvalidScale { key: spawn.key });
        }
        if !spawn.position.is_finite() || !spawn.z.is_finite() {
            return Err(RegistryError::InvalidPosition { key: spawn.key });
        }

        let id = self.allocator.allocate();
        let payload = match spawn.kind {
            SpawnKind::Person { pose, hand_offset } => EntityPayload::Person(PersonState {
                pose,
                preview_pose: None,
                held_item: None,
                hand_offset,
                art: None,
            }),
            SpawnKind::Item { can_be_held } => EntityPayload::Item(ItemState {
                can_be_held,
                holder: None,
            }),
        };
        self.ids_by_key.insert(spawn.key.clone(), id);
        self.entities.push(Entity {
            id,
            key: spawn.key,
            transform: Transform {
                position: spawn.position,
                z: spawn.z,
                scale: spawn.scale,
            },
            base_scale: spawn.scale,
            sorting_key: self.position_sorting_key(spawn.position.y),
            overlap_shape: spawn.overlap_shape,
            hit_shape: spawn.hit_shape,
            placement_mask: spawn.placement_mask,
            payload,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|entity| entity.id).collect()
    }

    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn find_by_key(&self, key: &str) -> Option<EntityId> {
        self.ids_by_key.get(key).copied()
    }

    pub fn sorting_units_per_world(&self) -> f32 {
        self.sorting_units_per_world
    }

    /// Changes the position-to-sorting scale and re-derives the key of every
    /// entity from its position.
    pub fn set_sorting_units_per_world(&mut self, units: f32) {
        self.sorting_units_per_world = units;
        for id in self.ids() {
            self.refresh_sorting_from_position(id);
        }
    }

    pub fn position_sorting_key(&self, y: f32) -> i32 {
        (-y * self.sorting_units_per_world).round() as i32
    }

    /// Sets the sorting key and keeps a held item one above its holder.
    pub fn set_sorting_key(&mut self, id: EntityId, sorting_key: i32) {
        let Some(entity) = self.find_mut(id) else {
            return;
        };
        entity.sorting_key = sorting_key;
        self.sync_held_item(id);
    }

    /// Re-derives the sorting key from the vertical position. Held items
    /// stay pinned to their holder instead.
    pub fn refresh_sorting_from_position(&mut self, id: EntityId) {
        let Some(entity) = self.find(id) else {
            return;
        };
        if let Some(holder) = entity.holder() {
            self.sync_held_item(holder);
            return;
        }
        let key = self.position_sorting_key(entity.transform.position.y);
        self.set_sorting_key(id, key);
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) {
        let Some(entity) = self.find_mut(id) else {
            return;
        };
        entity.transform.position = position;
        self.sync_held_item(id);
    }

    pub fn set_scale(&mut self, id: EntityId, scale: Vec2) {
        let Some(entity) = self.find_mut(id) else {
            return;
        };
        entity.transform.scale = scale;
        self.sync_held_item(id);
    }

    pub fn hand_position(&self, holder: EntityId) -> Option<Vec2> {
        let entity = self.find(holder)?;
        let person = entity.person()?;
        Some(
            entity.transform.position
                + person.hand_offset.mul_components(entity.transform.scale),
        )
    }

    /// Moves the held item (if any) of `holder` into its hand and pins its
    /// sorting key to `holder + 1`.
    pub fn sync_held_item(&mut self, holder: EntityId) {
        let Some(entity) = self.find(holder) else {
            return;
        };
        let Some(item_id) = entity.held_item() else {
            return;
        };
        let sorting_key = entity.sorting_key.saturating_add(1);
        let Some(hand) = self.hand_position(holder) else {
            return;
        };
        if let Some(item) = self.find_mut(item_id) {
            item.transform.position = hand;
            item.sorting_key = sorting_key;
        }
    }

    /// Breaks the hold relation on both sides. Returns the released item.
    pub fn unlink_hold(&mut self, person: EntityId) -> Option<EntityId> {
        let item_id = self
            .find_mut(person)
            .and_then(Entity::person_mut)
            .and_then(|state| state.held_item.take())?;
        if let Some(item) = self.find_mut(item_id).and_then(Entity::item_mut) {
            item.holder = None;
        }
        Some(item_id)
    }

    /// Topmost entity whose hit box contains `point`: highest sorting key,
    /// later spawn on ties.
    pub fn pick_topmost_at(&self, point: Vec2) -> Option<EntityId> {
        let mut best: Option<(i32, EntityId)> = None;
        for entity in &self.entities {
            if !entity.hit_box().contains_point(point) {
                continue;
            }
            match best {
                Some((sorting_key, _)) if sorting_key > entity.sorting_key => {}
                _ => best = Some((entity.sorting_key, entity.id)),
            }
        }
        best.map(|(_, id)| id)
    }
}
