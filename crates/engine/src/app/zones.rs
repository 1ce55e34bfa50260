use super::scene::{Aabb, EntityId, EntityRegistry, LocalBox, Vec2};
use crate::content::{LayerDef, LayerId, LayerMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneAnchor {
    /// Fixed world region. `sorting_key` is the depth of the sprite the zone
    /// belongs to, if any.
    Static {
        bounds: Aabb,
        sorting_key: Option<i32>,
    },
    /// Region that follows an entity (position and scale).
    Attached { owner: EntityId, local: LocalBox },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub layer: LayerId,
    pub priority: i32,
    pub anchor: ZoneAnchor,
}

/// A zone resolved against the current registry state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneHit {
    pub zone: ZoneId,
    pub layer: LayerId,
    pub priority: i32,
    pub bounds: Aabb,
    pub owner: Option<EntityId>,
    pub sorting_key: Option<i32>,
}

impl ZoneHit {
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.bounds.contains_point(point)
    }
}

/// Placement zones in registration order. Filled at scene load and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zone with its layer's default priority.
    pub fn add(&mut self, layer: &LayerDef, anchor: ZoneAnchor) -> ZoneId {
        self.add_with_priority(layer.id, layer.priority, anchor)
    }

    pub fn add_with_priority(&mut self, layer: LayerId, priority: i32, anchor: ZoneAnchor) -> ZoneId {
        let id = ZoneId(self.zones.len() as u32);
        self.zones.push(Zone {
            id,
            layer,
            priority,
            anchor,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.0 as usize)
    }

    /// Resolves a zone's world bounds. `None` when the owner no longer exists.
    pub fn resolve(&self, zone: &Zone, registry: &EntityRegistry) -> Option<ZoneHit> {
        let (bounds, owner, sorting_key) = match zone.anchor {
            ZoneAnchor::Static {
                bounds,
                sorting_key,
            } => (bounds, None, sorting_key),
            ZoneAnchor::Attached { owner, local } => {
                let entity = registry.find(owner)?;
                (
                    local.world_box(entity.transform.position, entity.transform.scale),
                    Some(owner),
                    Some(entity.sorting_key),
                )
            }
        };
        Some(ZoneHit {
            zone: zone.id,
            layer: zone.layer,
            priority: zone.priority,
            bounds,
            owner,
            sorting_key,
        })
    }

    /// Zones overlapping `probe` on a layer in `mask`, ordered by ascending
    /// priority and then registration order. Zones owned by any entity in
    /// `exclude` are skipped.
    pub fn query(
        &self,
        registry: &EntityRegistry,
        probe: Aabb,
        mask: LayerMask,
        exclude: &[EntityId],
    ) -> Vec<ZoneHit> {
        if mask.is_empty() {
            return Vec::new();
        }
        let mut hits = self
            .zones
            .iter()
            .filter(|zone| mask.contains(zone.layer))
            .filter_map(|zone| self.resolve(zone, registry))
            .filter(|hit| !hit.owner.is_some_and(|owner| exclude.contains(&owner)))
            .filter(|hit| hit.bounds.overlaps(&probe))
            .collect::<Vec<_>>();
        // stable: equal priorities keep registration order
        hits.sort_by_key(|hit| hit.priority);
        hits
    }

    pub fn contains_point(&self, registry: &EntityRegistry, zone: ZoneId, point: Vec2) -> bool {
        self.zone(zone)
            .and_then(|zone| self.resolve(zone, registry))
            .is_some_and(|hit| hit.contains_point(point))
    }

    /// Overlap query for an entity's current footprint, skipping zones that
    /// belong to it or to the item it holds.
    pub fn query_for_entity(&self, registry: &EntityRegistry, entity: EntityId) -> Vec<ZoneHit> {
        let Some(found) = registry.find(entity) else {
            return Vec::new();
        };
        let mut exclude = vec![entity];
        exclude.extend(found.held_item());
        self.query(registry, found.overlap_box(), found.placement_mask, &exclude)
    }

    /// Strict placement check: the best-ranked overlapping zone, accepted only
    /// if it contains the entity's position. Lower-ranked zones never win.
    pub fn resolve_landing(&self, registry: &EntityRegistry, entity: EntityId) -> Option<ZoneHit> {
        let position = registry.find(entity)?.transform.position;
        self.query_for_entity(registry, entity)
            .into_iter()
            .next()
            .filter(|hit| hit.contains_point(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::EntitySpawn;
    use crate::content::{PoseDatabase, PoseId};

    fn static_zone(center: Vec2, size: Vec2) -> ZoneAnchor {
        ZoneAnchor::Static {
            bounds: Aabb::from_center_size(center, size),
            sorting_key: None,
        }
    }

    fn layer(db: &PoseDatabase, name: &str) -> LayerId {
        db.layer_id_by_name(name).expect("layer")
    }

    #[test]
    fn query_orders_by_priority_then_registration() {
        let db = PoseDatabase::builtin();
        let registry = EntityRegistry::default();
        let mut zones = ZoneIndex::new();
        let floor = zones.add(
            db.layer(layer(&db, "Floor")).expect("floor"),
            static_zone(Vec2::ZERO, Vec2::new(10.0, 1.0)),
        );
        let chair_a = zones.add(
            db.layer(layer(&db, "SitFriendly")).expect("sit"),
            static_zone(Vec2::ZERO, Vec2::new(1.0, 1.0)),
        );
        let chair_b = zones.add(
            db.layer(layer(&db, "SitFriendly")).expect("sit"),
            static_zone(Vec2::new(0.2, 0.0), Vec2::new(1.0, 1.0)),
        );

        let hits = zones.query(
            &registry,
            Aabb::from_center_size(Vec2::ZERO, Vec2::ONE),
            LayerMask::all(),
            &[],
        );
        let order = hits.iter().map(|hit| hit.zone).collect::<Vec<_>>();
        assert_eq!(order, vec![chair_a, chair_b, floor]);
    }

    #[test]
    fn empty_mask_or_index_yields_nothing() {
        let db = PoseDatabase::builtin();
        let registry = EntityRegistry::default();
        let mut zones = ZoneIndex::new();
        let probe = Aabb::from_center_size(Vec2::ZERO, Vec2::ONE);
        assert!(zones
            .query(&registry, probe, LayerMask::all(), &[])
            .is_empty());

        zones.add(
            db.layer(layer(&db, "Floor")).expect("floor"),
            static_zone(Vec2::ZERO, Vec2::ONE),
        );
        assert!(zones
            .query(&registry, probe, LayerMask::empty(), &[])
            .is_empty());
        let sit_only = LayerMask::empty().with(layer(&db, "SitFriendly"));
        assert!(zones.query(&registry, probe, sit_only, &[]).is_empty());
    }

    #[test]
    fn attached_zone_follows_owner_and_skips_excluded() {
        let db = PoseDatabase::builtin();
        let mut registry = EntityRegistry::default();
        let person = registry
            .spawn(EntitySpawn::person("ana", Vec2::ZERO, PoseId(0)))
            .expect("person");
        let mut zones = ZoneIndex::new();
        let zone = zones.add(
            db.layer(layer(&db, "Person")).expect("person layer"),
            ZoneAnchor::Attached {
                owner: person,
                local: LocalBox::default(),
            },
        );

        registry.set_position(person, Vec2::new(4.0, 0.0));
        assert!(zones.contains_point(&registry, zone, Vec2::new(4.2, 0.1)));
        assert!(!zones.contains_point(&registry, zone, Vec2::ZERO));

        let probe = Aabb::from_center_size(Vec2::new(4.0, 0.0), Vec2::ONE);
        let hits = zones.query(&registry, probe, LayerMask::all(), &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].owner, Some(person));
        assert_eq!(hits[0].sorting_key, Some(0));
        assert!(zones
            .query(&registry, probe, LayerMask::all(), &[person])
            .is_empty());
    }

    #[test]
    fn landing_requires_containment_not_just_overlap() {
        let db = PoseDatabase::builtin();
        let mut registry = EntityRegistry::default();
        let cup = registry
            .spawn(
                EntitySpawn::item("cup", Vec2::new(0.0, 0.9), true)
                    .with_placement_mask(db.layer_mask(&["Floor"])),
            )
            .expect("cup");
        let mut zones = ZoneIndex::new();
        let floor = zones.add(
            db.layer(layer(&db, "Floor")).expect("floor"),
            static_zone(Vec2::ZERO, Vec2::new(10.0, 1.0)),
        );

        assert_eq!(zones.query_for_entity(&registry, cup).len(), 1);
        assert_eq!(zones.resolve_landing(&registry, cup), None);

        registry.set_position(cup, Vec2::new(0.0, 0.4));
        let hit = zones.resolve_landing(&registry, cup).expect("landed");
        assert_eq!(hit.zone, floor);
    }

    #[test]
    fn grazing_a_better_ranked_zone_blocks_landing() {
        let db = PoseDatabase::builtin();
        let mut registry = EntityRegistry::default();
        let cup = registry
            .spawn(
                EntitySpawn::item("cup", Vec2::ZERO, true)
                    .with_placement_mask(db.layer_mask(&["ItemFriendly", "Floor"])),
            )
            .expect("cup");
        let mut zones = ZoneIndex::new();
        zones.add(
            db.layer(layer(&db, "Floor")).expect("floor"),
            static_zone(Vec2::ZERO, Vec2::new(10.0, 1.0)),
        );
        let shelf = zones.add(
            db.layer(layer(&db, "ItemFriendly")).expect("shelf"),
            static_zone(Vec2::new(0.9, 0.0), Vec2::ONE),
        );

        let ranked = zones.query_for_entity(&registry, cup);
        assert_eq!(ranked.first().map(|hit| hit.zone), Some(shelf));
        assert!(!ranked[0].contains_point(Vec2::ZERO));
        assert_eq!(zones.resolve_landing(&registry, cup), None);
    }
}
