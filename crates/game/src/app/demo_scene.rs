use dollhouse_engine::{
    Aabb, DragController, EntityId, EntityRegistry, EntitySpawn, LayerDef, LocalBox,
    PoseDatabase, SceneId, Vec2, Viewport, ViewportCamera, ZoneAnchor, ZoneIndex,
};

pub(crate) type DemoController = DragController<ViewportCamera, PoseDatabase>;

pub(crate) const DEMO_SCENE_ID: SceneId = SceneId(1);
pub(crate) const DEMO_VIEWPORT: Viewport = Viewport {
    width: 800,
    height: 600,
};
const DEMO_PIXELS_PER_WORLD: f32 = 100.0;

const PERSON_LAYERS: &[&str] = &["SitFriendly", "SleepFriendly", "PersonFriendly", "Floor"];
const ITEM_LAYERS: &[&str] = &["Person", "ItemFriendly", "Floor"];

struct PersonSpec {
    key: &'static str,
    position: Vec2,
}

struct ItemSpec {
    key: &'static str,
    position: Vec2,
    can_be_held: bool,
}

struct FurnitureSpec {
    layer: &'static str,
    center: Vec2,
    size: Vec2,
    sorting_key: Option<i32>,
}

const PEOPLE: &[PersonSpec] = &[
    PersonSpec {
        key: "ana",
        position: Vec2::new(0.0, -2.4),
    },
    PersonSpec {
        key: "bob",
        position: Vec2::new(-3.0, -2.4),
    },
];

const ITEMS: &[ItemSpec] = &[
    ItemSpec {
        key: "cup",
        position: Vec2::new(3.0, -0.9),
        can_be_held: true,
    },
    ItemSpec {
        key: "book",
        position: Vec2::new(3.5, -0.9),
        can_be_held: true,
    },
    ItemSpec {
        key: "plant",
        position: Vec2::new(1.5, -2.4),
        can_be_held: false,
    },
];

const FURNITURE: &[FurnitureSpec] = &[
    FurnitureSpec {
        layer: "Floor",
        center: Vec2::new(0.0, -2.5),
        size: Vec2::new(20.0, 0.5),
        sorting_key: None,
    },
    FurnitureSpec {
        layer: "SitFriendly",
        center: Vec2::new(2.0, 0.0),
        size: Vec2::new(1.0, 1.0),
        sorting_key: Some(150),
    },
    FurnitureSpec {
        layer: "SleepFriendly",
        center: Vec2::new(-2.0, 0.0),
        size: Vec2::new(1.5, 0.6),
        sorting_key: None,
    },
    FurnitureSpec {
        layer: "ItemFriendly",
        center: Vec2::new(3.25, -1.0),
        size: Vec2::new(1.0, 0.4),
        sorting_key: Some(90),
    },
];

fn layer<'a>(poses: &'a PoseDatabase, name: &str) -> Result<&'a LayerDef, String> {
    poses
        .layer_id_by_name(name)
        .and_then(|id| poses.layer(id))
        .ok_or_else(|| format!("demo scene needs layer '{name}'"))
}

fn spawn_people(
    registry: &mut EntityRegistry,
    poses: &PoseDatabase,
) -> Result<Vec<EntityId>, String> {
    let mask = poses.layer_mask(PERSON_LAYERS);
    PEOPLE
        .iter()
        .map(|spec| {
            registry
                .spawn(
                    EntitySpawn::person(spec.key, spec.position, poses.standing())
                        .with_placement_mask(mask)
                        .with_overlap_shape(LocalBox::new(Vec2::new(0.4, 0.4), Vec2::ZERO))
                        .with_hit_shape(LocalBox::new(Vec2::new(0.8, 1.6), Vec2::new(0.0, 0.8)))
                        .with_hand_offset(Vec2::new(0.3, 0.4)),
                )
                .map_err(|error| format!("spawn person '{}': {error}", spec.key))
        })
        .collect()
}

fn spawn_items(registry: &mut EntityRegistry, poses: &PoseDatabase) -> Result<(), String> {
    let mask = poses.layer_mask(ITEM_LAYERS);
    for spec in ITEMS {
        registry
            .spawn(
                EntitySpawn::item(spec.key, spec.position, spec.can_be_held)
                    .with_placement_mask(mask)
                    .with_overlap_shape(LocalBox::new(Vec2::new(0.2, 0.2), Vec2::ZERO))
                    .with_hit_shape(LocalBox::new(Vec2::new(0.4, 0.4), Vec2::ZERO)),
            )
            .map_err(|error| format!("spawn item '{}': {error}", spec.key))?;
    }
    Ok(())
}

/// Builds the living room: two people, a few props, furniture zones and a
/// person zone that follows each person around.
pub(crate) fn build_demo_scene(poses: &PoseDatabase) -> Result<DemoController, String> {
    let mut registry = EntityRegistry::default();
    let people = spawn_people(&mut registry, poses)?;
    spawn_items(&mut registry, poses)?;

    let mut zones = ZoneIndex::new();
    for spec in FURNITURE {
        zones.add(
            layer(poses, spec.layer)?,
            ZoneAnchor::Static {
                bounds: Aabb::from_center_size(spec.center, spec.size),
                sorting_key: spec.sorting_key,
            },
        );
    }
    let person_layer = layer(poses, "Person")?;
    for person in people {
        zones.add(
            person_layer,
            ZoneAnchor::Attached {
                owner: person,
                local: LocalBox::new(Vec2::new(1.0, 1.5), Vec2::new(0.0, 0.75)),
            },
        );
    }

    let camera = ViewportCamera::new(DEMO_VIEWPORT).with_pixels_per_world(DEMO_PIXELS_PER_WORLD);
    Ok(DragController::new(
        DEMO_SCENE_ID,
        registry,
        zones,
        poses.clone(),
        poses.clone(),
        camera,
    ))
}
