use dollhouse_engine::{
    Aabb, DragController, DragEvent, EntityId, EntityPhase, EntityRegistry, EntitySpawn, LocalBox,
    PoseDatabase, SceneId, Vec2, Viewport, ViewportCamera, ZoneAnchor, ZoneIndex,
};

const DT: f32 = 1.0 / 60.0;

type Controller = DragController<ViewportCamera, PoseDatabase>;

struct House {
    controller: Controller,
    ana: EntityId,
    bob: EntityId,
    cup: EntityId,
    book: EntityId,
}

fn static_zone(center: Vec2, size: Vec2, sorting_key: Option<i32>) -> ZoneAnchor {
    ZoneAnchor::Static {
        bounds: Aabb::from_center_size(center, size),
        sorting_key,
    }
}

fn spawn_person(registry: &mut EntityRegistry, db: &PoseDatabase, key: &str, position: Vec2) -> EntityId {
    registry
        .spawn(
            EntitySpawn::person(key, position, db.standing())
                .with_placement_mask(db.layer_mask(&[
                    "SitFriendly",
                    "SleepFriendly",
                    "PersonFriendly",
                    "Floor",
                ]))
                .with_overlap_shape(LocalBox::new(Vec2::new(0.4, 0.4), Vec2::ZERO))
                .with_hand_offset(Vec2::new(0.3, 0.4)),
        )
        .expect("person")
}

fn spawn_item(registry: &mut EntityRegistry, db: &PoseDatabase, key: &str, position: Vec2) -> EntityId {
    registry
        .spawn(
            EntitySpawn::item(key, position, true)
                .with_placement_mask(db.layer_mask(&["Person", "ItemFriendly", "Floor"]))
                .with_overlap_shape(LocalBox::new(Vec2::new(0.2, 0.2), Vec2::ZERO))
                .with_hit_shape(LocalBox::new(Vec2::new(0.4, 0.4), Vec2::ZERO)),
        )
        .expect("item")
}

/// Visible world area is x in [-4, 4], y in [-3, 3].
fn house() -> House {
    let db = PoseDatabase::builtin();
    let mut registry = EntityRegistry::default();
    let ana = spawn_person(&mut registry, &db, "ana", Vec2::new(0.0, -2.5));
    let bob = spawn_person(&mut registry, &db, "bob", Vec2::new(-3.5, -2.5));
    let cup = spawn_item(&mut registry, &db, "cup", Vec2::new(3.0, -1.0));
    let book = spawn_item(&mut registry, &db, "book", Vec2::new(3.5, -1.0));

    let layer = |name: &str| db.layer(db.layer_id_by_name(name).expect("layer")).expect("def");
    let mut zones = ZoneIndex::new();
    zones.add(
        layer("Floor"),
        static_zone(Vec2::new(0.0, -2.5), Vec2::new(20.0, 0.5), None),
    );
    zones.add(
        layer("SitFriendly"),
        static_zone(Vec2::new(2.0, 0.0), Vec2::ONE, Some(150)),
    );
    zones.add(
        layer("SitFriendly"),
        static_zone(Vec2::new(-2.0, 1.5), Vec2::ONE, None),
    );
    zones.add(
        layer("SleepFriendly"),
        static_zone(Vec2::new(-2.0, 0.0), Vec2::new(1.5, 0.6), None),
    );
    zones.add(
        layer("ItemFriendly"),
        static_zone(Vec2::new(3.25, -1.0), Vec2::new(1.0, 0.4), Some(90)),
    );
    for person in [ana, bob] {
        zones.add(
            layer("Person"),
            ZoneAnchor::Attached {
                owner: person,
                local: LocalBox::new(Vec2::new(1.0, 1.5), Vec2::new(0.0, 0.75)),
            },
        );
    }

    let camera = ViewportCamera::new(Viewport {
        width: 800,
        height: 600,
    })
    .with_pixels_per_world(100.0);
    let controller = DragController::new(SceneId(1), registry, zones, db.clone(), db, camera);
    House {
        controller,
        ana,
        bob,
        cup,
        book,
    }
}

fn drag(controller: &mut Controller, entity: EntityId, to: Vec2) {
    let from = controller.registry().find(entity).expect("entity").position();
    assert_eq!(controller.begin_drag_entity(entity, from), Some(entity));
    controller.move_drag(Vec2::new((from.x + to.x) * 0.5, (from.y + to.y) * 0.5));
    controller.move_drag(to);
    controller.end_drag();
}

fn run(controller: &mut Controller, ticks: usize) {
    for _ in 0..ticks {
        controller.tick(DT);
    }
}

fn pose(controller: &Controller, person: EntityId) -> String {
    let state = controller
        .registry()
        .find(person)
        .and_then(|entity| entity.person())
        .expect("person");
    controller.poses().pose_name(state.pose).to_string()
}

fn assert_holding_invariants(controller: &Controller) {
    let registry = controller.registry();
    for entity in registry.entities() {
        if let Some(state) = entity.person() {
            let holding_pose = controller.poses().is_holding_pose(state.pose);
            assert_eq!(
                holding_pose,
                state.held_item.is_some(),
                "{} pose {} vs held {:?}",
                entity.key,
                controller.poses().pose_name(state.pose),
                state.held_item
            );
            let holders = registry
                .entities()
                .iter()
                .filter(|other| other.holder() == Some(entity.id))
                .count();
            assert!(holders <= 1, "{} is holder of {holders} items", entity.key);
            if let Some(item) = state.held_item {
                let item = registry.find(item).expect("held item");
                assert_eq!(item.holder(), Some(entity.id));
                assert_eq!(item.sorting_key, entity.sorting_key + 1);
            }
        }
        if let Some(holder) = entity.holder() {
            let holder = registry.find(holder).expect("holder");
            assert_eq!(holder.held_item(), Some(entity.id));
        }
    }
}

#[test]
fn person_dropped_on_chair_sits_above_the_chair() {
    let mut h = house();
    drag(&mut h.controller, h.ana, Vec2::new(2.0, 0.0));

    assert_eq!(pose(&h.controller, h.ana), "sitting");
    assert_eq!(h.controller.registry().find(h.ana).expect("ana").sorting_key, 151);
}

#[test]
fn chair_without_sprite_uses_position_sorting() {
    let mut h = house();
    drag(&mut h.controller, h.ana, Vec2::new(-2.0, 1.5));

    assert_eq!(pose(&h.controller, h.ana), "sitting");
    assert_eq!(h.controller.registry().find(h.ana).expect("ana").sorting_key, -150);
}

#[test]
fn sitting_person_takes_holding_counterpart_on_hold() {
    let mut h = house();
    drag(&mut h.controller, h.ana, Vec2::new(2.0, 0.0));
    assert!(h.controller.hold_item(h.ana, h.cup));

    assert_eq!(pose(&h.controller, h.ana), "sittingholding");
    let cup = h.controller.registry().find(h.cup).expect("cup");
    assert_eq!(cup.holder(), Some(h.ana));
    assert_eq!(cup.sorting_key, 152);
    assert_holding_invariants(&h.controller);
}

#[test]
fn item_released_in_the_air_falls_onto_the_floor() {
    let mut h = house();
    drag(&mut h.controller, h.cup, Vec2::new(1.0, 2.0));
    assert_eq!(h.controller.phase(h.cup), EntityPhase::Falling);

    run(&mut h.controller, 600);
    let cup = h.controller.registry().find(h.cup).expect("cup");
    assert!(cup.position().y <= -2.25 && cup.position().y >= -2.75);
    assert_eq!(cup.position().x, 1.0);
    assert_eq!(h.controller.phase(h.cup), EntityPhase::Idle);
    let events = h.controller.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, DragEvent::Landed { entity, .. } if *entity == h.cup)));
    assert!(!events.contains(&DragEvent::ResetToOrigin { entity: h.cup }));
}

#[test]
fn item_falling_off_screen_returns_exactly_to_drag_start() {
    let mut h = house();
    let start = h.controller.registry().find(h.cup).expect("cup").position();
    drag(&mut h.controller, h.cup, Vec2::new(15.0, 1.0));
    assert_eq!(h.controller.phase(h.cup), EntityPhase::Falling);

    run(&mut h.controller, 600);
    assert!(h
        .controller
        .drain_events()
        .contains(&DragEvent::ResetToOrigin { entity: h.cup }));
    let cup = h.controller.registry().find(h.cup).expect("cup");
    assert_eq!(cup.position(), start);
    assert_eq!(cup.sorting_key, 91);
}

#[test]
fn person_carried_to_bed_drops_the_item() {
    let mut h = house();
    assert!(h.controller.hold_item(h.ana, h.cup));
    assert_eq!(pose(&h.controller, h.ana), "holding");

    let from = h.controller.registry().find(h.ana).expect("ana").position();
    h.controller.begin_drag_entity(h.ana, from);
    assert_eq!(h.controller.registry().find(h.cup).expect("cup").sorting_key, 1001);
    h.controller.move_drag(Vec2::new(-2.0, 0.0));
    assert_eq!(pose(&h.controller, h.ana), "holding");
    assert_holding_invariants(&h.controller);
    h.controller.end_drag();

    assert_eq!(pose(&h.controller, h.ana), "sleeping");
    assert_eq!(h.controller.registry().find(h.ana).expect("ana").held_item(), None);
    assert_eq!(h.controller.registry().find(h.cup).expect("cup").holder(), None);
    assert!(h.controller.drain_events().contains(&DragEvent::ItemReleased {
        person: h.ana,
        item: h.cup
    }));

    run(&mut h.controller, 600);
    assert_eq!(h.controller.registry().find(h.cup).expect("cup").holder(), None);
    assert_eq!(pose(&h.controller, h.ana), "sleeping");
    assert_holding_invariants(&h.controller);
}

#[test]
fn lowest_priority_wins_regardless_of_registration_order() {
    let db = PoseDatabase::builtin();
    let layer = |name: &str| db.layer(db.layer_id_by_name(name).expect("layer")).expect("def");
    let floor = (layer("Floor"), Vec2::new(0.0, 0.0), Vec2::new(4.0, 1.0));
    let shelf = (layer("ItemFriendly"), Vec2::new(0.1, 0.0), Vec2::new(1.0, 1.0));
    let lap = (layer("Person"), Vec2::new(0.0, 0.1), Vec2::new(1.0, 1.0));

    let orders = [
        [floor, shelf, lap],
        [lap, floor, shelf],
        [shelf, lap, floor],
        [floor, lap, shelf],
    ];
    for order in orders {
        let mut registry = EntityRegistry::default();
        let cup = spawn_item(&mut registry, &db, "cup", Vec2::ZERO);
        let mut zones = ZoneIndex::new();
        for (def, center, size) in order {
            zones.add(def, static_zone(center, size, None));
        }
        let hit = zones.resolve_landing(&registry, cup).expect("landed");
        assert_eq!(db.layer_name(hit.layer), "Person");
    }
}

#[test]
fn equal_priority_prefers_first_registered_zone() {
    let db = PoseDatabase::builtin();
    let shelf = db.layer(db.layer_id_by_name("ItemFriendly").expect("layer")).expect("def");
    let mut registry = EntityRegistry::default();
    let cup = spawn_item(&mut registry, &db, "cup", Vec2::ZERO);
    let mut zones = ZoneIndex::new();
    let first = zones.add(shelf, static_zone(Vec2::new(0.2, 0.0), Vec2::ONE, None));
    zones.add(shelf, static_zone(Vec2::new(-0.2, 0.0), Vec2::ONE, None));
    let boosted = zones.add_with_priority(
        shelf.id,
        shelf.priority,
        static_zone(Vec2::ZERO, Vec2::ONE, None),
    );

    let hit = zones.resolve_landing(&registry, cup).expect("landed");
    assert_eq!(hit.zone, first);
    assert_ne!(hit.zone, boosted);

    let mut zones_with_override = zones.clone();
    let preferred = zones_with_override.add_with_priority(
        shelf.id,
        shelf.priority - 1,
        static_zone(Vec2::ZERO, Vec2::ONE, None),
    );
    let hit = zones_with_override
        .resolve_landing(&registry, cup)
        .expect("landed");
    assert_eq!(hit.zone, preferred);
}

#[test]
fn hold_and_release_sequences_keep_invariants() {
    let mut h = house();
    let persons = [h.ana, h.bob];
    let items = [h.cup, h.book];
    let mut seed: u32 = 0x2545_f491;
    for _ in 0..200 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let person = persons[(seed >> 16) as usize % persons.len()];
        let item = items[(seed >> 8) as usize % items.len()];
        if seed % 3 == 0 {
            h.controller.release_item(person);
        } else {
            h.controller.hold_item(person, item);
        }
        assert_holding_invariants(&h.controller);
    }
}

#[test]
fn repeated_hover_is_stable_and_reversible() {
    let mut h = house();
    let from = h.controller.registry().find(h.ana).expect("ana").position();
    h.controller.begin_drag_entity(h.ana, from);

    h.controller.move_drag(Vec2::new(2.0, 0.0));
    let once = pose(&h.controller, h.ana);
    for _ in 0..10 {
        h.controller.move_drag(Vec2::new(2.0, 0.0));
        assert_eq!(pose(&h.controller, h.ana), once);
    }
    assert_eq!(once, "sitting");

    h.controller.move_drag(from);
    assert_eq!(pose(&h.controller, h.ana), "standing");
    h.controller.end_drag();
    assert_eq!(pose(&h.controller, h.ana), "standing");
}

#[test]
fn latest_scale_target_wins() {
    let mut h = house();
    let from = h.controller.registry().find(h.ana).expect("ana").position();
    h.controller.begin_drag_entity(h.ana, from);
    run(&mut h.controller, 3);
    let mid = h.controller.registry().find(h.ana).expect("ana").transform.scale;
    assert!(mid.x > 1.0 && mid.x < 1.2);

    h.controller.move_drag(Vec2::new(2.0, 0.0));
    assert_eq!(h.controller.scale_target(h.ana), Some(Vec2::ONE));
    run(&mut h.controller, 300);
    let ana = h.controller.registry().find(h.ana).expect("ana");
    assert_eq!(ana.transform.scale, Vec2::ONE);
}

#[test]
fn grabbing_a_falling_item_cancels_its_fall() {
    let mut h = house();
    drag(&mut h.controller, h.cup, Vec2::new(1.0, 2.5));
    run(&mut h.controller, 5);
    assert_eq!(h.controller.phase(h.cup), EntityPhase::Falling);
    h.controller.drain_events();

    let mid_air = h.controller.registry().find(h.cup).expect("cup").position();
    h.controller.begin_drag_entity(h.cup, mid_air);
    assert_eq!(h.controller.phase(h.cup), EntityPhase::Dragging);
    assert_eq!(h.controller.fall_origin(h.cup), None);
    run(&mut h.controller, 30);
    assert_eq!(h.controller.registry().find(h.cup).expect("cup").position(), mid_air);

    h.controller.move_drag(Vec2::new(3.25, -1.0));
    h.controller.end_drag();
    run(&mut h.controller, 300);
    let cup = h.controller.registry().find(h.cup).expect("cup");
    assert_eq!(cup.position(), Vec2::new(3.25, -1.0));
    assert_eq!(cup.sorting_key, 91);
    let events = h.controller.drain_events();
    assert!(!events
        .iter()
        .any(|event| matches!(event, DragEvent::Landed { .. } | DragEvent::ResetToOrigin { .. })));
}

#[test]
fn scene_start_gravity_settles_everyone() {
    let mut h = house();
    h.controller.drop_unplaced();
    run(&mut h.controller, 600);

    assert_eq!(pose(&h.controller, h.ana), "standing");
    for id in [h.ana, h.bob, h.cup, h.book] {
        assert_eq!(h.controller.phase(id), EntityPhase::Idle);
    }
    let cup = h.controller.registry().find(h.cup).expect("cup");
    assert_eq!(cup.position().x, 3.0);
    assert!(cup.position().y <= -0.8 && cup.position().y >= -1.2);
    assert_eq!(cup.sorting_key, 91);
    let ana = h.controller.registry().find(h.ana).expect("ana");
    assert!(ana.position().y <= -2.25 && ana.position().y >= -2.75);
}
