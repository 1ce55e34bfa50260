use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::camera::CameraHooks;
use super::drag::DragController;
use super::pose::{PoseArt, PoseAutomaton};
use super::scene::{Entity, EntityId, EntityKind, Vec2};
use crate::content::{PoseDatabase, STANDING_POSE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SnapshotVec3 {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Persisted state of one entity. `id` is the entity's stable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub kind: EntityKind,
    pub position: SnapshotVec3,
    /// `z` is written as 1.0 and ignored on restore.
    pub scale: SnapshotVec3,
    pub sorting_key: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_item_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot belongs to scene {actual:?}, expected {expected:?}")]
    SceneMismatch { expected: SceneId, actual: SceneId },
}

fn record_for(
    entity: &Entity,
    poses: &PoseDatabase,
    key_of: impl Fn(EntityId) -> Option<String>,
) -> EntityRecord {
    let person = entity.person();
    EntityRecord {
        id: entity.key.clone(),
        kind: entity.kind(),
        position: SnapshotVec3 {
            x: entity.transform.position.x,
            y: entity.transform.position.y,
            z: entity.transform.z,
        },
        scale: SnapshotVec3 {
            x: entity.transform.scale.x,
            y: entity.transform.scale.y,
            z: 1.0,
        },
        sorting_key: entity.sorting_key,
        pose: person.map(|state| poses.pose_name(state.pose).to_string()),
        held_item_id: person
            .and_then(|state| state.held_item)
            .and_then(key_of),
    }
}

impl<C: CameraHooks, A: PoseArt> DragController<C, A> {
    /// Current state of every entity in spawn order.
    pub fn capture(&self) -> Vec<EntityRecord> {
        self.registry
            .entities()
            .iter()
            .map(|entity| {
                record_for(entity, &self.poses, |id| {
                    self.registry.find(id).map(|held| held.key.clone())
                })
            })
            .collect()
    }

    /// Applies persisted records. Poses are trusted verbatim, holds are
    /// re-established through the normal hold rules, and records that cannot
    /// be matched are skipped.
    pub fn restore(
        &mut self,
        scene_id: SceneId,
        records: &[EntityRecord],
    ) -> Result<RestoreReport, SnapshotError> {
        if scene_id != self.scene_id {
            return Err(SnapshotError::SceneMismatch {
                expected: self.scene_id,
                actual: scene_id,
            });
        }
        if self.session.take().is_some() {
            self.camera.notify_drag_ended();
        }

        let mut report = RestoreReport::default();
        let mut holds = Vec::<(EntityId, String)>::new();
        for record in records {
            let Some(entity) = self.registry.find_by_key(&record.id) else {
                warn!(id = %record.id, reason = "unknown_entity", "snapshot_record_skipped");
                report.skipped += 1;
                continue;
            };
            let kind = self.registry.find(entity).map(|found| found.kind());
            if kind != Some(record.kind) {
                warn!(id = %record.id, reason = "kind_mismatch", "snapshot_record_skipped");
                report.skipped += 1;
                continue;
            }
            let scale = Vec2::new(record.scale.x, record.scale.y);
            if !record.position.is_finite() || !scale.is_finite() || scale.x == 0.0 || scale.y == 0.0 {
                warn!(id = %record.id, reason = "invalid_transform", "snapshot_record_skipped");
                report.skipped += 1;
                continue;
            }

            self.cancel_motion(entity);
            let linked_person = match record.kind {
                EntityKind::Person => Some(entity),
                EntityKind::Item => self.registry.find(entity).and_then(Entity::holder),
            };
            if let Some(person) = linked_person {
                self.registry.unlink_hold(person);
            }
            if let Some(found) = self.registry.find_mut(entity) {
                found.transform.position = Vec2::new(record.position.x, record.position.y);
                found.transform.z = record.position.z;
                found.transform.scale = scale;
                found.sorting_key = record.sorting_key;
            }
            if record.kind == EntityKind::Person {
                let pose = record.pose.as_deref().unwrap_or(STANDING_POSE);
                PoseAutomaton::new(&self.poses, &self.art).restore_pose(&mut self.registry, entity, pose);
                if let Some(item_key) = &record.held_item_id {
                    holds.push((entity, item_key.clone()));
                }
            }
            report.applied += 1;
        }

        for (person, item_key) in holds {
            let Some(item) = self.registry.find_by_key(&item_key) else {
                warn!(person = person.0, item = %item_key, reason = "unknown_held_item", "snapshot_record_skipped");
                continue;
            };
            if let Some(holder) = self.registry.find(item).and_then(Entity::holder) {
                self.registry.unlink_hold(holder);
            }
            self.cancel_motion(item);
            // the saved pose may already be a holding pose
            let automaton = PoseAutomaton::new(&self.poses, &self.art);
            automaton.normalize(&mut self.registry, person);
            if let Err(reason) = automaton.hold_item(&mut self.registry, person, item) {
                warn!(person = person.0, item = item.0, %reason, "hold_rejected");
            }
        }

        self.normalize_all_poses();
        info!(
            scene = self.scene_id.0,
            applied = report.applied,
            skipped = report.skipped,
            "snapshot_restored"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::camera::FixedCamera;
    use crate::app::scene::{EntityRegistry, EntitySpawn};
    use crate::app::zones::ZoneIndex;

    fn controller() -> DragController<FixedCamera, PoseDatabase> {
        let db = PoseDatabase::builtin();
        let mut registry = EntityRegistry::default();
        registry
            .spawn(
                EntitySpawn::person("ana", Vec2::new(1.0, 2.0), db.standing())
                    .with_hand_offset(Vec2::new(0.5, 0.0)),
            )
            .expect("ana");
        registry
            .spawn(EntitySpawn::item("cup", Vec2::new(-1.0, 0.0), true))
            .expect("cup");
        DragController::new(
            SceneId(3),
            registry,
            ZoneIndex::new(),
            db.clone(),
            db,
            FixedCamera { floor_y: -10.0 },
        )
    }

    fn record(id: &str, kind: EntityKind, x: f32, y: f32) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            kind,
            position: SnapshotVec3 { x, y, z: 0.0 },
            scale: SnapshotVec3 {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
            sorting_key: 7,
            pose: None,
            held_item_id: None,
        }
    }

    #[test]
    fn capture_then_restore_reproduces_holding_state() {
        let mut source = controller();
        let ana = source.registry().find_by_key("ana").expect("ana");
        let cup = source.registry().find_by_key("cup").expect("cup");
        assert!(source.hold_item(ana, cup));
        let records = source.capture();
        assert_eq!(records[0].pose.as_deref(), Some("holding"));
        assert_eq!(records[0].held_item_id.as_deref(), Some("cup"));
        assert_eq!(records[1].pose, None);

        let mut target = controller();
        let report = target.restore(SceneId(3), &records).expect("restore");
        assert_eq!(report, RestoreReport { applied: 2, skipped: 0 });
        let cup_entity = target.registry().find(cup).expect("cup");
        assert_eq!(cup_entity.holder(), Some(ana));
        assert_eq!(cup_entity.position(), Vec2::new(1.5, 2.0));
        assert_eq!(target.capture(), records);
    }

    #[test]
    fn restore_trusts_pose_verbatim() {
        let mut controller = controller();
        let mut ana = record("ana", EntityKind::Person, 4.0, 4.0);
        ana.pose = Some("sleeping".to_string());
        controller.restore(SceneId(3), &[ana]).expect("restore");
        let id = controller.registry().find_by_key("ana").expect("ana");
        let found = controller.registry().find(id).expect("found");
        assert_eq!(controller.poses().pose_name(found.person().expect("person").pose), "sleeping");
        assert_eq!(found.position(), Vec2::new(4.0, 4.0));
        assert_eq!(found.sorting_key, 7);
    }

    #[test]
    fn unknown_and_mismatched_records_are_skipped() {
        let mut controller = controller();
        let mut ana = record("ana", EntityKind::Person, 0.0, 0.0);
        ana.held_item_id = Some("teapot".to_string());
        ana.pose = Some("moonwalking".to_string());
        let records = vec![
            record("ghost", EntityKind::Item, 0.0, 0.0),
            record("cup", EntityKind::Person, 0.0, 0.0),
            record("cup", EntityKind::Item, f32::NAN, 0.0),
            ana,
        ];
        let report = controller.restore(SceneId(3), &records).expect("restore");
        assert_eq!(report, RestoreReport { applied: 1, skipped: 3 });
        let id = controller.registry().find_by_key("ana").expect("ana");
        let found = controller.registry().find(id).expect("found");
        assert_eq!(controller.poses().pose_name(found.person().expect("person").pose), "standing");
        assert_eq!(found.held_item(), None);
    }

    #[test]
    fn holding_pose_without_item_is_normalized() {
        let mut controller = controller();
        let mut ana = record("ana", EntityKind::Person, 0.0, 0.0);
        ana.pose = Some("sittingholding".to_string());
        controller.restore(SceneId(3), &[ana]).expect("restore");
        let id = controller.registry().find_by_key("ana").expect("ana");
        let pose = controller
            .registry()
            .find(id)
            .and_then(Entity::person)
            .expect("person")
            .pose;
        assert_eq!(controller.poses().pose_name(pose), "sitting");
    }

    #[test]
    fn scene_mismatch_is_an_error() {
        let mut controller = controller();
        assert_eq!(
            controller.restore(SceneId(4), &[]),
            Err(SnapshotError::SceneMismatch {
                expected: SceneId(3),
                actual: SceneId(4)
            })
        );
    }

    #[test]
    fn record_serializes_without_empty_person_fields() {
        let json = serde_json::to_value(record("cup", EntityKind::Item, 1.0, 2.0)).expect("json");
        assert_eq!(
            json,
            serde_json::json!({
                "id": "cup",
                "kind": "Item",
                "position": {"x": 1.0, "y": 2.0, "z": 0.0},
                "scale": {"x": 1.0, "y": 1.0, "z": 1.0},
                "sorting_key": 7
            })
        );
    }
}
