use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use dollhouse_engine::{EntityRecord, SceneId};
use serde::{Deserialize, Serialize};

pub(crate) const SAVE_VERSION: u32 = 1;

pub(crate) type SaveLoadResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SceneSave {
    pub(crate) save_version: u32,
    pub(crate) scene_id: SceneId,
    pub(crate) records: Vec<EntityRecord>,
}

impl SceneSave {
    pub(crate) fn new(scene_id: SceneId, records: Vec<EntityRecord>) -> Self {
        Self {
            save_version: SAVE_VERSION,
            scene_id,
            records,
        }
    }
}

pub(crate) fn save_file_path(saves_dir: &Path, scene_id: SceneId) -> PathBuf {
    saves_dir.join(format!("scene_{}.save.json", scene_id.0))
}

pub(crate) fn save_to_disk(saves_dir: &Path, save: &SceneSave) -> SaveLoadResult<PathBuf> {
    let path = save_file_path(saves_dir, save.scene_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| format!("create save dir '{}': {error}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(save)
        .map_err(|error| format!("encode save json: {error}"))?;
    fs::write(&path, json).map_err(|error| format!("write save '{}': {error}", path.display()))?;
    Ok(path)
}

/// `Ok(None)` when no save exists yet for the scene.
pub(crate) fn load_and_validate_save(
    saves_dir: &Path,
    expected_scene: SceneId,
) -> SaveLoadResult<Option<SceneSave>> {
    let path = save_file_path(saves_dir, expected_scene);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)
        .map_err(|error| format!("read save '{}': {error}", path.display()))?;
    let save = parse_scene_save_json(&raw)?;
    validate_scene_save(&save, expected_scene)?;
    Ok(Some(save))
}

pub(crate) fn parse_scene_save_json(raw: &str) -> SaveLoadResult<SceneSave> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SceneSave>(&mut deserializer) {
        Ok(save) => Ok(save),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse save json: {source}"))
            } else {
                Err(format!("parse save json at {path}: {source}"))
            }
        }
    }
}

fn validation_err(path: &str, message: impl Into<String>) -> String {
    format!("validation failed at {path}: {}", message.into())
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

pub(crate) fn validate_scene_save(save: &SceneSave, expected_scene: SceneId) -> SaveLoadResult<()> {
    if save.save_version != SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            SAVE_VERSION,
            save.save_version,
        ));
    }
    if save.scene_id != expected_scene {
        return Err(expected_actual(
            "scene_id",
            expected_scene.0,
            save.scene_id.0,
        ));
    }

    let mut known_ids = HashMap::with_capacity(save.records.len());
    for (index, record) in save.records.iter().enumerate() {
        if record.id.is_empty() {
            return Err(validation_err(
                &format!("records[{index}].id"),
                "empty id",
            ));
        }
        if let Some(first_index) = known_ids.insert(record.id.as_str(), index) {
            return Err(validation_err(
                &format!("records[{index}].id"),
                format!(
                    "duplicate id '{}' (first seen at records[{first_index}].id)",
                    record.id
                ),
            ));
        }

        let fields = [
            ("position.x", record.position.x),
            ("position.y", record.position.y),
            ("position.z", record.position.z),
            ("scale.x", record.scale.x),
            ("scale.y", record.scale.y),
            ("scale.z", record.scale.z),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(expected_actual(
                    &format!("records[{index}].{field}"),
                    "finite number",
                    value,
                ));
            }
        }

        if record.held_item_id.as_deref() == Some(record.id.as_str()) {
            return Err(validation_err(
                &format!("records[{index}].held_item_id"),
                "entity cannot hold itself",
            ));
        }
    }

    for (index, record) in save.records.iter().enumerate() {
        let Some(held) = record.held_item_id.as_deref() else {
            continue;
        };
        if !known_ids.contains_key(held) {
            return Err(validation_err(
                &format!("records[{index}].held_item_id"),
                format!("unknown id '{held}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dollhouse_engine::{EntityKind, SnapshotVec3};

    fn record(id: &str, kind: EntityKind) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            kind,
            position: SnapshotVec3 {
                x: 1.0,
                y: -2.0,
                z: 0.0,
            },
            scale: SnapshotVec3 {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
            sorting_key: 200,
            pose: None,
            held_item_id: None,
        }
    }

    fn sample_save() -> SceneSave {
        let mut ana = record("ana", EntityKind::Person);
        ana.pose = Some("holding".to_string());
        ana.held_item_id = Some("cup".to_string());
        SceneSave::new(SceneId(1), vec![ana, record("cup", EntityKind::Item)])
    }

    #[test]
    fn sample_save_validates() {
        assert_eq!(validate_scene_save(&sample_save(), SceneId(1)), Ok(()));
    }

    #[test]
    fn parse_reports_the_failing_json_path() {
        let mut value = serde_json::to_value(sample_save()).expect("json");
        value["records"][1]["kind"] = serde_json::json!("Furniture");
        let error = parse_scene_save_json(&value.to_string()).expect_err("bad kind");
        assert!(error.contains("records[1].kind"), "{error}");
    }

    #[test]
    fn parse_accepts_records_without_person_fields() {
        let value = serde_json::json!({
            "save_version": SAVE_VERSION,
            "scene_id": 1,
            "records": [{
                "id": "cup",
                "kind": "Item",
                "position": {"x": 0.0, "y": 0.0, "z": 0.0},
                "scale": {"x": 1.0, "y": 1.0, "z": 1.0},
                "sorting_key": 0
            }]
        });
        let save = parse_scene_save_json(&value.to_string()).expect("parse");
        assert_eq!(save.records[0].pose, None);
        assert_eq!(save.records[0].held_item_id, None);
    }

    #[test]
    fn validation_rejects_bad_version_or_scene() {
        let mut bad_version = sample_save();
        bad_version.save_version = SAVE_VERSION + 1;
        let error = validate_scene_save(&bad_version, SceneId(1)).expect_err("version");
        assert!(error.contains("save_version"), "{error}");

        let error = validate_scene_save(&sample_save(), SceneId(2)).expect_err("scene");
        assert!(error.contains("scene_id"), "{error}");
    }

    #[test]
    fn validation_rejects_duplicate_ids_and_dangling_holds() {
        let mut duplicate = sample_save();
        duplicate.records.push(record("cup", EntityKind::Item));
        let error = validate_scene_save(&duplicate, SceneId(1)).expect_err("duplicate");
        assert!(error.contains("records[2].id"), "{error}");
        assert!(error.contains("records[1].id"), "{error}");

        let mut dangling = sample_save();
        dangling.records[0].held_item_id = Some("teapot".to_string());
        let error = validate_scene_save(&dangling, SceneId(1)).expect_err("dangling");
        assert!(error.contains("records[0].held_item_id"), "{error}");
    }

    #[test]
    fn validation_rejects_non_finite_numbers() {
        let mut save = sample_save();
        save.records[1].scale.y = f32::INFINITY;
        let error = validate_scene_save(&save, SceneId(1)).expect_err("infinite");
        assert!(error.contains("records[1].scale.y"), "{error}");
    }

    #[test]
    fn save_round_trips_through_disk() {
        let temp = tempfile::TempDir::new().expect("temp");
        assert_eq!(load_and_validate_save(temp.path(), SceneId(1)), Ok(None));

        let path = save_to_disk(temp.path(), &sample_save()).expect("save");
        assert_eq!(path, temp.path().join("scene_1.save.json"));
        let loaded = load_and_validate_save(temp.path(), SceneId(1)).expect("load");
        assert_eq!(loaded, Some(sample_save()));
    }
}
