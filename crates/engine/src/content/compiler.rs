use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::{debug, info};

use super::database::{DefKind, LayerSource, PoseDatabase, PoseSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInFile,
    InvalidReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct DefOrigin {
    file_path: PathBuf,
    location: SourceLocation,
}

#[derive(Debug, Clone)]
struct PendingPoseDef {
    source: PoseSource,
    origin: DefOrigin,
}

#[derive(Debug, Clone)]
struct PendingLayerDef {
    source: LayerSource,
    origin: DefOrigin,
}

#[derive(Debug, Default)]
struct ParsedDefs {
    poses: Vec<PendingPoseDef>,
    layers: Vec<PendingLayerDef>,
}

/// Compiles every `*.xml` under `content_dir` into a pose table.
///
/// Files are visited in sorted relative-path order. A def name may appear once
/// per file; a later file redefining the same name replaces the earlier def
/// but keeps its original position in the table.
pub fn compile_pose_database(content_dir: &Path) -> Result<PoseDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut poses = BTreeMap::<String, (usize, PendingPoseDef)>::new();
    let mut layers = BTreeMap::<String, (usize, PendingLayerDef)>::new();

    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source_err| read_error(xml_file.clone(), source_err))?;
        let parsed = parse_defs_document(xml_file, &raw)?;
        debug!(
            file = %xml_file.display(),
            poses = parsed.poses.len(),
            layers = parsed.layers.len(),
            "content_file_parsed"
        );
        for def in parsed.poses {
            let order = poses
                .get(&def.source.def_name)
                .map(|(order, _)| *order)
                .unwrap_or(poses.len());
            poses.insert(def.source.def_name.clone(), (order, def));
        }
        for def in parsed.layers {
            let order = layers
                .get(&def.source.def_name)
                .map(|(order, _)| *order)
                .unwrap_or(layers.len());
            layers.insert(def.source.def_name.clone(), (order, def));
        }
    }

    let mut poses = poses.into_values().collect::<Vec<_>>();
    poses.sort_by_key(|(order, _)| *order);
    let mut layers = layers.into_values().collect::<Vec<_>>();
    layers.sort_by_key(|(order, _)| *order);

    let origins = poses
        .iter()
        .map(|(_, def)| ((DefKind::Pose, def.source.def_name.clone()), def.origin.clone()))
        .chain(layers.iter().map(|(_, def)| {
            ((DefKind::Layer, def.source.def_name.clone()), def.origin.clone())
        }))
        .collect::<BTreeMap<_, _>>();

    let database = PoseDatabase::build(
        poses.into_iter().map(|(_, def)| def.source).collect(),
        layers.into_iter().map(|(_, def)| def.source).collect(),
    )
    .map_err(|error| {
        let origin = error
            .def_ref()
            .and_then(|(kind, name)| origins.get(&(kind, name.to_string())));
        ContentCompileError {
            code: ContentErrorCode::InvalidReference,
            message: error.to_string(),
            file_path: origin
                .map(|origin| origin.file_path.clone())
                .unwrap_or_else(|| content_dir.to_path_buf()),
            location: origin.map(|origin| origin.location),
        }
    })?;

    info!(
        content_dir = %content_dir.display(),
        files = xml_files.len(),
        poses = database.poses().len(),
        layers = database.layers().len(),
        "pose_table_compiled"
    );
    Ok(database)
}

fn parse_defs_document(file_path: &Path, raw: &str) -> Result<ParsedDefs, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut parsed = ParsedDefs::default();
    let mut seen_in_file = HashSet::<(DefKind, String)>::new();
    for child in root.children().filter(|node| node.is_element()) {
        let (kind, def_name) = match child.tag_name().name() {
            "PoseDef" => {
                let def = parse_pose_def(file_path, &doc, child)?;
                let name = def.source.def_name.clone();
                parsed.poses.push(def);
                (DefKind::Pose, name)
            }
            "LayerDef" => {
                let def = parse_layer_def(file_path, &doc, child)?;
                let name = def.source.def_name.clone();
                parsed.layers.push(def);
                (DefKind::Layer, name)
            }
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>; expected <PoseDef> or <LayerDef>"),
                    file_path,
                    &doc,
                    child,
                ))
            }
        };
        if !seen_in_file.insert((kind, def_name.clone())) {
            let def_type = match kind {
                DefKind::Pose => "PoseDef",
                DefKind::Layer => "LayerDef",
            };
            return Err(error_at_node(
                ContentErrorCode::DuplicateDefInFile,
                format!(
                    "duplicate {def_type} '{def_name}'; each file may define a defName only once per def type"
                ),
                file_path,
                &doc,
                child,
            ));
        }
    }

    Ok(parsed)
}

fn parse_pose_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<PendingPoseDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut art: Option<String> = None;
    let mut holding_pose: Option<String> = None;
    let mut can_hold: Option<bool> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        reject_duplicate_field(&mut seen_fields, &field_name, "PoseDef", file_path, doc, field)?;

        match field_name.as_str() {
            "defName" => def_name = Some(required_text(file_path, doc, field, "defName")?),
            "art" => art = Some(required_text(file_path, doc, field, "art")?),
            "holdingPose" => {
                holding_pose = Some(required_text(file_path, doc, field, "holdingPose")?)
            }
            "canHold" => can_hold = Some(parse_bool(file_path, doc, field, "canHold")?),
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <PoseDef>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let def_name = require_field(def_name, "defName", "PoseDef", file_path, doc, node)?;
    let art = require_field(art, "art", "PoseDef", file_path, doc, node)?;

    Ok(PendingPoseDef {
        source: PoseSource {
            def_name,
            art,
            holding_pose,
            can_hold: can_hold.unwrap_or(false),
        },
        origin: origin_of(file_path, doc, node),
    })
}

fn parse_layer_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<PendingLayerDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut priority: Option<i32> = None;
    let mut pose: Option<String> = None;
    let mut rest_scale_on_hover: Option<bool> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        reject_duplicate_field(&mut seen_fields, &field_name, "LayerDef", file_path, doc, field)?;

        match field_name.as_str() {
            "defName" => def_name = Some(required_text(file_path, doc, field, "defName")?),
            "priority" => {
                let value = required_text(file_path, doc, field, "priority")?;
                let parsed = value.parse::<i32>().map_err(|_| {
                    error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("priority '{value}' is not a valid integer"),
                        file_path,
                        doc,
                        field,
                    )
                })?;
                priority = Some(parsed);
            }
            "pose" => pose = Some(required_text(file_path, doc, field, "pose")?),
            "restScaleOnHover" => {
                rest_scale_on_hover =
                    Some(parse_bool(file_path, doc, field, "restScaleOnHover")?)
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <LayerDef>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let def_name = require_field(def_name, "defName", "LayerDef", file_path, doc, node)?;
    let priority = require_field(priority, "priority", "LayerDef", file_path, doc, node)?;

    Ok(PendingLayerDef {
        source: LayerSource {
            def_name,
            priority,
            pose,
            rest_scale_on_hover: rest_scale_on_hover.unwrap_or(false),
        },
        origin: origin_of(file_path, doc, node),
    })
}

fn reject_duplicate_field(
    seen_fields: &mut HashSet<String>,
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    field: Node<'_, '_>,
) -> Result<(), ContentCompileError> {
    if seen_fields.insert(field_name.to_string()) {
        return Ok(());
    }
    Err(error_at_node(
        ContentErrorCode::DuplicateField,
        format!("duplicate field <{field_name}> in <{def_type}>"),
        file_path,
        doc,
        field,
    ))
}

fn require_field<T>(
    value: Option<T>,
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<T, ContentCompileError> {
    value.ok_or_else(|| {
        error_at_node(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <{def_type}>"),
            file_path,
            doc,
            node,
        )
    })
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentCompileError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn parse_bool(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<bool, ContentCompileError> {
    let value = required_text(file_path, doc, node, field_name)?;
    match value.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{field_name} '{value}' must be 'true' or 'false'"),
            file_path,
            doc,
            node,
        )),
    }
}

fn origin_of(file_path: &Path, doc: &Document<'_>, node: Node<'_, '_>) -> DefOrigin {
    let pos = doc.text_pos_at(node.range().start);
    DefOrigin {
        file_path: file_path.to_path_buf(),
        location: SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        },
    }
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentCompileError {
    let origin = origin_of(file_path, doc, node);
    ContentCompileError {
        code,
        message,
        file_path: origin.file_path,
        location: Some(origin.location),
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        file_path: path,
        location: None,
    }
}
