use std::collections::HashMap;

use thiserror::Error;

use crate::art_keys::{validate_art_key, ArtKeyError};

pub const STANDING_POSE: &str = "standing";
pub const MAX_LAYERS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoseId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u8);

/// Bit set of layers, one bit per `LayerId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(u32::MAX)
    }

    pub fn from_layers(layers: impl IntoIterator<Item = LayerId>) -> Self {
        layers
            .into_iter()
            .fold(Self::empty(), |mask, layer| mask.with(layer))
    }

    pub fn with(self, layer: LayerId) -> Self {
        Self(self.0 | Self::bit(layer))
    }

    pub fn contains(self, layer: LayerId) -> bool {
        self.0 & Self::bit(layer) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    fn bit(layer: LayerId) -> u32 {
        1u32.checked_shl(layer.0 as u32).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseDef {
    pub id: PoseId,
    pub def_name: String,
    pub art: String,
    pub holding_pose: Option<PoseId>,
    /// Set on holding poses: the pose whose `holding_pose` points here.
    pub base_pose: Option<PoseId>,
    pub can_hold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDef {
    pub id: LayerId,
    pub def_name: String,
    pub priority: i32,
    pub pose: Option<PoseId>,
    pub rest_scale_on_hover: bool,
}

/// Unresolved pose definition, names not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSource {
    pub def_name: String,
    pub art: String,
    pub holding_pose: Option<String>,
    pub can_hold: bool,
}

/// Unresolved layer definition, names not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSource {
    pub def_name: String,
    pub priority: i32,
    pub pose: Option<String>,
    pub rest_scale_on_hover: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoseTableError {
    #[error("pose table must define a 'standing' pose")]
    MissingStandingPose,
    #[error("pose '{pose}' names unknown holding pose '{target}'")]
    UnknownHoldingPose { pose: String, target: String },
    #[error("pose '{pose}' cannot use itself as its holding pose")]
    SelfHoldingPose { pose: String },
    #[error("holding pose '{target}' of '{pose}' has a holding pose of its own")]
    ChainedHoldingPose { pose: String, target: String },
    #[error("holding pose '{target}' is shared by '{first}' and '{second}'")]
    SharedHoldingPose {
        target: String,
        first: String,
        second: String,
    },
    #[error("layer '{layer}' maps to unknown pose '{pose}'")]
    UnknownLayerPose { layer: String, pose: String },
    #[error("too many layers: {count} (max 32)")]
    TooManyLayers { count: usize },
    #[error("pose '{pose}' has invalid art key: {source}")]
    InvalidArt {
        pose: String,
        #[source]
        source: ArtKeyError,
    },
}

/// Pose and layer defs live in separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefKind {
    Pose,
    Layer,
}

impl PoseTableError {
    /// The def the error points at, for locating it in source files.
    pub fn def_ref(&self) -> Option<(DefKind, &str)> {
        match self {
            Self::MissingStandingPose | Self::TooManyLayers { .. } => None,
            Self::UnknownHoldingPose { pose, .. }
            | Self::SelfHoldingPose { pose }
            | Self::ChainedHoldingPose { pose, .. }
            | Self::InvalidArt { pose, .. } => Some((DefKind::Pose, pose)),
            Self::SharedHoldingPose { second, .. } => Some((DefKind::Pose, second)),
            Self::UnknownLayerPose { layer, .. } => Some((DefKind::Layer, layer)),
        }
    }

    pub fn def_name(&self) -> Option<&str> {
        self.def_ref().map(|(_, name)| name)
    }
}

#[derive(Debug, Clone)]
pub struct PoseDatabase {
    poses: Vec<PoseDef>,
    pose_ids_by_name: HashMap<String, PoseId>,
    layers: Vec<LayerDef>,
    layer_ids_by_name: HashMap<String, LayerId>,
    standing: PoseId,
}

impl PoseDatabase {
    pub fn build(
        pose_sources: Vec<PoseSource>,
        layer_sources: Vec<LayerSource>,
    ) -> Result<Self, PoseTableError> {
        if layer_sources.len() > MAX_LAYERS {
            return Err(PoseTableError::TooManyLayers {
                count: layer_sources.len(),
            });
        }

        let mut pose_ids_by_name = HashMap::with_capacity(pose_sources.len());
        for (idx, source) in pose_sources.iter().enumerate() {
            validate_art_key(&source.art).map_err(|source_err| PoseTableError::InvalidArt {
                pose: source.def_name.clone(),
                source: source_err,
            })?;
            pose_ids_by_name.insert(source.def_name.clone(), PoseId(idx as u32));
        }
        let standing = pose_ids_by_name
            .get(STANDING_POSE)
            .copied()
            .ok_or(PoseTableError::MissingStandingPose)?;

        let mut poses = Vec::with_capacity(pose_sources.len());
        for (idx, source) in pose_sources.iter().enumerate() {
            let holding_pose = match &source.holding_pose {
                Some(target) => {
                    let target_id = pose_ids_by_name.get(target).copied().ok_or_else(|| {
                        PoseTableError::UnknownHoldingPose {
                            pose: source.def_name.clone(),
                            target: target.clone(),
                        }
                    })?;
                    if target_id.0 as usize == idx {
                        return Err(PoseTableError::SelfHoldingPose {
                            pose: source.def_name.clone(),
                        });
                    }
                    Some(target_id)
                }
                None => None,
            };
            poses.push(PoseDef {
                id: PoseId(idx as u32),
                def_name: source.def_name.clone(),
                art: source.art.clone(),
                holding_pose,
                base_pose: None,
                can_hold: source.can_hold,
            });
        }

        for idx in 0..poses.len() {
            let Some(target) = poses[idx].holding_pose else {
                continue;
            };
            let target_idx = target.0 as usize;
            if poses[target_idx].holding_pose.is_some() {
                return Err(PoseTableError::ChainedHoldingPose {
                    pose: poses[idx].def_name.clone(),
                    target: poses[target_idx].def_name.clone(),
                });
            }
            if let Some(first) = poses[target_idx].base_pose {
                return Err(PoseTableError::SharedHoldingPose {
                    target: poses[target_idx].def_name.clone(),
                    first: poses[first.0 as usize].def_name.clone(),
                    second: poses[idx].def_name.clone(),
                });
            }
            poses[target_idx].base_pose = Some(PoseId(idx as u32));
        }

        let mut layers = Vec::with_capacity(layer_sources.len());
        let mut layer_ids_by_name = HashMap::with_capacity(layer_sources.len());
        for (idx, source) in layer_sources.into_iter().enumerate() {
            let id = LayerId(idx as u8);
            let pose = match source.pose {
                Some(pose_name) => Some(pose_ids_by_name.get(&pose_name).copied().ok_or_else(
                    || PoseTableError::UnknownLayerPose {
                        layer: source.def_name.clone(),
                        pose: pose_name.clone(),
                    },
                )?),
                None => None,
            };
            layer_ids_by_name.insert(source.def_name.clone(), id);
            layers.push(LayerDef {
                id,
                def_name: source.def_name,
                priority: source.priority,
                pose,
                rest_scale_on_hover: source.rest_scale_on_hover,
            });
        }

        Ok(Self {
            poses,
            pose_ids_by_name,
            layers,
            layer_ids_by_name,
            standing,
        })
    }

    /// The table shipped in `assets/base/poses.xml`, available without disk
    /// access. Links are written out already resolved.
    pub fn builtin() -> Self {
        const STANDING: PoseId = PoseId(0);
        const HOLDING: PoseId = PoseId(1);
        const SITTING: PoseId = PoseId(2);
        const SITTING_HOLDING: PoseId = PoseId(3);
        const SLEEPING: PoseId = PoseId(4);

        let pose = |id: PoseId,
                    name: &str,
                    holding_pose: Option<PoseId>,
                    base_pose: Option<PoseId>,
                    can_hold: bool| PoseDef {
            id,
            def_name: name.to_string(),
            art: format!("people/{name}"),
            holding_pose,
            base_pose,
            can_hold,
        };
        let poses = vec![
            pose(STANDING, "standing", Some(HOLDING), None, true),
            pose(HOLDING, "holding", None, Some(STANDING), true),
            pose(SITTING, "sitting", Some(SITTING_HOLDING), None, true),
            pose(SITTING_HOLDING, "sittingholding", None, Some(SITTING), true),
            pose(SLEEPING, "sleeping", None, None, false),
        ];

        let layer = |idx: u8, name: &str, pose: Option<PoseId>, rest: bool| LayerDef {
            id: LayerId(idx),
            def_name: name.to_string(),
            priority: i32::from(idx),
            pose,
            rest_scale_on_hover: rest,
        };
        let layers = vec![
            layer(0, "Person", None, false),
            layer(1, "SitFriendly", Some(SITTING), true),
            layer(2, "SleepFriendly", Some(SLEEPING), true),
            layer(3, "PersonFriendly", None, false),
            layer(4, "ItemFriendly", None, false),
            layer(5, "Floor", Some(STANDING), false),
        ];

        let pose_ids_by_name = poses
            .iter()
            .map(|pose| (pose.def_name.clone(), pose.id))
            .collect();
        let layer_ids_by_name = layers
            .iter()
            .map(|layer| (layer.def_name.clone(), layer.id))
            .collect();
        Self {
            poses,
            pose_ids_by_name,
            layers,
            layer_ids_by_name,
            standing: STANDING,
        }
    }

    pub fn standing(&self) -> PoseId {
        self.standing
    }

    pub fn pose(&self, id: PoseId) -> Option<&PoseDef> {
        self.poses.get(id.0 as usize)
    }

    pub fn poses(&self) -> &[PoseDef] {
        &self.poses
    }

    pub fn pose_id_by_name(&self, name: &str) -> Option<PoseId> {
        self.pose_ids_by_name.get(name).copied()
    }

    /// Unknown names resolve to `standing`.
    pub fn pose_id_or_standing(&self, name: &str) -> PoseId {
        self.pose_id_by_name(name).unwrap_or(self.standing)
    }

    pub fn pose_name(&self, id: PoseId) -> &str {
        self.pose(id)
            .or_else(|| self.pose(self.standing))
            .map(|pose| pose.def_name.as_str())
            .unwrap_or(STANDING_POSE)
    }

    pub fn holding_counterpart(&self, id: PoseId) -> Option<PoseId> {
        self.pose(id).and_then(|pose| pose.holding_pose)
    }

    pub fn base_of_holding(&self, id: PoseId) -> Option<PoseId> {
        self.pose(id).and_then(|pose| pose.base_pose)
    }

    pub fn is_holding_pose(&self, id: PoseId) -> bool {
        self.base_of_holding(id).is_some()
    }

    pub fn is_allowed_to_hold(&self, id: PoseId) -> bool {
        self.pose(id).is_some_and(|pose| pose.can_hold)
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerDef> {
        self.layers.get(id.0 as usize)
    }

    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    pub fn layer_id_by_name(&self, name: &str) -> Option<LayerId> {
        self.layer_ids_by_name.get(name).copied()
    }

    pub fn layer_name(&self, id: LayerId) -> &str {
        self.layer(id)
            .map(|layer| layer.def_name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Builds a mask from layer names; unknown names are skipped.
    pub fn layer_mask(&self, names: &[&str]) -> LayerMask {
        LayerMask::from_layers(
            names
                .iter()
                .filter_map(|name| self.layer_id_by_name(name)),
        )
    }

    /// Base pose a layer asks for, `standing` when the layer maps to none.
    pub fn pose_for_layer(&self, layer: Option<LayerId>) -> PoseId {
        layer
            .and_then(|id| self.layer(id))
            .and_then(|layer| layer.pose)
            .unwrap_or(self.standing)
    }
}
