//! Payload structures for the `.gdm` artifact format.
//!
//! These structs are designed for serialization with Postcard. They mirror the
//! runtime types in [`crate::model`] and [`crate::repr`] but use plain vectors,
//! so the on-disk layout is independent of runtime storage choices.

use serde::{Deserialize, Serialize};

use crate::model::{Booster, Classifier, Model, OutputTransform, Pipeline, StandardScaler};
use crate::repr::{Forest, LinearModel, Tree};

use super::native::DeserializeError;

/// Version-tagged payload enum for forward compatibility.
///
/// New format versions add new variants rather than modifying existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub metadata: ModelMetadata,
    pub model: ModelPayload,
}

/// Descriptive metadata stored next to the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Number of input features.
    pub num_features: u32,
    /// Training objective name (e.g. "binary:logistic").
    pub objective: Option<String>,
    /// Feature names in training order.
    pub feature_names: Option<Vec<String>>,
    /// Additional key-value attributes (source, version, ...).
    pub attributes: Vec<(String, String)>,
}

impl ModelMetadata {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelPayload {
    Bare(ClassifierPayload),
    Pipeline {
        scaler: ScalerPayload,
        classifier: ClassifierPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassifierPayload {
    Forest(ForestPayload),
    Linear(LinearPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerPayload {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Tree ensemble payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPayload {
    /// Base score in margin space.
    pub base_score: f64,
    pub output_transform: OutputTransform,
    pub trees: Vec<TreePayload>,
}

/// Single decision tree payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    pub num_nodes: u32,
    /// Split feature indices (one per node, 0 for leaves).
    pub split_features: Vec<u32>,
    /// Split thresholds (one per node, 0.0 for leaves).
    pub thresholds: Vec<f32>,
    pub left_children: Vec<u32>,
    pub right_children: Vec<u32>,
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    /// Leaf values (one per node, 0.0 for internal nodes).
    pub leaf_values: Vec<f32>,
    /// Per-node covers, required for path-dependent attribution.
    pub covers: Option<Vec<f32>>,
}

/// Linear model payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPayload {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub output_transform: OutputTransform,
}

// ============================================================================
// Runtime -> payload
// ============================================================================

impl From<&Tree> for TreePayload {
    fn from(tree: &Tree) -> Self {
        let n = tree.n_nodes();
        let nodes = 0..n as u32;
        Self {
            num_nodes: n as u32,
            split_features: nodes.clone().map(|i| tree.split_index(i)).collect(),
            thresholds: nodes.clone().map(|i| tree.split_threshold(i)).collect(),
            left_children: nodes.clone().map(|i| tree.left_child(i)).collect(),
            right_children: nodes.clone().map(|i| tree.right_child(i)).collect(),
            default_left: nodes.clone().map(|i| tree.default_left(i)).collect(),
            is_leaf: nodes.clone().map(|i| tree.is_leaf(i)).collect(),
            leaf_values: nodes.map(|i| tree.leaf_value(i)).collect(),
            covers: tree.covers().map(<[f32]>::to_vec),
        }
    }
}

impl From<&Classifier> for ClassifierPayload {
    fn from(classifier: &Classifier) -> Self {
        let output_transform = classifier.transform();
        match classifier.booster() {
            Booster::Forest(forest) => ClassifierPayload::Forest(ForestPayload {
                base_score: forest.base_score(),
                output_transform,
                trees: forest.trees().map(TreePayload::from).collect(),
            }),
            Booster::Linear(linear) => ClassifierPayload::Linear(LinearPayload {
                weights: linear.weights().to_vec(),
                bias: linear.bias(),
                output_transform,
            }),
        }
    }
}

impl From<&Model> for ModelPayload {
    fn from(model: &Model) -> Self {
        match model {
            Model::Bare(classifier) => ModelPayload::Bare(classifier.into()),
            Model::Pipeline(pipeline) => ModelPayload::Pipeline {
                scaler: ScalerPayload {
                    mean: pipeline.scaler.mean().to_vec(),
                    scale: pipeline.scaler.scale().to_vec(),
                },
                classifier: (&pipeline.classifier).into(),
            },
        }
    }
}

// ============================================================================
// Payload -> runtime
// ============================================================================

impl TreePayload {
    fn into_tree(self, tree_idx: usize) -> Result<Tree, DeserializeError> {
        let n = self.num_nodes as usize;
        let lengths = [
            ("split_features", self.split_features.len()),
            ("thresholds", self.thresholds.len()),
            ("left_children", self.left_children.len()),
            ("right_children", self.right_children.len()),
            ("default_left", self.default_left.len()),
            ("is_leaf", self.is_leaf.len()),
            ("leaf_values", self.leaf_values.len()),
        ];
        if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(DeserializeError::CorruptPayload(format!(
                "tree {tree_idx}: {field} has {len} entries, expected {n}"
            )));
        }

        let tree = Tree::new(
            self.split_features,
            self.thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        );
        Ok(match self.covers {
            Some(covers) => tree.with_covers(covers),
            None => tree,
        })
    }
}

impl ClassifierPayload {
    pub(crate) fn into_classifier(
        self,
        num_features: usize,
        objective: Option<&str>,
    ) -> Result<Classifier, DeserializeError> {
        let classifier = match self {
            ClassifierPayload::Forest(payload) => {
                let mut forest = Forest::new(num_features).with_base_score(payload.base_score);
                for (idx, tree) in payload.trees.into_iter().enumerate() {
                    forest.push_tree(tree.into_tree(idx)?);
                }
                Classifier::new(Booster::Forest(forest), payload.output_transform)
            }
            ClassifierPayload::Linear(payload) => {
                if payload.weights.len() != num_features {
                    return Err(DeserializeError::CorruptPayload(format!(
                        "linear model has {} weights, header declares {num_features} features",
                        payload.weights.len()
                    )));
                }
                Classifier::new(
                    Booster::Linear(LinearModel::new(payload.weights, payload.bias)),
                    payload.output_transform,
                )
            }
        };
        Ok(match objective {
            Some(objective) => classifier.with_objective(objective),
            None => classifier,
        })
    }
}

impl ModelPayload {
    pub(crate) fn into_model(self, metadata: &ModelMetadata) -> Result<Model, DeserializeError> {
        let num_features = metadata.num_features as usize;
        let objective = metadata.objective.as_deref();
        let model = match self {
            ModelPayload::Bare(classifier) => {
                Model::Bare(classifier.into_classifier(num_features, objective)?)
            }
            ModelPayload::Pipeline { scaler, classifier } => {
                let scaler = StandardScaler::new(scaler.mean, scaler.scale)
                    .map_err(|e| DeserializeError::CorruptPayload(e.to_string()))?;
                Model::Pipeline(Pipeline {
                    scaler,
                    classifier: classifier.into_classifier(num_features, objective)?,
                })
            }
        };
        model.validate()?;
        Ok(model)
    }

    pub(crate) fn classifier(&self) -> &ClassifierPayload {
        match self {
            ModelPayload::Bare(classifier) => classifier,
            ModelPayload::Pipeline { classifier, .. } => classifier,
        }
    }
}
