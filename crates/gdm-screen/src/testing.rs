//! Testing utilities for gdm-screen.
//!
//! Fixture models and assertion helpers shared by unit tests and the
//! integration tests under `tests/`:
//!
//! ```ignore
//! use gdm_screen::testing::{constant_model, example_input};
//! ```
//!
//! Helpers panic on failure; they are not meant for production paths.

use std::path::{Path, PathBuf};

use crate::explain::Attribution;
use crate::features::{feature_names, FeatureVector, N_FEATURES};
use crate::io::{Artifact, NativeCodec};
use crate::model::{logit, Booster, Classifier, Model, OutputTransform, Pipeline, StandardScaler};
use crate::repr::{Forest, LinearModel};
use crate::tree;

/// Default tolerance for attribution sums.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// The demo input: BMI 25, As 0, Cd 0, LDL 2.5, PA 0.3, LY% 30, ChE 5000,
/// glucose 5.0, age 30.
pub fn example_input() -> FeatureVector {
    FeatureVector::new([25.0, 0.0, 0.0, 2.5, 0.3, 30.0, 5000.0, 5.0, 30.0])
}

/// A bare model that predicts `probability` for every input.
///
/// The forest has no trees, so the margin is the base score `logit(probability)`.
pub fn constant_model(probability: f64) -> Model {
    let forest = Forest::new(N_FEATURES).with_base_score(logit(probability));
    Model::Bare(
        Classifier::new(Booster::Forest(forest), OutputTransform::Sigmoid)
            .with_objective("binary:logistic"),
    )
}

/// A bare regression model: loads fine but has no probability operation.
pub fn regression_model() -> Model {
    Model::Bare(
        Classifier::new(
            Booster::Linear(LinearModel::zeros(N_FEATURES)),
            OutputTransform::Identity,
        )
        .with_objective("reg:squarederror"),
    )
}

/// Two cover-annotated trees over the nine features, in raw units.
pub fn small_forest_classifier() -> Classifier {
    let mut forest = Forest::new(N_FEATURES).with_base_score(-0.5);
    // Glucose, then BMI or Age.
    forest.push_tree(tree! {
        0 => split(7, 5.1) -> 1, 2 @ 200.0,
        1 => split(0, 24.0) -> 3, 4 @ 120.0,
        2 => split_left(8, 32.0) -> 5, 6 @ 80.0,
        3 => leaf(-0.9) @ 70.0,
        4 => leaf(-0.2) @ 50.0,
        5 => leaf(0.4) @ 45.0,
        6 => leaf(1.1) @ 35.0,
    });
    // Cholinesterase, then prealbumin.
    forest.push_tree(tree! {
        0 => split(6, 6000.0) -> 1, 2 @ 200.0,
        1 => split(4, 0.25) -> 3, 4 @ 150.0,
        2 => leaf(-0.3) @ 50.0,
        3 => leaf(0.5) @ 60.0,
        4 => leaf(-0.1) @ 90.0,
    });
    Classifier::new(Booster::Forest(forest), OutputTransform::Sigmoid)
        .with_objective("binary:logistic")
}

/// Standard scaler fitted on plausible raw ranges, followed by a logistic model.
pub fn standardizing_pipeline() -> Model {
    let scaler = StandardScaler::new(
        vec![24.0, 0.5, 0.05, 2.8, 0.25, 28.0, 7000.0, 4.8, 29.0],
        vec![4.0, 0.3, 0.03, 0.7, 0.05, 7.0, 1500.0, 0.6, 4.5],
    )
    .unwrap_or_else(|e| panic!("fixture scaler is invalid: {e}"));
    let linear = LinearModel::new(vec![0.45, 0.2, 0.15, 0.1, -0.35, -0.05, -0.25, 0.9, 0.3], -1.2);
    Model::Pipeline(Pipeline {
        scaler,
        classifier: Classifier::new(Booster::Linear(linear), OutputTransform::Sigmoid)
            .with_objective("binary:logistic"),
    })
}

/// Write `model` as an artifact named `name` inside `dir` and return its path.
///
/// # Panics
///
/// Panics if the artifact cannot be encoded or written.
pub fn write_artifact(dir: &Path, name: &str, model: &Model) -> PathBuf {
    let path = dir.join(name);
    let artifact = Artifact::new(model.clone()).with_feature_names(feature_names());
    let bytes = NativeCodec::new()
        .serialize(&artifact)
        .unwrap_or_else(|e| panic!("failed to encode fixture model: {e}"));
    std::fs::write(&path, bytes)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
    path
}

/// Assert that `baseline + sum(contributions)` reproduces `margin`.
///
/// # Panics
///
/// Panics if the difference exceeds `tolerance`.
pub fn assert_additive(attribution: &Attribution, margin: f64, tolerance: f64) {
    let total = attribution.total();
    let diff = (total - margin).abs();
    assert!(
        diff <= tolerance,
        "attribution does not add up: baseline {} + contributions = {total}, margin {margin} (diff={diff}, tolerance={tolerance})",
        attribution.baseline
    );
}
