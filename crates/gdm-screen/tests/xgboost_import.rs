//! Integration tests for importing XGBoost JSON models.
//!
//! The fixtures under `tests/test-cases/xgboost` are small enough that the
//! expected margins and SHAP values are worked out by hand in the comments.

use std::path::PathBuf;

use approx::assert_abs_diff_eq;

use gdm_screen::compat::xgboost::{ConversionError, XgbModel};
use gdm_screen::compat::ScalerJson;
use gdm_screen::io::{Artifact, NativeCodec};
use gdm_screen::model::{Booster, OutputTransform};
use gdm_screen::testing::{
    assert_additive, example_input, standardizing_pipeline, DEFAULT_TOLERANCE,
};
use gdm_screen::{infer, InferOptions, Label, Model, ModelCache, Pipeline};

// =============================================================================
// Test Data Loading
// =============================================================================

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases/xgboost")
}

fn load_xgb(name: &str) -> XgbModel {
    let path = test_cases_dir().join(format!("{name}.model.json"));
    XgbModel::from_file(&path)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

fn load_bare(name: &str) -> Model {
    let classifier = load_xgb(name)
        .to_classifier()
        .unwrap_or_else(|e| panic!("Failed to convert {name}: {e}"));
    Model::Bare(classifier)
}

// =============================================================================
// gbtree
// =============================================================================

#[test]
fn gbtree_fixture_structure() {
    let xgb = load_xgb("gdm_gbtree");
    assert_eq!(xgb.n_features(), 9);
    assert_eq!(xgb.objective(), "binary:logistic");
    assert_eq!(xgb.learner.feature_names[7], "Glucose");

    let classifier = xgb.to_classifier().unwrap();
    assert_eq!(classifier.transform(), OutputTransform::Sigmoid);
    let Booster::Forest(forest) = classifier.booster() else {
        panic!("expected a tree ensemble");
    };
    assert_eq!(forest.n_trees(), 2);
    assert!(forest.has_covers());
    // base_score 0.5 in probability space is a zero margin.
    assert_abs_diff_eq!(forest.base_score(), 0.0, epsilon = 1e-12);
}

#[test]
fn gbtree_prediction_on_example_input() {
    // Glucose 5.0 < 5.1 -> -0.6; BMI 25 < 26 and Age 30 < 32 -> -0.2.
    let model = load_bare("gdm_gbtree");
    let inference = infer(&model, &example_input(), &InferOptions::default()).unwrap();

    assert_abs_diff_eq!(inference.prediction.margin, -0.8, epsilon = 1e-6);
    assert_abs_diff_eq!(inference.prediction.probability, 0.310_025_5, epsilon = 1e-6);
    assert_eq!(inference.prediction.percentage(), "31.00%");
    assert_eq!(inference.prediction.label, Label::Positive);
}

#[test]
fn gbtree_attribution_matches_hand_computed_shapley_values() {
    // Tree 1 expectation: (60 * -0.6 + 40 * 0.8) / 100 = -0.04.
    // Tree 2 expectation: (50 * -0.08 + 50 * 0.5) / 100 = 0.21.
    // Tree 2 coalitions: v() = 0.21, v(BMI) = -0.08, v(Age) = 0.15, v(BMI, Age) = -0.2.
    let model = load_bare("gdm_gbtree");
    let inference = infer(&model, &example_input(), &InferOptions::default()).unwrap();
    let attribution = inference.attribution.unwrap();

    assert_abs_diff_eq!(attribution.baseline, 0.17, epsilon = 1e-6);
    assert_abs_diff_eq!(attribution.contribution("Glucose").unwrap(), -0.56, epsilon = 1e-6);
    assert_abs_diff_eq!(attribution.contribution("BMI").unwrap(), -0.32, epsilon = 1e-6);
    assert_abs_diff_eq!(attribution.contribution("Age").unwrap(), -0.09, epsilon = 1e-6);
    for unused in ["As", "Cd", "LDL", "PA", "LY%", "ChE"] {
        assert_eq!(attribution.contribution(unused), Some(0.0), "{unused}");
    }

    let order: Vec<_> = attribution
        .by_magnitude()
        .iter()
        .take(3)
        .map(|c| c.feature)
        .collect();
    assert_eq!(order, ["Glucose", "BMI", "Age"]);
    assert_additive(&attribution, inference.prediction.margin, DEFAULT_TOLERANCE);
}

#[test]
fn gbtree_survives_native_round_trip() {
    let model = load_bare("gdm_gbtree");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gbtree.gdm");

    let artifact = Artifact::new(model.clone())
        .with_feature_names(load_xgb("gdm_gbtree").learner.feature_names)
        .with_attribute("source", "xgboost");
    std::fs::write(&path, NativeCodec::new().serialize(&artifact).unwrap()).unwrap();

    let loaded = ModelCache::new(&path).load().unwrap();
    assert_eq!(*loaded, model);

    let before = infer(&model, &example_input(), &InferOptions::default()).unwrap();
    let after = infer(&loaded, &example_input(), &InferOptions::default()).unwrap();
    assert_eq!(before, after);
}

// =============================================================================
// gblinear with scaler
// =============================================================================

#[test]
fn gblinear_with_scaler_matches_pipeline_fixture() {
    let classifier = load_xgb("gdm_gblinear").to_classifier().unwrap();
    let scaler = ScalerJson::from_file(test_cases_dir().join("gdm_scaler.json"))
        .unwrap()
        .to_scaler()
        .unwrap();
    let imported = Model::Pipeline(Pipeline { scaler, classifier });
    imported.validate().unwrap();

    let expected = infer(
        &standardizing_pipeline(),
        &example_input(),
        &InferOptions::default(),
    )
    .unwrap();
    let actual = infer(&imported, &example_input(), &InferOptions::default()).unwrap();

    // Weights are stored in single precision.
    assert_abs_diff_eq!(
        actual.prediction.margin,
        expected.prediction.margin,
        epsilon = 1e-5
    );
    assert_eq!(actual.prediction.label, expected.prediction.label);

    let expected = expected.attribution.unwrap();
    let actual = actual.attribution.unwrap();
    for (a, e) in actual.contributions.iter().zip(&expected.contributions) {
        assert_eq!(a.feature, e.feature);
        assert_abs_diff_eq!(a.value, e.value, epsilon = 1e-12);
        assert_abs_diff_eq!(a.contribution, e.contribution, epsilon = 1e-5);
    }
}

// =============================================================================
// Models the screening tool cannot use
// =============================================================================

#[test]
fn regression_objective_imports_but_cannot_screen() {
    let model = load_bare("gdm_regression");
    assert_eq!(model.classifier().transform(), OutputTransform::Identity);
    assert!(matches!(
        infer(&model, &example_input(), &InferOptions::default()),
        Err(gdm_screen::EngineError::Unsupported(_))
    ));
}

#[test]
fn multiclass_model_is_rejected() {
    let path = test_cases_dir().join("gdm_gbtree.model.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    value["learner"]["learner_model_param"]["num_class"] = serde_json::json!("3");
    value["learner"]["objective"]["name"] = serde_json::json!("multi:softprob");

    let err = XgbModel::from_value(&value)
        .unwrap()
        .to_classifier()
        .unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedClasses(3)));
}
