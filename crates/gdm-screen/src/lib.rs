//! gdm-screen: gestational diabetes risk screening.
//!
//! Loads a pre-trained binary classifier (optionally behind a standard
//! scaler), collects nine clinical measurements, and returns the class-1
//! probability, a thresholded verdict and a per-feature SHAP attribution of
//! the model's log-odds.
//!
//! # Key Types
//!
//! - [`Model`] - a bare [`Classifier`] or a scaler + classifier [`Pipeline`]
//! - [`ModelCache`] - load-once holder for the model artifact
//! - [`FeatureVector`] / [`FeatureSpec`] - the nine ordered inputs
//! - [`infer`] / [`Inference`] - prediction plus attribution
//! - [`ScreeningConfig`] - threshold, background, locale and model path
//!
//! # Loading XGBoost Models
//!
//! Use [`compat::xgboost::XgbModel`] to load JSON models and
//! [`io::NativeCodec`] to write them as `.gdm` artifacts.
//!
//! ```no_run
//! use gdm_screen::{collect, infer, shared_cache, ScreeningConfig, TextInputs, GDM_FEATURES};
//!
//! let config = ScreeningConfig::load(None)?;
//! let model = shared_cache(&config.model_path).load()?;
//! let input = collect(&GDM_FEATURES, &TextInputs::default())?;
//! let inference = infer(&model, &input, &config.infer_options())?;
//! println!("{}", inference.prediction.percentage());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compat;
pub mod config;
pub mod engine;
pub mod explain;
pub mod features;
pub mod io;
pub mod locale;
pub mod model;
pub mod report;
pub mod repr;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{ConfigError, ScreeningConfig};
pub use engine::{
    classify, infer, EngineError, InferOptions, Inference, Label, PredictionResult,
    DEFAULT_THRESHOLD,
};
pub use explain::{Attribution, Background, ExplanationError, FeatureContribution};
pub use features::{
    collect, feature_names, CollectError, FeatureSource, FeatureSpec, FeatureVector, Overlay,
    TextInputs, GDM_FEATURES, N_FEATURES,
};
pub use locale::Locale;
pub use model::{
    shared_cache, Classifier, Model, ModelCache, ModelLoadError, Pipeline, UnsupportedModelError,
};
pub use report::Report;
