//! Command-line front end for GDM risk screening.
//!
//! - `gdm-screen predict --bmi 25 --glucose 5.0 ...` scores one set of inputs.
//! - `gdm-screen import --xgboost model.json [--scaler scaler.json] --out model.gdm`
//!   converts an XGBoost model into a `.gdm` artifact.
//! - `gdm-screen inspect model.gdm` prints the artifact header and metadata.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{Map, Value};

use gdm_screen::compat::xgboost::XgbModel;
use gdm_screen::compat::ScalerJson;
use gdm_screen::io::{Artifact, NativeCodec};
use gdm_screen::model::{Booster, Pipeline};
use gdm_screen::report::{engine_error_message, load_error_message};
use gdm_screen::{
    collect, feature_names, infer, shared_cache, Background, Locale, Model, Overlay, Report,
    ScreeningConfig, TextInputs, GDM_FEATURES,
};

#[derive(Debug, Parser)]
#[command(
    name = "gdm-screen",
    version,
    about = "Gestational diabetes (GDM) risk screening with per-feature attribution"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Predict GDM risk for one set of clinical features
    Predict(PredictArgs),
    /// Convert an XGBoost JSON model (and optional scaler) to a .gdm artifact
    Import(ImportArgs),
    /// Print the header and metadata of a .gdm artifact
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct PredictArgs {
    #[command(flatten)]
    features: FeatureArgs,

    /// JSON config file (model_path, threshold, background, locale)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model artifact, overriding the configured path
    #[arg(long)]
    model: Option<PathBuf>,

    /// Decision threshold on the GDM probability
    #[arg(long)]
    threshold: Option<f64>,

    /// Attribution background: model-default, self or reference:v1,...,v9
    #[arg(long, allow_hyphen_values = true)]
    background: Option<Background>,

    /// Output language: en or zh
    #[arg(long)]
    locale: Option<Locale>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

/// The nine inputs. Values are kept as text so bad input is reported per field.
#[derive(Debug, Args)]
struct FeatureArgs {
    /// JSON object of feature values keyed by name; flags take precedence
    #[arg(long)]
    input: Option<PathBuf>,

    /// Body mass index
    #[arg(long, allow_hyphen_values = true)]
    bmi: Option<String>,
    /// Arsenic level
    #[arg(long = "as", allow_hyphen_values = true)]
    arsenic: Option<String>,
    /// Cadmium level
    #[arg(long = "cd", allow_hyphen_values = true)]
    cadmium: Option<String>,
    /// Low-density lipoprotein
    #[arg(long, allow_hyphen_values = true)]
    ldl: Option<String>,
    /// Prealbumin
    #[arg(long = "pa", allow_hyphen_values = true)]
    prealbumin: Option<String>,
    /// Lymphocyte percentage
    #[arg(long = "ly", allow_hyphen_values = true)]
    lymphocytes: Option<String>,
    /// Cholinesterase
    #[arg(long = "che", allow_hyphen_values = true)]
    cholinesterase: Option<String>,
    /// Glucose
    #[arg(long, allow_hyphen_values = true)]
    glucose: Option<String>,
    /// Age
    #[arg(long, allow_hyphen_values = true)]
    age: Option<String>,
}

impl FeatureArgs {
    fn text_inputs(&self) -> TextInputs {
        let values = [
            &self.bmi,
            &self.arsenic,
            &self.cadmium,
            &self.ldl,
            &self.prealbumin,
            &self.lymphocytes,
            &self.cholinesterase,
            &self.glucose,
            &self.age,
        ];
        let map: HashMap<String, String> = feature_names()
            .into_iter()
            .zip(values)
            .filter_map(|(name, value)| value.clone().map(|v| (name.to_string(), v)))
            .collect();
        TextInputs(map)
    }

    fn input_file(&self) -> Result<Map<String, Value>> {
        let Some(path) = &self.input else {
            return Ok(Map::new());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => bail!("{} must contain a JSON object", path.display()),
        }
    }
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// XGBoost model saved with `save_model("*.json")`
    #[arg(long)]
    xgboost: PathBuf,

    /// Fitted standard scaler as {"mean": [...], "scale": [...]}
    #[arg(long)]
    scaler: Option<PathBuf>,

    /// Output artifact path
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Artifact to inspect
    path: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Predict(args) => run_predict(&args),
        Command::Import(args) => run_import(&args).map(|()| ExitCode::SUCCESS),
        Command::Inspect(args) => run_inspect(&args.path).map(|()| ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run_predict(args: &PredictArgs) -> Result<ExitCode> {
    let mut config = ScreeningConfig::load(args.config.as_deref())?;
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(background) = &args.background {
        config.background = background.clone();
    }
    if let Some(locale) = args.locale {
        config.locale = locale;
    }
    config.validate()?;
    let locale = config.locale;

    let source = Overlay {
        primary: args.features.text_inputs(),
        fallback: args.features.input_file()?,
    };
    let input = match collect(&GDM_FEATURES, &source) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("{}", locale.error_occurred(&e.to_string()));
            return Ok(ExitCode::FAILURE);
        }
    };
    log::info!("collected input {input}");

    let model = match shared_cache(&config.model_path).load() {
        Ok(model) => model,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{}", load_error_message(locale, &e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let inference = match infer(&model, &input, &config.infer_options()) {
        Ok(inference) => inference,
        Err(e) => {
            eprintln!("{}", engine_error_message(locale, &e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let report = Report::new(&inference, locale);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print!("{}", report.render());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_import(args: &ImportArgs) -> Result<()> {
    let xgb = XgbModel::from_file(&args.xgboost)
        .with_context(|| format!("failed to parse {}", args.xgboost.display()))?;
    let classifier = xgb
        .to_classifier()
        .with_context(|| format!("failed to convert {}", args.xgboost.display()))?;
    if let Err(e) = classifier.ensure_probabilistic() {
        log::warn!("imported model cannot be used for screening: {e}");
    }

    let model = match &args.scaler {
        Some(path) => {
            let scaler = ScalerJson::from_file(path)
                .and_then(|json| json.to_scaler())
                .with_context(|| format!("failed to load scaler {}", path.display()))?;
            Model::Pipeline(Pipeline { scaler, classifier })
        }
        None => Model::Bare(classifier),
    };
    model.validate().context("imported model is inconsistent")?;

    let names = if xgb.learner.feature_names.is_empty() {
        feature_names().iter().map(|s| s.to_string()).collect()
    } else {
        xgb.learner.feature_names.clone()
    };
    let artifact = Artifact::new(model)
        .with_feature_names(names)
        .with_attribute("source", "xgboost")
        .with_attribute(
            "xgboost_version",
            format!(
                "{}.{}.{}",
                xgb.version[0], xgb.version[1], xgb.version[2]
            ),
        );

    let mut file = std::fs::File::create(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    NativeCodec::new()
        .write_to(&mut file, &artifact)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    log::info!("wrote {}", args.out.display());
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let codec = NativeCodec::new();
    let header = codec.read_header(&bytes)?;
    let artifact = codec.deserialize(&bytes)?;
    let model = &artifact.model;

    println!("file:        {}", path.display());
    println!(
        "format:      v{}.{}",
        header.version_major, header.version_minor
    );
    println!("model:       {}", model.kind());
    println!("classifier:  {}", model.classifier().booster().kind());
    println!(
        "output:      {}",
        model.classifier().transform().name()
    );
    if let Booster::Forest(forest) = model.classifier().booster() {
        println!(
            "trees:       {} (covers: {})",
            forest.n_trees(),
            if forest.has_covers() { "yes" } else { "no" }
        );
    }
    println!("features:    {}", header.num_features);
    println!("payload:     {} bytes, crc32 {:08x}", header.payload_size, header.checksum);
    if let Some(objective) = &artifact.metadata.objective {
        println!("objective:   {objective}");
    }
    if let Some(names) = &artifact.metadata.feature_names {
        println!("names:       {}", names.join(", "));
    }
    for (key, value) in &artifact.metadata.attributes {
        println!("{key}: {value}");
    }
    Ok(())
}
