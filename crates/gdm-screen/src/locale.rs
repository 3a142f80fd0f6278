//! User-facing text in English and Chinese.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::Label;
use crate::features::{GDM_FEATURES, N_FEATURES};

/// Display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown locale {0:?}; expected en or zh")]
pub struct LocaleParseError(String);

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en_us" | "english" => Ok(Locale::En),
            "zh" | "zh-cn" | "zh_cn" | "chinese" => Ok(Locale::Zh),
            _ => Err(LocaleParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        })
    }
}

const ZH_FEATURE_LABELS: [&str; N_FEATURES] = [
    "BMI",
    "As",
    "Cd",
    "低密度脂蛋白",
    "前白蛋白",
    "淋巴细胞百分比",
    "胆碱酯酶",
    "葡萄糖",
    "年龄",
];

impl Locale {
    /// Localized label for a canonical feature name. Unknown names pass through.
    pub fn feature_label<'a>(&self, feature: &'a str) -> &'a str {
        match self {
            Locale::En => feature,
            Locale::Zh => GDM_FEATURES
                .iter()
                .position(|spec| spec.name == feature)
                .map_or(feature, |idx| ZH_FEATURE_LABELS[idx]),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Locale::En => "GDM Gestational Diabetes Mellitus Risk Prediction Tool",
            Locale::Zh => "GDM 妊娠糖尿病风险预测工具",
        }
    }

    pub fn verdict(&self, label: Label) -> &'static str {
        match (self, label) {
            (Locale::En, Label::Positive) => "Positive (GDM)",
            (Locale::En, Label::Negative) => "Negative (Non-GDM)",
            (Locale::Zh, Label::Positive) => "阳性 (GDM)",
            (Locale::Zh, Label::Negative) => "阴性 (非GDM)",
        }
    }

    /// `percentage` is already formatted, e.g. `"35.00%"`.
    pub fn probability_line(&self, percentage: &str) -> String {
        match self {
            Locale::En => format!("Prediction Result: {percentage} Probability of GDM"),
            Locale::Zh => format!("预测结果：{percentage} GDM 概率"),
        }
    }

    pub fn verdict_line(&self, label: Label, threshold: f64) -> String {
        let verdict = self.verdict(label);
        match self {
            Locale::En => format!("Diagnosis: {verdict} (Threshold: {threshold})"),
            Locale::Zh => format!("判定：{verdict} （阈值：{threshold}）"),
        }
    }

    pub fn chart_heading(&self) -> &'static str {
        match self {
            Locale::En => "Feature Contribution Plot (SHAP, log-odds)",
            Locale::Zh => "特征贡献力图（SHAP，对数几率）",
        }
    }

    pub fn baseline_label(&self) -> &'static str {
        match self {
            Locale::En => "Base value",
            Locale::Zh => "基准值",
        }
    }

    pub fn output_label(&self) -> &'static str {
        match self {
            Locale::En => "Model output",
            Locale::Zh => "模型输出",
        }
    }

    pub fn legend(&self) -> &'static str {
        match self {
            Locale::En => {
                "'+' features push the prediction towards GDM, '-' features push the prediction towards Non-GDM."
            }
            Locale::Zh => "“+” 特征推动预测为 GDM，“-” 特征推动预测为非 GDM。",
        }
    }

    pub fn disclaimer(&self) -> &'static str {
        match self {
            Locale::En => {
                "This tool is intended for research/assistance purposes only and is not a substitute for medical diagnosis."
            }
            Locale::Zh => "本工具用于科研/辅助判断，不作为医学诊断依据。",
        }
    }

    pub fn unsupported_model(&self) -> &'static str {
        match self {
            Locale::En => "The model does not support probability prediction.",
            Locale::Zh => "当前模型不支持概率预测。",
        }
    }

    pub fn explanation_failed(&self, detail: &str) -> String {
        match self {
            Locale::En => format!("Feature contributions unavailable: {detail}"),
            Locale::Zh => format!("无法计算特征贡献：{detail}"),
        }
    }

    pub fn load_failed(&self, detail: &str) -> String {
        match self {
            Locale::En => format!("The model could not be loaded: {detail}"),
            Locale::Zh => format!("模型加载失败：{detail}"),
        }
    }

    pub fn error_occurred(&self, detail: &str) -> String {
        match self {
            Locale::En => format!("An error occurred: {detail}"),
            Locale::Zh => format!("出错了：{detail}"),
        }
    }
}
