//! Feature collection for the nine-feature screening interface.
//!
//! The classifier was trained on a fixed, ordered set of standardized clinical
//! measurements. [`GDM_FEATURES`] declares that order together with the input
//! widget defaults, and [`collect`] turns any [`FeatureSource`] into a
//! [`FeatureVector`] in exactly that order.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Number of features in the screening interface.
pub const N_FEATURES: usize = 9;

/// Declaration of one input field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Canonical feature name, matching the training column name.
    pub name: &'static str,
    /// Value used when the source does not provide the field.
    pub default: f64,
    /// Increment used by interactive inputs.
    pub step: f64,
    /// Number of decimals shown when the value is displayed.
    pub precision: usize,
}

impl FeatureSpec {
    /// A spec with the standard widget settings (default 0.0, step 0.1, 2 decimals).
    pub const fn standard(name: &'static str) -> Self {
        Self {
            name,
            default: 0.0,
            step: 0.1,
            precision: 2,
        }
    }

    /// Format a value with this feature's display precision.
    pub fn display(&self, value: f64) -> String {
        format!("{:.*}", self.precision, value)
    }
}

/// The screening features, in training order.
pub static GDM_FEATURES: [FeatureSpec; N_FEATURES] = [
    FeatureSpec::standard("BMI"),
    FeatureSpec::standard("As"),
    FeatureSpec::standard("Cd"),
    FeatureSpec::standard("LDL"),
    FeatureSpec::standard("PA"),
    FeatureSpec::standard("LY%"),
    FeatureSpec::standard("ChE"),
    FeatureSpec::standard("Glucose"),
    FeatureSpec::standard("Age"),
];

/// Canonical feature names, in training order.
pub fn feature_names() -> [&'static str; N_FEATURES] {
    GDM_FEATURES.map(|spec| spec.name)
}

/// An ordered vector of the nine screening features.
///
/// The length is fixed by the type; the order is the order of [`GDM_FEATURES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    pub fn new(values: [f64; N_FEATURES]) -> Self {
        Self(values)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn values(&self) -> [f64; N_FEATURES] {
        self.0
    }

    /// Look up a value by canonical feature name.
    pub fn get(&self, name: &str) -> Option<f64> {
        GDM_FEATURES
            .iter()
            .position(|spec| spec.name == name)
            .map(|idx| self.0[idx])
    }

    /// Iterate `(spec, value)` pairs in training order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static FeatureSpec, f64)> + '_ {
        GDM_FEATURES.iter().zip(self.0.iter().copied())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self(GDM_FEATURES.map(|spec| spec.default))
    }
}

impl From<[f64; N_FEATURES]> for FeatureVector {
    fn from(values: [f64; N_FEATURES]) -> Self {
        Self(values)
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = CollectError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; N_FEATURES] =
            values
                .try_into()
                .map_err(|_| CollectError::WrongLength {
                    expected: N_FEATURES,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(spec, value)| format!("{}={}", spec.name, spec.display(value)))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Errors raised while collecting a feature vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectError {
    #[error("value for {feature} is not a number: {raw:?}")]
    NotANumber { feature: &'static str, raw: String },

    #[error("expected {expected} feature values, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Something that can supply raw feature values by name.
///
/// Returning `Ok(None)` means the field was not provided and the spec default
/// applies.
pub trait FeatureSource {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError>;
}

impl FeatureSource for HashMap<String, f64> {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError> {
        Ok(self.get(spec.name).copied())
    }
}

impl FeatureSource for HashMap<&str, f64> {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError> {
        Ok(self.get(spec.name).copied())
    }
}

/// Raw text inputs, as typed into a form.
#[derive(Debug, Clone, Default)]
pub struct TextInputs(pub HashMap<String, String>);

impl FeatureSource for TextInputs {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError> {
        match self.0.get(spec.name) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| CollectError::NotANumber {
                    feature: spec.name,
                    raw: raw.clone(),
                }),
        }
    }
}

/// A JSON object mapping feature names to values.
impl FeatureSource for serde_json::Map<String, Value> {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError> {
        match self.get(spec.name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| CollectError::NotANumber {
                feature: spec.name,
                raw: n.to_string(),
            }),
            Some(other) => Err(CollectError::NotANumber {
                feature: spec.name,
                raw: other.to_string(),
            }),
        }
    }
}

/// Reads from `primary`, falling back to `fallback` for fields it lacks.
#[derive(Debug, Clone, Default)]
pub struct Overlay<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: FeatureSource, F: FeatureSource> FeatureSource for Overlay<P, F> {
    fn read(&self, spec: &FeatureSpec) -> Result<Option<f64>, CollectError> {
        match self.primary.read(spec)? {
            Some(value) => Ok(Some(value)),
            None => self.fallback.read(spec),
        }
    }
}

/// Collect a feature vector from `source` in the declared order.
///
/// Missing fields take their spec default. Values are not range-checked.
pub fn collect<S: FeatureSource + ?Sized>(
    specs: &[FeatureSpec; N_FEATURES],
    source: &S,
) -> Result<FeatureVector, CollectError> {
    let mut values = [0.0; N_FEATURES];
    for (slot, spec) in values.iter_mut().zip(specs.iter()) {
        *slot = source.read(spec)?.unwrap_or(spec.default);
    }
    Ok(FeatureVector(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collect_preserves_declared_order() {
        let source: HashMap<&str, f64> = [
            ("Age", 30.0),
            ("BMI", 25.0),
            ("Glucose", 5.0),
            ("LDL", 2.5),
            ("ChE", 5000.0),
        ]
        .into_iter()
        .collect();

        let v = collect(&GDM_FEATURES, &source).unwrap();
        assert_eq!(
            v.values(),
            [25.0, 0.0, 0.0, 2.5, 0.0, 0.0, 5000.0, 5.0, 30.0]
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let source: HashMap<String, f64> = HashMap::new();
        let v = collect(&GDM_FEATURES, &source).unwrap();
        assert_eq!(v, FeatureVector::default());
        assert!(v.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let source: HashMap<&str, f64> = [("Age", -4.0), ("LY%", 250.0)].into_iter().collect();
        let v = collect(&GDM_FEATURES, &source).unwrap();
        assert_eq!(v.get("Age"), Some(-4.0));
        assert_eq!(v.get("LY%"), Some(250.0));
    }

    #[test]
    fn text_inputs_reject_non_numbers() {
        let mut raw = HashMap::new();
        raw.insert("BMI".to_string(), "twenty".to_string());
        let err = collect(&GDM_FEATURES, &TextInputs(raw)).unwrap_err();
        assert_eq!(
            err,
            CollectError::NotANumber {
                feature: "BMI",
                raw: "twenty".into()
            }
        );
    }

    #[test]
    fn text_inputs_parse_and_blank_is_missing() {
        let mut raw = HashMap::new();
        raw.insert("BMI".to_string(), " 27.5 ".to_string());
        raw.insert("Cd".to_string(), "".to_string());
        let v = collect(&GDM_FEATURES, &TextInputs(raw)).unwrap();
        assert_eq!(v.get("BMI"), Some(27.5));
        assert_eq!(v.get("Cd"), Some(0.0));
    }

    #[test]
    fn json_object_source() {
        let obj = json!({"BMI": 31.2, "As": null, "Cd": "high"});
        let map = obj.as_object().unwrap();
        let err = collect(&GDM_FEATURES, map).unwrap_err();
        assert!(matches!(err, CollectError::NotANumber { feature: "Cd", .. }));

        let obj = json!({"BMI": 31.2, "As": null});
        let v = collect(&GDM_FEATURES, obj.as_object().unwrap()).unwrap();
        assert_eq!(v.get("BMI"), Some(31.2));
        assert_eq!(v.get("As"), Some(0.0));
    }

    #[test]
    fn slice_conversion_checks_length() {
        let err = FeatureVector::try_from(&[1.0, 2.0][..]).unwrap_err();
        assert_eq!(
            err,
            CollectError::WrongLength {
                expected: 9,
                actual: 2
            }
        );
    }

    #[test]
    fn display_uses_precision() {
        assert_eq!(GDM_FEATURES[0].display(25.0), "25.00");
        let v = FeatureVector::new([25.0, 0.0, 0.0, 2.5, 0.3, 30.0, 5000.0, 5.0, 30.0]);
        assert!(v.to_string().starts_with("[BMI=25.00, As=0.00"));
    }

    #[test]
    fn overlay_prefers_primary() {
        let mut flags = HashMap::new();
        flags.insert("Age".to_string(), "41".to_string());
        let file = json!({"Age": 30.0, "Glucose": 6.1});
        let source = Overlay {
            primary: TextInputs(flags),
            fallback: file.as_object().unwrap().clone(),
        };
        let v = collect(&GDM_FEATURES, &source).unwrap();
        assert_eq!(v.get("Age"), Some(41.0));
        assert_eq!(v.get("Glucose"), Some(6.1));
        assert_eq!(v.get("BMI"), Some(0.0));
    }
}
