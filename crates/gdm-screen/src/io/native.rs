//! Native `.gdm` artifact format.
//!
//! The format consists of a 32-byte header followed by a Postcard-encoded
//! [`Payload`]. The header repeats enough of the payload (model kind,
//! classifier kind, feature count) to reject incompatible artifacts before
//! decoding, and carries a CRC32 of the payload bytes.
//!
//! # Example
//!
//! ```
//! use gdm_screen::io::{Artifact, NativeCodec};
//! use gdm_screen::testing::constant_model;
//!
//! let artifact = Artifact::new(constant_model(0.35));
//! let codec = NativeCodec::new();
//! let bytes = codec.serialize(&artifact).unwrap();
//! let loaded = codec.deserialize(&bytes).unwrap();
//! assert_eq!(loaded.model, artifact.model);
//! ```

use std::io::{Read, Write};

use thiserror::Error;

use super::payload::{ClassifierPayload, ModelMetadata, ModelPayload, Payload, PayloadV1};
use crate::model::{Model, ModelValidationError};

/// Magic bytes identifying a screening model artifact.
pub const MAGIC: &[u8; 4] = b"GDMS";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Kinds
// ============================================================================

/// Top-level model shape stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelKind {
    Bare = 0,
    Pipeline = 1,
}

impl ModelKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bare),
            1 => Some(Self::Pipeline),
            _ => None,
        }
    }
}

/// Classifier family stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClassifierKind {
    TreeEnsemble = 0,
    Linear = 1,
}

impl ClassifierKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::TreeEnsemble),
            1 => Some(Self::Linear),
            _ => None,
        }
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 32-byte header for the artifact format.
///
/// # Layout
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     Magic ("GDMS")
/// 4       1     Version major
/// 5       1     Version minor
/// 6       1     Model kind (0 = bare, 1 = pipeline)
/// 7       1     Classifier kind (0 = tree ensemble, 1 = linear)
/// 8       4     Payload size (bytes)
/// 12      4     CRC32 checksum of payload
/// 16      4     Number of features
/// 20      12    Reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub model_kind: ModelKind,
    pub classifier_kind: ClassifierKind,
    pub payload_size: u32,
    pub checksum: u32,
    pub num_features: u32,
}

impl FormatHeader {
    /// Create a header with the current version and empty payload fields.
    pub fn new(model_kind: ModelKind, classifier_kind: ClassifierKind, num_features: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            model_kind,
            classifier_kind,
            payload_size: 0,
            checksum: 0,
            num_features,
        }
    }

    /// Serialize header to 32 bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6] = self.model_kind as u8;
        buf[7] = self.classifier_kind as u8;
        buf[8..12].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf[16..20].copy_from_slice(&self.num_features.to_le_bytes());
        // 20..32 reserved, left zeroed
        buf
    }

    /// Parse header from 32 bytes.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAModel);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let model_kind = ModelKind::from_u8(buf[6])
            .ok_or_else(|| DeserializeError::CorruptPayload(format!("invalid model kind {}", buf[6])))?;
        let classifier_kind = ClassifierKind::from_u8(buf[7]).ok_or_else(|| {
            DeserializeError::CorruptPayload(format!("invalid classifier kind {}", buf[7]))
        })?;

        Ok(Self {
            version_major,
            version_minor,
            model_kind,
            classifier_kind,
            payload_size: read_u32(buf, 8),
            checksum: read_u32(buf, 12),
            num_features: read_u32(buf, 16),
        })
    }
}

#[inline]
fn read_u32(buf: &[u8; HEADER_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("payload of {0} bytes exceeds the format limit")]
    TooLarge(usize),
}

/// Errors that can occur during deserialization.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Wrong magic bytes.
    #[error("not a screening model artifact")]
    NotAModel,

    /// Artifact written by a newer, incompatible format version.
    #[error("artifact format {major}.{minor} is newer than this reader supports")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("artifact truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    #[error("invalid model: {0}")]
    InvalidModel(#[from] ModelValidationError),
}

/// Compute CRC32 checksum of data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Artifact
// ============================================================================

/// A model together with its stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub model: Model,
    pub metadata: ModelMetadata,
}

impl Artifact {
    /// Wrap a model with metadata derived from it.
    pub fn new(model: Model) -> Self {
        let metadata = ModelMetadata {
            num_features: model.n_features() as u32,
            objective: model.classifier().objective().map(str::to_owned),
            feature_names: None,
            attributes: Vec::new(),
        };
        Self { model, metadata }
    }

    pub fn with_feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.feature_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.attributes.push((key.into(), value.into()));
        self
    }
}

// ============================================================================
// Native Codec
// ============================================================================

/// Codec for serializing/deserializing artifacts in native format.
#[derive(Debug, Clone, Default)]
pub struct NativeCodec {}

impl NativeCodec {
    pub fn new() -> Self {
        Self {}
    }

    /// Encode an artifact to bytes.
    pub fn serialize(&self, artifact: &Artifact) -> Result<Vec<u8>, SerializeError> {
        let mut out = Vec::new();
        self.write_to(&mut out, artifact)?;
        Ok(out)
    }

    /// Write header and payload to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W, artifact: &Artifact) -> Result<(), SerializeError> {
        let model = ModelPayload::from(&artifact.model);
        let mut metadata = artifact.metadata.clone();
        metadata.num_features = artifact.model.n_features() as u32;

        let mut header = FormatHeader::new(
            kind_of(&model),
            classifier_kind_of(&model),
            metadata.num_features,
        );
        let payload = Payload::V1(PayloadV1 { metadata, model });
        let payload_bytes = postcard::to_allocvec(&payload)?;

        header.payload_size = u32::try_from(payload_bytes.len())
            .map_err(|_| SerializeError::TooLarge(payload_bytes.len()))?;
        header.checksum = compute_checksum(&payload_bytes);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(&payload_bytes)?;
        Ok(())
    }

    /// Parse only the header of an encoded artifact.
    pub fn read_header(&self, bytes: &[u8]) -> Result<FormatHeader, DeserializeError> {
        let header_buf: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DeserializeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            })?;
        FormatHeader::from_bytes(header_buf)
    }

    /// Decode an artifact from bytes, verifying header, checksum and structure.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Artifact, DeserializeError> {
        let header = self.read_header(bytes)?;

        let expected = HEADER_SIZE + header.payload_size as usize;
        if bytes.len() < expected {
            return Err(DeserializeError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(DeserializeError::CorruptPayload(format!(
                "{} trailing bytes after payload",
                bytes.len() - expected
            )));
        }

        let payload_bytes = &bytes[HEADER_SIZE..expected];
        let actual = compute_checksum(payload_bytes);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let Payload::V1(PayloadV1 { metadata, model }) = postcard::from_bytes::<Payload>(payload_bytes)?;

        if metadata.num_features != header.num_features {
            return Err(DeserializeError::CorruptPayload(format!(
                "header declares {} features, payload {}",
                header.num_features, metadata.num_features
            )));
        }
        if kind_of(&model) != header.model_kind
            || classifier_kind_of(&model) != header.classifier_kind
        {
            return Err(DeserializeError::CorruptPayload(
                "header model kind disagrees with payload".into(),
            ));
        }

        let model = model.into_model(&metadata)?;
        Ok(Artifact { model, metadata })
    }

    /// Read an artifact from a reader.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> Result<Artifact, DeserializeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.deserialize(&bytes)
    }
}

fn kind_of(model: &ModelPayload) -> ModelKind {
    match model {
        ModelPayload::Bare(_) => ModelKind::Bare,
        ModelPayload::Pipeline { .. } => ModelKind::Pipeline,
    }
}

fn classifier_kind_of(model: &ModelPayload) -> ClassifierKind {
    match model.classifier() {
        ClassifierPayload::Forest(_) => ClassifierKind::TreeEnsemble,
        ClassifierPayload::Linear(_) => ClassifierKind::Linear,
    }
}
