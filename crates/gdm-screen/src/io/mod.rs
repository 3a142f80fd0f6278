//! Model artifact serialization and deserialization.
//!
//! A screening model is persisted as a single `.gdm` file: a fixed 32-byte
//! header followed by a Postcard payload. See [`native`] for the layout.

pub mod native;
pub mod payload;

pub use native::{
    compute_checksum, Artifact, ClassifierKind, DeserializeError, FormatHeader, ModelKind,
    NativeCodec, SerializeError, CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, HEADER_SIZE, MAGIC,
};
pub use payload::{
    ClassifierPayload, ForestPayload, LinearPayload, ModelMetadata, ModelPayload, Payload,
    PayloadV1, ScalerPayload, TreePayload,
};
