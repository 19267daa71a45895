//! Errors from building or parsing SPA PODs.

use thiserror::Error;

/// POD error. Either the bytes we were handed are not the POD we expected, or
/// the POD we were asked to build can't be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PodError {
    /// The bytes don't hold a complete POD, padding included.
    #[error("not a complete POD: {len} bytes")]
    Malformed { len: usize },

    /// libspa refused to parse the POD.
    #[error("libspa failed to parse the POD: {0}")]
    Spa(String),

    /// The POD could not be serialized.
    #[error("failed to serialize POD: {0}")]
    Serialize(String),

    /// The POD could not be read back as a value tree.
    #[error("failed to deserialize POD: {0}")]
    Deserialize(String),

    /// A property of a capability we read back is absent.
    #[error("required property {0} is missing")]
    MissingProperty(&'static str),

    /// A property of a capability we read back has an unexpected shape.
    #[error("property {0} has an unexpected value")]
    UnexpectedValue(&'static str),

    /// The encoded POD doesn't fit in the allowed buffer.
    #[error("encoding too large: {required} bytes required, capacity is {capacity}")]
    EncodingTooLarge { required: usize, capacity: usize },

    /// The builder configuration can't describe a valid capability.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A negative status returned from the C shim.
    #[cfg(feature = "native-shims")]
    #[error("libspa returned {0}")]
    Native(i32),
}
