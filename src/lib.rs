//! # PipeWire video negotiation parameters
//!
//! Connecting a PipeWire stream to a video source takes two SPA PODs from the
//! consumer: an `EnumFormat` object offering the raw formats we can take, and
//! once a format is agreed a `Buffers` object saying what memory we can map.
//! The source then replies with a fixated `Format` which we need to read back.
//! This crate builds the former with libspa's serializer and hands the latter
//! to libspa's parsers.
//!
//! ```
//! # use screencap_params::{PodError, MediaType, MediaSubtype};
//! # fn test() -> Result<(), PodError> {
//! let params = screencap_params::build_video_params()?;
//! let (media_type, media_subtype) = screencap_params::parse_media_type(params.as_bytes())?;
//! assert_eq!(MediaType::Video, media_type);
//! assert_eq!(MediaSubtype::Raw, media_subtype);
//! # Ok(())
//! # }
//! # test().unwrap();
//! ```
//!
//! For anything other than the default formats and ranges create a
//! `ParamDescriptorBuilder` from a `ParamConfig`:
//!
//! ```
//! # use screencap_params::{ParamConfig, ParamDescriptorBuilder, PodError, Rectangle, VideoFormatConfig};
//! # fn test() -> Result<(), PodError> {
//! let builder = ParamDescriptorBuilder::new(ParamConfig {
//!     video: VideoFormatConfig::default().with_default_size(Rectangle {
//!         width: 320,
//!         height: 240,
//!     }),
//!     ..ParamConfig::default()
//! })?;
//! let params = builder.build_video_format_capability()?;
//! # Ok(())
//! # }
//! # test().unwrap();
//! ```

pub mod error;
pub mod format;
#[cfg(feature = "native-shims")]
pub mod native_shims;
pub mod params;
pub mod pod;

pub use error::PodError;
pub use format::{
    parse_buffer_types, parse_media_type, parse_raw_video_info, parse_video_format_capability,
    VideoFormatCapability,
};
pub use libspa::{
    param::{
        format::{MediaSubtype, MediaType},
        video::{VideoFormat, VideoInfoRaw},
    },
    utils::{Fraction, Rectangle},
};
pub use params::{DataTypes, ParamConfig, ParamDescriptorBuilder, ValueRange, VideoFormatConfig};
pub use pod::Pod;

/// Build the video parameters with the default formats and ranges.
///
/// Offer this to `pw_stream_connect` to begin format negotiation.
pub fn build_video_params() -> Result<Pod, PodError> {
    ParamDescriptorBuilder::default().build_video_format_capability()
}

/// Build the stream buffer parameters with the default memory kinds.
///
/// Set this with `pw_stream_update_params` once the format is fixed.
pub fn build_stream_param() -> Result<Pod, PodError> {
    ParamDescriptorBuilder::default().build_buffer_type_capability()
}
