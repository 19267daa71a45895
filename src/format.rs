//! Parsing negotiated parameters.
//!
//! PipeWire hands a consumer `Format` objects through the stream's
//! `param_changed` callback. `parse_media_type` and `parse_raw_video_info`
//! pass them to libspa's own parsers and return exactly what libspa returns.
//! In particular a property that still holds an unfixated choice is left
//! zeroed, as is one with a value of the wrong type.
//!
//! The capability readers further down walk the libspa `Value` tree of a
//! descriptor we built ourselves.

use crate::{
    error::PodError,
    params::{DataTypes, ValueRange},
    pod::Pod,
};
use libspa::{
    param::{
        format::{MediaSubtype, MediaType},
        format_utils,
        video::{VideoFormat, VideoInfoRaw},
    },
    pod::{deserialize::PodDeserializer, ChoiceValue, Object, Value},
    sys,
    utils::{Choice, ChoiceEnum, Fraction, Id, Rectangle},
};
use tracing::trace;

/// Read the media type and subtype of a `Format` object.
pub fn parse_media_type(bytes: &[u8]) -> Result<(MediaType, MediaSubtype), PodError> {
    let pod = Pod::copy_from(bytes);
    let parsed = format_utils::parse_format(pod.as_spa_pod()?)
        .map_err(|err| PodError::Spa(err.to_string()))?;
    trace!(media_type = ?parsed.0, media_subtype = ?parsed.1, "parsed media type");
    Ok(parsed)
}

/// Read raw video info from a `Format` object.
pub fn parse_raw_video_info(bytes: &[u8]) -> Result<VideoInfoRaw, PodError> {
    let pod = Pod::copy_from(bytes);
    let mut info = VideoInfoRaw::new();
    info.parse(pod.as_spa_pod()?)
        .map_err(|err| PodError::Spa(err.to_string()))?;
    trace!(format = ?info.format(), "parsed raw video info");
    Ok(info)
}

/// A video format capability read back in full, alternatives included.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFormatCapability {
    pub media_type: MediaType,
    pub media_subtype: MediaSubtype,
    /// Every pixel format on offer, preferred first.
    pub formats: Vec<VideoFormat>,
    pub size: ValueRange<Rectangle>,
    pub framerate: ValueRange<Fraction>,
}

fn read_object(bytes: &[u8], type_: u32) -> Result<Object, PodError> {
    let pod = Pod::copy_from(bytes);
    pod.as_spa_pod()?;
    let (_, value) = PodDeserializer::deserialize_any_from(pod.as_bytes())
        .map_err(|err| PodError::Deserialize(format!("{:?}", err)))?;
    match value {
        Value::Object(object) if object.type_ == type_ => Ok(object),
        _ => Err(PodError::UnexpectedValue("object type")),
    }
}

fn property<'a>(object: &'a Object, key: u32, name: &'static str) -> Result<&'a Value, PodError> {
    object
        .properties
        .iter()
        .find(|prop| prop.key == key)
        .map(|prop| &prop.value)
        .ok_or(PodError::MissingProperty(name))
}

fn id(object: &Object, key: u32, name: &'static str) -> Result<u32, PodError> {
    match property(object, key, name)? {
        Value::Id(Id(id)) => Ok(*id),
        _ => Err(PodError::UnexpectedValue(name)),
    }
}

/// Read back a video format capability such as the one built by
/// `ParamDescriptorBuilder::build_video_format_capability`.
pub fn parse_video_format_capability(bytes: &[u8]) -> Result<VideoFormatCapability, PodError> {
    let object = read_object(bytes, sys::SPA_TYPE_OBJECT_Format)?;

    let formats = match property(&object, sys::SPA_FORMAT_VIDEO_format, "format")? {
        Value::Id(format) => vec![*format],
        Value::Choice(ChoiceValue::Id(Choice(
            _,
            ChoiceEnum::Enum {
                default,
                alternatives,
            },
        ))) => std::iter::once(default)
            .chain(alternatives)
            .copied()
            .collect(),
        _ => return Err(PodError::UnexpectedValue("format")),
    };
    let size = match property(&object, sys::SPA_FORMAT_VIDEO_size, "size")? {
        Value::Choice(ChoiceValue::Rectangle(Choice(_, ChoiceEnum::Range { default, min, max }))) => {
            ValueRange::new(*default, *min, *max)
        }
        Value::Rectangle(size) => ValueRange::new(*size, *size, *size),
        _ => return Err(PodError::UnexpectedValue("size")),
    };
    let framerate = match property(&object, sys::SPA_FORMAT_VIDEO_framerate, "framerate")? {
        Value::Choice(ChoiceValue::Fraction(Choice(_, ChoiceEnum::Range { default, min, max }))) => {
            ValueRange::new(*default, *min, *max)
        }
        Value::Fraction(rate) => ValueRange::new(*rate, *rate, *rate),
        _ => return Err(PodError::UnexpectedValue("framerate")),
    };

    Ok(VideoFormatCapability {
        media_type: MediaType::from_raw(id(&object, sys::SPA_FORMAT_mediaType, "mediaType")?),
        media_subtype: MediaSubtype::from_raw(id(
            &object,
            sys::SPA_FORMAT_mediaSubtype,
            "mediaSubtype",
        )?),
        formats: formats
            .into_iter()
            .map(|Id(format)| VideoFormat::from_raw(format))
            .collect(),
        size,
        framerate,
    })
}

/// Read the accepted buffer memory kinds from a `Buffers` object.
pub fn parse_buffer_types(bytes: &[u8]) -> Result<DataTypes, PodError> {
    let object = read_object(bytes, sys::SPA_TYPE_OBJECT_ParamBuffers)?;
    match property(&object, sys::SPA_PARAM_BUFFERS_dataType, "dataType")? {
        Value::Int(mask) => Ok(DataTypes::from_bits_truncate(*mask as u32)),
        _ => Err(PodError::UnexpectedValue("dataType")),
    }
}
