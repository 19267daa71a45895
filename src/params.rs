//! Building the negotiation parameters.
//!
//! A video consumer offers two PODs to PipeWire. The `EnumFormat` object goes
//! to `pw_stream_connect` and lists the raw video formats, sizes, and
//! framerates we can take. The `Buffers` object is sent with
//! `pw_stream_update_params` once a format is chosen and says which kinds of
//! buffer memory we can map.
//!
//! Both are described as libspa `Value` trees and encoded with libspa's
//! `PodSerializer`.

use crate::{error::PodError, pod::Pod};
use bitflags::bitflags;
use libspa::{
    param::{
        format::{MediaSubtype, MediaType},
        video::VideoFormat,
        ParamType,
    },
    pod::{serialize::PodSerializer, ChoiceValue, Object, Property, PropertyFlags, Value},
    sys,
    utils::{Choice, ChoiceEnum, ChoiceFlags, Fraction, Id, Rectangle},
};
use std::{cmp::Ordering, io::Cursor};
use tracing::debug;

/// Pixel formats offered by default, most preferred first.
pub const DEFAULT_FORMATS: [VideoFormat; 4] = [
    VideoFormat::RGBA,
    VideoFormat::RGBx,
    VideoFormat::BGRx,
    VideoFormat::BGRA,
];
pub const DEFAULT_SIZE: Rectangle = Rectangle {
    width: 1920,
    height: 1080,
};
pub const MIN_SIZE: Rectangle = Rectangle {
    width: 1,
    height: 1,
};
pub const MAX_SIZE: Rectangle = Rectangle {
    width: 4096,
    height: 4096,
};
pub const DEFAULT_FRAMERATE: Fraction = Fraction { num: 60, denom: 1 };
pub const MIN_FRAMERATE: Fraction = Fraction { num: 0, denom: 1 };
pub const MAX_FRAMERATE: Fraction = Fraction { num: 144, denom: 1 };

/// Largest descriptor we will encode. This is the size of the static buffer
/// the parameters have always been built in.
pub const PARAMS_BUFFER_CAPACITY: usize = 1024;

bitflags! {
    /// Buffer memory kinds, as a mask of `1 << spa_data_type`.
    pub struct DataTypes: u32 {
        const MEM_PTR = 1 << sys::SPA_DATA_MemPtr;
        const MEM_FD = 1 << sys::SPA_DATA_MemFd;
        const DMA_BUF = 1 << sys::SPA_DATA_DmaBuf;
        const MEM_ID = 1 << sys::SPA_DATA_MemId;
    }
}

impl Default for DataTypes {
    /// Mappable memory and DMA-BUFs.
    fn default() -> Self {
        DataTypes::MEM_PTR | DataTypes::DMA_BUF
    }
}

/// A preferred value and the bounds around it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValueRange<T> {
    pub default: T,
    pub min: T,
    pub max: T,
}

impl<T> ValueRange<T> {
    pub const fn new(default: T, min: T, max: T) -> Self {
        ValueRange { default, min, max }
    }
}

/// The raw video formats to advertise.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFormatConfig {
    /// Accepted pixel formats. The first is the preferred one.
    pub formats: Vec<VideoFormat>,
    pub size: ValueRange<Rectangle>,
    pub framerate: ValueRange<Fraction>,
}

impl Default for VideoFormatConfig {
    fn default() -> Self {
        VideoFormatConfig {
            formats: DEFAULT_FORMATS.to_vec(),
            size: ValueRange::new(DEFAULT_SIZE, MIN_SIZE, MAX_SIZE),
            framerate: ValueRange::new(DEFAULT_FRAMERATE, MIN_FRAMERATE, MAX_FRAMERATE),
        }
    }
}

impl VideoFormatConfig {
    /// Change the preferred size, keeping the bounds.
    pub fn with_default_size(mut self, size: Rectangle) -> Self {
        self.size.default = size;
        self
    }

    /// Change the preferred framerate, keeping the bounds.
    pub fn with_default_framerate(mut self, framerate: Fraction) -> Self {
        self.framerate.default = framerate;
        self
    }

    pub fn with_formats(mut self, formats: impl IntoIterator<Item = VideoFormat>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    fn validate(&self) -> Result<(), PodError> {
        if self.formats.is_empty() {
            return Err(PodError::InvalidConfig(
                "at least one pixel format is required".into(),
            ));
        }
        check_size(&self.size)?;
        check_framerate(&self.framerate)
    }

    fn to_object(&self) -> Object {
        // Validation guarantees at least one format.
        let mut formats: Vec<Id> = self.formats.iter().map(|f| Id(f.as_raw())).collect();
        let default = formats.remove(0);
        let size = &self.size;
        let framerate = &self.framerate;

        Object {
            type_: sys::SPA_TYPE_OBJECT_Format,
            id: ParamType::EnumFormat.as_raw(),
            properties: vec![
                property(
                    sys::SPA_FORMAT_mediaType,
                    Value::Id(Id(MediaType::Video.as_raw())),
                ),
                property(
                    sys::SPA_FORMAT_mediaSubtype,
                    Value::Id(Id(MediaSubtype::Raw.as_raw())),
                ),
                property(
                    sys::SPA_FORMAT_VIDEO_format,
                    Value::Choice(ChoiceValue::Id(Choice(
                        ChoiceFlags::empty(),
                        ChoiceEnum::Enum {
                            default,
                            alternatives: formats,
                        },
                    ))),
                ),
                property(
                    sys::SPA_FORMAT_VIDEO_size,
                    Value::Choice(ChoiceValue::Rectangle(Choice(
                        ChoiceFlags::empty(),
                        ChoiceEnum::Range {
                            default: size.default,
                            min: size.min,
                            max: size.max,
                        },
                    ))),
                ),
                property(
                    sys::SPA_FORMAT_VIDEO_framerate,
                    Value::Choice(ChoiceValue::Fraction(Choice(
                        ChoiceFlags::empty(),
                        ChoiceEnum::Range {
                            default: framerate.default,
                            min: framerate.min,
                            max: framerate.max,
                        },
                    ))),
                ),
            ],
        }
    }
}

fn property(key: u32, value: Value) -> Property {
    Property {
        key,
        flags: PropertyFlags::empty(),
        value,
    }
}

fn check_size(range: &ValueRange<Rectangle>) -> Result<(), PodError> {
    let ValueRange { default, min, max } = range;
    let within = |r: &Rectangle| {
        (min.width..=max.width).contains(&r.width) && (min.height..=max.height).contains(&r.height)
    };
    if within(default) {
        Ok(())
    } else {
        Err(PodError::InvalidConfig(format!(
            "size default {:?} is outside {:?}..={:?}",
            default, min, max
        )))
    }
}

fn check_framerate(range: &ValueRange<Fraction>) -> Result<(), PodError> {
    let ValueRange { default, min, max } = range;
    if [default, min, max].iter().any(|f| f.denom == 0) {
        return Err(PodError::InvalidConfig(format!(
            "framerate {:?}..={:?} has a zero denominator",
            min, max
        )));
    }
    let cmp = |a: &Fraction, b: &Fraction| {
        (u64::from(a.num) * u64::from(b.denom)).cmp(&(u64::from(b.num) * u64::from(a.denom)))
    };
    if cmp(min, default) == Ordering::Greater || cmp(default, max) == Ordering::Greater {
        return Err(PodError::InvalidConfig(format!(
            "framerate default {:?} is outside {:?}..={:?}",
            default, min, max
        )));
    }
    Ok(())
}

/// Everything the descriptor builder advertises.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamConfig {
    pub video: VideoFormatConfig,
    /// Buffer memory kinds we can map.
    pub data_types: DataTypes,
    /// Upper bound on the size of any one encoded descriptor.
    pub max_encoded_size: usize,
}

impl Default for ParamConfig {
    fn default() -> Self {
        ParamConfig {
            video: VideoFormatConfig::default(),
            data_types: DataTypes::default(),
            max_encoded_size: PARAMS_BUFFER_CAPACITY,
        }
    }
}

/// Builds the capability descriptors for a raw video consumer.
///
/// Each call encodes into a fresh buffer and returns an owned `Pod`, so
/// descriptors stay valid for as long as the caller holds them and the builder
/// can be shared between threads.
#[derive(Clone, Debug, Default)]
pub struct ParamDescriptorBuilder {
    config: ParamConfig,
}

impl ParamDescriptorBuilder {
    /// Create a builder, checking that the configuration describes something
    /// PipeWire can negotiate with.
    pub fn new(config: ParamConfig) -> Result<Self, PodError> {
        config.video.validate()?;
        Ok(ParamDescriptorBuilder { config })
    }

    pub fn config(&self) -> &ParamConfig {
        &self.config
    }

    /// Build the video format capability
    ///
    /// This POD is an `EnumFormat` object defining our supported video
    /// formats. It is used when connecting to a PipeWire node to begin the
    /// negotiations.
    pub fn build_video_format_capability(&self) -> Result<Pod, PodError> {
        let pod = self.serialize(self.config.video.to_object())?;
        debug!(
            len = pod.len(),
            formats = self.config.video.formats.len(),
            "built video format capability"
        );
        Ok(pod)
    }

    /// Build the buffer type capability
    ///
    /// Called when we are finishing the format negotiation. This produces the
    /// `Buffers` parameter we need to set to complete negotiation.
    pub fn build_buffer_type_capability(&self) -> Result<Pod, PodError> {
        let pod = self.serialize(Object {
            type_: sys::SPA_TYPE_OBJECT_ParamBuffers,
            id: ParamType::Buffers.as_raw(),
            properties: vec![property(
                sys::SPA_PARAM_BUFFERS_dataType,
                Value::Int(self.config.data_types.bits() as i32),
            )],
        })?;
        debug!(
            len = pod.len(),
            data_types = ?self.config.data_types,
            "built buffer type capability"
        );
        Ok(pod)
    }

    fn serialize(&self, object: Object) -> Result<Pod, PodError> {
        let (cursor, _) = PodSerializer::serialize(Cursor::new(Vec::new()), &Value::Object(object))
            .map_err(|err| PodError::Serialize(format!("{:?}", err)))?;
        let bytes = cursor.into_inner();

        let capacity = self.config.max_encoded_size;
        if bytes.len() > capacity {
            return Err(PodError::EncodingTooLarge {
                required: bytes.len(),
                capacity,
            });
        }
        Ok(Pod::copy_from(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(pod: &Pod) -> Vec<u32> {
        bytemuck::cast_slice::<u8, u32>(pod.as_bytes()).to_vec()
    }

    #[test]
    fn check_data_types() {
        assert_eq!(0b1010, DataTypes::default().bits());
        assert_eq!(1 << 2, DataTypes::MEM_FD.bits());
    }

    #[test]
    fn buffer_capability_layout() {
        let pod = ParamDescriptorBuilder::default()
            .build_buffer_type_capability()
            .unwrap();
        assert_eq!(
            vec![32, 0x0F, 0x40004, 5, 6, 0, 4, 4, 0b1010, 0],
            words(&pod)
        );
    }

    #[test]
    fn video_capability_layout() {
        let pod = ParamDescriptorBuilder::default()
            .build_video_format_capability()
            .unwrap();
        assert_eq!(224, pod.len());

        #[rustfmt::skip]
        let expected = vec![
            216, 0x0F, 0x40003, 3,
            1, 0, 4, 3, 2, 0,
            2, 0, 4, 3, 1, 0,
            0x20001, 0, 32, 0x13, 3, 0, 4, 3, 11, 7, 8, 12,
            0x20003, 0, 40, 0x13, 1, 0, 8, 0x0A, 1920, 1080, 1, 1, 4096, 4096,
            0x20004, 0, 40, 0x13, 1, 0, 8, 0x0B, 60, 1, 0, 1, 144, 1,
        ];
        assert_eq!(expected, words(&pod));
    }

    #[test]
    fn odd_format_counts_are_padded() {
        let config = ParamConfig {
            video: VideoFormatConfig::default().with_formats([
                VideoFormat::BGRx,
                VideoFormat::RGBx,
                VideoFormat::NV12,
            ]),
            ..ParamConfig::default()
        };
        let pod = ParamDescriptorBuilder::new(config)
            .unwrap()
            .build_video_format_capability()
            .unwrap();
        assert_eq!(224, pod.len());
        assert!(pod.as_spa_pod().is_ok());
    }

    #[test]
    fn too_many_formats_for_capacity() {
        let config = ParamConfig {
            video: VideoFormatConfig::default().with_formats((0..300).map(VideoFormat::from_raw)),
            ..ParamConfig::default()
        };
        let builder = ParamDescriptorBuilder::new(config).unwrap();
        assert_eq!(
            Err(PodError::EncodingTooLarge {
                required: 224 + 296 * 4,
                capacity: PARAMS_BUFFER_CAPACITY
            }),
            builder.build_video_format_capability()
        );
    }

    #[test]
    fn capacity_applies_to_buffers_too() {
        let config = ParamConfig {
            max_encoded_size: 16,
            ..ParamConfig::default()
        };
        assert_eq!(
            Err(PodError::EncodingTooLarge {
                required: 40,
                capacity: 16
            }),
            ParamDescriptorBuilder::new(config)
                .unwrap()
                .build_buffer_type_capability()
        );
    }

    #[test]
    fn rejects_unordered_ranges() {
        let config = ParamConfig {
            video: VideoFormatConfig::default().with_default_size(Rectangle {
                width: 8192,
                height: 8192,
            }),
            ..ParamConfig::default()
        };
        assert!(matches!(
            ParamDescriptorBuilder::new(config),
            Err(PodError::InvalidConfig(_))
        ));

        let config = ParamConfig {
            video: VideoFormatConfig::default()
                .with_default_framerate(Fraction { num: 240, denom: 1 }),
            ..ParamConfig::default()
        };
        assert!(matches!(
            ParamDescriptorBuilder::new(config),
            Err(PodError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_denominators() {
        let zero = Fraction { num: 0, denom: 0 };
        let config = ParamConfig {
            video: VideoFormatConfig {
                framerate: ValueRange::new(zero, zero, zero),
                ..VideoFormatConfig::default()
            },
            ..ParamConfig::default()
        };
        assert!(matches!(
            ParamDescriptorBuilder::new(config),
            Err(PodError::InvalidConfig(_))
        ));

        // Only the default is broken; everything compares equal to 60/0.
        let config = ParamConfig {
            video: VideoFormatConfig::default()
                .with_default_framerate(Fraction { num: 60, denom: 0 }),
            ..ParamConfig::default()
        };
        assert!(matches!(
            ParamDescriptorBuilder::new(config),
            Err(PodError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_formats() {
        let config = ParamConfig {
            video: VideoFormatConfig::default().with_formats(Vec::<VideoFormat>::new()),
            ..ParamConfig::default()
        };
        assert!(matches!(
            ParamDescriptorBuilder::new(config),
            Err(PodError::InvalidConfig(_))
        ));
    }

    #[test]
    fn descriptors_are_independent() {
        let builder = ParamDescriptorBuilder::default();
        let video = builder.build_video_format_capability().unwrap();
        let snapshot = video.as_bytes().to_vec();
        let buffers = builder.build_buffer_type_capability().unwrap();
        assert_ne!(video.as_bytes(), buffers.as_bytes());
        assert_eq!(snapshot, video.as_bytes());
    }
}
