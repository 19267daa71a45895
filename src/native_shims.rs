//! Glue code for building and parsing SPA PODs with libspa's C API directly.
//!
//! The rest of the crate goes through the libspa crate. These wrappers go
//! through the `spa_pod_builder` and `spa_format_*_parse` inline functions
//! instead, so the two can be checked against each other.

use crate::{error::PodError, params::ParamConfig, pod::Pod};
use libspa::param::format::{MediaSubtype, MediaType};
use libspa_sys::{spa_fraction, spa_pod, spa_rectangle, spa_video_info_raw};
use std::{mem, os::raw};

extern "C" {
    /// Build the video parameters structure into `buffer`.
    ///
    /// Returns the number of bytes the POD needs, which is more than
    /// `capacity` if it didn't fit.
    fn build_video_params(
        buffer: *mut raw::c_void,
        capacity: u32,
        formats: *const u32,
        n_formats: u32,
        size: *const spa_rectangle,
        framerate: *const spa_fraction,
    ) -> raw::c_int;

    /// Build the stream buffer parameters into `buffer`.
    fn build_stream_param(buffer: *mut raw::c_void, capacity: u32, data_types: i32) -> raw::c_int;

    fn spa_format_parse_rs(
        format: *const spa_pod,
        media_type: *mut u32,
        media_subtype: *mut u32,
    ) -> raw::c_int;

    fn spa_format_video_raw_parse_rs(
        format: *const spa_pod,
        info: *mut spa_video_info_raw,
    ) -> raw::c_int;
}

impl PodError {
    fn from_native(res: raw::c_int) -> Self {
        PodError::Native(res)
    }
}

/// Run a libspa builder against an aligned scratch buffer of
/// `max_encoded_size` bytes and copy out the bytes it wrote.
fn build_with(
    config: &ParamConfig,
    build: impl FnOnce(*mut raw::c_void, u32) -> raw::c_int,
) -> Result<Pod, PodError> {
    let capacity = config.max_encoded_size;
    let native_capacity = u32::try_from(capacity)
        .map_err(|_| PodError::InvalidConfig(format!("capacity {} is too large", capacity)))?;

    let mut scratch = vec![0u64; (capacity + 7) / 8];
    let res = build(scratch.as_mut_ptr().cast(), native_capacity);
    if res < 0 {
        return Err(PodError::from_native(res));
    }

    let required = res as usize;
    if required > capacity {
        return Err(PodError::EncodingTooLarge { required, capacity });
    }
    let bytes = bytemuck::cast_slice::<u64, u8>(&scratch);
    Ok(Pod::copy_from(&bytes[..required]))
}

/// Build the video format capability for `config` with libspa.
pub fn native_video_params(config: &ParamConfig) -> Result<Pod, PodError> {
    let video = &config.video;
    if video.formats.is_empty() {
        return Err(PodError::InvalidConfig(
            "at least one pixel format is required".into(),
        ));
    }
    let formats: Vec<u32> = video.formats.iter().map(|f| f.as_raw()).collect();
    let size = [video.size.default, video.size.min, video.size.max];
    let framerate = [
        video.framerate.default,
        video.framerate.min,
        video.framerate.max,
    ];

    build_with(config, |buffer, capacity| unsafe {
        build_video_params(
            buffer,
            capacity,
            formats.as_ptr(),
            formats.len() as u32,
            size.as_ptr(),
            framerate.as_ptr(),
        )
    })
}

/// Build the buffer type capability for `config` with libspa.
pub fn native_stream_param(config: &ParamConfig) -> Result<Pod, PodError> {
    build_with(config, |buffer, capacity| unsafe {
        build_stream_param(buffer, capacity, config.data_types.bits() as i32)
    })
}

/// Parse the media type with `spa_format_parse`.
pub fn native_parse_media_type(pod: &Pod) -> Result<(MediaType, MediaSubtype), PodError> {
    let format = pod.as_spa_pod()?.as_raw_ptr();
    let mut media_type = 0;
    let mut media_subtype = 0;
    let res = unsafe { spa_format_parse_rs(format, &mut media_type, &mut media_subtype) };
    if res < 0 {
        return Err(PodError::from_native(res));
    }
    Ok((
        MediaType::from_raw(media_type),
        MediaSubtype::from_raw(media_subtype),
    ))
}

/// Parse raw video info with `spa_format_video_raw_parse`.
pub fn native_parse_raw_video_info(pod: &Pod) -> Result<spa_video_info_raw, PodError> {
    let format = pod.as_spa_pod()?.as_raw_ptr();
    let mut info: spa_video_info_raw = unsafe { mem::zeroed() };
    let res = unsafe { spa_format_video_raw_parse_rs(format, &mut info) };
    if res < 0 {
        return Err(PodError::from_native(res));
    }
    Ok(info)
}
