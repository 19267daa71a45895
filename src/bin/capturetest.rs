use pipewire as pw;
use pw::{
    properties::properties,
    spa::{param::ParamType, utils::Direction},
    stream::{Stream, StreamFlags},
};
use screencap_params::{parse_media_type, parse_raw_video_info, ParamDescriptorBuilder};
use std::error::Error;
use tracing::{error, info, warn};

/// # Run the Test Application
///
/// Connect to the PipeWire daemon and negotiate raw video from a node. The
/// target node id can be given as the first argument; otherwise PipeWire picks
/// one for us.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let target = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u32>())
        .transpose()?;

    pw::init();
    let res = capture(target);
    unsafe {
        pw::deinit();
    }
    res
}

/// Negotiate and print buffers until the main loop exits. Every PipeWire
/// object is dropped before returning.
fn capture(target: Option<u32>) -> Result<(), Box<dyn Error>> {
    let descriptors = ParamDescriptorBuilder::default();
    let video_params = descriptors.build_video_format_capability()?;
    let buffer_params = descriptors.build_buffer_type_capability()?;

    let main_loop = pw::main_loop::MainLoop::new(None)?;
    let context = pw::context::Context::new(&main_loop)?;
    let core = context.connect(None)?;

    let _core_listener = core
        .add_listener_local()
        .error(|id, seq, res, message| {
            error!(id, seq, res, reason = message, "core error");
        })
        .register();

    let stream = Stream::new(
        &core,
        "test-screencap",
        properties! {
            *pw::keys::MEDIA_TYPE => "Video",
            *pw::keys::MEDIA_CATEGORY => "Capture",
            *pw::keys::MEDIA_ROLE => "Screen"
        },
    )?;

    let _stream_listener = stream
        .add_local_listener_with_user_data(buffer_params)
        .state_changed(|_, _, old, new| info!(?old, ?new, "stream state"))
        .param_changed(|stream, buffer_params, id, param| {
            let Some(param) = param else { return };
            if id != ParamType::Format.as_raw() {
                return;
            }

            let format = param.as_bytes();
            match parse_media_type(format) {
                Ok((media_type, media_subtype)) => info!(?media_type, ?media_subtype, "media"),
                Err(err) => {
                    warn!(%err, "unreadable format");
                    return;
                }
            }
            match parse_raw_video_info(format) {
                Ok(video) => info!(
                    format = ?video.format(),
                    width = video.size().width,
                    height = video.size().height,
                    "negotiated format"
                ),
                Err(err) => warn!(%err, "unreadable raw video info"),
            }

            match buffer_params.as_spa_pod() {
                Ok(pod) => {
                    if let Err(err) = stream.update_params(&mut [pod]) {
                        error!(%err, "failed to update stream params");
                    }
                }
                Err(err) => error!(%err, "bad buffer params"),
            }
        })
        .process(|stream, _| {
            if let Some(mut buffer) = stream.dequeue_buffer() {
                if let Some(data) = buffer.datas_mut().first_mut() {
                    let chunk = data.chunk();
                    info!(size = chunk.size(), stride = chunk.stride(), "got buffer");
                }
            }
        })
        .register()?;

    stream.connect(
        Direction::Input,
        target,
        StreamFlags::AUTOCONNECT | StreamFlags::MAP_BUFFERS,
        &mut [video_params.as_spa_pod()?],
    )?;
    info!(?target, "stream connected");

    main_loop.run();

    info!("done");
    Ok(())
}
