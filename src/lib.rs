//! Real-time hand gesture recognition.
//!
//! Frames are captured from a V4L2 webcam, hands are located with a palm detection network and
//! their 21 landmarks estimated with a hand landmark network (the MediaPipe Hands pipeline). The
//! [`gesture`] module then labels each hand by evaluating a fixed, ordered table of geometric
//! predicates over the normalized landmark coordinates.
//!
//! # Coordinates
//!
//! Landmark coordinates passed to the gesture classifier are normalized to the input image: X
//! points right, Y points *down*, and both range approximately from 0.0 to 1.0.
//!
//! # Environment Variables
//!
//! * `HANDSIGN_MODEL_DIR`: Directory containing the ONNX networks. Defaults to `3rdparty/onnx`.
//! * `HANDSIGN_LITE_MODELS`: If set to `1` or `true`, the lite palm detection and hand landmark
//!   networks are used instead of the full ones.
//! * `HANDSIGN_WEBCAM_INDEX`: Index of the V4L2 device to open (`/dev/videoN`). Defaults to 0.
//! * `HANDSIGN_WEBCAM_NAME`: Forces the device with this name to be used instead of opening one by
//!   index.
//! * `HANDSIGN_JPEG_BACKEND`: Configures the JPEG decoder used for webcam frames. Allowed values
//!   are `zune-jpeg` (the default) and `jpeg-decoder`.

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod termination;
pub mod timer;
pub mod webcam;

pub use gui::run;

#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Sets up `env_logger` for the calling binary.
///
/// The binary and `handsign` log at *trace* level in debug builds and at *debug* level in release
/// builds, `wgpu` only logs warnings. Filters in `RUST_LOG` take precedence. Does nothing if a
/// logger is already installed.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
