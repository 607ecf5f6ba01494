//! Frame capture from V4L2 webcams.
//!
//! Only capture devices that deliver JPEG or Motion JPEG frames are supported, which covers
//! nearly every USB webcam.

use std::path::PathBuf;

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, JpegBackend, Resolution};
use crate::timer::Timer;

/// Which setting to keep when the camera cannot satisfy both the requested resolution and the
/// requested frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

/// Minimum resolution and frame rate a capture mode has to offer.
#[derive(Debug, Default, Clone, Copy)]
struct Requirements {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    prefer: ParamPreference,
}

impl Requirements {
    fn accepts(&self, mode: &CaptureMode) -> bool {
        let res_ok = self.resolution.map_or(true, |min| {
            mode.resolution.width() >= min.width() && mode.resolution.height() >= min.height()
        });
        let fps_ok = self.fps.map_or(true, |min| mode.fps() >= min);
        res_ok && fps_ok
    }

    /// Gives up the less preferred requirement, or the other one if that is already gone.
    ///
    /// Returns `false` once nothing is left to give up.
    fn relax(&mut self) -> bool {
        let dropped = match self.prefer {
            ParamPreference::Resolution => self.fps.take().is_some(),
            ParamPreference::Framerate => self.resolution.take().is_some(),
        };
        dropped || self.fps.take().is_some() || self.resolution.take().is_some()
    }

    /// Picks the best accepted mode, ranking by the preferred setting first.
    fn choose(&self, modes: &[CaptureMode]) -> Option<CaptureMode> {
        let modes = modes.iter().filter(|mode| self.accepts(mode));
        match self.prefer {
            ParamPreference::Resolution => {
                modes.max_by_key(|mode| (mode.resolution.num_pixels(), mode.fps()))
            }
            ParamPreference::Framerate => {
                modes.max_by_key(|mode| (mode.fps(), mode.resolution.num_pixels()))
            }
        }
        .copied()
    }
}

/// How to find and configure the webcam.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    index: u32,
    name: Option<String>,
    requirements: Requirements,
    jpeg_backend: JpegBackend,
}

impl WebcamOptions {
    /// Opens `/dev/video<index>`. The default is 0.
    ///
    /// Has no effect when a [`name`](Self::name) is set.
    pub fn index(self, index: u32) -> Self {
        Self { index, ..self }
    }

    /// Opens the first capture device whose card name is `name`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Asks for at least this resolution.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.requirements.resolution = Some(resolution);
        self
    }

    /// Asks for at least this many frames per second.
    pub fn fps(mut self, fps: u32) -> Self {
        self.requirements.fps = Some(fps);
        self
    }

    pub fn prefer(mut self, prefer: ParamPreference) -> Self {
        self.requirements.prefer = prefer;
        self
    }

    pub fn jpeg_backend(mut self, backend: JpegBackend) -> Self {
        self.jpeg_backend = backend;
        self
    }

    fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/video{}", self.index))
    }
}

/// A resolution and frame interval the camera supports.
#[derive(Clone, Copy)]
struct CaptureMode {
    resolution: Resolution,
    interval: Fract,
}

impl CaptureMode {
    fn fps(&self) -> u32 {
        (1.0 / self.interval.as_f32()).round() as u32
    }
}

fn jpeg_format(device: &Device) -> anyhow::Result<Pixelformat> {
    for desc in device.formats(BufType::VIDEO_CAPTURE) {
        let format = desc?.pixelformat();
        if format == Pixelformat::JPEG || format == Pixelformat::MJPG {
            return Ok(format);
        }
    }
    bail!("webcam does not offer JPEG or MJPG frames")
}

fn capture_modes(device: &Device, format: Pixelformat) -> anyhow::Result<Vec<CaptureMode>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(format)? else {
        bail!("webcams with stepwise or continuous frame sizes are not supported");
    };

    let mut modes = Vec::new();
    for size in sizes {
        let (width, height) = (size.width(), size.height());
        let FrameIntervals::Discrete(intervals) = device.frame_intervals(format, width, height)?
        else {
            bail!("webcams with stepwise or continuous frame intervals are not supported");
        };
        modes.extend(intervals.iter().map(|interval| CaptureMode {
            resolution: Resolution::new(width, height),
            interval: *interval.fract(),
        }));
    }
    Ok(modes)
}

fn negotiate(
    modes: &[CaptureMode],
    mut requirements: Requirements,
) -> anyhow::Result<CaptureMode> {
    loop {
        if let Some(mode) = requirements.choose(modes) {
            return Ok(mode);
        }
        log::debug!("no capture mode satisfies {requirements:?}");
        if !requirements.relax() {
            bail!("webcam offers no capture modes");
        }
    }
}

/// An open webcam stream.
///
/// The device is released on drop.
pub struct Webcam {
    stream: ReadStream,
    jpeg_backend: JpegBackend,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens and configures the webcam described by `options`.
    ///
    /// Webcams often take a few hundred milliseconds to start up, during which this blocks.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let Some(name) = &options.name else {
            let path = options.device_path();
            let device = Device::open(&path)
                .with_context(|| format!("failed to open webcam {}", path.display()))?;
            return Self::start(device, &options)?
                .with_context(|| format!("{} cannot capture video", path.display()));
        };

        for device in linuxvideo::list()? {
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("skipping video device: {e}");
                    continue;
                }
            };
            if device.capabilities()?.card() != name.as_str() {
                continue;
            }
            match Self::start(device, &options) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("cannot use webcam '{name}': {e:#}"),
            }
        }
        bail!("no usable webcam named '{name}'")
    }

    /// Starts capturing, or returns `None` if `device` is not a capture device.
    fn start(device: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = device.capabilities()?;
        let path = device.path()?;
        log::debug!(
            "{} ({}) has capabilities {:?}",
            caps.card(),
            path.display(),
            caps.device_capabilities()
        );
        if !caps.device_capabilities().contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let format = jpeg_format(&device)?;
        let mode = negotiate(&capture_modes(&device, format)?, options.requirements)?;
        let capture = device.video_capture(PixFormat::new(
            mode.resolution.width(),
            mode.resolution.height(),
            format,
        ))?;
        let interval = capture.set_frame_interval(mode.interval)?;
        let actual = capture.format();
        log::info!(
            "capturing from {} ({}) at {}x{}, {:.1} FPS",
            caps.card(),
            path.display(),
            actual.width(),
            actual.height(),
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            jpeg_backend: options.jpeg_backend,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Waits for the next frame and decodes it.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let backend = self.jpeg_backend;
        let t_decode = &self.t_decode;
        let waiting = self.t_dequeue.start();
        let image = self.stream.dequeue(|jpeg| {
            drop(waiting);
            Ok(t_decode.time(|| Image::decode_jpeg(&jpeg, backend)))
        })?;
        image.context("failed to decode webcam frame")
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(w: u32, h: u32, fps: u32) -> CaptureMode {
        CaptureMode {
            resolution: Resolution::new(w, h),
            interval: Fract::new(1, fps),
        }
    }

    fn modes() -> Vec<CaptureMode> {
        vec![
            mode(640, 480, 30),
            mode(640, 480, 60),
            mode(1280, 720, 30),
            mode(1920, 1080, 15),
        ]
    }

    #[test]
    fn default_device() {
        let options = WebcamOptions::default();
        assert_eq!(options.device_path(), PathBuf::from("/dev/video0"));
        assert_eq!(options.index(2).device_path(), PathBuf::from("/dev/video2"));
    }

    #[test]
    fn highest_resolution_at_requested_fps() {
        let req = WebcamOptions::default().fps(30).requirements;
        let chosen = negotiate(&modes(), req).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(1280, 720));
    }

    #[test]
    fn highest_fps_when_preferred() {
        let req = WebcamOptions::default()
            .prefer(ParamPreference::Framerate)
            .requirements;
        let chosen = negotiate(&modes(), req).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(640, 480));
        assert_eq!(chosen.fps(), 60);
    }

    #[test]
    fn frame_rate_is_given_up_first() {
        let mut req = WebcamOptions::default()
            .resolution(Resolution::new(1920, 1080))
            .fps(60)
            .requirements;
        assert!(req.choose(&modes()).is_none());

        let chosen = negotiate(&modes(), req).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(1920, 1080));
        assert_eq!(chosen.fps(), 15);

        assert!(req.relax());
        assert_eq!(req.fps, None);
        assert!(req.resolution.is_some());
        assert!(req.relax());
        assert!(!req.relax());
    }

    #[test]
    fn resolution_is_given_up_first_for_framerate() {
        let mut req = WebcamOptions::default()
            .resolution(Resolution::new(1920, 1080))
            .fps(60)
            .prefer(ParamPreference::Framerate)
            .requirements;
        assert!(req.relax());
        assert_eq!(req.resolution, None);
        assert_eq!(negotiate(&modes(), req).unwrap().fps(), 60);
    }

    #[test]
    fn no_modes() {
        assert!(negotiate(&[], Requirements::default()).is_err());
    }
}
