//! Single-class object detection on top of an SSD network.

pub mod nms;
pub mod ssd;

use crate::image::{AsImageView, ImageView, Rect, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// A neural network that finds objects in an image.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` and appends every detection with a confidence of at least `threshold`
    /// to `detections`.
    ///
    /// Positions are in pixels of the network's input image.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// Runs a detection [`Network`] on arbitrary images.
///
/// Images that do not match the network's aspect ratio are padded on the short side. Raw
/// detections go through non-maximum suppression and are then mapped back to the coordinates of
/// the original image.
pub struct Detector {
    network: Box<dyn Network>,
    thresh: f32,
    nms: NonMaxSuppression,
    raw: Vec<Detection>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
            raw: Vec::new(),
            detections: Vec::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the confidence a raw detection needs to reach before suppression.
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.raw.clear();
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("detection network has empty input {input_res}"))?;

        let padded = image.rect().grow_to_fit_aspect(aspect);
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(padded)))?;
        log::trace!("detector outputs: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, self.thresh, &mut self.raw))?;
        self.t_nms
            .time(|| self.detections.extend(self.nms.process(&mut self.raw)));

        let scale = padded.width() / input_res.width() as f32;
        let (dx, dy) = (padded.x(), padded.y());
        for det in &mut self.detections {
            det.rect = Rect::from_center(
                det.rect.x_center() * scale + dx,
                det.rect.y_center() * scale + dy,
                det.rect.width() * scale,
                det.rect.height() * scale,
            );
            for kp in &mut det.keypoints {
                *kp = Keypoint::new(kp.x * scale + dx, kp.y * scale + dy);
            }
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// An object found by a [`Detector`].
///
/// The confidence lies in `0.0..=1.0` and doubles as the weight when overlapping detections are
/// averaged.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clockwise rotation of the object in radians, 0.0 if the network does not estimate one.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// The axis-aligned box around the object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Network-specific points on the object. Palm detections carry seven.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
