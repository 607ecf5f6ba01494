//! Landmark estimation and region-of-interest tracking.

use crate::image::{AsImageView, AspectRatio, ImageView, Resolution, RotatedRect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

type Position = [f32; 3];

/// Landmark positions in pixels of the image they were estimated on.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates `len` landmarks, all at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().map(|&[x, y, z]| Landmark::new(x, y, z))
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }
}

/// A single landmark.
///
/// `x` and `y` grow to the right and down. `z` is a depth estimate relative to the wrist, and
/// has the same scale as `x`.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Landmark {
    x: f32,
    y: f32,
    z: f32,
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.z
    }
}

/// The decoded output of a landmark [`Network`].
pub trait Estimate: Send + Sync + 'static {
    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// How sure the network is that the object is in the image, from 0.0 to 1.0.
    fn confidence(&self) -> f32;

    /// Clockwise rotation of the object relative to its upright pose, if the network knows it.
    ///
    /// A [`LandmarkTracker`] rotates its region of interest by this angle.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` into `estimate`, with positions in pixels of the network input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Runs a landmark [`Network`] and maps its output back onto the input image.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks in `image`, returning them in `image` coordinates.
    ///
    /// `image` is padded to the network's aspect ratio first.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("landmark network has empty input {input_res}"))?;

        let padded = image.rect().grow_to_fit_aspect(aspect);
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(padded)))?;
        log::trace!("landmark outputs: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate))?;

        let scale = padded.width() / input_res.width() as f32;
        for [x, y, z] in self.estimate.landmarks_mut().positions_mut() {
            *x = *x * scale + padded.x();
            *y = *y * scale + padded.y();
            *z *= scale;
        }

        Ok(&mut self.estimate)
    }
}

/// Follows one object from frame to frame.
///
/// Each call to [`track`](Self::track) estimates landmarks inside the current region of interest
/// (RoI), then moves the RoI to the padded bounding box of the new landmarks, rotated by the
/// estimated object angle. Once confidence drops below the loss threshold the RoI is cleared and
/// the tracker stays idle until [`set_roi`](Self::set_roi) is called again.
pub struct LandmarkTracker<E: Estimate> {
    estimator: Estimator<E>,
    aspect: AspectRatio,
    roi: Option<RotatedRect>,
    loss_thresh: f32,
}

impl<E: Estimate> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Padding added to each side of the landmarks' bounding box, relative to its size.
    pub const ROI_PADDING: f32 = 0.3;

    pub fn new(estimator: Estimator<E>) -> anyhow::Result<Self> {
        let input_res = estimator.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow::anyhow!("landmark network has empty input {input_res}"))?;
        Ok(Self {
            estimator,
            aspect,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
        })
    }

    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// The region the next [`track`](Self::track) call will look at, if tracking.
    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Starts tracking inside `roi`, taken as-is.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Tracks the object in `image`, which must have the same size in every call.
    ///
    /// Returns `Ok(None)` when there is no RoI or the object was lost in this frame.
    pub fn track<V: AsImageView>(
        &mut self,
        image: &V,
    ) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        self.track_impl(image.as_view())
    }

    fn track_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        let view_rect = roi.grow_to_fit_aspect(self.aspect);
        let estimate = self.estimator.estimate(&image.view(view_rect))?;

        let confidence = estimate.confidence();
        if confidence < self.loss_thresh {
            log::trace!("tracking lost (confidence {confidence} < {})", self.loss_thresh);
            self.roi = None;
            return Ok(None);
        }

        for [x, y, _] in estimate.landmarks_mut().positions_mut() {
            [*x, *y] = view_rect.transform_out(*x, *y);
        }

        let angle = roi.rotation_radians() + estimate.angle_radians().unwrap_or(0.0);
        let points = estimate.landmarks_mut().iter().map(|lm| [lm.x(), lm.y()]);
        self.roi = RotatedRect::bounding(angle, points).map(|r| r.grow_rel(Self::ROI_PADDING));
        if self.roi.is_none() {
            return Ok(None);
        }

        Ok(Some(TrackingResult {
            view_rect,
            estimate,
        }))
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }
}

/// A successful [`LandmarkTracker::track`] step.
pub struct TrackingResult<'a, E: Estimate> {
    view_rect: RotatedRect,
    estimate: &'a E,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// The part of the image the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }

    /// The estimate, with landmarks in full image coordinates.
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }
}
