//! Hand landmark prediction.

use std::path::Path;

use nalgebra::{Point2, Rotation2, Vector2};

use crate::{
    image::{draw, AsImageViewMut, Color, ImageViewMut, Resolution},
    iter::zip_exact,
    landmark::{Estimate, Estimator, LandmarkTracker, Landmarks, Network},
    nn::{tensor::Tensor, Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
};

use super::{LandmarkIdx, CONNECTIVITY, NUM_LANDMARKS, PALM_LANDMARKS};

/// File name of the full hand landmark network.
pub const FULL_MODEL_FILE: &str = "hand_landmark_full.onnx";

/// File name of the lightweight hand landmark network.
pub const LITE_MODEL_FILE: &str = "hand_landmark_lite.onnx";

/// Landmark results estimated by the hand landmark network.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    /// Returns the hand landmarks, in pixel coordinates of the image they were estimated on.
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns the position of the landmark `idx`.
    pub fn landmark_position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.landmarks.positions()[idx as usize]
    }

    /// Computes the center position of the hand's palm by averaging some of the landmarks.
    pub fn palm_center(&self) -> [f32; 2] {
        let (sx, sy) = PALM_LANDMARKS
            .iter()
            .map(|&idx| self.landmark_position(idx))
            .fold((0.0, 0.0), |(sx, sy), [x, y, _]| (sx + x, sy + y));
        let count = PALM_LANDMARKS.len() as f32;
        [sx / count, sy / count]
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that fingers are pointed upwards.
    pub fn rotation_radians(&self) -> f32 {
        let [x, y, _] = self.landmark_position(LandmarkIdx::MiddleFingerMcp);
        let finger = Point2::new(x, y);
        let [x, y, _] = self.landmark_position(LandmarkIdx::Wrist);
        let wrist = Point2::new(x, y);

        let rel = wrist - finger;
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }

    /// Returns the presence flag, indicating the confidence of whether a hand was in the input
    /// image.
    ///
    /// The value is between 0.0 and 1.0, with higher values indicating higher confidence that a
    /// hand was present.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// The network assumes an unmirrored camera image. The value should only be relied on when
    /// `presence` is over some threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Draws the hand skeleton onto `target`.
    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        self.draw_impl(&mut target.as_view_mut());
    }

    fn draw_impl(&self, target: &mut ImageViewMut<'_>) {
        for &(a, b) in CONNECTIVITY {
            let [a_x, a_y, _] = self.landmark_position(a);
            let [b_x, b_y, _] = self.landmark_position(b);

            draw::line(target, a_x, a_y, b_x, b_y).color(Color::GREEN);
        }
        for &[x, y, _] in self.landmarks.positions() {
            draw::marker(target, x, y);
        }
    }
}

impl Estimate for LandmarkResult {
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn confidence(&self) -> f32 {
        self.presence
    }

    fn angle_radians(&self) -> Option<f32> {
        Some(self.rotation_radians())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The MediaPipe hand landmark network.
///
/// Takes a 224x224 RGB image of a hand, roughly centered and rotated so that the fingers point up.
#[derive(Clone)]
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the network from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::load(path)?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }

    /// Loads the full landmark network from `model_dir`.
    pub fn full<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Self::load(model_dir.as_ref().join(FULL_MODEL_FILE))
    }

    /// Loads the lightweight landmark network from `model_dir`.
    ///
    /// Faster, but fairly inaccurate compared to [`LandmarkNetwork::full`].
    pub fn lite<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Self::load(model_dir.as_ref().join(LITE_MODEL_FILE))
    }
}

impl Network for LandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    anyhow::ensure!(
        outputs.len() == 4,
        "hand landmark network returned {} outputs, expected 4",
        outputs.len()
    );
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];
    let metric_landmarks = &outputs[3];

    anyhow::ensure!(
        screen_landmarks.shape() == [1, NUM_LANDMARKS * 3],
        "unexpected landmark tensor shape {:?}",
        screen_landmarks.shape()
    );
    anyhow::ensure!(
        presence_flag.shape() == [1, 1] && handedness.shape() == [1, 1],
        "unexpected presence/handedness tensor shapes {:?} and {:?}",
        presence_flag.shape(),
        handedness.shape()
    );
    anyhow::ensure!(
        metric_landmarks.shape() == [1, NUM_LANDMARKS * 3],
        "unexpected world landmark tensor shape {:?}",
        metric_landmarks.shape()
    );

    let scalar = |name: &str, t: &Tensor| {
        t.index([0, 0])
            .as_singular()
            .ok_or_else(|| anyhow::anyhow!("{name} output is not a scalar"))
    };
    estimate.presence = scalar("presence", presence_flag)?;
    estimate.raw_handedness = scalar("handedness", handedness)?;

    let screen = screen_landmarks.index([0]);
    let coords = screen
        .as_slice()
        .ok_or_else(|| anyhow::anyhow!("landmark output is not contiguous"))?;
    for (xyz, out) in zip_exact(
        coords.chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        *out = [xyz[0], xyz[1], xyz[2]];
    }

    Ok(())
}

/// Estimates hand landmarks and creates per-hand trackers.
#[derive(Clone)]
pub struct Landmarker {
    network: LandmarkNetwork,
}

impl Landmarker {
    /// Presence value below which a tracked hand is considered lost.
    pub const DEFAULT_TRACKING_THRESHOLD: f32 = 0.7;

    pub fn new(network: LandmarkNetwork) -> Self {
        Self { network }
    }

    /// Returns the expected input resolution of the landmark network.
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn.input_resolution()
    }

    /// Creates a one-shot [`Estimator`] sharing this landmarker's network.
    pub fn estimator(&self) -> Estimator<LandmarkResult> {
        Estimator::new(self.network.clone())
    }

    /// Creates a [`LandmarkTracker`] for a single hand.
    ///
    /// The tracker drops its region of interest once the presence flag falls below
    /// [`Landmarker::DEFAULT_TRACKING_THRESHOLD`].
    pub fn tracker(&self) -> anyhow::Result<LandmarkTracker<LandmarkResult>> {
        let mut tracker = LandmarkTracker::new(self.estimator())?;
        tracker.set_loss_threshold(Self::DEFAULT_TRACKING_THRESHOLD);
        Ok(tracker)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    use crate::image::Image;

    use super::*;

    fn network_outputs(presence: f32, handedness: f32) -> Outputs {
        let landmarks = Tensor::from_array_shape_fn([1, 63], |[_, i]| i as f32);
        [
            landmarks.clone(),
            Tensor::from_array_shape_fn([1, 1], |_| presence),
            Tensor::from_array_shape_fn([1, 1], |_| handedness),
            landmarks,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn extract_outputs() {
        let mut result = LandmarkResult::default();
        extract(&network_outputs(0.9, 0.8), &mut result).unwrap();

        assert_eq!(result.presence(), 0.9);
        assert_eq!(result.confidence(), 0.9);
        assert_eq!(result.handedness(), Handedness::Right);
        assert_eq!(result.landmarks().len(), 21);
        assert_eq!(result.landmarks().positions()[0], [0.0, 1.0, 2.0]);
        assert_eq!(result.landmarks().positions()[20], [60.0, 61.0, 62.0]);

        extract(&network_outputs(0.1, 0.2), &mut result).unwrap();
        assert_eq!(result.handedness(), Handedness::Left);
    }

    #[test]
    fn extract_rejects_wrong_shapes() {
        let mut result = LandmarkResult::default();
        let outputs: Outputs = [Tensor::from_array_shape_fn([1, 42], |_| 0.0)]
            .into_iter()
            .collect();
        assert!(extract(&outputs, &mut result).is_err());

        let outputs: Outputs = [
            Tensor::from_array_shape_fn([1, 42], |_| 0.0),
            Tensor::from_array_shape_fn([1, 1], |_| 0.0),
            Tensor::from_array_shape_fn([1, 1], |_| 0.0),
            Tensor::from_array_shape_fn([1, 42], |_| 0.0),
        ]
        .into_iter()
        .collect();
        assert!(extract(&outputs, &mut result).is_err());
    }

    fn hand_pointing(dx: f32, dy: f32) -> LandmarkResult {
        let mut result = LandmarkResult::default();
        let positions = result.landmarks_mut().positions_mut();
        positions[LandmarkIdx::Wrist as usize] = [50.0, 50.0, 0.0];
        positions[LandmarkIdx::MiddleFingerMcp as usize] = [50.0 + dx * 20.0, 50.0 + dy * 20.0, 0.0];
        result
    }

    #[test]
    fn rotation() {
        assert_abs_diff_eq!(hand_pointing(0.0, -1.0).rotation_radians(), 0.0);
        assert_abs_diff_eq!(
            hand_pointing(1.0, 0.0).rotation_radians(),
            PI / 2.0,
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(
            hand_pointing(0.0, 1.0).rotation_radians().abs(),
            PI,
            epsilon = 1e-5
        );
        assert_eq!(hand_pointing(0.0, -1.0).angle_radians(), Some(0.0));
    }

    #[test]
    fn palm_center() {
        let mut result = LandmarkResult::default();
        for &idx in PALM_LANDMARKS {
            result.landmarks_mut().positions_mut()[idx as usize] = [6.0, 12.0, 1.0];
        }
        assert_eq!(result.palm_center(), [6.0, 12.0]);
    }

    #[test]
    fn draw_skeleton() {
        let mut image = Image::new(100, 100);
        let mut result = hand_pointing(0.0, -1.0);
        for pos in result.landmarks_mut().positions_mut() {
            if *pos == [0.0, 0.0, 0.0] {
                *pos = [50.0, 50.0, 0.0];
            }
        }
        result.draw(&mut image);

        // A bone between wrist and middle finger MCP, with markers on the joints.
        assert_eq!(image.get(50, 40), Color::GREEN);
        assert_eq!(image.get(50, 30), Color::RED);
        assert_eq!(image.get(10, 10), Color::NULL);
    }
}
