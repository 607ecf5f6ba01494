//! Palm detection.

use std::path::Path;

use nalgebra::{Point2, Rotation2, Vector2};
use once_cell::sync::Lazy;

use crate::{
    detection::{
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Detector, Keypoint, Network,
    },
    image::{AsImageView, Rect, Resolution},
    iter::zip_exact,
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    num::sigmoid,
    timer::Timer,
};

/// File name of the full-range palm detection network.
pub const FULL_MODEL_FILE: &str = "palm_detection_full.onnx";

/// File name of the lightweight palm detection network.
pub const LITE_MODEL_FILE: &str = "palm_detection_lite.onnx";

/// Number of box parameters per anchor: box center and size, followed by 7 keypoints.
const BOX_PARAMS: usize = 18;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// Loads the palm detection network from an ONNX file.
///
/// Both the full and the lite MediaPipe palm detection networks use the same input and output
/// layout, so either can be used.
fn load_cnn(path: &Path) -> anyhow::Result<Cnn> {
    Cnn::new(
        NeuralNetwork::load(path)?,
        CnnInputShape::NCHW,
        ColorMapper::linear(0.0..=1.0),
    )
}

/// The MediaPipe palm detection network.
pub struct PalmDetectionNetwork {
    cnn: Cnn,
}

impl PalmDetectionNetwork {
    /// Loads the network from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: load_cnn(path.as_ref())?,
        })
    }

    /// Loads the full-range network from `model_dir`.
    pub fn full<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Self::load(model_dir.as_ref().join(FULL_MODEL_FILE))
    }

    /// Loads the lightweight network from `model_dir`.
    ///
    /// The lite network is slightly faster than the full one, at the cost of missing hands that
    /// are far away from the camera.
    pub fn lite<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        Self::load(model_dir.as_ref().join(LITE_MODEL_FILE))
    }
}

impl Network for PalmDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

static ANCHORS: Lazy<Anchors> =
    Lazy::new(|| Anchors::new(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]));

fn extract_outputs(
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    let num_anchors = ANCHORS.len();
    anyhow::ensure!(
        outputs.len() >= 2,
        "palm detection network returned {} outputs, expected 2",
        outputs.len()
    );
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    anyhow::ensure!(
        boxes.shape() == [1, num_anchors, BOX_PARAMS],
        "unexpected palm box tensor shape {:?}",
        boxes.shape()
    );
    anyhow::ensure!(
        confidences.shape() == [1, num_anchors, 1],
        "unexpected palm score tensor shape {:?}",
        confidences.shape()
    );

    let boxes = boxes.index([0]);
    for ((anchor, score), params) in zip_exact(
        zip_exact(ANCHORS.iter(), confidences.index([0]).iter()),
        boxes.iter(),
    ) {
        let raw = score
            .index([0])
            .as_singular()
            .ok_or_else(|| anyhow::anyhow!("palm score is not a scalar"))?;
        let conf = sigmoid(raw);
        if conf < thresh {
            continue;
        }

        let params = params
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("palm box parameters are not contiguous"))?;
        detections.push(extract_detection(anchor, input_res, params, conf));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;

    let anchor_x = anchor.x_center() * input_w;
    let anchor_y = anchor.y_center() * input_h;

    let xc = box_params[0] + anchor_x;
    let yc = box_params[1] + anchor_y;
    let w = box_params[2];
    let h = box_params[3];
    let keypoints = box_params[4..BOX_PARAMS]
        .chunks_exact(2)
        .map(|xy| Keypoint::new(xy[0] + anchor_x, xy[1] + anchor_y))
        .collect::<Vec<_>>();

    let mut det = Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Computes the clockwise rotation of a palm from its wrist and middle finger keypoints.
///
/// An angle of 0 means that the fingers point straight up.
fn palm_angle(det: &Detection) -> f32 {
    let a = det.keypoints()[PalmKeypoint::MiddleFingerMcp as usize];
    let finger = Point2::new(a.x(), a.y());
    let b = det.keypoints()[PalmKeypoint::Wrist as usize];
    let wrist = Point2::new(b.x(), b.y());

    let rel = wrist - finger;
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}

/// Detects palms in an image.
pub struct PalmDetector {
    detector: Detector,
}

impl PalmDetector {
    /// Minimum confidence of a palm detection.
    pub const DEFAULT_THRESHOLD: f32 = 0.7;

    pub fn new(network: PalmDetectionNetwork) -> Self {
        let mut detector = Detector::new(network);
        detector.set_threshold(Self::DEFAULT_THRESHOLD);
        Self { detector }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.detector.input_resolution()
    }

    /// Detects palms in `image`.
    ///
    /// Detections are in the coordinate system of `image`, with keypoints as listed in
    /// [`PalmKeypoint`].
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detector.detect(image)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector.timers()
    }
}
