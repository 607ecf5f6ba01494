//! Non-maximum suppression.
//!
//! An SSD network reports every hand once per anchor that overlaps it, so the raw output contains
//! clusters of near-identical detections. [`NonMaxSuppression`] reduces each cluster to one
//! detection, either by keeping only its most confident member ([`SuppressionMode::Remove`]) or by
//! averaging the whole cluster weighted by confidence ([`SuppressionMode::Average`]). Averaging
//! gives steadier boxes from frame to frame and is used by default.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// How [`NonMaxSuppression`] reduces a cluster of overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Keep the most confident detection, drop the rest.
    Remove,
    /// Replace the cluster with its confidence-weighted mean.
    Average,
}

/// Merges overlapping detections.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    cluster: Vec<Detection>,
    merged: Vec<Detection>,
}

impl NonMaxSuppression {
    /// Detections whose IoU reaches this value belong to the same cluster.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
            cluster: Vec::new(),
            merged: Vec::new(),
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Drains `detections` and yields one detection per cluster, most confident cluster first.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.merged.clear();

        // Ascending, so that `pop` returns the most confident remaining detection.
        detections.sort_by_key(|det| TotalF32(det.confidence));

        while let Some(best) = detections.pop() {
            let area = best.bounding_rect();
            let thresh = self.iou_thresh;
            let overlaps = |det: &Detection| area.iou(&det.bounding_rect()) >= thresh;

            self.cluster.clear();
            let mut remaining = Vec::with_capacity(detections.len());
            for det in detections.drain(..) {
                if overlaps(&det) {
                    self.cluster.push(det);
                } else {
                    remaining.push(det);
                }
            }
            *detections = remaining;

            let merged = match self.mode {
                SuppressionMode::Remove => best,
                SuppressionMode::Average => weighted_mean(best, &self.cluster),
            };
            self.merged.push(merged);
        }

        self.cluster.clear();
        self.merged.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages rectangle, angle and keypoints of `best` and `others`, weighted by confidence.
///
/// The result reports the confidence of `best`.
fn weighted_mean(best: Detection, others: &[Detection]) -> Detection {
    if others.is_empty() {
        return best;
    }

    let mut total = 0.0;
    let mut center = [0.0; 2];
    let mut size = [0.0; 2];
    let mut angle = 0.0;
    let mut keypoints = vec![[0.0; 2]; best.keypoints.len()];

    for det in std::iter::once(&best).chain(others) {
        let weight = det.confidence;
        let rect = det.rect;
        total += weight;
        center[0] += rect.x_center() * weight;
        center[1] += rect.y_center() * weight;
        size[0] += rect.width() * weight;
        size[1] += rect.height() * weight;
        angle += det.angle * weight;
        for (sum, kp) in zip_exact(&mut keypoints, &det.keypoints) {
            sum[0] += kp.x * weight;
            sum[1] += kp.y * weight;
        }
    }

    let mut mean = Detection::with_keypoints(
        best.confidence,
        Rect::from_center(
            center[0] / total,
            center[1] / total,
            size[0] / total,
            size[1] / total,
        ),
        keypoints
            .into_iter()
            .map(|[x, y]| Keypoint::new(x / total, y / total))
            .collect(),
    );
    mean.set_angle(angle / total);
    mean
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn palm(confidence: f32, x: f32, size: f32) -> Detection {
        Detection::new(confidence, Rect::from_center(x, 0.0, size, size))
    }

    #[test]
    fn remove_keeps_most_confident() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let mut raw = vec![palm(0.75, 0.0, 1.5), palm(0.9, 0.0, 1.0), palm(0.8, 0.1, 1.0)];
        let kept = nms.process(&mut raw).collect::<Vec<_>>();
        assert!(raw.is_empty());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence(), 0.9);
        assert_eq!(kept[0].bounding_rect(), Rect::from_center(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn separate_clusters_survive() {
        let mut nms = NonMaxSuppression::new();
        let mut raw = vec![palm(0.8, 5.0, 1.0), palm(0.95, 0.0, 1.0), palm(0.7, 5.1, 1.0)];
        let kept = nms.process(&mut raw).collect::<Vec<_>>();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence(), 0.95);
        assert_eq!(kept[0].bounding_rect().x_center(), 0.0);
        assert_eq!(kept[1].confidence(), 0.8);
    }

    #[test]
    fn average_weights_by_confidence() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(2.0, 4.0, 2.0, 2.0);
        let strong = Detection::with_keypoints(0.75, rect, vec![Keypoint::new(0.0, 0.0)]);
        let mut weak = Detection::with_keypoints(
            0.25,
            rect.move_by(4.0, 0.0).scale(3.0),
            vec![Keypoint::new(8.0, 4.0)],
        );
        weak.set_angle(1.0);

        let kept = nms.process(&mut vec![weak, strong]).collect::<Vec<_>>();
        assert_eq!(kept.len(), 1);

        let mean = &kept[0];
        assert_eq!(mean.confidence(), 0.75);
        assert_abs_diff_eq!(mean.bounding_rect().x_center(), 3.0);
        assert_abs_diff_eq!(mean.bounding_rect().y_center(), 4.0);
        assert_abs_diff_eq!(mean.bounding_rect().width(), 3.0);
        assert_abs_diff_eq!(mean.angle(), 0.25);
        assert_abs_diff_eq!(mean.keypoints()[0].x(), 2.0);
        assert_abs_diff_eq!(mean.keypoints()[0].y(), 1.0);
    }

    #[test]
    fn empty_input() {
        let mut nms = NonMaxSuppression::new();
        assert_eq!(nms.process(&mut Vec::new()).count(), 0);
    }
}
