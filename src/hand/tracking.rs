//! Hand tracking across video frames.

use crate::{
    detection::Detection,
    image::{AsImageView, Rect, RotatedRect},
    landmark::LandmarkTracker,
    timer::Timer,
};

use super::{
    detection::PalmDetector,
    landmark::{LandmarkResult, Landmarker},
};

/// Tracks up to a fixed number of hands in a sequence of frames.
///
/// Hands that are already tracked are followed by re-running the landmark network in a region
/// of interest derived from the previous frame's landmarks. The palm detector only runs when
/// fewer than the maximum number of hands are tracked.
pub struct HandTracker {
    detector: PalmDetector,
    landmarker: Landmarker,
    hands: Vec<TrackedHand>,
    next_hand_id: HandId,
    max_hands: usize,
    iou_thresh: f32,
}

impl HandTracker {
    pub const DEFAULT_MAX_HANDS: usize = 2;

    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Palm rectangle to hand RoI scale factor.
    const ROI_SCALE: f32 = 2.6;

    /// RoI shift towards the fingers, relative to the palm height.
    const ROI_SHIFT: f32 = 0.5;

    pub fn new(detector: PalmDetector, landmarker: Landmarker) -> Self {
        Self {
            detector,
            landmarker,
            hands: Vec::new(),
            next_hand_id: HandId(0),
            max_hands: Self::DEFAULT_MAX_HANDS,
            iou_thresh: Self::DEFAULT_IOU_THRESH,
        }
    }

    /// Sets the maximum number of hands to track at once.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }

    /// Sets the intersection-over-union threshold at which a palm detection is considered to
    /// belong to an already tracked hand.
    ///
    /// Since the detector also finds all hands that are already being tracked, this ensures that
    /// each hand is only tracked once.
    pub fn set_iou_thresh(&mut self, thresh: f32) {
        self.iou_thresh = thresh;
    }

    /// Returns an iterator over the tracking data for each hand in the last frame passed to
    /// [`HandTracker::track`].
    pub fn hands(&self) -> impl Iterator<Item = HandData<'_>> {
        self.hands.iter().map(|hand| HandData {
            id: hand.id,
            lm: &hand.lm,
            view_rect: hand.view_rect,
        })
    }

    /// Returns the number of currently tracked hands.
    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    /// Updates all tracked hands and looks for new ones in `image`.
    ///
    /// All frames passed to this method have to be of the same size.
    pub fn track<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<()> {
        let mut i = 0;
        while i < self.hands.len() {
            if self.hands[i].update(image)? {
                i += 1;
            } else {
                let lost = self.hands.remove(i);
                log::trace!("lost track of hand {:?}", lost.id);
            }
        }

        if self.hands.len() >= self.max_hands {
            return Ok(());
        }

        for det in self.detector.detect(image)? {
            if self.hands.len() >= self.max_hands {
                break;
            }

            let roi = hand_roi(det, Self::ROI_SCALE, Self::ROI_SHIFT);
            let overlaps = self.hands.iter().any(|hand| {
                hand.tracker
                    .roi()
                    .map_or(false, |tracked| tracked.rect().iou(roi.rect()) >= self.iou_thresh)
            });
            if overlaps {
                continue;
            }

            let mut tracker = self.landmarker.tracker()?;
            tracker.set_roi(roi);
            let mut hand = TrackedHand {
                id: self.next_hand_id,
                tracker,
                lm: LandmarkResult::default(),
                view_rect: roi,
            };
            if hand.update(image)? {
                log::trace!("tracking new hand {:?} at {:?}", hand.id, roi);
                self.next_hand_id.0 += 1;
                self.hands.push(hand);
            }
        }

        Ok(())
    }

    /// Returns the profiling timers of the palm detector.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector.timers()
    }
}

/// Computes the landmark network's region of interest for a palm detection.
///
/// Palm detections only cover the palm, while the landmark network expects the whole hand, so
/// the rectangle is made square, enlarged by `scale` and moved towards the fingers by `shift`
/// times its height.
fn hand_roi(det: &Detection, scale: f32, shift: f32) -> RotatedRect {
    let rect = det.bounding_rect();
    let angle = det.angle();
    let (xc, yc) = rect.center();
    let (sin, cos) = angle.sin_cos();
    let offset = rect.height() * shift;
    let size = rect.width().max(rect.height()) * scale;

    RotatedRect::new(
        Rect::from_center(xc + offset * sin, yc - offset * cos, size, size),
        angle,
    )
}

struct TrackedHand {
    id: HandId,
    tracker: LandmarkTracker<LandmarkResult>,
    lm: LandmarkResult,
    view_rect: RotatedRect,
}

impl TrackedHand {
    /// Re-estimates the hand's landmarks. Returns `false` when tracking was lost.
    fn update<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<bool> {
        match self.tracker.track(image)? {
            Some(res) => {
                self.lm.clone_from(res.estimate());
                self.view_rect = res.view_rect();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// ID of a tracked hand.
///
/// The assigned [`HandId`]s are unique per [`HandTracker`] assigning them. They are reused between
/// frames for as long as the hand is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandId(u64);

/// Tracking data returned for a hand in the input image.
pub struct HandData<'a> {
    id: HandId,
    lm: &'a LandmarkResult,
    view_rect: RotatedRect,
}

impl<'a> HandData<'a> {
    pub fn id(&self) -> HandId {
        self.id
    }

    /// Hand landmarks, in full image coordinates.
    pub fn landmark_result(&self) -> &'a LandmarkResult {
        self.lm
    }

    /// The rotated rectangle the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }
}
