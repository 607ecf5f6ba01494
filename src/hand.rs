//! Hand detection, landmark estimation and tracking.
//!
//! The pipeline follows MediaPipe Hands: [`detection::PalmDetector`] finds palms in the full frame,
//! [`landmark::Landmarker`] estimates 21 landmarks inside a rotated region around each palm, and
//! [`tracking::HandTracker`] ties both together across frames.

pub mod detection;
pub mod landmark;
pub mod tracking;

use std::ops::Index;

use crate::{
    image::Resolution,
    landmark::{Landmark, Landmarks},
};

/// Number of landmarks estimated for every hand.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand landmarks, in the order the landmark network outputs them.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The landmarks surrounding the palm.
pub const PALM_LANDMARKS: &[LandmarkIdx] = {
    use LandmarkIdx::*;
    &[
        Wrist,
        ThumbCmc,
        IndexFingerMcp,
        MiddleFingerMcp,
        RingFingerMcp,
        PinkyMcp,
    ]
};

/// Pairs of landmarks connected by a bone, used to draw the hand skeleton.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// The 21 landmarks of one hand in normalized image coordinates.
///
/// X and Y range approximately from 0.0 to 1.0 across the frame, with Y pointing down. Values
/// outside of that range are allowed (a hand can be partially out of view).
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    landmarks: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    /// Creates a landmark set from a slice of exactly 21 landmarks.
    pub fn from_slice(landmarks: &[Landmark]) -> anyhow::Result<Self> {
        let landmarks = <[Landmark; NUM_LANDMARKS]>::try_from(landmarks).map_err(|_| {
            anyhow::anyhow!(
                "a hand has {NUM_LANDMARKS} landmarks, got {}",
                landmarks.len()
            )
        })?;
        Ok(Self { landmarks })
    }

    /// Creates a landmark set from 2D positions, with all depths at 0.0.
    pub fn from_positions(positions: [[f32; 2]; NUM_LANDMARKS]) -> Self {
        Self {
            landmarks: positions.map(|[x, y]| Landmark::new(x, y, 0.0)),
        }
    }

    /// Normalizes landmarks given in pixel coordinates of an image of size `resolution`.
    ///
    /// Depth is scaled by the image width, like X.
    pub fn from_pixels(landmarks: &Landmarks, resolution: Resolution) -> anyhow::Result<Self> {
        anyhow::ensure!(
            resolution.width() > 0 && resolution.height() > 0,
            "cannot normalize landmarks of an empty {resolution} image"
        );
        let (w, h) = (resolution.width() as f32, resolution.height() as f32);
        let normalized = landmarks
            .iter()
            .map(|lm| Landmark::new(lm.x() / w, lm.y() / h, lm.z() / w))
            .collect::<Vec<_>>();
        Self::from_slice(&normalized)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }
}

impl Index<usize> for HandLandmarks {
    type Output = Landmark;

    #[inline]
    fn index(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }
}

impl Index<LandmarkIdx> for HandLandmarks {
    type Output = Landmark;

    #[inline]
    fn index(&self, index: LandmarkIdx) -> &Landmark {
        &self.landmarks[index as usize]
    }
}

impl<'a> IntoIterator for &'a HandLandmarks {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_requires_21() {
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 20]).is_err());
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 22]).is_err());
        assert!(HandLandmarks::from_slice(&[]).is_err());

        let err = HandLandmarks::from_slice(&[Landmark::default(); 5]).unwrap_err();
        assert!(err.to_string().contains("got 5"), "{err}");

        let lms = HandLandmarks::from_slice(&[Landmark::new(0.1, 0.2, 0.3); 21]).unwrap();
        assert_eq!(lms.iter().count(), 21);
    }

    #[test]
    fn index_by_name() {
        let mut positions = [[0.0, 0.0]; 21];
        positions[8] = [0.25, 0.75];
        let lms = HandLandmarks::from_positions(positions);
        assert_eq!(lms[LandmarkIdx::IndexFingerTip], lms[8]);
        assert_eq!(lms[8].x(), 0.25);
        assert_eq!(lms[8].y(), 0.75);
        assert_eq!(LandmarkIdx::PinkyTip as usize, 20);
    }

    #[test]
    fn normalize_pixels() {
        let mut pixels = Landmarks::new(21);
        pixels.positions_mut()[0] = [320.0, 120.0, 64.0];
        pixels.positions_mut()[20] = [640.0, 480.0, 0.0];

        let lms = HandLandmarks::from_pixels(&pixels, Resolution::new(640, 480)).unwrap();
        assert_eq!(lms[0], Landmark::new(0.5, 0.25, 0.1));
        assert_eq!(lms[20], Landmark::new(1.0, 1.0, 0.0));

        assert!(HandLandmarks::from_pixels(&Landmarks::new(20), Resolution::new(640, 480)).is_err());
        assert!(HandLandmarks::from_pixels(&pixels, Resolution::new(0, 480)).is_err());
    }

    #[test]
    fn skeleton_covers_every_landmark() {
        for i in 0..NUM_LANDMARKS {
            assert!(
                CONNECTIVITY
                    .iter()
                    .any(|&(a, b)| a as usize == i || b as usize == i),
                "landmark {i} is not connected"
            );
        }
        assert_eq!(CONNECTIVITY.len(), 21);
        assert!(PALM_LANDMARKS.contains(&LandmarkIdx::Wrist));
    }
}
