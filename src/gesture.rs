//! Rule-based hand gesture classification.
//!
//! A hand is classified by evaluating an ordered table of [`GestureRule`]s against its 21
//! normalized landmarks. The first rule whose predicate holds determines the [`Gesture`]. Since
//! several predicates can hold for the same hand, the order of [`RULES`] is part of the contract.
//!
//! Classification is stateless: it only looks at the landmarks passed in, never at other hands or
//! earlier frames.

use std::fmt;

use crate::hand::{HandLandmarks, LandmarkIdx};

/// Fingertips of the four fingers, excluding the thumb.
const FINGERTIPS: [LandmarkIdx; 4] = [
    LandmarkIdx::IndexFingerTip,
    LandmarkIdx::MiddleFingerTip,
    LandmarkIdx::RingFingerTip,
    LandmarkIdx::PinkyTip,
];

/// Maximum per-axis distance between thumb and index fingertip for an [`Gesture::OkSign`].
const OK_SIGN_TOUCH_DISTANCE: f32 = 0.05;

/// The gestures that can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    OpenPalm,
    Fist,
    ThumbsUp,
    ThumbsDown,
    VictorySign,
    OkSign,
    PointingUp,
    PointingLeft,
    RockSign,
    ThreeFingersUp,
}

impl Gesture {
    /// All gestures, in the order in which they are tried by [`classify`].
    pub const ALL: [Gesture; 10] = [
        Gesture::OpenPalm,
        Gesture::Fist,
        Gesture::ThumbsUp,
        Gesture::ThumbsDown,
        Gesture::VictorySign,
        Gesture::OkSign,
        Gesture::PointingUp,
        Gesture::PointingLeft,
        Gesture::RockSign,
        Gesture::ThreeFingersUp,
    ];

    /// Returns the human-readable label of this gesture, as drawn onto the output frame.
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "Open Palm",
            Gesture::Fist => "Fist",
            Gesture::ThumbsUp => "Thumbs Up",
            Gesture::ThumbsDown => "Thumbs Down",
            Gesture::VictorySign => "Victory Sign",
            Gesture::OkSign => "OK Sign",
            Gesture::PointingUp => "Pointing Up",
            Gesture::PointingLeft => "Pointing Left",
            Gesture::RockSign => "Rock Sign",
            Gesture::ThreeFingersUp => "Three Fingers Up",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A [`Gesture`] paired with the predicate that recognizes it.
#[derive(Clone, Copy)]
pub struct GestureRule {
    gesture: Gesture,
    predicate: fn(&HandLandmarks) -> bool,
}

impl GestureRule {
    const fn new(gesture: Gesture, predicate: fn(&HandLandmarks) -> bool) -> Self {
        Self { gesture, predicate }
    }

    #[inline]
    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// Evaluates this rule's predicate on `landmarks`.
    #[inline]
    pub fn matches(&self, landmarks: &HandLandmarks) -> bool {
        (self.predicate)(landmarks)
    }
}

impl fmt::Debug for GestureRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GestureRule").field(&self.gesture).finish()
    }
}

/// The gesture rule table, in priority order.
pub static RULES: &[GestureRule] = &[
    GestureRule::new(Gesture::OpenPalm, open_palm),
    GestureRule::new(Gesture::Fist, fist),
    GestureRule::new(Gesture::ThumbsUp, thumbs_up),
    GestureRule::new(Gesture::ThumbsDown, thumbs_down),
    GestureRule::new(Gesture::VictorySign, victory_sign),
    GestureRule::new(Gesture::OkSign, ok_sign),
    GestureRule::new(Gesture::PointingUp, pointing_up),
    GestureRule::new(Gesture::PointingLeft, pointing_left),
    GestureRule::new(Gesture::RockSign, rock_sign),
    GestureRule::new(Gesture::ThreeFingersUp, three_fingers_up),
];

/// Classifies a single hand.
///
/// Returns the gesture of the first rule in [`RULES`] that matches, or [`None`] if no rule does.
pub fn classify(landmarks: &HandLandmarks) -> Option<Gesture> {
    RULES
        .iter()
        .find(|rule| rule.matches(landmarks))
        .map(GestureRule::gesture)
}

/// Classifies every hand of a frame independently.
///
/// The returned list has one entry per input hand, in the same order.
pub fn classify_all<'a, I>(hands: I) -> Vec<Option<Gesture>>
where
    I: IntoIterator<Item = &'a HandLandmarks>,
{
    hands.into_iter().map(classify).collect()
}

/// The landmark 2 indices below `tip`, which is the PIP joint for the four fingers.
fn pip(tip: LandmarkIdx) -> usize {
    tip as usize - 2
}

/// Finger is extended: its tip lies above its PIP joint (Y points down).
fn tip_above_pip(lm: &HandLandmarks, tip: LandmarkIdx) -> bool {
    lm[tip].y() < lm[pip(tip)].y()
}

/// Finger is curled: its tip lies below its PIP joint.
fn tip_below_pip(lm: &HandLandmarks, tip: LandmarkIdx) -> bool {
    lm[tip].y() > lm[pip(tip)].y()
}

fn open_palm(lm: &HandLandmarks) -> bool {
    FINGERTIPS.iter().all(|&tip| tip_above_pip(lm, tip))
}

fn fist(lm: &HandLandmarks) -> bool {
    FINGERTIPS.iter().all(|&tip| tip_below_pip(lm, tip))
}

fn thumbs_up(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    [ThumbTip, ThumbIp, ThumbMcp, ThumbCmc, Wrist]
        .windows(2)
        .all(|pair| lm[pair[0]].y() < lm[pair[1]].y())
}

fn thumbs_down(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    [ThumbTip, ThumbIp, ThumbMcp, ThumbCmc, Wrist]
        .windows(2)
        .all(|pair| lm[pair[0]].y() > lm[pair[1]].y())
}

fn victory_sign(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    tip_above_pip(lm, IndexFingerTip)
        && tip_above_pip(lm, MiddleFingerTip)
        && tip_below_pip(lm, RingFingerTip)
}

fn ok_sign(lm: &HandLandmarks) -> bool {
    let thumb = lm[LandmarkIdx::ThumbTip];
    let index = lm[LandmarkIdx::IndexFingerTip];
    (thumb.x() - index.x()).abs() < OK_SIGN_TOUCH_DISTANCE
        && (thumb.y() - index.y()).abs() < OK_SIGN_TOUCH_DISTANCE
}

fn pointing_up(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    tip_above_pip(lm, IndexFingerTip)
        && [MiddleFingerTip, RingFingerTip, PinkyTip]
            .iter()
            .all(|&tip| tip_below_pip(lm, tip))
}

fn pointing_left(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    lm[IndexFingerTip].x() < lm[pip(IndexFingerTip)].x()
        && [MiddleFingerTip, RingFingerTip, PinkyTip]
            .iter()
            .all(|&tip| lm[tip].x() > lm[pip(tip)].x())
}

fn rock_sign(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    lm[ThumbTip].y() < lm[ThumbIp].y()
        && tip_above_pip(lm, IndexFingerTip)
        && tip_above_pip(lm, PinkyTip)
}

fn three_fingers_up(lm: &HandLandmarks) -> bool {
    use LandmarkIdx::*;
    tip_above_pip(lm, IndexFingerTip)
        && tip_above_pip(lm, MiddleFingerTip)
        && tip_above_pip(lm, RingFingerTip)
        && tip_below_pip(lm, PinkyTip)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// All landmarks at the same point: every strict comparison fails, and the OK sign distance
    /// check is the only one that can hold.
    fn neutral() -> [[f32; 2]; 21] {
        [[0.5, 0.5]; 21]
    }

    fn with(mut positions: [[f32; 2]; 21], changes: &[(usize, [f32; 2])]) -> HandLandmarks {
        for &(index, pos) in changes {
            positions[index] = pos;
        }
        HandLandmarks::from_positions(positions)
    }

    /// Spreads all landmarks apart horizontally so that the OK sign cannot match by accident.
    fn spread() -> [[f32; 2]; 21] {
        let mut positions = neutral();
        for (i, pos) in positions.iter_mut().enumerate() {
            pos[0] = i as f32 * 0.1;
        }
        positions
    }

    #[test]
    fn rule_table_order() {
        let order = RULES.iter().map(|rule| rule.gesture()).collect::<Vec<_>>();
        assert_eq!(order, Gesture::ALL);
    }

    #[test]
    fn labels_are_unique() {
        for (i, a) in Gesture::ALL.iter().enumerate() {
            for b in &Gesture::ALL[i + 1..] {
                assert_ne!(a.label(), b.label());
            }
        }
        assert_eq!(Gesture::OkSign.to_string(), "OK Sign");
    }

    #[test]
    fn pip_is_two_below_tip() {
        assert_eq!(pip(LandmarkIdx::IndexFingerTip), LandmarkIdx::IndexFingerPip as usize);
        assert_eq!(pip(LandmarkIdx::MiddleFingerTip), LandmarkIdx::MiddleFingerPip as usize);
        assert_eq!(pip(LandmarkIdx::RingFingerTip), LandmarkIdx::RingFingerPip as usize);
        assert_eq!(pip(LandmarkIdx::PinkyTip), LandmarkIdx::PinkyPip as usize);
    }

    #[test]
    fn open_palm() {
        let lm = with(
            spread(),
            &[
                (8, [0.8, 0.2]),
                (6, [0.6, 0.4]),
                (12, [1.2, 0.2]),
                (10, [1.0, 0.4]),
                (16, [1.6, 0.2]),
                (14, [1.4, 0.4]),
                (20, [2.0, 0.2]),
                (18, [1.8, 0.4]),
            ],
        );
        assert_eq!(classify(&lm), Some(Gesture::OpenPalm));
    }

    #[test]
    fn fist() {
        let lm = with(
            spread(),
            &[
                (8, [0.8, 0.6]),
                (6, [0.6, 0.4]),
                (12, [1.2, 0.6]),
                (10, [1.0, 0.4]),
                (16, [1.6, 0.6]),
                (14, [1.4, 0.4]),
                (20, [2.0, 0.6]),
                (18, [1.8, 0.4]),
            ],
        );
        assert_eq!(classify(&lm), Some(Gesture::Fist));
    }

    #[test]
    fn thumbs_up() {
        let lm = with(
            neutral(),
            &[
                (4, [0.5, 0.10]),
                (3, [0.5, 0.20]),
                (2, [0.5, 0.30]),
                (1, [0.5, 0.40]),
                (0, [0.5, 0.50]),
                // Keep the index tip away from the thumb tip.
                (8, [0.9, 0.5]),
            ],
        );
        assert_eq!(classify(&lm), Some(Gesture::ThumbsUp));
    }

    #[test]
    fn thumbs_down() {
        let lm = with(
            neutral(),
            &[
                (4, [0.5, 0.90]),
                (3, [0.5, 0.80]),
                (2, [0.5, 0.70]),
                (1, [0.5, 0.60]),
                (0, [0.5, 0.50]),
                (8, [0.1, 0.5]),
            ],
        );
        assert_eq!(classify(&lm), Some(Gesture::ThumbsDown));
    }

    #[test]
    fn victory_sign() {
        let lm = with(
            spread(),
            &[(8, [0.8, 0.3]), (12, [1.2, 0.3]), (16, [1.6, 0.7])],
        );
        assert_eq!(classify(&lm), Some(Gesture::VictorySign));
    }

    #[test]
    fn ok_sign() {
        let lm = with(spread(), &[(4, [0.40, 0.30]), (8, [0.42, 0.31])]);
        assert_eq!(classify(&lm), Some(Gesture::OkSign));
    }

    #[test]
    fn ok_sign_threshold_is_exclusive() {
        let lm = with(spread(), &[(4, [0.40, 0.30]), (8, [0.46, 0.30])]);
        assert!(!super::ok_sign(&lm));
    }

    #[test]
    fn pointing_up() {
        let lm = with(
            spread(),
            &[(8, [0.8, 0.3]), (12, [1.2, 0.7]), (16, [1.6, 0.7]), (20, [2.0, 0.7])],
        );
        assert_eq!(classify(&lm), Some(Gesture::PointingUp));
    }

    #[test]
    fn pointing_left() {
        // Y coordinates stay neutral so that no vertical rule can match; `spread` already places
        // every tip to the right of its PIP joint.
        let lm = with(spread(), &[(8, [0.5, 0.5])]);
        assert_eq!(classify(&lm), Some(Gesture::PointingLeft));
    }

    #[test]
    fn rock_sign() {
        let lm = with(
            spread(),
            &[(4, [0.4, 0.4]), (8, [0.8, 0.3]), (20, [2.0, 0.3])],
        );
        assert_eq!(classify(&lm), Some(Gesture::RockSign));
    }

    #[test]
    fn three_fingers_up() {
        let lm = with(
            spread(),
            &[
                (8, [0.8, 0.3]),
                (12, [1.2, 0.3]),
                (16, [1.6, 0.3]),
                (20, [2.0, 0.7]),
            ],
        );
        assert_eq!(classify(&lm), Some(Gesture::ThreeFingersUp));
    }

    #[test]
    fn no_match() {
        assert_eq!(classify(&with(spread(), &[])), None);
    }

    #[test]
    fn each_hand_is_classified_independently() {
        let fist = with(
            spread(),
            &[(8, [0.8, 0.6]), (12, [1.2, 0.6]), (16, [1.6, 0.6]), (20, [2.0, 0.6])],
        );
        let nothing = with(spread(), &[]);
        assert_eq!(
            classify_all([&fist, &nothing, &fist]),
            vec![Some(Gesture::Fist), None, Some(Gesture::Fist)]
        );
    }
}
