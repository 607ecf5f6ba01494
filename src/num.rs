//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` ordered by [`f32::total_cmp`], so that confidences can be sorted.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        f32::total_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(&self.0, &other.0)
    }
}

/// Maps a logit to a probability.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn sigmoid_values() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(sigmoid(0.8473), 0.7, epsilon = 1e-4);
        assert!(sigmoid(-100.0) < 1e-6);
        assert!(sigmoid(100.0) > 0.999_999);
    }

    #[test]
    fn total_order() {
        let mut values = [TotalF32(0.5), TotalF32(f32::NAN), TotalF32(-1.0), TotalF32(0.9)];
        values.sort();
        assert_eq!(values[0].0, -1.0);
        assert_eq!(values[1].0, 0.5);
        assert_eq!(values[2].0, 0.9);
        assert!(values[3].0.is_nan());
    }
}
