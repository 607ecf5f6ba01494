//! Iterator extension methods.

use std::iter::Zip;

/// Zips two iterators that must have the same length.
///
/// Network outputs come in parallel tensors (boxes and scores, for example). A length mismatch
/// means the model does not match its decoder, so this panics instead of truncating like
/// [`Iterator::zip`].
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "cannot zip iterators of different lengths"
    );

    a.zip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_lengths() {
        let pairs = zip_exact([1, 2, 3], ["a", "b", "c"]).collect::<Vec<_>>();
        assert_eq!(pairs, [(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    fn different_lengths() {
        zip_exact([1, 2, 3], [1, 2]);
    }
}
