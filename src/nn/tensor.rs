//! `f32` tensors exchanged with networks.

use std::fmt;

use tract_onnx::prelude::tract_ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// An owned, dynamically shaped array of `f32`.
///
/// Network outputs are read by narrowing them down with [`Tensor::index`] until a slice
/// ([`TensorView::as_slice`]) or a single value ([`TensorView::as_singular`]) remains.
#[derive(Clone)]
pub struct Tensor {
    data: ArrayD<f32>,
}

/// A borrowed part of a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    data: ArrayViewD<'a, f32>,
}

impl Tensor {
    /// Builds a tensor of `shape`, calling `f` with the index of every element.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let data = ArrayD::from_shape_fn(IxDyn(&shape), |ix| f(std::array::from_fn(|i| ix[i])));
        Self { data }
    }

    /// Builds a tensor of `shape` from elements in row-major order.
    ///
    /// Fails unless `iter` yields exactly the number of elements `shape` holds.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> anyhow::Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), iter.into_iter().collect())?;
        Ok(Self { data })
    }

    pub(super) fn from_tract(tensor: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        Ok(Self {
            data: tensor.to_array_view::<f32>()?.to_owned(),
        })
    }

    pub(super) fn to_tract(&self) -> tract_onnx::prelude::Tensor {
        self.data.clone().into()
    }

    fn view(&self) -> TensorView<'_> {
        TensorView {
            data: self.data.view(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Fixes the first `N` indices, returning a view of the remaining dimensions.
    ///
    /// For a `[1, 2016, 18]` tensor, `index([0])` is a `[2016, 18]` view and `index([0, 5])` the
    /// 18 values of anchor 5.
    ///
    /// # Panics
    ///
    /// Panics if `N` exceeds the rank or an index is out of range.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// Iterates over the first dimension.
    ///
    /// # Panics
    ///
    /// Panics on a tensor of rank 0.
    #[track_caller]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = TensorView<'_>> {
        assert_ne!(self.rank(), 0, "cannot iterate over a scalar tensor");
        self.data.outer_iter().map(|data| TensorView { data })
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(values: [f32; N]) -> Self {
        Self::from_array_shape_fn([N], |[i]| values[i])
    }
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Like [`Tensor::index`].
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        let out_of_range = N > self.rank()
            || indices
                .iter()
                .zip(self.shape())
                .any(|(&index, &len)| index >= len);
        assert!(
            !out_of_range,
            "index {indices:?} out of range for tensor of shape {:?}",
            self.shape()
        );

        let data = indices
            .into_iter()
            .fold(self.data.clone(), |data, index| data.index_axis_move(Axis(0), index));
        TensorView { data }
    }

    /// Like [`Tensor::iter`].
    #[track_caller]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = TensorView<'_>> {
        assert_ne!(self.rank(), 0, "cannot iterate over a scalar tensor view");
        self.data.outer_iter().map(|data| TensorView { data })
    }

    /// The elements of a rank 1 view, or `None` for any other rank.
    pub fn as_slice(&self) -> Option<&[f32]> {
        match self.rank() {
            1 => self.data.as_slice(),
            _ => None,
        }
    }

    /// The element of a rank 0 view, or `None` for any other rank.
    pub fn as_singular(&self) -> Option<f32> {
        match self.rank() {
            0 => self.data.first().copied(),
            _ => None,
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?}", self.shape())
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView{:?}", self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palm_box_layout() {
        let boxes = Tensor::from_array_shape_fn([1, 4, 18], |[_, anchor, param]| {
            (anchor * 100 + param) as f32
        });
        assert_eq!(boxes.rank(), 3);
        assert_eq!(format!("{boxes:?}"), "Tensor[1, 4, 18]");

        let anchors = boxes.index([0]);
        assert_eq!(anchors.shape(), &[4, 18]);
        assert_eq!(anchors.iter().len(), 4);
        assert_eq!(anchors.as_slice(), None);

        let third = boxes.index([0, 2]);
        assert_eq!(third.as_slice().map(|p| p[..3].to_vec()), Some(vec![200.0, 201.0, 202.0]));
        assert_eq!(boxes.index([0, 3, 17]).as_singular(), Some(317.0));
        assert_eq!(boxes.index([0, 3]).as_singular(), None);
        assert_eq!(boxes.index([]).shape(), boxes.shape());
    }

    #[test]
    fn rows_in_order() {
        let tensor = Tensor::from_iter(&[2, 3], (0..6).map(|i| i as f32)).unwrap();
        let rows = tensor
            .iter()
            .map(|row| row.as_slice().unwrap().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(rows, [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);

        assert!(Tensor::from_iter(&[2, 3], [1.0; 5]).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_past_end() {
        Tensor::from([1.0, 2.0]).index([2]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn too_many_indices() {
        Tensor::from([1.0]).index([0, 0]);
    }

    #[test]
    fn tract_round_trip() {
        let tensor = Tensor::from_array_shape_fn([1, 1], |_| 0.7);
        let back = Tensor::from_tract(&tensor.to_tract()).unwrap();
        assert_eq!(back.shape(), &[1, 1]);
        assert_eq!(back.index([0, 0]).as_singular(), Some(0.7));
    }
}
