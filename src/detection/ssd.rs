//! Anchors of Single Shot MultiBox Detector (SSD) networks.
//!
//! Every output layer of an SSD covers the input with a grid of cells. Each cell owns a fixed
//! number of anchors, and the network predicts boxes as offsets from the anchor centers. The
//! MediaPipe palm detector uses unit-size anchors centered in their cell, which is the only
//! layout supported here.

use std::ops::Index;

use itertools::Itertools;

/// Center of an anchor, normalized to `0.0..=1.0` across the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Grid size and anchors per cell of one SSD output layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    anchors_per_cell: usize,
    columns: u32,
    rows: u32,
}

impl LayerInfo {
    /// # Panics
    ///
    /// Panics if `anchors_per_cell` is zero.
    pub fn new(anchors_per_cell: usize, columns: u32, rows: u32) -> Self {
        assert_ne!(anchors_per_cell, 0, "SSD layers need at least one anchor per cell");
        Self {
            anchors_per_cell,
            columns,
            rows,
        }
    }

    /// Anchors of this layer in output order: row by row, all anchors of a cell in a row.
    fn anchors(&self) -> impl Iterator<Item = Anchor> + '_ {
        (0..self.rows)
            .cartesian_product(0..self.columns)
            .flat_map(move |(row, col)| {
                let anchor = Anchor {
                    x_center: (col as f32 + 0.5) / self.columns as f32,
                    y_center: (row as f32 + 0.5) / self.rows as f32,
                };
                std::iter::repeat(anchor).take(self.anchors_per_cell)
            })
    }
}

/// All anchors of a network, in the order its outputs list them.
pub struct Anchors(Vec<Anchor>);

impl Anchors {
    pub fn new(layers: &[LayerInfo]) -> Self {
        Self(layers.iter().flat_map(LayerInfo::anchors).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
        self.0.iter()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.0[index]
    }
}
