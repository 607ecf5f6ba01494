//! ONNX inference with `tract`.

pub mod tensor;

use std::{ops::Index, ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::Context;
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Memory layout of a convolutional network's image input.
///
/// `N` is the batch size (always 1 here), `C` the color channel, `H` and `W` the pixel row and
/// column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    NCHW,
    NHWC,
}

/// Converts pixel colors to network input values.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    offset: f32,
    scale: f32,
}

impl ColorMapper {
    /// Maps every 8-bit RGB channel linearly onto `range`.
    ///
    /// Both MediaPipe hand networks expect `0.0..=1.0`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is empty or contains a single value.
    pub fn linear(range: RangeInclusive<f32>) -> Self {
        let (start, end) = range.into_inner();
        assert!(start < end, "invalid color range {start}..={end}");
        Self {
            offset: start,
            scale: (end - start) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|c| f32::from(c) * self.scale + self.offset)
    }
}

/// A network taking a single image as input.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    colors: ColorMapper,
    input_res: Resolution,
}

impl Cnn {
    /// Wraps `nn`, which must have exactly one input of layout `shape`.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        colors: ColorMapper,
    ) -> anyhow::Result<Self> {
        let [input] = nn.inputs() else {
            anyhow::bail!(
                "image network must have exactly 1 input, '{}' has {}",
                nn.name(),
                nn.inputs().len()
            );
        };
        let (w, h) = match (shape, input.shape()) {
            (CnnInputShape::NCHW, &[1, 3, h, w]) | (CnnInputShape::NHWC, &[1, h, w, 3]) => (w, h),
            (_, other) => anyhow::bail!(
                "input '{}' of shape {other:?} does not have {shape:?} layout",
                input.name()
            ),
        };
        let input_res = Resolution::new(w.try_into()?, h.try_into()?);

        Ok(Self {
            nn,
            shape,
            colors,
            input_res,
        })
    }

    /// Returns the resolution of the network's input image.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `image`.
    ///
    /// The image is resampled to the input resolution with nearest-neighbor sampling and stretched
    /// if its aspect ratio differs from the network's.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let input = self.to_tensor(image.as_view());
        self.nn.estimate(&[input])
    }

    fn to_tensor(&self, view: ImageView<'_>) -> Tensor {
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );
        let (sx, sy) = (
            view.width() as f32 / w as f32,
            view.height() as f32 / h as f32,
        );
        let channel = |x: usize, y: usize, c: usize| {
            let px = (x as f32 * sx).round() as u32;
            let py = (y as f32 * sy).round() as u32;
            self.colors.map(view.get(px, py))[c]
        };

        match self.shape {
            CnnInputShape::NCHW => {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| channel(x, y, c))
            }
            CnnInputShape::NHWC => {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| channel(x, y, c))
            }
        }
    }
}

/// An optimized ONNX network, shareable between threads.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Loaded>);

struct Loaded {
    name: String,
    plan: Plan,
    inputs: Vec<NodeInfo>,
    outputs: Vec<NodeInfo>,
}

impl NeuralNetwork {
    /// Loads and optimizes the ONNX network stored at `path`.
    ///
    /// Fails if the file does not have the `.onnx` extension, cannot be read, or uses operators
    /// `tract` does not support.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(
            path.extension().map_or(false, |ext| ext == "onnx"),
            "network file '{}' must have the `.onnx` extension",
            path.display()
        );
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read network file '{}'", path.display()))?;

        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*data)
            .and_then(|model| model.into_optimized())
            .with_context(|| format!("failed to load network '{}'", path.display()))?;

        let inputs = graph
            .input_outlets()?
            .iter()
            .enumerate()
            .map(|(i, outlet)| NodeInfo::new(&graph.node(outlet.node).name, graph.input_fact(i)?))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let outputs = graph
            .output_outlets()?
            .iter()
            .enumerate()
            .map(|(i, outlet)| NodeInfo::new(&graph.node(outlet.node).name, graph.output_fact(i)?))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let name = path
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
        log::debug!("loaded network '{name}': inputs {inputs:?}, outputs {outputs:?}");

        Ok(Self(Arc::new(Loaded {
            name,
            plan: SimplePlan::new(graph)?,
            inputs,
            outputs,
        })))
    }

    /// Returns the file name of the network, without extension.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn inputs(&self) -> &[NodeInfo] {
        &self.0.inputs
    }

    pub fn outputs(&self) -> &[NodeInfo] {
        &self.0.outputs
    }

    /// Runs inference with one tensor per network input.
    pub fn estimate(&self, inputs: &[Tensor]) -> anyhow::Result<Outputs> {
        anyhow::ensure!(
            inputs.len() == self.0.inputs.len(),
            "network '{}' takes {} inputs, got {}",
            self.name(),
            self.0.inputs.len(),
            inputs.len(),
        );

        let inputs = inputs
            .iter()
            .map(|t| TValue::from_const(Arc::new(t.to_tract())))
            .collect();
        self.0
            .plan
            .run(inputs)?
            .iter()
            .map(|t| Tensor::from_tract(t))
            .collect()
    }
}

/// Name and shape of a network input or output.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    name: String,
    shape: Vec<usize>,
}

impl NodeInfo {
    fn new(name: &str, fact: &TypedFact) -> anyhow::Result<Self> {
        let shape = fact
            .shape
            .as_concrete()
            .with_context(|| format!("network node '{name}' has a symbolic shape"))?;
        Ok(Self {
            name: name.to_string(),
            shape: shape.to_vec(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// The output tensors of one inference pass, in network output order.
#[derive(Debug)]
pub struct Outputs {
    tensors: TVec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.tensors.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.tensors[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_color_mapping() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::from_rgb8(255, 0, 255)), [1.0, 0.0, 1.0]);
    }

    #[test]
    #[should_panic]
    fn empty_color_range() {
        ColorMapper::linear(1.0..=1.0);
    }

    #[test]
    fn wrong_extension() {
        let err = NeuralNetwork::load("hand_landmark.tflite").err().unwrap();
        assert!(err.to_string().contains(".onnx"), "{err}");
    }

    #[test]
    fn missing_file() {
        let err = NeuralNetwork::load("/nonexistent/palm_detection_full.onnx")
            .err()
            .unwrap();
        assert!(
            format!("{err:#}").contains("palm_detection_full.onnx"),
            "{err:#}"
        );
    }

    #[test]
    fn outputs_collect_in_order() {
        let outputs = [Tensor::from([1.0]), Tensor::from([2.0, 3.0])]
            .into_iter()
            .collect::<Outputs>();
        assert_eq!(outputs.len(), 2);
        assert!(!outputs.is_empty());
        assert_eq!(outputs[1].shape(), &[2]);
        assert_eq!(outputs.iter().map(|t| t.rank()).collect::<Vec<_>>(), [1, 1]);
    }
}
