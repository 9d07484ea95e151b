/*!
The seven layer kinds, as a tagged variant rather than a trait object.
[`wheelly_macros::EnumToString`] gives each kind a bare-name `Display`, the same way it is used
for the error-kind enum.
*/

use serde::{Deserialize, Serialize};
use wheelly_macros::EnumToString;

use crate::tensor::Tensor2;

/// Per-step state a layer carries between a forward pass and the backward pass that follows it.
#[derive(Debug, Clone)]
pub struct LayerState {
    pub last_inputs: Vec<Tensor2>,
    pub last_output: Tensor2,
}

/// Trainable parameters plus their eligibility traces, for the two kinds that have weights.
#[derive(Debug, Clone)]
pub struct DenseParams {
    pub w: Tensor2,
    pub b: Tensor2,
    pub trace_w: Tensor2,
    pub trace_b: Tensor2,
}

impl DenseParams {
    pub fn new(input_size: usize, output_size: usize, w: Tensor2, b: Tensor2) -> Self {
        Self {
            w,
            b,
            trace_w: Tensor2::zeros(input_size, output_size),
            trace_b: Tensor2::zeros(1, output_size),
        }
    }

    pub fn reset_traces(&mut self) {
        self.trace_w = Tensor2::zeros(self.trace_w.rows(), self.trace_w.cols());
        self.trace_b = Tensor2::zeros(self.trace_b.rows(), self.trace_b.cols());
    }
}

#[derive(Debug, Clone)]
pub struct LinearParams {
    pub w: f32,
    pub b: f32,
    pub trace_w: f32,
    pub trace_b: f32,
}

impl LinearParams {
    pub fn new(w: f32, b: f32) -> Self {
        Self { w, b, trace_w: 0., trace_b: 0. }
    }

    pub fn reset_traces(&mut self) {
        self.trace_w = 0.;
        self.trace_b = 0.;
    }
}

/// One node of the DAG: a name, its declared input names (ordering matters for `sum`/`concat`
/// and for `dense`'s single input), and the tagged layer kind.
#[derive(Debug, Clone, EnumToString)]
pub enum Layer {
    Dense(DenseParams),
    Tanh,
    Relu,
    Linear(LinearParams),
    Softmax { temperature: f32 },
    Sum,
    Concat,
}

/// The structured-config shape a [`Layer`] is parsed from; weight arrays are either given
/// explicitly (for a reloaded model) or left `None` to be randomly initialized at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerSpec {
    #[serde(rename = "dense")]
    Dense {
        #[serde(rename = "inputSize")]
        input_size: usize,
        #[serde(rename = "outputSize")]
        output_size: usize,
        #[serde(default)]
        w: Option<Vec<Vec<f32>>>,
        #[serde(default)]
        b: Option<Vec<f32>>,
    },
    #[serde(rename = "tanh")]
    Tanh,
    #[serde(rename = "relu")]
    Relu,
    #[serde(rename = "linear")]
    Linear {
        #[serde(default)]
        w: f32,
        #[serde(default)]
        b: f32,
    },
    #[serde(rename = "softmax")]
    Softmax { temperature: f32 },
    #[serde(rename = "sum")]
    Sum,
    #[serde(rename = "concat")]
    Concat,
}

/// One named node of the network spec: a type tag plus ordered input names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNodeSpec {
    pub name: String,
    #[serde(rename = "inputs", default)]
    pub inputs: Vec<String>,
    #[serde(flatten)]
    pub layer: LayerSpec,
}
