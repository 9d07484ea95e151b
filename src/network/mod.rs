/*!
The named DAG of layers: build from a list of [`layer::LayerNodeSpec`], evaluate in
topological order, and train with TD(λ) eligibility traces. Layers are addressed by name in an
arena (`HashMap`), so a later layer's `inputs` is a lookup rather than an owning reference.
*/

pub mod layer;

use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::tensor::Tensor2;
use layer::{DenseParams, Layer, LayerNodeSpec, LayerSpec, LayerState};

#[derive(Debug)]
pub struct Network {
    /// Node names in topological (forward-evaluation) order.
    order: Vec<String>,
    inputs_of: HashMap<String, Vec<String>>,
    layers: HashMap<String, Layer>,
    states: HashMap<String, LayerState>,
}

impl Network {
    /// Build the DAG, initializing any `dense`/`linear` layer whose weights were not given
    /// explicitly with small values derived from `seed` (xavier-ish fan-in scaling).
    pub fn build(nodes: &[LayerNodeSpec], seed: u64) -> WheellyResult<Self> {
        let mut inputs_of = HashMap::new();
        let mut layers = HashMap::new();
        let mut indegree: HashMap<String, usize> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut declared: HashSet<String> = HashSet::new();

        for node in nodes {
            if !declared.insert(node.name.clone()) {
                return Err(WheellyError::new(
                    WheellyErrorKind::NetworkShapeMismatch,
                    format!("duplicate layer name '{}'", node.name),
                ));
            }
        }

        for (idx, node) in nodes.iter().enumerate() {
            let layer = instantiate(&node.layer, seed.wrapping_add(idx as u64))?;
            layers.insert(node.name.clone(), layer);
            inputs_of.insert(node.name.clone(), node.inputs.clone());
            indegree.insert(node.name.clone(), 0);
        }
        for node in nodes {
            for input in &node.inputs {
                if declared.contains(input) {
                    dependents.entry(input.clone()).or_default().push(node.name.clone());
                    *indegree.get_mut(&node.name).unwrap() += 1;
                }
                // names not in `declared` are external network inputs, fed at forward time.
            }
        }

        let mut queue: VecDeque<String> = indegree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(n, _)| n.clone())
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.clone());
            if let Some(deps) = dependents.get(&name) {
                for dep in deps {
                    let d = indegree.get_mut(dep).unwrap();
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }
        if order.len() != nodes.len() {
            return Err(WheellyError::new(
                WheellyErrorKind::NetworkShapeMismatch,
                "layer graph has a cycle",
            ));
        }

        Ok(Self { order, inputs_of, layers, states: HashMap::new() })
    }

    pub fn output_names(&self) -> &[String] {
        &self.order
    }

    /// Evaluate every layer in topological order. `external_inputs` supplies the tensors for
    /// names that are referenced as an input but never produced by a layer (e.g. `"state"`).
    pub fn forward(&mut self, external_inputs: &HashMap<String, Tensor2>) -> WheellyResult<HashMap<String, Tensor2>> {
        let mut outputs: HashMap<String, Tensor2> = HashMap::new();
        for name in self.order.clone() {
            let input_names = self.inputs_of[&name].clone();
            let mut inputs = Vec::with_capacity(input_names.len());
            for input_name in &input_names {
                let tensor = outputs
                    .get(input_name)
                    .or_else(|| external_inputs.get(input_name))
                    .ok_or_else(|| {
                        WheellyError::new(
                            WheellyErrorKind::NetworkShapeMismatch,
                            format!("layer '{name}' references unknown input '{input_name}'"),
                        )
                    })?
                    .clone();
                inputs.push(tensor);
            }
            let layer = self.layers.get(&name).unwrap();
            let output = forward_layer(layer, &inputs, &name)?;
            self.states.insert(name.clone(), LayerState { last_inputs: inputs, last_output: output.clone() });
            outputs.insert(name, output);
        }
        Ok(outputs)
    }

    /// Backward pass: `output_grads` seeds `∂L/∂y` at the named output layers, `delta` is the
    /// scalar TD error shared by every trainable layer's update this step.
    pub fn backward(
        &mut self,
        output_grads: &HashMap<String, Tensor2>,
        delta: f32,
        lambda: f32,
        alphas: &HashMap<String, f32>,
    ) -> WheellyResult<()> {
        let mut grads: HashMap<String, Tensor2> = output_grads.clone();
        for name in self.order.iter().rev() {
            let Some(dy) = grads.remove(name) else { continue };
            let state = self.states.get(name).cloned().ok_or_else(|| {
                WheellyError::new(
                    WheellyErrorKind::ImplementationError,
                    format!("backward before forward for layer '{name}'"),
                )
            })?;
            let layer = self.layers.get_mut(name).unwrap();
            let alpha = alphas.get(name).copied().unwrap_or(0.);
            let dxs = backward_layer(layer, &state, &dy, delta, lambda, alpha)?;
            let input_names = &self.inputs_of[name];
            for (input_name, dx) in input_names.iter().zip(dxs) {
                grads
                    .entry(input_name.clone())
                    .and_modify(|acc| *acc = acc.add(&dx).unwrap_or_else(|_| dx.clone()))
                    .or_insert(dx);
            }
        }
        Ok(())
    }

    pub fn reset_traces(&mut self) {
        for layer in self.layers.values_mut() {
            match layer {
                Layer::Dense(p) => p.reset_traces(),
                Layer::Linear(p) => p.reset_traces(),
                _ => {}
            }
        }
    }

    pub fn has_non_finite_params(&self) -> bool {
        self.layers.values().any(|l| match l {
            Layer::Dense(p) => p.w.has_non_finite() || p.b.has_non_finite(),
            Layer::Linear(p) => !p.w.is_finite() || !p.b.is_finite(),
            _ => false,
        })
    }

    /// Every trainable parameter array, named `"<layer>.W"` / `"<layer>.b"`, for persistence.
    pub fn export_params(&self) -> Vec<(String, Tensor2)> {
        let mut out = Vec::new();
        for name in &self.order {
            match &self.layers[name] {
                Layer::Dense(p) => {
                    out.push((format!("{name}.W"), p.w.clone()));
                    out.push((format!("{name}.b"), p.b.clone()));
                }
                Layer::Linear(p) => {
                    out.push((format!("{name}.W"), Tensor2::row_vector(&[p.w])));
                    out.push((format!("{name}.b"), Tensor2::row_vector(&[p.b])));
                }
                _ => {}
            }
        }
        out
    }

    /// Overwrite trainable parameters from a persisted record set. Unknown names are ignored
    /// (a newer spec with fewer layers than a stale `agent.bin` should still load).
    pub fn import_params(&mut self, params: &HashMap<String, Tensor2>) -> WheellyResult<()> {
        for name in self.order.clone() {
            let layer = self.layers.get_mut(&name).unwrap();
            match layer {
                Layer::Dense(p) => {
                    if let Some(w) = params.get(&format!("{name}.W")) {
                        p.w = w.clone();
                    }
                    if let Some(b) = params.get(&format!("{name}.b")) {
                        p.b = b.clone();
                    }
                }
                Layer::Linear(p) => {
                    if let Some(w) = params.get(&format!("{name}.W")) {
                        p.w = w.as_slice()[0];
                    }
                    if let Some(b) = params.get(&format!("{name}.b")) {
                        p.b = b.as_slice()[0];
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn instantiate(spec: &LayerSpec, seed: u64) -> WheellyResult<Layer> {
    use crate::tensor::rng::DeterministicRng;
    let rng = DeterministicRng::new(seed);
    Ok(match spec {
        LayerSpec::Dense { input_size, output_size, w, b } => {
            let w = match w {
                Some(rows) => Tensor2::from_rows(rows.clone())?,
                None => {
                    let scale = (1. / *input_size as f32).sqrt();
                    let mut t = Tensor2::zeros(*input_size, *output_size);
                    for (i, v) in t.as_mut_slice().iter_mut().enumerate() {
                        *v = rng.uniform(i as u64, -scale, scale);
                    }
                    t
                }
            };
            let b = match b {
                Some(values) => Tensor2::row_vector(values),
                None => Tensor2::zeros(1, *output_size),
            };
            if w.rows() != *input_size || w.cols() != *output_size || b.cols() != *output_size {
                return Err(WheellyError::new(
                    WheellyErrorKind::NetworkShapeMismatch,
                    format!(
                        "dense layer: declared {input_size}x{output_size}, got W {:?} b {:?}",
                        w.shape(),
                        b.shape()
                    ),
                ));
            }
            Layer::Dense(DenseParams::new(*input_size, *output_size, w, b))
        }
        LayerSpec::Tanh => Layer::Tanh,
        LayerSpec::Relu => Layer::Relu,
        LayerSpec::Linear { w, b } => Layer::Linear(layer::LinearParams::new(*w, *b)),
        LayerSpec::Softmax { temperature } => Layer::Softmax { temperature: *temperature },
        LayerSpec::Sum => Layer::Sum,
        LayerSpec::Concat => Layer::Concat,
    })
}

fn forward_layer(layer: &Layer, inputs: &[Tensor2], name: &str) -> WheellyResult<Tensor2> {
    let shape_err = |msg: &str| {
        WheellyError::new(
            WheellyErrorKind::NetworkShapeMismatch,
            format!("layer '{name}': {msg}"),
        )
    };
    match layer {
        Layer::Dense(p) => {
            let x = inputs.first().ok_or_else(|| shape_err("dense needs 1 input"))?;
            x.matmul(&p.w)?.add_row_broadcast(&p.b)
        }
        Layer::Tanh => Ok(inputs.first().ok_or_else(|| shape_err("tanh needs 1 input"))?.tanh()),
        Layer::Relu => Ok(inputs.first().ok_or_else(|| shape_err("relu needs 1 input"))?.relu()),
        Layer::Linear(p) => {
            let x = inputs.first().ok_or_else(|| shape_err("linear needs 1 input"))?;
            Ok(x.scale(p.w).add_scalar(p.b))
        }
        Layer::Softmax { temperature } => {
            let x = inputs.first().ok_or_else(|| shape_err("softmax needs 1 input"))?;
            Ok(x.softmax_rows(*temperature))
        }
        Layer::Sum => {
            if inputs.len() != 2 {
                return Err(shape_err("sum needs 2 inputs"));
            }
            inputs[0].add(&inputs[1])
        }
        Layer::Concat => {
            if inputs.len() != 2 {
                return Err(shape_err("concat needs 2 inputs"));
            }
            inputs[0].concat_cols(&inputs[1])
        }
    }
}

fn backward_layer(
    layer: &mut Layer,
    state: &LayerState,
    dy: &Tensor2,
    delta: f32,
    lambda: f32,
    alpha: f32,
) -> WheellyResult<Vec<Tensor2>> {
    match layer {
        Layer::Dense(p) => {
            let x = &state.last_inputs[0];
            let dw = x.transpose().matmul(dy)?;
            let db = dy.sum_cols_into_row();
            p.trace_w = p.trace_w.scale(lambda).add(&dw)?;
            p.trace_b = p.trace_b.scale(lambda).add(&db)?;
            let dx = dy.matmul(&p.w.transpose())?;
            p.w = p.w.add(&p.trace_w.scale(alpha * delta))?;
            p.b = p.b.add(&p.trace_b.scale(alpha * delta))?;
            Ok(vec![dx])
        }
        Layer::Tanh => {
            let grad = state.last_output.tanh_grad_from_output();
            Ok(vec![dy.mul_elementwise(&grad)?])
        }
        Layer::Relu => {
            let grad = state.last_inputs[0].relu_grad_from_input();
            Ok(vec![dy.mul_elementwise(&grad)?])
        }
        Layer::Linear(p) => {
            let x = &state.last_inputs[0];
            let dw = dy.mul_elementwise(x)?.sum_all();
            let db = dy.sum_all();
            p.trace_w = lambda * p.trace_w + dw;
            p.trace_b = lambda * p.trace_b + db;
            let dx = dy.scale(p.w);
            p.w += alpha * delta * p.trace_w;
            p.b += alpha * delta * p.trace_b;
            Ok(vec![dx])
        }
        Layer::Softmax { temperature } => {
            let y = &state.last_output;
            let dot = dy.mul_elementwise(y)?.sum_all();
            let mut dx = Tensor2::zeros(y.rows(), y.cols());
            for r in 0..y.rows() {
                for c in 0..y.cols() {
                    let v = y.get(r, c) / *temperature * (dy.get(r, c) - dot);
                    dx.set(r, c, v);
                }
            }
            Ok(vec![dx])
        }
        Layer::Sum => Ok(vec![dy.clone(), dy.clone()]),
        Layer::Concat => {
            let left_cols = state.last_inputs[0].cols();
            let (left, right) = dy.split_cols(left_cols)?;
            Ok(vec![left, right])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer::LayerNodeSpec;

    fn dense_node(name: &str, inputs: Vec<&str>, input_size: usize, output_size: usize) -> LayerNodeSpec {
        LayerNodeSpec {
            name: name.to_string(),
            inputs: inputs.into_iter().map(String::from).collect(),
            layer: LayerSpec::Dense { input_size, output_size, w: None, b: None },
        }
    }

    #[test]
    fn forward_evaluates_in_topological_order() {
        let nodes = vec![
            dense_node("hidden", vec!["state"], 2, 3),
            LayerNodeSpec {
                name: "act".into(),
                inputs: vec!["hidden".into()],
                layer: LayerSpec::Tanh,
            },
        ];
        let mut net = Network::build(&nodes, 1).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("state".to_string(), Tensor2::row_vector(&[1., 2.]));
        let out = net.forward(&inputs).unwrap();
        assert_eq!(out["act"].shape(), (1, 3));
    }

    #[test]
    fn cyclic_graph_is_rejected() {
        let nodes = vec![
            LayerNodeSpec { name: "a".into(), inputs: vec!["b".into()], layer: LayerSpec::Relu },
            LayerNodeSpec { name: "b".into(), inputs: vec!["a".into()], layer: LayerSpec::Relu },
        ];
        let err = Network::build(&nodes, 1).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::NetworkShapeMismatch);
    }

    #[test]
    fn dense_backward_updates_weights_towards_delta_sign() {
        let nodes = vec![dense_node("out", vec!["state"], 1, 1)];
        let mut net = Network::build(&nodes, 1).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("state".to_string(), Tensor2::row_vector(&[1.]));
        net.forward(&inputs).unwrap();
        let w_before = net.export_params()[0].1.clone();
        let mut grads = HashMap::new();
        grads.insert("out".to_string(), Tensor2::row_vector(&[1.]));
        let mut alphas = HashMap::new();
        alphas.insert("out".to_string(), 0.1);
        net.backward(&grads, 1.0, 0.9, &alphas).unwrap();
        let w_after = net.export_params()[0].1.clone();
        assert!(w_after.as_slice()[0] > w_before.as_slice()[0]);
    }
}
