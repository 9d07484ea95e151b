/*!
The TD(λ) actor-critic learner: wraps a [`Network`] with a trajectory buffer, a running
`avgReward` baseline, and the policy-gradient training loop. `act`/`observe` are the only two
operations the controller loop calls; everything else (mini-batching, eligibility traces,
autosave) happens inside `observe` once a trajectory fills up.
*/

pub mod persistence;
pub mod trajectory;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Validate;
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::kpi::{KpiRecord, Router};
use crate::network::layer::LayerNodeSpec;
use crate::network::Network;
use crate::tensor::rng::DeterministicRng;
use crate::tensor::Tensor2;
use persistence::ModelStore;
use trajectory::{Trajectory, TrajectoryStep};

/// A categorical action head's declared width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionHeadSpec {
    #[serde(rename = "numValues")]
    pub num_values: usize,
}

/// One step of the optional input-processing pipeline applied to a raw observation before it
/// reaches the network: rescaling and clipping a sensor reading into a network-friendly range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputProcessorStep {
    #[serde(rename = "scale")]
    Scale { factor: f32 },
    #[serde(rename = "offset")]
    Offset { value: f32 },
    #[serde(rename = "clip")]
    Clip { min: f32, max: f32 },
}

impl InputProcessorStep {
    fn apply(&self, input: &Tensor2) -> Tensor2 {
        match self {
            Self::Scale { factor } => input.scale(*factor),
            Self::Offset { value } => input.add_scalar(*value),
            Self::Clip { min, max } => {
                let mut out = input.clone();
                for v in out.as_mut_slice() {
                    *v = v.clamp(*min, *max);
                }
                out
            }
        }
    }
}

/// The `agent.yml` spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Dimensionality of the raw observation vector fed to the `"state"` network input.
    pub state: usize,
    pub actions: HashMap<String, ActionHeadSpec>,
    #[serde(rename = "rewardAlpha")]
    pub reward_alpha: f32,
    pub alphas: HashMap<String, f32>,
    pub lambda: f32,
    #[serde(rename = "numSteps")]
    pub num_steps: usize,
    #[serde(rename = "numEpochs")]
    pub num_epochs: usize,
    #[serde(rename = "batchSize")]
    pub batch_size: usize,
    #[serde(rename = "inputProcess")]
    pub input_process: Vec<InputProcessorStep>,
    pub network: Vec<LayerNodeSpec>,
    #[serde(rename = "modelPath")]
    pub model_path: String,
    #[serde(rename = "savingIntervalSteps")]
    pub saving_interval_steps: u64,
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state: 0,
            actions: HashMap::new(),
            reward_alpha: 0.1,
            alphas: HashMap::new(),
            lambda: 0.9,
            num_steps: 32,
            num_epochs: 1,
            batch_size: 32,
            input_process: Vec::new(),
            network: Vec::new(),
            model_path: "model".to_string(),
            saving_interval_steps: 1,
            seed: 0,
        }
    }
}

impl Validate for AgentConfig {
    fn validate(&self) -> WheellyResult<()> {
        let bad = |msg: &str| Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, msg.to_string()));
        if self.network.is_empty() {
            return bad("agent config has no network layers");
        }
        if self.actions.is_empty() {
            return bad("agent config declares no action heads");
        }
        if self.num_steps == 0 || self.batch_size == 0 || self.num_epochs == 0 {
            return bad("numSteps, batchSize and numEpochs must all be > 0");
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return bad("lambda must be within [0, 1]");
        }
        if !self.alphas.contains_key("critic") {
            return bad("alphas must include a 'critic' entry");
        }
        Ok(())
    }
}

/// The name of the network's external state input.
const STATE_INPUT: &str = "state";
const CRITIC_OUTPUT: &str = "critic";

/// `(observation, action_masks, reward, next_observation) -> ActionChoice` wired through a
/// trainable [`Network`].
pub struct TdAgent {
    config: AgentConfig,
    network: Network,
    trajectory: Trajectory,
    avg_reward: f32,
    rng: DeterministicRng,
    step_counter: u64,
    saving_step_counter: u64,
    store: ModelStore,
}

impl TdAgent {
    pub fn new(config: AgentConfig) -> WheellyResult<Self> {
        config.validate()?;
        let mut network = Network::build(&config.network, config.seed)?;
        let store = ModelStore::new(&PathBuf::from(&config.model_path));
        let mut avg_reward = 0.;
        if let Some(params) = store.load()? {
            if let Some(reward) = params.get("avgReward") {
                avg_reward = reward.as_slice()[0];
            }
            network.import_params(&params)?;
        }
        let trajectory = Trajectory::new(config.num_steps);
        let rng = DeterministicRng::new(config.seed);
        Ok(Self { config, network, trajectory, avg_reward, rng, step_counter: 0, saving_step_counter: 0, store })
    }

    pub fn avg_reward(&self) -> f32 {
        self.avg_reward
    }

    fn process_observation(&self, observation: &Tensor2) -> Tensor2 {
        self.config.input_process.iter().fold(observation.clone(), |acc, step| step.apply(&acc))
    }

    /// `act(state)`: forward pass, then one categorical draw per action head.
    pub fn act(&mut self, observation: &Tensor2) -> WheellyResult<HashMap<String, usize>> {
        let processed = self.process_observation(observation);
        let mut inputs = HashMap::new();
        inputs.insert(STATE_INPUT.to_string(), processed);
        let outputs = self.network.forward(&inputs)?;

        let mut choice = HashMap::new();
        for (name, _spec) in &self.config.actions {
            let probs = outputs.get(name).ok_or_else(|| {
                WheellyError::new(WheellyErrorKind::NetworkShapeMismatch, format!("action head '{name}' has no matching network output"))
            })?;
            let idx = self.rng.categorical(self.step_counter, probs.row(0));
            choice.insert(name.clone(), idx);
        }
        self.step_counter += 1;
        Ok(choice)
    }

    /// `observe(result)`: append the step; train and autosave once the trajectory reaches
    /// `numSteps`.
    pub fn observe(&mut self, step: TrajectoryStep, kpis: &mut Router) -> WheellyResult<()> {
        self.trajectory.push(step);
        if self.trajectory.is_full() {
            self.train(kpis)?;
            self.trajectory.clear();
        }
        Ok(())
    }

    fn train(&mut self, kpis: &mut Router) -> WheellyResult<()> {
        for _epoch in 0..self.config.num_epochs {
            let steps = self.trajectory.steps().to_vec();
            for batch in steps.chunks(self.config.batch_size) {
                self.train_mini_batch(batch, kpis)?;
            }
            self.saving_step_counter += 1;
            if self.saving_step_counter >= self.config.saving_interval_steps {
                self.saving_step_counter = 0;
                self.save()?;
            }
        }
        Ok(())
    }

    fn forward_state(&mut self, observation: &Tensor2) -> WheellyResult<HashMap<String, Tensor2>> {
        let processed = self.process_observation(observation);
        let mut inputs = HashMap::new();
        inputs.insert(STATE_INPUT.to_string(), processed);
        self.network.forward(&inputs)
    }

    /// One mini-batch of the training step: critic values and policy probabilities are gathered
    /// from a first forward-only pass (the weights these reflect are the ones `δ` and the policy
    /// gradient coefficients are computed against); the second pass re-forwards each step
    /// immediately before its own backward call, so each layer's cached `(inputs, output)`
    /// matches the step being trained.
    fn train_mini_batch(&mut self, batch: &[TrajectoryStep], kpis: &mut Router) -> WheellyResult<()> {
        let n = batch.len();
        if n == 0 {
            return Ok(());
        }

        let mut values = Vec::with_capacity(n + 1);
        let mut probs: Vec<HashMap<String, Tensor2>> = Vec::with_capacity(n);
        for step in batch {
            let outputs = self.forward_state(&step.observation)?;
            values.push(Self::critic_value(&outputs)?);
            let mut head_probs = HashMap::new();
            for name in self.config.actions.keys() {
                let out = outputs.get(name).ok_or_else(|| {
                    WheellyError::new(WheellyErrorKind::NetworkShapeMismatch, format!("action head '{name}' missing from network output"))
                })?;
                head_probs.insert(name.clone(), out.clone());
            }
            probs.push(head_probs);
        }
        let bootstrap_outputs = self.forward_state(&batch[n - 1].next_observation)?;
        values.push(Self::critic_value(&bootstrap_outputs)?);

        let mut deltas = Vec::with_capacity(n);
        for i in 0..n {
            let delta = batch[i].reward - self.avg_reward + values[i + 1] - values[i];
            self.avg_reward += self.config.reward_alpha * delta;
            deltas.push(delta);
        }

        let critic_alpha = *self.config.alphas.get(CRITIC_OUTPUT).unwrap_or(&0.);
        for i in 0..n {
            self.forward_state(&batch[i].observation)?;

            let mut output_grads = HashMap::new();
            output_grads.insert(CRITIC_OUTPUT.to_string(), Tensor2::row_vector(&[critic_alpha]));
            for (name, spec) in &self.config.actions {
                let pi = &probs[i][name];
                let mask = batch[i].action_masks.get(name).ok_or_else(|| {
                    WheellyError::new(WheellyErrorKind::ImplementationError, format!("trajectory step is missing an action mask for '{name}'"))
                })?;
                let alpha = *self.config.alphas.get(name).unwrap_or(&0.);
                let mut grad = Tensor2::zeros(1, spec.num_values);
                for c in 0..spec.num_values {
                    let p = pi.get(0, c).max(1e-6);
                    grad.set(0, c, (mask.get(0, c) / p) * alpha);
                }
                output_grads.insert(name.clone(), grad);
            }

            self.network.backward(&output_grads, deltas[i], self.config.lambda, &self.config.alphas)?;
            if self.network.has_non_finite_params() {
                return Err(WheellyError::new(
                    WheellyErrorKind::TrainNumericFailure,
                    format!("non-finite parameter after training step {}", self.step_counter),
                ));
            }

            kpis.emit(&KpiRecord { label: "delta".into(), step: self.step_counter, values: vec![deltas[i]] })?;
            kpis.emit(&KpiRecord { label: "avgReward".into(), step: self.step_counter, values: vec![self.avg_reward] })?;
            self.step_counter += 1;
        }
        Ok(())
    }

    fn critic_value(outputs: &HashMap<String, Tensor2>) -> WheellyResult<f32> {
        outputs
            .get(CRITIC_OUTPUT)
            .map(|t| t.get(0, 0))
            .ok_or_else(|| WheellyError::new(WheellyErrorKind::NetworkShapeMismatch, "network has no 'critic' output"))
    }

    /// Back up the prior `agent.bin` once per run, then persist the current weights.
    pub fn save(&mut self) -> WheellyResult<()> {
        let params = self.network.export_params();
        let timestamp = persistence::backup_timestamp();
        self.store.save(&params, self.avg_reward, &timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::layer::LayerSpec;

    fn test_config(model_path: &std::path::Path) -> AgentConfig {
        let mut actions = HashMap::new();
        actions.insert("direction".to_string(), ActionHeadSpec { num_values: 3 });
        let mut alphas = HashMap::new();
        alphas.insert("critic".to_string(), 0.1);
        alphas.insert("direction".to_string(), 0.1);
        alphas.insert("hidden".to_string(), 0.05);

        let network = vec![
            LayerNodeSpec {
                name: "hidden".into(),
                inputs: vec!["state".into()],
                layer: LayerSpec::Dense { input_size: 2, output_size: 4, w: None, b: None },
            },
            LayerNodeSpec { name: "hidden_act".into(), inputs: vec!["hidden".into()], layer: LayerSpec::Tanh },
            LayerNodeSpec {
                name: "direction_logits".into(),
                inputs: vec!["hidden_act".into()],
                layer: LayerSpec::Dense { input_size: 4, output_size: 3, w: None, b: None },
            },
            LayerNodeSpec { name: "direction".into(), inputs: vec!["direction_logits".into()], layer: LayerSpec::Softmax { temperature: 1. } },
            LayerNodeSpec { name: "critic".into(), inputs: vec!["hidden_act".into()], layer: LayerSpec::Dense { input_size: 4, output_size: 1, w: None, b: None } },
        ];

        AgentConfig {
            state: 2,
            actions,
            reward_alpha: 0.1,
            alphas,
            lambda: 0.9,
            num_steps: 2,
            num_epochs: 1,
            batch_size: 2,
            input_process: Vec::new(),
            network,
            model_path: model_path.to_string_lossy().to_string(),
            saving_interval_steps: 1,
            seed: 1,
        }
    }

    fn mask(num_values: usize, chosen: usize) -> Tensor2 {
        let mut t = Tensor2::zeros(1, num_values);
        t.set(0, chosen, 1.);
        t
    }

    #[test]
    fn act_returns_one_choice_per_action_head() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = TdAgent::new(test_config(dir.path())).unwrap();
        let obs = Tensor2::row_vector(&[0.1, -0.2]);
        let choice = agent.act(&obs).unwrap();
        assert!(choice["direction"] < 3);
    }

    #[test]
    fn observe_trains_and_resets_once_trajectory_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = TdAgent::new(test_config(dir.path())).unwrap();
        let mut kpis = Router::new(crate::kpi::LabelFilter::All, Vec::new());
        for _ in 0..2 {
            let mut masks = HashMap::new();
            masks.insert("direction".to_string(), mask(3, 0));
            let step = TrajectoryStep {
                observation: Tensor2::row_vector(&[0.1, 0.2]),
                action_masks: masks,
                reward: 1.,
                next_observation: Tensor2::row_vector(&[0.1, 0.2]),
            };
            agent.observe(step, &mut kpis).unwrap();
        }
        assert!(agent.trajectory.is_empty());
    }

    #[test]
    fn avg_reward_tracks_the_running_baseline_recurrence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.num_steps = 1;
        config.batch_size = 1;
        let mut agent = TdAgent::new(config).unwrap();
        let mut kpis = Router::new(crate::kpi::LabelFilter::All, Vec::new());
        agent.avg_reward = 0.;
        for _ in 0..3 {
            let mut masks = HashMap::new();
            masks.insert("direction".to_string(), mask(3, 0));
            let step = TrajectoryStep {
                observation: Tensor2::row_vector(&[0., 0.]),
                action_masks: masks,
                reward: 1.,
                next_observation: Tensor2::row_vector(&[0., 0.]),
            };
            agent.observe(step, &mut kpis).unwrap();
        }
        // three positive rewards with the critic near zero should push avgReward up from zero.
        assert!(agent.avg_reward > 0.);
    }
}
