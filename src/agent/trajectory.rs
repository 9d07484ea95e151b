/*!
The trajectory buffer `observe` accumulates into: each step is `(observation, action_masks,
reward, next_observation)`, gathered up to `numSteps` before a training batch runs and the buffer
is cleared.
*/

use std::collections::HashMap;

use crate::tensor::Tensor2;

/// One step recorded by `observe`. `action_masks` is one one-hot row per action head, keyed by
/// head name, matching the shape of that head's policy output.
#[derive(Debug, Clone)]
pub struct TrajectoryStep {
    pub observation: Tensor2,
    pub action_masks: HashMap<String, Tensor2>,
    pub reward: f32,
    pub next_observation: Tensor2,
}

/// A fixed-capacity ring that the agent drains once it holds `numSteps` entries.
#[derive(Debug, Default)]
pub struct Trajectory {
    capacity: usize,
    steps: Vec<TrajectoryStep>,
}

impl Trajectory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, steps: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, step: TrajectoryStep) {
        self.steps.push(step);
    }

    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[TrajectoryStep] {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(reward: f32) -> TrajectoryStep {
        TrajectoryStep {
            observation: Tensor2::row_vector(&[0.]),
            action_masks: HashMap::new(),
            reward,
            next_observation: Tensor2::row_vector(&[0.]),
        }
    }

    #[test]
    fn fills_up_to_capacity() {
        let mut trajectory = Trajectory::new(2);
        assert!(!trajectory.is_full());
        trajectory.push(step(1.));
        assert!(!trajectory.is_full());
        trajectory.push(step(2.));
        assert!(trajectory.is_full());
        assert_eq!(trajectory.len(), 2);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut trajectory = Trajectory::new(1);
        trajectory.push(step(1.));
        trajectory.clear();
        assert!(trajectory.is_empty());
    }
}
