//! Transition types shared by collection, training, and deployment.
//!
//! A transition is one `(prev_obs, action, obs)` triple captured from a
//! single environment instance at a single physics step. Batches flatten
//! their rows into contiguous `Vec<f32>` storage, row-major, matching the
//! layout produced by vectorized worlds.

use serde::{Deserialize, Serialize};

/// One captured step: previous observation, action, resulting observation.
///
/// All three vectors belong to the same environment instance at the same
/// step. `action` may be empty for action-free domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation before the physics step
    pub prev_obs: Vec<f32>,
    /// Action applied during the step (may be empty)
    pub action: Vec<f32>,
    /// Observation after the physics step
    pub obs: Vec<f32>,
}

impl Transition {
    /// Create a new transition.
    pub fn new(prev_obs: Vec<f32>, action: Vec<f32>, obs: Vec<f32>) -> Self {
        Self {
            prev_obs,
            action,
            obs,
        }
    }

    /// Total vector dimension: `2 * obs_dim + action_dim`.
    pub fn dim(&self) -> usize {
        self.prev_obs.len() + self.action.len() + self.obs.len()
    }

    /// Concatenate `[prev_obs | action | obs]` into one flat vector.
    ///
    /// This is the representation the translation model encodes.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.dim());
        flat.extend_from_slice(&self.prev_obs);
        flat.extend_from_slice(&self.action);
        flat.extend_from_slice(&self.obs);
        flat
    }
}

/// Batch of transitions with flattened column storage.
///
/// `prev_obs` holds `len * obs_dim` floats, `action` holds
/// `len * action_dim`, `obs` holds `len * obs_dim`, all row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// Flattened previous observations `[len * obs_dim]`
    pub prev_obs: Vec<f32>,
    /// Flattened actions `[len * action_dim]`
    pub action: Vec<f32>,
    /// Flattened observations `[len * obs_dim]`
    pub obs: Vec<f32>,
    /// Number of transitions in the batch
    pub len: usize,
}

impl TransitionBatch {
    /// Create an empty batch with pre-allocated capacity.
    pub fn with_capacity(capacity: usize, obs_dim: usize, action_dim: usize) -> Self {
        Self {
            prev_obs: Vec::with_capacity(capacity * obs_dim),
            action: Vec::with_capacity(capacity * action_dim),
            obs: Vec::with_capacity(capacity * obs_dim),
            len: 0,
        }
    }

    /// Append one transition's rows to the batch.
    pub fn push(&mut self, transition: &Transition) {
        self.prev_obs.extend_from_slice(&transition.prev_obs);
        self.action.extend_from_slice(&transition.action);
        self.obs.extend_from_slice(&transition.obs);
        self.len += 1;
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flatten into row-major `[len, 2 * obs_dim + action_dim]` model input:
    /// each row is `[prev_obs | action | obs]`.
    pub fn to_rows(&self, obs_dim: usize, action_dim: usize) -> Vec<f32> {
        let dim = 2 * obs_dim + action_dim;
        let mut rows = Vec::with_capacity(self.len * dim);
        for i in 0..self.len {
            rows.extend_from_slice(&self.prev_obs[i * obs_dim..(i + 1) * obs_dim]);
            rows.extend_from_slice(&self.action[i * action_dim..(i + 1) * action_dim]);
            rows.extend_from_slice(&self.obs[i * obs_dim..(i + 1) * obs_dim]);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_dim() {
        let t = Transition::new(vec![1.0, 2.0, 3.0], vec![0.5], vec![4.0, 5.0, 6.0]);
        assert_eq!(t.dim(), 7);
        assert_eq!(t.to_flat(), vec![1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_transition_empty_action() {
        let t = Transition::new(vec![1.0], vec![], vec![2.0]);
        assert_eq!(t.dim(), 2);
        assert_eq!(t.to_flat(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_batch_push_and_rows() {
        let mut batch = TransitionBatch::with_capacity(2, 2, 1);
        batch.push(&Transition::new(vec![1.0, 2.0], vec![9.0], vec![3.0, 4.0]));
        batch.push(&Transition::new(vec![5.0, 6.0], vec![8.0], vec![7.0, 0.0]));

        assert_eq!(batch.len, 2);
        assert_eq!(
            batch.to_rows(2, 1),
            vec![1.0, 2.0, 9.0, 3.0, 4.0, 5.0, 6.0, 8.0, 7.0, 0.0]
        );
    }

    #[test]
    fn test_batch_rows_action_free() {
        let mut batch = TransitionBatch::with_capacity(1, 3, 0);
        batch.push(&Transition::new(
            vec![1.0, 2.0, 3.0],
            vec![],
            vec![4.0, 5.0, 6.0],
        ));
        assert_eq!(batch.to_rows(3, 0), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
