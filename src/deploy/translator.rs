//! Deployment-side translation: a frozen model plus the checkpoint
//! metadata that names its two domains.

use std::fmt;
use std::path::Path;

use burn::prelude::*;

use crate::data::DomainSpec;
use crate::model::TranslationModel;
use crate::train::checkpoint::{load_latest_checkpoint, CheckpointError, CheckpointMetadata};

/// Errors from a translation request.
#[derive(Debug)]
pub enum TranslateError {
    /// The requested domain name is not one of the two the model was
    /// trained on.
    UnknownDomain {
        requested: String,
        known: [String; 2],
    },
    /// An input slice does not match the source domain's dimensions.
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::UnknownDomain { requested, known } => write!(
                f,
                "Unknown domain '{}', model translates between '{}' and '{}'",
                requested, known[0], known[1]
            ),
            TranslateError::DimensionMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "Dimension mismatch for {}: expected a multiple of {}, got {} values",
                field, expected, found
            ),
        }
    }
}

impl std::error::Error for TranslateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// Inference-only wrapper around a trained [`TranslationModel`].
///
/// Domains are addressed by the names recorded at training time, so
/// call sites never need to know which side of the model a world landed
/// on. Translation is pure: no parameter updates, no internal state.
pub struct WorldTranslator<B: Backend> {
    model: TranslationModel<B>,
    metadata: CheckpointMetadata,
    device: B::Device,
}

impl<B: Backend> WorldTranslator<B> {
    /// Wrap a trained model and the metadata it was published with.
    pub fn new(model: TranslationModel<B>, metadata: CheckpointMetadata, device: B::Device) -> Self {
        Self {
            model,
            metadata,
            device,
        }
    }

    /// Load the most recent valid checkpoint from `checkpoint_dir`.
    pub fn from_checkpoint_dir(
        checkpoint_dir: impl AsRef<Path>,
        device: B::Device,
    ) -> Result<Self, CheckpointError> {
        let (model, metadata) = load_latest_checkpoint::<B>(checkpoint_dir, &device)?;
        Ok(Self::new(model, metadata, device))
    }

    /// Metadata of the checkpoint backing this translator.
    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    /// Translate a batch of transitions between domains.
    ///
    /// Inputs are flattened row-major over environments: `prev_obs` and
    /// `obs` hold `n_envs * obs_dim` values for the source domain,
    /// `action` holds `n_envs * action_dim`. Returns the translated
    /// observation component only, `n_envs * obs_dim` values in the
    /// target domain. `from == to` is allowed and runs the domain's
    /// autoencoding path.
    pub fn translate(
        &self,
        from: &str,
        to: &str,
        prev_obs: &[f32],
        action: &[f32],
        obs: &[f32],
    ) -> Result<Vec<f32>, TranslateError> {
        let from_side = self.resolve(from)?;
        let to_side = self.resolve(to)?;
        let spec_from = self.spec(from_side);
        let spec_to = self.spec(to_side);

        let n_envs = self.check_inputs(spec_from, prev_obs, action, obs)?;
        let o = spec_from.obs_dim;
        let a = spec_from.action_dim;
        let dim_from = spec_from.transition_dim();

        let mut rows = Vec::with_capacity(n_envs * dim_from);
        for env in 0..n_envs {
            rows.extend_from_slice(&prev_obs[env * o..(env + 1) * o]);
            rows.extend_from_slice(&action[env * a..(env + 1) * a]);
            rows.extend_from_slice(&obs[env * o..(env + 1) * o]);
        }

        let input = Tensor::<B, 1>::from_floats(rows.as_slice(), &self.device)
            .reshape([n_envs, dim_from]);
        let latent = match from_side {
            Side::A => self.model.encode_a(input),
            Side::B => self.model.encode_b(input),
        };
        let output = match to_side {
            Side::A => self.model.decode_a(latent),
            Side::B => self.model.decode_b(latent),
        };

        // The decoder emits a full transition vector; only the trailing
        // observation component is the translated state.
        let dim_to = spec_to.transition_dim();
        let obs_to = spec_to.obs_dim;
        let translated = output.slice([0..n_envs, dim_to - obs_to..dim_to]);
        Ok(translated.into_data().to_vec::<f32>().unwrap())
    }

    fn resolve(&self, name: &str) -> Result<Side, TranslateError> {
        if name == self.metadata.domain_a.name {
            Ok(Side::A)
        } else if name == self.metadata.domain_b.name {
            Ok(Side::B)
        } else {
            Err(TranslateError::UnknownDomain {
                requested: name.to_string(),
                known: [
                    self.metadata.domain_a.name.clone(),
                    self.metadata.domain_b.name.clone(),
                ],
            })
        }
    }

    fn spec(&self, side: Side) -> &DomainSpec {
        match side {
            Side::A => &self.metadata.domain_a,
            Side::B => &self.metadata.domain_b,
        }
    }

    fn check_inputs(
        &self,
        spec: &DomainSpec,
        prev_obs: &[f32],
        action: &[f32],
        obs: &[f32],
    ) -> Result<usize, TranslateError> {
        let o = spec.obs_dim;
        if prev_obs.is_empty() || prev_obs.len() % o != 0 {
            return Err(TranslateError::DimensionMismatch {
                field: "prev_obs",
                expected: o,
                found: prev_obs.len(),
            });
        }
        let n_envs = prev_obs.len() / o;
        if obs.len() != n_envs * o {
            return Err(TranslateError::DimensionMismatch {
                field: "obs",
                expected: o,
                found: obs.len(),
            });
        }
        if action.len() != n_envs * spec.action_dim {
            return Err(TranslateError::DimensionMismatch {
                field: "action",
                expected: spec.action_dim,
                found: action.len(),
            });
        }
        Ok(n_envs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TranslationModelConfig;
    use crate::train::checkpoint::ConfigSnapshot;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn test_translator() -> WorldTranslator<TestBackend> {
        let device = Default::default();
        let domain_a = DomainSpec::new("sim-world", 3, 0);
        let domain_b = DomainSpec::new("real-world", 2, 1);
        let model = TranslationModelConfig::new(
            domain_a.transition_dim(),
            domain_b.transition_dim(),
            8,
        )
        .with_hidden_dim(16)
        .init(&device);
        let metadata = CheckpointMetadata {
            format_version: 1,
            epoch: 3,
            domain_a,
            domain_b,
            latent_dim: 8,
            hidden_dim: 16,
            config: ConfigSnapshot {
                batch_size: 128,
                lambda_cycle: 10.0,
                learning_rate: 1e-3,
                num_workers: 2,
            },
        };
        WorldTranslator::new(model, metadata, device)
    }

    #[test]
    fn test_translate_output_shape() {
        let translator = test_translator();
        // 4 environments of the 3-dim action-free source domain.
        let prev_obs = vec![0.1f32; 12];
        let obs = vec![0.2f32; 12];
        let out = translator
            .translate("sim-world", "real-world", &prev_obs, &[], &obs)
            .unwrap();
        // Target obs_dim is 2, so 4 envs produce 8 values.
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_same_domain_roundtrip_allowed() {
        let translator = test_translator();
        let out = translator
            .translate("sim-world", "sim-world", &[0.1; 3], &[], &[0.2; 3])
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let translator = test_translator();
        let err = translator
            .translate("dream-world", "real-world", &[0.1; 3], &[], &[0.2; 3])
            .unwrap_err();
        match err {
            TranslateError::UnknownDomain { requested, known } => {
                assert_eq!(requested, "dream-world");
                assert_eq!(known, ["sim-world".to_string(), "real-world".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let translator = test_translator();
        // 4 values is not a multiple of the source obs_dim 3.
        assert!(translator
            .translate("sim-world", "real-world", &[0.0; 4], &[], &[0.0; 4])
            .is_err());
        // Missing action values for the action-carrying domain.
        assert!(translator
            .translate("real-world", "sim-world", &[0.0; 2], &[], &[0.0; 2])
            .is_err());
        // Empty inputs.
        assert!(translator
            .translate("sim-world", "real-world", &[], &[], &[])
            .is_err());
    }
}
