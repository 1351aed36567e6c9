//! Encoder/decoder pair per domain with a shared latent space.
//!
//! Each domain's transition vector `[prev_obs | action | obs]` is encoded
//! into a latent code of fixed dimension shared by both domains, and
//! decoded back into a full transition vector. Crossing encoder and
//! decoder between domains yields translation; chaining a cross-domain
//! round trip yields the cycle reconstruction used as a training signal
//! when no paired data exists.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Configuration for a [`TranslationModel`].
#[derive(Debug, Clone)]
pub struct TranslationModelConfig {
    /// Transition vector dimension of domain A (`2 * obs_dim + action_dim`).
    pub dim_a: usize,
    /// Transition vector dimension of domain B.
    pub dim_b: usize,
    /// Shared latent dimension.
    pub latent_dim: usize,
    /// Hidden layer width of every encoder/decoder MLP.
    pub hidden_dim: usize,
}

impl TranslationModelConfig {
    /// Create a new configuration.
    pub fn new(dim_a: usize, dim_b: usize, latent_dim: usize) -> Self {
        Self {
            dim_a,
            dim_b,
            latent_dim,
            hidden_dim: 128,
        }
    }

    /// Set the hidden layer width.
    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    /// Initialize model parameters on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TranslationModel<B> {
        TranslationModel {
            encoder_a: CoderConfig::new(self.dim_a, self.hidden_dim, self.latent_dim).init(device),
            decoder_a: CoderConfig::new(self.latent_dim, self.hidden_dim, self.dim_a).init(device),
            encoder_b: CoderConfig::new(self.dim_b, self.hidden_dim, self.latent_dim).init(device),
            decoder_b: CoderConfig::new(self.latent_dim, self.hidden_dim, self.dim_b).init(device),
            latent_dim: self.latent_dim,
        }
    }
}

/// Three-layer MLP used for every encoder and decoder.
#[derive(Debug, Clone)]
struct CoderConfig {
    d_input: usize,
    d_hidden: usize,
    d_output: usize,
}

impl CoderConfig {
    fn new(d_input: usize, d_hidden: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_hidden,
            d_output,
        }
    }

    fn init<B: Backend>(&self, device: &B::Device) -> Coder<B> {
        Coder {
            fc1: LinearConfig::new(self.d_input, self.d_hidden).init(device),
            fc2: LinearConfig::new(self.d_hidden, self.d_hidden).init(device),
            fc3: LinearConfig::new(self.d_hidden, self.d_output).init(device),
        }
    }
}

/// MLP mapping between a domain's transition space and the latent space.
#[derive(Module, Debug)]
pub struct Coder<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

impl<B: Backend> Coder<B> {
    /// Forward pass over a `[batch, d_input]` tensor.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}

/// Two encoder/decoder pairs sharing one latent space.
///
/// All four forward functions are pure in their inputs and current
/// parameters; the model holds no state besides weights.
#[derive(Module, Debug)]
pub struct TranslationModel<B: Backend> {
    encoder_a: Coder<B>,
    decoder_a: Coder<B>,
    encoder_b: Coder<B>,
    decoder_b: Coder<B>,
    latent_dim: usize,
}

impl<B: Backend> TranslationModel<B> {
    /// Shared latent dimension.
    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    /// Encode domain-A transitions `[batch, dim_a]` into latent codes
    /// `[batch, latent_dim]`.
    pub fn encode_a(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.encoder_a.forward(x)
    }

    /// Decode latent codes into domain-A transitions `[batch, dim_a]`.
    pub fn decode_a(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        self.decoder_a.forward(z)
    }

    /// Encode domain-B transitions `[batch, dim_b]` into latent codes.
    pub fn encode_b(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.encoder_b.forward(x)
    }

    /// Decode latent codes into domain-B transitions `[batch, dim_b]`.
    pub fn decode_b(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        self.decoder_b.forward(z)
    }
}
