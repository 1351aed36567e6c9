//! Inference-time translation between trained domains.

pub mod translator;

pub use translator::{TranslateError, WorldTranslator};
