//! Cross-domain translation model.

pub mod translation;

pub use translation::{TranslationModel, TranslationModelConfig};
