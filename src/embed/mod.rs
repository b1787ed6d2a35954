//! Embedding providers
//!
//! Text-to-vector generation is an external capability. The knowledge
//! operations only see the [`Embedder`] trait.

mod openai;

pub use openai::OpenAiEmbedder;

use anyhow::Result;

/// Turns text into fixed-dimension vectors
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per input in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
