//! Sentiment scoring collaborators.
//!
//! The aggregator only sees [`Scorer`]: one text in, one polarity in
//! `[-1.0, 1.0]` out, or an error. Concrete providers live in submodules.

pub mod language_api;
pub mod lexicon;

use std::sync::Arc;

use anyhow::Result;

use crate::config::ScorerConfig;

pub use language_api::LanguageApiScorer;
pub use lexicon::LexiconScorer;

#[async_trait::async_trait]
pub trait Scorer: Send + Sync {
    /// Score `text`; `Ok` values are finite and within `[-1.0, 1.0]`.
    async fn score(&self, text: &str) -> Result<f64>;
    /// Provider name for logs/metrics.
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn Scorer>;

/// Build the configured scorer.
pub fn build_scorer(cfg: &ScorerConfig) -> Result<DynScorer> {
    let scorer: DynScorer = match cfg {
        ScorerConfig::Lexicon => Arc::new(LexiconScorer::new()),
        ScorerConfig::LanguageApi { endpoint, api_key } => Arc::new(LanguageApiScorer::new(
            endpoint.clone(),
            api_key.clone(),
        )?),
    };
    Ok(scorer)
}

/// Reject non-finite values and clamp the rest into `[-1.0, 1.0]`.
pub(crate) fn clamp_score(raw: f64) -> Result<f64> {
    if !raw.is_finite() {
        anyhow::bail!("scorer returned non-finite score: {raw}");
    }
    Ok(raw.clamp(-1.0, 1.0))
}
