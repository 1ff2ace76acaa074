use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::Scorer;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("embedded lexicon")
});

/// Normalization constant for `s / sqrt(s^2 + alpha)`.
const ALPHA: f64 = 15.0;

/// Offline word-lexicon scorer. Deterministic, no I/O.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Raw lexicon sum plus the number of tokens seen.
    /// A negator within the previous 1..=3 tokens flips a word's sign.
    pub fn raw_score(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for (i, token) in tokens.iter().enumerate() {
            let base = self.word_score(token);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    /// Polarity in `[-1.0, 1.0]`.
    pub fn polarity(&self, text: &str) -> f64 {
        let (raw, _) = self.raw_score(text);
        let s = raw as f64;
        s / (s * s + ALPHA).sqrt()
    }
}

#[async_trait::async_trait]
impl Scorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<f64> {
        super::clamp_score(self.polarity(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Lower-cased alphanumeric tokens; apostrophes stay inside words ("isn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_loads() {
        assert!(LEXICON.len() > 50);
    }

    #[test]
    fn polarity_sign_follows_words() {
        let s = LexiconScorer::new();
        assert!(s.polarity("What a great, wonderful day") > 0.5);
        assert!(s.polarity("this is awful, the worst") < -0.5);
        assert_eq!(s.polarity("the train leaves at noon"), 0.0);
    }

    #[test]
    fn negation_flips_sign() {
        let s = LexiconScorer::new();
        assert!(s.polarity("the movie was good") > 0.0);
        assert!(s.polarity("the movie wasn't very good") < 0.0);
        assert!(s.polarity("not at all bad") > 0.0);
    }

    #[test]
    fn polarity_stays_in_range() {
        let s = LexiconScorer::new();
        let text = "love ".repeat(200);
        let p = s.polarity(&text);
        assert!(p > 0.99 && p <= 1.0);
        let n = s.polarity(&"hate ".repeat(200));
        assert!((-1.0..-0.99).contains(&n));
    }

    #[tokio::test]
    async fn scorer_trait_delegates() {
        let s = LexiconScorer::new();
        let v = s.score("happy happy joy").await.unwrap();
        assert!(v > 0.0 && v <= 1.0);
        assert_eq!(s.name(), "lexicon");
    }
}
