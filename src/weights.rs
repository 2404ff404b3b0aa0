//! Term weighting schemes.
//!
//! Plain LDA counts every token as one unit. The weighted schemes scale
//! each token's contribution to the sufficient statistics: `Idf` by the
//! inverse document frequency of its type, `Pmi` by the token's positive
//! pointwise mutual information against a background unigram model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TemarioError;

/// Per-token weighting applied to count updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermWeight {
    /// Every token contributes one unit (plain LDA, integer counts).
    #[default]
    One,
    /// Inverse document frequency: `ln(D / df(v))`.
    Idf,
    /// Positive pointwise mutual information against the corpus unigram
    /// distribution, computed per document at initialization.
    Pmi,
}

impl TermWeight {
    /// True for the schemes that carry float counts.
    #[must_use]
    pub fn is_weighted(self) -> bool {
        !matches!(self, Self::One)
    }

    /// Canonical lowercase name of the scheme.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Idf => "idf",
            Self::Pmi => "pmi",
        }
    }
}

impl fmt::Display for TermWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TermWeight {
    type Err = TemarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(Self::One),
            "idf" => Ok(Self::Idf),
            "pmi" => Ok(Self::Pmi),
            other => Err(TemarioError::UnknownTermWeight {
                name: other.to_string(),
            }),
        }
    }
}

/// Idf table over the trimmed vocabulary: `ln(n_docs / df(v))`.
///
/// Trimming guarantees `df(v) >= 1` for every kept id.
pub(crate) fn idf_table(df: &[u32], n_docs: usize) -> Vec<f32> {
    df.iter()
        .map(|&d| (n_docs as f32 / d as f32).ln())
        .collect()
}

/// Background unigram probabilities over the trimmed vocabulary:
/// `cf(v) / total_cf`.
pub(crate) fn pmi_background(cf: &[u32]) -> Vec<f32> {
    let total: u64 = cf.iter().map(|&c| u64::from(c)).sum();
    let total = total as f32;
    cf.iter().map(|&c| c as f32 / total).collect()
}

/// Positive PMI of a token against the background unigram model:
/// `max(0, ln(tf / (p_bg * doc_len)))`.
pub(crate) fn ppmi_weight(tf: u32, background: f32, doc_len: usize) -> f32 {
    let ratio = tf as f32 / (background * doc_len as f32);
    ratio.ln().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for tw in [TermWeight::One, TermWeight::Idf, TermWeight::Pmi] {
            let parsed: TermWeight = tw.name().parse().expect("known name parses");
            assert_eq!(parsed, tw);
        }
    }

    #[test]
    fn test_parse_unknown_fails() {
        let err = "tfidf".parse::<TermWeight>().unwrap_err();
        assert!(format!("{err}").contains("tfidf"));
    }

    #[test]
    fn test_default_is_one() {
        assert_eq!(TermWeight::default(), TermWeight::One);
        assert!(!TermWeight::One.is_weighted());
        assert!(TermWeight::Idf.is_weighted());
        assert!(TermWeight::Pmi.is_weighted());
    }

    #[test]
    fn test_idf_table() {
        // 4 docs; a word in every doc has idf 0, a word in one doc has ln(4).
        let table = idf_table(&[4, 1], 4);
        assert!((table[0] - 0.0).abs() < 1e-6);
        assert!((table[1] - 4.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_pmi_background_normalizes() {
        let bg = pmi_background(&[3, 1]);
        assert!((bg[0] - 0.75).abs() < 1e-6);
        assert!((bg[1] - 0.25).abs() < 1e-6);
        let sum: f32 = bg.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ppmi_clamps_at_zero() {
        // tf/len matches the background rate exactly: PMI 0.
        assert_eq!(ppmi_weight(1, 0.25, 4), 0.0);
        // Token rarer in the document than in the background: clamped.
        assert_eq!(ppmi_weight(1, 0.5, 4), 0.0);
        // Token enriched in the document: positive.
        assert!(ppmi_weight(3, 0.25, 4) > 0.0);
    }
}
