//! # temario
//!
//! Latent Dirichlet Allocation trained by collapsed Gibbs sampling, with
//! term-weighting extensions and sharded parallel training rounds.
//!
//! The model owns its documents and sufficient statistics. Each training
//! round shards documents across workers; every worker resamples its
//! shards against a private replica of the global counts, and a serial
//! merge reconciles the replicas into the next global state. The
//! asymmetric document-topic prior is re-estimated on a configurable
//! schedule, and held-out documents can be scored against the frozen
//! model jointly or independently.
//!
//! Tokenization and vocabulary construction live outside the crate:
//! documents arrive as sequences of integer vocabulary ids, and ids at
//! or beyond the effective vocabulary size are ignored everywhere.
//!
//! ## Quick Start
//!
//! ```
//! use temario::LatentDirichletAllocation;
//!
//! let mut lda = LatentDirichletAllocation::new(2)
//!     .with_alpha(0.1)
//!     .with_eta(0.01)
//!     .with_random_seed(42);
//!
//! lda.add_document(&[0, 0, 1, 1]).unwrap();
//! lda.add_document(&[2, 2, 3, 3]).unwrap();
//! lda.add_document(&[0, 1, 2, 3]).unwrap();
//! lda.prepare(true, 0, 0).unwrap();
//! lda.train(50, 2).unwrap();
//!
//! let words = lda.words_by_topic(0).unwrap();
//! assert_eq!(words.len(), 4);
//! let ll = lda.log_likelihood().unwrap();
//! assert!(ll.is_finite());
//! ```
//!
//! ## Term weighting
//!
//! With [`TermWeight::Idf`] or [`TermWeight::Pmi`], each token's
//! contribution to the counts is scaled by its informativeness. Weighted
//! counts are single-precision floats and are clamped at zero when
//! worker replicas merge; the unweighted default keeps exact integer
//! counts.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod counts;
mod document;
pub mod error;
mod inference;
mod likelihood;
pub mod math;
mod model;
mod sampler;
mod trainer;
mod vocab;
mod weights;

pub use error::{Result, TemarioError};
pub use model::{Document, LatentDirichletAllocation};
pub use weights::TermWeight;

#[cfg(test)]
mod tests_invariants_contract;
