//! The public topic-model façade.
//!
//! [`LatentDirichletAllocation`] owns the documents, the global
//! sufficient statistics and the hyperparameters, and drives the
//! lifecycle: configure, add documents, `prepare` once, `train` in as
//! many calls as desired, then read out topics or score held-out
//! documents with `infer`.
//!
//! The unweighted scheme keeps exact integer counts; the weighted
//! schemes keep single-precision float counts that are clamped at zero
//! when worker replicas are merged. The two representations are separate
//! monomorphized cores behind a two-armed enum; every public operation
//! dispatches once and stays generic below.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::counts::{TopicCounts, TopicWeight};
use crate::document::DocState;
use crate::error::{Result, TemarioError};
use crate::inference;
use crate::likelihood::{ll_docs, ll_topic_word};
use crate::sampler::{init_document, CollapsedLda};
use crate::trainer::{self, TrainOptions};
use crate::vocab;
use crate::weights::{idf_table, pmi_background, TermWeight};

/// Weyl-sequence increment used to derive per-purpose seed streams from
/// the master seed.
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;
/// Stream-id bit reserved for inference so its draws never collide with
/// a training round's.
const INFER_STREAM: u64 = 1 << 63;

/// One weighting family's corpus: documents plus global statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Corpus<W> {
    pub(crate) docs: Vec<DocState<W>>,
    pub(crate) global: TopicCounts<W>,
    /// Idf table or PMI background, indexed by trimmed id; empty when
    /// unweighted.
    pub(crate) vocab_weights: Vec<f32>,
    /// Original id -> trimmed id.
    pub(crate) mapping: Vec<u32>,
    /// Effective vocabulary size; ids at or beyond it are OOV.
    pub(crate) real_v: usize,
}

impl<W: TopicWeight> Corpus<W> {
    fn build(
        raw_docs: Vec<Vec<u32>>,
        stats: vocab::VocabStats,
        term_weight: TermWeight,
        n_topics: usize,
        rng: &mut StdRng,
    ) -> Self {
        let vocab_weights = match term_weight {
            TermWeight::One => Vec::new(),
            TermWeight::Idf => idf_table(&stats.df, raw_docs.len()),
            TermWeight::Pmi => pmi_background(&stats.cf),
        };
        let mut global = TopicCounts::zeros(n_topics, stats.real_v);
        let mut docs = Vec::with_capacity(raw_docs.len());
        for (id, mut tokens) in raw_docs.into_iter().enumerate() {
            vocab::remap_tokens(&mut tokens, &stats.mapping);
            let mut doc = DocState::<W>::new(id, tokens, n_topics);
            init_document(
                &CollapsedLda,
                &mut doc,
                &mut global,
                term_weight,
                &vocab_weights,
                rng,
            );
            docs.push(doc);
        }
        Self {
            docs,
            global,
            vocab_weights,
            mapping: stats.mapping,
            real_v: stats.real_v,
        }
    }

    fn refresh_docs(&mut self) {
        for doc in &mut self.docs {
            doc.refresh_counts(self.real_v);
        }
    }

    fn token_counts_by_topic(&self, n_topics: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_topics];
        for doc in &self.docs {
            for pos in 0..doc.words.len() {
                if (doc.words[pos] as usize) < self.real_v {
                    counts[doc.topics[pos] as usize] += 1;
                }
            }
        }
        counts
    }

    fn theta(&self, doc: &DocState<W>, alphas: &[f32]) -> Vec<f32> {
        let denom = doc.sum_word_weight() + alphas.iter().sum::<f32>();
        doc.by_topic
            .iter()
            .zip(alphas.iter())
            .map(|(&n, &a)| (n.to_f32() + a) / denom)
            .collect()
    }

    fn phi(&self, topic: usize, eta: f32) -> Vec<f32> {
        let denom = self.global.topic(topic).to_f32() + self.real_v as f32 * eta;
        (0..self.real_v)
            .map(|v| (self.global.word_col(v)[topic].to_f32() + eta) / denom)
            .collect()
    }
}

/// The two count representations behind the façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum CountState {
    Unweighted(Corpus<i32>),
    Weighted(Corpus<f32>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum DocInner {
    Unweighted(DocState<i32>),
    Weighted(DocState<f32>),
}

/// A held-out document, built by
/// [`LatentDirichletAllocation::make_document`] in the model's weighting
/// mode and scored by [`LatentDirichletAllocation::infer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    inner: DocInner,
}

impl Document {
    /// Number of tokens, including out-of-vocabulary ones.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.inner {
            DocInner::Unweighted(d) => d.words.len(),
            DocInner::Weighted(d) => d.words.len(),
        }
    }

    /// True when the document has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Latent Dirichlet Allocation trained by collapsed Gibbs sampling.
///
/// Supports per-token term weighting (`one`, `idf`, `pmi`), sharded
/// multi-worker training rounds, Minka re-estimation of the asymmetric
/// document-topic prior, and held-out scoring against the frozen model.
///
/// # Examples
///
/// ```
/// use temario::LatentDirichletAllocation;
///
/// let mut lda = LatentDirichletAllocation::new(2).with_random_seed(42);
/// lda.add_document(&[0, 0, 1, 1]).unwrap();
/// lda.add_document(&[2, 2, 3, 3]).unwrap();
/// lda.prepare(true, 0, 0).unwrap();
/// lda.train(20, 1).unwrap();
///
/// let topics = lda.topics_by_doc(0).unwrap();
/// assert_eq!(topics.len(), 2);
/// ```
///
/// In the weighted schemes, merging worker replicas clamps counts at
/// zero; this slightly biases estimates downward for tokens whose weight
/// was removed concurrently by several workers. The bias is inherent to
/// the sharded approximation and is left uncorrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentDirichletAllocation {
    n_topics: usize,
    term_weight: TermWeight,
    /// Scalar default for the document-topic prior; `alphas` is the
    /// operative per-topic vector.
    alpha: f32,
    eta: f32,
    optim_interval: usize,
    burn_in: usize,
    seed: u64,
    alphas: Vec<f32>,
    /// Documents added before `prepare`.
    pending: Vec<Vec<u32>>,
    state: Option<CountState>,
    rounds_done: usize,
}

impl LatentDirichletAllocation {
    /// Creates a model with `n_topics` topics and default
    /// hyperparameters: unit term weight, `alpha` 0.1, `eta` 0.01,
    /// optimization every 10 rounds, no burn-in, seed 42.
    #[must_use]
    pub fn new(n_topics: usize) -> Self {
        Self {
            n_topics,
            term_weight: TermWeight::One,
            alpha: 0.1,
            eta: 0.01,
            optim_interval: 10,
            burn_in: 0,
            seed: 42,
            alphas: Vec::new(),
            pending: Vec::new(),
            state: None,
            rounds_done: 0,
        }
    }

    /// Sets the term weighting scheme.
    #[must_use]
    pub fn with_term_weight(mut self, term_weight: TermWeight) -> Self {
        self.term_weight = term_weight;
        self
    }

    /// Sets the symmetric initial document-topic prior.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the topic-word prior.
    #[must_use]
    pub fn with_eta(mut self, eta: f32) -> Self {
        self.eta = eta;
        self
    }

    /// Sets the master seed for reproducibility.
    #[must_use]
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how often (in rounds) the document-topic prior is
    /// re-estimated; 0 disables optimization.
    #[must_use]
    pub fn with_optim_interval(mut self, every: usize) -> Self {
        self.optim_interval = every;
        self
    }

    /// Sets the number of initial rounds during which prior optimization
    /// is suppressed.
    #[must_use]
    pub fn with_burn_in(mut self, rounds: usize) -> Self {
        self.burn_in = rounds;
        self
    }

    /// Changes the optimization interval; 0 disables optimization.
    pub fn set_optim_interval(&mut self, every: usize) {
        self.optim_interval = every;
    }

    /// Changes the burn-in round count.
    pub fn set_burn_in(&mut self, rounds: usize) {
        self.burn_in = rounds;
    }

    /// Number of topics.
    #[must_use]
    pub fn n_topics(&self) -> usize {
        self.n_topics
    }

    /// Initial symmetric document-topic prior.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Operative per-topic document-topic prior. Empty before `prepare`.
    #[must_use]
    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    /// Topic-word prior.
    #[must_use]
    pub fn eta(&self) -> f32 {
        self.eta
    }

    /// Active term weighting scheme.
    #[must_use]
    pub fn term_weight(&self) -> TermWeight {
        self.term_weight
    }

    /// Rounds between prior re-estimations; 0 when disabled.
    #[must_use]
    pub fn optim_interval(&self) -> usize {
        self.optim_interval
    }

    /// Rounds of optimization suppression at the start of training.
    #[must_use]
    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    /// Number of documents the model owns.
    #[must_use]
    pub fn n_documents(&self) -> usize {
        match &self.state {
            Some(CountState::Unweighted(c)) => c.docs.len(),
            Some(CountState::Weighted(c)) => c.docs.len(),
            None => self.pending.len(),
        }
    }

    /// Effective vocabulary size after trimming; `None` before `prepare`.
    #[must_use]
    pub fn vocab_size(&self) -> Option<usize> {
        match &self.state {
            Some(CountState::Unweighted(c)) => Some(c.real_v),
            Some(CountState::Weighted(c)) => Some(c.real_v),
            None => None,
        }
    }

    /// Original-id to trimmed-id remap; `None` before `prepare`. Entries
    /// at or beyond [`Self::vocab_size`] mark trimmed-out ids.
    #[must_use]
    pub fn vocab_mapping(&self) -> Option<&[u32]> {
        match &self.state {
            Some(CountState::Unweighted(c)) => Some(&c.mapping),
            Some(CountState::Weighted(c)) => Some(&c.mapping),
            None => None,
        }
    }

    /// Total training rounds completed over the model's lifetime.
    #[must_use]
    pub fn rounds_done(&self) -> usize {
        self.rounds_done
    }

    /// Adds a training document as a sequence of vocabulary ids.
    /// Accepted only before [`Self::prepare`].
    ///
    /// # Errors
    ///
    /// Returns an error if the model is already prepared.
    pub fn add_document(&mut self, tokens: &[u32]) -> Result<usize> {
        if self.state.is_some() {
            return Err(TemarioError::InvalidState {
                operation: "add a document",
                reason: "the model is already prepared".to_string(),
            });
        }
        self.pending.push(tokens.to_vec());
        Ok(self.pending.len() - 1)
    }

    /// Finalizes the vocabulary and initializes sampler state. Must run
    /// exactly once, after all documents are added and before training.
    ///
    /// With `init_docs` true, the vocabulary is trimmed (ids seen fewer
    /// than `min_word_count` times and the `remove_top_n` most frequent
    /// ids become out-of-vocabulary), term weights are computed, and every
    /// in-vocab token gets a uniformly drawn topic. With `init_docs`
    /// false, existing assignments are kept and only the per-document
    /// counts are rebuilt from them, which is what a collaborator needs
    /// after restoring a serialized model.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, a repeated
    /// `prepare(true, ..)`, or a `prepare(false, ..)` without prior state.
    pub fn prepare(&mut self, init_docs: bool, min_word_count: u32, remove_top_n: usize) -> Result<()> {
        self.validate_config()?;
        if init_docs {
            if self.state.is_some() {
                return Err(TemarioError::InvalidState {
                    operation: "prepare",
                    reason: "the model is already prepared".to_string(),
                });
            }
            self.alphas = vec![self.alpha; self.n_topics];
            let raw_docs = std::mem::take(&mut self.pending);
            let (cf, df) = vocab::corpus_frequencies(&raw_docs);
            let stats = vocab::trim(&cf, &df, min_word_count, remove_top_n);
            let mut rng = stream_rng(self.seed, 0);
            let state = if self.term_weight.is_weighted() {
                CountState::Weighted(Corpus::build(
                    raw_docs,
                    stats,
                    self.term_weight,
                    self.n_topics,
                    &mut rng,
                ))
            } else {
                CountState::Unweighted(Corpus::build(
                    raw_docs,
                    stats,
                    self.term_weight,
                    self.n_topics,
                    &mut rng,
                ))
            };
            self.state = Some(state);
            log::debug!(
                "prepared {} documents, effective vocabulary {}",
                self.n_documents(),
                self.vocab_size().unwrap_or(0)
            );
        } else {
            match self.state.as_mut() {
                Some(CountState::Unweighted(c)) => c.refresh_docs(),
                Some(CountState::Weighted(c)) => c.refresh_docs(),
                None => {
                    return Err(TemarioError::InvalidState {
                        operation: "prepare",
                        reason: "no existing state to refresh; call prepare(true, ..) first"
                            .to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Runs `rounds` training rounds with `workers` parallel workers
    /// (0 means hardware parallelism).
    ///
    /// Each round shards documents across workers, resamples every
    /// in-vocab token once, merges worker replicas into a new global
    /// state (clamped at zero in the weighted schemes), and re-estimates
    /// the document-topic prior on the configured schedule. A failed
    /// round is discarded whole: the global state keeps its pre-round
    /// value and training may be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared, or on a training
    /// failure (non-finite proposal, negative unweighted count, worker
    /// panic).
    pub fn train(&mut self, rounds: usize, workers: usize) -> Result<()> {
        let opts = TrainOptions {
            eta: self.eta,
            optim_interval: self.optim_interval,
            burn_in: self.burn_in,
            rounds,
            workers,
            seed: stream_seed(self.seed, 1 + self.rounds_done as u64),
        };
        match self.state.as_mut() {
            Some(CountState::Unweighted(c)) => trainer::train_rounds(
                &CollapsedLda,
                c,
                &mut self.alphas,
                &opts,
                &mut self.rounds_done,
            ),
            Some(CountState::Weighted(c)) => trainer::train_rounds(
                &CollapsedLda,
                c,
                &mut self.alphas,
                &opts,
                &mut self.rounds_done,
            ),
            None => Err(TemarioError::InvalidState {
                operation: "train",
                reason: "prepare must be called before training".to_string(),
            }),
        }
    }

    /// Builds a held-out document in the model's weighting mode from
    /// original-space vocabulary ids. Ids that were trimmed away or never
    /// seen stay out-of-vocabulary and contribute nothing when scored.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared.
    pub fn make_document(&self, tokens: &[u32]) -> Result<Document> {
        let inner = match &self.state {
            Some(CountState::Unweighted(c)) => {
                let mut tokens = tokens.to_vec();
                vocab::remap_tokens(&mut tokens, &c.mapping);
                DocInner::Unweighted(DocState::new(0, tokens, self.n_topics))
            }
            Some(CountState::Weighted(c)) => {
                let mut tokens = tokens.to_vec();
                vocab::remap_tokens(&mut tokens, &c.mapping);
                DocInner::Weighted(DocState::new(0, tokens, self.n_topics))
            }
            None => {
                return Err(TemarioError::InvalidState {
                    operation: "make a held-out document",
                    reason: "prepare must be called first".to_string(),
                })
            }
        };
        Ok(Document { inner })
    }

    /// Scores held-out documents against the frozen model, running
    /// `max_iter` sampling iterations per document set.
    ///
    /// Joint mode (`joint` true) initializes all documents into one
    /// temporary state and returns a single likelihood; independent mode
    /// scores each document in isolation and returns one likelihood per
    /// document. The model state is never modified. `tolerance` is
    /// accepted but currently unused, reserved for a future convergence
    /// check.
    ///
    /// # Errors
    ///
    /// Returns an error if no training round has completed, or if a
    /// document was built for a different weighting mode.
    pub fn infer(
        &self,
        docs: &mut [Document],
        max_iter: usize,
        tolerance: f32,
        joint: bool,
        workers: usize,
    ) -> Result<Vec<f64>> {
        let _ = tolerance;
        if self.rounds_done == 0 {
            return Err(TemarioError::InvalidState {
                operation: "infer",
                reason: "at least one training round must complete first".to_string(),
            });
        }
        let seed = stream_seed(self.seed, INFER_STREAM | self.rounds_done as u64);
        match &self.state {
            Some(CountState::Unweighted(c)) => {
                let mut refs: Vec<&mut DocState<i32>> = Vec::with_capacity(docs.len());
                for doc in docs.iter_mut() {
                    match &mut doc.inner {
                        DocInner::Unweighted(d) => refs.push(d),
                        DocInner::Weighted(_) => {
                            return Err(TemarioError::DocumentMismatch {
                                expected: self.term_weight.name(),
                                got: "idf/pmi",
                            })
                        }
                    }
                }
                self.run_inference(c, &mut refs, max_iter, joint, workers, seed)
            }
            Some(CountState::Weighted(c)) => {
                let mut refs: Vec<&mut DocState<f32>> = Vec::with_capacity(docs.len());
                for doc in docs.iter_mut() {
                    match &mut doc.inner {
                        DocInner::Weighted(d) => refs.push(d),
                        DocInner::Unweighted(_) => {
                            return Err(TemarioError::DocumentMismatch {
                                expected: self.term_weight.name(),
                                got: "one",
                            })
                        }
                    }
                }
                self.run_inference(c, &mut refs, max_iter, joint, workers, seed)
            }
            None => Err(TemarioError::InvalidState {
                operation: "infer",
                reason: "prepare must be called before inference".to_string(),
            }),
        }
    }

    fn run_inference<W: TopicWeight>(
        &self,
        corpus: &Corpus<W>,
        refs: &mut [&mut DocState<W>],
        max_iter: usize,
        joint: bool,
        workers: usize,
        seed: u64,
    ) -> Result<Vec<f64>> {
        if joint {
            inference::infer_joint(
                &CollapsedLda,
                &corpus.global,
                &corpus.vocab_weights,
                self.term_weight,
                refs,
                &self.alphas,
                self.eta,
                max_iter,
                workers,
                seed,
            )
        } else {
            inference::infer_independent(
                &CollapsedLda,
                &corpus.global,
                &corpus.vocab_weights,
                self.term_weight,
                refs,
                &self.alphas,
                self.eta,
                max_iter,
                workers,
                seed,
            )
        }
    }

    /// Integer count of in-vocab tokens currently assigned to each topic,
    /// across all documents. Ignores term weighting.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared.
    pub fn count_by_topic(&self) -> Result<Vec<usize>> {
        match self.prepared()? {
            CountState::Unweighted(c) => Ok(c.token_counts_by_topic(self.n_topics)),
            CountState::Weighted(c) => Ok(c.token_counts_by_topic(self.n_topics)),
        }
    }

    /// Topic distribution of training document `doc`:
    /// `(n_dk + alpha_k) / (swc_d + Σ alpha)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared or `doc` is out of
    /// range.
    pub fn topics_by_doc(&self, doc: usize) -> Result<Vec<f32>> {
        match self.prepared()? {
            CountState::Unweighted(c) => {
                let d = c.docs.get(doc).ok_or(TemarioError::InvalidParam {
                    param: "doc",
                    value: doc as f64,
                    constraint: "must be < the number of documents",
                })?;
                Ok(c.theta(d, &self.alphas))
            }
            CountState::Weighted(c) => {
                let d = c.docs.get(doc).ok_or(TemarioError::InvalidParam {
                    param: "doc",
                    value: doc as f64,
                    constraint: "must be < the number of documents",
                })?;
                Ok(c.theta(d, &self.alphas))
            }
        }
    }

    /// Word distribution of `topic` over the trimmed vocabulary:
    /// `(n_kv + eta) / (n_k + V*eta)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared or `topic` is out of
    /// range.
    pub fn words_by_topic(&self, topic: usize) -> Result<Vec<f32>> {
        if topic >= self.n_topics {
            return Err(TemarioError::InvalidParam {
                param: "topic",
                value: topic as f64,
                constraint: "must be < n_topics",
            });
        }
        match self.prepared()? {
            CountState::Unweighted(c) => Ok(c.phi(topic, self.eta)),
            CountState::Weighted(c) => Ok(c.phi(topic, self.eta)),
        }
    }

    /// Full-model log-likelihood (document part plus topic-word part),
    /// for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not prepared or the likelihood is
    /// non-finite.
    pub fn log_likelihood(&self) -> Result<f64> {
        let ll = match self.prepared()? {
            CountState::Unweighted(c) => {
                ll_docs(c.docs.iter(), &self.alphas) + ll_topic_word(&c.global, self.eta)
            }
            CountState::Weighted(c) => {
                ll_docs(c.docs.iter(), &self.alphas) + ll_topic_word(&c.global, self.eta)
            }
        };
        if !ll.is_finite() {
            return Err(TemarioError::NumericalInstability {
                round: self.rounds_done,
                doc: None,
                position: None,
                details: format!("log-likelihood is {ll}"),
            });
        }
        Ok(ll)
    }

    fn prepared(&self) -> Result<&CountState> {
        self.state.as_ref().ok_or_else(|| TemarioError::InvalidState {
            operation: "read model state",
            reason: "prepare must be called first".to_string(),
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.n_topics == 0 {
            return Err(TemarioError::InvalidParam {
                param: "n_topics",
                value: 0.0,
                constraint: "must be >= 1",
            });
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(TemarioError::InvalidParam {
                param: "alpha",
                value: f64::from(self.alpha),
                constraint: "must be > 0 and finite",
            });
        }
        if !(self.eta > 0.0 && self.eta.is_finite()) {
            return Err(TemarioError::InvalidParam {
                param: "eta",
                value: f64::from(self.eta),
                constraint: "must be > 0 and finite",
            });
        }
        Ok(())
    }
}

fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed ^ stream.wrapping_mul(GOLDEN_GAMMA)
}

fn stream_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(stream_seed(seed, stream))
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
