//! Round coordination for sharded parallel training.
//!
//! A round partitions documents into `C = min(8W, D)` interleaved shards
//! (document index modulo C); shard `c` always runs on worker `c mod W`,
//! so the shard-to-generator pairing is fixed and a run is reproducible
//! from the seed, the worker count and the document order alone. Workers
//! mutate only their own replica of the global counts and the documents
//! of their shards; the serial merge after the join is the round's sole
//! synchronization point. A failed round is discarded before the merge,
//! leaving the global state untouched.

use log::{debug, trace};
use rand::rngs::{SmallRng, StdRng};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::thread;

use crate::counts::{TopicCounts, TopicWeight};
use crate::document::DocState;
use crate::error::{Result, TemarioError};
use crate::model::Corpus;
use crate::sampler::{sample_document, SamplerHooks};

/// Options for one `train` call.
#[derive(Debug, Clone)]
pub(crate) struct TrainOptions {
    pub eta: f32,
    pub optim_interval: usize,
    pub burn_in: usize,
    pub rounds: usize,
    pub workers: usize,
    pub seed: u64,
}

/// Resolves a requested worker count; 0 means hardware parallelism.
pub(crate) fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

/// Runs `opts.rounds` training rounds over the corpus, merging replicas
/// after each round and re-estimating `alphas` on the optimization
/// schedule. `rounds_done` is the model-lifetime round counter; the
/// schedule is evaluated against it so training can be split across
/// calls.
pub(crate) fn train_rounds<W, H>(
    hooks: &H,
    corpus: &mut Corpus<W>,
    alphas: &mut [f32],
    opts: &TrainOptions,
    rounds_done: &mut usize,
) -> Result<()>
where
    W: TopicWeight,
    H: SamplerHooks<W>,
{
    let workers = effective_workers(opts.workers);
    let mut master = StdRng::seed_from_u64(opts.seed);
    let mut locals = vec![corpus.global.clone(); workers];
    let mut rngs: Vec<StdRng> = (0..workers)
        .map(|_| StdRng::seed_from_u64(master.random()))
        .collect();

    for _ in 0..opts.rounds {
        let round = *rounds_done;
        {
            let mut doc_refs: Vec<&mut DocState<W>> = corpus.docs.iter_mut().collect();
            run_round(
                hooks,
                &mut doc_refs,
                &mut corpus.global,
                &mut locals,
                &mut rngs,
                alphas,
                opts.eta,
                round,
            )?;
        }
        debug!("round {round}: merged {workers} replicas");

        if round >= opts.burn_in
            && opts.optim_interval > 0
            && (round + 1) % opts.optim_interval == 0
        {
            hooks.optimize_params(&corpus.docs, alphas);
            debug!(
                "round {round}: re-estimated alphas, sum {}",
                alphas.iter().sum::<f32>()
            );
        }
        *rounds_done += 1;
    }
    Ok(())
}

/// One sampling round over `docs` followed by the replica merge.
///
/// `locals` must hold copies of `global` on entry (the merge leaves them
/// that way for the next round). On any worker failure the merge is
/// skipped and `global` keeps its pre-round value.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_round<W, H>(
    hooks: &H,
    docs: &mut [&mut DocState<W>],
    global: &mut TopicCounts<W>,
    locals: &mut [TopicCounts<W>],
    rngs: &mut [StdRng],
    alphas: &[f32],
    eta: f32,
    round: usize,
) -> Result<()>
where
    W: TopicWeight,
    H: SamplerHooks<W>,
{
    let n_docs = docs.len();
    if n_docs == 0 {
        return Ok(());
    }
    let workers = locals.len();
    let stride = (8 * workers).min(n_docs).max(1);

    let mut shards: Vec<Vec<&mut DocState<W>>> = Vec::with_capacity(stride);
    shards.resize_with(stride, Vec::new);
    for (i, doc) in docs.iter_mut().enumerate() {
        shards[i % stride].push(&mut **doc);
    }

    let mut per_worker: Vec<Vec<Vec<&mut DocState<W>>>> = Vec::with_capacity(workers);
    per_worker.resize_with(workers, Vec::new);
    for (c, shard) in shards.into_iter().enumerate() {
        per_worker[c % workers].push(shard);
    }
    trace!("round {round}: {n_docs} documents in {stride} shards across {workers} workers");

    let n_topics = alphas.len();
    let failure = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for ((worker_shards, local), rng) in per_worker
            .into_iter()
            .zip(locals.iter_mut())
            .zip(rngs.iter_mut())
        {
            handles.push(scope.spawn(move || -> Result<()> {
                let mut buf = vec![0.0f32; n_topics];
                for mut shard in worker_shards {
                    let mut order = SmallRng::seed_from_u64(rng.random());
                    shard.shuffle(&mut order);
                    for doc in shard {
                        sample_document(hooks, doc, local, alphas, eta, &mut buf, rng, round)?;
                    }
                }
                Ok(())
            }));
        }

        // Join every worker before reporting, so no task is still writing
        // when the caller inspects state.
        let mut first_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(_) => {
                    if first_err.is_none() {
                        first_err = Some(TemarioError::WorkerFailure {
                            round,
                            message: "worker thread panicked".to_string(),
                        });
                    }
                }
            }
        }
        first_err
    });

    if let Some(err) = failure {
        return Err(err);
    }
    hooks.merge_locals(global, locals, round)
}
