use super::*;
use crate::counts::TopicWeight;
use crate::weights::TermWeight;

/// Relative-tolerance comparison with an absolute floor for values near
/// zero.
fn close(actual: f64, expected: f64, tol: f64) -> bool {
    (actual - expected).abs() <= tol * expected.abs().max(1.0)
}

fn check_corpus<W: TopicWeight>(corpus: &Corpus<W>, n_topics: usize, tol: f64) {
    let mut corpus_weight = 0.0f64;
    for doc in &corpus.docs {
        let mut in_vocab_weight = 0.0f64;
        for pos in 0..doc.words.len() {
            if (doc.words[pos] as usize) < corpus.real_v {
                in_vocab_weight += f64::from(doc.token_weight(pos).to_f32());
                // Every in-vocab assignment is a valid topic.
                assert!((doc.topics[pos] as usize) < n_topics, "doc {}", doc.id);
            }
        }
        let stored: f64 = doc.by_topic.iter().map(|w| f64::from(w.to_f32())).sum();
        assert!(
            close(stored, in_vocab_weight, tol),
            "doc {}: stored {stored} vs in-vocab weight {in_vocab_weight}",
            doc.id
        );
        corpus_weight += in_vocab_weight;
    }

    let mut global_total = 0.0f64;
    for k in 0..n_topics {
        let topic_total = f64::from(corpus.global.topic(k).to_f32());
        assert!(topic_total >= -1e-6, "topic {k} total is negative");
        let row_sum: f64 = (0..corpus.real_v)
            .map(|v| {
                let n = f64::from(corpus.global.word_col(v)[k].to_f32());
                assert!(n >= -1e-6, "count for topic {k}, word {v} is negative");
                n
            })
            .sum();
        assert!(
            close(row_sum, topic_total, tol),
            "topic {k}: matrix sum {row_sum} vs total {topic_total}"
        );
        global_total += topic_total;
    }
    assert!(
        close(global_total, corpus_weight, tol),
        "global total {global_total} vs corpus weight {corpus_weight}"
    );
}

fn assert_invariants(model: &LatentDirichletAllocation, tol: f64) {
    match model.state.as_ref().expect("model is prepared") {
        CountState::Unweighted(c) => check_corpus(c, model.n_topics(), tol),
        CountState::Weighted(c) => check_corpus(c, model.n_topics(), tol),
    }
    assert!(model.alphas().iter().all(|&a| a >= 1e-5));
}

fn two_cluster_model(term_weight: TermWeight, seed: u64) -> LatentDirichletAllocation {
    let mut model = LatentDirichletAllocation::new(2)
        .with_term_weight(term_weight)
        .with_alpha(0.1)
        .with_eta(0.01)
        .with_random_seed(seed)
        .with_optim_interval(0);
    model.add_document(&[0, 0, 1, 1]).expect("add");
    model.add_document(&[2, 2, 3, 3]).expect("add");
    model.add_document(&[0, 1, 0, 1]).expect("add");
    model.add_document(&[2, 3, 2, 3]).expect("add");
    model
}

fn top_two(probs: &[f32]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..probs.len()).collect();
    idx.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).expect("finite probs"));
    idx.truncate(2);
    idx.sort_unstable();
    idx
}

// =========================================================================
// Lifecycle errors
// =========================================================================

#[test]
fn test_add_document_after_prepare_fails() {
    let mut model = two_cluster_model(TermWeight::One, 1);
    model.prepare(true, 0, 0).expect("prepare");
    let err = model.add_document(&[0, 1]).unwrap_err();
    assert!(matches!(err, TemarioError::InvalidState { .. }));
}

#[test]
fn test_train_before_prepare_fails() {
    let mut model = LatentDirichletAllocation::new(2);
    let err = model.train(5, 1).unwrap_err();
    assert!(matches!(err, TemarioError::InvalidState { .. }));
}

#[test]
fn test_infer_before_any_round_fails() {
    let mut model = two_cluster_model(TermWeight::One, 1);
    model.prepare(true, 0, 0).expect("prepare");
    let mut docs = [model.make_document(&[0, 1]).expect("make")];
    let err = model.infer(&mut docs, 5, 0.0, false, 1).unwrap_err();
    assert!(matches!(err, TemarioError::InvalidState { .. }));
}

#[test]
fn test_prepare_twice_fails() {
    let mut model = two_cluster_model(TermWeight::One, 1);
    model.prepare(true, 0, 0).expect("prepare");
    let err = model.prepare(true, 0, 0).unwrap_err();
    assert!(matches!(err, TemarioError::InvalidState { .. }));
}

#[test]
fn test_refresh_prepare_without_state_fails() {
    let mut model = LatentDirichletAllocation::new(2);
    let err = model.prepare(false, 0, 0).unwrap_err();
    assert!(matches!(err, TemarioError::InvalidState { .. }));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let mut zero_topics = LatentDirichletAllocation::new(0);
    assert!(matches!(
        zero_topics.prepare(true, 0, 0).unwrap_err(),
        TemarioError::InvalidParam { param: "n_topics", .. }
    ));

    let mut bad_alpha = LatentDirichletAllocation::new(2).with_alpha(-1.0);
    assert!(matches!(
        bad_alpha.prepare(true, 0, 0).unwrap_err(),
        TemarioError::InvalidParam { param: "alpha", .. }
    ));

    let mut bad_eta = LatentDirichletAllocation::new(2).with_eta(0.0);
    assert!(matches!(
        bad_eta.prepare(true, 0, 0).unwrap_err(),
        TemarioError::InvalidParam { param: "eta", .. }
    ));
}

#[test]
fn test_document_mode_mismatch_is_rejected() {
    let mut unweighted = two_cluster_model(TermWeight::One, 1);
    unweighted.prepare(true, 0, 0).expect("prepare");
    unweighted.train(5, 1).expect("train");

    let mut weighted = two_cluster_model(TermWeight::Idf, 1);
    weighted.prepare(true, 0, 0).expect("prepare");
    let foreign = weighted.make_document(&[0, 1]).expect("make");

    let err = unweighted.infer(&mut [foreign], 5, 0.0, false, 1).unwrap_err();
    assert!(matches!(err, TemarioError::DocumentMismatch { .. }));
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_two_topics_partition_the_vocabulary() {
    // Word pairs {0,1} and {2,3} never co-occur; after convergence the
    // two topics split the vocabulary along that line.
    let mut model = two_cluster_model(TermWeight::One, 7);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(300, 1).expect("train");

    let phi0 = model.words_by_topic(0).expect("phi");
    let phi1 = model.words_by_topic(1).expect("phi");
    let pair0 = top_two(&phi0);
    let pair1 = top_two(&phi1);

    for (topic, (phi, pair)) in [(0, (&phi0, &pair0)), (1, (&phi1, &pair1))] {
        for &w in pair.iter() {
            assert!(
                phi[w] > 0.4,
                "topic {topic}: word {w} has probability {} <= 0.4",
                phi[w]
            );
        }
    }
    assert!(
        (pair0 == vec![0, 1] && pair1 == vec![2, 3])
            || (pair0 == vec![2, 3] && pair1 == vec![0, 1]),
        "topics did not split the vocabulary: {pair0:?} / {pair1:?}"
    );
}

#[test]
fn test_single_topic_recovers_corpus_frequencies() {
    // With K = 1 every in-vocab token sits in topic 0, so phi is exactly
    // the smoothed corpus frequency distribution.
    let mut model = LatentDirichletAllocation::new(1)
        .with_random_seed(3)
        .with_eta(0.01);
    model.add_document(&[0, 1, 1, 2]).expect("add");
    model.add_document(&[2, 2, 0]).expect("add");
    model.prepare(true, 0, 0).expect("prepare");
    model.train(25, 2).expect("train");

    let cf = [2.0f64, 2.0, 3.0];
    let total: f64 = cf.iter().sum();
    let v = cf.len() as f64;
    let eta = f64::from(model.eta());
    let phi = model.words_by_topic(0).expect("phi");
    for (w, &count) in cf.iter().enumerate() {
        let expected = (count + eta) / (total + v * eta);
        assert!(
            (f64::from(phi[w]) - expected).abs() < 1e-6,
            "word {w}: {} vs {expected}",
            phi[w]
        );
    }
    assert_eq!(model.count_by_topic().expect("counts"), vec![7]);
}

#[test]
fn test_empty_document_is_accepted_and_uniform() {
    let mut model = LatentDirichletAllocation::new(4)
        .with_random_seed(5)
        .with_optim_interval(0);
    model.add_document(&[]).expect("add");
    model.add_document(&[0, 1, 0]).expect("add");
    model.prepare(true, 0, 0).expect("prepare");
    model.train(10, 1).expect("train");

    let theta = model.topics_by_doc(0).expect("theta");
    for &p in &theta {
        assert!((p - 0.25).abs() < 1e-6, "expected uniform theta, got {p}");
    }
    assert_invariants(&model, 0.0);
}

#[test]
fn test_out_of_vocab_ids_contribute_nothing() {
    // id 9 appears once; with min_word_count = 2 it is trimmed out and
    // behaves exactly like a foreign id.
    let mut model = LatentDirichletAllocation::new(2).with_random_seed(8);
    model.add_document(&[0, 0, 1, 1, 9]).expect("add");
    model.add_document(&[0, 1, 0, 1]).expect("add");
    model.prepare(true, 2, 0).expect("prepare");
    model.train(20, 1).expect("train");

    assert_eq!(model.vocab_size(), Some(2));
    let counts = model.count_by_topic().expect("counts");
    assert_eq!(counts.iter().sum::<usize>(), 8); // the trimmed token is not counted
    assert_invariants(&model, 0.0);

    // Held-out documents route through the same remap: only ids 0 and 1
    // carry weight.
    let doc = model.make_document(&[0, 9, 77]).expect("make");
    assert_eq!(doc.len(), 3);
    let lls = model.infer(&mut [doc], 10, 0.0, false, 1).expect("infer");
    assert_eq!(lls.len(), 1);
    assert!(lls[0].is_finite());
}

#[test]
fn test_invariants_hold_for_any_worker_count() {
    for workers in [1, 4] {
        let mut model = two_cluster_model(TermWeight::One, 19);
        model.prepare(true, 0, 0).expect("prepare");
        let ll_start = model.log_likelihood().expect("ll");
        model.train(50, workers).expect("train");
        let ll_end = model.log_likelihood().expect("ll");
        assert!(
            ll_end > ll_start,
            "workers {workers}: log-likelihood did not improve ({ll_start} -> {ll_end})"
        );
        assert_invariants(&model, 0.0);
    }
}

#[test]
fn test_optimization_fires_only_on_schedule() {
    let mut model = LatentDirichletAllocation::new(5)
        .with_random_seed(23)
        .with_optim_interval(10)
        .with_burn_in(50);
    for id in 0..6u32 {
        let words: Vec<u32> = (0..20).map(|t| (id * 5 + t * 3) % 12).collect();
        model.add_document(&words).expect("add");
    }
    model.prepare(true, 0, 0).expect("prepare");

    let mut changed_at = Vec::new();
    for round in 0..85 {
        let before = model.alphas().to_vec();
        model.train(1, 1).expect("train");
        if model.alphas() != before.as_slice() {
            changed_at.push(round);
        }
    }
    // Schedule: past the 50-round burn-in, every 10th round.
    assert_eq!(changed_at, vec![59, 69, 79]);
    assert_invariants(&model, 0.0);
}

// =========================================================================
// Laws
// =========================================================================

#[test]
fn test_alphas_never_move_with_optimization_disabled() {
    let mut model = two_cluster_model(TermWeight::One, 2);
    model.prepare(true, 0, 0).expect("prepare");
    assert_eq!(model.alphas(), vec![0.1f32; 2].as_slice());
    model.train(40, 2).expect("train");
    assert_eq!(model.alphas(), vec![0.1f32; 2].as_slice());
}

#[test]
fn test_token_counts_match_weight_totals_when_unweighted() {
    let mut model = two_cluster_model(TermWeight::One, 13);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(30, 2).expect("train");

    let counts = model.count_by_topic().expect("counts");
    match model.state.as_ref().expect("prepared") {
        CountState::Unweighted(c) => {
            for (k, &n) in counts.iter().enumerate() {
                assert_eq!(c.global.topic(k), n as i32);
            }
        }
        CountState::Weighted(_) => unreachable!("model is unweighted"),
    }
}

#[test]
fn test_same_seed_and_workers_reproduce_the_run() {
    let run = |workers| {
        let mut model = two_cluster_model(TermWeight::One, 31);
        model.prepare(true, 0, 0).expect("prepare");
        model.train(20, workers).expect("train");
        model.train(15, workers).expect("train");
        model
    };
    for workers in [1, 3] {
        let a = run(workers);
        let b = run(workers);
        for k in 0..2 {
            assert_eq!(
                a.words_by_topic(k).expect("phi"),
                b.words_by_topic(k).expect("phi")
            );
        }
        assert_eq!(
            a.count_by_topic().expect("counts"),
            b.count_by_topic().expect("counts")
        );
    }
}

#[test]
fn test_independent_inference_leaves_the_model_untouched() {
    let mut model = two_cluster_model(TermWeight::One, 4);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(30, 2).expect("train");

    let snapshot = serde_json::to_string(&model).expect("serialize");
    let mut docs = vec![
        model.make_document(&[0, 1, 0]).expect("make"),
        model.make_document(&[2, 3]).expect("make"),
    ];
    let lls = model.infer(&mut docs, 25, 0.0, false, 2).expect("infer");
    assert_eq!(lls.len(), 2);
    assert_eq!(serde_json::to_string(&model).expect("serialize"), snapshot);
}

#[test]
fn test_joint_inference_returns_one_likelihood_and_freezes_model() {
    let mut model = two_cluster_model(TermWeight::One, 4);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(30, 2).expect("train");

    let snapshot = serde_json::to_string(&model).expect("serialize");
    let mut docs = vec![
        model.make_document(&[0, 0, 1]).expect("make"),
        model.make_document(&[2, 3, 3]).expect("make"),
    ];
    let lls = model.infer(&mut docs, 25, 0.0, true, 2).expect("infer");
    assert_eq!(lls.len(), 1);
    assert!(lls[0].is_finite());
    assert_eq!(serde_json::to_string(&model).expect("serialize"), snapshot);
}

// =========================================================================
// Weighted schemes
// =========================================================================

#[test]
fn test_weighted_schemes_train_and_stay_consistent() {
    for term_weight in [TermWeight::Idf, TermWeight::Pmi] {
        let mut model = LatentDirichletAllocation::new(3)
            .with_term_weight(term_weight)
            .with_random_seed(29);
        for id in 0..5u32 {
            let words: Vec<u32> = (0..15).map(|t| (id * 2 + t) % 8).collect();
            model.add_document(&words).expect("add");
        }
        model.prepare(true, 0, 0).expect("prepare");
        model.train(40, 2).expect("train");

        assert_invariants(&model, 1e-2);
        assert!(model.log_likelihood().expect("ll").is_finite());

        let doc = model.make_document(&[0, 1, 2]).expect("make");
        let lls = model.infer(&mut [doc], 15, 0.0, false, 2).expect("infer");
        assert!(lls[0].is_finite(), "{term_weight}: non-finite held-out ll");
    }
}

#[test]
fn test_idf_downweights_ubiquitous_words() {
    // Word 0 appears in every document (idf 0), word 1 in only one.
    let mut model = LatentDirichletAllocation::new(2)
        .with_term_weight(TermWeight::Idf)
        .with_random_seed(12);
    model.add_document(&[0, 1, 1]).expect("add");
    model.add_document(&[0, 2]).expect("add");
    model.add_document(&[0, 3]).expect("add");
    model.prepare(true, 0, 0).expect("prepare");

    match model.state.as_ref().expect("prepared") {
        CountState::Weighted(c) => {
            let w0 = c.mapping[0] as usize;
            assert!(c.vocab_weights[w0].abs() < 1e-6);
            let w1 = c.mapping[1] as usize;
            assert!((c.vocab_weights[w1] - 3.0f32.ln()).abs() < 1e-6);
        }
        CountState::Unweighted(_) => unreachable!("idf model is weighted"),
    }
}

// =========================================================================
// Vocabulary trimming and lifecycle extras
// =========================================================================

#[test]
fn test_remove_top_n_drops_most_frequent() {
    let mut model = LatentDirichletAllocation::new(2).with_random_seed(17);
    model.add_document(&[0, 0, 0, 0, 1, 1, 2]).expect("add");
    model.add_document(&[0, 1, 2, 2]).expect("add");
    model.prepare(true, 0, 1).expect("prepare");

    // Word 0 (cf 5) is gone; words 1 and 2 remain.
    assert_eq!(model.vocab_size(), Some(2));
    let mapping = model.vocab_mapping().expect("mapping");
    assert!(mapping[0] >= 2);
    assert!(mapping[1] < 2 && mapping[2] < 2);
}

#[test]
fn test_serde_round_trip_resumes_training() {
    let mut model = two_cluster_model(TermWeight::One, 37);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(10, 1).expect("train");
    let counts_before = model.count_by_topic().expect("counts");

    let json = serde_json::to_string(&model).expect("serialize");
    let mut restored: LatentDirichletAllocation =
        serde_json::from_str(&json).expect("deserialize");

    // The refresh pass rebuilds per-document counts from the restored
    // assignments without disturbing them.
    restored.prepare(false, 0, 0).expect("refresh");
    assert_eq!(restored.count_by_topic().expect("counts"), counts_before);
    assert_eq!(restored.rounds_done(), 10);

    restored.train(10, 1).expect("resume training");
    assert_eq!(restored.rounds_done(), 20);
    assert_invariants(&restored, 0.0);
}

#[test]
fn test_rounds_accumulate_across_train_calls() {
    let mut model = two_cluster_model(TermWeight::One, 41);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(3, 1).expect("train");
    model.train(4, 2).expect("train");
    assert_eq!(model.rounds_done(), 7);
}

#[test]
fn test_zero_workers_uses_hardware_parallelism() {
    let mut model = two_cluster_model(TermWeight::One, 43);
    model.prepare(true, 0, 0).expect("prepare");
    model.train(5, 0).expect("train");
    assert_invariants(&model, 0.0);
}
