//! Invariant contract tests for the trained model, driven by proptest.
//!
//! The public readouts expose the sufficient-statistics invariants
//! directly: the per-topic word distribution normalizes exactly when the
//! topic-word matrix rows sum to the topic totals, the per-document
//! topic distribution normalizes when document counts match the summed
//! token weights, and `count_by_topic` must account for every in-vocab
//! token. Training with any worker count, seed, topic count or weighting
//! scheme must preserve all of them.

use proptest::prelude::*;

use crate::{LatentDirichletAllocation, TermWeight};

fn term_weight_strategy() -> impl Strategy<Value = TermWeight> {
    prop_oneof![
        Just(TermWeight::One),
        Just(TermWeight::Idf),
        Just(TermWeight::Pmi),
    ]
}

fn corpus_strategy() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(0u32..10, 0..20), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn contract_distributions_stay_normalized_after_training(
        docs in corpus_strategy(),
        n_topics in 1usize..5,
        workers in 1usize..4,
        term_weight in term_weight_strategy(),
        seed in 0u64..1_000,
    ) {
        let mut model = LatentDirichletAllocation::new(n_topics)
            .with_term_weight(term_weight)
            .with_random_seed(seed)
            .with_optim_interval(0);
        for doc in &docs {
            model.add_document(doc).unwrap();
        }
        model.prepare(true, 0, 0).unwrap();
        model.train(5, workers).unwrap();

        let tol = if term_weight.is_weighted() { 1e-2 } else { 1e-4 };

        prop_assert!(model.alphas().iter().all(|&a| a >= 1e-5));

        // Document-topic distributions normalize (doc counts match the
        // summed token weights; every token in this corpus stays in
        // vocabulary, so the normalizer covers exactly the counted mass).
        for d in 0..docs.len() {
            let theta = model.topics_by_doc(d).unwrap();
            prop_assert_eq!(theta.len(), n_topics);
            prop_assert!(theta.iter().all(|&p| p >= 0.0 && p.is_finite()));
            let sum: f64 = theta.iter().map(|&p| f64::from(p)).sum();
            prop_assert!((sum - 1.0).abs() < tol, "theta sum {} for doc {}", sum, d);
        }

        // Topic-word distributions normalize (matrix rows sum to the
        // topic totals).
        let vocab = model.vocab_size().unwrap_or(0);
        if vocab > 0 {
            for topic in 0..n_topics {
                let phi = model.words_by_topic(topic).unwrap();
                prop_assert_eq!(phi.len(), vocab);
                prop_assert!(phi.iter().all(|&p| p >= 0.0 && p.is_finite()));
                let sum: f64 = phi.iter().map(|&p| f64::from(p)).sum();
                prop_assert!((sum - 1.0).abs() < tol, "phi sum {} for topic {}", sum, topic);
            }
        }

        // Every in-vocab token is assigned to exactly one topic.
        let mapping = model.vocab_mapping().unwrap();
        let in_vocab: usize = docs
            .iter()
            .flat_map(|d| d.iter())
            .filter(|&&w| {
                let mapped = mapping.get(w as usize).copied().unwrap_or(w);
                (mapped as usize) < vocab
            })
            .count();
        let counted: usize = model.count_by_topic().unwrap().iter().sum();
        prop_assert_eq!(counted, in_vocab);

        prop_assert!(model.log_likelihood().unwrap().is_finite());
    }

    #[test]
    fn contract_inference_never_mutates_the_model(
        seed in 0u64..500,
        joint in any::<bool>(),
        workers in 1usize..4,
    ) {
        let mut model = LatentDirichletAllocation::new(3)
            .with_random_seed(seed)
            .with_optim_interval(0);
        for id in 0..4u32 {
            let words: Vec<u32> = (0..12).map(|t| (id * 3 + t) % 7).collect();
            model.add_document(&words).unwrap();
        }
        model.prepare(true, 0, 0).unwrap();
        model.train(8, workers).unwrap();

        let snapshot = serde_json::to_string(&model).unwrap();
        let mut docs = vec![
            model.make_document(&[0, 1, 2, 6]).unwrap(),
            model.make_document(&[3, 4]).unwrap(),
        ];
        let lls = model.infer(&mut docs, 10, 0.0, joint, workers).unwrap();

        let expected_len = if joint { 1 } else { docs.len() };
        prop_assert_eq!(lls.len(), expected_len);
        prop_assert!(lls.iter().all(|ll| ll.is_finite()));
        prop_assert_eq!(serde_json::to_string(&model).unwrap(), snapshot);
    }

    #[test]
    fn contract_reruns_with_identical_inputs_match(
        seed in 0u64..500,
        workers in 1usize..4,
    ) {
        let run = || {
            let mut model = LatentDirichletAllocation::new(2).with_random_seed(seed);
            model.add_document(&[0, 1, 2, 3, 0, 1]).unwrap();
            model.add_document(&[2, 3, 4, 4]).unwrap();
            model.add_document(&[0, 4, 2]).unwrap();
            model.prepare(true, 0, 0).unwrap();
            model.train(6, workers).unwrap();
            serde_json::to_string(&model).unwrap()
        };
        prop_assert_eq!(run(), run());
    }
}
