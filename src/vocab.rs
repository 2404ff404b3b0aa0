//! Corpus frequency statistics and vocabulary trimming.
//!
//! The surface-form vocabulary itself belongs to a collaborator; documents
//! arrive here already mapped to integer ids. This module computes the
//! collection and document frequencies those ids exhibit in the corpus and
//! produces the compacting remap that drops rare and overly-frequent ids:
//! kept ids move to `[0, real_v)` preserving their relative order, trimmed
//! ids are demoted past the boundary and behave as out-of-vocabulary from
//! then on.

/// Frequency statistics and id remap produced by [`trim`].
#[derive(Debug, Clone)]
pub(crate) struct VocabStats {
    /// Collection frequency per kept id, indexed by new id.
    pub cf: Vec<u32>,
    /// Document frequency per kept id, indexed by new id.
    pub df: Vec<u32>,
    /// Old id -> new id, over the original id space. New ids `>= real_v`
    /// mark trimmed-out words.
    pub mapping: Vec<u32>,
    /// Effective vocabulary size after trimming.
    pub real_v: usize,
}

/// Collection frequency (`cf`) and document frequency (`df`) per id.
///
/// The id space is `[0, max_id + 1)` over all in-document ids; ids a
/// document never uses simply have zero frequency.
pub(crate) fn corpus_frequencies(docs: &[Vec<u32>]) -> (Vec<u32>, Vec<u32>) {
    let v = docs
        .iter()
        .flat_map(|d| d.iter())
        .map(|&w| w as usize + 1)
        .max()
        .unwrap_or(0);
    let mut cf = vec![0u32; v];
    let mut df = vec![0u32; v];
    let mut seen = vec![false; v];
    for doc in docs {
        for &w in doc {
            let w = w as usize;
            cf[w] += 1;
            if !seen[w] {
                seen[w] = true;
                df[w] += 1;
            }
        }
        for &w in doc {
            seen[w as usize] = false;
        }
    }
    (cf, df)
}

/// Trims the vocabulary and builds the compacting remap.
///
/// Ids with `cf < min_word_count` are dropped, as are the `remove_top_n`
/// most frequent ids (ties resolved toward the smaller id). Ids that never
/// occur in the corpus are always dropped, so every kept id has `df >= 1`.
pub(crate) fn trim(cf: &[u32], df: &[u32], min_word_count: u32, remove_top_n: usize) -> VocabStats {
    let v = cf.len();
    let min_cf = min_word_count.max(1);

    let mut keep: Vec<bool> = cf.iter().map(|&c| c >= min_cf).collect();

    if remove_top_n > 0 {
        let mut by_freq: Vec<u32> = (0..v as u32).filter(|&w| keep[w as usize]).collect();
        by_freq.sort_by(|&a, &b| {
            cf[b as usize].cmp(&cf[a as usize]).then(a.cmp(&b))
        });
        for &w in by_freq.iter().take(remove_top_n) {
            keep[w as usize] = false;
        }
    }

    let real_v = keep.iter().filter(|&&k| k).count();
    let mut mapping = vec![0u32; v];
    let mut next_kept = 0u32;
    let mut next_dropped = real_v as u32;
    for (w, &kept) in keep.iter().enumerate() {
        if kept {
            mapping[w] = next_kept;
            next_kept += 1;
        } else {
            mapping[w] = next_dropped;
            next_dropped += 1;
        }
    }

    let mut new_cf = vec![0u32; real_v];
    let mut new_df = vec![0u32; real_v];
    for (w, &kept) in keep.iter().enumerate() {
        if kept {
            let n = mapping[w] as usize;
            new_cf[n] = cf[w];
            new_df[n] = df[w];
        }
    }

    VocabStats {
        cf: new_cf,
        df: new_df,
        mapping,
        real_v,
    }
}

/// Rewrites a token sequence through the trim mapping. Ids beyond the
/// original id space pass through unchanged (they were already OOV and
/// stay `>= real_v`).
pub(crate) fn remap_tokens(tokens: &mut [u32], mapping: &[u32]) {
    for w in tokens.iter_mut() {
        if (*w as usize) < mapping.len() {
            *w = mapping[*w as usize];
        }
    }
}
