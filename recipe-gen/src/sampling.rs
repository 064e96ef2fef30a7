//! Next-token selection: n-gram bans, temperature, top-k, then a weighted draw.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::GenerationError;

/// Knobs applied to every step of one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    /// 0 keeps the whole vocabulary.
    pub top_k: usize,
    /// 0 disables the constraint.
    pub no_repeat_ngram_size: usize,
}

/// Tokens that would complete an n-gram already present in `history`.
///
/// With `n == 2` this bans every token that previously followed the last
/// token, so no bigram appears twice.
pub fn banned_ngram_tokens(history: &[usize], n: usize) -> Vec<usize> {
    if n == 0 || history.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &history[history.len() - (n - 1)..];
    history
        .windows(n)
        .filter(|window| &window[..n - 1] == prefix)
        .map(|window| window[n - 1])
        .collect()
}

/// Picks the next token from `logits`.
///
/// `suppressed` ids are never chosen. `step` is only used in errors.
pub fn sample_next<R: Rng>(
    logits: &[f32],
    history: &[usize],
    suppressed: &[usize],
    params: &SamplingParams,
    step: usize,
    rng: &mut R,
) -> Result<usize, GenerationError> {
    let mut scores: Vec<f32> = logits.iter().map(|&l| l / params.temperature).collect();

    for id in banned_ngram_tokens(history, params.no_repeat_ngram_size)
        .into_iter()
        .chain(suppressed.iter().copied())
    {
        if let Some(score) = scores.get_mut(id) {
            *score = f32::NEG_INFINITY;
        }
    }

    if params.top_k > 0 && params.top_k < scores.len() {
        let mut sorted: Vec<f32> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        sorted.sort_unstable_by(|a, b| b.total_cmp(a));
        if let Some(&threshold) = sorted.get(params.top_k - 1) {
            for score in scores.iter_mut() {
                if *score < threshold {
                    *score = f32::NEG_INFINITY;
                }
            }
        }
    }

    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Err(GenerationError::NoCandidates { step });
    }
    let weights: Vec<f32> = scores
        .iter()
        .map(|&s| if s.is_finite() { (s - max).exp() } else { 0.0 })
        .collect();
    let dist = WeightedIndex::new(&weights).map_err(|_| GenerationError::NoCandidates { step })?;
    Ok(dist.sample(rng))
}
