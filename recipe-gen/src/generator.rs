//! The text-generation capability and its local implementation.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{GenerationError, LoadError};
use crate::model::Transformer;
use crate::sampling::{sample_next, SamplingParams};
use crate::tokenizer::Tokenizer;

/// Parameters for one call to [`TextGenerator::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub max_new_tokens: usize,
    pub no_repeat_ngram_size: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub eos_token_id: usize,
    pub pad_token_id: usize,
    pub num_return_sequences: usize,
    /// Fixes the random draws; `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// One returned sequence: the prompt followed by the continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub generated_text: String,
}

/// A causal language model behind a prompt-in, text-out call.
///
/// Implementations are shared read-only across requests and must be
/// thread-safe. Output text starts with the prompt.
pub trait TextGenerator: Send + Sync + fmt::Debug {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError>;

    fn eos_token_id(&self) -> usize;

    /// String form of the end-of-sequence token as it shows up in output.
    fn eos_token(&self) -> &str;
}

/// Runs a [`Transformer`] on this machine.
pub struct LocalGenerator {
    model: Transformer,
    tokenizer: Tokenizer,
}

impl fmt::Debug for LocalGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalGenerator")
            .field("args", &self.model.args)
            .field("vocab_size", &self.tokenizer.vocab_size())
            .finish()
    }
}

impl LocalGenerator {
    pub fn new(model: Transformer, tokenizer: Tokenizer) -> Result<Self, LoadError> {
        if model.args.vocab_size != tokenizer.vocab_size() {
            return Err(LoadError::InvalidConfig(format!(
                "model expects {} tokens but the vocabulary has {}",
                model.args.vocab_size,
                tokenizer.vocab_size()
            )));
        }
        Ok(Self { model, tokenizer })
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn model(&self) -> &Transformer {
        &self.model
    }

    /// Samples `num_return_sequences` continuations of `prompt_ids` and
    /// returns the new token ids only.
    pub fn sample_continuations(
        &self,
        prompt_ids: &[usize],
        options: &GenerateOptions,
    ) -> Result<Vec<Vec<usize>>, GenerationError> {
        self.check_options(options)?;
        if prompt_ids.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        debug!(
            prompt_tokens = prompt_ids.len(),
            max_new_tokens = options.max_new_tokens,
            temperature = options.temperature,
            top_k = options.top_k,
            "generating"
        );

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..options.num_return_sequences)
            .map(|_| self.continue_sequence(prompt_ids, options, &mut rng))
            .collect()
    }

    fn check_options(&self, options: &GenerateOptions) -> Result<(), GenerationError> {
        let vocab = self.tokenizer.vocab_size();
        if !options.temperature.is_finite() || options.temperature <= 0.0 {
            return Err(GenerationError::InvalidOptions(format!(
                "temperature must be positive, got {}",
                options.temperature
            )));
        }
        if options.eos_token_id >= vocab || options.pad_token_id >= vocab {
            return Err(GenerationError::InvalidOptions(format!(
                "eos {} / pad {} outside vocabulary of {vocab}",
                options.eos_token_id, options.pad_token_id
            )));
        }
        if options.num_return_sequences == 0 {
            return Err(GenerationError::InvalidOptions(
                "num_return_sequences must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn continue_sequence(
        &self,
        prompt_ids: &[usize],
        options: &GenerateOptions,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, GenerationError> {
        let params = SamplingParams {
            temperature: options.temperature,
            top_k: options.top_k,
            no_repeat_ngram_size: options.no_repeat_ngram_size,
        };
        let mut suppressed = vec![self.tokenizer.unk_token_id()];
        if options.pad_token_id != options.eos_token_id {
            suppressed.push(options.pad_token_id);
        }

        let mut tokens = prompt_ids.to_vec();
        for step in 0..options.max_new_tokens {
            let logits = self.model.next_token_logits(&tokens).to_vec();
            let next = sample_next(&logits, &tokens, &suppressed, &params, step, rng)?;
            tokens.push(next);
            if next == options.eos_token_id {
                break;
            }
        }
        Ok(tokens.split_off(prompt_ids.len()))
    }
}

impl TextGenerator for LocalGenerator {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedText>, GenerationError> {
        let prompt_ids = self.tokenizer.encode(prompt);
        let continuations = self.sample_continuations(&prompt_ids, options)?;
        Ok(continuations
            .iter()
            .map(|ids| GeneratedText {
                generated_text: format!("{prompt}{}", self.tokenizer.decode(ids)),
            })
            .collect())
    }

    fn eos_token_id(&self) -> usize {
        self.tokenizer.eos_token_id()
    }

    fn eos_token(&self) -> &str {
        self.tokenizer.eos_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelArgs;
    use crate::tokenizer::kitchen_vocabulary;

    fn generator() -> LocalGenerator {
        let tokenizer = Tokenizer::new(kitchen_vocabulary()).unwrap();
        let args = ModelArgs {
            max_seq_len: 32,
            vocab_size: tokenizer.vocab_size(),
            dim: 16,
            n_layers: 1,
            n_heads: 2,
            hidden_dim: 32,
        };
        LocalGenerator::new(Transformer::seeded(args, 5), tokenizer).unwrap()
    }

    fn options(g: &LocalGenerator) -> GenerateOptions {
        GenerateOptions {
            max_new_tokens: 30,
            no_repeat_ngram_size: 2,
            temperature: 0.7,
            top_k: 50,
            eos_token_id: g.eos_token_id(),
            pad_token_id: g.eos_token_id(),
            num_return_sequences: 1,
            seed: Some(42),
        }
    }

    #[test]
    fn rejects_vocab_mismatch() {
        let tokenizer = Tokenizer::new(kitchen_vocabulary()).unwrap();
        let model = Transformer::seeded(ModelArgs::for_vocab(3), 1);
        assert!(LocalGenerator::new(model, tokenizer).is_err());
    }

    #[test]
    fn rejects_bad_options() {
        let g = generator();
        let mut opts = options(&g);
        opts.temperature = 0.0;
        assert!(matches!(g.generate("TITLE:", &opts), Err(GenerationError::InvalidOptions(_))));

        let mut opts = options(&g);
        opts.pad_token_id = 10_000;
        assert!(matches!(g.generate("TITLE:", &opts), Err(GenerationError::InvalidOptions(_))));
    }

    #[test]
    fn empty_prompt_is_an_error() {
        let g = generator();
        assert_eq!(g.generate("", &options(&g)), Err(GenerationError::EmptyPrompt));
    }

    #[test]
    fn returns_requested_number_of_sequences() {
        let g = generator();
        let mut opts = options(&g);
        opts.num_return_sequences = 3;
        let out = g.generate("TITLE: soup", &opts).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|o| o.generated_text.starts_with("TITLE: soup")));
    }
}
