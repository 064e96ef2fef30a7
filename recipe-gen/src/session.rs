//! One user-facing session: validate, build the prompt, generate, format.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, info, instrument};

use crate::error::{GenerationError, SubmitError};
use crate::format::{format_generation, GenerationResult};
use crate::generator::GenerateOptions;
use crate::lazy::{LazyModel, ModelLoader};
use crate::prompt::{title_case, GenerationRequest, RecipeForm};

pub const TOP_K: usize = 50;
pub const NO_REPEAT_NGRAM_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
}

/// What the output region shows after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCard {
    pub heading: String,
    pub result: GenerationResult,
}

/// Options for the model call; the sampling constants are fixed here.
pub fn generate_options(request: &GenerationRequest, eos_token_id: usize, seed: Option<u64>) -> GenerateOptions {
    GenerateOptions {
        max_new_tokens: request.max_tokens,
        no_repeat_ngram_size: NO_REPEAT_NGRAM_SIZE,
        temperature: request.temperature,
        top_k: TOP_K,
        eos_token_id,
        pad_token_id: eos_token_id,
        num_return_sequences: 1,
        seed,
    }
}

/// Holds the lazily loaded model and runs submissions against it.
///
/// Submissions are independent: a failure ends that request only, except a
/// model that never loaded, which fails every request.
#[derive(Debug)]
pub struct RecipeSession<L> {
    model: LazyModel<L>,
    in_flight: AtomicUsize,
    seed: Option<u64>,
}

impl<L: ModelLoader> RecipeSession<L> {
    pub fn new(loader: L) -> Self {
        Self {
            model: LazyModel::new(loader),
            in_flight: AtomicUsize::new(0),
            seed: None,
        }
    }

    /// Fixes the sampling seed for every submission.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            Phase::Idle
        } else {
            Phase::Generating
        }
    }

    /// Loads the model now instead of on the first submission.
    pub fn warm_up(&self) -> Result<(), SubmitError> {
        self.model
            .get()
            .map(|_| ())
            .map_err(|e| SubmitError::ModelUnavailable(e.to_string()))
    }

    /// `None` before the first load attempt, then whether it worked.
    pub fn model_ready(&self) -> Option<bool> {
        self.model.state().map(|s| s.is_ok())
    }

    #[instrument(skip_all, fields(title = %form.title))]
    pub fn submit(&self, form: &RecipeForm) -> Result<RecipeCard, SubmitError> {
        let request = GenerationRequest::from_form(form)?;
        let generator = self
            .model
            .get()
            .map_err(|e| SubmitError::ModelUnavailable(e.to_string()))?;

        let _busy = Busy::enter(&self.in_flight);
        let prompt = request.prompt();
        let options = generate_options(&request, generator.eos_token_id(), self.seed);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&prompt, &options)))
            .unwrap_or_else(|payload| Err(GenerationError::Backend(panic_message(payload))));
        let outputs = outcome.map_err(|e| {
            error!(error = %e, "generation failed");
            SubmitError::Generation(e)
        })?;
        let first = outputs.into_iter().next().ok_or_else(|| {
            SubmitError::Generation(GenerationError::Backend("model returned no sequences".into()))
        })?;

        let result = format_generation(&first.generated_text, &prompt, generator.eos_token());
        info!(chars = result.display_text.len(), "recipe generated");
        Ok(RecipeCard {
            heading: title_case(&form.title),
            result,
        })
    }
}

/// Marks a generation in flight until dropped, on every exit path.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "generation panicked".to_string()
    }
}
