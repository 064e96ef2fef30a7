//! Recipe generation: turns a dish title and an ingredient list into a
//! prompt, runs a causal language model on it and cleans up the output.
//!
//! The model sits behind [`TextGenerator`]; [`LocalGenerator`] is the
//! bundled implementation, loaded from a model directory by
//! [`artifacts::load_model_dir`]. Front ends talk to a [`RecipeSession`].

pub mod artifacts;
pub mod checkpoint;
pub mod error;
pub mod fake;
pub mod format;
pub mod generator;
pub mod lazy;
pub mod model;
pub mod prompt;
pub mod sampling;
pub mod session;
pub mod tokenizer;

pub use error::{GenerationError, LoadError, SubmitError};
pub use format::GenerationResult;
pub use generator::{GenerateOptions, GeneratedText, LocalGenerator, TextGenerator};
pub use lazy::{DirLoader, LazyModel, ModelLoader, SharedGenerator};
pub use prompt::{GenerationRequest, RecipeForm};
pub use session::{Phase, RecipeCard, RecipeSession};
