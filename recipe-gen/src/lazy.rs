//! The process-wide model handle: loaded on first use, never reloaded.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{error, info};

use crate::artifacts::load_model_dir;
use crate::error::LoadError;
use crate::generator::TextGenerator;

pub type SharedGenerator = Arc<dyn TextGenerator>;

/// Produces the generator the first time it is needed.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<SharedGenerator, LoadError>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<SharedGenerator, LoadError> + Send + Sync,
{
    fn load(&self) -> Result<SharedGenerator, LoadError> {
        self()
    }
}

/// Loads a model directory from disk.
#[derive(Debug, Clone)]
pub struct DirLoader {
    dir: PathBuf,
}

impl DirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModelLoader for DirLoader {
    fn load(&self) -> Result<SharedGenerator, LoadError> {
        Ok(Arc::new(load_model_dir(&self.dir)?))
    }
}

/// One-shot lazy singleton around a [`ModelLoader`].
///
/// The first [`get`](Self::get) runs the loader; its outcome, success or
/// failure, is what every later call sees.
pub struct LazyModel<L> {
    loader: L,
    cell: OnceLock<Result<SharedGenerator, Arc<LoadError>>>,
}

impl<L> fmt::Debug for LazyModel<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModel")
            .field("state", &self.state())
            .finish()
    }
}

impl<L: ModelLoader> LazyModel<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Result<SharedGenerator, Arc<LoadError>> {
        self.cell
            .get_or_init(|| match self.loader.load() {
                Ok(generator) => {
                    info!(?generator, "model ready");
                    Ok(generator)
                }
                Err(e) => {
                    error!(error = %e, "error loading model");
                    Err(Arc::new(e))
                }
            })
            .clone()
    }
}

impl<L> LazyModel<L> {
    /// `None` until the first load attempt finishes.
    pub fn state(&self) -> Option<Result<(), String>> {
        self.cell
            .get()
            .map(|r| r.as_ref().map(|_| ()).map_err(|e| e.to_string()))
    }
}
