//! Write a model directory for the bundled cooking vocabulary.
//!
//! The weights are random (seeded), which is enough to exercise the whole
//! pipeline without a trained checkpoint.

use std::path::PathBuf;
use std::process::ExitCode;

use recipe_gen::artifacts::{demo_generator, write_model_dir};
use recipe_gen::LoadError;

/// Application that writes `config.json`, `vocab.txt` and `model.bin`.
pub struct ExportApp {
    output: PathBuf,
    seed: u64,
}

impl ExportApp {
    pub fn new(output: PathBuf, seed: u64) -> Self {
        Self { output, seed }
    }

    pub fn run(&self) -> Result<(), LoadError> {
        let generator = demo_generator(self.seed)?;
        write_model_dir(&self.output, &generator)?;
        println!("Saved model directory to {:?}", self.output);
        Ok(())
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let (output, seed) = match args.as_slice() {
        [_, output] => (output, Ok(0)),
        [_, output, seed] => (output, seed.parse::<u64>()),
        _ => {
            eprintln!("usage: export_model <output-dir> [seed]");
            return ExitCode::FAILURE;
        }
    };
    let Ok(seed) = seed else {
        eprintln!("seed must be a non-negative integer");
        return ExitCode::FAILURE;
    };

    let app = ExportApp::new(PathBuf::from(output), seed);
    if let Err(e) = app.run() {
        eprintln!("export failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
