//! Model directories: `config.json`, `vocab.txt` and `model.bin` side by side.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::checkpoint;
use crate::error::LoadError;
use crate::generator::LocalGenerator;
use crate::model::{ModelArgs, Transformer};
use crate::tokenizer::{kitchen_vocabulary, Tokenizer};

pub const CONFIG_FILE: &str = "config.json";
pub const VOCAB_FILE: &str = "vocab.txt";
pub const WEIGHTS_FILE: &str = "model.bin";

/// Loads a generator from `dir`, checking that the three files agree.
pub fn load_model_dir(dir: &Path) -> Result<LocalGenerator, LoadError> {
    info!(dir = %dir.display(), "loading model and tokenizer");

    let config_path = dir.join(CONFIG_FILE);
    let raw = fs::read_to_string(&config_path).map_err(|e| LoadError::io(&config_path, e))?;
    let args: ModelArgs = serde_json::from_str(&raw).map_err(|source| LoadError::Json {
        path: config_path.clone(),
        source,
    })?;
    args.validate()?;

    let tokenizer = Tokenizer::from_file(&dir.join(VOCAB_FILE))?;
    if tokenizer.vocab_size() != args.vocab_size {
        return Err(LoadError::InvalidConfig(format!(
            "{CONFIG_FILE} declares {} tokens but {VOCAB_FILE} has {}",
            args.vocab_size,
            tokenizer.vocab_size()
        )));
    }
    let model = checkpoint::load(&dir.join(WEIGHTS_FILE), &args)?;
    let generator = LocalGenerator::new(model, tokenizer)?;

    info!(
        vocab_size = args.vocab_size,
        n_layers = args.n_layers,
        dim = args.dim,
        "model and tokenizer loaded"
    );
    Ok(generator)
}

/// Writes `generator` as a model directory, creating `dir` if needed.
pub fn write_model_dir(dir: &Path, generator: &LocalGenerator) -> Result<(), LoadError> {
    fs::create_dir_all(dir).map_err(|e| LoadError::io(dir, e))?;

    let config_path = dir.join(CONFIG_FILE);
    let config = serde_json::to_string_pretty(&generator.model().args).map_err(|source| {
        LoadError::Json {
            path: config_path.clone(),
            source,
        }
    })?;
    fs::write(&config_path, config).map_err(|e| LoadError::io(&config_path, e))?;

    generator.tokenizer().save(&dir.join(VOCAB_FILE))?;
    checkpoint::save(generator.model(), &dir.join(WEIGHTS_FILE))
}

/// Untrained model over the built-in cooking vocabulary.
pub fn demo_generator(seed: u64) -> Result<LocalGenerator, LoadError> {
    let tokenizer = Tokenizer::new(kitchen_vocabulary())?;
    let model = Transformer::seeded(ModelArgs::for_vocab(tokenizer.vocab_size()), seed);
    LocalGenerator::new(model, tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn written_directory_loads_back() {
        let dir = tempdir().unwrap();
        let generator = demo_generator(1).unwrap();
        write_model_dir(dir.path(), &generator).unwrap();

        let loaded = load_model_dir(dir.path()).unwrap();
        assert_eq!(loaded.model().args, generator.model().args);
        assert_eq!(loaded.tokenizer().vocab_size(), generator.tokenizer().vocab_size());
        assert_eq!(
            loaded.model().forward(&[0, 4, 9]),
            generator.model().forward(&[0, 4, 9])
        );
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_model_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn vocab_and_config_must_agree() {
        let dir = tempdir().unwrap();
        write_model_dir(dir.path(), &demo_generator(1).unwrap()).unwrap();
        fs::write(
            dir.path().join(VOCAB_FILE),
            "<|unk|>\n<|endoftext|>\nsalt\n",
        )
        .unwrap();
        let err = load_model_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_config_is_json_error() {
        let dir = tempdir().unwrap();
        write_model_dir(dir.path(), &demo_generator(1).unwrap()).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ \"dim\": ").unwrap();
        assert!(matches!(load_model_dir(dir.path()), Err(LoadError::Json { .. })));
    }
}
