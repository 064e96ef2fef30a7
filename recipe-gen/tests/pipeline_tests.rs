//! End-to-end checks against a model directory written to disk.

use std::collections::HashSet;

use recipe_gen::artifacts::{demo_generator, load_model_dir, write_model_dir};
use recipe_gen::prompt::{RecipeForm, DEFAULT_MAX_TOKENS};
use recipe_gen::session::generate_options;
use recipe_gen::{DirLoader, GenerateOptions, GenerationRequest, LocalGenerator, Phase, RecipeSession, TextGenerator};
use tempfile::{tempdir, TempDir};

fn model_dir() -> TempDir {
    let dir = tempdir().unwrap();
    write_model_dir(dir.path(), &demo_generator(17).unwrap()).unwrap();
    dir
}

fn options_for(generator: &LocalGenerator, seed: u64) -> GenerateOptions {
    let request = GenerationRequest::from_form(&RecipeForm::default()).unwrap();
    generate_options(&request, generator.eos_token_id(), Some(seed))
}

#[test]
fn seeded_generation_is_repeatable_and_echoes_prompt() {
    let dir = model_dir();
    let generator = load_model_dir(dir.path()).unwrap();
    let prompt = "TITLE: spicy chicken pasta\nINGREDIENTS: chicken, pasta\nRECIPE:";

    let a = generator.generate(prompt, &options_for(&generator, 8)).unwrap();
    let b = generator.generate(prompt, &options_for(&generator, 8)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 1);
    assert!(a[0].generated_text.starts_with(prompt));
}

#[test]
fn continuation_never_repeats_a_bigram() {
    let generator = demo_generator(23).unwrap();
    let prompt_ids = generator
        .tokenizer()
        .encode("TITLE: garlic pasta\nINGREDIENTS: garlic, pasta, olive oil\nRECIPE:");

    for seed in 0..5 {
        let new_ids = generator
            .sample_continuations(&prompt_ids, &options_for(&generator, seed))
            .unwrap()
            .remove(0);
        let all: Vec<usize> = prompt_ids.iter().chain(new_ids.iter()).copied().collect();
        let mut seen: HashSet<(usize, usize)> = all[..prompt_ids.len()]
            .windows(2)
            .map(|w| (w[0], w[1]))
            .collect();
        for i in prompt_ids.len()..all.len() {
            assert!(seen.insert((all[i - 1], all[i])), "bigram repeated with seed {seed}");
        }
    }
}

#[test]
fn stops_at_eos_and_respects_budget() {
    let generator = demo_generator(3).unwrap();
    let eos = generator.eos_token_id();
    let prompt_ids = generator.tokenizer().encode("TITLE: soup\nINGREDIENTS: water\nRECIPE:");

    for seed in 0..10 {
        let mut options = options_for(&generator, seed);
        options.max_new_tokens = 60;
        let new_ids = generator
            .sample_continuations(&prompt_ids, &options)
            .unwrap()
            .remove(0);
        assert!(new_ids.len() <= 60);
        assert!(!new_ids.contains(&generator.tokenizer().unk_token_id()));
        if let Some(pos) = new_ids.iter().position(|&id| id == eos) {
            assert_eq!(pos, new_ids.len() - 1);
        }
    }
}

#[test]
fn session_runs_against_model_directory() {
    let dir = model_dir();
    let session = RecipeSession::new(DirLoader::new(dir.path())).with_seed(1);
    session.warm_up().unwrap();
    assert_eq!(session.model_ready(), Some(true));

    let card = session.submit(&RecipeForm::default()).unwrap();
    assert_eq!(card.heading, "Spicy Chicken Pasta");
    assert!(card.result.raw_text.starts_with(
        "TITLE: spicy chicken pasta\nINGREDIENTS: chicken breast, pasta, cayenne pepper, olive oil, garlic, tomatoes\nRECIPE:"
    ));
    assert!(!card.result.display_text.contains("<|endoftext|>"));
    assert_eq!(card.result.display_text, card.result.display_text.trim());
    assert_eq!(session.phase(), Phase::Idle);
}

#[test]
fn session_without_model_directory_is_unavailable() {
    let dir = tempdir().unwrap();
    let session = RecipeSession::new(DirLoader::new(dir.path().join("missing")));
    let err = session
        .submit(&RecipeForm::default().with_max_tokens(DEFAULT_MAX_TOKENS))
        .unwrap_err();
    assert!(err.is_fatal());
}
