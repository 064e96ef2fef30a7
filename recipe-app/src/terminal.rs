//! Terminal front ends: a one-shot command and an interactive loop.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use recipe_gen::{ModelLoader, RecipeCard, RecipeForm, RecipeSession};

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub temperature: f32,
    pub max_tokens: usize,
}

fn print_card(out: &mut impl Write, card: &RecipeCard) -> io::Result<()> {
    writeln!(out, "{}", card.heading)?;
    writeln!(out, "{}", "=".repeat(card.heading.chars().count()))?;
    writeln!(out, "{}", card.result.display_text)
}

/// Prints one recipe; failures go to stderr and the exit code.
pub fn generate_once<L: ModelLoader>(
    session: &RecipeSession<L>,
    form: &RecipeForm,
    out: &mut impl Write,
) -> io::Result<ExitCode> {
    match session.submit(form) {
        Ok(card) => {
            print_card(out, &card)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn prompt_line(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> io::Result<Option<String>> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Asks for a title and ingredients until `/exit`, an empty title or end of
/// input. A failed request is reported and the loop carries on.
pub fn run_interactive<L: ModelLoader>(
    session: &RecipeSession<L>,
    settings: Settings,
    mut input: impl BufRead,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "AI Recipe Generator")?;
    writeln!(out, "===================")?;
    writeln!(out, "Leave the title empty or type '/exit' to quit.")?;
    writeln!(out)?;

    loop {
        let title = match prompt_line(&mut input, out, "What do you want to make? ")? {
            Some(t) if !t.trim().is_empty() && t.trim() != "/exit" => t,
            _ => break,
        };
        let Some(ingredients) = prompt_line(&mut input, out, "What ingredients do you have? ")? else {
            break;
        };

        let form = RecipeForm::new(title, ingredients)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens);
        match session.submit(&form) {
            Ok(card) => print_card(out, &card)?,
            Err(e) if e.is_fatal() => {
                writeln!(out, "{e}")?;
                return Ok(());
            }
            Err(e) => writeln!(out, "{e}")?,
        }
        writeln!(out)?;
    }

    writeln!(out, "Goodbye!")?;
    Ok(())
}
