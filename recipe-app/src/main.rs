use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recipe_gen::prompt::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use recipe_gen::{DirLoader, RecipeForm, RecipeSession};
use tracing_subscriber::EnvFilter;

mod page;
mod terminal;
mod web;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding config.json, vocab.txt and model.bin
    #[arg(long, env = "RECIPE_MODEL_DIR", default_value = "model", global = true)]
    model_dir: PathBuf,

    /// Fixed sampling seed for repeatable output
    #[arg(long, env = "RECIPE_SEED", global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one recipe and print it
    Generate {
        /// What do you want to make?
        #[arg(long)]
        title: String,

        /// Ingredients, separated by commas
        #[arg(long)]
        ingredients: String,

        /// Sampling temperature (0.2 to 1.5)
        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        /// Maximum new tokens (50 to 250)
        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,
    },

    /// Ask for recipes in a loop
    Interactive {
        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,
    },

    /// Serve the recipe form over HTTP
    Serve {
        #[arg(long, env = "RECIPE_BIND", default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let mut session = RecipeSession::new(DirLoader::new(&args.model_dir));
    if let Some(seed) = args.seed {
        session = session.with_seed(seed);
    }

    match args.command {
        Command::Generate {
            title,
            ingredients,
            temperature,
            max_tokens,
        } => {
            let form = RecipeForm::new(title, ingredients)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens);
            let mut stdout = std::io::stdout().lock();
            Ok(terminal::generate_once(&session, &form, &mut stdout)?)
        }
        Command::Interactive {
            temperature,
            max_tokens,
        } => {
            let settings = terminal::Settings {
                temperature,
                max_tokens,
            };
            let stdin = std::io::stdin().lock();
            let mut stdout = std::io::stdout().lock();
            terminal::run_interactive(&session, settings, stdin, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { bind } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::serve(Arc::new(session), bind))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
