//! HTTP front end: the recipe form, its submission handler and a health probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Router};
use recipe_gen::{ModelLoader, RecipeForm, RecipeSession};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::page::{render_page, Output};

pub fn router<L: ModelLoader + 'static>(session: Arc<RecipeSession<L>>) -> Router {
    Router::new()
        .route("/", get(index::<L>))
        .route("/generate", post(generate::<L>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(session)
}

/// Loads the model in the background and serves until the listener fails.
pub async fn serve<L: ModelLoader + 'static>(
    session: Arc<RecipeSession<L>>,
    bind: SocketAddr,
) -> anyhow::Result<()> {
    let warm = session.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = warm.warm_up() {
            error!(error = %e, "model warm-up failed");
        }
    });

    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(session)).await?;
    Ok(())
}

async fn index<L: ModelLoader + 'static>(State(session): State<Arc<RecipeSession<L>>>) -> Html<String> {
    Html(render_page(
        &RecipeForm::default(),
        &Output::Placeholder,
        session.model_ready(),
    ))
}

async fn generate<L: ModelLoader + 'static>(
    State(session): State<Arc<RecipeSession<L>>>,
    Form(form): Form<RecipeForm>,
) -> Html<String> {
    let worker = session.clone();
    let submitted = form.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.submit(&submitted)).await;

    let output = match outcome {
        Ok(Ok(card)) => Output::Recipe(card),
        Ok(Err(e)) => Output::Error(e.to_string()),
        Err(e) => {
            error!(error = %e, "generation task aborted");
            Output::Error(format!("An error occurred during generation: {e}"))
        }
    };
    Html(render_page(&form, &output, session.model_ready()))
}

async fn health() -> &'static str {
    "ok"
}
