//! Admin API endpoints
//!
//! Ledger maintenance. Intended for operators; bind the server to a private
//! interface when exposing these.

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::error::AppError;
use crate::ledger::{InitOutcome, LedgerRow};
use crate::service::{Pipeline, PipelineVariant};

/// Create admin router
///
/// Routes:
/// - POST /admin/ledger/init - Create missing ledgers
/// - GET /admin/ledger/:entry_point - List recorded rows
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/ledger/init", post(init_ledgers))
        .route("/ledger/:entry_point", get(list_rows))
}

/// Initialization result per entry point
#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub social: &'static str,
    pub tweets: &'static str,
}

fn outcome_name(outcome: InitOutcome) -> &'static str {
    match outcome {
        InitOutcome::Created => "created",
        InitOutcome::TableAdded => "table_added",
        InitOutcome::AlreadyInitialized => "already_initialized",
    }
}

/// POST /admin/ledger/init
///
/// Creates the ledger snapshot and both tables when missing. Existing rows
/// are never touched.
async fn init_ledgers(State(state): State<AppState>) -> Result<Json<InitResponse>, AppError> {
    // Sequential: both tables may live in the same snapshot object.
    let social = state.social.ledger().initialize().await?;
    let tweets = state.tweets.ledger().initialize().await?;

    tracing::info!(?social, ?tweets, "Ledger initialization finished");

    Ok(Json(InitResponse {
        social: outcome_name(social),
        tweets: outcome_name(tweets),
    }))
}

/// GET /admin/ledger/:entry_point
async fn list_rows(
    State(state): State<AppState>,
    Path(entry_point): Path<String>,
) -> Result<Json<Vec<LedgerRow>>, AppError> {
    let pipeline: &Pipeline = [&state.social, &state.tweets]
        .into_iter()
        .find(|pipeline| pipeline.variant().entry_point() == entry_point)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "unknown entry point {:?}; expected {} or {}",
                entry_point,
                PipelineVariant::Social.entry_point(),
                PipelineVariant::TweetOnly.entry_point()
            ))
        })?;

    Ok(Json(pipeline.ledger().rows().await?))
}
