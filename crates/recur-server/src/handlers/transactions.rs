//! Transaction handlers
//!
//! Both endpoints answer with the caller's active recurring groups, recomputed
//! from their full stored history.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tracing::info;

use crate::{AppError, AppState, CurrentUser};
use recur_core::{validate_batch, NewTransaction, RecurrenceDetector, RecurringGroup};

/// GET /api/transactions - Active recurring groups for the caller
pub async fn list_recurring(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<RecurringGroup>>, AppError> {
    let groups = RecurrenceDetector::new(&state.db).recurring_for_owner(&user, state.now())?;
    Ok(Json(groups))
}

/// POST /api/transactions - Validate and store a batch, then recompute
///
/// The batch is rejected as a whole if any item fails validation or belongs
/// to someone other than the caller.
pub async fn submit_transactions(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<Vec<NewTransaction>>, JsonRejection>,
) -> Result<Json<Vec<RecurringGroup>>, AppError> {
    let Json(batch) = body.map_err(|e| AppError::bad_request(&e.body_text()))?;

    let now = state.now();
    let transactions = validate_batch(&batch, &user, now)?;
    let stored = state.db.upsert_transactions(&transactions)?;
    info!(user = %user, count = stored, "Stored transaction batch");

    let groups = RecurrenceDetector::new(&state.db).recurring_for_owner(&user, now)?;
    Ok(Json(groups))
}
