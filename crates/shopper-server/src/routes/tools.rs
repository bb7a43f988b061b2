use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::routes::envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupBody {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheBody {
    pub products: Vec<Value>,
}

/// POST /api/tools/{session_id}/products/lookup — cached products whose title
/// contains the query. `hit: false` tells the agent to search the catalog.
pub async fn lookup_products(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<LookupBody>,
) -> Result<Json<Value>, AppError> {
    let tools = app.tools.clone();
    let result = tokio::task::spawn_blocking(move || {
        tools.lookup_cached_products(&session_id, &body.query)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(envelope(result))
}

/// Progress of one cache update, shared between the handler and its blocking
/// task. Whichever side moves it off `RUNNING` first decides the outcome.
const RUNNING: u8 = 0;
const COMMITTING: u8 = 1;
const EXPIRED: u8 = 2;

/// POST /api/tools/{session_id}/products — normalize a batch of search
/// results and merge it into the session cache.
///
/// Writes for one session are serialized. Normalization runs on the blocking
/// pool holding the session lock; the merge is only stored if it starts
/// before the tool timeout, so a 504 leaves the cache untouched.
pub async fn cache_products(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<CacheBody>,
) -> Result<Json<Value>, AppError> {
    let guard = app.session_lock(&session_id).lock_owned().await;
    let phase = Arc::new(AtomicU8::new(RUNNING));

    let mut task = {
        let app = app.clone();
        let phase = phase.clone();
        let sid = session_id.clone();
        tokio::task::spawn_blocking(move || {
            let batch = app.tools.prepare_batch(&sid, body.products);
            let update = phase
                .compare_exchange(RUNNING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
                .then(|| app.tools.commit_batch(&sid, batch));
            drop(guard);
            app.release_session(&sid);
            update
        })
    };

    let joined = match tokio::time::timeout(app.tool_timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_)
            if phase
                .compare_exchange(RUNNING, EXPIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok() =>
        {
            tracing::warn!(%session_id, timeout = ?app.tool_timeout, "cache update timed out");
            return Err(AppError::timeout(format!(
                "cache update for session '{session_id}' exceeded {:?}",
                app.tool_timeout
            )));
        }
        // Normalization finished at the deadline and the merge is under way.
        Err(_) => task.await,
    };

    let update = joined
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?
        .ok_or_else(|| {
            AppError(anyhow::anyhow!(
                "cache update for session '{session_id}' was abandoned"
            ))
        })?;

    Ok(envelope(update))
}

/// DELETE /api/tools/{session_id}/products — discard the session cache.
pub async fn end_session(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let guard = app.session_lock(&session_id).lock_owned().await;
    let tools = app.tools.clone();
    let sid = session_id.clone();
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        tools.end_session(&sid);
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    app.release_session(&session_id);

    Ok(envelope(json!({ "ended": session_id })))
}
