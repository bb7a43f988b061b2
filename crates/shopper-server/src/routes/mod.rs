pub mod agents;
pub mod chat;
pub mod tools;

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope shared by every JSON route: `{"success": true, "data": …}`.
pub(crate) fn envelope(data: impl Serialize) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
