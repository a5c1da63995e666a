//! Response envelope — success bodies are `{"data": …}` with an optional
//! `"meta"` object for pagination hints.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// 200 with `{data}`.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data, meta: None })
}

/// 200 with `{data, meta}`.
pub fn ok_with_meta<T: Serialize>(data: T, meta: serde_json::Value) -> Json<Envelope<T>> {
    Json(Envelope { data, meta: Some(meta) })
}

/// 201 with `{data}`.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope { data, meta: None }))
}
