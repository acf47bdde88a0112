use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// ApiJson
///
/// `axum::Json` whose rejections (malformed JSON, wrong field types, missing content
/// type) are reported as `AppError` validation bodies instead of plain text.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// ApiQuery
///
/// `axum::extract::Query` with the same error shape as `ApiJson`.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
