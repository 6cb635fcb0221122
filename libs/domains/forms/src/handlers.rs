use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::{FormError, FormResult};
use crate::providers::MailTransport;
use crate::service::FormsService;

/// Create the submission router
///
/// `POST /` accepts a submission; any other method gets `405`.
pub fn router<T: MailTransport + 'static>(service: FormsService<T>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", post(submit::<T>).fallback(method_not_allowed))
        .with_state(shared_service)
}

/// Handle a form submission
async fn submit<T: MailTransport + 'static>(
    State(service): State<Arc<FormsService<T>>>,
    headers: HeaderMap,
    body: Bytes,
) -> FormResult<Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .ok_or_else(|| FormError::InvalidContentType("missing Content-Type header".to_string()))?
        .to_str()
        .map_err(|_| FormError::InvalidContentType("non-ASCII Content-Type header".to_string()))?;

    let outcome = service.submit(content_type, &body).await?;
    let ok = Json(json!({ "ok": true }));

    Ok(match outcome.redirect {
        Some(location) => (StatusCode::SEE_OTHER, [(header::LOCATION, location)], ok).into_response(),
        None => (StatusCode::OK, ok).into_response(),
    })
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "ok": false, "error": "Method not allowed" })),
    )
}
