use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The authenticated caller's user id.
///
/// The upstream gateway authenticates the caller and forwards their user id
/// as `x-user-id`; a missing or malformed header means the request never went
/// through the gateway and the extractor answers 401 with the error envelope.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = CallerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_user_id_header(parts.headers.get("x-user-id"))
            .map(CallerId)
            .ok_or(CallerRejection)
    }
}

#[derive(Debug)]
pub struct CallerRejection;

#[derive(Debug, Serialize)]
struct UnauthorizedBody {
    success: bool,
    error: bool,
    message: &'static str,
}

impl IntoResponse for CallerRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(UnauthorizedBody {
                success: false,
                error: true,
                message: "missing or invalid x-user-id header",
            }),
        )
            .into_response()
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

fn parse_user_id_header(value: Option<&HeaderValue>) -> Option<Uuid> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_id_header_accepts_valid_uuid() {
        let id = Uuid::new_v4();
        let header = HeaderValue::from_str(&id.to_string()).unwrap();
        assert_eq!(parse_user_id_header(Some(&header)), Some(id));
    }

    #[test]
    fn parse_user_id_header_rejects_garbage() {
        let header = HeaderValue::from_static("not-a-uuid");
        assert_eq!(parse_user_id_header(Some(&header)), None);
        assert_eq!(parse_user_id_header(None), None);
    }

    #[test]
    fn caller_rejection_uses_the_error_envelope() {
        let response = CallerRejection.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
