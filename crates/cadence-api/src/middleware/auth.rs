use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// Authentication middleware stub - validates API key or bearer token
pub async fn auth_middleware(headers: HeaderMap, request: Request, next: Next) -> Response {
    // Check for API key header or Authorization bearer token
    if let Some(api_key) = headers.get("X-Api-Key") {
        debug!(target: "auth", "API key authentication: {:?}", api_key.to_str().ok());
        // TODO: Validate against stored API keys in database
        return next.run(request).await;
    }

    if let Some(auth_header) = headers.get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if auth_str.starts_with("Bearer ") {
                debug!(target: "auth", "Bearer token authentication");
                // TODO: Validate JWT or session token
                return next.run(request).await;
            }
        }
    }

    // For now, allow all requests (stub mode)
    // TODO: Uncomment to enforce authentication
    // (StatusCode::UNAUTHORIZED, "Missing or invalid authentication").into_response()

    debug!(target: "auth", "No authentication provided, allowing request (stub mode)");
    next.run(request).await
}

/// Response for unauthorized requests
pub async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, "Unauthorized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new().route("/probe", get(|| async { "ok" })).layer(middleware::from_fn(auth_middleware))
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn request_with_no_credentials_still_passes_through_stub_mode() {
        let request = Request::builder().uri("/probe").body(axum::body::Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn request_with_bearer_token_passes_through() {
        let request = Request::builder().uri("/probe").header("Authorization", "Bearer some-token").body(axum::body::Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn request_with_api_key_header_passes_through() {
        let request = Request::builder().uri("/probe").header("X-Api-Key", "some-key").body(axum::body::Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
