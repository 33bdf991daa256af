//! HTTP handlers for the WASM rendezvous relay
//!
//! Signaling requests are plain JSON POSTs; clients poll with `recv` instead
//! of holding a connection open.

use crate::error::SignalingError;
use crate::protocol::SignalResponse;
use crate::state::ServerState;
use http::StatusCode;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE, HeaderValue,
};
use serde_json::json;
use tracing::{debug, warn};
use wstd::http::{Body, Method, Request, Response};

/// Build a response with the CORS origin header every reply carries
fn response(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = response(status, Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `{ "error": ... }` body for a failed request
pub fn error_body(err: &SignalingError) -> String {
    json!({ "error": err.to_string() }).to_string()
}

fn error_response(err: &SignalingError) -> Response<Body> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    json_response(status, error_body(err))
}

/// Handle CORS preflight
fn handle_cors_preflight() -> Response<Body> {
    let mut response = response(StatusCode::NO_CONTENT, Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

/// Handle a signaling POST
async fn handle_signal(request: Request<Body>, state: &ServerState) -> Response<Body> {
    let mut body = request.into_body();
    let body_str = match body.str_contents().await {
        Ok(s) => s.to_string(),
        Err(e) => {
            let err = SignalingError::InvalidBody(format!("{e:?}"));
            warn!("Failed to read request body: {}", err);
            return error_response(&err);
        }
    };

    match state.handle_body(&body_str) {
        Ok(reply) => match reply_body(&reply) {
            Ok(json) => json_response(StatusCode::OK, json),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal error" }).to_string(),
                )
            }
        },
        Err(err) => {
            debug!("Rejected signaling request: {}", err);
            error_response(&err)
        }
    }
}

/// Serialize a successful reply; exposed for callers embedding the relay
/// behind another transport.
pub fn reply_body(reply: &SignalResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string(reply)
}

/// Handle an HTTP request - main router
pub async fn handle_request(
    request: Request<Body>,
    state: &ServerState,
) -> Result<Response<Body>, wstd::http::Error> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // CORS preflight
    if method == Method::OPTIONS {
        return Ok(handle_cors_preflight());
    }

    // Health check
    if method == Method::GET && path == "/health" {
        return Ok(response(StatusCode::OK, Body::from("OK")));
    }

    if method == Method::POST {
        return Ok(handle_signal(request, state).await);
    }

    debug!("Rejected {} {}", method, path);
    Ok(error_response(&SignalingError::UnsupportedTransportMethod))
}
