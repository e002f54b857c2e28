use crate::error::RaisedFailure;
use crate::state::AppState;
use axum::{
    body::{self, Body, Bytes},
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::net::SocketAddr;
use uuid::Uuid;
use washbay::{HandlerError, HttpFailure, PipelineResponse, RequestMeta, ResponsePayload};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Response headers that describe the connection rather than the payload
const CONNECTION_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Runs every request through the washbay pipeline.
///
/// The rest of the router is the pipeline's handler: its response is collected
/// into a `ResponsePayload`, or turned back into the `HandlerError` it was
/// rendered from when a route returned `ApiError`. Any other 4xx/5xx response
/// becomes an `HttpFailure` with the same status.
pub async fn request_pipeline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let mut meta = request_meta(&parts);

    if meta.correlation_id().is_none() {
        let id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            parts.headers.insert(CORRELATION_ID_HEADER, value);
        }
        meta = meta.with_header(CORRELATION_ID_HEADER, id);
    }

    let limit = state.config.max_body_bytes;
    let body = match read_body(&parts.headers, body, limit).await {
        Ok(body) => body,
        Err(failure) => {
            let outcome = state.pipeline.handle(meta, move || async move { Err(failure) }).await;
            return into_http_response(outcome);
        }
    };

    let meta = meta.with_body(body.clone());
    let request = Request::from_parts(parts, Body::from(body));

    let outcome = state
        .pipeline
        .handle(meta, move || run_downstream(request, next))
        .await;

    into_http_response(outcome)
}

fn request_meta(parts: &Parts) -> RequestMeta {
    let mut meta = RequestMeta::new(parts.method.as_str(), parts.uri.path());

    if let Some(query) = parts.uri.query() {
        meta = meta.with_query(query);
    }
    if let Some(route) = parts.extensions.get::<MatchedPath>() {
        meta = meta.with_route(route.as_str());
    }
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        meta = meta.with_peer_addr(addr.ip().to_string());
    }
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            meta = meta.with_header(name.as_str(), value);
        }
    }

    meta
}

async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, HandlerError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    let too_large = || HttpFailure::payload_too_large(format!("Request body exceeds {limit} bytes"));

    if declared.is_some_and(|length| length > limit) {
        return Err(too_large().into());
    }

    body::to_bytes(body, limit).await.map_err(|e| {
        if exceeded_length_limit(&e) {
            too_large().into()
        } else {
            HttpFailure::bad_request(format!("Failed to read request body: {e}")).into()
        }
    })
}

fn exceeded_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.to_string().contains("length limit exceeded") {
            return true;
        }
        source = current.source();
    }
    false
}

async fn run_downstream(request: Request, next: Next) -> Result<ResponsePayload, HandlerError> {
    let response = next.run(request).await;

    if let Some(failure) = response
        .extensions()
        .get::<RaisedFailure>()
        .and_then(RaisedFailure::take)
    {
        return Err(failure);
    }

    let (parts, body) = response.into_parts();
    let body = body::to_bytes(body, usize::MAX)
        .await
        .map_err(HandlerError::internal)?;

    if parts.status.is_client_error() || parts.status.is_server_error() {
        return Err(unraised_failure(parts.status, &body).into());
    }

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !CONNECTION_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Ok(ResponsePayload {
        status: parts.status.as_u16(),
        headers,
        body,
    })
}

/// Failure for an error response no route raised itself, such as an extractor
/// rejection or a 405 from the router.
fn unraised_failure(status: StatusCode, body: &[u8]) -> HttpFailure {
    let reason = status.canonical_reason().unwrap_or("Request failed");
    if status.is_server_error() {
        return HttpFailure::new(status.as_u16(), reason);
    }

    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| json.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            std::str::from_utf8(body)
                .ok()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| reason.to_string());

    HttpFailure::new(status.as_u16(), message)
}

fn into_http_response(outcome: PipelineResponse) -> Response {
    match outcome {
        PipelineResponse::Success {
            correlation_id,
            payload,
            cache,
        } => {
            let mut response = Response::new(Body::from(payload.body));
            *response.status_mut() =
                StatusCode::from_u16(payload.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            for (name, value) in &payload.headers {
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    response.headers_mut().append(name, value);
                }
            }

            set_header(&mut response, CORRELATION_ID_HEADER, &correlation_id);
            set_header(&mut response, CACHE_STATUS_HEADER, cache.as_str());
            response
        }
        PipelineResponse::Failure {
            correlation_id,
            status,
            envelope,
        } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = (status, Json(envelope)).into_response();
            set_header(&mut response, CORRELATION_ID_HEADER, &correlation_id);
            response
        }
    }
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}
