//! HTTP handlers for logical object operations.
//! Request and response bodies are streamed; buffering decisions belong to
//! `TieringService`.

use crate::{
    errors::AppError,
    models::{LogicalAddress, StorageClass},
    services::tiering_service::{GetRequest, PutRequest, PutResponse},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use std::io;

/// Request header carrying the storage class hint.
pub static STORAGE_CLASS_HEADER: HeaderName = HeaderName::from_static("x-storage-class");

/// Path parameters shared by every object route.
type ObjectPath = Path<(String, String, String, String)>;

fn address((env, region, bucket, key): (String, String, String, String)) -> LogicalAddress {
    LogicalAddress::new(env, region, bucket, key)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// `PUT /v1/{env}/{region}/{bucket}/{*key}`
pub async fn put_object(
    State(state): State<AppState>,
    Path(params): ObjectPath,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<PutResponse>, AppError> {
    let content_type = header_str(&headers, &header::CONTENT_TYPE).map(str::to_string);
    // Missing or unparsable lengths count as unknown and take the uncached path.
    let size = header_str(&headers, &header::CONTENT_LENGTH)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let storage_class = header_str(&headers, &STORAGE_CLASS_HEADER).map(StorageClass::from);

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other))
        .boxed();

    let resp = state
        .service
        .put(PutRequest {
            address: address(params),
            content_type,
            size,
            body: stream,
            storage_class,
        })
        .await?;

    Ok(Json(resp))
}

/// `GET /v1/{env}/{region}/{bucket}/{*key}` as a streaming response.
pub async fn get_object(
    State(state): State<AppState>,
    Path(params): ObjectPath,
) -> Result<Response, AppError> {
    let resp = state
        .service
        .get(GetRequest {
            address: address(params),
        })
        .await?;

    let mut response = Response::new(Body::from_stream(resp.body));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    if let Some(value) = resp
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if resp.size > 0 {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(resp.size));
    }

    Ok(response)
}

/// `DELETE /v1/{env}/{region}/{bucket}/{*key}`: soft-delete, keeping the physical object
pub async fn delete_object(
    State(state): State<AppState>,
    Path(params): ObjectPath,
) -> Result<StatusCode, AppError> {
    state.service.delete(&address(params)).await?;
    Ok(StatusCode::NO_CONTENT)
}
