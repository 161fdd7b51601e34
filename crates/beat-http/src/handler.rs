use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use beat_tree::{Entry, TreeError};
use percent_encoding::percent_decode_str;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::listing::render_listing;
use crate::mount::{MountTable, MountTarget};
use crate::range::{parse_range, RangeOutcome};
use crate::source::ContentSource;

/// Answer a request from the first mount that has the path.
pub async fn dispatch(State(table): State<Arc<MountTable>>, request: Request) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "method not allowed",
        )
            .into_response();
    }

    let (parts, _body) = request.into_parts();
    for mount in table.mounts() {
        let Some(relative) = mount.strip(parts.uri.path()) else {
            continue;
        };
        let hit = match mount.target() {
            MountTarget::Tree(source) => serve_tree(source.as_ref(), relative, &parts).await,
            MountTarget::Assets(dir) => serve_assets(dir, relative, &parts).await,
        };
        if let Some(response) = hit {
            return response;
        }
    }
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// `None` is a miss.
async fn serve_tree(source: &dyn ContentSource, relative: &str, parts: &Parts) -> Option<Response> {
    let path = percent_decode_str(relative).decode_utf8().ok()?.into_owned();
    let head_only = parts.method == Method::HEAD;

    match source.stat(&path) {
        Ok(Entry::File { .. }) => Some(file_response(source, &path, &parts.headers, head_only)),
        Ok(Entry::Directory) => {
            let url_path = parts.uri.path();
            if !url_path.ends_with('/') {
                let location = format!("{url_path}/");
                return Some(
                    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
                );
            }
            let index = format!("{}/index.html", path.trim_end_matches('/'));
            if matches!(source.stat(&index), Ok(Entry::File { .. })) {
                return Some(file_response(source, &index, &parts.headers, head_only));
            }
            Some(match source.list(&path) {
                Ok(entries) => {
                    let html = render_listing(url_path, &entries);
                    if head_only {
                        ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], ()).into_response()
                    } else {
                        Html(html).into_response()
                    }
                }
                Err(e) => error_response(&path, &e),
            })
        }
        Err(TreeError::NotFound(_) | TreeError::InvalidPath { .. }) => None,
        Err(e) => Some(error_response(&path, &e)),
    }
}

fn file_response(source: &dyn ContentSource, path: &str, headers: &HeaderMap, head_only: bool) -> Response {
    let reader = match source.open(path) {
        Ok(reader) => reader,
        Err(e) => return error_response(path, &e),
    };
    let len = reader.len();
    let outcome = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map_or(RangeOutcome::Full, |v| parse_range(v, len));

    let (status, range) = match outcome {
        RangeOutcome::Full => (StatusCode::OK, 0..len),
        RangeOutcome::Partial(range) => (StatusCode::PARTIAL_CONTENT, range),
        RangeOutcome::Unsatisfiable => {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{len}"))],
            )
                .into_response();
        }
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, range.end - range.start);
    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{len}", range.start, range.end - 1),
        );
    }
    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(reader.stream(range))
    };
    response.body(body).unwrap_or_else(|e| {
        warn!(%path, error = %e, "failed to build response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

fn error_response(path: &str, error: &TreeError) -> Response {
    let status = match error {
        TreeError::NotFound(_) | TreeError::InvalidPath { .. } => StatusCode::NOT_FOUND,
        TreeError::Unavailable(_) | TreeError::NotReady | TreeError::OpenFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(%path, error = %error, %status, "tree request failed");
    (status, error.to_string()).into_response()
}

/// Delegate to `ServeDir`; its `404` is a miss.
async fn serve_assets(dir: &Path, relative: &str, parts: &Parts) -> Option<Response> {
    let uri: Uri = match parts.uri.query() {
        Some(query) => format!("{relative}?{query}").parse().ok()?,
        None => relative.parse().ok()?,
    };
    let mut request = Request::new(Body::empty());
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = uri;
    *request.headers_mut() = parts.headers.clone();

    let result: Result<_, Infallible> = ServeDir::new(dir).oneshot(request).await;
    match result {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => None,
        Ok(response) => Some(response.into_response()),
        Err(never) => match never {},
    }
}
