//! Static asset delivery
//!
//! Every request not claimed by another route ends up here. Branches are
//! tried in order and the first one that produces a response wins:
//!
//! 1. memory cache hit (no disk I/O at all)
//! 2. file under the asset root, or under the mounted `Build`/`TemplateData`
//!    directories, answered with 304 when the client's validators match
//! 3. entry-point markup for `/`
//! 4. 404
//!
//! Paths are percent-decoded before any of this, and the traversal guard
//! runs on the decoded form.

use crate::asset::{classify, AssetClass};
use crate::conditional::Validators;
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;
use webgl_host_store::{format_megabytes, is_contained};

/// Marks responses that were answered from the memory cache
pub const SERVED_FROM: HeaderName = HeaderName::from_static("x-served-from");

/// GET /* - Serve a build asset
pub async fn serve_asset(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request_path = uri.path();

    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::NotFound(request_path.to_string()));
    }

    let encoded = request_path.strip_prefix('/').unwrap_or(request_path);
    let Ok(relative) = percent_decode_str(encoded).decode_utf8() else {
        debug!("undecodable path {}", request_path);
        return Err(ApiError::NotFound(request_path.to_string()));
    };

    if let Some(response) = serve_from_memory(&state, &relative) {
        return Ok(response);
    }

    if is_servable(&relative) {
        let headers = state.headers.resolve(classify(&relative));
        for candidate in state.assets.candidates(&relative) {
            if let Some(response) = serve_from_disk(&candidate, headers, &request_headers).await? {
                return Ok(response);
            }
        }
    }

    if request_path == "/" {
        let headers = state.headers.resolve(AssetClass::Markup);
        let index = &state.assets.index_file;
        if let Some(response) = serve_from_disk(index, headers, &request_headers).await? {
            return Ok(response);
        }
    }

    debug!("no asset for {}", request_path);
    Err(ApiError::NotFound(request_path.to_string()))
}

fn serve_from_memory(state: &AppState, relative: &str) -> Option<Response> {
    let cache = state.cache.as_ref()?;
    if !cache.is_initialized() {
        return None;
    }
    let entry = cache.lookup(relative)?;

    debug!(
        "serving {} from memory cache ({})",
        relative,
        format_megabytes(entry.size_bytes())
    );

    let mut headers = state.memory_headers.resolve(classify(relative)).clone();
    headers.insert(SERVED_FROM, HeaderValue::from_static("memory-cache"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(entry.size_bytes()));
    guess_content_type(&mut headers, Path::new(entry.path()));

    Some((StatusCode::OK, headers, Body::from(entry.bytes().clone())).into_response())
}

/// Stream `path` if it is a regular file. Missing files yield `Ok(None)`.
async fn serve_from_disk(
    path: &Path,
    policy: &HeaderMap,
    request: &HeaderMap,
) -> Result<Option<Response>, ApiError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if is_missing(&e) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(None);
    }

    let mut headers = policy.clone();
    guess_content_type(&mut headers, path);

    if let Some(validators) = Validators::from_metadata(&metadata) {
        validators.apply(&mut headers);
        if validators.is_fresh(request) {
            debug!("{:?} not modified", path);
            return Ok(Some((StatusCode::NOT_MODIFIED, headers).into_response()));
        }
    }

    debug!("serving {:?} from disk", path);

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok(Some((StatusCode::OK, headers, body).into_response()))
}

/// Fill in a content type from the file extension when the policy has none
fn guess_content_type(headers: &mut HeaderMap, path: &Path) {
    if headers.contains_key(header::CONTENT_TYPE) {
        return;
    }
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
}

/// Reject anything that could leave the asset root before touching disk
fn is_servable(relative: &str) -> bool {
    !relative.contains('\\') && !relative.contains('\0') && is_contained(Path::new(relative))
}

fn is_missing(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_servable() {
        assert!(is_servable("Build/app.wasm"));
        assert!(is_servable("index.html"));
        assert!(!is_servable(""));
        assert!(!is_servable("../secret"));
        assert!(!is_servable("Build/../../secret"));
        assert!(!is_servable("/etc/passwd"));
        assert!(!is_servable("Build\\..\\secret"));
    }

    #[test]
    fn test_guess_content_type_keeps_policy_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/wasm"));
        guess_content_type(&mut headers, Path::new("x.wasm"));
        assert_eq!(headers[header::CONTENT_TYPE], "application/wasm");

        let mut headers = HeaderMap::new();
        guess_content_type(&mut headers, Path::new("index.html"));
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
    }
}
