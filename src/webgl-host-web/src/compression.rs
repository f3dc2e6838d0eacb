//! gzip/brotli response compression

use axum::{
    extract::Request,
    http::{header, Extensions, HeaderMap, HeaderName, StatusCode, Version},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower_http::compression::{
    predicate::{And, DefaultPredicate, NotForContentType, Predicate, SizeAbove},
    CompressionLayer, CompressionLevel,
};

/// Request header that turns compression off for that request
pub const NO_COMPRESSION: HeaderName = HeaderName::from_static("x-no-compression");

pub type StatusPredicate = fn(StatusCode, Version, &HeaderMap, &Extensions) -> bool;

pub type AssetPredicate =
    And<And<And<DefaultPredicate, SizeAbove>, NotForContentType>, StatusPredicate>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Bodies smaller than this many bytes are sent as-is
    pub threshold: u16,
    /// Encoder quality, 0-11 for brotli and 0-9 for gzip
    pub level: i32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold: 1024,
            level: 6,
        }
    }
}

/// Build the compression layer.
///
/// Data blobs (`application/octet-stream`) are excluded along with the
/// defaults tower-http already skips (images, gRPC, event streams), and so
/// are bodiless `304`/`204` responses. Compression never touches
/// `Content-Type`.
pub fn compression_layer(settings: CompressionSettings) -> CompressionLayer<AssetPredicate> {
    let predicate = DefaultPredicate::new()
        .and(SizeAbove::new(settings.threshold))
        .and(NotForContentType::const_new("application/octet-stream"))
        .and(has_body as StatusPredicate);

    CompressionLayer::new()
        .gzip(true)
        .br(true)
        .quality(CompressionLevel::Precise(settings.level))
        .compress_when(predicate)
}

fn has_body(status: StatusCode, _: Version, _: &HeaderMap, _: &Extensions) -> bool {
    status != StatusCode::NOT_MODIFIED && status != StatusCode::NO_CONTENT
}

/// Strip `Accept-Encoding` from requests that carry `X-No-Compression`,
/// so the compression layer leaves the response alone.
pub async fn honor_opt_out(mut request: Request, next: Next) -> Response {
    if request.headers().contains_key(NO_COMPRESSION) {
        request.headers_mut().remove(header::ACCEPT_ENCODING);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Response;

    fn response(status: StatusCode, content_type: &str, len: usize) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, len)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_predicate() {
        let predicate = DefaultPredicate::new()
            .and(SizeAbove::new(1024))
            .and(NotForContentType::const_new("application/octet-stream"))
            .and(has_body as StatusPredicate);

        assert!(predicate.should_compress(&response(StatusCode::OK, "text/css", 4000)));
        assert!(!predicate.should_compress(&response(StatusCode::OK, "text/css", 100)));
        assert!(!predicate.should_compress(&response(StatusCode::OK, "application/octet-stream", 4000)));
        assert!(!predicate.should_compress(&response(StatusCode::NOT_MODIFIED, "text/html", 4000)));
    }
}
