//! Response header policy per asset class and cache mode
//!
//! Each server instance picks one [`CacheMode`]. From it a [`HeaderPolicy`]
//! table is built once at startup holding the complete header set for every
//! [`AssetClass`]; requests only look headers up.

use crate::asset::AssetClass;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const CACHE_NO_STORE: &str = "no-store, no-cache, must-revalidate";
pub const CACHE_MUST_REVALIDATE: &str = "no-cache, must-revalidate";
pub const CACHE_REVALIDATE: &str = "no-cache";
pub const CACHE_ONE_DAY: &str = "public, max-age=86400";

pub const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");
pub const CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-embedder-policy");
pub const CROSS_ORIGIN_OPENER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-opener-policy");

/// Browser caching strategy for a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Versioned build files are cached by the browser for a year
    #[default]
    Immutable,
    /// Browser revalidates build files on every load
    Revalidate,
    /// Browser never stores build files
    NoStore,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Immutable => "immutable",
            CacheMode::Revalidate => "revalidate",
            CacheMode::NoStore => "no-store",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immutable" => Ok(CacheMode::Immutable),
            "revalidate" => Ok(CacheMode::Revalidate),
            "no-store" => Ok(CacheMode::NoStore),
            other => Err(format!(
                "unknown cache mode '{}' (expected immutable, revalidate or no-store)",
                other
            )),
        }
    }
}

/// Content type and caching headers for one asset class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub content_type: Option<&'static str>,
    pub cache_control: &'static str,
    pub extra_headers: Vec<(HeaderName, &'static str)>,
}

impl CachePolicy {
    pub fn for_class(class: AssetClass, mode: CacheMode) -> Self {
        use AssetClass::*;

        let content_type = match class {
            Wasm => Some("application/wasm"),
            DataBlob => Some("application/octet-stream"),
            ScriptLoader | Script => Some("application/javascript"),
            Stylesheet => Some("text/css"),
            Markup | Image | Other => None,
        };

        let cache_control = match (class, mode) {
            // Entry points reference versioned sub-resources and must never go stale
            (Markup, _) => CACHE_MUST_REVALIDATE,
            (Other, _) => CACHE_REVALIDATE,
            (_, CacheMode::Immutable) => CACHE_IMMUTABLE,
            (Wasm | DataBlob | ScriptLoader | Script, CacheMode::Revalidate) => CACHE_REVALIDATE,
            (Stylesheet | Image, CacheMode::Revalidate) => CACHE_ONE_DAY,
            (Wasm | DataBlob | ScriptLoader | Script, CacheMode::NoStore) => CACHE_NO_STORE,
            (Stylesheet | Image, CacheMode::NoStore) => CACHE_REVALIDATE,
        };

        let mut extra_headers = Vec::new();
        if matches!(class, Wasm | DataBlob) {
            extra_headers.push((header::X_CONTENT_TYPE_OPTIONS, "nosniff"));
        }
        if mode == CacheMode::NoStore && matches!(class, Wasm | DataBlob | ScriptLoader | Script) {
            extra_headers.push((header::PRAGMA, "no-cache"));
            if matches!(class, Wasm | DataBlob) {
                extra_headers.push((header::EXPIRES, "0"));
            }
        }

        Self {
            content_type,
            cache_control,
            extra_headers,
        }
    }

    /// Write this policy's headers, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(self.cache_control),
        );
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), HeaderValue::from_static(value));
        }
    }
}

/// Headers attached to every response so the build can run cross-origin
/// isolated (required for `SharedArrayBuffer`).
#[derive(Debug, Clone)]
pub struct CrossOriginHeaders {
    headers: HeaderMap,
}

impl CrossOriginHeaders {
    pub fn new(allow_upload: bool) -> Self {
        let methods = if allow_upload {
            "GET, POST, OPTIONS"
        } else {
            "GET, OPTIONS"
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(methods),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        headers.insert(
            CROSS_ORIGIN_RESOURCE_POLICY,
            HeaderValue::from_static("cross-origin"),
        );
        headers.insert(
            CROSS_ORIGIN_EMBEDDER_POLICY,
            HeaderValue::from_static("require-corp"),
        );
        headers.insert(
            CROSS_ORIGIN_OPENER_POLICY,
            HeaderValue::from_static("same-origin"),
        );

        Self { headers }
    }

    /// Add any cross-origin header the response does not already carry
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Full header set for `class` under `mode`, cross-origin headers included
pub fn resolve_headers(class: AssetClass, mode: CacheMode) -> HeaderMap {
    let mut headers = HeaderMap::new();
    CachePolicy::for_class(class, mode).apply(&mut headers);
    CrossOriginHeaders::new(false).apply(&mut headers);
    headers
}

/// Precomputed header sets for one cache mode
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    mode: CacheMode,
    table: HashMap<AssetClass, HeaderMap>,
}

impl HeaderPolicy {
    pub fn new(mode: CacheMode, cross_origin: &CrossOriginHeaders) -> Self {
        let table = AssetClass::ALL
            .iter()
            .map(|&class| {
                let mut headers = HeaderMap::new();
                CachePolicy::for_class(class, mode).apply(&mut headers);
                cross_origin.apply(&mut headers);
                (class, headers)
            })
            .collect();

        Self { mode, table }
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn resolve(&self, class: AssetClass) -> &HeaderMap {
        // The table is built from AssetClass::ALL, so every class is present
        &self.table[&class]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::classify;

    const MODES: [CacheMode; 3] = [CacheMode::Immutable, CacheMode::Revalidate, CacheMode::NoStore];

    fn get<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_binaries_are_nosniff_in_every_mode() {
        for mode in MODES {
            for path in ["Build/app.wasm", "Build/app.data"] {
                let headers = resolve_headers(classify(path), mode);
                assert_eq!(get(&headers, header::X_CONTENT_TYPE_OPTIONS), Some("nosniff"), "{} in {}", path, mode);
            }
        }
    }

    #[test]
    fn test_immutable_mode() {
        for class in [
            AssetClass::Wasm,
            AssetClass::DataBlob,
            AssetClass::ScriptLoader,
            AssetClass::Script,
            AssetClass::Stylesheet,
            AssetClass::Image,
        ] {
            let headers = resolve_headers(class, CacheMode::Immutable);
            assert_eq!(get(&headers, header::CACHE_CONTROL), Some(CACHE_IMMUTABLE));
        }

        let wasm = resolve_headers(AssetClass::Wasm, CacheMode::Immutable);
        assert_eq!(get(&wasm, header::CONTENT_TYPE), Some("application/wasm"));
        assert!(wasm.get(header::PRAGMA).is_none());
    }

    #[test]
    fn test_markup_is_never_immutable() {
        for mode in MODES {
            let headers = resolve_headers(classify("/index.html"), mode);
            let cache_control = get(&headers, header::CACHE_CONTROL).unwrap();
            assert!(!cache_control.contains("immutable"));
            assert_eq!(cache_control, CACHE_MUST_REVALIDATE);
        }
    }

    #[test]
    fn test_loader_gets_loader_headers() {
        let loader = CachePolicy::for_class(classify("app.framework.js"), CacheMode::NoStore);
        assert_eq!(loader.content_type, Some("application/javascript"));
        assert_eq!(loader.cache_control, CACHE_NO_STORE);
        assert!(loader.extra_headers.contains(&(header::PRAGMA, "no-cache")));
    }

    #[test]
    fn test_no_store_mode() {
        for class in [AssetClass::Wasm, AssetClass::DataBlob, AssetClass::Script, AssetClass::ScriptLoader] {
            let headers = resolve_headers(class, CacheMode::NoStore);
            assert_eq!(get(&headers, header::CACHE_CONTROL), Some(CACHE_NO_STORE));
            assert_eq!(get(&headers, header::PRAGMA), Some("no-cache"));
        }
        let data = resolve_headers(AssetClass::DataBlob, CacheMode::NoStore);
        assert_eq!(get(&data, header::EXPIRES), Some("0"));
        assert_eq!(get(&data, header::CONTENT_TYPE), Some("application/octet-stream"));
    }

    #[test]
    fn test_revalidate_mode() {
        let css = resolve_headers(AssetClass::Stylesheet, CacheMode::Revalidate);
        assert_eq!(get(&css, header::CACHE_CONTROL), Some(CACHE_ONE_DAY));
        let wasm = resolve_headers(AssetClass::Wasm, CacheMode::Revalidate);
        assert_eq!(get(&wasm, header::CACHE_CONTROL), Some(CACHE_REVALIDATE));
    }

    #[test]
    fn test_other_has_safe_default() {
        for mode in MODES {
            let policy = CachePolicy::for_class(classify("/no-such-file.xyz"), mode);
            assert_eq!(policy.content_type, None);
            assert_eq!(policy.cache_control, CACHE_REVALIDATE);
            assert!(policy.extra_headers.is_empty());
        }
    }

    #[test]
    fn test_cross_origin_on_every_class() {
        for mode in MODES {
            let policy = HeaderPolicy::new(mode, &CrossOriginHeaders::new(false));
            for class in AssetClass::ALL {
                let headers = policy.resolve(class);
                assert_eq!(get(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
                assert_eq!(get(headers, CROSS_ORIGIN_OPENER_POLICY), Some("same-origin"));
                assert_eq!(get(headers, CROSS_ORIGIN_EMBEDDER_POLICY), Some("require-corp"));
                assert_eq!(get(headers, CROSS_ORIGIN_RESOURCE_POLICY), Some("cross-origin"));
            }
        }
    }

    #[test]
    fn test_upload_extends_allowed_methods() {
        let mut headers = HeaderMap::new();
        CrossOriginHeaders::new(true).apply(&mut headers);
        assert_eq!(get(&headers, header::ACCESS_CONTROL_ALLOW_METHODS), Some("GET, POST, OPTIONS"));
    }

    #[test]
    fn test_cross_origin_keeps_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://example.com"));
        CrossOriginHeaders::new(false).apply(&mut headers);
        assert_eq!(get(&headers, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("https://example.com"));
    }

    #[test]
    fn test_cache_mode_parsing() {
        assert_eq!("no-store".parse::<CacheMode>().unwrap(), CacheMode::NoStore);
        assert_eq!(CacheMode::Revalidate.to_string(), "revalidate");
        assert!("forever".parse::<CacheMode>().is_err());
        assert_eq!(CacheMode::default(), CacheMode::Immutable);
    }
}
