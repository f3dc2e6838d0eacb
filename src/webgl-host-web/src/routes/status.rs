//! Health and cache status endpoints

use crate::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use webgl_host_store::format_megabytes;

/// Process memory in bytes, where the platform exposes it
#[derive(Debug, Default, Serialize)]
pub struct MemoryUsage {
    pub rss: Option<u64>,
    #[serde(rename = "virtual")]
    pub virtual_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub cache_status: &'static str,
    pub cached_files: Vec<String>,
    pub cache_size: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusResponse {
    pub initialized: bool,
    pub files: Vec<CachedFileInfo>,
    pub total_size: String,
    pub total_bytes: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFileInfo {
    pub file: String,
    pub size: String,
    pub size_bytes: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (cache_status, cached_files, cache_bytes) = match &state.cache {
        Some(cache) => (
            if cache.is_initialized() {
                "initialized"
            } else {
                "not-initialized"
            },
            cache.entries().iter().map(|e| e.path().to_string()).collect(),
            cache.total_bytes(),
        ),
        None => ("disabled", Vec::new(), 0),
    };

    Json(HealthResponse {
        status: "healthy",
        uptime: state.started_at.elapsed().as_secs_f64(),
        memory: memory_usage().await,
        cache_status,
        cached_files,
        cache_size: format_megabytes(cache_bytes),
        timestamp: timestamp(Utc::now()),
    })
}

/// GET /cache-status
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    let Some(cache) = &state.cache else {
        return Json(CacheStatusResponse {
            initialized: false,
            files: Vec::new(),
            total_size: format_megabytes(0),
            total_bytes: 0,
        });
    };

    let files = cache
        .entries()
        .iter()
        .map(|entry| CachedFileInfo {
            file: entry.path().to_string(),
            size: format_megabytes(entry.size_bytes()),
            size_bytes: entry.size_bytes(),
        })
        .collect();

    Json(CacheStatusResponse {
        initialized: cache.is_initialized(),
        files,
        total_size: format_megabytes(cache.total_bytes()),
        total_bytes: cache.total_bytes(),
    })
}

/// ISO-8601 with millisecond precision and a `Z` suffix
fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read resident and virtual size from procfs (Linux only)
async fn memory_usage() -> MemoryUsage {
    match tokio::fs::read_to_string("/proc/self/status").await {
        Ok(status) => parse_proc_status(&status),
        Err(_) => MemoryUsage::default(),
    }
}

fn parse_proc_status(status: &str) -> MemoryUsage {
    let field = |name: &str| {
        status
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };

    MemoryUsage {
        rss: field("VmRSS:"),
        virtual_size: field("VmSize:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_status() {
        let status = "Name:\twebgl-host\nVmSize:\t  123456 kB\nVmRSS:\t    2048 kB\nThreads:\t9\n";
        let usage = parse_proc_status(status);

        assert_eq!(usage.rss, Some(2048 * 1024));
        assert_eq!(usage.virtual_size, Some(123456 * 1024));
    }

    #[test]
    fn test_timestamp_format() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(timestamp(now), "2024-03-09T14:05:07.123Z");
    }

    #[test]
    fn test_parse_proc_status_missing_fields() {
        let usage = parse_proc_status("Name:\tx\n");
        assert_eq!(usage.rss, None);
        assert_eq!(usage.virtual_size, None);
    }
}
