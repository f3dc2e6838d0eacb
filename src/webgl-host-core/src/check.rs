//! Pre-flight checks for `webgl-host check`

use std::fmt;
use std::path::Path;
use webgl_host_store::format_megabytes;
use webgl_host_web::ServerOptions;

#[derive(Debug, Clone)]
pub struct CheckItem {
    pub label: String,
    pub detail: String,
    pub ok: bool,
    /// A failed required item means the server would not start or would
    /// serve nothing useful
    pub required: bool,
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.items.iter().all(|item| item.ok || !item.required)
    }

    fn push(&mut self, label: impl Into<String>, ok: bool, detail: impl Into<String>, required: bool) {
        self.items.push(CheckItem {
            label: label.into(),
            detail: detail.into(),
            ok,
            required,
        });
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            let status = match (item.ok, item.required) {
                (true, _) => "OK",
                (false, true) => "NOT FOUND",
                (false, false) => "missing",
            };
            writeln!(f, "  {}: {} ({})", item.label, status, item.detail)?;
        }
        Ok(())
    }
}

/// Inspect the directories and files a server with `options` would use
pub fn run_checks(options: &ServerOptions) -> CheckReport {
    let mut report = CheckReport::default();

    report.push(
        "root",
        options.root.is_dir(),
        options.root.display().to_string(),
        true,
    );

    let index = options.root.join(&options.index_file);
    report.push("index", index.is_file(), describe_file(&index), true);

    let build_dir = options.build_dir();
    report.push("build dir", build_dir.is_dir(), build_dir.display().to_string(), false);

    if options.capabilities.memory_cache {
        for file in &options.cache_files {
            let path = options.root.join(file);
            report.push(format!("preload {}", file), path.is_file(), describe_file(&path), false);
        }
    }

    if options.capabilities.upload_endpoint {
        // Created on startup when absent
        report.push(
            "upload dir",
            options.upload_dir.is_dir(),
            format!(
                "{} (limit {})",
                options.upload_dir.display(),
                format_megabytes(options.max_upload_bytes)
            ),
            false,
        );
    }

    report
}

fn describe_file(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            format!("{}, {}", path.display(), format_megabytes(meta.len()))
        }
        _ => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_complete_build_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Build")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("Build/game.wasm"), [0u8; 4]).unwrap();

        let mut options = ServerOptions::new(dir.path());
        options.capabilities.memory_cache = true;
        options.cache_files = vec!["Build/game.wasm".into(), "Build/game.data".into()];

        let report = run_checks(&options);
        assert!(report.passed());

        let missing: Vec<_> = report.items.iter().filter(|i| !i.ok).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].label, "preload Build/game.data");
    }

    #[test]
    fn test_missing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_checks(&ServerOptions::new(dir.path()));

        assert!(!report.passed());
        assert!(report.to_string().contains("index: NOT FOUND"));
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_checks(&ServerOptions::new(dir.path().join("nope")));

        assert!(!report.passed());
        assert!(!report.items[0].ok);
    }
}
