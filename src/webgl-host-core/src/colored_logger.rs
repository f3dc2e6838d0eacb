//! Colored logging infrastructure for component identification
//!
//! Provides a custom tracing formatter that prefixes each line with the
//! component that emitted it (request pipeline, memory cache, uploads).

use owo_colors::{OwoColorize, Style};
use std::fmt;
use std::io;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{
    format::{FormatEvent, FormatFields, Writer},
    FmtContext,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Component identifier for prefixing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Main,
    Http,
    Cache,
    Upload,
}

impl Component {
    /// Pick the component from an event's module target
    pub fn from_target(target: &str) -> Self {
        if target.starts_with("webgl_host_store::memory") {
            Component::Cache
        } else if target.starts_with("webgl_host_store::upload")
            || target.starts_with("webgl_host_web::routes::admin")
        {
            Component::Upload
        } else if target.starts_with("webgl_host_web") || target.starts_with("tower_http") {
            Component::Http
        } else {
            Component::Main
        }
    }

    /// Get the string representation for logging prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Main => "MAIN",
            Component::Http => "HTTP",
            Component::Cache => "CACHE",
            Component::Upload => "UPLOAD",
        }
    }

    /// Get the color style for this component
    pub fn color_style(&self) -> Style {
        match self {
            Component::Main => Style::new().cyan().bold(),
            Component::Http => Style::new().blue().bold(),
            Component::Cache => Style::new().magenta().bold(),
            Component::Upload => Style::new().green().bold(),
        }
    }
}

/// Custom formatter with component prefixes and colors
pub struct ColoredFormatter;

impl<S, N> FormatEvent<S, N> for ColoredFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let component = Component::from_target(metadata.target());

        let now = chrono::Local::now();
        write!(writer, "{} ", now.format("%H:%M:%S").dimmed())?;

        let prefix = format!("[{:6}]", component.as_str());
        write!(writer, "{} ", prefix.style(component.color_style()))?;

        match *metadata.level() {
            Level::ERROR => write!(writer, "{} ", "ERROR".red().bold())?,
            Level::WARN => write!(writer, "{} ", "WARN ".yellow().bold())?,
            Level::INFO => write!(writer, "{} ", "INFO ".green().bold())?,
            Level::DEBUG => write!(writer, "{} ", "DEBUG".blue().bold())?,
            Level::TRACE => write!(writer, "{} ", "TRACE".dimmed().bold())?,
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Initialize colored logging for the process
///
/// `RUST_LOG` directives are honored, falling back to INFO when unset;
/// `verbose` raises the default to DEBUG, which also shows per-request traces.
pub fn init_logger(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(ColoredFormatter)
        .with_writer(io::stdout);

    tracing_subscriber::registry()
        .with(build_filter(directives.as_deref(), verbose))
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_filter(directives: Option<&str>, verbose: bool) -> EnvFilter {
    let filter = directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    if verbose {
        filter.add_directive(Level::DEBUG.into())
    } else {
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_from_target() {
        assert_eq!(Component::from_target("webgl_host_store::memory"), Component::Cache);
        assert_eq!(Component::from_target("webgl_host_store::upload"), Component::Upload);
        assert_eq!(
            Component::from_target("webgl_host_web::routes::admin"),
            Component::Upload
        );
        assert_eq!(
            Component::from_target("webgl_host_web::routes::static_files"),
            Component::Http
        );
        assert_eq!(Component::from_target("tower_http::trace::on_response"), Component::Http);
        assert_eq!(Component::from_target("webgl_host"), Component::Main);
        assert_eq!(Component::from_target("webgl_host_core::config"), Component::Main);
    }

    #[test]
    fn test_filter_honors_rust_log() {
        use tracing::level_filters::LevelFilter;

        let hint = |directives: Option<&str>, verbose: bool| build_filter(directives, verbose).max_level_hint();

        assert_eq!(hint(None, false), Some(LevelFilter::INFO));
        assert_eq!(hint(None, true), Some(LevelFilter::DEBUG));
        assert_eq!(hint(Some("warn"), false), Some(LevelFilter::WARN));
        assert_eq!(hint(Some("debug"), false), Some(LevelFilter::DEBUG));
        assert_eq!(hint(Some("warn"), true), Some(LevelFilter::DEBUG));
        assert_eq!(hint(Some(""), false), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_prefixes_fit_column() {
        for component in [Component::Main, Component::Http, Component::Cache, Component::Upload] {
            assert!(component.as_str().len() <= 6);
        }
    }
}
