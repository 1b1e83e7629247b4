use crate::config::{LogSection, LoggingConfig};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

// Keeps the non-blocking console worker alive for the process lifetime.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// `None` means the sink is off for that target.
fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => None,
        _ => Some(LevelFilter::INFO),
    }
}

/// True if `target` is `prefix` itself or one of its `::` children.
fn target_matches(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating files =================

#[derive(Clone)]
struct RotatingFile(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl RotatingFile {
    fn open(path: &Path, section: &LogSection) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // MaxFiles wins over Age when both are configured
        let limit = match section.max_backups {
            Some(n) => FileLimit::MaxFiles(n),
            None => FileLimit::Age(chrono::Duration::days(
                i64::from(section.max_age_days.unwrap_or(1)),
            )),
        };
        let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;

        let rot = FileRotate::new(
            path,
            AppendTimestamp::default(limit),
            ContentLimit::BytesSurpassed(max_bytes),
            Compression::None,
            None,
        );
        Ok(Self(Arc::new(Mutex::new(rot))))
    }
}

/// Writer for one record; `None` drops the bytes.
struct FileHandle(Option<Arc<Mutex<FileRotate<AppendTimestamp>>>>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-target files, falling back to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<RotatingFile>,
    by_target: Vec<(String, RotatingFile)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (target, section) in sorted_sections(cfg) {
            if section.file.trim().is_empty() {
                continue;
            }
            let path = resolve_log_path(&section.file, base_dir);
            match RotatingFile::open(&path, section) {
                Ok(file) if target == "default" => router.default = Some(file),
                Ok(file) => router.by_target.push((target.to_string(), file)),
                Err(e) => eprintln!(
                    "Failed to open log file for '{target}': {} ({e})",
                    path.display()
                ),
            }
        }
        // Longest prefix first so nested targets win over their parents.
        router
            .by_target
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        router
    }

    fn resolve(&self, target: &str) -> Option<&RotatingFile> {
        self.by_target
            .iter()
            .find(|(prefix, _)| target_matches(target, prefix))
            .map(|(_, file)| file)
            .or(self.default.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_target.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.as_ref().map(|f| f.0.clone()))
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileHandle(self.resolve(meta.target()).map(|f| f.0.clone()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn sorted_sections(cfg: &LoggingConfig) -> Vec<(&str, &LogSection)> {
    let mut sections: Vec<_> = cfg.iter().map(|(k, v)| (k.as_str(), v)).collect();
    sections.sort_by_key(|(k, _)| *k);
    sections
}

// ================= level targets =================

/// Console filter: the "default" section sets the fallback level, every
/// other section its own target.
fn console_targets(cfg: &LoggingConfig) -> Targets {
    let default = cfg
        .get("default")
        .map(|s| parse_level(&s.console_level).unwrap_or(LevelFilter::OFF))
        .unwrap_or(LevelFilter::INFO);

    sorted_sections(cfg)
        .into_iter()
        .filter(|(target, _)| *target != "default")
        .fold(Targets::new().with_default(default), |targets, (target, s)| {
            targets.with_target(target, parse_level(&s.console_level).unwrap_or(LevelFilter::OFF))
        })
}

/// File filter: targets without a file of their own inherit the default
/// file's level; without a default file they are off.
fn file_targets(cfg: &LoggingConfig) -> Targets {
    let default = cfg
        .get("default")
        .filter(|s| !s.file.trim().is_empty())
        .and_then(|s| parse_level(&s.file_level))
        .unwrap_or(LevelFilter::OFF);

    sorted_sections(cfg)
        .into_iter()
        .filter(|(target, s)| *target != "default" && !s.file.trim().is_empty())
        .fold(Targets::new().with_default(default), |targets, (target, s)| {
            targets.with_target(target, parse_level(&s.file_level).unwrap_or(LevelFilter::OFF))
        })
}

// ================= public init =================

/// Installs the global subscriber: human-readable console output on stderr,
/// JSON lines into rotated files, `RUST_LOG` as an upper bound, and the
/// `log` crate bridged into `tracing`.
///
/// Relative file paths are resolved against `base_dir`. Calling it twice is
/// harmless; the second subscriber is not installed.
pub fn init_logging_unified(cfg: &LoggingConfig, base_dir: &Path) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    if cfg.is_empty() {
        init_minimal();
        return;
    }

    let env = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets(cfg));

    let router = FileRouter::build(cfg, base_dir);
    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_targets(cfg))
    });

    let _ = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// INFO to stderr, honoring `RUST_LOG`.
fn init_minimal() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = Registry::default()
        .with(env)
        .with(fmt::layer().with_target(true).with_timer(fmt::time::UtcTime::rfc_3339()))
        .try_init();
}

/// Initializes logging from the config section, or the defaults when absent.
pub fn init_logging_from_config(logging: Option<&LoggingConfig>, home_dir: &Path) {
    match logging {
        Some(cfg) => init_logging_unified(cfg, home_dir),
        None => init_logging_unified(&crate::config::default_logging_config(), home_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn section(console: &str, file: &str, file_level: &str) -> LogSection {
        LogSection {
            console_level: console.to_string(),
            file: file.to_string(),
            file_level: file_level.to_string(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level(" warn "), Some(LevelFilter::WARN));
        assert_eq!(parse_level(""), Some(LevelFilter::INFO));
        assert_eq!(parse_level("bogus"), Some(LevelFilter::INFO));
        assert_eq!(parse_level("off"), None);
    }

    #[test]
    fn target_prefix_matching() {
        assert!(target_matches("viewkit", "viewkit"));
        assert!(target_matches("viewkit::runtime::factory", "viewkit"));
        assert!(!target_matches("viewkit_bootstrap", "viewkit"));
        assert!(!target_matches("view", "viewkit"));
    }

    #[test]
    fn console_targets_apply_per_target_levels() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("warn", "", ""));
        cfg.insert("viewkit".into(), section("debug", "", ""));
        cfg.insert("noisy".into(), section("off", "", ""));

        let targets = console_targets(&cfg);
        assert!(targets.would_enable("viewkit::runtime", &tracing::Level::DEBUG));
        assert!(!targets.would_enable("other", &tracing::Level::INFO));
        assert!(targets.would_enable("other", &tracing::Level::WARN));
        assert!(!targets.would_enable("noisy", &tracing::Level::ERROR));
    }

    #[test]
    fn file_targets_are_off_without_files() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "", "debug"));
        cfg.insert("viewkit".into(), section("info", "logs/vk.log", "trace"));

        let targets = file_targets(&cfg);
        assert!(!targets.would_enable("other", &tracing::Level::ERROR));
        assert!(targets.would_enable("viewkit::router", &tracing::Level::TRACE));
    }

    #[test]
    fn router_prefers_the_longest_matching_target() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "info"));
        cfg.insert("viewkit".into(), section("info", "logs/vk.log", "info"));
        cfg.insert("viewkit::router".into(), section("info", "logs/router.log", "info"));
        cfg.insert("quiet".into(), section("info", "", "info"));

        let router = FileRouter::build(&cfg, tmp.path());
        assert!(!router.is_empty());
        assert_eq!(router.by_target[0].0, "viewkit::router");

        let router_file = router.resolve("viewkit::router").unwrap();
        assert!(Arc::ptr_eq(&router_file.0, &router.by_target[0].1 .0));
        let vk_file = router.resolve("viewkit::runtime").unwrap();
        assert!(Arc::ptr_eq(&vk_file.0, &router.by_target[1].1 .0));
        let fallback = router.resolve("quiet").unwrap();
        assert!(Arc::ptr_eq(&fallback.0, &router.default.as_ref().unwrap().0));

        assert!(tmp.path().join("logs").is_dir());
    }

    #[test]
    fn dropped_writes_succeed() {
        let mut handle = FileHandle(None);
        assert_eq!(handle.write(b"hello").unwrap(), 5);
        handle.flush().unwrap();
    }
}
