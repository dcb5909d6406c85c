use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Global crash log directory, set during init.
static CRASH_LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize tracing with stderr, rolling file and Sentry layers.
///
/// - Stderr: compact, human-readable. Defaults to `warn` so it stays out of
///   the way of the chat transcript; override via `RUST_LOG`.
/// - File: daily-rotated `carebridge.log` under `log_dir`, `info` and up
///   (`debug` for this crate).
/// - Sentry: captures ERROR events as issues, WARN as breadcrumbs.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .compact()
        .with_filter(console_filter);

    let (file_layer, guard) = match log_dir.map(|dir| (dir, std::fs::create_dir_all(dir))) {
        Some((dir, Ok(()))) => {
            let appender = tracing_appender::rolling::daily(dir, "carebridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new("info,carebridge_lib=debug"));
            (Some(layer), Some(guard))
        }
        Some((_, Err(e))) => {
            eprintln!("[logging] could not create log directory: {e}");
            (None, None)
        }
        None => (None, None),
    };

    // Routes existing tracing::error!/warn! calls to Sentry automatically.
    // No-op when Sentry DSN is not configured.
    let sentry_layer = sentry_tracing::layer().event_filter(|meta| match *meta.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(sentry_layer)
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Tracing initialized");
    }
    guard
}

/// Install a panic hook that writes crash details to a file before unwinding.
pub fn install_crash_hook(data_dir: &Path) {
    let crash_dir = data_dir.join("crash_logs");
    let _ = std::fs::create_dir_all(&crash_dir);
    CRASH_LOG_DIR.set(crash_dir).ok();

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(dir) = CRASH_LOG_DIR.get() {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let path = dir.join(format!("crash_{}.log", timestamp));

            let mut report = format!(
                "=== CAREBRIDGE CRASH REPORT ===\nTime: {}\nVersion: {}\n\n",
                chrono::Local::now().to_rfc3339(),
                env!("CARGO_PKG_VERSION"),
            );

            if let Some(msg) = info.payload().downcast_ref::<&str>() {
                report.push_str(&format!("Panic: {}\n", msg));
            } else if let Some(msg) = info.payload().downcast_ref::<String>() {
                report.push_str(&format!("Panic: {}\n", msg));
            } else {
                report.push_str("Panic: <unknown payload>\n");
            }

            if let Some(loc) = info.location() {
                report.push_str(&format!(
                    "Location: {}:{}:{}\n",
                    loc.file(),
                    loc.line(),
                    loc.column()
                ));
            }

            report.push_str(&format!(
                "\nBacktrace:\n{}\n",
                std::backtrace::Backtrace::force_capture()
            ));

            let thread = std::thread::current();
            report.push_str(&format!("\nThread: {:?} (id: {:?})\n", thread.name(), thread.id()));

            let _ = std::fs::write(&path, &report);
            eprintln!("[CRASH] Report written to: {}", path.display());
        }

        prev_hook(info);
    }));

    tracing::debug!("Crash hook installed");
}
