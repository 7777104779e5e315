// Logging setup for multipool
//
// Pools, workers and the manager all log through `tracing` with structured
// fields (`pool`, `worker`, `workers`, ...). This module installs a global
// subscriber for applications that do not bring their own.
//
// # Usage Examples
//
// ```rust
// use multipool::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// // DEBUG level for multipool, TRACE for worker threads
// logging::init_development();
//
// // INFO level, JSON lines, no file/line info
// logging::init_production();
//
// // Console plus an append-only log file
// logging::init_with_file(logging::LogConfig::default(), "/var/log/multipool.log").unwrap();
// ```
//
// Worker threads are plain OS threads. Each pool captures the dispatcher that
// is current when the pool is built and installs it on its workers, so a
// scoped subscriber set with `tracing::subscriber::set_default` also covers
// the workers of pools created inside that scope.

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Configuration for the logging system.
///
/// # Examples
///
/// ```rust
/// use multipool::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     target_filters: Some("multipool::engine=trace".to_string()),
///     ..Default::default()
/// };
/// assert!(!config.json_format);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

impl LogConfig {
    /// DEBUG level for multipool and TRACE for the engine.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            target_filters: Some("multipool=debug,multipool::engine=trace".to_string()),
            ..Default::default()
        }
    }

    /// INFO level JSON lines without file/line information.
    pub fn production() -> Self {
        Self {
            json_format: true,
            show_file_line: false,
            ..Default::default()
        }
    }

    /// WARN level, no timestamps or thread details.
    pub fn for_tests() -> Self {
        Self {
            level: Level::WARN,
            show_thread_info: false,
            show_time: false,
            ..Default::default()
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(config.level).into());

    if let Some(filters) = &config.target_filters {
        for filter_expr in filters.split(',') {
            if let Ok(directive) = filter_expr.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

fn console_layer<S>(config: &LogConfig) -> fmt::Layer<S> {
    fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info)
}

/// Builds the console subscriber described by `config` without installing it.
///
/// Useful with `tracing::subscriber::with_default` to scope logging to one
/// block or test.
pub fn subscriber(config: &LogConfig) -> BoxedSubscriber {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);
        return Box::new(registry.with(json_layer));
    }

    let layer = console_layer(config);
    if config.show_time {
        Box::new(registry.with(layer))
    } else {
        Box::new(registry.with(layer.without_time()))
    }
}

/// Builds a subscriber writing to the console and appending to `log_file`.
///
/// The file sink is always plain text with file, line, and thread details.
///
/// # Errors
/// Returns an error if `log_file` cannot be opened for appending.
pub fn file_subscriber(config: &LogConfig, log_file: &str) -> io::Result<BoxedSubscriber> {
    drop(file_writer(log_file)?);

    let path = log_file.to_string();
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(move || file_writer(&path).unwrap_or_else(|_| Box::new(io::stderr())))
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_thread_ids(true);

    Ok(Box::new(
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(console_layer(config))
            .with(file_layer),
    ))
}

/// Installs the subscriber described by `config` as the global default.
///
/// Safe to call multiple times; only the first call takes effect. `RUST_LOG`
/// directives are honoured on top of `config.level`.
pub fn init(config: LogConfig) {
    INIT.call_once(|| set_global_subscriber(subscriber(&config)));
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Installs a console plus file subscriber as the global default.
///
/// # Errors
/// Returns an error if the log file cannot be opened. Nothing is installed in
/// that case.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    let subscriber = file_subscriber(&config, log_file)?;
    INIT.call_once(|| set_global_subscriber(subscriber));
    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// See [`LogConfig::development`].
pub fn init_development() {
    init(LogConfig::development());
}

/// See [`LogConfig::production`].
pub fn init_production() {
    init(LogConfig::production());
}

/// See [`LogConfig::for_tests`].
pub fn init_test() {
    init(LogConfig::for_tests());
}

/// Returns the dispatcher that is current on this thread.
///
/// Install it on threads spawned outside of tracing's reach so they log to the
/// same subscriber.
///
/// ```rust
/// use multipool::logging;
/// use std::thread;
///
/// let dispatcher = logging::current_subscriber();
/// thread::spawn(move || {
///     tracing::dispatcher::with_default(&dispatcher, || {
///         tracing::info!("helper thread started");
///     });
/// })
/// .join()
/// .unwrap();
/// ```
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

/// Creates a span covering work done on behalf of one pool.
///
/// ```rust
/// let span = multipool::pool_span!("thumbnails");
/// let _guard = span.enter();
///
/// let span = multipool::pool_span!("thumbnails", workers = 4);
/// ```
#[macro_export]
macro_rules! pool_span {
    ($pool:expr) => {
        tracing::info_span!("pool", pool = %$pool)
    };
    ($pool:expr, $($fields:tt)*) => {
        tracing::info_span!("pool", pool = %$pool, $($fields)*)
    };
}

/// Logs a pool event at `info` when `verbose` is set and at `debug` otherwise.
///
/// ```rust
/// multipool::log_pool_event!(true, "thumbnails", "worker started", worker = 3);
/// ```
#[macro_export]
macro_rules! log_pool_event {
    ($verbose:expr, $pool:expr, $event:literal) => {
        if $verbose {
            tracing::info!(pool = %$pool, $event);
        } else {
            tracing::debug!(pool = %$pool, $event);
        }
    };
    ($verbose:expr, $pool:expr, $event:literal, $($fields:tt)*) => {
        if $verbose {
            tracing::info!(pool = %$pool, $($fields)*, $event);
        } else {
            tracing::debug!(pool = %$pool, $($fields)*, $event);
        }
    };
}
