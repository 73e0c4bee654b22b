use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "lumen_engine=debug,wgpu=warn") and takes precedence over `RUST_LOG`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    /// Level used when neither `env_filter` nor `RUST_LOG` is set.
    pub default_level: log::LevelFilter,
    /// Caps wgpu and naga at `warn` unless the filter names them explicitly.
    pub quiet_gpu_stack: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            quiet_gpu_stack: true,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

const GPU_STACK: [&str; 4] = ["wgpu_core", "wgpu_hal", "wgpu", "naga"];

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored.
///
/// A logger installed by someone else (a test harness, the host application) is left alone.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(config.default_level);

        let filter = config.env_filter.or_else(|| std::env::var("RUST_LOG").ok());
        if config.quiet_gpu_stack {
            for module in GPU_STACK {
                let named = filter.as_deref().is_some_and(|f| f.contains(module));
                if !named {
                    builder.filter_module(module, log::LevelFilter::Warn);
                }
            }
        }
        if let Some(filter) = filter.as_deref() {
            builder.parse_filters(filter);
        }

        builder.write_style(config.write_style);
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
