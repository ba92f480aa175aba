//! Observability hooks for the conversion engine.
//!
//! Compression decisions are the part of the engine worth watching: which mode the
//! statistics recommend for a dimension, and what each conversion cost. The
//! `log_metric!` macro emits those as structured key/value lines through the `log`
//! facade under the `pointcloud::metric` target, so an application filters them like
//! any other log output.

use log::LevelFilter;
use std::sync::Once;

/// Logs a structured key-value metric at debug level.
///
/// # Example
/// ```
/// use pointcloud::log_metric;
/// let npoints = 4;
/// log_metric!("event" = "compress", "target" = "dimensional", "npoints" = &npoints);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::__log::log_enabled!(target: "pointcloud::metric", $crate::__log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::__log::debug!(target: "pointcloud::metric", "{{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` at the given level. Only the first call has an effect.
pub fn enable_verbose_logging(level: LevelFilter) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        });

        let _ = builder.try_init();
    });
}
