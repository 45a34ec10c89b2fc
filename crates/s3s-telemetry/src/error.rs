//! Failures raised while wiring up logging or the s3s metric registry.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global log subscriber was already installed, or installing one failed.
    #[error("log subscriber could not be installed for s3s")]
    LoggingInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// An s3s metric definition was rejected by Prometheus.
    #[error("s3s metric definition rejected")]
    MetricDefinition {
        /// Name of the rejected metric.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// An s3s metric could not be added to the registry.
    #[error("s3s metric registration rejected")]
    MetricRegistration {
        /// Name of the metric that failed to register.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The registry could not be rendered in the text exposition format.
    #[error("s3s metrics exposition failed")]
    Exposition {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The rendered exposition was not UTF-8.
    #[error("s3s metrics exposition is not utf-8")]
    ExpositionUtf8 {
        /// Underlying UTF-8 conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Metric tied to the failure, when there is one.
    #[must_use]
    pub const fn metric(&self) -> Option<&'static str> {
        match self {
            Self::MetricDefinition { metric, .. } | Self::MetricRegistration { metric, .. } => {
                Some(*metric)
            }
            Self::LoggingInstall { .. } | Self::Exposition { .. } | Self::ExpositionUtf8 { .. } => {
                None
            }
        }
    }
}
