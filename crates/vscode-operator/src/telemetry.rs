//! Logging setup for the operator binary.
//!
//! Console logs are human readable and filtered through `CONSOLE_LOG_LEVEL`. File logs are
//! written as JSON into a rolling log file and filtered through `FILE_LOG_LEVEL`. Both levels
//! default to `INFO` and accept the usual [`EnvFilter`] directive syntax.
use std::path::PathBuf;

use clap::Args;
use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer as _, Registry, filter::Directive, fmt, layer::SubscriberExt as _,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unable to install global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },

    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },
}

/// Keeps the background log writer alive.
///
/// Buffered file log lines are flushed when this is dropped, so it must be held until the
/// process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct Tracing {
    _file_log_guard: Option<WorkerGuard>,
}

impl Tracing {
    pub const CONSOLE_LOG_LEVEL_ENV: &str = "CONSOLE_LOG_LEVEL";
    pub const FILE_LOG_LEVEL_ENV: &str = "FILE_LOG_LEVEL";
    pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

    /// Installs the global subscriber according to `options`.
    pub fn init(service_name: &'static str, options: &TelemetryOptions) -> Result<Self> {
        let mut layers: Vec<Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync>> =
            Vec::new();

        if !options.console_log_disabled {
            let console_filter = env_filter_builder(Self::CONSOLE_LOG_LEVEL_ENV, LevelFilter::INFO);
            layers.push(fmt::layer().with_filter(console_filter).boxed());
        }

        let mut file_log_guard = None;
        if let Some(directory) = &options.file_log_directory {
            let rotation = options
                .file_log_rotation_period
                .clone()
                .unwrap_or_default();

            let appender = RollingFileAppender::builder()
                .rotation(rotation.into())
                .filename_prefix(service_name)
                .filename_suffix(Self::FILE_LOG_SUFFIX)
                .build(directory)
                .context(InitRollingFileAppenderSnafu)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_log_guard = Some(guard);

            let file_filter = env_filter_builder(Self::FILE_LOG_LEVEL_ENV, LevelFilter::INFO);
            layers.push(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            );
        }

        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::set_global_default(subscriber)
            .context(SetGlobalDefaultSubscriberSnafu)?;

        tracing::info!(
            service_name,
            console_log_enabled = !options.console_log_disabled,
            file_log_directory = ?options.file_log_directory,
            "initialized logging"
        );

        Ok(Self {
            _file_log_guard: file_log_guard,
        })
    }
}

fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}

/// Logging related command line arguments.
#[derive(Debug, Default, PartialEq, Eq, Args)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[arg(long, env)]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[arg(long, env, value_name = "DIRECTORY", group = "file_log")]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[arg(long, env, value_name = "PERIOD", requires = "file_log")]
    pub file_log_rotation_period: Option<RotationPeriod>,
}

/// Supported periods when the log file is rolled over.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(RotationPeriod::Minutely, Rotation::MINUTELY)]
    #[case(RotationPeriod::Hourly, Rotation::HOURLY)]
    #[case(RotationPeriod::Daily, Rotation::DAILY)]
    #[case(RotationPeriod::Never, Rotation::NEVER)]
    fn rotation_from_period(#[case] period: RotationPeriod, #[case] expected: Rotation) {
        assert_eq!(Rotation::from(period), expected);
    }

    #[rstest]
    #[case("Hourly", RotationPeriod::Hourly)]
    #[case("Never", RotationPeriod::Never)]
    fn rotation_period_from_str(#[case] input: &str, #[case] expected: RotationPeriod) {
        assert_eq!(input.parse::<RotationPeriod>(), Ok(expected));
    }

    #[test]
    fn rotation_period_defaults_to_never() {
        assert_eq!(RotationPeriod::default(), RotationPeriod::Never);
    }
}
