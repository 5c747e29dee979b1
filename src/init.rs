use crate::backend::{make_backend_from_config, parse_dsn, BackendBuildError, DsnError};
use crate::core::{Core, IoCore};
use crate::encoder::TabEncoder;
use crate::env::{self, env_flag, env_or};
use crate::host::HostId;
use crate::index::IndexNames;
use crate::layer::CoreLayer;
use crate::level::{AtomicLevel, Level, ParseLevelError};
use crate::mirror::{ErrorMirror, MirrorConfig, MirrorError};
use crate::sink::{LockedWriteSyncer, WriteSyncer};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Level gating and mirroring switches of the primary core.
///
/// **Fields**
/// - `level`: minimum level written to the primary sink.
/// - `sync_threshold`: entries strictly above it flush the sink.
/// - `mirror_enabled`: whether written entries are mirrored.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub level: Level,
    pub sync_threshold: Level,
    pub mirror_enabled: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            sync_threshold: Level::Error,
            mirror_enabled: false,
        }
    }
}

/// Full logging setup: core, mirror queue and backend selection.
///
/// **Fields**
/// - `mirror_dsn`: backend DSN, required when mirroring is enabled.
/// - `host`: explicit host identifier; detected from interfaces when `None`.
/// - `enable_stdout`: additionally install `tracing_subscriber::fmt` so
///   events are also printed in the usual console format.
#[derive(Clone, Debug, Default)]
pub struct LoggingConfig {
    pub core: CoreConfig,
    pub mirror: MirrorConfig,
    pub mirror_dsn: Option<String>,
    pub host: Option<String>,
    pub enable_stdout: bool,
}

impl LoggingConfig {
    /// Build a configuration from the variables listed in [`crate::env`].
    pub fn from_env() -> Result<Self, InitError> {
        let mut config = LoggingConfig::default();
        config.core.level = env_or(env::LOG_LEVEL_ENV, "info").parse()?;
        config.core.mirror_enabled = env_flag(env::LOG_MIRROR_ENABLED_ENV, false);
        config.mirror_dsn = std::env::var(env::LOG_MIRROR_DSN_ENV).ok();
        config.host = std::env::var(env::LOG_MIRROR_HOST_ENV).ok();
        config.mirror.ordinary_prefix = env_or(env::LOG_MIRROR_ORDINARY_PREFIX_ENV, &config.mirror.ordinary_prefix);
        config.mirror.trace_prefix = env_or(env::LOG_MIRROR_TRACE_PREFIX_ENV, &config.mirror.trace_prefix);
        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Level(#[from] ParseLevelError),

    #[error("invalid mirror DSN: {0}")]
    Dsn(#[from] DsnError),

    #[error(transparent)]
    Backend(#[from] BackendBuildError),

    #[error("mirroring is enabled but no mirror DSN is configured")]
    MissingDsn,

    #[error("the mirror worker needs a running Tokio runtime")]
    NoRuntime,

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Handles to a built logging stack.
pub struct Logging {
    pub core: Arc<dyn Core>,
    /// Runtime-adjustable threshold of `core`.
    pub level: Arc<AtomicLevel>,
    pub mirror: Option<Arc<ErrorMirror>>,
    mirror_handle: Option<JoinHandle<()>>,
}

impl Logging {
    /// Flush the primary sink and drain the mirror.
    pub async fn shutdown(self) -> Result<(), MirrorError> {
        if let Err(e) = self.core.sync() {
            tracing::warn!(error = %e, "failed to sync primary sink on shutdown");
        }
        if let Some(mirror) = &self.mirror {
            mirror.shutdown().await?;
        }
        if let Some(handle) = self.mirror_handle {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Build the core described by `config` on top of `sink`.
///
/// When mirroring is enabled this resolves the host identifier, derives the
/// index names once and spawns the mirror worker, so it must run inside a
/// Tokio runtime.
pub fn build_core(sink: Arc<dyn WriteSyncer>, config: &LoggingConfig) -> Result<Logging, InitError> {
    let level = Arc::new(AtomicLevel::new(config.core.level));

    let (mirror, mirror_handle) = if config.core.mirror_enabled {
        let dsn = config.mirror_dsn.as_deref().ok_or(InitError::MissingDsn)?;
        let backend = make_backend_from_config(&parse_dsn(dsn)?)?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(InitError::NoRuntime);
        }

        let host = config.host.clone().map(HostId::new).unwrap_or_else(HostId::process);
        let names = IndexNames::new(&config.mirror.ordinary_prefix, &config.mirror.trace_prefix, &host);
        tracing::debug!(ordinary = names.ordinary(), trace = names.trace(), "mirror index names resolved");

        let (mirror, handle) = ErrorMirror::spawn(backend, names, config.mirror.clone());
        (Some(mirror), Some(handle))
    } else {
        (None, None)
    };

    let core = IoCore::new(Arc::new(TabEncoder), sink, level.clone())
        .with_sync_threshold(config.core.sync_threshold)
        .with_mirror(mirror.clone(), config.core.mirror_enabled);

    Ok(Logging { core: Arc::new(core), level, mirror, mirror_handle })
}

/// Build the logging stack and install it as the global `tracing`
/// subscriber.
///
/// **Parameters**
/// - `sink`: primary destination for encoded entries.
/// - `config`: [`LoggingConfig`] controlling gating and mirroring.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`CoreLayer`] (and the `fmt`
/// layer when `enable_stdout` is set) as the global default subscriber.
pub fn init_logging_with_config(sink: Arc<dyn WriteSyncer>, config: LoggingConfig) -> Result<Logging, InitError> {
    let logging = build_core(sink, &config)?;
    let layer = CoreLayer::new(Arc::clone(&logging.core));

    // Two subscriber shapes because the layer stacks have different types.
    if config.enable_stdout {
        let subscriber = Registry::default().with(layer).with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(logging)
}

/// Initialize logging from the environment, writing the tab layout to
/// stdout. This is the recommended entrypoint for typical services.
pub fn init_logging() -> Result<Logging, InitError> {
    let config = LoggingConfig::from_env()?;
    init_logging_with_config(Arc::new(LockedWriteSyncer::stdout()), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    fn stdout() -> Arc<dyn WriteSyncer> {
        Arc::new(LockedWriteSyncer::new(Vec::new()))
    }

    #[test]
    fn plain_core_needs_no_runtime() {
        let logging = build_core(stdout(), &LoggingConfig::default()).unwrap();
        assert!(logging.mirror.is_none());
        assert!(!logging.core.enabled(Level::Debug));

        logging.level.set_level(Level::Debug);
        assert!(logging.core.enabled(Level::Debug));
    }

    #[test]
    fn mirror_requires_dsn() {
        let mut config = LoggingConfig::default();
        config.core.mirror_enabled = true;
        assert!(matches!(build_core(stdout(), &config), Err(InitError::MissingDsn)));
    }

    #[test]
    fn mirror_requires_runtime() {
        let mut config = LoggingConfig::default();
        config.core.mirror_enabled = true;
        config.mirror_dsn = Some("noop://".to_string());
        assert!(matches!(build_core(stdout(), &config), Err(InitError::NoRuntime)));
    }

    #[tokio::test]
    async fn mirror_uses_configured_host() {
        let mut config = LoggingConfig::default();
        config.core.mirror_enabled = true;
        config.mirror_dsn = Some("noop://".to_string());
        config.host = Some("10.1.2.3".to_string());

        let logging = build_core(stdout(), &config).unwrap();
        let mirror = logging.mirror.clone().unwrap();
        assert_eq!(mirror.index_names().trace(), "trace-log-10.1.2.3");

        logging.core.write(&Entry::new(Level::Error, "mirrored"), &[]).unwrap();
        mirror.flush().await.unwrap();
        assert_eq!(mirror.stats().persisted, 1);

        logging.shutdown().await.unwrap();
    }
}
