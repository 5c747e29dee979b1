use std::sync::Arc;

use tracing::{error, info};
use log_core_mirror::init::{init_logging_with_config, LoggingConfig};
use log_core_mirror::sink::LockedWriteSyncer;

#[tokio::main]
async fn main() {
    // Example DSN: opensearch://localhost:9200
    let dsn = std::env::var("LOG_MIRROR_DSN")
        .unwrap_or_else(|_| "opensearch://localhost:9200".to_string());

    let mut config = LoggingConfig::default();
    config.core.mirror_enabled = true;
    config.mirror_dsn = Some(dsn);

    let logging = init_logging_with_config(Arc::new(LockedWriteSyncer::stdout()), config)
        .expect("failed to build opensearch mirror");

    info!("opensearch mirror example started");
    info!(category = "trace", "{}", r#"{"uid":7,"tid":42,"parent":1}"#);
    error!(index = "logs", "simulated error mirrored into OpenSearch");

    logging.shutdown().await.expect("shutdown");
}
