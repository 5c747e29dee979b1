use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use log_core_mirror::init::{init_logging_with_config, LoggingConfig};
use log_core_mirror::mirror::MirrorConfig;
use log_core_mirror::sink::LockedWriteSyncer;

#[tokio::main]
async fn main() {
    let mut config = LoggingConfig {
        mirror: MirrorConfig {
            channel_buffer: 50_000,
            batch_size: 1_000,
            flush_interval: Duration::from_millis(200),
            max_retries: 0,
            ..MirrorConfig::default()
        },
        mirror_dsn: Some("noop://".to_string()),
        host: Some("load-test".to_string()),
        ..LoggingConfig::default()
    };
    config.core.mirror_enabled = true;

    let logging = init_logging_with_config(Arc::new(LockedWriteSyncer::new(io::sink())), config)
        .expect("init logging");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: logged {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let mirror = logging.mirror.clone().expect("mirror enabled");
    mirror.flush().await.expect("flush mirror");
    println!("mirror: {:?}", mirror.stats());
    logging.shutdown().await.expect("shutdown");
}
