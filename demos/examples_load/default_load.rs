use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_core_mirror::init::{init_logging_with_config, LoggingConfig};
use log_core_mirror::sink::LockedWriteSyncer;

#[tokio::main]
async fn main() {
    // Primary output is discarded so the numbers reflect the core and the
    // mirror hand-off, not terminal speed.
    let mut config = LoggingConfig::default();
    config.core.mirror_enabled = true;
    config.mirror_dsn = Some("noop://".to_string());

    let logging = init_logging_with_config(Arc::new(LockedWriteSyncer::new(io::sink())), config)
        .expect("init logging");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: logged {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let mirror = logging.mirror.clone().expect("mirror enabled");
    mirror.flush().await.expect("flush mirror");
    println!("mirror: {:?}", mirror.stats());
    logging.shutdown().await.expect("shutdown");
}
