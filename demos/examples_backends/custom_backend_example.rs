use std::sync::Arc;

use async_trait::async_trait;
use log_core_mirror::core::{Core, IoCore};
use log_core_mirror::document::LogDocument;
use log_core_mirror::encoder::JsonEncoder;
use log_core_mirror::entry::Entry;
use log_core_mirror::field::Field;
use log_core_mirror::host::HostId;
use log_core_mirror::index::{BoxError, IndexBackend, IndexNames};
use log_core_mirror::level::Level;
use log_core_mirror::mirror::{ErrorMirror, MirrorConfig};
use log_core_mirror::sink::LockedWriteSyncer;

/// Example of integrating a completely custom indexing backend by
/// implementing the `IndexBackend` trait directly. Imagine this talks to
/// some proprietary search service.
struct MyCustomIndex;

#[async_trait]
impl IndexBackend for MyCustomIndex {
    async fn save(&self, document: &LogDocument, index_prefix: &str, _document_type: &str, _time_ms: i64) -> Result<(), BoxError> {
        // Here you would call your own client library for the target service.
        println!("[my-custom-index:{}] {:?}", index_prefix, document);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let names = IndexNames::new("ordinary-log", "trace-log", &HostId::process());
    let (mirror, handle) = ErrorMirror::spawn(Arc::new(MyCustomIndex), names, MirrorConfig::default());

    let core = IoCore::new(
        Arc::new(JsonEncoder),
        Arc::new(LockedWriteSyncer::stdout()),
        Arc::new(Level::Info),
    )
    .with_mirror(Some(mirror.clone()), true);
    let request_core = core.with(&[Field::new("request_id", "r-17")]);

    let entry = Entry::new(Level::Error, "simulated error sent via custom backend")
        .with_logger_name("checkout")
        .with_caller(format!("{}:{}", file!(), line!()));
    if let Some(ce) = request_core.check(&entry, None) {
        ce.write(&[Field::new("db", "my-custom-index")]).expect("write entry");
    }

    mirror.shutdown().await.expect("shutdown mirror");
    handle.await.expect("mirror worker");
}
