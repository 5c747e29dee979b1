use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use log_core_mirror::core::{Core, IoCore, TeeCore};
use log_core_mirror::document::LogDocument;
use log_core_mirror::encoder::{JsonEncoder, TabEncoder};
use log_core_mirror::entry::Entry;
use log_core_mirror::field::Field;
use log_core_mirror::host::{select_host, HostId};
use log_core_mirror::index::{BoxError, IndexBackend, IndexNames};
use log_core_mirror::level::Level;
use log_core_mirror::mirror::{ErrorMirror, MirrorConfig};
use log_core_mirror::sink::WriteSyncer;
use parking_lot::Mutex;

#[derive(Default)]
struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl WriteSyncer for MemorySink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.lines.lock().push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }
}

#[derive(Default)]
struct MemoryIndex {
    saved: Mutex<Vec<(String, LogDocument)>>,
}

#[async_trait]
impl IndexBackend for MemoryIndex {
    async fn save(&self, document: &LogDocument, index_prefix: &str, _document_type: &str, _time_ms: i64) -> Result<(), BoxError> {
        self.saved.lock().push((index_prefix.to_string(), document.clone()));
        Ok(())
    }
}

fn ten_am() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn written_lines_and_structured_hand_off_agree() {
    let index = Arc::new(MemoryIndex::default());
    let names = IndexNames::new("ordinary-log", "trace-log", &HostId::new("10.0.0.5"));
    let (mirror, _handle) = ErrorMirror::spawn(index.clone(), names, MirrorConfig::default());

    let sink = Arc::new(MemorySink::default());
    let core = IoCore::new(Arc::new(TabEncoder), sink.clone(), Arc::new(Level::Info))
        .with_mirror(Some(mirror.clone()), true)
        .with(&[Field::new("service", "billing")]);

    let entry = Entry::new(Level::Warn, r#"{"uid":7,"tid":42,"parent":1}"#)
        .with_logger_name("trace")
        .with_caller("main.go:10")
        .with_time(ten_am());
    core.check(&entry, None).expect("accepted").write(&[]).unwrap();

    // Feed the rendered line back through the line parser as well.
    let line = sink.lines.lock()[0].clone();
    mirror.submit_line(&line).unwrap();
    mirror.flush().await.unwrap();

    let saved = index.saved.lock();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0], saved[1]);

    let (index_name, doc) = &saved[0];
    assert_eq!(index_name, "trace-log-10.0.0.5");
    assert_eq!(doc.time, ten_am().timestamp_millis());
    assert_eq!((doc.uid, doc.tid, doc.parent), (7, 42, 1));
    assert_eq!(doc.log_level, "WARN");
}

#[tokio::test]
async fn ordinary_entries_route_to_ordinary_index() {
    let index = Arc::new(MemoryIndex::default());
    let names = IndexNames::new("ordinary-log", "trace-log", &HostId::new(select_host(Vec::new())));
    let (mirror, _handle) = ErrorMirror::spawn(index.clone(), names, MirrorConfig::default());

    let core = IoCore::new(Arc::new(JsonEncoder), Arc::new(MemorySink::default()), Arc::new(Level::Debug))
        .with_mirror(Some(mirror.clone()), true);
    let entry = Entry::new(Level::Info, "hello").with_logger_name("worker");
    core.check(&entry, None).expect("accepted").write(&[]).unwrap();
    mirror.flush().await.unwrap();

    let saved = index.saved.lock();
    let (index_name, doc) = &saved[0];
    assert_eq!(index_name, "ordinary-log");
    assert_eq!(doc.data, "hello");
    assert_eq!((doc.uid, doc.tid, doc.parent), (0, 0, 0));
}

#[test]
fn concurrent_writers_on_sibling_cores_stay_isolated() {
    let sink = Arc::new(MemorySink::default());
    let base: Arc<dyn Core> = Arc::new(IoCore::new(Arc::new(TabEncoder), sink.clone(), Arc::new(Level::Debug)));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let core = base.with(&[Field::new("worker", worker)]);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let entry = Entry::new(Level::Info, "tick");
                    core.check(&entry, None).expect("accepted").write(&[]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let lines = sink.lines.lock();
    assert_eq!(lines.len(), 200);
    for line in lines.iter() {
        let fields = line.trim_end().rsplit('\t').next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(fields).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 1);
    }
}

#[test]
fn tee_writes_each_accepting_core_once() {
    let verbose = Arc::new(MemorySink::default());
    let errors_only = Arc::new(MemorySink::default());
    let tee = TeeCore::new(vec![
        Arc::new(IoCore::new(Arc::new(TabEncoder), verbose.clone(), Arc::new(Level::Debug))),
        Arc::new(IoCore::new(Arc::new(TabEncoder), errors_only.clone(), Arc::new(Level::Error))),
    ]);

    for (level, msg) in [(Level::Info, "info"), (Level::Error, "error")] {
        let entry = Entry::new(level, msg);
        if let Some(ce) = tee.check(&entry, None) {
            ce.write(&[]).unwrap();
        }
    }

    assert_eq!(verbose.lines.lock().len(), 2);
    assert_eq!(errors_only.lines.lock().len(), 1);
}
