use crate::buffer::BufferPool;
use crate::document::MirrorRecord;
use crate::encoder::{EncodeError, Encoder};
use crate::entry::{CheckedEntry, Entry};
use crate::field::{Context, Field};
use crate::level::{Level, LevelEnabler};
use crate::mirror::ErrorMirror;
use crate::sink::WriteSyncer;
use std::io;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("failed to encode entry: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to write entry: {0}")]
    Write(#[source] io::Error),

    #[error("failed to sync sink: {0}")]
    Sync(#[source] io::Error),

    #[error("{} cores failed to write", .0.len())]
    Multiple(Vec<CoreError>),
}

impl CoreError {
    /// Collapse per-core results: no errors is `Ok`, one error is returned
    /// as-is, more are wrapped in [`CoreError::Multiple`].
    pub fn combine(mut errors: Vec<CoreError>) -> Result<(), CoreError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(CoreError::Multiple(errors)),
        }
    }
}

/// Minimal, fast log destination.
///
/// Callers consult cores with [`Core::check`] and only then pay for
/// serialization through [`CheckedEntry::write`]. `write` must not repeat
/// the level check.
pub trait Core: Send + Sync {
    fn enabled(&self, level: Level) -> bool;

    /// Return a new core whose context also carries `fields`. The receiver
    /// is left untouched.
    fn with(&self, fields: &[Field]) -> Arc<dyn Core>;

    /// Add this core to `ce` if it accepts `entry`.
    fn check<'a>(&'a self, entry: &Entry, ce: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>>;

    /// Serialize `entry` with the core's context and call-site `fields` and
    /// write it to the destination.
    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<(), CoreError>;

    /// Flush buffered output.
    fn sync(&self) -> Result<(), CoreError>;
}

/// A core that accepts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopCore;

impl Core for NopCore {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn with(&self, _fields: &[Field]) -> Arc<dyn Core> {
        Arc::new(NopCore)
    }

    fn check<'a>(&'a self, _entry: &Entry, ce: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>> {
        ce
    }

    fn write(&self, _entry: &Entry, _fields: &[Field]) -> Result<(), CoreError> {
        Ok(())
    }

    fn sync(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Core that encodes entries onto a [`WriteSyncer`] and optionally mirrors
/// them into an [`ErrorMirror`].
///
/// Everything except the context is shared with clones made by
/// [`Core::with`].
#[derive(Clone)]
pub struct IoCore {
    enabler: Arc<dyn LevelEnabler>,
    context: Context,
    encoder: Arc<dyn Encoder>,
    out: Arc<dyn WriteSyncer>,
    pool: Arc<BufferPool>,
    sync_threshold: Level,
    mirror_enabled: bool,
    mirror: Option<Arc<ErrorMirror>>,
}

impl IoCore {
    pub fn new(encoder: Arc<dyn Encoder>, out: Arc<dyn WriteSyncer>, enabler: Arc<dyn LevelEnabler>) -> Self {
        IoCore {
            enabler,
            context: Context::default(),
            encoder,
            out,
            pool: Arc::new(BufferPool::default()),
            sync_threshold: Level::Error,
            mirror_enabled: false,
            mirror: None,
        }
    }

    /// Mirror written entries. `enabled == false` keeps the mirror attached
    /// but unused.
    pub fn with_mirror(mut self, mirror: Option<Arc<ErrorMirror>>, enabled: bool) -> Self {
        self.mirror = mirror;
        self.mirror_enabled = enabled;
        self
    }

    /// Entries strictly above `level` flush the sink after being written.
    pub fn with_sync_threshold(mut self, level: Level) -> Self {
        self.sync_threshold = level;
        self
    }

    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn mirror(&self) -> Option<&ErrorMirror> {
        if self.mirror_enabled {
            self.mirror.as_deref()
        } else {
            None
        }
    }
}

impl Core for IoCore {
    fn enabled(&self, level: Level) -> bool {
        self.enabler.enabled(level)
    }

    fn with(&self, fields: &[Field]) -> Arc<dyn Core> {
        let mut clone = self.clone();
        clone.context = self.context.with(fields);
        Arc::new(clone)
    }

    fn check<'a>(&'a self, entry: &Entry, ce: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>> {
        if self.enabled(entry.level) {
            return Some(CheckedEntry::add_core(ce, entry, self));
        }
        ce
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<(), CoreError> {
        let mut buf = self.pool.get();
        self.encoder.encode_entry(entry, &self.context, fields, &mut buf)?;

        let written = self.out.write(&buf).map(|_| ()).map_err(CoreError::Write);
        drop(buf);

        if entry.level > self.sync_threshold {
            // The process may be about to exit; flush regardless of the write
            // outcome and never let a sync failure replace it.
            if let Err(e) = self.out.sync() {
                tracing::debug!(error = %e, "sync after high-severity entry failed");
            }
        }

        // Only entries that reached the primary sink are mirrored.
        written?;

        if let Some(mirror) = self.mirror() {
            let _ = mirror.submit(MirrorRecord::from_entry(entry));
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), CoreError> {
        self.out.sync().map_err(CoreError::Sync)
    }
}

/// Fans every call out to a set of cores.
#[derive(Clone, Default)]
pub struct TeeCore {
    cores: Vec<Arc<dyn Core>>,
}

impl TeeCore {
    pub fn new(cores: Vec<Arc<dyn Core>>) -> Self {
        TeeCore { cores }
    }
}

impl Core for TeeCore {
    fn enabled(&self, level: Level) -> bool {
        self.cores.iter().any(|c| c.enabled(level))
    }

    fn with(&self, fields: &[Field]) -> Arc<dyn Core> {
        Arc::new(TeeCore { cores: self.cores.iter().map(|c| c.with(fields)).collect() })
    }

    fn check<'a>(&'a self, entry: &Entry, mut ce: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>> {
        for core in &self.cores {
            ce = core.check(entry, ce);
        }
        ce
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<(), CoreError> {
        let errors = self
            .cores
            .iter()
            .filter_map(|c| c.write(entry, fields).err())
            .collect();
        CoreError::combine(errors)
    }

    fn sync(&self) -> Result<(), CoreError> {
        let errors = self.cores.iter().filter_map(|c| c.sync().err()).collect();
        CoreError::combine(errors)
    }
}
