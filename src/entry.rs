use crate::core::{Core, CoreError};
use crate::field::Field;
use crate::level::Level;
use chrono::{DateTime, Local};

/// A single log event before serialization.
#[derive(Debug, Clone)]
pub struct Entry {
    pub level: Level,
    pub time: DateTime<Local>,
    /// Logical category of the entry. `"trace"` marks correlation entries
    /// whose message is a `{"uid","tid","parent"}` JSON object.
    pub logger_name: String,
    pub message: String,
    /// Call site, usually `file:line`.
    pub caller: Option<String>,
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Entry {
            level,
            time: Local::now(),
            logger_name: String::new(),
            message: message.into(),
            caller: None,
        }
    }

    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = time;
        self
    }
}

/// An entry paired with the cores that agreed to log it.
///
/// Built by [`Core::check`]; nothing is serialized until [`CheckedEntry::write`],
/// which consumes the accumulator so every core is written at most once.
pub struct CheckedEntry<'a> {
    entry: Entry,
    cores: Vec<&'a dyn Core>,
}

impl<'a> CheckedEntry<'a> {
    /// Append `core`, allocating the accumulator when `ce` is `None`.
    pub fn add_core(ce: Option<CheckedEntry<'a>>, entry: &Entry, core: &'a dyn Core) -> CheckedEntry<'a> {
        let mut ce = ce.unwrap_or_else(|| CheckedEntry {
            entry: entry.clone(),
            cores: Vec::with_capacity(2),
        });
        ce.cores.push(core);
        ce
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Write the entry and call-site `fields` to every accepted core.
    ///
    /// All cores are written even if an earlier one fails; the failures are
    /// returned together.
    pub fn write(self, fields: &[Field]) -> Result<(), CoreError> {
        let mut errors = Vec::new();
        for core in &self.cores {
            if let Err(e) = core.write(&self.entry, fields) {
                errors.push(e);
            }
        }
        CoreError::combine(errors)
    }
}
