use crate::document::LogDocument;
use crate::host::HostId;
use async_trait::async_trait;
use std::error::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Default prefix for ordinary log indices.
pub const DEFAULT_ORDINARY_PREFIX: &str = "ordinary-log";
/// Default prefix for trace (correlation) log indices.
pub const DEFAULT_TRACE_PREFIX: &str = "trace-log";

/// Asynchronous indexed-search backend that persists [`LogDocument`]s.
///
/// Implementations own any time-bucketing of `index_prefix` into concrete
/// index names, using `time_ms` as the bucketing key.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Persist a single document.
    ///
    /// **Parameters**
    /// - `document`: the flattened log document.
    /// - `index_prefix`: host-scoped prefix chosen by [`IndexNames::route`].
    /// - `document_type`: logical document type, `"log"` by default.
    /// - `time_ms`: document time in milliseconds since the epoch.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the document.
    /// - `Err(..)` on transport or backend failure. The mirror worker retries
    ///   a bounded number of times and then drops the document.
    async fn save(
        &self,
        document: &LogDocument,
        index_prefix: &str,
        document_type: &str,
        time_ms: i64,
    ) -> Result<(), BoxError>;
}

/// Host-scoped index prefixes, computed once at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    ordinary: String,
    trace: String,
}

impl IndexNames {
    /// Suffix both prefixes with `-<host>`; an empty host leaves them bare.
    pub fn new(ordinary_prefix: &str, trace_prefix: &str, host: &HostId) -> Self {
        let scoped = |prefix: &str| {
            if host.is_empty() {
                prefix.to_string()
            } else {
                format!("{}-{}", prefix, host)
            }
        };
        IndexNames { ordinary: scoped(ordinary_prefix), trace: scoped(trace_prefix) }
    }

    pub fn ordinary(&self) -> &str {
        &self.ordinary
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub fn route(&self, document: &LogDocument) -> &str {
        if document.is_trace() {
            &self.trace
        } else {
            &self.ordinary
        }
    }
}

/// A backend that simply drops all documents.
///
/// Useful for measuring the overhead of the mirror itself without any
/// external I/O.
#[derive(Clone, Default)]
pub struct NoopBackend;

#[async_trait]
impl IndexBackend for NoopBackend {
    async fn save(&self, _document: &LogDocument, _index_prefix: &str, _document_type: &str, _time_ms: i64) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_host_scoped() {
        let names = IndexNames::new("ordinary-log", "trace-log", &HostId::new("10.0.0.5"));
        assert_eq!(names.ordinary(), "ordinary-log-10.0.0.5");
        assert_eq!(names.trace(), "trace-log-10.0.0.5");
    }

    #[test]
    fn empty_host_keeps_bare_prefixes() {
        let names = IndexNames::new(DEFAULT_ORDINARY_PREFIX, DEFAULT_TRACE_PREFIX, &HostId::default());
        assert_eq!(names.ordinary(), "ordinary-log");
        assert_eq!(names.trace(), "trace-log");
    }

    #[test]
    fn routes_by_category() {
        let names = IndexNames::new("o", "t", &HostId::new("h"));
        let trace = LogDocument { server_name: "trace".into(), ..Default::default() };
        let ordinary = LogDocument { server_name: "worker".into(), ..Default::default() };
        assert_eq!(names.route(&trace), "t-h");
        assert_eq!(names.route(&ordinary), "o-h");
    }
}
