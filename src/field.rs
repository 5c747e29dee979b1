use serde_json::Value;
use std::sync::Arc;

/// A structured key/value attribute attached at a call site or carried as
/// core context.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Field { key: key.into(), value: value.into() }
    }
}

/// Immutable structured context owned by a core.
///
/// Cloning is a refcount bump. [`Context::with`] never touches the receiver:
/// it copies the existing fields plus the new ones into a fresh allocation,
/// so a core and the clone returned by `Core::with` can be written to
/// concurrently without seeing each other's fields.
#[derive(Debug, Clone)]
pub struct Context {
    fields: Arc<[Field]>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Vec::new())
    }
}

impl Context {
    pub fn new(fields: Vec<Field>) -> Self {
        Context { fields: fields.into() }
    }

    pub fn with(&self, fields: &[Field]) -> Context {
        if fields.is_empty() {
            return self.clone();
        }
        let mut merged = Vec::with_capacity(self.fields.len() + fields.len());
        merged.extend_from_slice(&self.fields);
        merged.extend_from_slice(fields);
        Context { fields: merged.into() }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_leaves_receiver_untouched() {
        let base = Context::new(vec![Field::new("service", "api")]);
        let child = base.with(&[Field::new("request_id", 7)]);

        assert_eq!(base.len(), 1);
        assert_eq!(child.len(), 2);
        assert_eq!(child.fields()[1], Field::new("request_id", 7));
    }

    #[test]
    fn chained_with_preserves_group_order() {
        let base = Context::default();
        let chained = base.with(&[Field::new("a", 1)]).with(&[Field::new("b", 2)]);
        let merged = base.with(&[Field::new("a", 1), Field::new("b", 2)]);
        assert_eq!(chained.fields(), merged.fields());
    }

    #[test]
    fn siblings_are_isolated() {
        let base = Context::new(vec![Field::new("k", "v")]);
        let left = base.with(&[Field::new("left", true)]);
        let right = base.with(&[Field::new("right", true)]);
        assert!(left.fields().iter().all(|f| f.key != "right"));
        assert!(right.fields().iter().all(|f| f.key != "left"));
    }
}
