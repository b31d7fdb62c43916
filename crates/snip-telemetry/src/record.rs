use jiff::Timestamp;
use std::sync::Arc;
use tracing::Level;

/// A single structured key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub key: String,
    pub value: String,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// What a producer hands to the sink: one formatted-later log line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub time: Timestamp,
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<Attr>,
}

impl LogRecord {
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            time: Timestamp::now(),
            level,
            target: target.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push(Attr::new(key, value));
        self
    }
}

/// Attributes and group path bound to a derived handler.
///
/// Bound attributes are qualified with the group path that was open when they
/// were bound. Record fields are qualified with the full path at format time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerContext {
    pub attrs: Vec<Attr>,
    pub groups: Vec<String>,
}

impl HandlerContext {
    pub fn qualify(&self, key: &str) -> String {
        if self.groups.is_empty() {
            return key.to_string();
        }
        let mut qualified = self.groups.join(".");
        qualified.push('.');
        qualified.push_str(key);
        qualified
    }
}

/// The unit that crosses the queue.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub context: Arc<HandlerContext>,
    pub record: LogRecord,
}

impl LogEntry {
    /// Bound attributes followed by the record's own fields, all fully qualified.
    pub fn qualified_fields(&self) -> Vec<(String, &str)> {
        self.context
            .attrs
            .iter()
            .map(|attr| (attr.key.clone(), attr.value.as_str()))
            .chain(
                self.record
                    .fields
                    .iter()
                    .map(|attr| (self.context.qualify(&attr.key), attr.value.as_str())),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_without_groups_is_identity() {
        assert_eq!(HandlerContext::default().qualify("user"), "user");
    }

    #[test]
    fn qualify_joins_groups_with_dots() {
        let context = HandlerContext {
            attrs: Vec::new(),
            groups: vec!["http".to_string(), "request".to_string()],
        };
        assert_eq!(context.qualify("method"), "http.request.method");
    }

    #[test]
    fn bound_attrs_come_before_record_fields() {
        let entry = LogEntry {
            context: Arc::new(HandlerContext {
                attrs: vec![Attr::new("service", "snip")],
                groups: vec!["req".to_string()],
            }),
            record: LogRecord::new(Level::INFO, "test", "hello").with_field("id", 7),
        };

        assert_eq!(
            entry.qualified_fields(),
            vec![
                ("service".to_string(), "snip"),
                ("req.id".to_string(), "7")
            ]
        );
    }
}
