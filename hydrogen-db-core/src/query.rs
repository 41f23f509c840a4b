use serde_json::Value;
use time::OffsetDateTime;

use crate::queue_class::QueueClass;

/// A single unit of work submitted to the Queue Manager. Only
/// `query_template` is mandatory; every other string field tolerates being
/// absent.
#[derive(Clone, Debug)]
pub struct DatabaseQuery {
    pub query_id: Option<String>,
    pub query_template: String,
    pub parameters_json: Value,
    pub class_hint: QueueClass,
    pub submitted_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl DatabaseQuery {
    /// `parameters_json` of `null` is treated as `{}`: no bind parameters.
    pub fn new(query_template: impl Into<String>, parameters_json: Option<Value>) -> Option<Self> {
        let query_template = query_template.into();
        if query_template.is_empty() {
            return None;
        }
        let parameters_json = match parameters_json {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(other) => other,
        };
        Some(DatabaseQuery {
            query_id: None,
            query_template,
            parameters_json,
            class_hint: QueueClass::Medium,
            submitted_at: OffsetDateTime::now_utc(),
            processed_at: None,
            retry_count: 0,
            error_message: None,
        })
    }

    pub fn with_class_hint(mut self, class_hint: QueueClass) -> Self {
        self.class_hint = class_hint;
        self
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_is_rejected() {
        assert!(DatabaseQuery::new("", None).is_none());
    }

    #[test]
    fn null_parameters_become_empty_object() {
        let q = DatabaseQuery::new("select 1", Some(Value::Null)).unwrap();
        assert_eq!(q.parameters_json, Value::Object(Default::default()));
    }

    #[test]
    fn missing_parameters_become_empty_object() {
        let q = DatabaseQuery::new("select 1", None).unwrap();
        assert_eq!(q.parameters_json, Value::Object(Default::default()));
    }
}
