use serde_json::Value;

use crate::classify::Operation;
use crate::transport::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub list: &'static str,
    pub params: Params,
    pub operation: Operation,
}

impl QueryRequest {
    pub fn new(list: &'static str, params: Params) -> Self {
        Self {
            list,
            params,
            operation: Operation::Read,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationDialect {
    /// `{"query-continue": {"<list>": {...}}}`
    Legacy,
    /// `{"continue": {...}}`
    Modern,
}

impl ContinuationDialect {
    /// A cursor in the other dialect's shape is not recognized and ends the
    /// sequence.
    pub fn cursor(self, body: &Value, list: &str) -> Option<Params> {
        let cursor = match self {
            Self::Legacy => body.get("query-continue")?.get(list)?,
            Self::Modern => body.get("continue")?,
        };
        let cursor = cursor.as_object()?;
        Some(
            cursor
                .iter()
                .map(|(key, value)| (key.clone(), param_value(value)))
                .collect(),
        )
    }
}

/// Progress through one paginated query. Holds no borrow of the session, so the
/// caller can issue other requests between pages.
#[derive(Debug, Clone)]
pub struct Pager {
    request: QueryRequest,
    cursor: Option<Params>,
    finished: bool,
}

impl Pager {
    pub fn new(request: QueryRequest) -> Self {
        Self {
            request,
            cursor: None,
            finished: false,
        }
    }

    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Parameters for the next page: the base request with the latest cursor
    /// merged over it. `None` once the sequence has ended.
    pub fn next_params(&mut self) -> Option<Params> {
        if self.finished {
            return None;
        }
        let mut params = self.request.params.clone();
        if let Some(cursor) = self.cursor.take() {
            merge_params(&mut params, cursor);
        }
        Some(params)
    }

    pub fn advance(&mut self, mut body: Value, dialect: ContinuationDialect) -> Vec<Value> {
        self.cursor = dialect.cursor(&body, self.request.list);
        if self.cursor.is_none() {
            self.finished = true;
        }
        match body
            .get_mut("query")
            .and_then(|query| query.get_mut(self.request.list))
            .map(Value::take)
        {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
        self.cursor = None;
    }
}

pub fn merge_params(params: &mut Params, overrides: Params) {
    for (key, value) in overrides {
        match params.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => params.push((key, value)),
        }
    }
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ContinuationDialect, Pager, QueryRequest, merge_params};

    fn allpages_request() -> QueryRequest {
        QueryRequest::new(
            "allpages",
            vec![
                ("action".to_string(), "query".to_string()),
                ("list".to_string(), "allpages".to_string()),
                ("aplimit".to_string(), "2".to_string()),
            ],
        )
    }

    #[test]
    fn legacy_cursor_is_nested_under_the_list_name() {
        let body = json!({"query-continue": {"allpages": {"apfrom": "Bar"}}});
        assert_eq!(
            ContinuationDialect::Legacy.cursor(&body, "allpages"),
            Some(vec![("apfrom".to_string(), "Bar".to_string())])
        );
        assert_eq!(ContinuationDialect::Legacy.cursor(&body, "search"), None);
    }

    #[test]
    fn modern_cursor_is_flat_and_stringified() {
        let body = json!({"continue": {"sroffset": 50, "continue": "-||"}});
        let cursor = ContinuationDialect::Modern
            .cursor(&body, "search")
            .expect("cursor");
        assert!(cursor.contains(&("sroffset".to_string(), "50".to_string())));
        assert!(cursor.contains(&("continue".to_string(), "-||".to_string())));
    }

    #[test]
    fn other_dialect_cursor_ends_the_sequence() {
        let legacy_shape = json!({"query-continue": {"allpages": {"apfrom": "Bar"}}});
        let modern_shape = json!({"continue": {"apcontinue": "Bar"}});
        assert_eq!(
            ContinuationDialect::Modern.cursor(&legacy_shape, "allpages"),
            None
        );
        assert_eq!(
            ContinuationDialect::Legacy.cursor(&modern_shape, "allpages"),
            None
        );
    }

    #[test]
    fn pager_merges_cursor_and_never_reuses_it() {
        let mut pager = Pager::new(allpages_request());
        let first = pager.next_params().expect("first page");
        assert!(!first.iter().any(|(key, _)| key == "apcontinue"));

        let items = pager.advance(
            json!({
                "query": {"allpages": [{"title": "A"}, {"title": "B"}]},
                "continue": {"apcontinue": "C", "continue": "-||"}
            }),
            ContinuationDialect::Modern,
        );
        assert_eq!(items.len(), 2);

        let second = pager.next_params().expect("second page");
        assert!(second.contains(&("apcontinue".to_string(), "C".to_string())));

        let items = pager.advance(
            json!({"query": {"allpages": [{"title": "C"}]}}),
            ContinuationDialect::Modern,
        );
        assert_eq!(items.len(), 1);
        assert!(pager.is_finished());
        assert_eq!(pager.next_params(), None);
    }

    #[test]
    fn missing_result_list_yields_empty_batch() {
        let mut pager = Pager::new(allpages_request());
        pager.next_params();
        let items = pager.advance(json!({"batchcomplete": ""}), ContinuationDialect::Modern);
        assert!(items.is_empty());
        assert!(pager.is_finished());
    }

    #[test]
    fn merge_replaces_existing_keys() {
        let mut params = vec![
            ("apfrom".to_string(), "A".to_string()),
            ("aplimit".to_string(), "10".to_string()),
        ];
        merge_params(&mut params, vec![("apfrom".to_string(), "M".to_string())]);
        assert_eq!(params[0], ("apfrom".to_string(), "M".to_string()));
        assert_eq!(params.len(), 2);
    }
}
