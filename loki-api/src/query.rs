use serde::Serialize;

use crate::{LokiTimestamp, PrometheusDuration};

/// Wraps a bare selector like `job="x"` in curly braces.
///
/// Anything already containing a brace is sent unchanged, so metric queries like
/// `rate({job="x"}[5m])` and selectors followed by a line filter pass through.
pub fn normalize_selector(query: &str) -> String {
    if query.contains('{') || query.contains('}') {
        query.to_string()
    } else {
        format!("{{{}}}", query)
    }
}

/// Like [normalize_selector], but keeps a trailing ` |= ` line filter outside of the braces,
/// as the delete endpoint expects: `app="loki" |= "compacting"` becomes
/// `{app="loki"} |= "compacting"`.
pub fn normalize_selector_with_log_line_filter(query: &str) -> String {
    if query.starts_with('{') {
        return query.to_string();
    }
    // TODO: also split filters written without surrounding spaces, like `app="loki"|="x"`
    match query.split_once(" |= ") {
        Some((selector, filter)) => format!("{{{}}} |= {}", selector, filter),
        None => format!("{{{}}}", query),
    }
}

/// Query string parameters of one request. Absent values are never added.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        QueryParams(Vec::new())
    }

    /// The parameters most endpoints share. `query` is normalized with [normalize_selector],
    /// timestamps are sent as epoch nanoseconds.
    pub fn with_time_range(
        query: Option<&str>,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
    ) -> Self {
        let mut params = QueryParams::new();
        params.push_opt("query", query.map(normalize_selector));
        params.push_opt("start", start.map(|start| start.to_epoch_nanos_string()));
        params.push_opt("end", end.map(|end| end.to_epoch_nanos_string()));
        params.push_opt("since", since);
        params
    }

    pub fn push(&mut self, name: &str, value: impl ToString) {
        self.0.push((name.to_string(), value.to_string()));
    }

    pub fn push_opt(&mut self, name: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}
