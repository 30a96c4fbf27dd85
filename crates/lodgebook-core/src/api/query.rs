//! Row query builder for the PostgREST table API.
//!
//! Filters are expressed as query-string parameters
//! (`event_id=in.("a","b")`, `event_date=gte.2026-01-01`, `order=event_date.desc`).

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Column projection. Whitespace is stripped so multi-line join
    /// selections can be written readably.
    pub fn select(mut self, columns: &str) -> Self {
        let columns: String = columns.split_whitespace().collect();
        self.params.push(("select".to_string(), columns));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.params.push((column.to_string(), "is.null".to_string()));
        self
    }

    /// Membership filter. Values are double-quoted so ids containing
    /// reserved characters survive.
    pub fn in_list<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        let quoted: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
        self.params
            .push((column.to_string(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.retain(|(k, _)| k != "limit");
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("{}.{}", op, value)));
        self
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
