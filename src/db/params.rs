use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::AppError;

/// A value bound to a named placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    TextArray(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(v: NaiveDate) -> Self {
        ParamValue::Date(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::TextArray(v)
    }
}

/// Named parameters. Ordered so equal mappings hash identically.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// SQL text plus its bound parameters; also the result cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Option<QueryParams>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        QueryRequest {
            sql: sql.into(),
            params: None,
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params
            .get_or_insert_with(QueryParams::new)
            .insert(name.into(), value.into());
        self
    }

    /// Rewrite `:name` placeholders to `$n` and return the values in bind order.
    pub fn compile(&self) -> Result<(String, Vec<&ParamValue>), AppError> {
        match &self.params {
            None => Ok((self.sql.clone(), Vec::new())),
            Some(params) => compile(&self.sql, params),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Named-to-positional rewrite.
///
/// Placeholders inside string literals, quoted identifiers and comments are
/// left alone, as are `::` casts. A repeated name reuses its position.
pub fn compile<'p>(
    sql: &str,
    params: &'p QueryParams,
) -> Result<(String, Vec<&'p ParamValue>), AppError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<&str> = Vec::new();
    let mut values: Vec<&'p ParamValue> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                    if chars[i - 1] == quote {
                        break;
                    }
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                out.push_str("/*");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        out.push_str("*/");
                        i += 2;
                        break;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).copied().is_some_and(is_ident_start) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let (key, value) = params.get_key_value(&name).ok_or_else(|| {
                    AppError::query(format!("missing value for parameter :{}", name))
                })?;

                let position = match order.iter().position(|n| *n == key.as_str()) {
                    Some(p) => p + 1,
                    None => {
                        order.push(key.as_str());
                        values.push(value);
                        order.len()
                    }
                };
                out.push('$');
                out.push_str(&position.to_string());
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_placeholders_in_order() {
        let request = QueryRequest::new(
            "SELECT * FROM v WHERE date BETWEEN :dstart AND :dend AND campaign_name = ANY(:camps)",
        )
        .bind("camps", vec!["CampA".to_string()])
        .bind("dstart", "2024-01-01")
        .bind("dend", "2024-01-31");

        let (sql, values) = request.compile().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM v WHERE date BETWEEN $1 AND $2 AND campaign_name = ANY($3)"
        );
        assert_eq!(values[0], &ParamValue::Text("2024-01-01".into()));
        assert_eq!(values[2], &ParamValue::TextArray(vec!["CampA".into()]));
    }

    #[test]
    fn repeated_names_share_a_position() {
        let request = QueryRequest::new("SELECT :a, :b, :a").bind("a", 1i64).bind("b", 2i64);
        let (sql, values) = request.compile().unwrap();
        assert_eq!(sql, "SELECT $1, $2, $1");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn casts_literals_and_comments_are_untouched() {
        let request = QueryRequest::new(
            "SELECT ':skip', \"col:x\", now()::date -- :also\n/* :block */ FROM t WHERE id = :id",
        )
        .bind("id", 7i64);
        let (sql, values) = request.compile().unwrap();
        assert_eq!(
            sql,
            "SELECT ':skip', \"col:x\", now()::date -- :also\n/* :block */ FROM t WHERE id = $1"
        );
        assert_eq!(values, vec![&ParamValue::Int(7)]);
    }

    #[test]
    fn doubled_quotes_inside_literals() {
        let request = QueryRequest::new("SELECT 'it''s :x' WHERE a = :x").bind("x", true);
        let (sql, _) = request.compile().unwrap();
        assert_eq!(sql, "SELECT 'it''s :x' WHERE a = $1");
    }

    #[test]
    fn missing_parameter_is_a_query_error() {
        let request = QueryRequest::new("SELECT * FROM t LIMIT :lim").bind("other", 1i64);
        let err = request.compile().unwrap_err();
        assert!(matches!(err, AppError::Query { .. }));
        assert!(err.to_string().contains(":lim"));
    }

    #[test]
    fn no_parameters_means_verbatim_sql() {
        let request = QueryRequest::new("SELECT ':x' AS a, 1 AS :not_a_param");
        let (sql, values) = request.compile().unwrap();
        assert_eq!(sql, request.sql);
        assert!(values.is_empty());
    }

    #[test]
    fn parameter_order_does_not_change_identity() {
        let a = QueryRequest::new("q").bind("x", 1i64).bind("y", 2i64);
        let b = QueryRequest::new("q").bind("y", 2i64).bind("x", 1i64);
        assert_eq!(a, b);
    }
}
