//! Query-string descriptions.
//!
//! A request carries a declarative [`Query`] that the URL resolver turns into
//! the final query string: an ordered mapping with scalar/list values, an
//! explicit pair list, or a pre-built raw string.

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// A text value.
    Text(String),
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A boolean value, rendered as `true`/`false`.
    Bool(bool),
    /// A list value; each element is appended as a repeated parameter.
    List(Vec<QueryValue>),
    /// An absent value; the parameter is dropped entirely.
    Absent,
}

impl QueryValue {
    /// Renders a scalar value to its query-string form.
    ///
    /// Returns `None` for [`QueryValue::Absent`] and for lists, which the
    /// resolver expands element by element.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Bool(value) => Some(value.to_string()),
            Self::List(_) | Self::Absent => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// A declarative query description attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Ordered key/value mapping. Scalars are set (last write wins), lists
    /// are appended as repeated parameters, absent values are dropped.
    Map(Vec<(String, QueryValue)>),
    /// An explicit pair list with set semantics per key.
    Pairs(Vec<(String, String)>),
    /// A pre-built query string, used verbatim.
    Raw(String),
}

impl Query {
    /// Builds an ordered mapping query.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds an explicit pair-list query.
    pub fn pairs<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Pairs(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds a raw pre-serialized query string.
    pub fn raw(query: impl Into<String>) -> Self {
        Self::Raw(query.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_render_to_strings() {
        assert_eq!(QueryValue::from("x").render(), Some("x".to_string()));
        assert_eq!(QueryValue::from(42).render(), Some("42".to_string()));
        assert_eq!(QueryValue::from(true).render(), Some("true".to_string()));
    }

    #[test]
    fn absent_and_lists_do_not_render_directly() {
        assert_eq!(QueryValue::Absent.render(), None);
        assert_eq!(QueryValue::from(vec!["a", "b"]).render(), None);
    }

    #[test]
    fn option_none_becomes_absent() {
        let value: QueryValue = Option::<&str>::None.into();
        assert_eq!(value, QueryValue::Absent);
    }

    #[test]
    fn map_builder_preserves_order() {
        let query = Query::map([("a", QueryValue::from(1)), ("b", QueryValue::from("x"))]);
        match query {
            Query::Map(entries) => {
                assert_eq!(entries[0].0, "a");
                assert_eq!(entries[1].0, "b");
            }
            other => panic!("expected map query, got {other:?}"),
        }
    }
}
