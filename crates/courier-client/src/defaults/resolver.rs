//! Default URL resolver.

use courier_core::{Context, Error, Query, QueryValue, Request, Result, UrlResolver};
use std::sync::Arc;
use url::form_urlencoded;
use url::Url;

/// Custom query-serialization hook.
///
/// When configured, it fully overrides the default query step: it receives
/// the query description and the joined URL (without the query applied) and
/// returns the final URL string.
pub type QuerySerializerFn = dyn Fn(&Query, &str) -> String + Send + Sync;

/// Resolves request targets against an optional base URL and applies the
/// query description.
///
/// Query merge semantics: scalar values are set (last write wins, first
/// position kept), list values are appended as repeated parameters, absent
/// values are dropped. The result is deterministic and order-preserving
/// except for the de-duplication of repeated scalar keys.
#[derive(Clone)]
pub struct DefaultUrlResolver {
    base_url: Option<Url>,
    query_serializer: Option<Arc<QuerySerializerFn>>,
}

impl DefaultUrlResolver {
    /// Creates a resolver with an optional base URL.
    #[must_use]
    pub fn new(base_url: Option<Url>) -> Self {
        Self {
            base_url,
            query_serializer: None,
        }
    }

    /// Installs a custom query serializer.
    #[must_use]
    pub fn with_query_serializer(mut self, serializer: Arc<QuerySerializerFn>) -> Self {
        self.query_serializer = Some(serializer);
        self
    }
}

impl std::fmt::Debug for DefaultUrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultUrlResolver")
            .field("base_url", &self.base_url)
            .field("query_serializer", &self.query_serializer.is_some())
            .finish()
    }
}

impl UrlResolver for DefaultUrlResolver {
    fn resolve(&self, request: &Request, _ctx: &Context) -> Result<String> {
        let url = if let Ok(absolute) = Url::parse(request.url()) {
            absolute
        } else if let Some(base) = &self.base_url {
            base.join(request.url())
                .map_err(|err| Error::config_with_cause("cannot join URL onto base URL", err))?
        } else {
            return Err(Error::config(
                "relative URL is not allowed without a base URL",
            ));
        };

        match (request.query(), &self.query_serializer) {
            (Some(query), Some(serializer)) => Ok(serializer(query, url.as_str())),
            (Some(query), None) => Ok(apply_query(url, query)),
            (None, _) => Ok(url.into()),
        }
    }
}

/// Sets a scalar pair: last write wins, first position kept, later
/// duplicates dropped.
fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: String) {
    let mut first = true;
    let mut replaced = false;
    pairs.retain_mut(|(existing, slot)| {
        if existing == key {
            if first {
                *slot = value.clone();
                first = false;
                replaced = true;
                return true;
            }
            return false;
        }
        true
    });
    if !replaced {
        pairs.push((key.to_string(), value));
    }
}

fn apply_query(mut url: Url, query: &Query) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    match query {
        Query::Raw(raw) => {
            url.set_query(Some(raw.as_str()));
            return url.into();
        }
        Query::Pairs(entries) => {
            for (key, value) in entries {
                set_pair(&mut pairs, key, value.clone());
            }
        }
        Query::Map(entries) => {
            for (key, value) in entries {
                match value {
                    QueryValue::Absent => {}
                    QueryValue::List(items) => {
                        for item in items {
                            if let Some(rendered) = item.render() {
                                pairs.push((key.clone(), rendered));
                            }
                        }
                    }
                    scalar => {
                        if let Some(rendered) = scalar.render() {
                            set_pair(&mut pairs, key, rendered);
                        }
                    }
                }
            }
        }
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        url.set_query(Some(&serializer.finish()));
    }
    url.into()
}
