//! Priority-ranked lookup of specific configurations.
//!
//! Every configuration ID found under the queried host, URL or page scores
//! 3, 2 or 1 point respectively. Scores add up across documents and
//! criteria. IDs are returned by score descending, then ID ascending.

use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{IdSet, SpecificConfig};
use crate::store::{Backend, DocumentStore, StoreError};

pub const HOST_WEIGHT: u32 = 3;
pub const URL_WEIGHT: u32 = 2;
pub const PAGE_WEIGHT: u32 = 1;

/// Up to three exact-match criteria. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MatchQuery {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

impl MatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// True when no criterion has a non-empty value.
    pub fn is_empty(&self) -> bool {
        criterion(&self.host).is_none()
            && criterion(&self.url).is_none()
            && criterion(&self.page).is_none()
    }
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Ranks the configuration IDs that `query` selects from `docs`.
///
/// Fails with [`StoreError::NoMatch`] when no criterion is a key in any
/// document's mapping. A key mapped to an empty ID set still counts as a
/// match. Rejecting an empty query is left to the caller.
pub fn rank<'a, I>(docs: I, query: &MatchQuery) -> Result<Vec<String>, StoreError>
where
    I: IntoIterator<Item = &'a SpecificConfig>,
{
    let host = criterion(&query.host);
    let url = criterion(&query.url);
    let page = criterion(&query.page);

    let mut scores: HashMap<&'a str, u32> = HashMap::new();
    let mut found = false;

    let mut score = |ids: Option<&'a IdSet>, weight: u32| {
        if let Some(ids) = ids {
            found = true;
            for id in ids.iter() {
                *scores.entry(id).or_default() += weight;
            }
        }
    };

    for doc in docs {
        let source = &doc.datasource;
        if let Some(host) = host {
            score(source.hosts.get(host), HOST_WEIGHT);
        }
        if let Some(url) = url {
            score(source.urls.get(url), URL_WEIGHT);
        }
        if let Some(page) = page {
            score(source.pages.get(page), PAGE_WEIGHT);
        }
    }

    if !found {
        return Err(StoreError::NoMatch);
    }

    let mut ranked: Vec<(&str, u32)> = scores.into_iter().collect();
    ranked.sort_by(|(a_id, a_score), (b_id, b_score)| {
        b_score.cmp(a_score).then_with(|| a_id.cmp(b_id))
    });

    Ok(ranked.into_iter().map(|(id, _)| id.to_string()).collect())
}

impl<B: Backend> DocumentStore<SpecificConfig, B> {
    /// Ranks matching configuration IDs against the current snapshot.
    pub fn matching(&self, query: &MatchQuery) -> Result<Vec<String>, StoreError> {
        self.scan(|docs| rank(docs, query))
    }
}
