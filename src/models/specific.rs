use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::store::{Document, StoreError};

/// A host/URL/page routing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub datasource: DataSource,
}

/// Three independent lookup tables from a page name, URL path or hostname
/// to the configuration IDs that apply to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default)]
    pub pages: BTreeMap<String, IdSet>,
    #[serde(default)]
    pub urls: BTreeMap<String, IdSet>,
    #[serde(default)]
    pub hosts: BTreeMap<String, IdSet>,
}

impl DataSource {
    /// True when none of the three mappings has an entry.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.urls.is_empty() && self.hosts.is_empty()
    }
}

/// A set of configuration IDs.
///
/// Accepts either a single string or a list of strings when deserializing
/// and always serializes as a sorted list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdSet(BTreeSet<String>);

impl IdSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

}

impl<S: Into<String>> FromIterator<S> for IdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'de> Deserialize<'de> for IdSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(IdSetVisitor)
    }
}

/// Scalars become a one-element set, null an empty one.
struct IdSetVisitor;

impl IdSetVisitor {
    fn one<E>(id: impl ToString) -> Result<IdSet, E> {
        Ok(std::iter::once(id.to_string()).collect())
    }
}

impl<'de> Visitor<'de> for IdSetVisitor {
    type Value = IdSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a configuration ID or a list of configuration IDs")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<IdSet, E> {
        Self::one(v)
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<IdSet, E> {
        Ok(std::iter::once(v).collect())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<IdSet, E> {
        Self::one(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<IdSet, E> {
        Self::one(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<IdSet, E> {
        Self::one(v)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<IdSet, E> {
        Self::one(v)
    }

    fn visit_unit<E: de::Error>(self) -> Result<IdSet, E> {
        Ok(IdSet::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<IdSet, E> {
        Ok(IdSet::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<IdSet, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<IdSet, A::Error> {
        let mut ids = BTreeSet::new();
        while let Some(id) = seq.next_element::<Scalar>()? {
            ids.insert(id.0);
        }
        Ok(IdSet(ids))
    }
}

/// A list element, read as a string whatever its scalar type.
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl Visitor<'_> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a configuration ID")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
                Ok(Scalar(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

impl SpecificConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            datasource: DataSource::default(),
        }
    }

    pub fn with_host<I, S>(mut self, host: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasource
            .hosts
            .insert(host.into(), ids.into_iter().collect());
        self
    }

    pub fn with_url<I, S>(mut self, url: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasource
            .urls
            .insert(url.into(), ids.into_iter().collect());
        self
    }

    pub fn with_page<I, S>(mut self, page: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasource
            .pages
            .insert(page.into(), ids.into_iter().collect());
        self
    }
}

impl Document for SpecificConfig {
    const KIND: &'static str = "specific config";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.id.is_empty() {
            return Err(StoreError::Invalid(
                "Configuration ID is required".to_string(),
            ));
        }
        if self.datasource.is_empty() {
            return Err(StoreError::Invalid(
                "At least one datasource mapping is required".to_string(),
            ));
        }
        Ok(())
    }
}
