use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Unique identifier of a site. Numeric ids stay numeric in every JSON
/// document and in the persisted `list_sites` array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteId {
    Int(i64),
    Text(String),
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteId::Int(id) => write!(f, "{id}"),
            SiteId::Text(id) => f.write_str(id),
        }
    }
}

impl FromStr for SiteId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Only canonical integers become `Int`; "007" and "+7" stay text.
        Ok(match trimmed.parse::<i64>() {
            Ok(id) if id.to_string() == trimmed => SiteId::Int(id),
            _ => SiteId::Text(trimmed.to_string()),
        })
    }
}

impl From<i64> for SiteId {
    fn from(value: i64) -> Self {
        SiteId::Int(value)
    }
}

impl From<i32> for SiteId {
    fn from(value: i32) -> Self {
        SiteId::Int(i64::from(value))
    }
}

impl From<String> for SiteId {
    fn from(value: String) -> Self {
        SiteId::Text(value)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        SiteId::Text(value.to_string())
    }
}

/// A schedulable web property. Only `site_id` is meaningful to the
/// distributor; the remaining fields are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_id: SiteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Site {
    pub fn new(site_id: impl Into<SiteId>) -> Self {
        Self {
            site_id: site_id.into(),
            site_url: None,
            site_name: None,
            status: None,
            created_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = Some(name.into());
        self
    }
}
