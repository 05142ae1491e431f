#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::Duration;

/// Request headers as a plain string map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single `Authorization: Bearer …` header.
    pub fn bearer(token: &str) -> Self {
        let mut headers = Self::new();
        headers.insert("Authorization", format!("Bearer {token}"));
        headers
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self { inner: map }
    }
}

/// Transport options.
#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Timeout applied to metadata-sized requests.
    pub request_timeout: Duration,
    /// Deadline for a whole artifact download.
    pub download_timeout: Duration,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
        }
    }
}
