// src/storage/location.rs

//! Source locations with keys templated on the run's logical timestamp.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

/// Default JSON mapping when a location names none.
pub const AUTO_JSON_PATH: &str = "auto";
pub const DEFAULT_REGION: &str = "us-west-2";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]*)\}").expect("placeholder regex is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}} in key pattern '{1}'")]
    UnknownPlaceholder(String, String),
}

/// Bucket plus key pattern.
///
/// The key pattern may reference the logical timestamp:
/// `{ds}` (`2018-11-01`), `{ds_nodash}` (`20181101`), `{ts}` and
/// `{execution_date}` (`2018-11-01T13:00:00+00:00`), `{year}`, `{month}`,
/// `{day}`, `{hour}` (zero padded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key_pattern: String,
    pub json_path: Option<String>,
    pub region: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, key_pattern: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_pattern: key_pattern.into(),
            json_path: None,
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_json_path(mut self, json_path: impl Into<String>) -> Self {
        self.json_path = Some(json_path.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn json_path(&self) -> &str {
        self.json_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(AUTO_JSON_PATH)
    }

    /// Render the key pattern for a logical timestamp.
    pub fn render_key(&self, logical_ts: DateTime<Utc>) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(self.key_pattern.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.key_pattern) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = placeholder_value(name.as_str(), logical_ts).ok_or_else(|| {
                TemplateError::UnknownPlaceholder(
                    name.as_str().to_string(),
                    self.key_pattern.clone(),
                )
            })?;
            rendered.push_str(&self.key_pattern[last..whole.start()]);
            rendered.push_str(&value);
            last = whole.end();
        }
        rendered.push_str(&self.key_pattern[last..]);

        Ok(rendered)
    }

    /// Full `s3://bucket/key` source for a logical timestamp.
    pub fn source_path(&self, logical_ts: DateTime<Utc>) -> Result<String, TemplateError> {
        let bucket = self
            .bucket
            .trim()
            .trim_start_matches("s3://")
            .trim_end_matches('/');
        let key = self.render_key(logical_ts)?;
        let key = key.trim_start_matches('/');

        if key.is_empty() {
            Ok(format!("s3://{bucket}"))
        } else {
            Ok(format!("s3://{bucket}/{key}"))
        }
    }
}

fn placeholder_value(name: &str, ts: DateTime<Utc>) -> Option<String> {
    let fmt = match name {
        "ds" => "%Y-%m-%d",
        "ds_nodash" => "%Y%m%d",
        "ts" | "execution_date" => "%Y-%m-%dT%H:%M:%S+00:00",
        "year" => "%Y",
        "month" => "%m",
        "day" => "%d",
        "hour" => "%H",
        _ => return None,
    };
    Some(ts.format(fmt).to_string())
}
