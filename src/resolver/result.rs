use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, read_to_string, try_exists, write};
use tracing::debug;
use url::Url;

use crate::maven::repository::Repository;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Where a dependency was found. This is the authoritative record for fetching it later.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub repository: Repository,
    #[serde(rename = "artifactURL")]
    pub artifact_url: Url,
    #[serde(rename = "checksumURL", default, skip_serializing_if = "Option::is_none")]
    pub checksum_url: Option<Url>,
    /// The repository only has a POM for this coordinate (e.g. a BOM or other aggregator
    ///  module); `artifact_url` points at that POM.
    #[serde(default, skip_serializing_if = "is_false")]
    pub aggregator: bool,
}

/// The resolution cache document: coordinate string -> resolution result. Ordered so that
///  identical contents serialize identically.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionCache {
    entries: BTreeMap<String, ResolutionResult>,
}

impl ResolutionCache {
    pub fn new() -> ResolutionCache {
        Default::default()
    }

    /// A missing file is an empty cache; a corrupt one is an error.
    pub async fn read(path: &Path) -> anyhow::Result<ResolutionCache> {
        if !try_exists(path).await? {
            debug!("no resolution cache at {}", path.display());
            return Ok(ResolutionCache::new());
        }

        let json = read_to_string(path).await
            .with_context(|| format!("reading resolution cache {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("parsing resolution cache {}", path.display()))
    }

    pub async fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        write(path, self.to_json()?).await
            .with_context(|| format!("writing resolution cache {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<ResolutionCache> {
        if json.trim().is_empty() {
            return Ok(ResolutionCache::new());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, coordinate: &str) -> Option<&ResolutionResult> {
        self.entries.get(coordinate)
    }

    pub fn insert(&mut self, coordinate: String, result: ResolutionResult) {
        self.entries.insert(coordinate, result);
    }

    /// Drops entries for coordinates that are no longer part of the project.
    pub fn retain_coordinates<'a>(&mut self, coordinates: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = coordinates.into_iter().collect();
        self.entries.retain(|k, _| keep.contains(k.as_str()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolutionResult)> {
        self.entries.iter()
    }
}
