#![allow(non_snake_case)]

//! The subset of the maven-metadata.xml format (see
//!  https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html)
//!  needed to find the latest build of a snapshot version.

use anyhow::anyhow;
use serde::Deserialize;

use crate::maven::paths::{parse_snapshot_id, snapshot_base_version};

#[derive(Deserialize, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    groupId: Option<String>,
    #[serde(default)]
    artifactId: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    versioning: Option<Versioning>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Versioning {
    #[serde(default)]
    lastUpdated: Option<String>,
    #[serde(default)]
    snapshot: Option<Snapshot>,
    #[serde(default)]
    snapshotVersions: Option<SnapshotVersions>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Snapshot {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    buildNumber: Option<String>,
    #[serde(default)]
    localCopy: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SnapshotVersions {
    #[serde(default)]
    snapshotVersion: Vec<SnapshotVersion>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SnapshotVersion {
    #[serde(default)]
    classifier: Option<String>,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// The latest build of a snapshot version as announced by a repository
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SnapshotBuild {
    pub timestamp: String,
    pub build_number: Option<u32>,
}
impl SnapshotBuild {
    /// e.g. "20210101.120000-3"
    pub fn snapshot_id(&self) -> String {
        match self.build_number {
            None => self.timestamp.clone(),
            Some(n) => format!("{}-{}", self.timestamp, n),
        }
    }
}

/// Extracts the latest unclassified build with the given extension (without leading '.').
///  The per-file `snapshotVersions` listing wins over the `snapshot` element; local-copy metadata (no timestamp) is rejected.
pub fn parse_snapshot_build(xml: &str, snapshot_version: &str, extension: &str) -> anyhow::Result<SnapshotBuild> {
    let metadata: Metadata = serde_xml_rs::from_str(xml)?;

    if let Some(version) = &metadata.version {
        if version != snapshot_version {
            return Err(anyhow!("metadata for {:?}:{:?} describes version {}, expected {}",
                metadata.groupId, metadata.artifactId, version, snapshot_version));
        }
    }

    let versioning = metadata.versioning
        .ok_or_else(|| anyhow!("snapshot metadata without <versioning>"))?;

    let base_prefix = format!("{}-", snapshot_base_version(snapshot_version));
    let listed = versioning.snapshotVersions
        .iter()
        .flat_map(|v| v.snapshotVersion.iter())
        .filter(|v| v.classifier.as_deref().map(|c| c.is_empty()).unwrap_or(true))
        .filter(|v| v.extension.as_deref() == Some(extension))
        .filter_map(|v| v.value.as_deref())
        .filter_map(|value| value.strip_prefix(base_prefix.as_str()))
        .filter_map(parse_snapshot_id)
        .max();

    if let Some((timestamp, build_number)) = listed {
        return Ok(SnapshotBuild { timestamp, build_number });
    }

    let snapshot = versioning.snapshot
        .ok_or_else(|| anyhow!("snapshot metadata (last updated {:?}) lists no builds", versioning.lastUpdated))?;
    if snapshot.localCopy.as_deref() == Some("true") {
        return Err(anyhow!("snapshot metadata describes a local copy"));
    }

    let timestamp = snapshot.timestamp
        .ok_or_else(|| anyhow!("snapshot metadata without timestamp"))?;
    let snapshot_id = match snapshot.buildNumber {
        None => timestamp,
        Some(n) => format!("{}-{}", timestamp, n.trim()),
    };
    let (timestamp, build_number) = parse_snapshot_id(&snapshot_id)
        .ok_or_else(|| anyhow!("not a valid snapshot build identifier: {}", snapshot_id))?;
    Ok(SnapshotBuild { timestamp, build_number })
}
