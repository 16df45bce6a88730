use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};
use url::Url;

use crate::maven::coordinates::Dependency;
use crate::maven::metadata_xml::{parse_snapshot_build, SnapshotBuild};
use crate::maven::paths::{artifact_directory, as_maven_path, snapshot_version, MavenClassifier, MavenVersion};
use crate::maven::repository::Repository;
use crate::util::http_prober::MetadataFetcher;

const MAVEN_METADATA_FILE: &str = "maven-metadata.xml";

/// Maps a dependency to the URL where a repository would hold one of its files. `None` means
///  the strategy does not apply (or could not build a valid URL), never an error.
#[async_trait]
pub trait PathResolutionStrategy: Send + Sync {
    async fn path_to(&self, repository: &Repository, dependency: &Dependency) -> Option<Url>;
}

/// The plain `{artifact}-{version}.{ext}` layout. Also serves snapshot versions that were
///  deployed without unique build numbers.
pub struct MavenPathStrategy {
    file_extension: String,
}
impl MavenPathStrategy {
    pub fn release() -> MavenPathStrategy {
        MavenPathStrategy { file_extension: ".jar".to_string() }
    }

    pub fn pom() -> MavenPathStrategy {
        MavenPathStrategy { file_extension: ".pom".to_string() }
    }
}

#[async_trait]
impl PathResolutionStrategy for MavenPathStrategy {
    async fn path_to(&self, repository: &Repository, dependency: &Dependency) -> Option<Url> {
        let path = as_maven_path(
            dependency,
            &MavenVersion::Release(dependency.version().to_string()),
            &MavenClassifier::Unclassified,
            &self.file_extension,
        );
        repository.join(&path)
    }
}

/// Unique snapshot builds: `{artifact}-{base version}-{timestamp}-{build}.jar`. The build is
///  taken from the dependency's snapshot id if it has one, otherwise from the repository's
///  maven-metadata.xml. Lookup outcomes are remembered per metadata URL, except for failures
///  to fetch the document at all.
pub struct MavenSnapshotPathStrategy {
    fetcher: Arc<dyn MetadataFetcher>,
    file_extension: String,
    lookups: DashMap<Url, Option<SnapshotBuild>>,
}
impl MavenSnapshotPathStrategy {
    pub fn new(fetcher: Arc<dyn MetadataFetcher>) -> MavenSnapshotPathStrategy {
        MavenSnapshotPathStrategy {
            fetcher,
            file_extension: ".jar".to_string(),
            lookups: DashMap::new(),
        }
    }

    async fn latest_build(&self, repository: &Repository, dependency: &Dependency) -> Option<SnapshotBuild> {
        let metadata_url = repository.join(&format!("{}{}", artifact_directory(dependency), MAVEN_METADATA_FILE))?;
        if let Some(known) = self.lookups.get(&metadata_url) {
            return known.clone();
        }

        let build = match self.fetcher.fetch_text(&metadata_url).await {
            Ok(Some(xml)) => {
                let extension = self.file_extension.trim_start_matches('.');
                match parse_snapshot_build(&xml, dependency.version(), extension) {
                    Ok(build) => Some(build),
                    Err(e) => {
                        debug!("unusable snapshot metadata at {}: {}", metadata_url, e);
                        None
                    }
                }
            }
            Ok(None) => {
                trace!("no snapshot metadata at {}", metadata_url);
                None
            }
            Err(e) => {
                // not remembered, the next lookup tries again
                debug!("failed to look up snapshot metadata at {}: {}", metadata_url, e);
                return None;
            }
        };
        self.lookups.insert(metadata_url, build.clone());
        build
    }
}

#[async_trait]
impl PathResolutionStrategy for MavenSnapshotPathStrategy {
    async fn path_to(&self, repository: &Repository, dependency: &Dependency) -> Option<Url> {
        if !dependency.is_snapshot() {
            return None;
        }

        let snapshot_id = match dependency.snapshot_id() {
            Some(id) => id.to_string(),
            None => self.latest_build(repository, dependency).await?.snapshot_id(),
        };
        let version = match snapshot_version(dependency, &snapshot_id) {
            Some(version) => version,
            None => {
                debug!("{} has an invalid snapshot id {:?}", dependency, snapshot_id);
                return None;
            }
        };

        repository.join(&as_maven_path(dependency, &version, &MavenClassifier::Unclassified, &self.file_extension))
    }
}

/// "SHA-1" -> "sha1"
pub fn checksum_extension(algorithm: &str) -> String {
    algorithm.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Appends a checksum file suffix (e.g. ".sha1") to whatever the wrapped strategy resolves to.
pub struct ChecksumPathStrategy {
    extension: String,
    inner: Arc<dyn PathResolutionStrategy>,
}
impl ChecksumPathStrategy {
    pub fn new(algorithm: &str, inner: Arc<dyn PathResolutionStrategy>) -> ChecksumPathStrategy {
        ChecksumPathStrategy {
            extension: checksum_extension(algorithm),
            inner,
        }
    }
}

#[async_trait]
impl PathResolutionStrategy for ChecksumPathStrategy {
    async fn path_to(&self, repository: &Repository, dependency: &Dependency) -> Option<Url> {
        let mut url = self.inner.path_to(repository, dependency).await?;
        let path = format!("{}.{}", url.path(), self.extension);
        url.set_path(&path);
        Some(url)
    }
}

/// Tries strategies in order and returns the first URL any of them yields.
pub struct MediatingPathStrategy {
    strategies: Vec<Arc<dyn PathResolutionStrategy>>,
}
impl MediatingPathStrategy {
    pub fn new(strategies: Vec<Arc<dyn PathResolutionStrategy>>) -> MediatingPathStrategy {
        MediatingPathStrategy { strategies }
    }

    /// unique snapshot builds first, falling through to the plain layout
    pub fn snapshot_then_release(fetcher: Arc<dyn MetadataFetcher>) -> MediatingPathStrategy {
        MediatingPathStrategy::new(vec![
            Arc::new(MavenSnapshotPathStrategy::new(fetcher)),
            Arc::new(MavenPathStrategy::release()),
        ])
    }
}

#[async_trait]
impl PathResolutionStrategy for MediatingPathStrategy {
    async fn path_to(&self, repository: &Repository, dependency: &Dependency) -> Option<Url> {
        for strategy in &self.strategies {
            if let Some(url) = strategy.path_to(repository, dependency).await {
                return Some(url);
            }
        }
        None
    }
}
