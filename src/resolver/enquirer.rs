use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::maven::coordinates::Dependency;
use crate::maven::repository::Repository;
use crate::resolver::result::ResolutionResult;
use crate::resolver::strategy::{ChecksumPathStrategy, MavenPathStrategy, MediatingPathStrategy, PathResolutionStrategy};
use crate::util::http_prober::{MetadataFetcher, UrlProber};

/// Answers "where does this repository hold the dependency?" for one fixed repository.
#[async_trait]
pub trait RepositoryEnquirer: Send + Sync {
    fn repository(&self) -> &Repository;

    /// `Ok(None)` if the repository does not have the dependency. `Err` only for failures that
    ///  are not about this dependency, e.g. a URL the prober cannot request at all.
    async fn enquire(&self, dependency: &Dependency) -> anyhow::Result<Option<ResolutionResult>>;
}

/// Resolves candidate URLs with path strategies and confirms them with existence probes.
pub struct PingingRepositoryEnquirer {
    repository: Repository,
    artifact_strategy: Arc<dyn PathResolutionStrategy>,
    checksum_strategy: Arc<dyn PathResolutionStrategy>,
    pom_strategy: Option<Arc<dyn PathResolutionStrategy>>,
    prober: Arc<dyn UrlProber>,
}

impl PingingRepositoryEnquirer {
    pub fn new(
        repository: Repository,
        artifact_strategy: Arc<dyn PathResolutionStrategy>,
        checksum_strategy: Arc<dyn PathResolutionStrategy>,
        pom_strategy: Option<Arc<dyn PathResolutionStrategy>>,
        prober: Arc<dyn UrlProber>,
    ) -> PingingRepositoryEnquirer {
        PingingRepositoryEnquirer {
            repository,
            artifact_strategy,
            checksum_strategy,
            pom_strategy,
            prober,
        }
    }

    /// Falls back to the POM to recognize aggregator modules that have no jar.
    async fn enquire_pom(&self, dependency: &Dependency) -> anyhow::Result<Option<ResolutionResult>> {
        let pom_strategy = match &self.pom_strategy {
            Some(s) => s,
            None => return Ok(None),
        };
        let pom_url = match pom_strategy.path_to(&self.repository, dependency).await {
            Some(url) => url,
            None => return Ok(None),
        };

        if !self.prober.exists(&pom_url).await? {
            return Ok(None);
        }

        debug!("{} has only a POM at {}", dependency, self.repository);
        Ok(Some(ResolutionResult {
            repository: self.repository.clone(),
            artifact_url: pom_url,
            checksum_url: None,
            aggregator: true,
        }))
    }
}

#[async_trait]
impl RepositoryEnquirer for PingingRepositoryEnquirer {
    fn repository(&self) -> &Repository {
        &self.repository
    }

    async fn enquire(&self, dependency: &Dependency) -> anyhow::Result<Option<ResolutionResult>> {
        debug!("enquiring {} for {}", self.repository, dependency);

        let artifact_url = match self.artifact_strategy.path_to(&self.repository, dependency).await {
            Some(url) => url,
            None => {
                debug!("no candidate path for {} in {}", dependency, self.repository);
                return Ok(None);
            }
        };

        if !self.prober.exists(&artifact_url).await? {
            return self.enquire_pom(dependency).await;
        }

        let checksum_url = match self.checksum_strategy.path_to(&self.repository, dependency).await {
            Some(url) => {
                if self.prober.exists(&url).await? { Some(url) } else { None }
            }
            None => None,
        };
        if checksum_url.is_none() {
            debug!("no checksum for {} in {}", dependency, self.repository);
        }

        Ok(Some(ResolutionResult {
            repository: self.repository.clone(),
            artifact_url,
            checksum_url,
            aggregator: false,
        }))
    }
}

/// Creates enquirers for individual repositories, all sharing one set of strategies and one
///  prober (and thus one connection pool).
pub trait EnquirerFactory: Send + Sync {
    fn create(&self, repository: Repository) -> Arc<dyn RepositoryEnquirer>;
}

pub struct PingingEnquirerFactory {
    artifact_strategy: Arc<dyn PathResolutionStrategy>,
    checksum_strategy: Arc<dyn PathResolutionStrategy>,
    pom_strategy: Option<Arc<dyn PathResolutionStrategy>>,
    prober: Arc<dyn UrlProber>,
}

impl PingingEnquirerFactory {
    pub fn new(
        artifact_strategy: Arc<dyn PathResolutionStrategy>,
        checksum_strategy: Arc<dyn PathResolutionStrategy>,
        pom_strategy: Option<Arc<dyn PathResolutionStrategy>>,
        prober: Arc<dyn UrlProber>,
    ) -> PingingEnquirerFactory {
        PingingEnquirerFactory {
            artifact_strategy,
            checksum_strategy,
            pom_strategy,
            prober,
        }
    }

    /// The standard Maven setup: snapshot-then-release artifacts, checksums next to them and
    ///  optionally POM-only resolution.
    pub fn maven(
        prober: Arc<dyn UrlProber>,
        fetcher: Arc<dyn MetadataFetcher>,
        checksum_algorithm: &str,
        resolve_pom_only: bool,
    ) -> PingingEnquirerFactory {
        let artifact_strategy: Arc<dyn PathResolutionStrategy> = Arc::new(MediatingPathStrategy::snapshot_then_release(fetcher));
        let checksum_strategy = Arc::new(ChecksumPathStrategy::new(checksum_algorithm, artifact_strategy.clone()));
        let pom_strategy: Option<Arc<dyn PathResolutionStrategy>> = if resolve_pom_only {
            Some(Arc::new(MavenPathStrategy::pom()))
        }
        else {
            None
        };

        PingingEnquirerFactory::new(artifact_strategy, checksum_strategy, pom_strategy, prober)
    }
}

impl EnquirerFactory for PingingEnquirerFactory {
    fn create(&self, repository: Repository) -> Arc<dyn RepositoryEnquirer> {
        Arc::new(PingingRepositoryEnquirer::new(
            repository,
            self.artifact_strategy.clone(),
            self.checksum_strategy.clone(),
            self.pom_strategy.clone(),
            self.prober.clone(),
        ))
    }
}
