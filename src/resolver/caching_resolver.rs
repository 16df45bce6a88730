use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ResolverSettings;
use crate::maven::coordinates::{Dependency, DependencyId};
use crate::maven::repository::Repository;
use crate::resolver::enquirer::{EnquirerFactory, RepositoryEnquirer};
use crate::resolver::mirrors::MirrorSelector;
use crate::resolver::result::ResolutionResult;
use crate::util::http_prober::UrlProber;

type Outcome = Option<ResolutionResult>;

/// Resolves dependencies against an ordered list of repositories, first match wins.
///
/// Outcomes (including "not found") are remembered per [DependencyId] for the lifetime of the
///  resolver. Concurrent callers for the same coordinate share a single resolution: the first
///  one enquires, the others wait for its outcome. Errors are not remembered.
pub struct CachingDependencyResolver {
    prober: Arc<dyn UrlProber>,
    enquirers: Vec<Arc<dyn RepositoryEnquirer>>,
    /// if present, these are the only repositories ever consulted
    global_enquirers: Option<Vec<Arc<dyn RepositoryEnquirer>>>,
    revalidate_pre_resolved: bool,
    outcomes: DashMap<DependencyId, Arc<OnceCell<Outcome>>>,
}

impl CachingDependencyResolver {
    pub fn new(
        prober: Arc<dyn UrlProber>,
        enquirers: Vec<Arc<dyn RepositoryEnquirer>>,
        global_enquirers: Option<Vec<Arc<dyn RepositoryEnquirer>>>,
        revalidate_pre_resolved: bool,
    ) -> CachingDependencyResolver {
        CachingDependencyResolver {
            prober,
            enquirers,
            global_enquirers,
            revalidate_pre_resolved,
            outcomes: DashMap::new(),
        }
    }

    /// Mirrors are applied to the project repositories only. Global repositories are an
    ///  explicit choice and are used exactly as configured.
    pub fn from_settings(
        settings: &ResolverSettings,
        factory: &dyn EnquirerFactory,
        mirror_selector: &dyn MirrorSelector,
        prober: Arc<dyn UrlProber>,
    ) -> CachingDependencyResolver {
        let enquirers = mirror_selector.select(&settings.repositories, &settings.mirrors)
            .into_iter()
            .map(|r| factory.create(r))
            .collect();
        let global_enquirers = settings.global_repositories.as_ref()
            .map(|repositories| repositories.iter()
                .map(|r| factory.create(r.clone()))
                .collect());

        CachingDependencyResolver::new(prober, enquirers, global_enquirers, settings.revalidate_pre_resolved)
    }

    /// The repositories [Self::resolve] consults, in order.
    pub fn effective_repositories(&self) -> Vec<Repository> {
        self.effective_enquirers()
            .iter()
            .map(|e| e.repository().clone())
            .collect()
    }

    fn effective_enquirers(&self) -> &[Arc<dyn RepositoryEnquirer>] {
        match &self.global_enquirers {
            Some(global) => global,
            None => &self.enquirers,
        }
    }

    pub async fn resolve(&self, dependency: &Dependency) -> anyhow::Result<Outcome> {
        self.resolve_with(dependency, self.effective_enquirers()).await
    }

    /// Resolves against an explicit enquirer list. The memo is shared with [Self::resolve], so a
    ///  coordinate that was already resolved is not enquired again, whatever the list.
    pub async fn resolve_with(&self, dependency: &Dependency, enquirers: &[Arc<dyn RepositoryEnquirer>]) -> anyhow::Result<Outcome> {
        // the map guard must be released before waiting on the cell
        let cell = Arc::clone(&self.outcomes.entry(dependency.id().clone()).or_default());

        let outcome = cell.get_or_try_init(|| Self::attempt_resolve(dependency, enquirers)).await?;
        Ok(outcome.clone())
    }

    async fn attempt_resolve(dependency: &Dependency, enquirers: &[Arc<dyn RepositoryEnquirer>]) -> anyhow::Result<Outcome> {
        for enquirer in enquirers {
            if let Some(result) = enquirer.enquire(dependency).await? {
                info!("resolved {} @ {}", dependency, result.artifact_url);
                return Ok(Some(result));
            }
        }

        debug!("{} not found in any of {} repositories", dependency, enquirers.len());
        Ok(None)
    }

    /// Whether a result recorded by an earlier run can be used as-is: its repository must be one
    ///  that is currently consulted, and - if configured - its URLs must still exist.
    pub async fn is_reusable(&self, recorded: &ResolutionResult) -> anyhow::Result<bool> {
        if !self.effective_enquirers().iter().any(|e| e.repository() == &recorded.repository) {
            return Ok(false);
        }
        if !self.revalidate_pre_resolved {
            return Ok(true);
        }

        if !self.prober.exists(&recorded.artifact_url).await? {
            debug!("recorded artifact {} is gone", recorded.artifact_url);
            return Ok(false);
        }
        match &recorded.checksum_url {
            Some(checksum_url) => Ok(self.prober.exists(checksum_url).await?),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::maven::repository::Mirror;
    use crate::resolver::enquirer::PingingEnquirerFactory;
    use crate::resolver::mirrors::SimpleMirrorSelector;
    use crate::util::transient_remote::TransientRemote;

    const A_JAR: &str = "https://repo-a/org/example/lib/1.0.0/lib-1.0.0.jar";
    const B_JAR: &str = "https://repo-b/org/example/lib/1.0.0/lib-1.0.0.jar";
    const B_SHA1: &str = "https://repo-b/org/example/lib/1.0.0/lib-1.0.0.jar.sha1";
    const M_JAR: &str = "https://mirror/org/example/lib/1.0.0/lib-1.0.0.jar";

    fn settings(repositories: &[&str]) -> ResolverSettings {
        ResolverSettings {
            repositories: repositories.iter().map(|r| Repository::parse(r).unwrap()).collect(),
            ..Default::default()
        }
    }

    fn resolver(remote: &Arc<TransientRemote>, settings: &ResolverSettings) -> CachingDependencyResolver {
        let factory = PingingEnquirerFactory::maven(remote.clone(), remote.clone(), &settings.checksum_algorithm, settings.resolve_pom_only);
        CachingDependencyResolver::from_settings(settings, &factory, &SimpleMirrorSelector, remote.clone())
    }

    fn dep(s: &str) -> Dependency {
        Dependency::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_only_second_repository_has_artifact() {
        let remote = Arc::new(TransientRemote::new().with_file(B_JAR).with_file(B_SHA1));
        let resolver = resolver(&remote, &settings(&["https://repo-a/", "https://repo-b/"]));

        let result = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap().unwrap();
        assert_eq!(result.repository, Repository::parse("https://repo-b/").unwrap());
        assert_eq!(result.artifact_url.as_str(), B_JAR);
        assert_eq!(result.checksum_url.unwrap().as_str(), B_SHA1);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let remote = Arc::new(TransientRemote::new().with_file(A_JAR).with_file(B_JAR));
        let resolver = resolver(&remote, &settings(&["https://repo-a/", "https://repo-b/"]));

        let result = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap().unwrap();
        assert_eq!(result.artifact_url.as_str(), A_JAR);
        assert_eq!(remote.request_count(B_JAR), 0);
    }

    #[tokio::test]
    async fn test_memoized() {
        let remote = Arc::new(TransientRemote::new().with_file(B_JAR));
        let resolver = resolver(&remote, &settings(&["https://repo-a/", "https://repo-b/"]));

        let first = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap();
        let requests = remote.requests().len();
        let second = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.requests().len(), requests);
    }

    #[tokio::test]
    async fn test_negative_outcome_memoized() {
        let remote = Arc::new(TransientRemote::new());
        let resolver = resolver(&remote, &settings(&["https://repo-a/"]));

        assert_eq!(resolver.resolve(&dep("com.missing:ghost:9.9.9")).await.unwrap(), None);
        assert_eq!(resolver.resolve(&dep("com.missing:ghost:9.9.9")).await.unwrap(), None);
        assert_eq!(remote.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let remote = Arc::new(TransientRemote::new()
            .with_file(B_JAR)
            .with_delay(Duration::from_millis(20)));
        let resolver = resolver(&remote, &settings(&["https://repo-a/", "https://repo-b/"]));
        let dependency = dep("org.example:lib:1.0.0");

        let (a, b, c) = tokio::join!(
            resolver.resolve(&dependency),
            resolver.resolve(&dependency),
            resolver.resolve(&dependency),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.unwrap().is_some());
        assert_eq!(remote.request_count(A_JAR), 1);
        assert_eq!(remote.request_count(B_JAR), 1);
    }

    #[tokio::test]
    async fn test_mirror_replaces_repository() {
        let remote = Arc::new(TransientRemote::new().with_file(M_JAR).with_file(A_JAR));
        let mut settings = settings(&["https://repo-a/"]);
        settings.mirrors = vec![Mirror {
            original: Repository::parse("https://repo-a/").unwrap(),
            mirror: Repository::parse("https://mirror/").unwrap(),
        }];
        let resolver = resolver(&remote, &settings);

        let result = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap().unwrap();
        assert_eq!(result.artifact_url.as_str(), M_JAR);
        assert_eq!(resolver.effective_repositories(), vec![Repository::parse("https://mirror/").unwrap()]);
    }

    #[tokio::test]
    async fn test_failing_mirror_does_not_fall_back() {
        let remote = Arc::new(TransientRemote::new().with_file(A_JAR));
        let mut settings = settings(&["https://repo-a/"]);
        settings.mirrors = vec![Mirror {
            original: Repository::parse("https://repo-a/").unwrap(),
            mirror: Repository::parse("https://mirror/").unwrap(),
        }];
        let resolver = resolver(&remote, &settings);

        assert_eq!(resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap(), None);
        assert_eq!(remote.request_count(A_JAR), 0);
    }

    #[tokio::test]
    async fn test_global_repository_override() {
        let remote = Arc::new(TransientRemote::new().with_file(A_JAR).with_file(B_JAR));
        let mut settings = settings(&["https://repo-a/"]);
        settings.global_repositories = Some(vec![Repository::parse("https://repo-b/").unwrap()]);
        let resolver = resolver(&remote, &settings);

        let result = resolver.resolve(&dep("org.example:lib:1.0.0")).await.unwrap().unwrap();
        assert_eq!(result.artifact_url.as_str(), B_JAR);
        assert_eq!(remote.request_count(A_JAR), 0);
    }

    #[tokio::test]
    async fn test_resolve_with_explicit_enquirers() {
        let remote = Arc::new(TransientRemote::new().with_file(B_JAR));
        let resolver = resolver(&remote, &settings(&["https://repo-a/"]));
        let factory = PingingEnquirerFactory::maven(remote.clone(), remote.clone(), "SHA-1", false);
        let enquirers = vec![factory.create(Repository::parse("https://repo-b/").unwrap())];

        let result = resolver.resolve_with(&dep("org.example:lib:1.0.0"), &enquirers).await.unwrap().unwrap();
        assert_eq!(result.artifact_url.as_str(), B_JAR);
    }

    #[tokio::test]
    async fn test_idempotent_across_resolvers() {
        let remote = Arc::new(TransientRemote::new().with_file(B_JAR).with_file(B_SHA1));
        let settings = settings(&["https://repo-a/", "https://repo-b/"]);

        let first = resolver(&remote, &settings).resolve(&dep("org.example:lib:1.0.0")).await.unwrap();
        let second = resolver(&remote, &settings).resolve(&dep("org.example:lib:1.0.0")).await.unwrap();
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    fn recorded(repository: &str, artifact: &str) -> ResolutionResult {
        ResolutionResult {
            repository: Repository::parse(repository).unwrap(),
            artifact_url: Url::parse(artifact).unwrap(),
            checksum_url: None,
            aggregator: false,
        }
    }

    #[tokio::test]
    async fn test_is_reusable() {
        let remote = Arc::new(TransientRemote::new());
        let resolver = resolver(&remote, &settings(&["https://repo-a/"]));

        assert!(resolver.is_reusable(&recorded("https://repo-a/", A_JAR)).await.unwrap());
        assert!(!resolver.is_reusable(&recorded("https://repo-b/", B_JAR)).await.unwrap());
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn test_is_reusable_revalidated() {
        let remote = Arc::new(TransientRemote::new().with_file(A_JAR));
        let mut settings = settings(&["https://repo-a/", "https://repo-b/"]);
        settings.revalidate_pre_resolved = true;
        let resolver = resolver(&remote, &settings);

        assert!(resolver.is_reusable(&recorded("https://repo-a/", A_JAR)).await.unwrap());
        assert!(!resolver.is_reusable(&recorded("https://repo-b/", B_JAR)).await.unwrap());
    }
}
