//! The project file (`slimjar.toml`): repositories, mirrors, relocations, the declared
//!  dependency graph and resolution settings.
//!
//! Parsing validates eagerly. A malformed repository URL is a configuration error; a malformed
//!  dependency coordinate is skipped with a warning.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;

use crate::maven::coordinates::{Dependency, DependencyGraph};
use crate::maven::repository::{DependencyData, Mirror, RelocationRule, Repository};
use crate::util::http_prober::DEFAULT_PROBE_TIMEOUT;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_CHECKSUM_ALGORITHM: &str = "SHA-1";

/// Everything that determines where a dependency resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub repositories: Vec<Repository>,
    pub mirrors: Vec<Mirror>,
    /// when set, the only repositories consulted - project repositories and mirrors are ignored
    pub global_repositories: Option<Vec<Repository>>,
    pub checksum_algorithm: String,
    pub resolve_pom_only: bool,
    pub revalidate_pre_resolved: bool,
    pub probe_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            repositories: vec![],
            mirrors: vec![],
            global_repositories: None,
            checksum_algorithm: DEFAULT_CHECKSUM_ALGORITHM.to_string(),
            resolve_pom_only: false,
            revalidate_pre_resolved: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// How the pipeline runs and which outcomes are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    pub concurrency: usize,
    pub require_pre_resolve: bool,
    pub require_checksum: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        ResolutionPolicy {
            concurrency: DEFAULT_CONCURRENCY,
            require_pre_resolve: false,
            require_checksum: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub settings: ResolverSettings,
    pub policy: ResolutionPolicy,
    pub relocations: Vec<RelocationRule>,
    pub graph: DependencyGraph,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProjectConfig {
    #[serde(default)]
    repositories: Vec<String>,
    #[serde(default)]
    mirrors: Vec<RawMirror>,
    #[serde(default)]
    relocations: Vec<RawRelocation>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    resolution: RawResolution,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMirror {
    original: String,
    mirror: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRelocation {
    original: String,
    relocated: String,
    #[serde(default)]
    inclusions: Vec<String>,
    #[serde(default)]
    exclusions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    coordinate: String,
    #[serde(default)]
    transitive: Vec<String>,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawResolution {
    concurrency: usize,
    probe_timeout_ms: u64,
    require_pre_resolve: bool,
    require_checksum: bool,
    checksum_algorithm: String,
    global_repositories: Option<Vec<String>>,
    resolve_pom_only: bool,
    revalidate_pre_resolved: bool,
}

impl Default for RawResolution {
    fn default() -> Self {
        RawResolution {
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            require_pre_resolve: false,
            require_checksum: false,
            checksum_algorithm: DEFAULT_CHECKSUM_ALGORITHM.to_string(),
            global_repositories: None,
            resolve_pom_only: false,
            revalidate_pre_resolved: false,
        }
    }
}

fn parse_repositories(urls: &[String], field: &str) -> anyhow::Result<Vec<Repository>> {
    urls.iter()
        .map(|u| Repository::parse(u).with_context(|| format!("invalid entry in {}", field)))
        .collect()
}

fn parse_dependency(coordinate: &str) -> Option<Dependency> {
    match Dependency::parse(coordinate) {
        Ok(dependency) => Some(dependency),
        Err(e) => {
            warn!("skipping dependency: {}", e);
            None
        }
    }
}

impl ProjectConfig {
    pub async fn load(path: &Path) -> anyhow::Result<ProjectConfig> {
        let content = tokio::fs::read_to_string(path).await
            .with_context(|| format!("reading project file {}", path.display()))?;
        ProjectConfig::parse(&content)
            .with_context(|| format!("in project file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<ProjectConfig> {
        let raw: RawProjectConfig = toml::from_str(content)?;
        let resolution = raw.resolution;

        if resolution.concurrency == 0 {
            return Err(anyhow!("resolution.concurrency must be at least 1"));
        }
        if resolution.probe_timeout_ms == 0 {
            return Err(anyhow!("resolution.probe_timeout_ms must be at least 1"));
        }
        if resolution.checksum_algorithm.trim().is_empty() {
            return Err(anyhow!("resolution.checksum_algorithm must not be empty"));
        }

        let global_repositories = match &resolution.global_repositories {
            None => None,
            Some(urls) if urls.is_empty() => return Err(anyhow!("resolution.global_repositories must not be empty when present")),
            Some(urls) => Some(parse_repositories(urls, "resolution.global_repositories")?),
        };

        let mirrors = raw.mirrors.iter()
            .map(|m| Ok(Mirror {
                original: Repository::parse(&m.original).context("invalid mirror")?,
                mirror: Repository::parse(&m.mirror).context("invalid mirror")?,
            }))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let relocations = raw.relocations.into_iter()
            .map(|r| RelocationRule {
                original_pattern: r.original,
                relocated_pattern: r.relocated,
                inclusions: r.inclusions.into_iter().collect(),
                exclusions: r.exclusions.into_iter().collect(),
            })
            .collect();

        let mut graph = DependencyGraph::new();
        for declared in &raw.dependencies {
            let root = match parse_dependency(&declared.coordinate) {
                Some(root) => root,
                None => continue,
            };

            let mut transitive_ids = Vec::with_capacity(declared.transitive.len());
            for transitive in declared.transitive.iter().filter_map(|t| parse_dependency(t)) {
                transitive_ids.push(transitive.id().clone());
                graph.insert(transitive);
            }
            graph.insert_root(root.with_transitive(transitive_ids));
        }

        Ok(ProjectConfig {
            settings: ResolverSettings {
                repositories: parse_repositories(&raw.repositories, "repositories")?,
                mirrors,
                global_repositories,
                checksum_algorithm: resolution.checksum_algorithm,
                resolve_pom_only: resolution.resolve_pom_only,
                revalidate_pre_resolved: resolution.revalidate_pre_resolved,
                probe_timeout: Duration::from_millis(resolution.probe_timeout_ms),
            },
            policy: ResolutionPolicy {
                concurrency: resolution.concurrency,
                require_pre_resolve: resolution.require_pre_resolve,
                require_checksum: resolution.require_checksum,
            },
            relocations,
            graph,
        })
    }

    pub fn dependency_data(&self) -> DependencyData {
        DependencyData::new(&self.settings.mirrors, &self.settings.repositories, &self.graph, &self.relocations)
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    const PROJECT: &str = r#"
repositories = ["https://repo1.maven.org/maven2", "https://jitpack.io"]

[[mirrors]]
original = "https://jitpack.io"
mirror = "https://mirror.example.com/jitpack"

[[relocations]]
original = "com.google.gson"
relocated = "shaded.gson"
exclusions = ["com.google.gson.internal"]

[[dependencies]]
coordinate = "com.google.code.gson:gson:2.10.1"

[[dependencies]]
coordinate = "org.example:lib:1.0-SNAPSHOT"
transitive = ["org.example:core:1.0", "broken", "org.example:api:1.0-SNAPSHOT:20210101.120000-3"]

[[dependencies]]
coordinate = "not-a-coordinate"

[resolution]
concurrency = 8
require_checksum = true
global_repositories = ["https://nexus.example.com/repository/public"]
"#;

    #[test]
    fn test_parse() {
        let config = ProjectConfig::parse(PROJECT).unwrap();

        assert_eq!(config.settings.repositories, vec![
            Repository::parse("https://repo1.maven.org/maven2/").unwrap(),
            Repository::parse("https://jitpack.io/").unwrap(),
        ]);
        assert_eq!(config.settings.mirrors.len(), 1);
        assert_eq!(config.settings.global_repositories, Some(vec![Repository::parse("https://nexus.example.com/repository/public/").unwrap()]));
        assert_eq!(config.settings.checksum_algorithm, "SHA-1");
        assert_eq!(config.settings.probe_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.policy, ResolutionPolicy { concurrency: 8, require_pre_resolve: false, require_checksum: true });
        assert_eq!(config.relocations[0].exclusions.len(), 1);

        // malformed coordinates are skipped
        assert_eq!(config.graph.roots().count(), 2);
        assert_eq!(config.graph.flatten().len(), 4);
    }

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::parse("").unwrap();
        assert_eq!(config.settings, ResolverSettings::default());
        assert_eq!(config.policy, ResolutionPolicy::default());
        assert!(config.graph.is_empty());
    }

    #[rstest]
    #[case::malformed_repository(r#"repositories = ["not a url"]"#)]
    #[case::file_repository(r#"repositories = ["file:///home/me/.m2/repository"]"#)]
    #[case::malformed_mirror("[[mirrors]]\noriginal = \"https://a\"\nmirror = \"::\"")]
    #[case::empty_global("[resolution]\nglobal_repositories = []")]
    #[case::zero_concurrency("[resolution]\nconcurrency = 0")]
    #[case::unknown_field("[resolution]\nrequire_everything = true")]
    #[case::not_toml("repositories = [")]
    fn test_invalid(#[case] content: &str) {
        assert!(ProjectConfig::parse(content).is_err());
    }

    #[test]
    fn test_dependency_data() {
        let data = ProjectConfig::parse(PROJECT).unwrap().dependency_data();

        assert_eq!(data.repositories.len(), 2);
        assert_eq!(data.mirrors.len(), 1);
        assert_eq!(data.relocations.len(), 1);
        assert_eq!(data.dependencies[1].coordinate, "org.example:lib:1.0-SNAPSHOT");
        assert_eq!(data.dependencies[1].transitive, vec![
            "org.example:api:1.0-SNAPSHOT:20210101.120000-3".to_string(),
            "org.example:core:1.0".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slimjar.toml");
        tokio::fs::write(&path, PROJECT).await.unwrap();

        assert_eq!(ProjectConfig::load(&path).await.unwrap().graph.roots().count(), 2);
        assert!(ProjectConfig::load(&dir.path().join("missing.toml")).await.is_err());
    }
}
