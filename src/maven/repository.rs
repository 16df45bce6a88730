use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::maven::coordinates::DependencyGraph;

/// The root of a Maven2-layout repository. The URL is normalized to end with '/' so that
///  relative artifact paths can be joined onto it, and equality is by that normalized URL.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawRepository")]
pub struct Repository {
    url: Url,
}

#[derive(Deserialize)]
struct RawRepository {
    url: String,
}
impl TryFrom<RawRepository> for Repository {
    type Error = anyhow::Error;

    fn try_from(raw: RawRepository) -> Result<Self, Self::Error> {
        Repository::parse(&raw.url)
    }
}

impl Repository {
    pub fn new(url: Url) -> anyhow::Result<Repository> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(anyhow!("unsupported scheme {:?} for repository {}", other, url)),
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(anyhow!("not a valid repository base URL: {}", url));
        }

        let mut url = url;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Repository { url })
    }

    pub fn parse(url: &str) -> anyhow::Result<Repository> {
        let parsed = Url::parse(url.trim())
            .with_context(|| format!("malformed repository URL {:?}", url))?;
        Repository::new(parsed)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolves a path relative to the repository root, e.g. "org/example/lib/1.0/lib-1.0.jar".
    ///  `None` if the result would not lie below the root.
    pub fn join(&self, relative_path: &str) -> Option<Url> {
        let joined = self.url.join(relative_path).ok()?;
        if joined.as_str().starts_with(self.url.as_str()) && joined.query().is_none() && joined.fragment().is_none() {
            Some(joined)
        }
        else {
            None
        }
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Substitutes `mirror` for every occurrence of `original` in a repository list.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Mirror {
    pub original: Repository,
    pub mirror: Repository,
}

/// Package relocation applied by the (external) shading step. Pure metadata here.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationRule {
    pub original_pattern: String,
    pub relocated_pattern: String,
    #[serde(default)]
    pub inclusions: BTreeSet<String>,
    #[serde(default)]
    pub exclusions: BTreeSet<String>,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub coordinate: String,
    pub transitive: Vec<String>,
}

/// The manifest document handed to build tooling and the runtime loader.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct DependencyData {
    pub mirrors: Vec<Mirror>,
    pub repositories: Vec<Repository>,
    pub dependencies: Vec<ManifestDependency>,
    pub relocations: Vec<RelocationRule>,
}

impl DependencyData {
    /// Every root dependency is rendered with its full transitive closure.
    pub fn new(
        mirrors: &[Mirror],
        repositories: &[Repository],
        graph: &DependencyGraph,
        relocations: &[RelocationRule],
    ) -> DependencyData {
        let dependencies = graph.roots()
            .map(|root| ManifestDependency {
                coordinate: root.to_string(),
                transitive: graph.closure_of(root.id())
                    .iter()
                    .map(|id| graph.get(id)
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| id.to_string()))
                    .collect(),
            })
            .collect();

        DependencyData {
            mirrors: mirrors.to_vec(),
            repositories: repositories.to_vec(),
            dependencies,
            relocations: relocations.to_vec(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
