use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use thiserror::Error;

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// The identity of a dependency: group, artifact and version. A snapshot build qualifier is
///  not part of it.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub struct DependencyId {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}
impl Display for DependencyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoordinateParseError {
    #[error("coordinate {input:?} has {found} fields, expected at least group:artifact:version")]
    TooFewFields { input: String, found: usize },
    #[error("coordinate {input:?} has an empty {field}")]
    EmptyField { input: String, field: &'static str },
    #[error("coordinate {input:?} has a {field} that cannot be part of a repository path")]
    InvalidField { input: String, field: &'static str },
}

/// Fields become path segments below a repository root, so they must not navigate out of it
///  or end the path early.
fn is_path_safe(field: &str) -> bool {
    !field.starts_with('.') && !field.contains(['/', '\\', '?', '#'])
}

/// A dependency as declared in the dependency graph. Transitive dependencies are stored as
///  references into the owning [DependencyGraph] rather than as nested values.
///
/// Equality and hashing only look at the [DependencyId].
#[derive(Clone, Debug)]
pub struct Dependency {
    id: DependencyId,
    snapshot_id: Option<String>,
    transitive: BTreeSet<DependencyId>,
}

impl Dependency {
    pub fn new(group_id: &str, artifact_id: &str, version: &str, snapshot_id: Option<&str>) -> Dependency {
        Dependency {
            id: DependencyId {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
            },
            snapshot_id: snapshot_id.map(|s| s.to_string()),
            transitive: BTreeSet::new(),
        }
    }

    /// Parses `group:artifact:version[:snapshotId]`. Fields beyond the fourth are ignored.
    pub fn parse(coordinate: &str) -> Result<Dependency, CoordinateParseError> {
        let fields: Vec<&str> = coordinate.split(':').collect();
        if fields.len() < 3 {
            return Err(CoordinateParseError::TooFewFields {
                input: coordinate.to_string(),
                found: fields.len(),
            });
        }

        for (field, name) in fields.iter().zip(["group", "artifact", "version"]) {
            if field.trim().is_empty() {
                return Err(CoordinateParseError::EmptyField { input: coordinate.to_string(), field: name });
            }
            if !is_path_safe(field.trim()) {
                return Err(CoordinateParseError::InvalidField { input: coordinate.to_string(), field: name });
            }
        }

        let snapshot_id = fields.get(3)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());

        Ok(Dependency::new(fields[0].trim(), fields[1].trim(), fields[2].trim(), snapshot_id))
    }

    pub fn with_transitive(mut self, transitive: impl IntoIterator<Item = DependencyId>) -> Dependency {
        self.transitive.extend(transitive);
        self.transitive.remove(&self.id);
        self
    }

    pub fn id(&self) -> &DependencyId {
        &self.id
    }

    pub fn group_id(&self) -> &str {
        &self.id.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.id.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.id.version
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    pub fn transitive(&self) -> &BTreeSet<DependencyId> {
        &self.transitive
    }

    pub fn is_snapshot(&self) -> bool {
        self.id.version.ends_with(SNAPSHOT_SUFFIX)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// Renders the coordinate, including the snapshot qualifier if there is one. This is the key
///  used in the manifest and the resolution cache.
impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.snapshot_id {
            None => write!(f, "{}", self.id),
            Some(snapshot_id) => write!(f, "{}:{}", self.id, snapshot_id),
        }
    }
}

/// Arena of all dependencies known to a project, keyed by identity. Root dependencies keep
///  their declaration order.
#[derive(Default, Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<DependencyId, Dependency>,
    roots: Vec<DependencyId>,
}

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        Default::default()
    }

    /// Adds a declared (root) dependency. Repeated declarations of the same identity merge
    ///  their transitive sets.
    pub fn insert_root(&mut self, dependency: Dependency) {
        let id = dependency.id.clone();
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
        self.insert(dependency);
    }

    /// Adds a dependency without making it a root, merging with an existing node of the same
    ///  identity.
    pub fn insert(&mut self, dependency: Dependency) {
        match self.nodes.get_mut(&dependency.id) {
            Some(existing) => {
                existing.transitive.extend(dependency.transitive);
                if existing.snapshot_id.is_none() {
                    existing.snapshot_id = dependency.snapshot_id;
                }
            }
            None => {
                self.nodes.insert(dependency.id.clone(), dependency);
            }
        }
    }

    pub fn get(&self, id: &DependencyId) -> Option<&Dependency> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Dependency> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All dependencies reachable from the roots, each exactly once, in depth-first
    ///  declaration order. Edges to identities without a node are skipped; cycles are
    ///  harmless.
    pub fn flatten(&self) -> Vec<&Dependency> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();

        for root in &self.roots {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                if let Some(dependency) = self.nodes.get(id) {
                    result.push(dependency);
                    // reversed so that the first declared child is visited first
                    stack.extend(dependency.transitive.iter().rev());
                }
            }
        }
        result
    }

    /// The transitive closure of a single node, excluding the node itself.
    pub fn closure_of(&self, id: &DependencyId) -> BTreeSet<DependencyId> {
        let mut result = BTreeSet::new();
        let mut stack: Vec<&DependencyId> = match self.nodes.get(id) {
            Some(dependency) => dependency.transitive.iter().collect(),
            None => return result,
        };
        while let Some(next) = stack.pop() {
            if next == id || !result.insert(next.clone()) {
                continue;
            }
            if let Some(dependency) = self.nodes.get(next) {
                stack.extend(dependency.transitive.iter());
            }
        }
        result
    }
}
