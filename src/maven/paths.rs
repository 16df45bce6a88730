use lazy_static::lazy_static;
use regex::Regex;

use crate::maven::coordinates::{Dependency, SNAPSHOT_SUFFIX};

lazy_static! {
    static ref SNAPSHOT_ID_REGEX: Regex = Regex::new(r"^(\d{8}\.\d{6})(?:-(\d+))?$").unwrap();
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum MavenVersion {
    Release(String),
    /// A unique snapshot build. `version` is the directory version, ending in '-SNAPSHOT'
    Snapshot {
        version: String,
        timestamp: String,
        build_number: Option<u32>,
    }
}
impl MavenVersion {
    fn directory_version(&self) -> &str {
        match self {
            MavenVersion::Release(v) => v,
            MavenVersion::Snapshot { version, .. } => version,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}

/// Splits a snapshot build identifier like "20210101.120000-3" into timestamp and build number.
pub fn parse_snapshot_id(snapshot_id: &str) -> Option<(String, Option<u32>)> {
    let captures = SNAPSHOT_ID_REGEX.captures(snapshot_id.trim())?;
    let timestamp = captures.get(1)?.as_str().to_string();
    let build_number = match captures.get(2) {
        None => None,
        Some(m) => Some(m.as_str().parse::<u32>().ok()?),
    };
    Some((timestamp, build_number))
}

pub fn is_valid_snapshot_id(snapshot_id: &str) -> bool {
    parse_snapshot_id(snapshot_id).is_some()
}

/// "1.0-SNAPSHOT" -> "1.0"
pub fn snapshot_base_version(version: &str) -> &str {
    version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(version)
}

/// The unique snapshot version for a dependency with a known build identifier, or `None` if
///  the identifier is not of the form "yyyyMMdd.HHmmss[-buildNumber]".
pub fn snapshot_version(dependency: &Dependency, snapshot_id: &str) -> Option<MavenVersion> {
    let (timestamp, build_number) = parse_snapshot_id(snapshot_id)?;
    Some(MavenVersion::Snapshot {
        version: dependency.version().to_string(),
        timestamp,
        build_number,
    })
}

/// The directory holding all files of a dependency's version, relative to the repository
///  root and with a trailing '/'.
pub fn artifact_directory(dependency: &Dependency) -> String {
    format!(
        "{}/{}/{}/",
        dependency.group_id().replace('.', "/"),
        dependency.artifact_id(),
        dependency.version(),
    )
}

/// Relative path of a file inside a Maven2 layout repository. `file_extension` includes the
///  leading '.', e.g. ".jar"
pub fn as_maven_path(dependency: &Dependency, version: &MavenVersion, classifier: &MavenClassifier, file_extension: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        dependency.group_id().replace('.', "/"),
        dependency.artifact_id(),
        version.directory_version(),
        maven_file_name(dependency.artifact_id(), version, classifier, file_extension),
    )
}

pub fn maven_file_name(artifact_id: &str, version: &MavenVersion, classifier: &MavenClassifier, file_extension: &str) -> String {
    let classifier_string = match classifier {
        MavenClassifier::Unclassified => "".to_string(),
        MavenClassifier::Classified(c) => format!("-{}", c),
    };

    match version {
        MavenVersion::Release(v) => {
            format!("{}-{}{}{}",
                    artifact_id,
                    v,
                    classifier_string,
                    file_extension,
            )
        }
        MavenVersion::Snapshot { version, timestamp, build_number } => {
            let build_number_string = match build_number {
                None => "".to_string(),
                Some(n) => format!("-{}", n),
            };

            format!("{}-{}-{}{}{}{}",
                    artifact_id,
                    snapshot_base_version(version),
                    timestamp,
                    build_number_string,
                    classifier_string,
                    file_extension,
            )
        }
    }
}
