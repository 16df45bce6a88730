use tracing::debug;

use crate::maven::repository::{Mirror, Repository};

/// Produces the effective repository list to enquire, in priority order.
pub trait MirrorSelector: Send + Sync {
    fn select(&self, repositories: &[Repository], mirrors: &[Mirror]) -> Vec<Repository>;
}

/// Replaces each repository that has a mirror (matched by normalized URL) with that mirror, at
///  the same position. The original is not kept as a fallback. If several repositories end up
///  as the same URL, only the first position is kept.
#[derive(Default, Debug, Clone, Copy)]
pub struct SimpleMirrorSelector;

impl MirrorSelector for SimpleMirrorSelector {
    fn select(&self, repositories: &[Repository], mirrors: &[Mirror]) -> Vec<Repository> {
        let mut result: Vec<Repository> = Vec::with_capacity(repositories.len());

        for repository in repositories {
            let effective = match mirrors.iter().find(|m| &m.original == repository) {
                Some(mirror) => {
                    debug!("using mirror {} for {}", mirror.mirror, repository);
                    &mirror.mirror
                }
                None => repository,
            };

            if !result.contains(effective) {
                result.push(effective.clone());
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    fn repos(urls: &[&str]) -> Vec<Repository> {
        urls.iter().map(|u| Repository::parse(u).unwrap()).collect()
    }

    fn mirror(original: &str, mirror: &str) -> Mirror {
        Mirror {
            original: Repository::parse(original).unwrap(),
            mirror: Repository::parse(mirror).unwrap(),
        }
    }

    #[rstest]
    #[case::no_mirrors(&["https://a", "https://b"], vec![], &["https://a", "https://b"])]
    #[case::replaced_in_place(&["https://a", "https://b", "https://c"], vec![mirror("https://b", "https://m")], &["https://a", "https://m", "https://c"])]
    #[case::normalized_match(&["https://a/maven2"], vec![mirror("https://a/maven2/", "https://m")], &["https://m"])]
    #[case::unmatched_mirror_ignored(&["https://a"], vec![mirror("https://x", "https://m")], &["https://a"])]
    #[case::shared_mirror_dedup(&["https://a", "https://b", "https://c"], vec![mirror("https://a", "https://m"), mirror("https://c", "https://m")], &["https://m", "https://b"])]
    #[case::mirror_equal_to_later_repo(&["https://a", "https://b"], vec![mirror("https://a", "https://b")], &["https://b"])]
    #[case::duplicate_repositories(&["https://a", "https://a/"], vec![], &["https://a"])]
    #[case::first_mirror_wins(&["https://a"], vec![mirror("https://a", "https://m1"), mirror("https://a", "https://m2")], &["https://m1"])]
    fn test_select(#[case] repositories: &[&str], #[case] mirrors: Vec<Mirror>, #[case] expected: &[&str]) {
        assert_eq!(SimpleMirrorSelector.select(&repos(repositories), &mirrors), repos(expected));
    }
}
