use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ResolutionPolicy;
use crate::maven::coordinates::{Dependency, DependencyGraph};
use crate::resolver::caching_resolver::CachingDependencyResolver;
use crate::resolver::result::{ResolutionCache, ResolutionResult};

/// Fatal outcomes of a pipeline run. Each names the coordinate that caused it.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("failed to resolve dependency {coordinate} during pre-resolve; make sure it is available in the configured repositories, or disable require_pre_resolve")]
    Unresolved { coordinate: String },
    #[error("failed to resolve a checksum for dependency {coordinate} during pre-resolve; make sure the repository publishes one, or disable require_checksum")]
    MissingChecksum { coordinate: String },
    #[error("error while resolving {coordinate}: {message}")]
    Enquiry { coordinate: String, message: String },
}

enum Resolved {
    Reused(ResolutionResult),
    Fresh(Option<ResolutionResult>),
}

async fn resolve_one(
    dependency: &Dependency,
    resolver: &CachingDependencyResolver,
    pre_resolved: &ResolutionCache,
) -> anyhow::Result<Resolved> {
    if let Some(recorded) = pre_resolved.get(&dependency.to_string()) {
        if resolver.is_reusable(recorded).await? {
            return Ok(Resolved::Reused(recorded.clone()));
        }
    }
    Ok(Resolved::Fresh(resolver.resolve(dependency).await?))
}

/// Resolves every dependency reachable in `graph`, each unique coordinate exactly once, with at
///  most `policy.concurrency` resolutions in flight.
///
/// Entries of `pre_resolved` are reused when the resolver still consults their repository.
///  The returned cache holds one entry per resolved coordinate of the graph and nothing else.
///
/// Policy violations are checked as each coordinate completes. The first fatal one ends the
///  run: resolutions still in flight or queued are dropped.
///
/// All resolutions are driven on the calling task; `concurrency` bounds the coordinates being
///  probed at once, not a number of threads.
pub async fn resolve_all(
    graph: &DependencyGraph,
    resolver: &CachingDependencyResolver,
    policy: &ResolutionPolicy,
    pre_resolved: &ResolutionCache,
) -> Result<ResolutionCache, ResolutionError> {
    let dependencies = graph.flatten();
    info!("resolving {} dependencies with concurrency {}", dependencies.len(), policy.concurrency);

    let mut pending = stream::iter(dependencies)
        .map(|dependency| async move {
            (dependency, resolve_one(dependency, resolver, pre_resolved).await)
        })
        .buffer_unordered(policy.concurrency.max(1));

    let mut results = ResolutionCache::new();
    let mut reused = 0usize;
    while let Some((dependency, outcome)) = pending.next().await {
        let coordinate = dependency.to_string();

        let result = match outcome {
            Ok(Resolved::Reused(result)) => {
                reused += 1;
                result
            }
            Ok(Resolved::Fresh(Some(result))) => result,
            Ok(Resolved::Fresh(None)) => {
                warn!("failed to resolve dependency {}", coordinate);
                if policy.require_pre_resolve {
                    return Err(ResolutionError::Unresolved { coordinate });
                }
                continue;
            }
            Err(e) => {
                return Err(ResolutionError::Enquiry { coordinate, message: format!("{:#}", e) });
            }
        };

        if result.checksum_url.is_none() && !result.aggregator {
            warn!("failed to resolve checksum for dependency {}", coordinate);
            if policy.require_checksum {
                return Err(ResolutionError::MissingChecksum { coordinate });
            }
        }

        results.insert(coordinate, result);
    }

    info!("resolved {} dependencies ({} reused from previous run)", results.len(), reused);
    Ok(results)
}
