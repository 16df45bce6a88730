use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slimjar_resolver::config::ProjectConfig;
use slimjar_resolver::resolver::caching_resolver::CachingDependencyResolver;
use slimjar_resolver::resolver::enquirer::PingingEnquirerFactory;
use slimjar_resolver::resolver::mirrors::SimpleMirrorSelector;
use slimjar_resolver::resolver::pipeline::resolve_all;
use slimjar_resolver::resolver::result::ResolutionCache;
use slimjar_resolver::util::http_prober::HttpUrlProber;

const MANIFEST_FILE: &str = "slimjar.json";
const RESOLUTIONS_FILE: &str = "slimjar-resolutions.json";

/// Writes the dependency manifest for a project and pre-resolves download URLs for every
///  dependency in it.
#[derive(Parser)]
#[command(name = "slimjar-resolver", version)]
struct Cli {
    /// Project file
    #[arg(value_name = "CONFIG", default_value = "slimjar.toml")]
    config: PathBuf,

    /// Directory for slimjar.json and slimjar-resolutions.json
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Only write the manifest
    #[arg(long)]
    skip_resolution: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ProjectConfig::load(&cli.config).await?;

    tokio::fs::create_dir_all(&cli.output_dir).await
        .with_context(|| format!("creating output directory {}", cli.output_dir.display()))?;

    let manifest_path = cli.output_dir.join(MANIFEST_FILE);
    tokio::fs::write(&manifest_path, config.dependency_data().to_json()?).await
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    info!("wrote {}", manifest_path.display());

    if cli.skip_resolution {
        return Ok(());
    }

    let http = Arc::new(HttpUrlProber::new(config.settings.probe_timeout));
    let factory = PingingEnquirerFactory::maven(
        http.clone(),
        http.clone(),
        &config.settings.checksum_algorithm,
        config.settings.resolve_pom_only,
    );
    let resolver = CachingDependencyResolver::from_settings(&config.settings, &factory, &SimpleMirrorSelector, http);

    let resolutions_path = cli.output_dir.join(RESOLUTIONS_FILE);
    let pre_resolved = ResolutionCache::read(&resolutions_path).await?;
    let resolved = resolve_all(&config.graph, &resolver, &config.policy, &pre_resolved).await?;

    resolved.write(&resolutions_path).await?;
    info!("wrote {} resolutions to {}", resolved.len(), resolutions_path.display());
    Ok(())
}
