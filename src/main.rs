use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tether_aws::{ClientFactory, StsConnector};
use tether_config::{FunctionSpec, ProviderConfig};
use tether_credentials::{CredentialResolver, Identity};
use tether_function::{DeploymentReport, FunctionLifecycle, LifecycleError, LifecycleSettings};

/// Tether - deploy functions and wire their triggers
#[derive(Parser)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Provider configuration file (default: ~/.tether/provider.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Override the configured region
  #[arg(long, global = true)]
  region: Option<String>,

  /// Override the configured application name
  #[arg(long, global = true)]
  app_name: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve credentials and print the identity in use
  Whoami,

  /// Create a function and bind its triggers
  Apply {
    /// Path to the function file (JSON)
    function_file: PathBuf,
  },

  /// Update a function's code and reconcile its triggers
  Update {
    /// Function name or ARN
    id: String,

    /// Path to the function file (JSON)
    function_file: PathBuf,
  },

  /// Show a function and its recorded bindings
  Show {
    /// Function name or ARN
    id: String,
  },

  /// Unbind every trigger and delete the function
  Destroy {
    /// Function name or ARN
    id: String,

    /// Delete even if some bindings could not be torn down
    #[arg(long)]
    force: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let Some(command) = cli.command else {
    println!("tether - use --help to see available commands");
    return Ok(());
  };

  let config = load_config(cli.config.as_deref(), cli.region, cli.app_name)?;

  let rt = tokio::runtime::Runtime::new()?;
  let success = rt.block_on(async { run(command, config).await })?;
  if !success {
    std::process::exit(1);
  }
  Ok(())
}

fn load_config(
  path: Option<&Path>,
  region: Option<String>,
  app_name: Option<String>,
) -> Result<ProviderConfig> {
  let default_path = dirs::home_dir().map(|home| home.join(".tether").join("provider.json"));
  let path = match path {
    Some(path) => Some(path.to_path_buf()),
    None => default_path.filter(|p| p.exists()),
  };

  let mut config = match path {
    Some(path) => {
      let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read provider config: {}", path.display()))?;
      serde_json::from_str::<ProviderConfig>(&content)
        .with_context(|| format!("failed to parse provider config: {}", path.display()))?
    }
    None => ProviderConfig::new(String::new(), String::new()),
  };

  if let Some(region) = region {
    config.region = region;
  }
  if let Some(app_name) = app_name {
    config.app_name = app_name;
  }
  if config.app_name.is_empty() {
    bail!("no application name configured; pass --app-name or set app_name in the config file");
  }
  Ok(config)
}

fn load_function(path: &Path) -> Result<FunctionSpec> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read function file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse function file: {}", path.display()))
}

async fn resolve(config: &ProviderConfig, factory: &ClientFactory) -> Result<Identity> {
  let resolver = CredentialResolver::new(Arc::new(StsConnector::new(factory.clone())));
  resolver
    .resolve(config)
    .await
    .context("failed to resolve credentials")
}

fn lifecycle(
  config: &ProviderConfig,
  factory: &ClientFactory,
  identity: &Identity,
) -> FunctionLifecycle {
  FunctionLifecycle::new(
    &factory.capabilities(identity),
    Arc::new(factory.registry(identity)),
    LifecycleSettings::new(config, identity),
  )
}

fn log_failed_bindings(report: &DeploymentReport) {
  for failed in report.failed() {
    if let Some(e) = &failed.error {
      error!(kind = %failed.binding.kind, error = %e, "binding failed");
    }
  }
  if let Some(e) = &report.persist_error {
    error!(id = %report.deployment.id, error = %e, "registry write failed");
  }
}

fn print(value: &impl serde::Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Runs `command`, returning false when it completed with failed bindings.
async fn run(command: Commands, config: ProviderConfig) -> Result<bool> {
  let factory = ClientFactory::new(&config);
  let identity = resolve(&config, &factory).await?;

  match command {
    Commands::Whoami => {
      info!(provider = identity.provider_name(), "identity resolved");
      print(&json!({
        "account_id": identity.account_id,
        "partition": identity.partition,
        "region": identity.region,
        "provider": identity.provider_name(),
      }))?;
      Ok(true)
    }
    Commands::Apply { function_file } => {
      let spec = load_function(&function_file)?;
      let report = lifecycle(&config, &factory, &identity)
        .create(&spec)
        .await
        .with_context(|| format!("failed to create function '{}'", spec.name))?;

      log_failed_bindings(&report);
      print(&report)?;
      Ok(report.is_success())
    }
    Commands::Update { id, function_file } => {
      let spec = load_function(&function_file)?;
      let report = lifecycle(&config, &factory, &identity)
        .update(&id, &spec)
        .await
        .with_context(|| format!("failed to update function '{id}'"))?;
      log_failed_bindings(&report);
      print(&report)?;
      Ok(report.is_success())
    }
    Commands::Show { id } => {
      let lifecycle = lifecycle(&config, &factory, &identity);
      let deployment = lifecycle
        .read(&id)
        .await
        .with_context(|| format!("failed to read function '{id}'"))?;
      let bindings = lifecycle
        .bindings(&deployment.id)
        .await
        .context("failed to read registry")?;
      print(&json!({ "deployment": deployment, "bindings": bindings }))?;
      Ok(true)
    }
    Commands::Destroy { id, force } => {
      match lifecycle(&config, &factory, &identity).delete(&id, force).await {
        Ok(report) => {
          let orphaned = report.orphaned();
          if !orphaned.is_empty() {
            warn!(
              id = %report.id,
              orphans = orphaned.len(),
              "deleted with orphaned resources, kept in the registry"
            );
          }
          print(&report)?;
          Ok(true)
        }
        Err(LifecycleError::DeletionRefused { id, pending }) => {
          eprintln!(
            "Refusing to delete '{id}': {} binding(s) still need teardown (use --force to override)",
            pending.len()
          );
          print(&pending)?;
          Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("failed to delete function '{id}'")),
      }
    }
  }
}
