//! fabsync CLI - Command line interface for fabric_sync
//!
//! Inspects and reconciles fabric state snapshots from the command line.
//! Output is JSON by default so the tool can be driven by other programs.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use fabric_sync::model::{Attributes, PathKey, Resource, TenantId};
use fabric_sync::{
    engine, FabricConfig, PushPayload, ResourceKeyCodec, SnapshotConfig, SnapshotFile,
    SnapshotUniverse, StateForest, Universe,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fabsync")]
#[command(about = "Hash-tree state reconciliation for multi-tenant network fabrics")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// List registered resource types
    Types,

    /// Encode or decode path keys
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Show what reconciling the observed snapshot would change
    Diff {
        /// Snapshot holding the desired state
        desired: PathBuf,
        /// Snapshot holding the observed state
        observed: PathBuf,
    },

    /// Converge the observed snapshot onto the desired one
    Reconcile {
        /// Snapshot holding the desired state
        desired: PathBuf,
        /// Snapshot holding the observed state; rewritten in place
        observed: PathBuf,
    },

    /// Load resources from a JSON array into a snapshot
    Import {
        /// Snapshot to update (created if missing)
        snapshot: PathBuf,
        /// JSON file containing an array of resources
        resources: PathBuf,
    },

    /// Print the trees held in a snapshot
    Show {
        /// Snapshot to read (defaults to the configured snapshot_path)
        snapshot: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Derive the path key of a resource
    Encode {
        /// Resource type tag
        #[arg(short, long)]
        kind: String,
        /// Owning tenant
        #[arg(short, long, default_value = "common")]
        tenant: String,
        /// Attributes as name=value
        attrs: Vec<String>,
    },

    /// Decode "<type>|<value>" segments into a resource skeleton
    Decode {
        /// Key segments, root first
        #[arg(required = true)]
        segments: Vec<String>,
        /// Owning tenant
        #[arg(short, long, default_value = "common")]
        tenant: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => FabricConfig::default_path()?,
    };
    let config = FabricConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    init_tracing(&config);
    debug!(path = %config_path.display(), "Loaded config");

    match cli.command {
        Commands::Init => {
            let status = if config_path.exists() {
                "exists"
            } else {
                FabricConfig::default().save(&config_path)?;
                "ok"
            };
            output(
                cli.format,
                &serde_json::json!({
                    "status": status,
                    "config": config_path.display().to_string()
                }),
            )?;
        }

        Commands::Types => {
            let registry = config.registry()?;
            let items: Vec<_> = registry
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "tag": d.tag,
                        "identity": d.identity.iter()
                            .map(|s| format!("{}.{}", s.type_tag, s.attribute))
                            .collect::<Vec<_>>(),
                        "attributes": d.other_attributes
                    })
                })
                .collect();
            output(
                cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "types": items
                }),
            )?;
        }

        Commands::Key { command } => {
            let codec = ResourceKeyCodec::new(Arc::new(config.registry()?));
            match command {
                KeyCommands::Encode {
                    kind,
                    tenant,
                    attrs,
                } => {
                    let resource = resource_from_pairs(&codec, &kind, &tenant, &attrs)?;
                    let key = codec.encode(&resource)?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "tenant": tenant,
                            "kind": kind,
                            "key": key.to_strings()
                        }),
                    )?;
                }
                KeyCommands::Decode { segments, tenant } => {
                    let key = PathKey::parse(&segments)?;
                    let skeleton = codec.skeleton(&TenantId::new(tenant), &key)?;
                    let known = skeleton.is_known();
                    let resource = skeleton.into_resource();
                    output(
                        cli.format,
                        &serde_json::json!({
                            "tenant": resource.tenant,
                            "kind": resource.kind,
                            "known": known,
                            "identity": resource.identity
                        }),
                    )?;
                }
            }
        }

        Commands::Diff { desired, observed } => {
            let desired = load_existing(&desired)?;
            let observed = SnapshotFile::new(&observed).load_or_empty()?;
            let tenants = tracked_tenants(&config, &desired, &observed);

            let mut target = observed;
            target.retain_tenants(&tenants);
            for tenant in &tenants {
                target.tree_mut(tenant);
            }

            let changes = engine::compute_changes(&desired, &target);
            output(
                cli.format,
                &serde_json::json!({
                    "in_sync": changes.is_converged(),
                    "create": changes.create.len(),
                    "delete": changes.delete.len(),
                    "changes": changes
                }),
            )?;
        }

        Commands::Reconcile { desired, observed } => {
            let registry = Arc::new(config.registry()?);
            if !SnapshotFile::new(&desired).exists() {
                bail!("Desired snapshot not found: {}", desired.display());
            }
            let desired = SnapshotUniverse::initialize(SnapshotConfig {
                registry: registry.clone(),
                path: desired,
            })?;
            let mut target = SnapshotUniverse::initialize(SnapshotConfig {
                registry,
                path: observed,
            })?;

            let tenants = tracked_tenants(&config, desired.state(), target.state());
            target.serve(&tenants.into_iter().collect::<Vec<_>>())?;

            let outcome = engine::reconcile(&desired, &mut target)?;
            output(
                cli.format,
                &serde_json::json!({
                    "outcome": outcome,
                    "tenants": tenant_summary(target.state())
                }),
            )?;
        }

        Commands::Import {
            snapshot,
            resources,
        } => {
            let content = std::fs::read_to_string(&resources)
                .with_context(|| format!("Failed to read {}", resources.display()))?;
            let create: Vec<Resource> = serde_json::from_str(&content)?;
            let count = create.len();

            let mut universe = SnapshotUniverse::initialize(SnapshotConfig {
                registry: Arc::new(config.registry()?),
                path: snapshot,
            })?;
            universe.push_resources(PushPayload {
                create,
                delete: Vec::new(),
            })?;
            // an empty push never touches the file
            universe.persist()?;

            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "imported": count,
                    "tenants": tenant_summary(universe.state())
                }),
            )?;
        }

        Commands::Show { snapshot } => {
            let path = snapshot
                .or_else(|| config.snapshot_path.clone())
                .ok_or_else(|| anyhow!("No snapshot given and none configured"))?;
            let forest = load_existing(&path)?;
            let tenants: Vec<_> = forest
                .iter()
                .map(|(tenant, tree)| {
                    serde_json::json!({
                        "tenant": tenant,
                        "root_hash": tree.root_hash().to_hex(),
                        "nodes": tree.len(),
                        "keys": tree.keys().iter().map(PathKey::to_strings).collect::<Vec<_>>()
                    })
                })
                .collect();
            output(
                cli.format,
                &serde_json::json!({
                    "snapshot": path.display().to_string(),
                    "tenants": tenants
                }),
            )?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured filter; logs go to stderr so JSON
/// output on stdout stays parseable
fn init_tracing(config: &FabricConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_existing(path: &Path) -> anyhow::Result<StateForest> {
    let file = SnapshotFile::new(path);
    if !file.exists() {
        bail!("Snapshot not found: {}", path.display());
    }
    file.load()
        .with_context(|| format!("Failed to load snapshot {}", path.display()))
}

/// Configured tenants, or every tenant either side knows about
fn tracked_tenants(
    config: &FabricConfig,
    desired: &StateForest,
    observed: &StateForest,
) -> BTreeSet<TenantId> {
    if !config.served_tenants.is_empty() {
        return config.served_tenants.iter().cloned().collect();
    }
    desired.tenants().chain(observed.tenants()).cloned().collect()
}

/// Split `name=value` pairs into identity and plain attributes
fn resource_from_pairs(
    codec: &ResourceKeyCodec,
    kind: &str,
    tenant: &str,
    pairs: &[String],
) -> anyhow::Result<Resource> {
    let descriptor = codec.registry().resolve(kind)?;
    let identity: BTreeSet<&str> = descriptor.identity_attributes().collect();

    let mut resource = Resource::new(tenant, kind);
    let mut attributes = Attributes::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected name=value, got '{}'", pair))?;
        if identity.contains(name) {
            resource = resource.with_identity(name, value);
        } else {
            attributes.insert(name.to_string(), value.into());
        }
    }
    resource.attributes = attributes;
    Ok(resource)
}

fn tenant_summary(forest: &StateForest) -> Vec<serde_json::Value> {
    forest
        .iter()
        .map(|(tenant, tree)| {
            serde_json::json!({
                "tenant": tenant,
                "root_hash": tree.root_hash().to_hex(),
                "nodes": tree.len()
            })
        })
        .collect()
}

fn output(format: OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
