use anyhow::Context;
use attach_core::config::{
    backup_dir_from_env_value, data_dir_from_env_value, folder_privileges_from_env_value,
    folder_structure_from_env_values, node_url_from_env_value,
};
use attach_core::constants::DEFAULT_FILTER;
use attach_core::{
    ApprovalState, CleanupOutcome, FilesystemStore, IndexLookup, RecordUuid, RenameOutcome,
    ResourceDescriptor, ResourceName, ResourceStore, Session, StoreConfig, Visibility,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod registry;

use registry::{LocalOperator, RecordRegistry};

const DEFAULT_REGISTRY: &str = "data/records.yaml";

#[derive(Parser)]
#[command(name = "attach")]
#[command(about = "Record attachment store CLI")]
struct Cli {
    /// Record registry file (defaults to ATTACH_REGISTRY or data/records.yaml)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Act on the working copy of the record
    #[arg(long, global = true)]
    working_copy: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the resources of a record
    List {
        uuid: RecordUuid,
        /// Only this tier (default: public, plus private)
        #[arg(long)]
        visibility: Option<Visibility>,
        /// Glob matched against file names
        #[arg(long, default_value = DEFAULT_FILTER)]
        filter: String,
    },
    /// Show a resource, optionally copying it out
    Get {
        uuid: RecordUuid,
        /// Resource name or `{uuid}/attachments/{name}` id
        name: String,
        /// Tier to look in (default: public, then private)
        #[arg(long)]
        visibility: Option<Visibility>,
        /// Write the resource content to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Store a local file as a resource
    Put {
        uuid: RecordUuid,
        /// File to store
        file: PathBuf,
        /// Store under this name instead of the file name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "public")]
        visibility: Visibility,
    },
    /// Delete a resource
    Delete {
        uuid: RecordUuid,
        name: String,
        /// Only delete from this tier
        #[arg(long)]
        visibility: Option<Visibility>,
    },
    /// Delete every resource of a record
    DeleteAll { uuid: RecordUuid },
    /// Move a resource to another tier
    SetVisibility {
        uuid: RecordUuid,
        name: String,
        visibility: Visibility,
    },
    /// Copy the resources of one tier to another record
    Copy {
        source: RecordUuid,
        target: RecordUuid,
        #[arg(long, default_value = "public")]
        visibility: Visibility,
        /// Copy into the working copy of the target
        #[arg(long)]
        target_working_copy: bool,
    },
    /// Ensure the folder of a record exists
    Container { uuid: RecordUuid },
    /// Move a record folder, pruning emptied parents (paths relative to the data directory)
    MoveDir { old: PathBuf, new: PathBuf },
    /// Print where a record is stored
    Path { uuid: RecordUuid },
}

/// Prints `value` as JSON or through `human`.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_descriptor(descriptor: &ResourceDescriptor) {
    println!(
        "{}\t{}\t{} bytes\t{}\t{}",
        descriptor.filename,
        descriptor.visibility,
        descriptor.size_bytes,
        descriptor
            .last_modified
            .format("%Y-%m-%d %H:%M:%S UTC"),
        descriptor.url
    );
}

fn rename_summary(outcome: &RenameOutcome) -> serde_json::Value {
    match outcome {
        RenameOutcome::Moved { pruned } => {
            serde_json::json!({ "outcome": "moved", "pruned": pruned })
        }
        RenameOutcome::Created => serde_json::json!({ "outcome": "created" }),
        RenameOutcome::Failed { reason } => {
            serde_json::json!({ "outcome": "failed", "reason": reason })
        }
    }
}

fn within_data_dir(data_dir: &Path, path: PathBuf) -> anyhow::Result<PathBuf> {
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        anyhow::bail!("{} must not contain '..'", path.display());
    }

    Ok(if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    })
}

/// Builds the store from `ATTACH_*` environment variables.
fn build_store(registry: Arc<RecordRegistry>) -> anyhow::Result<FilesystemStore> {
    let config = StoreConfig::new(
        data_dir_from_env_value(std::env::var("ATTACH_DATA_DIR").ok()),
        backup_dir_from_env_value(std::env::var("ATTACH_BACKUP_DIR").ok()),
        node_url_from_env_value(std::env::var("ATTACH_NODE_URL").ok()),
        folder_structure_from_env_values(
            std::env::var("ATTACH_FOLDER_STRUCTURE").ok(),
            std::env::var("ATTACH_FOLDER_TEMPLATE").ok(),
        )?,
        folder_privileges_from_env_value(std::env::var("ATTACH_FOLDER_PRIVILEGES").ok())?,
    )?;

    tracing::debug!(
        "data directory {}, folder structure {:?}, privileges {:?}",
        config.data_dir().display(),
        config.folder_structure(),
        config.folder_privileges()
    );

    let index: Arc<dyn IndexLookup> = registry.clone();
    Ok(FilesystemStore::new(
        Arc::new(config),
        Arc::new(LocalOperator),
        registry,
        Some(index),
    ))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("attach=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'attach --help' for commands");
        return Ok(());
    };

    let registry_path = cli
        .registry
        .or_else(|| std::env::var("ATTACH_REGISTRY").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY));
    let registry = Arc::new(RecordRegistry::load(&registry_path)?);
    let store = build_store(registry)?;

    let session = Session::authenticated("local-operator");
    let approval = ApprovalState::from_approved(!cli.working_copy);
    let json = cli.json;

    match command {
        Commands::List {
            uuid,
            visibility,
            filter,
        } => {
            let resources = store.list_resources(&session, &uuid, visibility, &filter, approval)?;
            emit(json, &resources, |resources| {
                if resources.is_empty() {
                    println!("No resources found for {}.", uuid);
                }
                resources.iter().for_each(print_descriptor);
            })?;
        }
        Commands::Get {
            uuid,
            name,
            visibility,
            output,
        } => {
            let name = ResourceName::from_resource_id(&name, uuid.as_str())?;
            let holder = match visibility {
                Some(visibility) => {
                    store.get_resource(&session, &uuid, visibility, &name, approval)?
                }
                None => store.find_resource(&session, &uuid, &name, approval)?,
            };

            if let Some(output) = output {
                let mut content = holder.open()?;
                let mut file = std::fs::File::create(&output)
                    .with_context(|| format!("failed to create {}", output.display()))?;
                std::io::copy(&mut content, &mut file)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                tracing::info!("copied {} to {}", name, output.display());
            }
            emit(json, holder.descriptor(), print_descriptor)?;
        }
        Commands::Put {
            uuid,
            file,
            name,
            visibility,
        } => {
            let stored = match name {
                Some(name) => {
                    let name = ResourceName::from_resource_id(&name, uuid.as_str())?;
                    let modified = std::fs::metadata(&file)
                        .and_then(|m| m.modified())
                        .with_context(|| format!("failed to read {}", file.display()))?;
                    let mut content = std::fs::File::open(&file)
                        .with_context(|| format!("failed to open {}", file.display()))?;
                    store.put_resource(
                        &session,
                        &uuid,
                        &name,
                        &mut content,
                        Some(modified.into()),
                        visibility,
                        approval,
                    )?
                }
                None => {
                    store.put_resource_from_file(&session, &uuid, &file, visibility, approval)?
                }
            };
            emit(json, &stored, print_descriptor)?;
        }
        Commands::Delete {
            uuid,
            name,
            visibility,
        } => {
            let name = ResourceName::from_resource_id(&name, uuid.as_str())?;
            let outcome = match visibility {
                Some(visibility) => {
                    store.delete_resource_in(&session, &uuid, visibility, &name, approval)?
                }
                None => store.delete_resource(&session, &uuid, &name, approval)?,
            };
            report_cleanup(json, &outcome)?;
        }
        Commands::DeleteAll { uuid } => {
            let outcome = store.delete_all_resources(&session, &uuid, approval)?;
            report_cleanup(json, &outcome)?;
        }
        Commands::SetVisibility {
            uuid,
            name,
            visibility,
        } => {
            let name = ResourceName::from_resource_id(&name, uuid.as_str())?;
            let patched = store.patch_visibility(&session, &uuid, &name, visibility, approval)?;
            emit(json, &patched, |patched| match patched {
                Some(descriptor) => print_descriptor(descriptor),
                None => println!("{} tier is not used, {} left in place.", visibility, name),
            })?;
        }
        Commands::Copy {
            source,
            target,
            visibility,
            target_working_copy,
        } => {
            let summary = store.copy_resources(
                &session,
                &source,
                &target,
                visibility,
                approval,
                ApprovalState::from_approved(!target_working_copy),
            )?;
            emit(json, &summary, |summary| {
                println!(
                    "Copied {} resources from {} to {}.",
                    summary.copied.len(),
                    source,
                    target
                );
                for failure in &summary.failed {
                    println!("  failed: {} ({})", failure.resource, failure.reason);
                }
            })?;
            if !summary.is_complete() {
                anyhow::bail!("{} resources could not be copied", summary.failed.len());
            }
        }
        Commands::Container { uuid } => {
            let container = store.get_resource_container(&uuid, approval)?;
            emit(json, &container, |container| {
                println!("{}\t{}", container.directory.display(), container.url);
            })?;
        }
        Commands::MoveDir { old, new } => {
            let data_dir = store.config().data_dir();
            let old = within_data_dir(data_dir, old)?;
            let new = within_data_dir(data_dir, new)?;
            let outcome = store.rename_record_directory(&old, &new);
            emit(json, &rename_summary(&outcome), |_| match &outcome {
                RenameOutcome::Moved { pruned } => println!(
                    "Moved {} to {} ({} empty folders pruned).",
                    old.display(),
                    new.display(),
                    pruned
                ),
                RenameOutcome::Created => println!("Created {}.", new.display()),
                RenameOutcome::Failed { reason } => println!("{}", reason),
            })?;
            if let RenameOutcome::Failed { reason } = outcome {
                anyhow::bail!(reason);
            }
        }
        Commands::Path { uuid } => {
            let record = store.record_directory(&uuid, approval)?;
            let removed = store.removed_bucket_directory(&uuid, approval)?;
            let paths = serde_json::json!({
                "record_directory": record,
                "removed_bucket_directory": removed,
            });
            emit(json, &paths, |_| {
                println!("record:  {}", record.display());
                println!("removed: {}", removed.display());
            })?;
        }
    }

    Ok(())
}

fn report_cleanup(json: bool, outcome: &CleanupOutcome) -> anyhow::Result<()> {
    emit(json, outcome, |outcome| println!("{}", outcome))?;
    if !outcome.is_success() {
        anyhow::bail!("{}", outcome);
    }
    Ok(())
}
