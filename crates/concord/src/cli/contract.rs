//! `concord contract`: the contract lifecycle from the acting user's side.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::Cell;
use concord_engine::{ContractDetails, Revision, Submission, VersionDetails};
use concord_ids::{ContractId, UserId, VersionId};
use concord_lifecycle::LockAction;
use concord_protocol::{ContractResponse, ContractVersionResponse, MessageResponse};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::context::{engine_error, with_context, AppContext, GlobalArgs};
use super::error::HelpfulError;
use super::output::{format_size, format_time, print_json, print_table, status_color, yes_no};

#[derive(Subcommand, Debug, Clone)]
pub enum ContractAction {
    /// Send a document to another user for review
    Submit {
        file: PathBuf,
        /// Defaults to the file name without extension
        #[arg(long)]
        title: Option<String>,
        /// Recipient username
        #[arg(long)]
        to: Option<String>,
        /// Recipient email, used when --to is absent or unknown
        #[arg(long)]
        to_email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Contracts you sent or received, newest first
    List,
    /// Contract details with version history
    Show { id: ContractId },
    /// Take the edit lock
    Lock { id: ContractId },
    /// Release your edit lock
    Unlock { id: ContractId },
    /// Upload a new version
    Edit {
        id: ContractId,
        file: PathBuf,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve the current version
    Approve { id: ContractId },
    /// Deny (cancel) the contract
    Deny { id: ContractId },
    /// Sign the contract
    Sign { id: ContractId },
    /// Version history, newest first
    Versions { id: ContractId },
    /// Save the current document, or a specific version
    Download {
        id: ContractId,
        #[arg(long)]
        version: Option<VersionId>,
        /// Target file [default: ./<original file name>]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Delete the contract and all its versions
    Delete {
        id: ContractId,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(global: &GlobalArgs, action: ContractAction) -> Result<()> {
    with_context(global, |ctx| async move { dispatch(&ctx, action).await })
}

async fn dispatch(ctx: &AppContext, action: ContractAction) -> Result<()> {
    let actor = ctx.actor().await?;
    let engine = &ctx.engine;

    match action {
        ContractAction::Submit {
            file,
            title,
            to,
            to_email,
            notes,
        } => {
            let (file_name, bytes) = read_document(&file).await?;
            let title = title.unwrap_or_else(|| default_title(&file));
            let details = engine
                .submit(
                    actor.id,
                    Submission {
                        title,
                        file_name,
                        bytes,
                        recipient_username: to,
                        recipient_email: to_email,
                        notes,
                    },
                )
                .await
                .map_err(engine_error)?;
            if !ctx.json {
                println!(
                    "Submitted contract #{} to {}",
                    details.contract.id, details.recipient.username
                );
            }
            show_details(ctx, &details)
        }
        ContractAction::List => {
            let contracts = engine.list_mine(actor.id).await.map_err(engine_error)?;
            list_contracts(ctx, &contracts)
        }
        ContractAction::Show { id } => {
            let details = engine.get(actor.id, id).await.map_err(engine_error)?;
            show_details(ctx, &details)
        }
        ContractAction::Lock { id } => set_lock(ctx, actor.id, id, LockAction::Lock).await,
        ContractAction::Unlock { id } => set_lock(ctx, actor.id, id, LockAction::Unlock).await,
        ContractAction::Edit { id, file, notes } => {
            let (file_name, bytes) = read_document(&file).await?;
            let details = engine
                .edit(
                    actor.id,
                    id,
                    Revision {
                        file_name,
                        bytes,
                        change_notes: notes,
                    },
                )
                .await
                .map_err(engine_error)?;
            if !ctx.json {
                if let Some(latest) = details.versions.first() {
                    println!(
                        "Uploaded version {} of contract #{}",
                        latest.version.version_number, id
                    );
                }
            }
            show_details(ctx, &details)
        }
        ContractAction::Approve { id } => {
            engine.approve(actor.id, id).await.map_err(engine_error)?;
            acknowledge(ctx, actor.id, id, MessageResponse::approved()).await
        }
        ContractAction::Deny { id } => {
            engine.deny(actor.id, id).await.map_err(engine_error)?;
            acknowledge(ctx, actor.id, id, MessageResponse::denied()).await
        }
        ContractAction::Sign { id } => {
            engine.sign(actor.id, id).await.map_err(engine_error)?;
            acknowledge(ctx, actor.id, id, MessageResponse::signed()).await
        }
        ContractAction::Versions { id } => {
            let versions = engine
                .list_versions(actor.id, id)
                .await
                .map_err(engine_error)?;
            list_versions(ctx, &versions)
        }
        ContractAction::Download {
            id,
            version,
            output,
            force,
        } => {
            let download = match version {
                Some(version_id) => engine.download_version(actor.id, id, version_id).await,
                None => engine.download(actor.id, id).await,
            }
            .map_err(engine_error)?;

            let target = output.unwrap_or_else(|| PathBuf::from(&download.file_name));
            if target.exists() && !force {
                return Err(HelpfulError::invalid_argument(
                    format!("Refusing to overwrite {}", target.display()),
                    "TRY: Pass --force, or choose another path with --output",
                )
                .into());
            }
            tokio::fs::write(&target, &download.bytes)
                .await
                .with_context(|| format!("Failed to write {}", target.display()))?;

            if ctx.json {
                print_json(&serde_json::json!({
                    "file_name": download.file_name,
                    "path": target.to_string_lossy(),
                    "bytes": download.bytes.len(),
                }))
            } else {
                println!(
                    "Saved {} ({}) to {}",
                    download.file_name,
                    format_size(download.bytes.len() as u64),
                    target.display()
                );
                Ok(())
            }
        }
        ContractAction::Delete { id, yes } => {
            if !yes {
                return Err(HelpfulError::invalid_argument(
                    format!("Deleting contract #{} removes every version", id),
                    format!("TRY: Confirm with: concord contract delete {} --yes", id),
                )
                .into());
            }
            engine
                .delete_contract(actor.id, id)
                .await
                .map_err(engine_error)?;
            let message = MessageResponse::deleted();
            if ctx.json {
                print_json(&message)
            } else {
                println!("{}", message.message);
                Ok(())
            }
        }
    }
}

async fn read_document(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| match err.kind() {
        ErrorKind::NotFound => HelpfulError::file_not_found(path),
        _ => HelpfulError::cannot_read_file(path, &err.to_string()),
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    Ok((file_name, bytes))
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

async fn set_lock(ctx: &AppContext, actor: UserId, id: ContractId, action: LockAction) -> Result<()> {
    ctx.engine
        .set_lock(actor, id, action)
        .await
        .map_err(engine_error)?;
    acknowledge(ctx, actor, id, MessageResponse::lock(action)).await
}

/// Print the acknowledgement, or the refreshed contract under `--json`.
async fn acknowledge(
    ctx: &AppContext,
    actor: UserId,
    id: ContractId,
    message: MessageResponse,
) -> Result<()> {
    let details = ctx.engine.get(actor, id).await.map_err(engine_error)?;
    if ctx.json {
        return print_json(&ContractResponse::from(&details));
    }
    println!("{}", message.message);
    println!("  Status: {}", details.contract.state.status);
    Ok(())
}

fn show_details(ctx: &AppContext, details: &ContractDetails) -> Result<()> {
    if ctx.json {
        return print_json(&ContractResponse::from(details));
    }

    let contract = &details.contract;
    let state = &contract.state;
    println!("Contract #{}: {}", contract.id, contract.title);
    println!("  Status:     {}", state.status);
    println!("  Sender:     {}", details.sender.username);
    println!("  Recipient:  {}", details.recipient.username);
    println!(
        "  Approved:   sender {}, recipient {}",
        yes_no(state.sender_approved),
        yes_no(state.recipient_approved)
    );
    match &state.lock {
        Some(lock) => {
            let holder = if lock.holder == details.sender.id {
                &details.sender.username
            } else {
                &details.recipient.username
            };
            println!(
                "  Locked by:  {} ({})",
                holder,
                format_time(lock.locked_at)
            );
        }
        None => println!("  Locked by:  -"),
    }
    if let Some(signed_at) = state.signed_at {
        println!("  Signed:     {}", format_time(signed_at));
    }
    println!("  File:       {}", contract.file_name);
    if let Some(notes) = &contract.notes {
        println!("  Notes:      {}", notes);
    }
    println!("  Created:    {}", format_time(contract.created_at));
    println!();
    print_version_table(&details.versions);
    Ok(())
}

fn list_contracts(ctx: &AppContext, contracts: &[ContractDetails]) -> Result<()> {
    if ctx.json {
        let body: Vec<ContractResponse> = contracts.iter().map(ContractResponse::from).collect();
        return print_json(&body);
    }
    if contracts.is_empty() {
        println!("No contracts yet.");
        return Ok(());
    }
    let rows = contracts
        .iter()
        .map(|d| {
            let state = &d.contract.state;
            vec![
                Cell::new(d.contract.id),
                Cell::new(&d.contract.title),
                Cell::new(state.status).fg(status_color(state.status)),
                Cell::new(&d.sender.username),
                Cell::new(&d.recipient.username),
                Cell::new(d.versions.len()),
                Cell::new(yes_no(state.lock.is_some())),
                Cell::new(format_time(d.contract.updated_at.unwrap_or(d.contract.created_at))),
            ]
        })
        .collect();
    print_table(
        &[
            "ID", "TITLE", "STATUS", "SENDER", "RECIPIENT", "VERSIONS", "LOCKED", "UPDATED",
        ],
        rows,
    );
    Ok(())
}

fn list_versions(ctx: &AppContext, versions: &[VersionDetails]) -> Result<()> {
    if ctx.json {
        let body: Vec<ContractVersionResponse> =
            versions.iter().map(ContractVersionResponse::from).collect();
        return print_json(&body);
    }
    print_version_table(versions);
    Ok(())
}

fn print_version_table(versions: &[VersionDetails]) {
    let rows = versions
        .iter()
        .map(|v| {
            vec![
                Cell::new(v.version.version_number),
                Cell::new(v.version.id),
                Cell::new(&v.version.file_name),
                Cell::new(&v.created_by.username),
                Cell::new(format_time(v.version.created_at)),
                Cell::new(v.version.change_notes.as_deref().unwrap_or("")),
            ]
        })
        .collect();
    print_table(
        &["VERSION", "ID", "FILE", "AUTHOR", "CREATED", "NOTES"],
        rows,
    );
}
