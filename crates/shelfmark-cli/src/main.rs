//! Shelfmark CLI - bookmark capture and management from the terminal
//!
//! Every mutation commits locally first; the server leg is best-effort and
//! queued when unreachable, so the CLI works the same offline.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{
    Cli, Commands, ConfigCommands, FolderCommands, LinkCommands, PanelCommands, QueueCommands,
    SnapshotCommands, TagCommands,
};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelfmark=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add {
            url,
            title,
            note,
            folder,
            tag,
            important,
        }) => {
            commands::add::run_add(
                &url,
                &title,
                &note,
                folder.as_deref(),
                &tag,
                important,
                &db_path,
            )
            .await?;
        }
        Some(Commands::List {
            limit,
            folder,
            important,
            archived,
            json,
        }) => {
            commands::list::run_list(limit, folder.as_deref(), important, archived, json, &db_path)?;
        }
        Some(Commands::Link { command }) => match command {
            LinkCommands::Edit {
                id,
                url,
                title,
                note,
            } => {
                commands::link::run_edit(
                    id,
                    url.as_deref(),
                    title.as_deref(),
                    note.as_deref(),
                    &db_path,
                )
                .await?;
            }
            LinkCommands::Move { ids, folder } => {
                commands::link::run_move(&ids, folder.as_deref(), &db_path).await?;
            }
            LinkCommands::Archive { ids } => {
                commands::link::run_archive(&ids, true, &db_path).await?;
            }
            LinkCommands::Unarchive { ids } => {
                commands::link::run_archive(&ids, false, &db_path).await?;
            }
            LinkCommands::Important { id, off } => {
                commands::link::run_important(id, !off, &db_path).await?;
            }
            LinkCommands::Delete { ids } => {
                commands::link::run_delete(&ids, &db_path).await?;
            }
        },
        Some(Commands::Folder { command }) => match command {
            FolderCommands::Add { name, parent, note } => {
                commands::folder::run_add(&name, parent.as_deref(), &note, &db_path).await?;
            }
            FolderCommands::List { archived, json } => {
                commands::folder::run_list(archived, json, &db_path)?;
            }
            FolderCommands::Rename { name, new_name } => {
                commands::folder::run_rename(&name, &new_name, &db_path).await?;
            }
            FolderCommands::Move { name, parent } => {
                commands::folder::run_move(&name, parent.as_deref(), &db_path).await?;
            }
            FolderCommands::Archive { name, off } => {
                commands::folder::run_archive(&name, !off, &db_path).await?;
            }
            FolderCommands::Delete { name } => {
                commands::folder::run_delete(&name, &db_path).await?;
            }
        },
        Some(Commands::Panel { command }) => match command {
            PanelCommands::Add { name } => {
                commands::panel::run_add(&name, &db_path).await?;
            }
            PanelCommands::List { json } => {
                commands::panel::run_list(json, &db_path)?;
            }
            PanelCommands::Rename { name, new_name } => {
                commands::panel::run_rename(&name, &new_name, &db_path).await?;
            }
            PanelCommands::Delete { name } => {
                commands::panel::run_delete(&name, &db_path).await?;
            }
            PanelCommands::Pin {
                panel,
                folder,
                position,
            } => {
                commands::panel::run_pin(&panel, &folder, position, &db_path).await?;
            }
            PanelCommands::Unpin { panel, folder } => {
                commands::panel::run_unpin(&panel, &folder, &db_path).await?;
            }
        },
        Some(Commands::Tag { command }) => match command {
            TagCommands::List { json } => {
                commands::tag::run_list(json, &db_path)?;
            }
            TagCommands::Attach { link_id, name } => {
                commands::tag::run_attach(link_id, &name, &db_path).await?;
            }
            TagCommands::Detach { link_id, name } => {
                commands::tag::run_detach(link_id, &name, &db_path).await?;
            }
            TagCommands::Rename { name, new_name } => {
                commands::tag::run_rename(&name, &new_name, &db_path).await?;
            }
            TagCommands::Delete { name } => {
                commands::tag::run_delete(&name, &db_path).await?;
            }
        },
        Some(Commands::Sync) => commands::sync::run_sync(&db_path).await?,
        Some(Commands::Queue { command }) => match command {
            QueueCommands::List { json } => commands::queue::run_list(json, &db_path)?,
            QueueCommands::Drain => commands::queue::run_drain(&db_path).await?,
            QueueCommands::Clear => commands::queue::run_clear(&db_path)?,
        },
        Some(Commands::Snapshot { command }) => match command {
            SnapshotCommands::Take { format } => commands::snapshot::run_take(format, &db_path)?,
            SnapshotCommands::List { json } => commands::snapshot::run_list(json, &db_path)?,
            SnapshotCommands::Export { id, output } => {
                commands::snapshot::run_export(id, output.as_deref(), &db_path)?;
            }
            SnapshotCommands::Import { path } => commands::snapshot::run_import(&path, &db_path)?,
            SnapshotCommands::Prune { max_age_days, keep } => {
                commands::snapshot::run_prune(max_age_days, keep, &db_path)?;
            }
        },
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => commands::config::run_show(&db_path)?,
            ConfigCommands::SetServer { url } => commands::config::run_set_server(&url, &db_path)?,
            ConfigCommands::SetToken { token } => {
                commands::config::run_set_token(&token, &db_path)?;
            }
            ConfigCommands::SetSyncType { value } => {
                commands::config::run_set_sync_type(&value, &db_path)?;
            }
            ConfigCommands::Reset => commands::config::run_reset(&db_path)?,
        },
        Some(Commands::Completions { shell, output }) => {
            commands::completions::run_completions(shell, output.as_deref())?;
        }
        None => {
            // Quick capture mode: shelfmark <URL> [TITLE...]
            if cli.capture.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                let (url, title) = cli.capture.split_first().map_or(("", &[][..]), |(first, rest)| {
                    (first.as_str(), rest)
                });
                commands::add::run_add(url, title, "", None, &[], false, &db_path).await?;
            }
        }
    }

    Ok(())
}
