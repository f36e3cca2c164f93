use std::path::Path;

use shelfmark_core::db::{LinkRepository, SqliteLinkRepository};
use shelfmark_core::models::Link;

use crate::commands::common::{
    folder_by_name, format_link_lines, link_to_list_item, open_database, LinkListItem,
};
use crate::error::CliError;

pub fn run_list(
    limit: usize,
    folder: Option<&str>,
    important: bool,
    archived: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let repo = SqliteLinkRepository::new(db.connection());

    let mut links: Vec<Link> = if let Some(name) = folder {
        let folder = folder_by_name(&db, name)?;
        repo.list_by_folder(Some(folder.id))?
    } else if important {
        repo.list_important()?
    } else if archived {
        repo.list_archived()?
    } else {
        repo.list(limit, 0)?
    };
    links.truncate(limit);

    let items = links
        .iter()
        .map(|link| link_to_list_item(&db, link))
        .collect::<Result<Vec<LinkListItem>, CliError>>()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No links.");
    } else {
        for line in format_link_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}
