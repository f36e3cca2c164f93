use std::path::Path;

use shelfmark_core::models::LinkDraft;
use shelfmark_core::sync::{LinkService, Origin, TagService};
use shelfmark_core::util::host_of;

use crate::commands::common::{
    folder_by_name, load_settings, normalize_url, open_database, open_remote, report_remote,
};
use crate::error::CliError;

#[allow(clippy::too_many_arguments)]
pub async fn run_add(
    url: &str,
    title_parts: &[String],
    note: &str,
    folder: Option<&str>,
    tags: &[String],
    important: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let url = normalize_url(url)?;
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;

    let folder_id = folder
        .map(|name| folder_by_name(&db, name))
        .transpose()?
        .map(|folder| folder.id);

    let title = match title_parts.join(" ").trim() {
        "" => host_of(&url).unwrap_or_else(|| url.clone()),
        title => title.to_string(),
    };

    let mut draft = LinkDraft::new(url, title);
    draft.note = note.trim().to_string();
    draft.folder_id = folder_id;

    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.create(&draft, Origin::Local).await?;
    report_remote(&mutation);
    let link_id = mutation.value.id;

    if important {
        let mutation = service.set_important(link_id, true, Origin::Local).await?;
        report_remote(&mutation);
    }

    let tag_service = TagService::new(db.connection(), &settings, remote.as_ref());
    for tag in tags {
        let mutation = tag_service.attach(link_id, tag, Origin::Local).await?;
        report_remote(&mutation);
    }

    println!("{link_id}");
    Ok(())
}
