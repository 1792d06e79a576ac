//! Implementation of the `uniquejobs changelog` command.

use super::Session;
use crate::changelog::ChangelogEntry;
use crate::cli::ChangelogArgs;
use crate::error::Result;
use crate::scripts::ReadChangelog;
use crate::store::CoordinationStore;

pub fn cmd_changelog(session: &Session, args: ChangelogArgs) -> Result<()> {
    let entries = session.store.eval(&ReadChangelog { count: args.count })?;
    print!("{}", render_entries(&entries, args.json)?);
    Ok(())
}

fn render_entries(entries: &[ChangelogEntry], json: bool) -> Result<String> {
    if entries.is_empty() && !json {
        return Ok("No changelog entries.\n".to_string());
    }

    let mut out = String::new();
    for entry in entries {
        let line = if json {
            entry.to_ndjson_line()?
        } else {
            entry.to_string()
        };
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
