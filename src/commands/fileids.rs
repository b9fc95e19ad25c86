use std::io::Write;

use colored::Colorize;

use crate::artifacts::changes::Revnum;
use crate::commands::Session;

impl Session {
    /// Print the file-identity map of a branch at a revision.
    pub fn file_ids(&self, branch_path: &str, revnum: Option<Revnum>) -> anyhow::Result<()> {
        let revnum = revnum.unwrap_or_else(|| self.repo.latest_revnum());
        let map = self.repo.file_id_map(branch_path, revnum)?;
        for (path, entry) in map.iter() {
            let shown = if path.is_empty() { "." } else { path };
            writeln!(
                self.writer(),
                "{}\t{}\t{}",
                shown.bold(),
                entry.file_id,
                entry.text_revision.to_string().dimmed()
            )?;
        }
        Ok(())
    }
}
