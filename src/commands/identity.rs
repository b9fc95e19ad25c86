use std::io::Write;

use colored::Colorize;

use crate::artifacts::changes::Revnum;
use crate::commands::Session;

impl Session {
    /// Print the stable identifier of `(branch, revnum)`.
    pub fn revid(&self, branch_path: &str, revnum: Revnum) -> anyhow::Result<()> {
        let id = self.repo.revision_id(branch_path, revnum)?;
        writeln!(self.writer(), "{id}")?;
        Ok(())
    }

    /// Resolve an identifier back to its location in this repository.
    pub fn lookup(&self, identifier: &str) -> anyhow::Result<()> {
        let (foreign, version) = self.repo.lookup_revision_id(identifier)?;
        writeln!(
            self.writer(),
            "{} {} {}",
            format!("r{}", foreign.revnum).yellow(),
            if foreign.branch_path.is_empty() {
                "<root>".to_string()
            } else {
                foreign.branch_path.clone()
            }
            .bold(),
            format!("({version})").dimmed()
        )?;
        Ok(())
    }
}
