use std::io::Write;

use crate::artifacts::changes::Revnum;
use crate::commands::Session;

impl Session {
    /// Print the merged (right-hand) parents recorded for one revision.
    pub fn merges(&self, branch_path: &str, revnum: Revnum) -> anyhow::Result<()> {
        let descriptor = self.repo.provider().get(branch_path, revnum);
        let parents = self.repo.parent_ids(&descriptor)?;
        if parents.len() <= 1 {
            writeln!(self.writer(), "r{revnum} merges nothing")?;
            return Ok(());
        }
        for merge in &parents[1..] {
            writeln!(self.writer(), "{merge}")?;
        }
        Ok(())
    }
}
