use std::io::Write;

use colored::Colorize;

use crate::artifacts::changes::Revnum;
use crate::artifacts::revmeta::cursor::AncestryEnd;
use crate::commands::Session;

impl Session {
    /// Print a branch's mainline newest first, one block per revision.
    pub fn log(
        &self,
        branch_path: &str,
        revnum: Option<Revnum>,
        limit: Option<usize>,
    ) -> anyhow::Result<()> {
        let revnum = revnum.unwrap_or_else(|| self.repo.latest_revnum());
        let mut cursor = self.repo.iter_ancestry(branch_path, revnum, 0, limit)?;

        while let Some(descriptor) = cursor.next_older()? {
            let id = descriptor.revision_id(self.repo.version())?;
            writeln!(
                self.writer(),
                "{} {}",
                format!("r{}", descriptor.revnum).yellow(),
                id.to_string().dimmed()
            )?;
            if descriptor.branch_path != branch_path {
                writeln!(self.writer(), "Path:   {}", descriptor.branch_path)?;
            }
            let props = descriptor.revprops()?;
            if let Some(author) = &props.author {
                writeln!(self.writer(), "Author: {author}")?;
            }
            if let Some(date) = &props.date {
                writeln!(self.writer(), "Date:   {}", date.to_rfc3339())?;
            }
            let parents = self.repo.parent_ids(&descriptor)?;
            if parents.len() > 1 {
                for merge in &parents[1..] {
                    writeln!(self.writer(), "Merge:  {merge}")?;
                }
            }
            writeln!(self.writer())?;
            for line in props.message.as_deref().unwrap_or("").lines() {
                writeln!(self.writer(), "    {line}")?;
            }
            writeln!(self.writer())?;
        }

        match cursor.end() {
            Some(AncestryEnd::Boundary { path, revnum }) => {
                writeln!(
                    self.writer(),
                    "{}",
                    format!("history continues outside the branch namespace at {path}@{revnum}")
                        .red()
                )?;
            }
            Some(AncestryEnd::Truncated) => {
                writeln!(self.writer(), "{}", "(truncated)".dimmed())?;
            }
            _ => {}
        }
        Ok(())
    }
}
