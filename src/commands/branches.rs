use std::io::Write;

use colored::Colorize;

use crate::artifacts::changes::Revnum;
use crate::artifacts::layout::BranchRoot;
use crate::commands::Session;

impl Session {
    /// List branch roots present at a revision.
    pub fn branches(&self, revnum: Option<Revnum>, project: Option<&str>) -> anyhow::Result<()> {
        let revnum = revnum.unwrap_or_else(|| self.repo.latest_revnum());
        let roots = self.repo.branches(revnum, project)?;
        self.print_roots(&roots, revnum)
    }

    /// List tag roots present at a revision.
    pub fn tags(&self, revnum: Option<Revnum>, project: Option<&str>) -> anyhow::Result<()> {
        let revnum = revnum.unwrap_or_else(|| self.repo.latest_revnum());
        if !self.repo.layout().supports_tags() {
            writeln!(self.writer(), "layout {} has no tags", self.repo.layout().name())?;
            return Ok(());
        }
        let roots = self.repo.tags(revnum, project)?;
        self.print_roots(&roots, revnum)
    }

    fn print_roots(&self, roots: &[BranchRoot], revnum: Revnum) -> anyhow::Result<()> {
        if roots.is_empty() {
            writeln!(self.writer(), "no matches at r{revnum}")?;
            return Ok(());
        }
        for root in roots {
            if root.project.is_empty() {
                writeln!(self.writer(), "{} {}", root.path.bold(), root.name.dimmed())?;
            } else {
                writeln!(
                    self.writer(),
                    "{} {} {}",
                    root.path.bold(),
                    root.name.dimmed(),
                    format!("({})", root.project).cyan()
                )?;
            }
        }
        Ok(())
    }
}
