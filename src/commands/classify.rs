use std::io::Write;

use colored::Colorize;

use crate::commands::Session;

impl Session {
    /// Print how the layout decomposes one repository path.
    pub fn classify(&self, path: &str) -> anyhow::Result<()> {
        let classification = self.repo.classify(path)?;
        writeln!(
            self.writer(),
            "{} {}",
            classification.kind.to_string().green(),
            classification.branch_root.bold()
        )?;
        if !classification.project.is_empty() {
            writeln!(self.writer(), "project: {}", classification.project)?;
        }
        if !classification.inner_path.is_empty() {
            writeln!(self.writer(), "inner path: {}", classification.inner_path)?;
        }
        Ok(())
    }
}
