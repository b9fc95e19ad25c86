//! CLI command implementations
//!
//! Each command is a method on [`Session`], which couples an open
//! [`SourceRepository`] with an injected writer so output can be captured
//! in tests. Commands format and print; the reconstruction logic itself
//! lives in `artifacts`.

use std::cell::{RefCell, RefMut};
use std::io::Write;

use crate::areas::repository::SourceRepository;

pub mod branches;
pub mod classify;
pub mod fileids;
pub mod history;
pub mod identity;
pub mod merges;

pub struct Session {
    repo: SourceRepository,
    writer: RefCell<Box<dyn Write>>,
}

impl Session {
    pub fn new(repo: SourceRepository, writer: Box<dyn Write>) -> Self {
        Self { repo, writer: RefCell::new(writer) }
    }

    pub fn repo(&self) -> &SourceRepository {
        &self.repo
    }

    fn writer(&self) -> RefMut<'_, Box<dyn Write>> {
        self.writer.borrow_mut()
    }
}
