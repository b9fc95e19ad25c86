//! Line-oriented fixture files describing a recorded source log.
//!
//! The format is one directive per line, `#` comments and blank lines
//! ignored:
//!
//! ```text
//! uuid 6987ef2d-0c8e-4fdb-93f5-a70d3e516e32
//!
//! rev 1
//! author alice
//! message create trunk
//! add trunk
//! add trunk/README file
//!
//! rev 2
//! copy branches/feature trunk@1
//! pset branches/feature svk:merge 6987ef2d-...:/trunk:1
//! ```
//!
//! Revisions must be numbered consecutively from 1. `add`, `mod` and
//! `replace` take an optional trailing `file` kind; paths default to
//! directories. `copy` and `replace-copy` take `<dest> <src>@<rev>`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use crate::areas::log::{RecordedLog, RevisionDraft};
use crate::artifacts::changes::{PathChange, Revnum};

/// A parsed fixture: the repository identity plus its recorded log.
#[derive(Debug)]
pub struct Fixture {
    pub uuid: String,
    pub log: RecordedLog,
}

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading log fixture {}", path.display()))?;
    parse_fixture(&text).with_context(|| format!("parsing log fixture {}", path.display()))
}

enum Directive {
    Author(String),
    Date(DateTime<Utc>),
    Message(String),
    RevisionProperty(String, String),
    Change(String, PathChange),
    SetProperty(String, String, String),
}

pub fn parse_fixture(text: &str) -> Result<Fixture> {
    let mut uuid: Option<String> = None;
    let mut revisions: Vec<Vec<Directive>> = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut parse = || -> Result<()> {
            match keyword {
                "uuid" => {
                    if rest.is_empty() || rest.contains(':') {
                        bail!("invalid repository uuid {rest:?}");
                    }
                    uuid = Some(rest.to_string());
                }
                "rev" => {
                    let revnum: Revnum = rest.parse().context("invalid revision number")?;
                    if revnum != revisions.len() as Revnum + 1 {
                        bail!(
                            "revision numbers must be consecutive: expected r{}, got r{revnum}",
                            revisions.len() + 1
                        );
                    }
                    revisions.push(Vec::new());
                }
                _ => {
                    let current = revisions
                        .last_mut()
                        .with_context(|| format!("{keyword:?} before the first `rev`"))?;
                    current.push(directive(keyword, rest)?);
                }
            }
            Ok(())
        };
        parse().with_context(|| format!("fixture line {lineno}: {raw:?}"))?;
    }

    let uuid = uuid.context("fixture declares no `uuid`")?;
    let mut builder = RecordedLog::builder();
    for (index, directives) in revisions.into_iter().enumerate() {
        builder = builder
            .revision(|draft| {
                for d in directives {
                    apply_directive(draft, d);
                }
            })
            .with_context(|| format!("replaying fixture r{}", index + 1))?;
    }
    Ok(Fixture { uuid, log: builder.build() })
}

fn directive(keyword: &str, rest: &str) -> Result<Directive> {
    let path_and_kind = |rest: &str, change: PathChange| -> Result<Directive> {
        let mut fields = rest.split_whitespace();
        let path = fields.next().context("missing path")?;
        let change = match fields.next() {
            Some("file") => change.file(),
            Some(other) => bail!("unknown node kind {other:?}"),
            None => change,
        };
        Ok(Directive::Change(normalize(path), change))
    };
    let copy_args = |rest: &str| -> Result<(String, String, Revnum)> {
        let mut fields = rest.split_whitespace();
        let dest = fields.next().context("missing copy destination")?;
        let source = fields.next().context("missing copy source")?;
        let (source, revnum) = source
            .rsplit_once('@')
            .context("copy source must be <path>@<rev>")?;
        Ok((normalize(dest), normalize(source), revnum.parse().context("invalid copy revision")?))
    };

    Ok(match keyword {
        "author" => Directive::Author(rest.to_string()),
        "date" => Directive::Date(
            DateTime::parse_from_rfc3339(rest)
                .context("invalid RFC 3339 date")?
                .with_timezone(&Utc),
        ),
        "message" => Directive::Message(rest.to_string()),
        "rprop" => {
            let (key, value) = rest.split_once(char::is_whitespace).context("rprop needs a key and a value")?;
            Directive::RevisionProperty(key.to_string(), value.trim().to_string())
        }
        "add" => path_and_kind(rest, PathChange::add())?,
        "mod" => path_and_kind(rest, PathChange::modify())?,
        "del" => Directive::Change(normalize(rest), PathChange::delete()),
        "replace" => path_and_kind(rest, PathChange::replace())?,
        "copy" => {
            let (dest, source, revnum) = copy_args(rest)?;
            Directive::Change(dest, PathChange::add_from(source, revnum))
        }
        "replace-copy" => {
            let (dest, source, revnum) = copy_args(rest)?;
            Directive::Change(dest, PathChange::replace_from(source, revnum))
        }
        "pset" => {
            let mut fields = rest.splitn(3, char::is_whitespace);
            let path = fields.next().context("pset needs a path")?;
            let key = fields.next().context("pset needs a property key")?;
            let value = fields.next().unwrap_or("");
            Directive::SetProperty(
                normalize(path),
                key.to_string(),
                value.replace("\\n", "\n"),
            )
        }
        other => bail!("unknown directive {other:?}"),
    })
}

fn apply_directive(draft: &mut RevisionDraft, d: Directive) {
    match d {
        Directive::Author(a) => {
            draft.author(&a);
        }
        Directive::Date(d) => {
            draft.date(d);
        }
        Directive::Message(m) => {
            draft.message(&m);
        }
        Directive::RevisionProperty(k, v) => {
            draft.revision_property(&k, &v);
        }
        Directive::Change(path, change) => {
            draft.change(&path, change);
        }
        Directive::SetProperty(path, key, value) => {
            draft.set_node_property(&path, &key, &value);
        }
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}
