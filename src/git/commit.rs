use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Account, Change, ObjectId};

/// Author or committer identity stamped on a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Identity of an account at a given instant
    pub fn of(account: &Account, when: DateTime<Utc>) -> Self {
        Self::new(account.name.clone(), account.email.clone(), when)
    }

    /// Same identity with a different timestamp
    pub fn at(&self, when: DateTime<Utc>) -> Self {
        Self::new(self.name.clone(), self.email.clone(), when)
    }
}

/// A snapshot of file contents: path -> blob id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: BTreeMap<String, ObjectId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, blob: ObjectId) {
        self.entries.insert(path.into(), blob);
    }

    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable commit in the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// First line of the commit message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

lazy_static! {
    static ref FOOTER_RE: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9-]*):\s*(.+)$").unwrap();
}

/// Parse the trailer block of a commit message: key/value lines in the last
/// paragraph. A last paragraph with any non-trailer line has no trailers.
pub fn footer_lines(message: &str) -> Vec<(String, String)> {
    let last_paragraph = message
        .trim_end()
        .rsplit("\n\n")
        .next()
        .unwrap_or("");

    // The subject alone is never a trailer block
    if last_paragraph == message.trim_end() && !message.trim_end().contains('\n') {
        return Vec::new();
    }

    let mut footers = Vec::new();
    for line in last_paragraph.lines() {
        match FOOTER_RE.captures(line) {
            Some(caps) => footers.push((caps[1].to_string(), caps[2].to_string())),
            None => return Vec::new(),
        }
    }
    footers
}

/// Append a trailer line to a commit message, extending an existing trailer
/// block or starting a new paragraph.
pub fn with_trailer(message: &str, key: &str, value: &str) -> String {
    let trimmed = message.trim_end();
    if footer_lines(trimmed).is_empty() {
        format!("{trimmed}\n\n{key}: {value}\n")
    } else {
        format!("{trimmed}\n{key}: {value}\n")
    }
}

/// Commit message for a server-synthesized merge of one change, with a
/// trailer pointing back at the merged change.
pub fn merge_commit_message(change: &Change) -> String {
    let base = format!("Merge \"{}\"", change.subject);
    with_trailer(&base, "Reviewed-on", &format!("{}~{}", change.project, change.id))
}
