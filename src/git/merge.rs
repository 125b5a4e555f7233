use std::collections::{HashSet, VecDeque};
use thiserror::Error;

use super::{Commit, Signature, Tree};
use crate::providers::{GitObject, ObjectsProvider, ProviderError};
use crate::types::ObjectId;

/// Error type for commit-graph operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("cannot integrate root commit {0}")]
    RootCommit(ObjectId),
}

/// Alias for Result using GitError
pub type GitResult<T> = Result<T, GitError>;

/// Whether `ancestor` is reachable from `descendant` (inclusive)
pub fn is_ancestor(
    objects: &dyn ObjectsProvider,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> GitResult<bool> {
    let mut queue = VecDeque::from([descendant.clone()]);
    let mut seen = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if &id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        let commit = objects.commit(&id)?;
        queue.extend(commit.parents.iter().cloned());
    }
    Ok(false)
}

/// Closest common ancestor of two commits, if any. Ties are broken by
/// breadth-first distance from `b`, which is stable for a given graph.
pub fn merge_base(
    objects: &dyn ObjectsProvider,
    a: &ObjectId,
    b: &ObjectId,
) -> GitResult<Option<ObjectId>> {
    let mut reachable_from_a = HashSet::new();
    let mut queue = VecDeque::from([a.clone()]);
    while let Some(id) = queue.pop_front() {
        if !reachable_from_a.insert(id.clone()) {
            continue;
        }
        let commit = objects.commit(&id)?;
        queue.extend(commit.parents.iter().cloned());
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([b.clone()]);
    while let Some(id) = queue.pop_front() {
        if reachable_from_a.contains(&id) {
            return Ok(Some(id));
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        let commit = objects.commit(&id)?;
        queue.extend(commit.parents.iter().cloned());
    }
    Ok(None)
}

/// Result of a three-way tree merge
#[derive(Debug, Clone)]
pub enum TreeMergeOutcome {
    Clean(Tree),
    /// Paths that could not be merged
    Conflicted(Vec<String>),
}

/// Merge `ours` and `theirs` against their common `base`.
///
/// Per path: a side that matches the base yields to the other side; agreeing
/// sides are trivially clean. When both sides changed a path to different
/// contents, a per-file line merge is attempted if `content_merge` is on,
/// otherwise the path conflicts.
pub fn three_way_tree_merge(
    objects: &dyn ObjectsProvider,
    base: &Tree,
    ours: &Tree,
    theirs: &Tree,
    content_merge: bool,
) -> GitResult<TreeMergeOutcome> {
    let mut paths: HashSet<&String> = HashSet::new();
    paths.extend(base.entries.keys());
    paths.extend(ours.entries.keys());
    paths.extend(theirs.entries.keys());

    let mut merged = ours.clone();
    let mut conflicts = Vec::new();

    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        if o == t || t == b {
            // Agreement, or their side untouched: keep ours
            continue;
        }
        if o == b {
            // Our side untouched: take theirs
            match t {
                Some(id) => merged.insert(path.clone(), id.clone()),
                None => {
                    merged.remove(path);
                }
            }
            continue;
        }

        // Both sides changed the path, differently
        if content_merge {
            if let (Some(b), Some(o), Some(t)) = (b, o, t) {
                let base_text = objects.blob(b)?;
                let ours_text = objects.blob(o)?;
                let theirs_text = objects.blob(t)?;
                if let Some(text) = merge_file_lines(&base_text, &ours_text, &theirs_text) {
                    let blob = objects.put(&GitObject::Blob(text))?;
                    merged.insert(path.clone(), blob);
                    continue;
                }
            }
        }
        conflicts.push(path.clone());
    }

    if conflicts.is_empty() {
        Ok(TreeMergeOutcome::Clean(merged))
    } else {
        conflicts.sort();
        Ok(TreeMergeOutcome::Conflicted(conflicts))
    }
}

/// Line-level three-way merge of one file.
///
/// Clean when one side equals the base, both sides agree, or both sides edit
/// disjoint line positions of an equal-length file. Anything finer-grained
/// conflicts.
fn merge_file_lines(base: &str, ours: &str, theirs: &str) -> Option<String> {
    if ours == theirs || theirs == base {
        return Some(ours.to_string());
    }
    if ours == base {
        return Some(theirs.to_string());
    }

    let base_lines: Vec<&str> = base.lines().collect();
    let ours_lines: Vec<&str> = ours.lines().collect();
    let theirs_lines: Vec<&str> = theirs.lines().collect();

    if base_lines.len() != ours_lines.len() || base_lines.len() != theirs_lines.len() {
        return None;
    }

    let mut merged = Vec::with_capacity(base_lines.len());
    for i in 0..base_lines.len() {
        let ours_changed = ours_lines[i] != base_lines[i];
        let theirs_changed = theirs_lines[i] != base_lines[i];
        match (ours_changed, theirs_changed) {
            (true, true) if ours_lines[i] != theirs_lines[i] => return None,
            (_, true) => merged.push(theirs_lines[i]),
            _ => merged.push(ours_lines[i]),
        }
    }
    Some(format!("{}\n", merged.join("\n")))
}

/// Write a commit object, optionally forcing the author date to the
/// committer date.
pub fn write_commit(
    objects: &dyn ObjectsProvider,
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    message: String,
    match_author_date: bool,
) -> GitResult<ObjectId> {
    let author = if match_author_date {
        author.at(committer.when)
    } else {
        author
    };
    let commit = Commit {
        tree,
        parents,
        author,
        committer,
        message,
    };
    Ok(objects.put_commit(commit)?)
}

/// Result of replaying one commit onto a new base tree
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Clean(Tree),
    /// The replayed content is already present: result tree equals the tip tree
    IdenticalTree,
    Conflicted(Vec<String>),
}

/// Replay `source`'s diff against its first parent onto `onto_tree`. Shared
/// mechanics of cherry-pick and rebase; callers build the commit from the
/// returned tree.
pub fn apply_commit_onto(
    objects: &dyn ObjectsProvider,
    source: &Commit,
    source_id: &ObjectId,
    onto_tree: &Tree,
    content_merge: bool,
) -> GitResult<ApplyOutcome> {
    let parent = source
        .first_parent()
        .ok_or_else(|| GitError::RootCommit(source_id.clone()))?;
    let base_tree = objects.commit_tree(parent)?;
    let source_tree = objects.tree(&source.tree)?;

    match three_way_tree_merge(objects, &base_tree, onto_tree, &source_tree, content_merge)? {
        TreeMergeOutcome::Clean(tree) => {
            if &tree == onto_tree {
                Ok(ApplyOutcome::IdenticalTree)
            } else {
                Ok(ApplyOutcome::Clean(tree))
            }
        }
        TreeMergeOutcome::Conflicted(paths) => Ok(ApplyOutcome::Conflicted(paths)),
    }
}
