//! Commit-graph model and merge machinery.
//!
//! Commits, trees, and blobs are content-addressed values in the objects
//! provider; the functions here implement the ancestry walks and three-way
//! merges the submit strategies are built from.

pub mod commit;
pub mod merge;

#[cfg(test)]
mod tests;

pub use commit::{
    footer_lines, merge_commit_message, with_trailer, Commit, Signature, Tree,
};
pub use merge::{
    apply_commit_onto, is_ancestor, merge_base, three_way_tree_merge, write_commit, ApplyOutcome,
    GitError, GitResult, TreeMergeOutcome,
};
