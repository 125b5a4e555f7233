use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a change: a blake3 hex digest assigned at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log output
    pub fn short(&self) -> String {
        crate::util::short_hash(&self.0)
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a stored git object (commit, tree, or blob): SHA256 hex of its
/// serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> String {
        crate::util::short_hash(&self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (project, branch) pair - the unit of integration planning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchKey {
    pub project: String,
    pub branch: String,
}

impl BranchKey {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
        }
    }

    /// Full ref name of the branch head
    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.branch)
    }
}

/// Ref name under which a change's patch set is published
pub fn patch_set_ref(change_id: &ChangeId, sequence: u32) -> String {
    format!("refs/changes/{}/{}", change_id, sequence)
}

/// Lifecycle status of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    New,
    Merged,
    Abandoned,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::New => write!(f, "new"),
            ChangeStatus::Merged => write!(f, "merged"),
            ChangeStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// The integration strategy configured for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitType {
    FastForwardOnly,
    MergeIfNecessary,
    MergeAlways,
    CherryPick,
    RebaseIfNecessary,
    RebaseAlways,
}

impl fmt::Display for SubmitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmitType::FastForwardOnly => "FAST_FORWARD_ONLY",
            SubmitType::MergeIfNecessary => "MERGE_IF_NECESSARY",
            SubmitType::MergeAlways => "MERGE_ALWAYS",
            SubmitType::CherryPick => "CHERRY_PICK",
            SubmitType::RebaseIfNecessary => "REBASE_IF_NECESSARY",
            SubmitType::RebaseAlways => "REBASE_ALWAYS",
        };
        write!(f, "{name}")
    }
}

/// The acting identity behind a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A message recorded on a change's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub author: String,
    pub text: String,
    pub timestamp: u64,
}

/// A reviewable unit of work targeting one project+branch.
///
/// Only the ChangeStateProjector mutates a change after a successful ref
/// update; precondition and validation failure paths leave it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub project: String,
    pub branch: String,
    pub subject: String,
    pub topic: Option<String>,
    pub owner: String,
    pub status: ChangeStatus,
    /// Sequence number of the current patch set; 0 until one is uploaded
    pub current_sequence: u32,
    pub work_in_progress: bool,
    pub is_private: bool,
    /// Label names currently satisfied on the current patch set
    pub approvals: Vec<String>,
    pub attention_set: Vec<String>,
    pub messages: Vec<ChangeMessage>,
    /// Identifier of the submission that merged this change
    pub submission_id: Option<String>,
    pub submitter: Option<Account>,
    pub created_at: u64,
}

impl Change {
    pub fn branch_key(&self) -> BranchKey {
        BranchKey::new(self.project.clone(), self.branch.clone())
    }

    pub fn is_new(&self) -> bool {
        self.status == ChangeStatus::New
    }

    pub fn is_merged(&self) -> bool {
        self.status == ChangeStatus::Merged
    }

    pub fn is_abandoned(&self) -> bool {
        self.status == ChangeStatus::Abandoned
    }
}

/// One immutable commit-bearing revision of a change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSet {
    pub change_id: ChangeId,
    pub sequence: u32,
    pub commit: ObjectId,
    pub parents: Vec<ObjectId>,
    pub uploader: String,
    pub created_at: u64,
}

/// Options for one submission attempt
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Override the configured whole-topic mode for this submission
    pub whole_topic: Option<bool>,
    /// Test seam: scripted synthetic lock failures, consumed one entry per
    /// project ref transaction. `true` forces a lock failure for that apply.
    pub lock_failure_script: Vec<bool>,
}

/// Per-change classification produced by a submit strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    FastForwarded,
    Merged,
    Rebased,
    CherryPicked,
    AlreadyMerged,
    SkippedIdenticalTree,
    PathConflict,
    RebaseConflict,
    NotFastForward,
    MissingDependency,
    RejectedByValidator,
}

impl IntegrationStatus {
    /// Whether this classification lets the submission proceed
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            IntegrationStatus::FastForwarded
                | IntegrationStatus::Merged
                | IntegrationStatus::Rebased
                | IntegrationStatus::CherryPicked
                | IntegrationStatus::AlreadyMerged
                | IntegrationStatus::SkippedIdenticalTree
        )
    }

    /// Human-readable description recorded on the change or reported as the
    /// per-change problem. Wording is part of the contract.
    pub fn describe(&self, result: Option<&ObjectId>) -> String {
        match self {
            IntegrationStatus::FastForwarded | IntegrationStatus::Merged => {
                "Change has been successfully merged".to_string()
            }
            IntegrationStatus::Rebased => match result {
                Some(id) => format!("Change has been successfully rebased and submitted as {id}"),
                None => "Change has been successfully rebased and submitted".to_string(),
            },
            IntegrationStatus::CherryPicked => match result {
                Some(id) => format!("Change has been successfully cherry-picked as {id}"),
                None => "Change has been successfully cherry-picked".to_string(),
            },
            IntegrationStatus::AlreadyMerged => "Change was already merged".to_string(),
            IntegrationStatus::SkippedIdenticalTree => {
                "Marking change merged without cherry-picking to branch, as the resulting commit would be empty."
                    .to_string()
            }
            IntegrationStatus::PathConflict => {
                "Change could not be merged due to a path conflict. Please rebase the change locally and upload the rebased commit for review."
                    .to_string()
            }
            IntegrationStatus::RebaseConflict => {
                "Change could not be rebased due to a conflict during merge. Please rebase the change locally and upload the rebased commit for review."
                    .to_string()
            }
            IntegrationStatus::NotFastForward => {
                "Project policy requires all submissions to be a fast-forward. Please rebase the change locally and upload again for review."
                    .to_string()
            }
            IntegrationStatus::MissingDependency => {
                "Depends on change that was not submitted".to_string()
            }
            IntegrationStatus::RejectedByValidator => {
                "Change was rejected by a ref operation validator".to_string()
            }
        }
    }
}

/// Outcome for one change within a submission report
#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub change_id: ChangeId,
    pub branch: BranchKey,
    pub status: IntegrationStatus,
    pub commit: Option<ObjectId>,
    pub message: String,
}

/// The result of a whole submission attempt
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub submission_id: String,
    pub results: Vec<ChangeResult>,
}

impl SubmissionReport {
    pub fn result_for(&self, id: &ChangeId) -> Option<&ChangeResult> {
        self.results.iter().find(|r| &r.change_id == id)
    }
}
