//! Review domain values
//!
//! Plain data shared by the review leaves and workflows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pull request coordinates on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PullRequestId {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Pull request number
    pub number: u64,
}

impl PullRequestId {
    /// Create a pull request identifier.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Review group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    /// Create a new random GroupId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable hunk identifier: file path plus hunk position within the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HunkId(pub String);

impl HunkId {
    /// Identifier for the `index`th hunk of `file`.
    pub fn new(file: &str, index: usize) -> Self {
        Self(format!("{}#{}", file, index))
    }
}

impl fmt::Display for HunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pull request metadata as returned by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Coordinates
    pub id: PullRequestId,
    /// Title
    pub title: String,
    /// Author login
    pub author: String,
    /// Current head commit
    pub head_sha: String,
}

/// One hunk of a pull request diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Identifier
    pub id: HunkId,
    /// File the hunk belongs to
    pub file: String,
    /// Range header (`@@ -a,b +c,d @@`)
    pub header: String,
    /// Hunk lines
    pub body: String,
}

/// Reviewer-defined group of hunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Identifier
    pub id: GroupId,
    /// Pull request the group belongs to
    pub pull_request: PullRequestId,
    /// Display name
    pub name: String,
}

/// Verdict recorded for a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    /// Hunk approved
    Approved,
    /// Reviewer asked for changes
    ChangesRequested,
}

/// Stored approval row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Row identifier
    pub id: Uuid,
    /// Pull request
    pub pull_request: PullRequestId,
    /// Hunk the verdict applies to
    pub hunk: HunkId,
    /// Reviewer login
    pub reviewer: String,
    /// Verdict
    pub state: ApprovalState,
    /// Commit the verdict was given against
    pub head_sha: String,
    /// Insertion time
    pub created_at: DateTime<Utc>,
}

/// GitHub commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    /// Review still in progress
    Pending,
    /// Every hunk approved
    Success,
    /// Changes requested somewhere
    Failure,
}

/// Commit status published back to GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitStatus {
    /// State
    pub state: StatusState,
    /// Short human-readable description
    pub description: String,
}

/// Approval progress of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProgress {
    /// Group identifier
    pub group: GroupId,
    /// Group name
    pub name: String,
    /// Hunks assigned to the group
    pub total: usize,
    /// Hunks whose latest verdict is an approval
    pub approved: usize,
    /// Hunks whose latest verdict requests changes
    pub changes_requested: usize,
}

impl GroupProgress {
    /// Whether every hunk in the group is approved.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.approved == self.total
    }
}

/// Review state of a pull request at its current head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Pull request
    pub pull_request: PullRequestId,
    /// Head commit the summary describes
    pub head_sha: String,
    /// Per-group progress, in group order
    pub groups: Vec<GroupProgress>,
    /// Diff hunks not assigned to any group
    pub unassigned: usize,
    /// Status derived from the progress
    pub status: CommitStatus,
}
