//! Review leaf actions
//!
//! One type per collaborator effect. Leaves carry their inputs only; the
//! GitHub client, the database layer and the request context supply handlers.

use crate::action::Leaf;

use super::types::{
    Approval, ApprovalState, CommitStatus, Group, GroupId, Hunk, HunkId, PullRequest,
    PullRequestId,
};

// ─── GitHub ──────────────────────────────────────────────────────────────────

/// Fetch pull request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchPullRequest {
    /// Pull request to fetch
    pub id: PullRequestId,
}

impl Leaf for FetchPullRequest {
    type Output = PullRequest;
}

/// Fetch the parsed diff of a pull request at a given head.
///
/// Keyed by head SHA, so the result never changes for a given leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchDiffHunks {
    /// Pull request
    pub id: PullRequestId,
    /// Head commit
    pub head_sha: String,
}

impl Leaf for FetchDiffHunks {
    type Output = Vec<Hunk>;
}

/// Publish a commit status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetCommitStatus {
    /// Pull request
    pub id: PullRequestId,
    /// Commit to attach the status to
    pub sha: String,
    /// Status to publish
    pub status: CommitStatus,
}

impl Leaf for SetCommitStatus {
    type Output = ();
}

// ─── Database ────────────────────────────────────────────────────────────────

/// List the groups defined on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchGroups {
    /// Pull request
    pub pull_request: PullRequestId,
}

impl Leaf for FetchGroups {
    type Output = Vec<Group>;
}

/// List the hunks assigned to a group of a pull request.
///
/// Fails when the group does not exist or belongs to another pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchHunksForGroup {
    /// Pull request the group is expected to belong to
    pub pull_request: PullRequestId,
    /// Group
    pub group: GroupId,
}

impl Leaf for FetchHunksForGroup {
    type Output = Vec<HunkId>;
}

/// Create a group. The store assigns its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertGroup {
    /// Pull request
    pub pull_request: PullRequestId,
    /// Display name
    pub name: String,
}

impl Leaf for InsertGroup {
    type Output = Group;
}

/// Assign a hunk to a group, moving it out of any previous group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignHunk {
    /// Target group
    pub group: GroupId,
    /// Hunk to assign
    pub hunk: HunkId,
}

impl Leaf for AssignHunk {
    type Output = ();
}

/// Record a verdict on a hunk. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertApproval {
    /// Pull request
    pub pull_request: PullRequestId,
    /// Hunk
    pub hunk: HunkId,
    /// Reviewer login
    pub reviewer: String,
    /// Verdict
    pub state: ApprovalState,
    /// Commit the verdict applies to
    pub head_sha: String,
}

impl Leaf for InsertApproval {
    type Output = Approval;
}

/// List verdicts given against a head commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchApprovals {
    /// Pull request
    pub pull_request: PullRequestId,
    /// Head commit
    pub head_sha: String,
}

impl Leaf for FetchApprovals {
    type Output = Vec<Approval>;
}

// ─── Request context ─────────────────────────────────────────────────────────

/// Read a request header. A missing header yields no result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GetHeader {
    /// Header name (case-insensitive)
    pub name: String,
}

impl Leaf for GetHeader {
    type Output = String;
}

/// Read the raw request body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GetRequestBody;

impl Leaf for GetRequestBody {
    type Output = String;
}
