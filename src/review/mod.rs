//! Code-review domain built on actions
//!
//! Reviewers split a pull request's diff hunks into named groups and approve
//! them group by group; the resulting progress is published back to GitHub as a
//! commit status. Business logic lives in [`workflow`] as pure action builders.
//! [`memory`] provides in-memory collaborators that run them.

use std::time::Duration;

use crate::cache::{ActionCache, CacheBuilder};

/// Leaf actions for GitHub, the database and the request context.
pub mod actions;
/// In-memory collaborators.
pub mod memory;
/// Domain values.
pub mod types;
/// Workflows composed from review leaves.
pub mod workflow;

pub use actions::{
    AssignHunk, FetchApprovals, FetchDiffHunks, FetchGroups, FetchHunksForGroup,
    FetchPullRequest, GetHeader, GetRequestBody, InsertApproval, InsertGroup, SetCommitStatus,
};
pub use memory::{MemoryBackend, RequestContext};
pub use types::{
    Approval, ApprovalState, CommitStatus, Group, GroupId, GroupProgress, Hunk, HunkId,
    PullRequest, PullRequestId, ReviewSummary, StatusState,
};

/// Pull request metadata may change on push; keep it briefly.
pub const PULL_REQUEST_EXPIRY: Duration = Duration::from_secs(60);

/// A diff is fixed for a given head SHA, so it can live much longer.
pub const DIFF_EXPIRY: Duration = Duration::from_secs(600);

/// Cache declarations for review leaves.
///
/// Only GitHub reads are cacheable. Database and request-context leaves always
/// reach their handlers.
pub fn review_cache() -> CacheBuilder {
    ActionCache::builder()
        .expire::<FetchPullRequest>()
        .after_write(PULL_REQUEST_EXPIRY)
        .expire::<FetchDiffHunks>()
        .after_write(DIFF_EXPIRY)
}
