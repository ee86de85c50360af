//! In-memory collaborators
//!
//! A self-contained stand-in for the GitHub client, the relational store and
//! the HTTP request context. Each collaborator contributes its own
//! [`Interpreter`]; [`MemoryBackend::interpreter`] merges them the same way
//! production wiring would.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::interpreter::Interpreter;

use super::actions::{
    AssignHunk, FetchApprovals, FetchDiffHunks, FetchGroups, FetchHunksForGroup,
    FetchPullRequest, GetHeader, GetRequestBody, InsertApproval, InsertGroup, SetCommitStatus,
};
use super::types::{
    Approval, CommitStatus, Group, GroupId, Hunk, HunkId, PullRequest, PullRequestId,
};

#[derive(Debug, Default)]
struct MemoryState {
    pull_requests: HashMap<PullRequestId, PullRequest>,
    diffs: HashMap<(PullRequestId, String), Vec<Hunk>>,
    groups: Vec<Group>,
    /// Hunk ids are only unique within a pull request.
    assignments: HashMap<(PullRequestId, HunkId), GroupId>,
    approvals: Vec<Approval>,
    statuses: HashMap<(PullRequestId, String), CommitStatus>,
}

/// In-memory GitHub and database state. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

/// Headers and body of the request being served.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
    body: String,
}

impl RequestContext {
    /// Empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header; names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Handlers for the request-context leaves.
    pub fn interpreter(&self) -> Interpreter {
        let headers = self.headers.clone();
        let body = self.body.clone();
        Interpreter::new()
            .on::<GetHeader>()
            .apply_optional(move |leaf| Ok(headers.get(&leaf.name.to_ascii_lowercase()).cloned()))
            .on::<GetRequestBody>()
            .returns(body)
    }
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pull request and its diff at the current head.
    pub fn add_pull_request(&self, pull_request: PullRequest, hunks: Vec<Hunk>) {
        let mut state = self.state.write();
        state
            .diffs
            .insert((pull_request.id.clone(), pull_request.head_sha.clone()), hunks);
        state
            .pull_requests
            .insert(pull_request.id.clone(), pull_request);
    }

    /// Move a pull request to a new head commit with a new diff.
    pub fn push(&self, id: &PullRequestId, head_sha: &str, hunks: Vec<Hunk>) -> anyhow::Result<()> {
        let mut state = self.state.write();
        let pull_request = state
            .pull_requests
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("unknown pull request {}", id))?;
        pull_request.head_sha = head_sha.to_string();
        state.diffs.insert((id.clone(), head_sha.to_string()), hunks);
        Ok(())
    }

    /// Last status published for a commit.
    pub fn status(&self, id: &PullRequestId, sha: &str) -> Option<CommitStatus> {
        self.state
            .read()
            .statuses
            .get(&(id.clone(), sha.to_string()))
            .cloned()
    }

    /// Every stored approval row.
    pub fn approvals(&self) -> Vec<Approval> {
        self.state.read().approvals.clone()
    }

    /// Every stored group.
    pub fn groups(&self) -> Vec<Group> {
        self.state.read().groups.clone()
    }

    /// Handlers backed by the fake GitHub state.
    pub fn github(&self) -> Interpreter {
        let prs = self.state.clone();
        let diffs = self.state.clone();
        let statuses = self.state.clone();
        Interpreter::new()
            .on::<FetchPullRequest>()
            .apply_optional(move |leaf| Ok(prs.read().pull_requests.get(&leaf.id).cloned()))
            .on::<FetchDiffHunks>()
            .apply(move |leaf| {
                diffs
                    .read()
                    .diffs
                    .get(&(leaf.id.clone(), leaf.head_sha.clone()))
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no diff for {} at {}", leaf.id, leaf.head_sha))
            })
            .on::<SetCommitStatus>()
            .apply(move |leaf| {
                tracing::info!(
                    pull_request = %leaf.id,
                    sha = %leaf.sha,
                    state = ?leaf.status.state,
                    "publishing commit status"
                );
                statuses
                    .write()
                    .statuses
                    .insert((leaf.id.clone(), leaf.sha.clone()), leaf.status.clone());
                Ok(())
            })
    }

    /// Handlers backed by the fake relational store.
    pub fn database(&self) -> Interpreter {
        let groups = self.state.clone();
        let hunks = self.state.clone();
        let insert_group = self.state.clone();
        let assign = self.state.clone();
        let insert_approval = self.state.clone();
        let approvals = self.state.clone();

        Interpreter::new()
            .on::<FetchGroups>()
            .apply(move |leaf| {
                Ok(groups
                    .read()
                    .groups
                    .iter()
                    .filter(|group| group.pull_request == leaf.pull_request)
                    .cloned()
                    .collect())
            })
            .on::<FetchHunksForGroup>()
            .apply(move |leaf| {
                let state = hunks.read();
                let owner = state
                    .groups
                    .iter()
                    .find(|group| group.id == leaf.group)
                    .map(|group| &group.pull_request)
                    .ok_or_else(|| anyhow::anyhow!("unknown group {}", leaf.group))?;
                if *owner != leaf.pull_request {
                    anyhow::bail!(
                        "group {} belongs to {}, not {}",
                        leaf.group,
                        owner,
                        leaf.pull_request
                    );
                }
                let mut ids: Vec<HunkId> = state
                    .assignments
                    .iter()
                    .filter(|(_, group)| **group == leaf.group)
                    .map(|((_, hunk), _)| hunk.clone())
                    .collect();
                ids.sort();
                Ok(ids)
            })
            .on::<InsertGroup>()
            .apply(move |leaf| {
                let mut state = insert_group.write();
                if !state.pull_requests.contains_key(&leaf.pull_request) {
                    anyhow::bail!("unknown pull request {}", leaf.pull_request);
                }
                let group = Group {
                    id: GroupId::new(),
                    pull_request: leaf.pull_request.clone(),
                    name: leaf.name.clone(),
                };
                state.groups.push(group.clone());
                Ok(group)
            })
            .on::<AssignHunk>()
            .apply(move |leaf| {
                let mut state = assign.write();
                let pull_request = state
                    .groups
                    .iter()
                    .find(|group| group.id == leaf.group)
                    .map(|group| group.pull_request.clone())
                    .ok_or_else(|| anyhow::anyhow!("unknown group {}", leaf.group))?;
                state
                    .assignments
                    .insert((pull_request, leaf.hunk.clone()), leaf.group);
                Ok(())
            })
            .on::<InsertApproval>()
            .apply(move |leaf| {
                let approval = Approval {
                    id: Uuid::new_v4(),
                    pull_request: leaf.pull_request.clone(),
                    hunk: leaf.hunk.clone(),
                    reviewer: leaf.reviewer.clone(),
                    state: leaf.state,
                    head_sha: leaf.head_sha.clone(),
                    created_at: Utc::now(),
                };
                insert_approval.write().approvals.push(approval.clone());
                Ok(approval)
            })
            .on::<FetchApprovals>()
            .apply(move |leaf| {
                Ok(approvals
                    .read()
                    .approvals
                    .iter()
                    .filter(|a| a.pull_request == leaf.pull_request && a.head_sha == leaf.head_sha)
                    .cloned()
                    .collect())
            })
    }

    /// Complete dispatch table for one request.
    pub fn interpreter(&self, request: &RequestContext) -> Interpreter {
        Interpreter::merge([self.github(), self.database(), request.interpreter()])
    }
}
