//! Review workflows
//!
//! Every function here only builds an [`Action`]; nothing runs until an
//! interpreter evaluates the result.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::action::{Action, LeafExt, traverse};

use super::actions::{
    AssignHunk, FetchApprovals, FetchDiffHunks, FetchGroups, FetchHunksForGroup,
    FetchPullRequest, GetHeader, GetRequestBody, InsertApproval, InsertGroup, SetCommitStatus,
};
use super::types::{
    Approval, ApprovalState, CommitStatus, Group, GroupId, GroupProgress, Hunk, HunkId,
    PullRequest, PullRequestId, ReviewSummary, StatusState,
};

/// Header carrying the authenticated reviewer login.
pub const REVIEWER_HEADER: &str = "X-Reviewer";

/// Body of a "create group" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    /// Group name
    pub name: String,
    /// Hunks to place in the group
    #[serde(default)]
    pub hunks: Vec<HunkId>,
}

/// The request body could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadRequest(pub String);

/// Login of the reviewer making the current request.
pub fn authenticated_user() -> Action<String> {
    GetHeader {
        name: REVIEWER_HEADER.to_string(),
    }
    .action()
}

/// Create a group and assign hunks to it.
pub fn create_group(
    pull_request: PullRequestId,
    name: impl Into<String>,
    hunks: Vec<HunkId>,
) -> Action<Group> {
    InsertGroup {
        pull_request,
        name: name.into(),
    }
    .action()
    .then(move |group: Group| {
        let id = group.id;
        traverse(hunks.clone(), |hunk| AssignHunk { group: id, hunk }.action()).replace(group)
    })
}

/// Create a group from the JSON body of the current request.
pub fn create_group_from_request(
    pull_request: PullRequestId,
) -> Action<Result<Group, BadRequest>> {
    GetRequestBody.action().then(move |body: String| {
        match serde_json::from_str::<CreateGroupRequest>(&body) {
            Ok(request) => {
                create_group(pull_request.clone(), request.name, request.hunks).map(Ok)
            }
            Err(err) => Action::pure(Err(BadRequest(err.to_string()))),
        }
    })
}

/// Record `state` from `reviewer` on every hunk of a group, then republish the
/// commit status.
///
/// Fails without recording anything when the group is unknown or belongs to
/// another pull request.
pub fn approve_group(
    pull_request: PullRequestId,
    group: GroupId,
    reviewer: String,
    state: ApprovalState,
) -> Action<CommitStatus> {
    let fetch_pr = FetchPullRequest {
        id: pull_request.clone(),
    }
    .action();
    let fetch_hunks = FetchHunksForGroup {
        pull_request: pull_request.clone(),
        group,
    }
    .action();

    fetch_pr
        .zip(fetch_hunks)
        .then(move |(pr, hunks): (PullRequest, Vec<HunkId>)| {
            let pull_request = pull_request.clone();
            let reviewer = reviewer.clone();
            let head_sha = pr.head_sha.clone();
            traverse(hunks, move |hunk| {
                InsertApproval {
                    pull_request: pull_request.clone(),
                    hunk,
                    reviewer: reviewer.clone(),
                    state,
                    head_sha: head_sha.clone(),
                }
                .action()
            })
            .followed_by(publish_status(pr))
        })
}

/// [`approve_group`] on behalf of the reviewer named in the request headers.
pub fn approve_group_for_request(
    pull_request: PullRequestId,
    group: GroupId,
    state: ApprovalState,
) -> Action<CommitStatus> {
    authenticated_user()
        .then(move |reviewer| approve_group(pull_request.clone(), group, reviewer, state))
}

/// Summarize review progress at the pull request's current head.
pub fn review_summary(pull_request: PullRequestId) -> Action<ReviewSummary> {
    FetchPullRequest { id: pull_request }
        .action()
        .then(summary_for)
}

/// Recompute the commit status and publish it to GitHub.
pub fn sync_status(pull_request: PullRequestId) -> Action<CommitStatus> {
    FetchPullRequest { id: pull_request }
        .action()
        .then(publish_status)
}

fn publish_status(pr: PullRequest) -> Action<CommitStatus> {
    let id = pr.id.clone();
    let sha = pr.head_sha.clone();
    summary_for(pr).then(move |summary: ReviewSummary| {
        SetCommitStatus {
            id: id.clone(),
            sha: sha.clone(),
            status: summary.status.clone(),
        }
        .action()
        .replace(summary.status)
    })
}

fn summary_for(pr: PullRequest) -> Action<ReviewSummary> {
    let groups = FetchGroups {
        pull_request: pr.id.clone(),
    }
    .action()
    .then(|groups: Vec<Group>| {
        traverse(groups, |group| {
            FetchHunksForGroup {
                pull_request: group.pull_request.clone(),
                group: group.id,
            }
            .action()
            .map(move |hunks| (group.clone(), hunks))
        })
    });
    let approvals = FetchApprovals {
        pull_request: pr.id.clone(),
        head_sha: pr.head_sha.clone(),
    }
    .action();
    let diff = FetchDiffHunks {
        id: pr.id.clone(),
        head_sha: pr.head_sha.clone(),
    }
    .action();

    groups
        .zip(approvals)
        .zip(diff)
        .map(move |((groups, approvals), diff)| summarize(&pr, &groups, &approvals, &diff))
}

/// Fold groups, verdicts and the diff into a summary.
///
/// The latest verdict per hunk counts; hunks no longer in the diff are ignored.
pub fn summarize(
    pr: &PullRequest,
    groups: &[(Group, Vec<HunkId>)],
    approvals: &[Approval],
    diff: &[Hunk],
) -> ReviewSummary {
    let in_diff: HashSet<&HunkId> = diff.iter().map(|hunk| &hunk.id).collect();

    let mut latest: HashMap<&HunkId, &Approval> = HashMap::new();
    for approval in approvals {
        latest
            .entry(&approval.hunk)
            .and_modify(|current| {
                if approval.created_at >= current.created_at {
                    *current = approval;
                }
            })
            .or_insert(approval);
    }

    let mut assigned: HashSet<&HunkId> = HashSet::new();
    let progress: Vec<GroupProgress> = groups
        .iter()
        .map(|(group, hunks)| {
            let live: Vec<&HunkId> = hunks.iter().filter(|id| in_diff.contains(id)).collect();
            assigned.extend(live.iter().copied());
            let verdict = |state: ApprovalState| {
                live.iter()
                    .filter(|id| latest.get(**id).is_some_and(|a| a.state == state))
                    .count()
            };
            GroupProgress {
                group: group.id,
                name: group.name.clone(),
                total: live.len(),
                approved: verdict(ApprovalState::Approved),
                changes_requested: verdict(ApprovalState::ChangesRequested),
            }
        })
        .collect();

    let unassigned = in_diff.len() - assigned.len();
    let status = derive_status(&progress, unassigned);

    ReviewSummary {
        pull_request: pr.id.clone(),
        head_sha: pr.head_sha.clone(),
        groups: progress,
        unassigned,
        status,
    }
}

/// Commit status for a set of group progress entries.
///
/// Any requested change fails the status; success needs every hunk grouped and
/// approved.
pub fn derive_status(groups: &[GroupProgress], unassigned: usize) -> CommitStatus {
    let total: usize = groups.iter().map(|g| g.total).sum::<usize>() + unassigned;
    let approved: usize = groups.iter().map(|g| g.approved).sum();
    let changes: usize = groups.iter().map(|g| g.changes_requested).sum();

    if changes > 0 {
        CommitStatus {
            state: StatusState::Failure,
            description: format!("changes requested on {} of {} hunks", changes, total),
        }
    } else if total > 0 && approved == total {
        CommitStatus {
            state: StatusState::Success,
            description: format!("all {} hunks approved", total),
        }
    } else {
        CommitStatus {
            state: StatusState::Pending,
            description: format!("{} of {} hunks approved", approved, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use uuid::Uuid;

    fn pr() -> PullRequest {
        PullRequest {
            id: PullRequestId::new("octo", "widgets", 7),
            title: "Add widgets".to_string(),
            author: "alice".to_string(),
            head_sha: "abc123".to_string(),
        }
    }

    fn hunk(file: &str, index: usize) -> Hunk {
        Hunk {
            id: HunkId::new(file, index),
            file: file.to_string(),
            header: "@@ -1,1 +1,1 @@".to_string(),
            body: "-a\n+b\n".to_string(),
        }
    }

    fn approval(hunk: &HunkId, state: ApprovalState, age_secs: i64) -> Approval {
        Approval {
            id: Uuid::new_v4(),
            pull_request: pr().id,
            hunk: hunk.clone(),
            reviewer: "bob".to_string(),
            state,
            head_sha: "abc123".to_string(),
            created_at: Utc::now() - TimeDelta::seconds(age_secs),
        }
    }

    #[test]
    fn test_summarize_counts_latest_verdict() {
        let diff = vec![hunk("a.rs", 0), hunk("a.rs", 1), hunk("b.rs", 0)];
        let group = Group {
            id: GroupId::new(),
            pull_request: pr().id,
            name: "core".to_string(),
        };
        let groups = vec![(group, vec![diff[0].id.clone(), diff[1].id.clone()])];
        let approvals = vec![
            approval(&diff[0].id, ApprovalState::ChangesRequested, 60),
            approval(&diff[0].id, ApprovalState::Approved, 10),
            approval(&diff[1].id, ApprovalState::Approved, 5),
        ];

        let summary = summarize(&pr(), &groups, &approvals, &diff);
        assert_eq!(summary.groups[0].approved, 2);
        assert_eq!(summary.groups[0].changes_requested, 0);
        assert!(summary.groups[0].is_complete());
        assert_eq!(summary.unassigned, 1);
        assert_eq!(summary.status.state, StatusState::Pending);
    }

    #[test]
    fn test_stale_hunks_are_ignored() {
        let diff = vec![hunk("a.rs", 0)];
        let group = Group {
            id: GroupId::new(),
            pull_request: pr().id,
            name: "core".to_string(),
        };
        let groups = vec![(group, vec![diff[0].id.clone(), HunkId::new("gone.rs", 0)])];
        let approvals = vec![approval(&diff[0].id, ApprovalState::Approved, 1)];

        let summary = summarize(&pr(), &groups, &approvals, &diff);
        assert_eq!(summary.groups[0].total, 1);
        assert_eq!(summary.status.state, StatusState::Success);
    }

    #[test]
    fn test_derive_status() {
        let progress = |total, approved, changes_requested| GroupProgress {
            group: GroupId::new(),
            name: "g".to_string(),
            total,
            approved,
            changes_requested,
        };

        assert_eq!(derive_status(&[], 0).state, StatusState::Pending);
        assert_eq!(derive_status(&[progress(2, 2, 0)], 0).state, StatusState::Success);
        assert_eq!(derive_status(&[progress(2, 2, 0)], 1).state, StatusState::Pending);
        assert_eq!(
            derive_status(&[progress(2, 1, 1), progress(1, 1, 0)], 0),
            CommitStatus {
                state: StatusState::Failure,
                description: "changes requested on 1 of 3 hunks".to_string(),
            }
        );
    }

    #[test]
    fn test_building_workflows_runs_nothing() {
        let id = pr().id;
        let approve = approve_group(id.clone(), GroupId::new(), "bob".into(), ApprovalState::Approved);
        let summary = review_summary(id);
        assert!(!approve.is_pure());
        assert!(!summary.is_pure());
    }
}
