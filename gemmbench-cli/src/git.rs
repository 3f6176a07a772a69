//! Git metadata for tagging results.

use crate::runner::{Invocation, RunError, ToolRunner};
use chrono::DateTime;
use gemmbench_core::CommitInfo;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git query failed: {0}")]
    Command(#[from] RunError),

    #[error("git returned no {0}")]
    Empty(&'static str),

    #[error("unparsable commit date '{value}': {source}")]
    Datetime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Look up the checked-out commit.
///
/// An explicit branch (as passed by CI, possibly `refs/heads/...`) takes
/// precedence over the local branch name.
pub fn discover_commit(
    runner: &dyn ToolRunner,
    branch_override: Option<&str>,
) -> Result<CommitInfo, GitError> {
    let id = git(runner, &["rev-parse", "HEAD"], "commit id")?;

    let raw_datetime = git(runner, &["log", "-1", "--format=%cI"], "commit date")?;
    let datetime =
        DateTime::parse_from_rfc3339(&raw_datetime).map_err(|source| GitError::Datetime {
            value: raw_datetime.clone(),
            source,
        })?;

    let branch = match branch_override {
        Some(branch) => strip_ref(branch).to_string(),
        None => git(runner, &["rev-parse", "--abbrev-ref", "HEAD"], "branch")?,
    };

    Ok(CommitInfo {
        id,
        datetime,
        branch,
    })
}

/// `refs/heads/main` -> `main`
pub fn strip_ref(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

fn git(runner: &dyn ToolRunner, args: &[&str], what: &'static str) -> Result<String, GitError> {
    let output = runner.run_checked(&Invocation::new("git").args(args.iter().copied()))?;
    let value = output.stdout.trim().to_string();
    if value.is_empty() {
        return Err(GitError::Empty(what));
    }
    Ok(value)
}
