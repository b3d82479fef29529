//! Git history for the artifact file, via `git2`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Commit, DiffFormat, DiffOptions, ErrorCode, Index, Repository, Signature, Sort};
use pipeline::{Change, CommitSha, VcsError, VersionControl};
use tracing::{debug, info, instrument};

/// Identity used when the repository has no `user.name` / `user.email`.
const FALLBACK_AUTHOR: &str = "devloop";
const FALLBACK_EMAIL: &str = "devloop@localhost";

/// [`VersionControl`] over the Git repository enclosing the artifact.
///
/// Only the artifact path is ever staged, and history queries are limited to
/// commits touching it.
#[derive(Debug, Clone)]
pub struct GitRepository {
    workdir: PathBuf,
    /// Artifact path relative to `workdir`.
    artifact: PathBuf,
}

impl GitRepository {
    /// Opens the repository enclosing `root` and resolves `artifact`
    /// (relative to `root`, or absolute) against its working directory.
    pub fn open(root: impl AsRef<Path>, artifact: impl AsRef<Path>) -> Result<Self, VcsError> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|e| VcsError::Repository {
            message: format!("{}: {e}", root.as_ref().display()),
        })?;
        let repo = Repository::discover(&root).map_err(repository_error)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| VcsError::Repository {
                message: "bare repositories have no working copy".to_string(),
            })?
            .to_path_buf();

        let absolute = root.join(artifact.as_ref());
        let relative = absolute
            .strip_prefix(&workdir)
            .map_err(|_| VcsError::Repository {
                message: format!(
                    "artifact '{}' is outside the repository at '{}'",
                    absolute.display(),
                    workdir.display()
                ),
            })?
            .to_path_buf();

        debug!(workdir = %workdir.display(), artifact = %relative.display(), "git repository opened");
        Ok(Self {
            workdir,
            artifact: relative,
        })
    }

    fn artifact_label(&self) -> String {
        self.artifact.display().to_string()
    }
}

fn repository_error(err: git2::Error) -> VcsError {
    VcsError::Repository {
        message: err.message().to_string(),
    }
}

async fn blocking<T, F>(work: F) -> Result<T, VcsError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VcsError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| VcsError::Repository {
            message: format!("git task aborted: {e}"),
        })?
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, git2::Error> {
    match repo.head() {
        Ok(head) => head.peel_to_commit().map(Some),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Tree of HEAD with only the artifact entry replaced.
///
/// Whatever else is staged in the repository index stays staged and out of
/// the commit.
fn artifact_tree_id(
    repo: &Repository,
    parent: Option<&Commit<'_>>,
    artifact: &Path,
) -> Result<git2::Oid, git2::Error> {
    let mut index = repo.index()?;
    index.add_path(artifact)?;
    index.write()?;
    let entry = index
        .get_path(artifact, 0)
        .ok_or_else(|| git2::Error::from_str("artifact missing from the index after staging"))?;

    let mut scoped = Index::new()?;
    if let Some(parent) = parent {
        scoped.read_tree(&parent.tree()?)?;
    }
    scoped.add(&entry)?;
    scoped.write_tree_to(repo)
}

fn commit_blocking(workdir: &Path, artifact: &Path, message: &str) -> Result<CommitSha, VcsError> {
    let repo = Repository::open(workdir).map_err(repository_error)?;
    let parent = head_commit(&repo).map_err(repository_error)?;
    let tree_id = artifact_tree_id(&repo, parent.as_ref(), artifact).map_err(repository_error)?;
    let tree = repo.find_tree(tree_id).map_err(repository_error)?;

    if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
        return Err(VcsError::Repository {
            message: format!("nothing to commit for '{}'", artifact.display()),
        });
    }

    let signature = repo
        .signature()
        .or_else(|_| Signature::now(FALLBACK_AUTHOR, FALLBACK_EMAIL))
        .map_err(repository_error)?;
    let parents: Vec<&Commit<'_>> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .map_err(repository_error)?;

    CommitSha::new(oid.to_string()).ok_or_else(|| VcsError::Repository {
        message: "git returned an empty commit id".to_string(),
    })
}

fn render_patch(diff: &git2::Diff<'_>) -> Result<String, git2::Error> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_, _, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            text.push(line.origin());
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(text)
}

fn last_change_blocking(workdir: &Path, artifact: &Path) -> Result<Option<Change>, git2::Error> {
    let repo = Repository::open(workdir)?;
    if head_commit(&repo)?.is_none() {
        return Ok(None);
    }
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    walk.set_sorting(Sort::TIME)?;

    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let tree = commit.tree()?;
        // A root commit is diffed against the empty tree.
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let mut options = DiffOptions::new();
        options.pathspec(artifact);
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))?;
        if diff.deltas().len() == 0 {
            continue;
        }
        return Ok(Some(Change {
            sha: CommitSha::new(commit.id().to_string())
                .ok_or_else(|| git2::Error::from_str("empty commit id"))?,
            message: commit.message().unwrap_or_default().trim_end().to_string(),
            diff: render_patch(&diff)?,
        }));
    }
    Ok(None)
}

#[async_trait]
impl VersionControl for GitRepository {
    #[instrument(skip_all, fields(artifact = %self.artifact.display()))]
    async fn commit_artifact(&self, message: &str) -> Result<CommitSha, VcsError> {
        let workdir = self.workdir.clone();
        let artifact = self.artifact.clone();
        let message = message.to_string();
        let sha = blocking(move || commit_blocking(&workdir, &artifact, &message)).await?;
        info!(sha = %sha, "artifact committed");
        Ok(sha)
    }

    #[instrument(skip_all, fields(artifact = %self.artifact.display()))]
    async fn last_change(&self) -> Result<Change, VcsError> {
        let workdir = self.workdir.clone();
        let artifact = self.artifact.clone();
        let change = blocking(move || {
            last_change_blocking(&workdir, &artifact).map_err(repository_error)
        })
        .await?;
        match change {
            Some(change) => {
                debug!(sha = %change.sha, diff_bytes = change.diff.len(), "last artifact change found");
                Ok(change)
            }
            None => Err(VcsError::NoCommit {
                path: self.artifact_label(),
            }),
        }
    }
}
