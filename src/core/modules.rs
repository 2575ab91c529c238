//! Remote module dependencies.
//!
//! A module specification is a colon-delimited list of
//! `org/repo@tag` entries, e.g. `InsightSoftwareConsortium/ITKFoo@v1.0:me/Bar@main`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::Repository;

use crate::env::EnvError;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};

/// Host that module repositories are cloned from.
pub const MODULE_GIT_HOST: &str = "https://github.com";

/// One remote module pinned to a git reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModule {
    pub org: String,
    pub repo: String,
    pub tag: String,
}

impl RemoteModule {
    /// Clone URL of the module repository.
    pub fn url(&self) -> String {
        format!("{}/{}/{}.git", MODULE_GIT_HOST, self.org, self.repo)
    }

    fn parse(segment: &str) -> Result<Self, EnvError> {
        let malformed = || EnvError::MalformedModuleSpec {
            segment: segment.to_string(),
        };

        let (path, tag) = segment.split_once('@').ok_or_else(malformed)?;
        let (org, repo) = path.split_once('/').ok_or_else(malformed)?;

        if org.is_empty() || repo.is_empty() || tag.is_empty() || repo.contains('/') {
            return Err(malformed());
        }

        Ok(RemoteModule {
            org: org.to_string(),
            repo: repo.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for RemoteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.org, self.repo, self.tag)
    }
}

/// Parse a colon-delimited module specification.
pub fn parse_module_specs(spec: &str) -> Result<Vec<RemoteModule>, EnvError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(Vec::new());
    }

    spec.split(':').map(|s| RemoteModule::parse(s.trim())).collect()
}

/// Clone a module into `dest_root/<repo>` and check out its tag.
///
/// Any previous checkout is discarded first.
pub fn fetch_module(module: &RemoteModule, dest_root: &Path) -> Result<PathBuf> {
    let checkout_path = dest_root.join(&module.repo);
    remove_dir_all_if_exists(&checkout_path)?;
    ensure_dir(dest_root)?;

    tracing::info!("Cloning {}", module.url());

    let repo = Repository::clone(&module.url(), &checkout_path)
        .with_context(|| format!("failed to clone {}", module.url()))?;

    let object = repo
        .revparse_single(&module.tag)
        .or_else(|_| repo.revparse_single(&format!("origin/{}", module.tag)))
        .with_context(|| format!("reference `{}` not found in {}", module.tag, module.url()))?;
    let commit = object.peel_to_commit()?;

    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
        .with_context(|| format!("failed to check out {}", module))?;
    repo.set_head_detached(commit.id())?;

    tracing::debug!("{} at {}", module, commit.id());

    Ok(checkout_path)
}
