//! Release version derivation from git metadata.
//!
//! A tag description `<tag>-<N>-g<hash>[-dirty]` becomes
//! `<base>[.dev<N>][+g<hash>[.dirty]]`, where `<base>` is the tag with a
//! single leading `v` removed and prerelease labels normalized
//! (`alpha`/`a` to `a`, `beta`/`b` to `b`, `rc` to `rc`).

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use git2::{DescribeFormatOptions, DescribeOptions, Repository};
use regex::Regex;

use super::EnvError;

static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<tag>.+)-(?P<distance>\d+)-g(?P<hash>[0-9a-f]+)(?P<dirty>-dirty)?$").unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<base>\d+(?:\.\d+)*)(?:[-_.]?(?P<label>alpha|beta|rc|a|b)[-_.]?(?P<num>\d+))?$",
    )
    .unwrap()
});

/// Parsed long-form `git describe --tags` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescription {
    pub tag: String,
    /// Commits since the tag
    pub distance: u32,
    /// Abbreviated commit hash, without the `g` prefix
    pub hash: String,
    /// Working tree has uncommitted changes
    pub dirty: bool,
}

impl TagDescription {
    pub fn parse(description: &str) -> Result<Self, EnvError> {
        let caps = DESCRIPTION_RE
            .captures(description.trim())
            .ok_or_else(|| EnvError::UnrecognizedTag {
                tag: description.to_string(),
            })?;

        let distance = caps["distance"]
            .parse()
            .map_err(|_| EnvError::UnrecognizedTag {
                tag: description.to_string(),
            })?;

        Ok(TagDescription {
            tag: caps["tag"].to_string(),
            distance,
            hash: caps["hash"].to_string(),
            dirty: caps.name("dirty").is_some(),
        })
    }

    /// Release version string for this description.
    pub fn release_version(&self) -> Result<String, EnvError> {
        let mut version = normalize_tag(&self.tag)?;

        if self.distance > 0 {
            version.push_str(&format!(".dev{}", self.distance));
        }
        if self.distance > 0 || self.dirty {
            version.push_str(&format!("+g{}", self.hash));
            if self.dirty {
                version.push_str(".dirty");
            }
        }

        Ok(version)
    }
}

/// Strip a leading `v` and normalize the prerelease segment of a tag.
pub fn normalize_tag(tag: &str) -> Result<String, EnvError> {
    let stripped = tag.strip_prefix('v').unwrap_or(tag);
    let caps = TAG_RE
        .captures(stripped)
        .ok_or_else(|| EnvError::UnrecognizedTag {
            tag: tag.to_string(),
        })?;

    let mut version = caps["base"].to_string();
    if let (Some(label), Some(num)) = (caps.name("label"), caps.name("num")) {
        let label = match label.as_str() {
            "alpha" | "a" => "a",
            "beta" | "b" => "b",
            _ => "rc",
        };
        let num: u64 = num.as_str().parse().map_err(|_| EnvError::UnrecognizedTag {
            tag: tag.to_string(),
        })?;
        version.push_str(&format!("{label}{num}"));
    }

    Ok(version)
}

/// Describe the working tree of the repository at `path`.
///
/// Returns `None` when `path` is not a repository or no tag is reachable.
pub fn describe_source(path: &Path) -> Result<Option<TagDescription>> {
    let Ok(repo) = Repository::open(path) else {
        return Ok(None);
    };

    let mut describe_opts = DescribeOptions::new();
    describe_opts.describe_tags();
    let describe = match repo.describe(&describe_opts) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("no tag to describe {}: {}", path.display(), e);
            return Ok(None);
        }
    };

    let mut format_opts = DescribeFormatOptions::new();
    format_opts.always_use_long_format(true).dirty_suffix("-dirty");
    let text = describe.format(Some(&format_opts))?;

    Ok(Some(TagDescription::parse(&text)?))
}

/// Release version of the source tree, if it is a tagged git checkout.
///
/// A nearest tag that is not a release version (`nightly`, `latest`) is
/// treated like no tag at all.
pub fn source_version(path: &Path) -> Result<Option<String>> {
    let Some(desc) = describe_source(path)? else {
        return Ok(None);
    };

    match desc.release_version() {
        Ok(version) => Ok(Some(version)),
        Err(EnvError::UnrecognizedTag { tag }) => {
            tracing::warn!(
                "tag `{}` in {} is not a release version, ignoring it",
                tag,
                path.display()
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Human-facing reference of HEAD: exact tag, else branch, else short revision.
pub fn source_ref(path: &Path) -> Result<Option<String>> {
    let Ok(repo) = Repository::open(path) else {
        return Ok(None);
    };
    let Ok(head) = repo.head() else {
        // Unborn HEAD
        return Ok(None);
    };
    let commit = head.peel_to_commit()?;

    let mut exact = DescribeOptions::new();
    exact.describe_tags().max_candidates_tags(0);
    if let Ok(describe) = commit.as_object().describe(&exact) {
        return Ok(Some(describe.format(None)?));
    }

    if head.is_branch() {
        if let Some(branch) = head.shorthand() {
            return Ok(Some(branch.to_string()));
        }
    }

    let short = commit.as_object().short_id()?;
    Ok(short.as_str().map(str::to_string))
}
