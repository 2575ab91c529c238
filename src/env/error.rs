//! Configuration errors.

use thiserror::Error;

/// Fatal configuration problems found while resolving the environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("malformed override `{entry}`: expected KEY=VALUE with KEY matching [A-Za-z_][A-Za-z0-9_]*")]
    MalformedOverride { entry: String },

    #[error("required tool `{tool}` is missing from PATH (install it or set {key})")]
    MissingTool { tool: String, key: String },

    #[error("unsupported platform `{os}`")]
    UnsupportedPlatform { os: String },

    #[error("unrecognized release tag `{tag}`")]
    UnrecognizedTag { tag: String },

    #[error("malformed module specification `{segment}`: expected org/repo@tag")]
    MalformedModuleSpec { segment: String },
}
