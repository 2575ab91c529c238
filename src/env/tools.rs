//! Required external tool discovery.

use std::path::PathBuf;

use super::EnvError;
use crate::util::process::find_executable;

/// An executable the build cannot run without.
#[derive(Debug, Clone, Copy)]
pub struct RequiredTool {
    /// Configuration key holding the resolved path
    pub key: &'static str,
    /// Executable names tried in order
    pub names: &'static [&'static str],
}

/// Build generator, build-file interpreter and documentation generator.
pub const REQUIRED_TOOLS: &[RequiredTool] = &[
    RequiredTool {
        key: "CMAKE_EXECUTABLE",
        names: &["cmake"],
    },
    RequiredTool {
        key: "NINJA_EXECUTABLE",
        names: &["ninja", "ninja-build"],
    },
    RequiredTool {
        key: "DOXYGEN_EXECUTABLE",
        names: &["doxygen"],
    },
];

/// Locates executables by name.
pub trait ToolLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Searches `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        find_executable(name)
    }
}

impl<F> ToolLocator for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

impl RequiredTool {
    /// Resolve the absolute path of this tool.
    pub fn resolve(&self, locator: &dyn ToolLocator) -> Result<PathBuf, EnvError> {
        self.names
            .iter()
            .find_map(|name| locator.locate(name))
            .ok_or_else(|| EnvError::MissingTool {
                tool: self.names[0].to_string(),
                key: self.key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tries_alternate_names() {
        let locator = |name: &str| (name == "ninja-build").then(|| PathBuf::from("/usr/bin/ninja-build"));
        let ninja = REQUIRED_TOOLS[1];

        assert_eq!(ninja.resolve(&locator).unwrap(), PathBuf::from("/usr/bin/ninja-build"));
    }

    #[test]
    fn test_missing_tool_names_key() {
        let locator = |_: &str| -> Option<PathBuf> { None };
        let err = REQUIRED_TOOLS[2].resolve(&locator).unwrap_err();

        assert!(matches!(err, EnvError::MissingTool { .. }));
        let msg = err.to_string();
        assert!(msg.contains("doxygen"));
        assert!(msg.contains("missing from PATH"));
        assert!(msg.contains("DOXYGEN_EXECUTABLE"));
    }
}
