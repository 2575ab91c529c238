//! Implementation of `wheelwright env`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;

use crate::core::HostPlatform;
use crate::env::{
    keys, load_settings, parse_overrides, EnvLayers, EnvResolver, PathLocator, ResolvedEnv,
    ToolLocator,
};
use crate::util::config::Config;
use crate::util::GlobalContext;

/// Options for the env command.
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    /// Settings file to start from
    pub input: Option<PathBuf>,

    /// Where to write the resolved settings
    pub output: Option<PathBuf>,

    /// Trailing `KEY=VALUE` overrides
    pub overrides: Vec<String>,
}

/// Resolve configuration for this invocation.
pub fn resolve_env(
    ctx: &GlobalContext,
    config: &Config,
    input: Option<&Path>,
    overrides: &[String],
    locator: &dyn ToolLocator,
) -> Result<ResolvedEnv> {
    let layers = explicit_layers(ctx, config, input, overrides)?;

    let mut resolver = EnvResolver::new(HostPlatform::detect(), ctx.cwd(), locator);
    if let Some(build_type) = &config.build.build_type {
        resolver = resolver.with_build_type(build_type);
    }

    let env = resolver.resolve(&layers)?;
    tracing::debug!("resolved {} configuration keys", env.len());
    Ok(env)
}

/// Build root as `build` would see it, without tool discovery or git
/// inspection: `BUILD_DIR_ROOT`, else `<SOURCE_DIR>/build`, else `build/`
/// under the working directory.
pub fn locate_build_root(ctx: &GlobalContext, config: &Config, input: Option<&Path>) -> Result<PathBuf> {
    let layers = explicit_layers(ctx, config, input, &[])?;

    if let Some(root) = layers.lookup(keys::BUILD_DIR_ROOT) {
        return Ok(ctx.resolve_path(Path::new(root)));
    }
    let source = layers
        .lookup(keys::SOURCE_DIR)
        .map(|s| ctx.resolve_path(Path::new(s)))
        .unwrap_or_else(|| ctx.cwd().to_path_buf());
    Ok(source.join("build"))
}

/// Config, process environment, settings file and overrides.
///
/// This is the only place the process environment is read.
fn explicit_layers(
    ctx: &GlobalContext,
    config: &Config,
    input: Option<&Path>,
    overrides: &[String],
) -> Result<EnvLayers> {
    let overrides = parse_overrides(overrides)?;

    let file = match input {
        Some(path) => load_settings(&ctx.resolve_path(path))?,
        None => IndexMap::new(),
    };

    Ok(EnvLayers {
        config: config.env.clone(),
        file,
        overrides,
        ..EnvLayers::default()
    }
    .with_process_environment(std::env::vars_os().filter_map(|(k, v)| {
        Some((k.into_string().ok()?, v.into_string().ok()?))
    })))
}

/// Resolve configuration and write it out if an output path was given.
pub fn generate_env(ctx: &GlobalContext, opts: &EnvOptions) -> Result<ResolvedEnv> {
    let config = ctx.load_config()?;
    let env = resolve_env(ctx, &config, opts.input.as_deref(), &opts.overrides, &PathLocator)?;

    if let Some(output) = &opts.output {
        env.write_to(&ctx.resolve_path(output))?;
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvError;
    use std::fs;
    use tempfile::TempDir;

    fn tools(name: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/opt/bin").join(name))
    }

    fn context(tmp: &TempDir) -> GlobalContext {
        GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .without_global_config()
    }

    #[test]
    fn test_file_and_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("in.env"), "WW_TEST_KEY=2\nBUILD_TYPE=Debug\n").unwrap();
        let ctx = context(&tmp);
        let config = Config::default();

        let env = resolve_env(&ctx, &config, Some(Path::new("in.env")), &[], &tools).unwrap();
        assert_eq!(env.get("WW_TEST_KEY"), Some("2"));
        assert_eq!(env.get(keys::BUILD_TYPE), Some("Debug"));
        assert_eq!(env.get(keys::SOURCE_DIR), Some(tmp.path().to_str().unwrap()));
        assert_eq!(env.get(keys::CMAKE_EXECUTABLE), Some("/opt/bin/cmake"));

        let overrides = vec!["WW_TEST_KEY=3".to_string(), "BUILD_TYPE=UNSET".to_string()];
        let env = resolve_env(&ctx, &config, Some(Path::new("in.env")), &overrides, &tools).unwrap();
        assert_eq!(env.get("WW_TEST_KEY"), Some("3"));
        assert_eq!(env.get(keys::BUILD_TYPE), None);
    }

    #[test]
    fn test_inherited_variable_without_file_or_override() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        std::env::set_var("WW_INHERITED_ONLY", "1");

        let env = resolve_env(&ctx, &Config::default(), None, &[], &tools).unwrap();
        assert_eq!(env.get("WW_INHERITED_ONLY"), Some("1"));

        fs::write(tmp.path().join("in.env"), "WW_INHERITED_ONLY=2\n").unwrap();
        let env = resolve_env(&ctx, &Config::default(), Some(Path::new("in.env")), &[], &tools).unwrap();
        assert_eq!(env.get("WW_INHERITED_ONLY"), Some("2"));

        let overrides = vec!["WW_INHERITED_ONLY=3".to_string()];
        let env = resolve_env(&ctx, &Config::default(), Some(Path::new("in.env")), &overrides, &tools)
            .unwrap();
        assert_eq!(env.get("WW_INHERITED_ONLY"), Some("3"));

        std::env::remove_var("WW_INHERITED_ONLY");
    }

    #[test]
    fn test_config_supplies_defaults() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let mut config = Config::default();
        config.build.build_type = Some("RelWithDebInfo".to_string());
        config
            .env
            .insert("REUSE_BUILD_CACHE".to_string(), "ON".to_string());

        let env = resolve_env(&ctx, &config, None, &[], &tools).unwrap();
        assert_eq!(env.get(keys::BUILD_TYPE), Some("RelWithDebInfo"));
        assert!(env.get_bool(keys::REUSE_BUILD_CACHE));
    }

    #[test]
    fn test_malformed_override_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let overrides = vec!["1BAD=x".to_string()];

        let err = resolve_env(&ctx, &Config::default(), None, &overrides, &tools).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EnvError>(),
            Some(EnvError::MalformedOverride { .. })
        ));
    }

    #[test]
    fn test_locate_build_root() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let mut config = Config::default();

        assert_eq!(locate_build_root(&ctx, &config, None).unwrap(), tmp.path().join("build"));

        config.env.insert("SOURCE_DIR".to_string(), "src".to_string());
        assert_eq!(
            locate_build_root(&ctx, &config, None).unwrap(),
            tmp.path().join("src").join("build")
        );

        config.env.insert("BUILD_DIR_ROOT".to_string(), "out".to_string());
        assert_eq!(locate_build_root(&ctx, &config, None).unwrap(), tmp.path().join("out"));

        // A settings file outranks the config file
        fs::write(tmp.path().join("ci.env"), "BUILD_DIR_ROOT=/ci/build\n").unwrap();
        assert_eq!(
            locate_build_root(&ctx, &config, Some(Path::new("ci.env"))).unwrap(),
            PathBuf::from("/ci/build")
        );
    }

    #[test]
    fn test_generate_env_writes_output() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let opts = EnvOptions {
            input: None,
            output: Some(PathBuf::from("out/build.env")),
            overrides: vec![
                "CMAKE_EXECUTABLE=/x/cmake".to_string(),
                "NINJA_EXECUTABLE=/x/ninja".to_string(),
                "DOXYGEN_EXECUTABLE=/x/doxygen".to_string(),
            ],
        };

        let env = generate_env(&ctx, &opts).unwrap();
        let written = load_settings(&tmp.path().join("out/build.env")).unwrap();
        assert_eq!(written.get("NINJA_EXECUTABLE").map(String::as_str), Some("/x/ninja"));
        assert_eq!(written.len(), env.len());
    }
}
