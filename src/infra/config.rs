use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::diff::{DEFAULT_CONTEXT_LINES, DEFAULT_LOOKAHEAD, DiffAlgorithmKind};

/// Config file names probed under the root, first match wins
pub const CONFIG_FILES: [&str; 2] = ["goai-edit.toml", ".goai/edit.toml"];

/// Prefix for environment overrides, e.g. `GOAI_EDIT__BACKUP__MAX_PER_FILE=20`
pub const ENV_PREFIX: &str = "GOAI_EDIT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config
{
    /// Backup store settings
    pub backup: BackupConfig,

    /// Diff rendering settings
    pub diff: DiffConfig,

    /// Path policy and edit serialization
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig
{
    /// Backup directory, relative to the root
    pub dir: PathBuf,
    /// Backups kept per file basename
    pub max_per_file: usize,
    /// Age after which `sweep` deletes backups
    pub retention_days: i64,
    /// Write a `.meta` JSON sidecar next to each backup
    pub write_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig
{
    pub algorithm: DiffAlgorithmKind,
    pub context_lines: usize,
    /// Resync window for the lookahead algorithm
    pub lookahead: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig
{
    /// Globs (relative to the root) that edits may never touch
    pub forbidden_paths: Vec<String>,
    /// Hold a per-path lock file for the whole edit
    pub serialize_edits: bool,
    /// Lock file directory, relative to the root
    pub lock_dir: PathBuf,
}

impl Default for BackupConfig
{
    fn default() -> Self
    {
        Self {
            dir: PathBuf::from(".goai/backups"),
            max_per_file: 10,
            retention_days: 7,
            write_metadata: true,
        }
    }
}

impl Default for DiffConfig
{
    fn default() -> Self
    {
        Self {
            algorithm: DiffAlgorithmKind::default(),
            context_lines: DEFAULT_CONTEXT_LINES,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

impl Default for SafetyConfig
{
    fn default() -> Self
    {
        Self {
            forbidden_paths: vec![".goai/**".to_string(), ".git/**".to_string()],
            serialize_edits: true,
            lock_dir: PathBuf::from(".goai/locks"),
        }
    }
}

/// Load `<root>/goai-edit.toml` (or `.goai/edit.toml`) overlaid with
/// `GOAI_EDIT__*` environment variables. Missing files mean defaults.
pub fn load_config(root: &Path) -> Result<Config>
{
    load_with_env(root, env_source())
}

fn env_source() -> config::Environment
{
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("safety.forbidden_paths")
}

fn load_with_env(
    root: &Path,
    env: config::Environment,
) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = find_config_file(root)
    {
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(env);

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// First existing config file under `root`
pub fn find_config_file(root: &Path) -> Option<PathBuf>
{
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.is_file())
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let root = args
        .path
        .as_deref()
        .unwrap_or(&ctx.root);
    let config_path = root.join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env() -> config::Environment
    {
        env_source().source(Some(HashMap::new()))
    }

    #[test]
    fn defaults_without_file()
    {
        let tmp = TempDir::new().unwrap();
        let cfg = load_with_env(tmp.path(), no_env()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.backup.max_per_file, 10);
        assert_eq!(cfg.backup.retention_days, 7);
        assert_eq!(cfg.diff.context_lines, 3);
    }

    #[test]
    fn file_values_override_defaults()
    {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path()
                .join("goai-edit.toml"),
            "[backup]\nmax_per_file = 3\n\n[diff]\nalgorithm = \"myers\"\n",
        )
        .unwrap();

        let cfg = load_with_env(tmp.path(), no_env()).unwrap();
        assert_eq!(cfg.backup.max_per_file, 3);
        assert_eq!(cfg.diff.algorithm, DiffAlgorithmKind::Myers);
        // Untouched keys keep their defaults
        assert_eq!(cfg.backup.retention_days, 7);
        assert!(cfg.safety.serialize_edits);
    }

    #[test]
    fn dot_goai_file_is_found()
    {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(
            tmp.path()
                .join(".goai"),
        )
        .unwrap();
        std::fs::write(
            tmp.path()
                .join(".goai/edit.toml"),
            "[safety]\nserialize_edits = false\n",
        )
        .unwrap();

        let cfg = load_with_env(tmp.path(), no_env()).unwrap();
        assert!(!cfg.safety.serialize_edits);
    }

    #[test]
    fn environment_overrides_file()
    {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path()
                .join("goai-edit.toml"),
            "[backup]\nmax_per_file = 3\n",
        )
        .unwrap();

        let env = HashMap::from([
            ("GOAI_EDIT__BACKUP__MAX_PER_FILE".to_string(), "5".to_string()),
            (
                "GOAI_EDIT__SAFETY__FORBIDDEN_PATHS".to_string(),
                "secrets/**,.git/**".to_string(),
            ),
        ]);
        let cfg = load_with_env(tmp.path(), env_source().source(Some(env))).unwrap();
        assert_eq!(cfg.backup.max_per_file, 5);
        assert_eq!(cfg.safety.forbidden_paths, vec!["secrets/**", ".git/**"]);
    }

    #[test]
    fn defaults_serialize_to_toml()
    {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("[backup]"));
        assert!(text.contains("algorithm = \"lookahead\""));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, Config::default());
    }
}
