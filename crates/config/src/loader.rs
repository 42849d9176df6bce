use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    Error, Result,
    env_subst::substitute_env,
    error::Context,
    schema::TandemConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["tandem.toml", "tandem.yaml", "tandem.yml", "tandem.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<TandemConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load `path` when given, otherwise the first config file in the standard
/// locations.
///
/// Search order:
/// 1. `./tandem.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/tandem/tandem.{toml,yaml,yml,json}` (user-global)
pub fn discover_and_load(path: Option<&Path>) -> Result<(PathBuf, TandemConfig)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config_file().with_context(|| {
            format!(
                "no config file found; create ./tandem.toml or {}",
                config_dir()
                    .map(|d| d.join("tandem.toml").display().to_string())
                    .unwrap_or_else(|| "tandem.toml".into())
            )
        })?,
    };
    debug!(path = %path.display(), "loading config");
    let config = load_config(&path)?;
    Ok((path, config))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/tandem/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tandem").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<TandemConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
