//! Configuration loading, env substitution, and validation.
//!
//! Config files: `tandem.toml`, `tandem.yaml`, `tandem.yml`, or `tandem.json`,
//! searched in `./` then `~/.config/tandem/`.
//!
//! Supports `${ENV_VAR}` substitution anywhere in the file.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{DiscordSection, IrcSection, RelayEntry, RelayRule, SyncEntry, TandemConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
