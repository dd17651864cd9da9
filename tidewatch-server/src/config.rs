//! Configuration loading
//!
//! The core only accepts a validated [`FusionConfig`]; this module finds
//! the JSON file, fills in defaults and applies command line overrides.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use miette::Diagnostic;
use thiserror::Error;
use tidewatch_core::{ConfigError, FusionConfig};

use crate::Cli;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("cannot read {}", .path.display())]
    #[diagnostic(code(tidewatch::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}", .path.display())]
    #[diagnostic(
        code(tidewatch::config::parse),
        help("the file must be a JSON object with camelCase keys such as associationDistanceM")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration")]
    #[diagnostic(code(tidewatch::config::invalid))]
    Invalid(#[from] ConfigError),
}

/// `<user config dir>/tidewatch/config.json`, if the platform has one
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "tidewatch").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Read a configuration file; keys that are absent keep their defaults
pub fn load_file(path: &Path) -> Result<FusionConfig, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the fusion configuration for this run.
///
/// An explicit `--config` file must exist. The default file is optional.
/// Command line overrides are applied last and the result is validated.
pub fn load(args: &Cli) -> Result<FusionConfig, LoadError> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            load_file(path)?
        }
        None => match default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading configuration from {}", path.display());
                load_file(&path)?
            }
            _ => {
                log::debug!("No configuration file, using defaults");
                FusionConfig::default()
            }
        },
    };

    apply_overrides(&mut config, args);
    config.validate()?;
    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

fn apply_overrides(config: &mut FusionConfig, args: &Cli) {
    if let Some(lat) = args.origin_lat {
        config.origin.lat = lat;
    }
    if let Some(lon) = args.origin_lon {
        config.origin.lon = lon;
    }
    if let Some(gate) = args.gate {
        config.association_distance_m = gate;
    }
    if let Some(max_age) = args.max_age {
        config.max_age_seconds = max_age;
    }
    if let Some(kind) = args.estimator {
        config.estimator.kind = kind;
    }
}
