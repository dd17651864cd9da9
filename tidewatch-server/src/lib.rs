//! Tidewatch Server
//!
//! Hosts a [`tidewatch_core::FusionEngine`] behind a small REST/WebSocket
//! API and drives it from simulated radar and AIS feeds. Every long-running
//! part is a `tokio-graceful-shutdown` subsystem.

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tidewatch_core::EstimatorKind;

pub mod config;
pub mod feed;
pub mod reporter;
pub mod sim;
pub mod web;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// JSON configuration file, defaults to <config dir>/tidewatch/config.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Radar antenna latitude
    #[arg(long, allow_negative_numbers = true)]
    pub origin_lat: Option<f64>,

    /// Radar antenna longitude
    #[arg(long, allow_negative_numbers = true)]
    pub origin_lon: Option<f64>,

    /// Association gate in meters
    #[arg(long)]
    pub gate: Option<f64>,

    /// Seconds without update before a track is dropped
    #[arg(long)]
    pub max_age: Option<f64>,

    /// State estimator: linear or particle
    #[arg(long)]
    pub estimator: Option<EstimatorKind>,

    /// Port for the HTTP server
    #[arg(short, long, default_value_t = 8090)]
    pub port: u16,

    /// Number of simulated vessels
    #[arg(long, default_value_t = 8)]
    pub vessels: usize,

    /// Fraction of simulated vessels carrying an AIS transponder
    #[arg(long, default_value_t = 0.6)]
    pub ais_ratio: f64,

    /// Radar sweep interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Seconds between statistics log lines
    #[arg(long, default_value_t = 10)]
    pub report_secs: u64,

    /// Seed for the simulated fleet
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tidewatch-server"]);
        assert_eq!(cli.port, 8090);
        assert_eq!(cli.vessels, 8);
        assert_eq!(cli.ais_ratio, 0.6);
        assert_eq!(cli.interval_ms, 1000);
        assert!(cli.config.is_none());
        assert!(cli.estimator.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "tidewatch-server",
            "--origin-lat",
            "-33.86",
            "--origin-lon",
            "151.2",
            "--estimator",
            "particle",
            "--gate",
            "150",
            "-p",
            "9000",
        ]);
        assert_eq!(cli.origin_lat, Some(-33.86));
        assert_eq!(cli.origin_lon, Some(151.2));
        assert_eq!(cli.estimator, Some(EstimatorKind::Particle));
        assert_eq!(cli.gate, Some(150.0));
        assert_eq!(cli.port, 9000);
    }
}
