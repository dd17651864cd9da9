//! Sensor feeds
//!
//! Each feed is a subsystem that wakes on its own interval, asks the fleet
//! for a round of contacts and hands them to the fusion engine. The radar
//! feed also moves the fleet, so vessels advance once per sweep.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;
use tidewatch_core::FusionEngine;

use crate::sim::Fleet;

pub type SharedFleet = Arc<Mutex<Fleet>>;

/// AIS class A reports roughly every other radar sweep at these speeds
pub const AIS_INTERVAL_FACTOR: u32 = 2;

pub struct RadarFeed {
    engine: Arc<FusionEngine>,
    fleet: SharedFleet,
    interval: Duration,
}

impl RadarFeed {
    pub fn new(engine: Arc<FusionEngine>, fleet: SharedFleet, interval: Duration) -> Self {
        RadarFeed {
            engine,
            fleet,
            interval,
        }
    }

    /// Advance the fleet and ingest one sweep; returns the number of plots
    pub fn sweep(&self) -> usize {
        let now = self.engine.now_ms();
        let contacts = {
            let mut fleet = self.fleet.lock().unwrap_or_else(PoisonError::into_inner);
            fleet.advance(self.interval.as_secs_f64());
            fleet.radar_contacts(now)
        };
        let count = contacts.len();
        for contact in contacts {
            self.engine.add_radar_contact(contact);
        }
        count
    }

    pub async fn run(self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        log::debug!("Radar feed every {:?}", self.interval);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::debug!("Radar feed shutdown");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let count = self.sweep();
                    log::trace!("Radar sweep with {} plots", count);
                }
            }
        }
    }
}

pub struct AisFeed {
    engine: Arc<FusionEngine>,
    fleet: SharedFleet,
    interval: Duration,
}

impl AisFeed {
    /// `radar_interval` is the sweep interval; AIS runs slower by
    /// [`AIS_INTERVAL_FACTOR`]
    pub fn new(engine: Arc<FusionEngine>, fleet: SharedFleet, radar_interval: Duration) -> Self {
        AisFeed {
            engine,
            fleet,
            interval: radar_interval * AIS_INTERVAL_FACTOR,
        }
    }

    /// Ingest one round of AIS reports; returns the number of reports
    pub fn receive(&self) -> usize {
        let now = self.engine.now_ms();
        let contacts = self
            .fleet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ais_contacts(now);
        let count = contacts.len();
        for contact in contacts {
            self.engine.add_ais_contact(contact);
        }
        count
    }

    pub async fn run(self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        log::debug!("AIS feed every {:?}", self.interval);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::debug!("AIS feed shutdown");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let count = self.receive();
                    log::trace!("AIS round with {} reports", count);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::{FusionConfig, ManualClock, SourceType};

    const T0: u64 = 1_700_000_000_000;

    fn setup(vessels: usize, ais_ratio: f64) -> (Arc<FusionEngine>, SharedFleet, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let config = FusionConfig::default();
        let fleet = Fleet::new(vessels, ais_ratio, config.origin, Some(11));
        let engine = FusionEngine::with_clock(config, clock.clone()).unwrap();
        (Arc::new(engine), Arc::new(Mutex::new(fleet)), clock)
    }

    #[test]
    fn test_feeds_populate_engine() {
        let (engine, fleet, clock) = setup(4, 0.5);
        let radar = RadarFeed::new(engine.clone(), fleet.clone(), Duration::from_secs(1));
        let ais = AisFeed::new(engine.clone(), fleet.clone(), Duration::from_secs(1));
        assert_eq!(ais.interval, Duration::from_secs(2));

        assert_eq!(radar.sweep(), 4);
        assert_eq!(ais.receive(), 2);
        clock.advance(1000);
        radar.sweep();

        let counters = engine.counters();
        assert_eq!(counters.radar_contacts, 8);
        assert_eq!(counters.ais_contacts, 2);

        let stats = engine.statistics();
        assert_eq!(stats.radar_contact_count, 4);
        assert_eq!(stats.ais_contact_count, 2);
        // Plot and report noise stay well inside the gate
        assert_eq!(stats.fused_count, 2);
        assert_eq!(stats.radar_only_count, 2);
        assert!(engine
            .fused_tracks()
            .iter()
            .any(|t| t.source_type == SourceType::Fused));
    }
}
