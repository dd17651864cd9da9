use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant};
use tokio_graceful_shutdown::SubsystemHandle;
use tidewatch_core::{FusionEngine, FusionStatistics, ProcessingCounters};

/// Periodically logs what the engine is tracking
pub struct Reporter {
    engine: Arc<FusionEngine>,
    period: Duration,
}

impl Reporter {
    pub fn new(engine: Arc<FusionEngine>, period: Duration) -> Self {
        Reporter { engine, period }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        if self.period.is_zero() {
            log::debug!("Statistics reporting disabled");
            subsys.on_shutdown_requested().await;
            return Ok(());
        }

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::info!("{}", summary(&self.engine.statistics(), &self.engine.counters()));
                    return Ok(());
                }
                _ = ticker.tick() => {
                    log::info!("{}", summary(&self.engine.statistics(), &self.engine.counters()));
                }
            }
        }
    }
}

fn summary(stats: &FusionStatistics, counters: &ProcessingCounters) -> String {
    format!(
        "tracks {} (fused {}, radar {}, ais {}), pools radar {} ais {}, \
         received radar {} ais {}, pairs {} (split {}), evicted {}, removed {}",
        stats.fused_track_count,
        stats.fused_count,
        stats.radar_only_count,
        stats.ais_only_count,
        stats.radar_contact_count,
        stats.ais_contact_count,
        counters.radar_contacts,
        counters.ais_contacts,
        counters.pairs_formed,
        counters.pairs_split,
        counters.tracks_evicted,
        counters.tracks_removed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let stats = FusionStatistics {
            radar_contact_count: 3,
            ais_contact_count: 2,
            fused_track_count: 3,
            radar_only_count: 1,
            ais_only_count: 0,
            fused_count: 2,
        };
        let counters = ProcessingCounters {
            radar_contacts: 30,
            ais_contacts: 10,
            pairs_formed: 2,
            pairs_split: 0,
            tracks_evicted: 1,
            tracks_removed: 0,
        };
        let line = summary(&stats, &counters);
        assert!(line.starts_with("tracks 3 (fused 2, radar 1, ais 0)"));
        assert!(line.contains("pairs 2 (split 0), evicted 1, removed 0"));
    }
}
