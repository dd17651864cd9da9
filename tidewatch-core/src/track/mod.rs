//! Fused Tracks
//!
//! The unified vessel record published by the fusion engine, plus its
//! bounded position history.
//!
//! # Identity
//!
//! | Id | Meaning |
//! |----|---------|
//! | `F<mmsi>` | Radar contact paired with an AIS transponder |
//! | `R<radar id>` | Radar only |
//! | `A<mmsi>` | AIS only, no radar contact within the gate |

use serde::{Deserialize, Serialize};

use crate::config::ConfidenceWeights;
use crate::contact::{AisContact, RadarContact};
use crate::estimator::EstimatorState;
use crate::geo::GeoPoint;

mod history;

pub use history::{TrackHistory, TrackPoint};

/// Which sensors back a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Radar,
    Ais,
    Fused,
}

impl SourceType {
    /// `Fused` iff both references are present
    pub fn classify(has_radar: bool, has_ais: bool) -> Self {
        match (has_radar, has_ais) {
            (true, true) => SourceType::Fused,
            (false, true) => SourceType::Ais,
            _ => SourceType::Radar,
        }
    }

    pub fn confidence(&self, weights: &ConfidenceWeights) -> f64 {
        match self {
            SourceType::Fused => weights.fused,
            SourceType::Ais => weights.ais,
            SourceType::Radar => weights.radar,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Radar => write!(f, "radar"),
            SourceType::Ais => write!(f, "ais"),
            SourceType::Fused => write!(f, "fused"),
        }
    }
}

/// Typed track identity, rendered as `F<mmsi>`, `R<id>` or `A<mmsi>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackId {
    Fused(String),
    Radar(String),
    Ais(String),
}

impl TrackId {
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let prefix = chars.next()?;
        let rest = chars.as_str();
        if rest.is_empty() {
            return None;
        }
        match prefix {
            'F' => Some(TrackId::Fused(rest.to_string())),
            'R' => Some(TrackId::Radar(rest.to_string())),
            'A' => Some(TrackId::Ais(rest.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackId::Fused(mmsi) => write!(f, "F{}", mmsi),
            TrackId::Radar(id) => write!(f, "R{}", id),
            TrackId::Ais(mmsi) => write!(f, "A{}", mmsi),
        }
    }
}

/// A live vessel track
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedTrack {
    pub id: String,
    pub source_type: SourceType,
    /// Last radar contact backing this track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radar: Option<RadarContact>,
    /// Last AIS report backing this track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ais: Option<AisContact>,
    /// Last measured position
    pub position: GeoPoint,
    /// Estimator output projected back to lat/lon
    pub smoothed: GeoPoint,
    /// Estimator state in the local metric plane. Each update advances one
    /// estimator step, so velocity is meters per step rather than per second.
    pub estimate: EstimatorState,
    /// Speed over ground in knots, from the contacts
    pub speed_kn: f64,
    /// Course over ground in degrees
    pub course_deg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    /// Confidence in [0, 1], fixed per source type
    pub confidence: f64,
    /// Time of the last upsert (milliseconds since epoch)
    pub last_update: u64,
    pub history: TrackHistory,
}

impl FusedTrack {
    pub fn new(id: &TrackId, position: GeoPoint, history_capacity: usize) -> Self {
        FusedTrack {
            id: id.to_string(),
            source_type: match id {
                TrackId::Fused(_) => SourceType::Fused,
                TrackId::Radar(_) => SourceType::Radar,
                TrackId::Ais(_) => SourceType::Ais,
            },
            radar: None,
            ais: None,
            position,
            smoothed: position,
            estimate: EstimatorState::default(),
            speed_kn: 0.0,
            course_deg: 0.0,
            heading_deg: None,
            confidence: 0.0,
            last_update: 0,
            history: TrackHistory::new(history_capacity),
        }
    }

    pub fn mmsi(&self) -> Option<&str> {
        self.ais.as_ref().map(|a| a.mmsi.as_str())
    }

    pub fn radar_id(&self) -> Option<&str> {
        self.radar.as_ref().map(|r| r.id.as_str())
    }

    /// Vessel name from AIS voyage data
    pub fn name(&self) -> Option<&str> {
        self.ais.as_ref().and_then(|a| a.voyage.name.as_deref())
    }

    /// Milliseconds since the last upsert, zero if `now` lies before it
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_update)
    }

    /// Re-derive classification, confidence and kinematics from the
    /// contact references currently held.
    ///
    /// AIS speed and course win when non-zero; radar fills in otherwise.
    /// Heading only comes from AIS.
    pub fn derive_from_contacts(&mut self, weights: &ConfidenceWeights) {
        self.source_type = SourceType::classify(self.radar.is_some(), self.ais.is_some());
        self.confidence = self.source_type.confidence(weights);

        let (radar_speed, radar_course) = self
            .radar
            .as_ref()
            .map_or((0.0, 0.0), |r| (r.speed_kn, r.course_deg));

        match &self.ais {
            Some(ais) => {
                self.speed_kn = if ais.speed_kn > 0.0 {
                    ais.speed_kn
                } else {
                    radar_speed
                };
                self.course_deg = if ais.course_deg != 0.0 {
                    ais.course_deg
                } else {
                    radar_course
                };
                self.heading_deg = ais.heading_deg;
            }
            None => {
                self.speed_kn = radar_speed;
                self.course_deg = radar_course;
                self.heading_deg = None;
            }
        }
    }
}
