use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// A single point in a track's history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Timestamp (milliseconds since epoch)
    pub timestamp: u64,
    pub lat: f64,
    pub lon: f64,
}

impl TrackPoint {
    pub fn new(timestamp: u64, position: GeoPoint) -> Self {
        TrackPoint {
            timestamp,
            lat: position.lat,
            lon: position.lon,
        }
    }
}

/// Bounded position history, oldest first.
///
/// Once full, every push drops the oldest point.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHistory {
    points: VecDeque<TrackPoint>,
    capacity: usize,
}

impl TrackHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TrackHistory {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: TrackPoint) {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Interleave several histories by timestamp into a new one of the given
    /// capacity. Points with equal timestamps keep the order of `sources`.
    pub fn merged(capacity: usize, sources: &[TrackHistory]) -> Self {
        let mut points: Vec<TrackPoint> = sources
            .iter()
            .flat_map(|h| h.points.iter().copied())
            .collect();
        points.sort_by_key(|p| p.timestamp);

        let mut history = TrackHistory::new(capacity);
        for point in points {
            history.push(point);
        }
        history
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Serialize for TrackHistory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.points.iter())
    }
}
