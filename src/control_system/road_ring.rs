use std::ops::Index;

use crate::error::ConfigError;
use crate::models::road::{Road, RoadId};

/// Fixed circular order in which roads receive green.
///
/// Stored as a plain vector: the successor of position `i` is `(i + 1) % len`,
/// so there are no references between roads. Roads keep their own mutable
/// state but the ring itself never gains or loses members.
#[derive(Debug, Clone)]
pub struct RoadRing {
    roads: Vec<Road>,
}

impl RoadRing {
    pub fn new(roads: Vec<Road>) -> Result<Self, ConfigError> {
        if roads.len() < 2 {
            return Err(ConfigError::TooFewRoads(roads.len()));
        }
        Ok(Self { roads })
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    /// Always false: a ring has at least two roads.
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn successor_index(&self, index: usize) -> usize {
        (index + 1) % self.roads.len()
    }

    /// The road after `road` in ring order. A road not in this ring is treated
    /// as sitting before the first position.
    pub fn successor_of(&self, road: &Road) -> &Road {
        let next = self
            .position(road.id())
            .map_or(0, |index| self.successor_index(index));
        &self.roads[next]
    }

    pub fn position(&self, id: RoadId) -> Option<usize> {
        self.roads.iter().position(|road| road.id() == id)
    }

    pub fn get(&self, index: usize) -> Option<&Road> {
        self.roads.get(index)
    }

    pub fn by_id(&self, id: RoadId) -> Option<&Road> {
        self.roads.iter().find(|road| road.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Road> {
        self.roads.iter()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Road> {
        self.roads.get_mut(index)
    }
}

impl Index<usize> for RoadRing {
    type Output = Road;

    fn index(&self, index: usize) -> &Road {
        &self.roads[index]
    }
}
