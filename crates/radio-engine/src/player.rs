//! Station registry.
//!
//! The player owns every station by name and forwards lifecycle commands to
//! them. It runs no loop of its own.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{EngineConfig, StationConfig};
use crate::station::Station;

pub struct Player {
    config: EngineConfig,
    station_config: StationConfig,
    stations: RwLock<HashMap<String, Arc<Station>>>,
}

impl Player {
    pub fn new(config: EngineConfig) -> Self {
        let station_config = StationConfig::from(&config);
        Self {
            config,
            station_config,
            stations: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a station and start its playback loop.
    ///
    /// A station already registered under `name` is stopped and replaced.
    pub fn add_station(&self, name: &str, playlist: Vec<PathBuf>) -> Arc<Station> {
        let station = Station::start(name, playlist, self.station_config.clone());
        let previous = self.write().insert(name.to_string(), Arc::clone(&station));
        if let Some(previous) = previous {
            tracing::warn!(station = %name, "station re-registered; stopping previous instance");
            previous.stop();
        }
        station
    }

    pub fn get(&self, name: &str) -> Option<Arc<Station>> {
        self.read().get(name).cloned()
    }

    /// Registered station names, sorted.
    pub fn station_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Signal every station to stop.
    pub fn stop(&self) {
        for station in self.snapshot() {
            station.stop();
        }
    }

    /// Stop every station and wait for their threads to exit.
    pub fn shutdown(&self) {
        let stations = self.snapshot();
        for station in &stations {
            station.stop();
        }
        for station in &stations {
            station.join();
        }
        tracing::info!(stations = stations.len(), "player shut down");
    }

    fn snapshot(&self) -> Vec<Arc<Station>> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Station>>> {
        self.stations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Station>>> {
        self.stations.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}
