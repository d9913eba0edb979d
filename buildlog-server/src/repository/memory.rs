//! In-memory registry
//!
//! Holds builds and execution units in process memory. Every write bumps a
//! global resource version and is fanned out to watchers over a broadcast
//! channel. The server uses it as its registry (objects are pushed through
//! the API) and the log pipeline tests use it as their fixture.

use async_trait::async_trait;
use buildlog_core::domain::build::Build;
use buildlog_core::domain::unit::ExecutionUnit;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::{
    BuildRepository, BuildWatch, ExecutionUnitRepository, RepositoryError, Result, WatchEvent,
};

const WATCH_CHANNEL_CAPACITY: usize = 256;

type Key = (String, String);

#[derive(Default)]
struct State {
    builds: HashMap<Key, Build>,
    units: HashMap<Key, ExecutionUnit>,
    version: u64,
}

/// Registry backed by process memory
pub struct MemoryRegistry {
    state: RwLock<State>,
    events: broadcast::Sender<WatchEvent<Build>>,
}

impl MemoryRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(State::default()),
            events,
        }
    }

    /// Creates or replaces a build
    ///
    /// # Returns
    /// The stored build with its newly assigned resource version
    pub async fn upsert_build(&self, mut build: Build) -> Build {
        let mut state = self.state.write().await;
        state.version += 1;
        build.resource_version = state.version;

        let key = (build.namespace.clone(), build.name.clone());
        let event = if state.builds.insert(key, build.clone()).is_some() {
            WatchEvent::Modified(build.clone())
        } else {
            WatchEvent::Added(build.clone())
        };

        debug!(
            "Stored build {} phase={} version={}",
            build.qualified_name(),
            build.phase,
            build.resource_version
        );

        // No subscribers is fine
        let _ = self.events.send(event);
        build
    }

    /// Removes a build and notifies watchers
    pub async fn delete_build(&self, namespace: &str, name: &str) -> Option<Build> {
        let mut state = self.state.write().await;
        let mut removed = state
            .builds
            .remove(&(namespace.to_string(), name.to_string()))?;

        state.version += 1;
        removed.resource_version = state.version;
        let _ = self.events.send(WatchEvent::Deleted(removed.clone()));
        Some(removed)
    }

    /// Creates or replaces an execution unit
    pub async fn upsert_unit(&self, unit: ExecutionUnit) -> ExecutionUnit {
        let mut state = self.state.write().await;
        state.version += 1;

        debug!(
            "Stored unit {}/{} phase={}",
            unit.namespace, unit.name, unit.phase
        );

        state
            .units
            .insert((unit.namespace.clone(), unit.name.clone()), unit.clone());
        unit
    }

    /// Number of objects currently stored
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.builds.len() + state.units.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildRepository for MemoryRegistry {
    async fn get_build(&self, namespace: &str, name: &str) -> Result<Option<Build>> {
        let state = self.state.read().await;
        Ok(state
            .builds
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn watch_build(
        &self,
        namespace: &str,
        name: &str,
        from_version: u64,
    ) -> Result<BuildWatch> {
        // Subscribe before taking the snapshot so no write falls in between
        let rx = self.events.subscribe();
        let snapshot = self.get_build(namespace, name).await?;

        let mut floor = from_version;
        let mut replay = Vec::new();
        if from_version == 0 {
            if let Some(build) = snapshot {
                floor = build.resource_version;
                replay.push(Ok(WatchEvent::Added(build)));
            }
        }

        let key = (namespace.to_string(), name.to_string());
        let live = futures::stream::unfold(rx, move |mut rx| {
            let key = key.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            let build = event.object();
                            if build.namespace == key.0
                                && build.name == key.1
                                && build.resource_version > floor
                            {
                                return Some((Ok(event), rx));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            let err = RepositoryError::WatchExpired(format!(
                                "watcher for {}/{} missed {} events",
                                key.0, key.1, missed
                            ));
                            return Some((Err(err), rx));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(futures::stream::iter(replay).chain(live).boxed())
    }
}

#[async_trait]
impl ExecutionUnitRepository for MemoryRegistry {
    async fn get_unit(&self, namespace: &str, name: &str) -> Result<Option<ExecutionUnit>> {
        let state = self.state.read().await;
        Ok(state
            .units
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlog_core::domain::build::BuildPhase;
    use buildlog_core::domain::unit::{Step, UnitPhase};

    #[tokio::test]
    async fn test_upsert_assigns_increasing_versions() {
        let registry = MemoryRegistry::new();

        let first = registry.upsert_build(Build::new("ci", "app-1")).await;
        let second = registry
            .upsert_build(Build::new("ci", "app-1").with_phase(BuildPhase::Running))
            .await;

        assert!(second.resource_version > first.resource_version);

        let stored = registry.get_build("ci", "app-1").await.unwrap().unwrap();
        assert_eq!(stored.phase, BuildPhase::Running);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let registry = MemoryRegistry::new();
        assert!(registry.get_build("ci", "nope").await.unwrap().is_none());
        assert!(registry.get_unit("ci", "nope").await.unwrap().is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_watch_replays_current_state_then_changes() {
        let registry = MemoryRegistry::new();
        registry.upsert_build(Build::new("ci", "app-1")).await;

        let mut watch = registry.watch_build("ci", "app-1", 0).await.unwrap();

        let first = watch.next().await.unwrap().unwrap();
        assert!(matches!(first, WatchEvent::Added(ref b) if b.phase == BuildPhase::New));

        // Writes to other builds are filtered out
        registry.upsert_build(Build::new("ci", "other")).await;
        registry
            .upsert_build(Build::new("ci", "app-1").with_phase(BuildPhase::Running))
            .await;

        let second = watch.next().await.unwrap().unwrap();
        assert!(matches!(second, WatchEvent::Modified(ref b) if b.phase == BuildPhase::Running));
    }

    #[tokio::test]
    async fn test_watch_reports_deletion() {
        let registry = MemoryRegistry::new();
        registry.upsert_build(Build::new("ci", "app-1")).await;

        let mut watch = registry.watch_build("ci", "app-1", 0).await.unwrap();
        let _ = watch.next().await;

        registry.delete_build("ci", "app-1").await;

        let event = watch.next().await.unwrap().unwrap();
        assert!(matches!(event, WatchEvent::Deleted(_)));
    }

    #[tokio::test]
    async fn test_units_round_trip() {
        let registry = MemoryRegistry::new();
        let unit = ExecutionUnit::new("ci", "app-1-build")
            .with_init_step(Step::waiting("git-clone"))
            .with_phase(UnitPhase::Pending);

        registry.upsert_unit(unit.clone()).await;

        let stored = registry.get_unit("ci", "app-1-build").await.unwrap();
        assert_eq!(stored, Some(unit));
    }
}
