//! Per-session band energies from the previous iteration.
//!
//! The store is owned by the calling workflow and handed to the scoring
//! engine by reference. Writes are last-writer-wins; the workflow must record
//! a baseline before the next scoring read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use crate::analysis::spectral::SubBandResult;

/// Identifies one user's mastering session.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            session: session.into(),
        }
    }
}

pub trait BaselineStore: Send + Sync {
    fn get(&self, session: &SessionKey, band: &str) -> Option<f64>;
    fn set(&self, session: &SessionKey, band: &str, energy_db: f64);
    /// Forget every band of one session.
    fn clear(&self, session: &SessionKey);
}

/// Write the measured band energies of this iteration. Bands without data
/// keep their previous baseline.
pub fn record_baseline(store: &dyn BaselineStore, session: &SessionKey, bands: &[SubBandResult]) {
    let mut written = 0;
    for band in bands {
        if let Some(energy) = band.energy_db {
            store.set(session, &band.id, energy);
            written += 1;
        }
    }
    log::debug!(
        "Recorded {} band baselines for {}/{}",
        written,
        session.user,
        session.session
    );
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionEntry {
    #[serde(flatten)]
    key: SessionKey,
    bands: BTreeMap<String, f64>,
}

/// In-memory store, optionally persisted as JSON between runs.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    entries: RwLock<BTreeMap<SessionKey, BTreeMap<String, f64>>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(&self) {
        match self.entries.write() {
            Ok(mut entries) => entries.clear(),
            Err(_) => log::warn!("Baseline store lock poisoned, could not clear"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read baseline store: {}", path.display()))?;
        let sessions: Vec<SessionEntry> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse baseline store: {}", path.display()))?;
        let entries = sessions.into_iter().map(|s| (s.key, s.bands)).collect();
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let sessions: Vec<SessionEntry> = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("baseline store lock poisoned"))?
            .iter()
            .map(|(key, bands)| SessionEntry {
                key: key.clone(),
                bands: bands.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&sessions)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write baseline store: {}", path.display()))
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn get(&self, session: &SessionKey, band: &str) -> Option<f64> {
        self.entries
            .read()
            .ok()?
            .get(session)
            .and_then(|bands| bands.get(band))
            .copied()
    }

    fn set(&self, session: &SessionKey, band: &str, energy_db: f64) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries
                    .entry(session.clone())
                    .or_default()
                    .insert(band.to_string(), energy_db);
            }
            Err(_) => log::warn!(
                "Baseline store lock poisoned, dropped {} for {}/{}",
                band,
                session.user,
                session.session
            ),
        }
    }

    fn clear(&self, session: &SessionKey) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.remove(session);
            }
            Err(_) => log::warn!(
                "Baseline store lock poisoned, could not clear {}/{}",
                session.user,
                session.session
            ),
        }
    }
}
