//! JSON persistence of per-pair incremental state.
//!
//! The document is an object keyed by pair name:
//!
//! ```json
//! {
//!   "10Y vs 2Y": { "previous_state": "normal", "last_check_date": "2024-01-02" }
//! }
//! ```

use chrono::NaiveDate;
use curve_core::{CurveError, CurveState, TrackedPairState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PairRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_state: Option<CurveState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_check_date: Option<NaiveDate>,
}

/// In-memory copy of the persisted state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDocument {
    pairs: BTreeMap<String, PairRecord>,
}

impl StateDocument {
    /// State for `pair_name`, unset when the pair was never checked.
    pub fn get(&self, pair_name: &str) -> TrackedPairState {
        match self.pairs.get(pair_name) {
            Some(record) => TrackedPairState {
                pair_name: pair_name.to_string(),
                previous_state: record.previous_state,
                last_check_date: record.last_check_date,
            },
            None => TrackedPairState::unset(pair_name),
        }
    }

    pub fn put(&mut self, state: TrackedPairState) {
        self.pairs.insert(
            state.pair_name,
            PairRecord {
                previous_state: state.previous_state,
                last_check_date: state.last_check_date,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = TrackedPairState> + '_ {
        self.pairs.keys().map(|name| self.get(name))
    }

    pub fn to_json(&self) -> Result<String, CurveError> {
        serde_json::to_string_pretty(self).map_err(|e| CurveError::PersistenceError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CurveError> {
        serde_json::from_str(json).map_err(|e| CurveError::PersistenceError(e.to_string()))
    }
}

/// State file on local disk.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing file is an empty document.
    pub async fn load(&self) -> Result<StateDocument, CurveError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(StateDocument::default()),
            Ok(contents) => StateDocument::from_json(&contents).map_err(|e| {
                CurveError::PersistenceError(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting fresh", self.path.display());
                Ok(StateDocument::default())
            }
            Err(e) => Err(CurveError::PersistenceError(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Write via a sibling temp file and rename so a crash never truncates state.
    pub async fn save(&self, document: &StateDocument) -> Result<(), CurveError> {
        let json = document.to_json()?;
        let persist_err =
            |e: std::io::Error| CurveError::PersistenceError(format!("writing {}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await.map_err(persist_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(persist_err)?;

        tracing::debug!("Saved state for {} pairs to {}", document.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(name: &str, state: CurveState, d: u32) -> TrackedPairState {
        TrackedPairState {
            pair_name: name.to_string(),
            previous_state: Some(state),
            last_check_date: NaiveDate::from_ymd_opt(2024, 1, d),
        }
    }

    #[test]
    fn test_document_layout_is_keyed_by_pair() {
        let mut doc = StateDocument::default();
        doc.put(checked("10Y vs 2Y", CurveState::Inverted, 2));

        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["10Y vs 2Y"]["previous_state"], "inverted");
        assert_eq!(value["10Y vs 2Y"]["last_check_date"], "2024-01-02");
    }

    #[test]
    fn test_reads_legacy_document() {
        let json = r#"{
            "10Y vs 2Y": {"previous_state": "normal", "last_check_date": "2024-09-03"},
            "30Y vs 3M": {"previous_state": "inverted", "last_check_date": "2024-09-03"}
        }"#;
        let doc = StateDocument::from_json(json).unwrap();

        assert_eq!(doc.len(), 2);
        let state = doc.get("30Y vs 3M");
        assert_eq!(state.previous_state, Some(CurveState::Inverted));
        assert_eq!(state.last_check_date, NaiveDate::from_ymd_opt(2024, 9, 3));
        assert_eq!(doc.get("5Y vs 2Y"), TrackedPairState::unset("5Y vs 2Y"));
    }

    #[test]
    fn test_corrupt_document_is_persistence_error() {
        assert!(matches!(
            StateDocument::from_json("[1, 2]"),
            Err(CurveError::PersistenceError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("nested").join("state.json"));

        let mut doc = StateDocument::default();
        doc.put(checked("10Y vs 2Y", CurveState::Normal, 1));
        doc.put(TrackedPairState {
            pair_name: "30Y vs 3M".to_string(),
            previous_state: None,
            last_check_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        });
        store.save(&doc).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.states().count(), 2);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }
}
