//! First-order Markov model over page/category labels.
//!
//! Probabilities are stored rounded to a fixed number of decimal digits
//! (2 by default). This is lossy: the destinations of one source may sum to
//! slightly more or less than 1.0, so consumers of the persisted document
//! should allow a tolerance of about 0.02 instead of assuming exact
//! normalization.

use crate::error::{RecError, Result};
use crate::models::{Session, StatePrediction};
use crate::utils::round_to;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const DEFAULT_PRECISION: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
struct TransitionRow {
    source: String,
    /// Destinations in first-seen order.
    destinations: Vec<(String, f64)>,
}

/// Source label -> (destination label -> probability). Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    rows: Vec<TransitionRow>,
    lookup: HashMap<String, usize>,
}

#[derive(Default)]
struct CountRow {
    source: String,
    destinations: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl CountRow {
    fn count_mut(&mut self, destination: &str) -> &mut u64 {
        let destinations = &mut self.destinations;
        let slot = *self
            .positions
            .entry(destination.to_string())
            .or_insert_with(|| {
                destinations.push((destination.to_string(), 0));
                destinations.len() - 1
            });
        &mut self.destinations[slot].1
    }
}

#[derive(Default)]
struct TransitionCounter {
    rows: Vec<CountRow>,
    lookup: HashMap<String, usize>,
    pairs: u64,
}

impl TransitionCounter {
    fn row_mut(&mut self, source: &str) -> &mut CountRow {
        let rows = &mut self.rows;
        let slot = *self.lookup.entry(source.to_string()).or_insert_with(|| {
            rows.push(CountRow {
                source: source.to_string(),
                ..CountRow::default()
            });
            rows.len() - 1
        });
        &mut self.rows[slot]
    }

    fn observe(&mut self, current: &str, next: &str) {
        *self.row_mut(current).count_mut(next) += 1;
        self.pairs += 1;
    }

    fn into_table(self, precision: u32) -> TransitionTable {
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                let total: u64 = row.destinations.iter().map(|(_, c)| c).sum();
                let destinations = row
                    .destinations
                    .into_iter()
                    .map(|(dest, count)| (dest, round_to(count as f64 / total as f64, precision)))
                    .collect();
                TransitionRow {
                    source: row.source,
                    destinations,
                }
            })
            .collect();
        TransitionTable::from_rows(rows)
    }
}

/// Trains transition tables from ordered label sequences.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    precision: u32,
}

impl Default for TransitionModel {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl TransitionModel {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    /// Counts every adjacent (current, next) pair and normalizes per source.
    /// Sequences shorter than two labels contribute nothing.
    pub fn train<I, S, L>(&self, sequences: I) -> TransitionTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[L]>,
        L: AsRef<str>,
    {
        let mut counter = TransitionCounter::default();
        let mut used = 0usize;

        for sequence in sequences {
            let sequence = sequence.as_ref();
            if sequence.len() < 2 {
                continue;
            }
            used += 1;
            for pair in sequence.windows(2) {
                counter.observe(pair[0].as_ref(), pair[1].as_ref());
            }
        }

        info!(
            "Trained transition model on {} sequences ({} transitions, {} states)",
            used,
            counter.pairs,
            counter.rows.len()
        );
        counter.into_table(self.precision)
    }

    pub fn train_sessions(&self, sessions: &[Session]) -> TransitionTable {
        self.train(
            sessions
                .iter()
                .filter(|s| s.has_transitions())
                .map(|s| s.labels()),
        )
    }
}

impl TransitionTable {
    fn from_rows(rows: Vec<TransitionRow>) -> Self {
        let lookup = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.source.clone(), i))
            .collect();
        Self { rows, lookup }
    }

    /// Up to `k` most likely next states, highest probability first. Ties keep
    /// first-seen order. An unknown state yields an empty list.
    pub fn predict(&self, state: &str, k: usize) -> Vec<StatePrediction> {
        let Some(destinations) = self.destinations(state) else {
            return Vec::new();
        };

        let mut ranked: Vec<&(String, f64)> = destinations.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
            .into_iter()
            .take(k)
            .map(|(state, probability)| StatePrediction {
                state: state.clone(),
                probability: *probability,
            })
            .collect()
    }

    pub fn destinations(&self, state: &str) -> Option<&[(String, f64)]> {
        self.lookup
            .get(state)
            .map(|&i| self.rows[i].destinations.as_slice())
    }

    pub fn probability(&self, from: &str, to: &str) -> Option<f64> {
        self.destinations(from)?
            .iter()
            .find(|(dest, _)| dest == to)
            .map(|(_, p)| *p)
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.source.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!("Saved transition table with {} states to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let table: TransitionTable = serde_json::from_reader(reader)?;
        table.validate()?;
        info!("Loaded transition table with {} states from {}", table.len(), path.display());
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        for row in &self.rows {
            for (dest, p) in &row.destinations {
                if !(0.0..=1.0).contains(p) {
                    return Err(RecError::validation(format!(
                        "probability {} for {} -> {} outside [0, 1]",
                        p, row.source, dest
                    )));
                }
            }
        }
        Ok(())
    }
}

struct OrderedDestinations<'a>(&'a [(String, f64)]);

impl Serialize for OrderedDestinations<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (dest, p) in self.0 {
            map.serialize_entry(dest, p)?;
        }
        map.end()
    }
}

impl Serialize for TransitionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for row in &self.rows {
            map.serialize_entry(&row.source, &OrderedDestinations(&row.destinations))?;
        }
        map.end()
    }
}

struct DestinationList(Vec<(String, f64)>);

impl<'de> Deserialize<'de> for DestinationList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DestinationVisitor;

        impl<'de> Visitor<'de> for DestinationVisitor {
            type Value = DestinationList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of destination label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, f64)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((dest, p)) = access.next_entry::<String, f64>()? {
                    if !seen.insert(dest.clone()) {
                        return Err(de::Error::custom(format!("duplicate destination label {:?}", dest)));
                    }
                    entries.push((dest, p));
                }
                Ok(DestinationList(entries))
            }
        }

        deserializer.deserialize_map(DestinationVisitor)
    }
}

impl<'de> Deserialize<'de> for TransitionTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = TransitionTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of source label to destination probabilities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut rows = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = HashSet::new();
                while let Some((source, list)) = access.next_entry::<String, DestinationList>()? {
                    if !seen.insert(source.clone()) {
                        return Err(de::Error::custom(format!("duplicate source label {:?}", source)));
                    }
                    rows.push(TransitionRow {
                        source,
                        destinations: list.0,
                    });
                }
                Ok(TransitionTable::from_rows(rows))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.iter().map(|l| l.to_string()).collect())
            .collect()
    }

    #[test]
    fn trains_relative_frequencies() {
        let table = TransitionModel::default().train(seqs(&[&["A", "B", "C"], &["A", "C"], &["B"]]));

        assert_eq!(table.probability("A", "B"), Some(0.5));
        assert_eq!(table.probability("A", "C"), Some(0.5));
        assert_eq!(table.probability("B", "C"), Some(1.0));
        assert_eq!(table.destinations("B").unwrap().len(), 1);
        assert!(table.destinations("C").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn single_visit_sequences_add_nothing() {
        let table = TransitionModel::default().train(seqs(&[&["A"], &["B"], &["C"]]));
        assert!(table.is_empty());
    }

    #[test]
    fn rounded_rows_sum_close_to_one() {
        let table = TransitionModel::default().train(seqs(&[
            &["A", "B"],
            &["A", "C"],
            &["A", "D"],
            &["X", "Y", "X", "Z", "X", "W"],
        ]));

        // 1/3 rounds to 0.33 three times
        assert_eq!(table.probability("A", "B"), Some(0.33));
        for state in table.states() {
            let sum: f64 = table.destinations(state).unwrap().iter().map(|(_, p)| p).sum();
            assert!((sum - 1.0).abs() <= 0.02, "{} sums to {}", state, sum);
        }
    }

    #[test]
    fn predict_sorts_and_truncates() {
        let table = TransitionModel::default().train(seqs(&[
            &["Sale", "Skirts"],
            &["Sale", "Trousers"],
            &["Sale", "Trousers"],
            &["Sale", "Blouses"],
        ]));

        let top = table.predict("Sale", 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].state, "Trousers");
        assert_eq!(top[0].probability, 0.5);
        // Skirts and Blouses tie at 0.25, first seen wins
        assert_eq!(top[1].state, "Skirts");

        let all = table.predict("Sale", 10);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].probability >= w[1].probability));
    }

    #[test]
    fn unknown_state_predicts_nothing() {
        let table = TransitionModel::default().train(seqs(&[&["A", "B"]]));
        assert!(table.predict("Z", 3).is_empty());
        assert!(table.predict("A", 0).is_empty());
    }

    #[test]
    fn json_document_keeps_destination_order() {
        let table = TransitionModel::default().train(seqs(&[&["A", "C"], &["A", "B"]]));
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"A":{"C":0.5,"B":0.5}}"#);

        let parsed: TransitionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.predict("A", 1)[0].state, "C");
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir().join(format!("navirec-markov-{}.json", uuid::Uuid::new_v4()));
        let table = TransitionModel::default().train(seqs(&[&["Trousers", "Sale", "Skirts"]]));
        table.save(&path).unwrap();

        let loaded = TransitionTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_rejects_out_of_range_probability() {
        let path = std::env::temp_dir().join(format!("navirec-markov-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"A":{"B":1.5}}"#).unwrap();
        assert!(matches!(TransitionTable::load(&path), Err(RecError::Validation(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        assert!(serde_json::from_str::<TransitionTable>(r#"{"A":{"B":1.0},"A":{"C":1.0}}"#).is_err());
        assert!(serde_json::from_str::<TransitionTable>(r#"{"A":{"B":0.5,"B":0.5}}"#).is_err());

        let path = std::env::temp_dir().join(format!("navirec-markov-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"A":{"B":1.0},"B":{"C":1.0},"A":{"C":1.0}}"#).unwrap();
        assert!(matches!(TransitionTable::load(&path), Err(RecError::Json(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn train_sessions_skips_short_sessions() {
        let sessions = vec![
            Session::new("s1", &["A", "B", "C"]),
            Session::new("s2", &["A", "C"]),
            Session::new("s3", &["B"]),
        ];
        let table = TransitionModel::default().train_sessions(&sessions);
        assert_eq!(table.probability("B", "C"), Some(1.0));
    }
}
