//! JSON input contracts for the offline pipeline.
//!
//! The cleaning/ingestion collaborators hand over three documents: sessions
//! (`[{session_id, visits: [{label, position}]}]`), interactions
//! (`[{user_id, item_id, rating}]`) and the catalog (`[{item_id, title}]`).

use crate::error::Result;
use crate::models::*;
use crate::utils::validation::{validate_catalog, validate_session};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

pub fn load_sessions(path: impl AsRef<Path>) -> Result<Vec<Session>> {
    let path = path.as_ref();
    let sessions: Vec<Session> = read_json(path)?;
    for session in &sessions {
        validate_session(session)?;
    }
    let usable = sessions.iter().filter(|s| s.has_transitions()).count();
    info!(
        "Loaded {} sessions from {} ({} with at least two visits)",
        sessions.len(),
        path.display(),
        usable
    );
    Ok(sessions)
}

/// Range checks happen when the records are placed into the matrix.
pub fn load_interactions(path: impl AsRef<Path>) -> Result<Vec<InteractionRecord>> {
    let path = path.as_ref();
    let records: Vec<InteractionRecord> = read_json(path)?;
    info!("Loaded {} interaction records from {}", records.len(), path.display());
    Ok(records)
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogItem>> {
    let path = path.as_ref();
    let mut catalog: Vec<CatalogItem> = read_json(path)?;
    catalog.sort_by_key(|item| item.item_id);
    validate_catalog(&catalog)?;
    info!("Loaded catalog of {} items from {}", catalog.len(), path.display());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecError;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("navirec-{}-{}.json", tag, uuid::Uuid::new_v4()))
    }

    #[test]
    fn sessions_round_trip_through_file() {
        let path = temp_path("sessions");
        let sessions = vec![Session::new("1", &["Trousers", "Skirts"]), Session::new("2", &["Sale"])];
        write_json(&path, &sessions).unwrap();

        assert_eq!(load_sessions(&path).unwrap(), sessions);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unordered_session_is_rejected() {
        let path = temp_path("sessions");
        fs::write(
            &path,
            r#"[{"session_id":"9","visits":[{"label":"A","position":2},{"label":"B","position":1}]}]"#,
        )
        .unwrap();

        assert!(matches!(load_sessions(&path), Err(RecError::Validation(_))));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn catalog_is_sorted_then_checked() {
        let path = temp_path("catalog");
        fs::write(&path, r#"[{"item_id":1,"title":"Smart Phone 1"},{"item_id":0,"title":"Sleek Watch 0"}]"#).unwrap();

        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog[0].title, "Sleek Watch 0");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn interactions_parse() {
        let path = temp_path("interactions");
        fs::write(&path, r#"[{"user_id":7,"item_id":2,"rating":5.0}]"#).unwrap();
        assert_eq!(load_interactions(&path).unwrap(), vec![InteractionRecord::new(7, 2, 5.0)]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(load_interactions(temp_path("missing")), Err(RecError::Io(_))));
    }
}
