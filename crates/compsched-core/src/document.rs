use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::wcif::Competition;

/// Reads a WCIF document from `path`, or from stdin when `path` is `-`.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_competition(path: &Path) -> anyhow::Result<Competition> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read competition document from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    let competition = parse_competition(&raw)
        .with_context(|| format!("failed to parse WCIF document {}", path.display()))?;
    info!(
        competition = %competition.id,
        venues = competition.venues().len(),
        "loaded competition document"
    );
    Ok(competition)
}

pub fn parse_competition(raw: &str) -> anyhow::Result<Competition> {
    if raw.trim().is_empty() {
        return Err(anyhow!("competition document is empty"));
    }
    let competition: Competition = serde_json::from_str(raw)?;
    Ok(competition)
}

/// Writes `value` as pretty JSON through a temp file in the target
/// directory, then renames it into place.
#[tracing::instrument(skip(path, value), fields(path = %path.display()))]
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!("saving json atomically");

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::{Value, json};
    use tempfile::tempdir;

    use super::{load_competition, parse_competition, write_json_atomic};

    #[test]
    fn loads_document_from_disk() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wcif.json");
        fs::write(
            &path,
            json!({ "id": "Disk2024", "schedule": { "venues": [] } }).to_string(),
        )
        .expect("write wcif");

        let comp = load_competition(&path).expect("load");
        assert_eq!(comp.id, "Disk2024");
    }

    #[test]
    fn missing_and_empty_documents_are_errors() {
        let temp = tempdir().expect("tempdir");
        assert!(load_competition(&temp.path().join("absent.json")).is_err());
        assert!(parse_competition("  ").is_err());
        assert!(parse_competition("[1, 2]").is_err());
    }

    #[test]
    fn atomic_write_replaces_target() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("out.json");
        fs::write(&path, "stale").expect("seed");

        write_json_atomic(&path, &json!({ "days": [] })).expect("write");
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(parsed, json!({ "days": [] }));
    }
}
