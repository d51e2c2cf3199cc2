use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use super::clock::format_timestamp;
use super::constants::{CONTAINER_LOG_NAME, CONTAINER_SUFFIX, FLAT_LOG_SUFFIX};
use super::error::CatalogError;
use super::log_file::LogTable;
use super::name_parser::parse_name_with_format;

/// How a log file was stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLayout {
    /// `<base>/<timestamp folder>/EDAutoLog.dat`
    Container,
    /// `<base>/<timestamp>_Jeol_MicroED.dat`
    Flat,
    /// Found somewhere below the base directory by the recursive fallback
    Nested,
}

/// A discoverable log file with its resolved timestamp.
///
/// Entries are rebuilt on every scan and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCatalogEntry {
    pub path: PathBuf,
    pub timestamp: PrimitiveDateTime,
    pub label: String,
    pub layout: LogLayout,
}

impl FileCatalogEntry {
    /// The `HH:MM:SS` label used when listing files of a single day
    pub fn time_label(&self) -> String {
        self.timestamp
            .format(&format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default()
    }

    /// The `YYYY-MM-DD HH:MM:SS` label used when listing files across days
    pub fn datetime_label(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// A log file that has been found but not yet given a timestamp
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    /// Names to try with the name parser, most specific first
    names: Vec<String>,
    label: String,
    layout: LogLayout,
}

/// Build the catalog of log files under `base`, keeping entries whose date lies within the
/// inclusive [start, end] range (either bound may be omitted).
///
/// The result is sorted by timestamp (ties broken by path), so scanning an unchanged directory
/// twice yields identical catalogs. A missing or unreadable base directory gives an empty
/// catalog.
pub fn scan_catalog(
    base: &Path,
    start: Option<Date>,
    end: Option<Date>,
) -> Vec<FileCatalogEntry> {
    let candidates = match find_candidates(base) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Could not scan log directory {}: {e}", base.display());
            return vec![];
        }
    };

    let mut entries: Vec<FileCatalogEntry> = candidates
        .into_iter()
        .filter_map(|candidate| match resolve(candidate) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("{e}; excluding it from the catalog");
                None
            }
        })
        .filter(|entry| is_in_range(entry.timestamp.date(), start, end))
        .collect();

    entries.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });
    log::info!(
        "Found {} log files in {}",
        entries.len(),
        base.display()
    );
    entries
}

fn is_in_range(date: Date, start: Option<Date>, end: Option<Date>) -> bool {
    if let Some(start) = start {
        if date < start {
            return false;
        }
    }
    if let Some(end) = end {
        if date > end {
            return false;
        }
    }
    true
}

/// Look for the flat layouts first. Only if neither is present do we walk the whole tree.
fn find_candidates(base: &Path) -> Result<Vec<Candidate>, CatalogError> {
    let mut candidates = flat_candidates(base)?;
    if candidates.is_empty() {
        log::debug!(
            "No container or flat log files in {}, searching recursively",
            base.display()
        );
        nested_candidates(base, &mut candidates)?;
    }
    Ok(candidates)
}

fn flat_candidates(base: &Path) -> Result<Vec<Candidate>, CatalogError> {
    let mut candidates = Vec::new();
    for item in base.read_dir()? {
        let item_path = item?.path();
        let name = match item_path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        if item_path.is_dir() {
            let log_path = item_path.join(CONTAINER_LOG_NAME);
            if log_path.is_file() {
                candidates.push(Candidate {
                    path: log_path,
                    label: strip_suffix(&name, CONTAINER_SUFFIX),
                    names: vec![name],
                    layout: LogLayout::Container,
                });
            }
        } else if name.ends_with(FLAT_LOG_SUFFIX) {
            candidates.push(Candidate {
                path: item_path,
                label: strip_suffix(&name, FLAT_LOG_SUFFIX),
                names: vec![name],
                layout: LogLayout::Flat,
            });
        }
    }
    Ok(candidates)
}

fn nested_candidates(dir: &Path, candidates: &mut Vec<Candidate>) -> Result<(), CatalogError> {
    for item in dir.read_dir()? {
        let item_path = item?.path();
        if item_path.is_dir() {
            // One unreadable subfolder should not hide the rest of the tree
            if let Err(e) = nested_candidates(&item_path, candidates) {
                log::warn!("Skipping {}: {e}", item_path.display());
            }
            continue;
        }
        let name = match item_path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        if name != CONTAINER_LOG_NAME && !name.ends_with(FLAT_LOG_SUFFIX) {
            continue;
        }
        let parent_name = item_path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string());
        let label = if name == CONTAINER_LOG_NAME {
            parent_name
                .as_deref()
                .map(|p| strip_suffix(p, CONTAINER_SUFFIX))
                .unwrap_or_else(|| name.clone())
        } else {
            strip_suffix(&name, FLAT_LOG_SUFFIX)
        };
        let mut names = vec![name];
        names.extend(parent_name);
        candidates.push(Candidate {
            path: item_path,
            names,
            label,
            layout: LogLayout::Nested,
        });
    }
    Ok(())
}

/// Give a candidate its timestamp: from its name(s) if possible, else from its first data row
fn resolve(candidate: Candidate) -> Result<FileCatalogEntry, CatalogError> {
    let from_name = candidate.names.iter().find_map(|name| {
        parse_name_with_format(name).map(|(ts, format)| {
            log::debug!("{name} matched the {} naming scheme", format.label);
            ts
        })
    });

    let timestamp = match from_name {
        Some(ts) => ts,
        None => match LogTable::read_first_timestamp(&candidate.path) {
            Ok(Some(ts)) => ts,
            Ok(None) => return Err(CatalogError::UnresolvedTimestamp(candidate.path)),
            Err(e) => {
                log::warn!("Could not read {}: {e}", candidate.path.display());
                return Err(CatalogError::UnresolvedTimestamp(candidate.path));
            }
        },
    };

    Ok(FileCatalogEntry {
        path: candidate.path,
        timestamp,
        label: candidate.label,
        layout: candidate.layout,
    })
}

fn strip_suffix(name: &str, suffix: &str) -> String {
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use time::macros::{date, datetime};

    const LOG: &str = "[Jeol_MicroED 2]\ntime\tHT [kV]\n2025-05-12 09:00:00\t200.0\n";

    fn container(base: &Path, folder: &str, contents: &str) -> PathBuf {
        let dir = base.join(folder);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONTAINER_LOG_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    fn flat(base: &Path, name: &str, contents: &str) -> PathBuf {
        let path = base.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_container_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = container(dir.path(), "Mon-May-12-12-48-37-2025_EDAutoLog", LOG);
        let catalog = scan_catalog(dir.path(), None, None);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].path, path);
        assert_eq!(catalog[0].timestamp, datetime!(2025-05-12 12:48:37));
        assert_eq!(catalog[0].label, "Mon-May-12-12-48-37-2025");
        assert_eq!(catalog[0].layout, LogLayout::Container);
        assert_eq!(catalog[0].time_label(), "12:48:37");
    }

    #[test]
    fn test_flat_layout_sorted() {
        let dir = tempfile::tempdir().unwrap();
        flat(dir.path(), "2025-05-12_14-00-00_Jeol_MicroED.dat", LOG);
        flat(dir.path(), "2025-05-12_08-00-00_Jeol_MicroED.dat", LOG);
        fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();
        let catalog = scan_catalog(dir.path(), None, None);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].timestamp, datetime!(2025-05-12 08:00:00));
        assert_eq!(catalog[1].timestamp, datetime!(2025-05-12 14:00:00));
        assert_eq!(catalog[0].label, "2025-05-12_08-00-00");
        assert_eq!(catalog[1].datetime_label(), "2025-05-12 14:00:00");
    }

    #[test]
    fn test_date_filter_single_day() {
        let dir = tempfile::tempdir().unwrap();
        container(dir.path(), "Sun-May-11-23-59-59-2025_EDAutoLog", LOG);
        container(dir.path(), "Mon-May-12-00-00-00-2025_EDAutoLog", LOG);
        container(dir.path(), "Mon-May-12-23-59-59-2025_EDAutoLog", LOG);
        container(dir.path(), "Tue-May-13-00-00-00-2025_EDAutoLog", LOG);
        let d = date!(2025 - 05 - 12);
        let catalog = scan_catalog(dir.path(), Some(d), Some(d));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.iter().all(|e| e.timestamp.date() == d));
    }

    #[test]
    fn test_open_ended_filter() {
        let dir = tempfile::tempdir().unwrap();
        flat(dir.path(), "2025-05-11_10-00-00_Jeol_MicroED.dat", LOG);
        flat(dir.path(), "2025-05-13_10-00-00_Jeol_MicroED.dat", LOG);
        let catalog = scan_catalog(dir.path(), Some(date!(2025 - 05 - 12)), None);
        assert_eq!(catalog.len(), 1);
        let catalog = scan_catalog(dir.path(), None, Some(date!(2025 - 05 - 12)));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].timestamp.date(), date!(2025 - 05 - 11));
    }

    #[test]
    fn test_content_fallback() {
        let dir = tempfile::tempdir().unwrap();
        container(dir.path(), "session_EDAutoLog", LOG);
        let catalog = scan_catalog(dir.path(), None, None);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].timestamp, datetime!(2025-05-12 09:00:00));
    }

    #[test]
    fn test_unresolvable_entry_excluded() {
        let dir = tempfile::tempdir().unwrap();
        container(dir.path(), "session_EDAutoLog", "[Jeol_MicroED 2]\ntime\tHT [kV]\n");
        container(dir.path(), "Mon-May-12-12-48-37-2025_EDAutoLog", LOG);
        let catalog = scan_catalog(dir.path(), None, None);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].label, "Mon-May-12-12-48-37-2025");
    }

    #[test]
    fn test_recursive_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2025").join("May");
        fs::create_dir_all(&nested).unwrap();
        container(&nested, "2025_05_12_12h48m37_EDAutoLog", LOG);
        flat(&nested, "2025-05-13_08-00-00_Jeol_MicroED.dat", LOG);
        let catalog = scan_catalog(dir.path(), None, None);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].timestamp, datetime!(2025-05-12 12:48:37));
        assert_eq!(catalog[0].label, "2025_05_12_12h48m37");
        assert_eq!(catalog[0].layout, LogLayout::Nested);
        assert_eq!(catalog[1].timestamp, datetime!(2025-05-13 08:00:00));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = scan_catalog(&dir.path().join("missing"), None, None);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_rescan_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        container(dir.path(), "Mon-May-12-12-48-37-2025_EDAutoLog", LOG);
        container(dir.path(), "Mon-May-12-12-48-37-2025_EDAutoLog_2", LOG);
        flat(dir.path(), "2025-05-12_12-48-37_Jeol_MicroED.dat", LOG);
        let first = scan_catalog(dir.path(), None, None);
        let second = scan_catalog(dir.path(), None, None);
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }
}
