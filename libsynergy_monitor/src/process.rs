use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use time::PrimitiveDateTime;

use super::aggregator::{aggregate_tables, UnifiedSeries};
use super::catalog::{scan_catalog, FileCatalogEntry};
use super::error::{ConfigError, ProcessorError};
use super::log_file::LogTable;
use super::worker_status::WorkerStatus;

/// The files of a catalog that hold data in a requested time range, and their merged series
#[derive(Debug, Clone)]
pub struct RangeSelection {
    pub entries: Vec<FileCatalogEntry>,
    pub series: UnifiedSeries,
}

/// Divide a list of files into a set of subsets (per thread/worker), round robin by index
pub fn create_subsets(n_files: usize, n_threads: usize) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    for idx in 0..n_files {
        subsets[idx % n_subsets].push(idx)
    }

    subsets
}

/// Read a subset of the files. A file that fails to read leaves an empty slot.
fn read_subset(
    paths: &[PathBuf],
    subset: Vec<usize>,
    worker_id: usize,
    tx: Option<&Sender<WorkerStatus>>,
) -> Result<Vec<(usize, Option<LogTable>)>, ProcessorError> {
    let n_files = subset.len();
    let mut results = Vec::with_capacity(n_files);
    for (count, idx) in subset.into_iter().enumerate() {
        let path = &paths[idx];
        let table = match LogTable::read(path) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                None
            }
        };
        results.push((idx, table));
        if let Some(tx) = tx {
            tx.send(WorkerStatus::new(
                (count + 1) as f32 / n_files as f32,
                count + 1,
                worker_id,
            ))?;
        }
    }
    Ok(results)
}

/// Read many log files on `n_threads` workers.
///
/// The returned slots are in the order of `paths`, regardless of which worker finished first.
/// A slot is None if that file could not be read.
pub fn read_files(
    paths: &[PathBuf],
    n_threads: usize,
    tx: Option<&Sender<WorkerStatus>>,
) -> Result<Vec<Option<LogTable>>, ProcessorError> {
    if n_threads < 1 {
        return Err(ProcessorError::ConfigError(ConfigError::BadThreadCount(
            n_threads,
        )));
    }
    let total_bytes: u64 = paths
        .iter()
        .filter_map(|p| p.metadata().ok())
        .map(|m| m.len())
        .sum();
    log::info!(
        "Reading {} log files ({}) with {} workers",
        paths.len(),
        human_bytes::human_bytes(total_bytes as f64),
        n_threads
    );

    let subsets = create_subsets(paths.len(), n_threads);
    let joined = std::thread::scope(|scope| {
        let handles: Vec<_> = subsets
            .into_iter()
            .enumerate()
            .filter(|(_, subset)| !subset.is_empty()) // Dont make empty workers
            .map(|(worker_id, subset)| {
                let tx = tx.cloned();
                scope.spawn(move || read_subset(paths, subset, worker_id, tx.as_ref()))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    });

    let mut slots: Vec<Option<LogTable>> = (0..paths.len()).map(|_| None).collect();
    for worker in joined {
        let results = worker.map_err(|_| ProcessorError::WorkerPanic)??;
        for (idx, table) in results {
            slots[idx] = table;
        }
    }
    Ok(slots)
}

/// Read and concatenate files in request order using `n_threads` workers.
///
/// Returns None if no file could be read.
pub fn aggregate_files_parallel(
    paths: &[PathBuf],
    n_threads: usize,
    tx: Option<&Sender<WorkerStatus>>,
) -> Result<Option<UnifiedSeries>, ProcessorError> {
    let slots = read_files(paths, n_threads, tx)?;
    Ok(aggregate_tables(slots.into_iter().flatten()))
}

/// Gather everything logged between `start` and `end`.
///
/// The catalog is scanned by date, each candidate file is read, and files whose first..last
/// timestamps overlap the range are merged in catalog (chronological) order. Returns None if
/// no file has data in the range.
pub fn select_time_range(
    base: &Path,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    n_threads: usize,
    tx: Option<&Sender<WorkerStatus>>,
) -> Result<Option<RangeSelection>, ProcessorError> {
    let catalog = scan_catalog(base, Some(start.date()), Some(end.date()));
    let paths: Vec<PathBuf> = catalog.iter().map(|entry| entry.path.clone()).collect();
    let slots = read_files(&paths, n_threads, tx)?;

    let mut entries = Vec::new();
    let mut tables = Vec::new();
    for (entry, slot) in catalog.into_iter().zip(slots) {
        if let Some(table) = slot {
            if table.overlaps(start, end) {
                entries.push(entry);
                tables.push(table);
            }
        }
    }

    if tables.is_empty() {
        log::info!("No data found between {start} and {end}");
        return Ok(None);
    }
    Ok(aggregate_tables(tables).map(|series| RangeSelection { entries, series }))
}
