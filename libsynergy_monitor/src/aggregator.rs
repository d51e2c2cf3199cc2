use std::path::Path;

use fxhash::FxHashMap;
use time::PrimitiveDateTime;

use super::log_file::LogTable;

/// One observation of a channel. `value` is None for a missing value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: PrimitiveDateTime,
    pub value: Option<f64>,
}

/// Summary statistics over the present values of a series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesStats {
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub last: Option<f64>,
}

/// Per-channel series concatenated from several log files.
///
/// The channel set is fixed by the first table appended; later tables only contribute to
/// channels that already exist. Samples stay in append order unless
/// [`UnifiedSeries::sort_chronologically`] is called.
#[derive(Debug, Clone, Default)]
pub struct UnifiedSeries {
    columns: Vec<String>,
    series: FxHashMap<String, Vec<Sample>>,
    n_tables: usize,
    n_rows: usize,
}

impl UnifiedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the contents of a table. The first table seeds the channel set.
    pub fn append_table(&mut self, table: &LogTable) {
        if self.n_tables == 0 {
            for column in table.columns() {
                if self.series.contains_key(&column.name) {
                    continue;
                }
                self.columns.push(column.name.clone());
                self.series.insert(column.name.clone(), Vec::new());
            }
        }

        for column in table.columns() {
            let Some(series) = self.series.get_mut(&column.name) else {
                log::debug!(
                    "Dropping channel {} from {}: not present in the first file",
                    column.name,
                    table.path().display()
                );
                continue;
            };
            series.extend(
                table
                    .timestamps()
                    .iter()
                    .zip(column.values.iter())
                    .map(|(timestamp, value)| Sample {
                        timestamp: *timestamp,
                        value: *value,
                    }),
            );
        }
        self.n_tables += 1;
        self.n_rows += table.len();
    }

    /// Stable sort of every series by timestamp
    pub fn sort_chronologically(&mut self) {
        for series in self.series.values_mut() {
            series.sort_by_key(|sample| sample.timestamp);
        }
    }

    /// Channel names in the order of the first file's header
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn series(&self, column: &str) -> Option<&[Sample]> {
        self.series.get(column).map(Vec::as_slice)
    }

    /// The most recent sample with a present value
    pub fn latest(&self, column: &str) -> Option<Sample> {
        self.series(column)?
            .iter()
            .filter(|sample| sample.value.is_some())
            .max_by_key(|sample| sample.timestamp)
            .copied()
    }

    /// Number of tables that have been appended
    pub fn n_tables(&self) -> usize {
        self.n_tables
    }

    /// Total number of rows appended, duplicates included
    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn stats(&self, column: &str) -> Option<SeriesStats> {
        let series = self.series(column)?;
        let mut stats = SeriesStats::default();
        let mut sum = 0.0;
        for sample in series {
            match sample.value {
                Some(v) => {
                    stats.count += 1;
                    sum += v;
                    stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
                    stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
                    stats.last = Some(v);
                }
                None => stats.missing += 1,
            }
        }
        if stats.count > 0 {
            stats.mean = Some(sum / stats.count as f64);
        }
        Some(stats)
    }
}

/// Read and concatenate a list of log files, in the order given.
///
/// Files that fail to read are logged and skipped. Returns None if no file could be read.
pub fn aggregate_files<P: AsRef<Path>>(paths: &[P]) -> Option<UnifiedSeries> {
    let tables = paths.iter().filter_map(|path| {
        let path = path.as_ref();
        match LogTable::read(path) {
            Ok(table) => Some(table),
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                None
            }
        }
    });
    aggregate_tables(tables)
}

/// Concatenate already parsed tables, in iteration order. Returns None if there are none.
pub fn aggregate_tables<I>(tables: I) -> Option<UnifiedSeries>
where
    I: IntoIterator<Item = LogTable>,
{
    let mut unified = UnifiedSeries::new();
    for table in tables {
        unified.append_table(&table);
    }
    if unified.n_tables() == 0 {
        None
    } else {
        Some(unified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use time::macros::datetime;

    const FIRST: &str = "[Jeol_MicroED 2]\ntime\tHT [kV]\tGun PiG2\n\
2025-05-12 10:00:00\t200.0\t1.0\n\
2025-05-12 10:00:10\t200.0\t1.1\n\
2025-05-12 10:00:20\t199.0\t1.2\n";

    // Overlaps FIRST in time and carries an extra channel
    const SECOND: &str = "[Jeol_MicroED 2]\ntime\tHT [kV]\tGun PiG2\tRT1 PiG5\n\
2025-05-12 10:00:15\t198.0\t1.3\t5.0\n\
2025-05-12 10:00:25\tbad\t1.4\t5.1\n";

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_concatenation_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dat", FIRST);
        let b = write(dir.path(), "b.dat", SECOND);
        let unified = aggregate_files(&[a, b]).unwrap();
        assert_eq!(unified.series("HT [kV]").unwrap().len(), 5);
        assert_eq!(unified.series("Gun PiG2").unwrap().len(), 5);
        assert_eq!(unified.n_tables(), 2);
        assert_eq!(unified.len(), 5);
        assert!(!unified.is_empty());
        assert!(UnifiedSeries::new().is_empty());
    }

    #[test]
    fn test_schema_fixed_by_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dat", FIRST);
        let b = write(dir.path(), "b.dat", SECOND);
        let unified = aggregate_files(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(unified.columns(), &["HT [kV]", "Gun PiG2"]);
        assert!(unified.series("RT1 PiG5").is_none());

        let unified = aggregate_files(&[b, a]).unwrap();
        assert_eq!(unified.series("RT1 PiG5").unwrap().len(), 2);
    }

    #[test]
    fn test_order_is_preserved_until_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dat", FIRST);
        let b = write(dir.path(), "b.dat", SECOND);
        let mut unified = aggregate_files(&[a, b]).unwrap();
        let times: Vec<_> = unified
            .series("HT [kV]")
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(times[3], datetime!(2025-05-12 10:00:15));
        assert_eq!(times[2], datetime!(2025-05-12 10:00:20));

        unified.sort_chronologically();
        let series = unified.series("HT [kV]").unwrap();
        assert!(series.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(series[2].value, Some(198.0));
    }

    #[test]
    fn test_repeated_column_does_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let contents = "[Jeol_MicroED 2]\ntime\tHT [kV]\tHT [kV]\n\
2025-05-12 10:00:00\t200.0\t1.0\n\
2025-05-12 10:00:10\t201.0\t2.0\n";
        let a = write(dir.path(), "a.dat", contents);
        let b = write(dir.path(), "b.dat", contents);
        let unified = aggregate_files(&[a, b]).unwrap();
        let values: Vec<_> = unified
            .series("HT [kV]")
            .unwrap()
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(
            values,
            vec![Some(200.0), Some(201.0), Some(200.0), Some(201.0)]
        );
        assert_eq!(unified.series("HT [kV].1").unwrap().len(), 4);
        assert_eq!(unified.len(), 4);
    }

    #[test]
    fn test_failed_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.dat");
        let a = write(dir.path(), "a.dat", FIRST);
        let unified = aggregate_files(&[missing.clone(), a]).unwrap();
        assert_eq!(unified.series("HT [kV]").unwrap().len(), 3);

        assert!(aggregate_files(&[missing]).is_none());
        assert!(aggregate_files::<&Path>(&[]).is_none());
    }

    #[test]
    fn test_latest_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dat", FIRST);
        let b = write(dir.path(), "b.dat", SECOND);
        let unified = aggregate_files(&[a, b]).unwrap();

        let latest = unified.latest("HT [kV]").unwrap();
        assert_eq!(latest.timestamp, datetime!(2025-05-12 10:00:20));
        assert_eq!(latest.value, Some(199.0));

        let stats = unified.stats("HT [kV]").unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, Some(198.0));
        assert_eq!(stats.max, Some(200.0));
        assert_eq!(stats.last, Some(198.0));
        assert_eq!(stats.mean, Some(199.25));
    }
}
