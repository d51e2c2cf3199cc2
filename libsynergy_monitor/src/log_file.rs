use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use fxhash::FxHashSet;
use time::macros::format_description;
use time::PrimitiveDateTime;

use super::constants::HEADER_LINE_COUNT;
use super::error::LogFileError;

/// A single named channel of a log file. Missing values (blank or non-numeric cells) are None.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// The parsed contents of one instrument log file.
///
/// Rows are kept in file order and indexed by their timestamp. Every column has exactly one
/// value slot per row, so `column.values[i]` belongs to `timestamps[i]`.
#[derive(Debug, Clone)]
pub struct LogTable {
    path: PathBuf,
    timestamps: Vec<PrimitiveDateTime>,
    columns: Vec<Column>,
    skipped_rows: usize,
}

impl LogTable {
    /// Read and parse a log file.
    ///
    /// The file has a two line preamble: an identifier banner (ignored) and a tab-delimited
    /// header naming the columns. The first column is always the timestamp.
    pub fn read(path: &Path) -> Result<Self, LogFileError> {
        if !path.exists() {
            return Err(LogFileError::BadFilePath(path.to_path_buf()));
        }
        // The instrument PC does not always write clean UTF-8 in the banner line
        let bytes = std::fs::read(path)?;
        let contents = String::from_utf8_lossy(&bytes);
        let table = Self::parse(path, &contents)?;
        if table.skipped_rows > 0 {
            log::warn!(
                "Skipped {} rows without a readable timestamp in {}",
                table.skipped_rows,
                path.display()
            );
        }
        Ok(table)
    }

    /// Parse log file contents that have already been loaded. `path` is only kept for reference.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, LogFileError> {
        let mut lines = contents.lines();
        lines.next(); // Skip the banner
        let header = match lines.next() {
            Some(line) => parse_header(line),
            None => return Err(LogFileError::MissingHeader(path.to_path_buf())),
        };
        if header.is_empty() {
            return Err(LogFileError::MissingHeader(path.to_path_buf()));
        }

        let mut table = LogTable {
            path: path.to_path_buf(),
            timestamps: Vec::new(),
            columns: header[1..]
                .iter()
                .map(|name| Column {
                    name: name.clone(),
                    values: Vec::new(),
                })
                .collect(),
            skipped_rows: 0,
        };

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let timestamp = match fields.next().and_then(parse_row_timestamp) {
                Some(ts) => ts,
                None => {
                    table.skipped_rows += 1;
                    continue;
                }
            };
            table.timestamps.push(timestamp);
            // Rows shorter than the header are padded with missing values, longer rows truncated
            for column in table.columns.iter_mut() {
                column.values.push(fields.next().and_then(parse_cell));
            }
        }

        Ok(table)
    }

    /// Read only as far as the first data row and return its timestamp.
    ///
    /// Used when a file's name does not tell us when it was written. Returns None if the file
    /// has no rows with a readable timestamp.
    pub fn read_first_timestamp(path: &Path) -> Result<Option<PrimitiveDateTime>, LogFileError> {
        if !path.exists() {
            return Err(LogFileError::BadFilePath(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        for line in reader.split(b'\n').skip(HEADER_LINE_COUNT) {
            let line = line?;
            let line = String::from_utf8_lossy(&line);
            if let Some(ts) = line.split('\t').next().and_then(parse_row_timestamp) {
                return Ok(Some(ts));
            }
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timestamps(&self) -> &[PrimitiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Iterate over the (timestamp, value) pairs of a single column
    pub fn series<'a>(
        &'a self,
        name: &str,
    ) -> Option<impl Iterator<Item = (PrimitiveDateTime, Option<f64>)> + 'a> {
        let column = self.column(name)?;
        Some(
            self.timestamps
                .iter()
                .copied()
                .zip(column.values.iter().copied()),
        )
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Rows dropped because their timestamp could not be read
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn first_timestamp(&self) -> Option<PrimitiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<PrimitiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Check if the file's time span intersects [start, end]. An empty file overlaps nothing.
    pub fn overlaps(&self, start: PrimitiveDateTime, end: PrimitiveDateTime) -> bool {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => first <= end && last >= start,
            _ => false,
        }
    }
}

/// Split the header line into column names, dropping the blank tokens left by padding tabs.
/// A repeated name gets a `.1`, `.2`, ... suffix so every column stays addressable.
fn parse_header(line: &str) -> Vec<String> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut names = Vec::new();
    for token in line.split('\t').map(str::trim).filter(|t| !t.is_empty()) {
        let mut name = token.to_string();
        let mut copy = 0;
        while seen.contains(&name) {
            copy += 1;
            name = format!("{token}.{copy}");
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// Coerce a cell to a float. Anything non-numeric is a missing value, including NaN.
fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Remove a fractional seconds component; the series have second resolution
fn strip_fraction(field: &str) -> String {
    if let Some(dot) = field.find('.') {
        let rest = &field[dot + 1..];
        let n_digits = rest.chars().take_while(char::is_ascii_digit).count();
        if n_digits > 0 {
            return format!("{}{}", &field[..dot], &rest[n_digits..]);
        }
    }
    field.to_string()
}

/// Parse the timestamp cell of a data row. The instrument has written several layouts over the
/// years, so try each of them.
fn parse_row_timestamp(field: &str) -> Option<PrimitiveDateTime> {
    let field = strip_fraction(field.trim());
    PrimitiveDateTime::parse(
        &field,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            &field,
            &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            &field,
            &format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            &field,
            &format_description!(
                "[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"
            ),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            &field,
            &format_description!(
                "[month padding:none]/[day padding:none]/[year] [hour repr:12 padding:none]:[minute]:[second] [period]"
            ),
        )
    })
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::macros::datetime;

    const SAMPLE: &str = "[Jeol_MicroED 2]\n\
time\tHT [kV]\tBeam Current [uA]\tStage X [um]\t\t\n\
2025-05-12 12:48:37\t200.0\t 12.5 \t-3.25\n\
2025-05-12 12:48:39\t200.1\tERR\t-3.25\n\
2025-05-12 12:48:41\t199.9\t12.4\n";

    fn write_sample(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_header_drops_blank_tokens() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["HT [kV]", "Beam Current [uA]", "Stage X [um]"]);
    }

    #[test]
    fn test_repeated_header_names_are_suffixed() {
        let contents = "[Jeol_MicroED 2]\ntime\tHT [kV]\tGun PiG2\tHT [kV]\tHT [kV]\n\
2025-05-12 12:48:37\t200.0\t1.0\t5.0\t6.0\n";
        let table = LogTable::parse(Path::new("sample"), contents).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["HT [kV]", "Gun PiG2", "HT [kV].1", "HT [kV].2"]);
        assert_eq!(table.column("HT [kV]").unwrap().values, vec![Some(200.0)]);
        assert_eq!(table.column("HT [kV].1").unwrap().values, vec![Some(5.0)]);
    }

    #[test]
    fn test_rows_and_whitespace() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.first_timestamp(), Some(datetime!(2025-05-12 12:48:37)));
        assert_eq!(table.last_timestamp(), Some(datetime!(2025-05-12 12:48:41)));
        let current = table.column("Beam Current [uA]").unwrap();
        assert_eq!(current.values[0], Some(12.5));
    }

    #[test]
    fn test_malformed_cell_is_missing() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        let current = table.column("Beam Current [uA]").unwrap();
        assert_eq!(current.values[1], None);
        // The rest of the row is intact
        assert_eq!(table.column("HT [kV]").unwrap().values[1], Some(200.1));
        assert_eq!(table.column("Stage X [um]").unwrap().values[1], Some(-3.25));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_short_row_is_padded() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        assert_eq!(table.column("Stage X [um]").unwrap().values[2], None);
        assert_eq!(table.column("Stage X [um]").unwrap().values.len(), 3);
    }

    #[test]
    fn test_series() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        let series: Vec<_> = table.series("HT [kV]").unwrap().collect();
        assert_eq!(series[2], (datetime!(2025-05-12 12:48:41), Some(199.9)));
        assert!(table.series("Gun PiG2").is_none());
    }

    #[test]
    fn test_bad_timestamp_row_is_skipped() {
        let contents = "[Jeol_MicroED 2]\ntime\tHT [kV]\n\
garbage\t1.0\n\
2025-05-12 12:48:37\t2.0\n\n";
        let table = LogTable::parse(Path::new("sample"), contents).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped_rows(), 1);
    }

    #[test]
    fn test_timestamp_layouts() {
        assert_eq!(
            parse_row_timestamp("2025-05-12T12:48:37"),
            Some(datetime!(2025-05-12 12:48:37))
        );
        assert_eq!(
            parse_row_timestamp("2025/05/12 12:48:37"),
            Some(datetime!(2025-05-12 12:48:37))
        );
        assert_eq!(
            parse_row_timestamp("2025-05-12 12:48:37.250"),
            Some(datetime!(2025-05-12 12:48:37))
        );
        assert_eq!(
            parse_row_timestamp("5/12/2025 12:48:37"),
            Some(datetime!(2025-05-12 12:48:37))
        );
        assert_eq!(
            parse_row_timestamp("5/12/2025 1:48:37 PM"),
            Some(datetime!(2025-05-12 13:48:37))
        );
        assert_eq!(parse_row_timestamp("12:48:37"), None);
    }

    #[test]
    fn test_missing_header() {
        let result = LogTable::parse(Path::new("sample"), "[Jeol_MicroED 2]\n");
        assert!(matches!(result, Err(LogFileError::MissingHeader(_))));
        let result = LogTable::parse(Path::new("sample"), "[Jeol_MicroED 2]\n\t\t\n");
        assert!(matches!(result, Err(LogFileError::MissingHeader(_))));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "EDAutoLog.dat", SAMPLE);
        let table = LogTable::read(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.path(), path.as_path());
        assert_eq!(
            LogTable::read_first_timestamp(&path).unwrap(),
            Some(datetime!(2025-05-12 12:48:37))
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = LogTable::read(&dir.path().join("nope.dat"));
        assert!(matches!(result, Err(LogFileError::BadFilePath(_))));
    }

    #[test]
    fn test_overlaps() {
        let table = LogTable::parse(Path::new("sample"), SAMPLE).unwrap();
        assert!(table.overlaps(
            datetime!(2025-05-12 12:48:40),
            datetime!(2025-05-12 13:00:00)
        ));
        assert!(!table.overlaps(
            datetime!(2025-05-12 12:48:42),
            datetime!(2025-05-12 13:00:00)
        ));
    }
}
