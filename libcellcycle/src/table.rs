// RawTable is the hand-off point between whatever decoded the instrument file and the
// vendor adapters. Binary decoders produce one directly; delimited exports (csv, tsv, txt)
// are read here. A column is numeric when every non-empty cell parses as a float, otherwise
// it is kept as text so adapters can decide what to do with mixed columns.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use fxhash::FxHashMap;

use super::error::TableError;

/// A single named column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    /// The cell at `row` as text. Numeric NaN is an empty cell.
    pub fn cell(&self, row: usize) -> String {
        match self {
            Self::Numeric(v) if v[row].is_nan() => String::new(),
            Self::Numeric(v) => v[row].to_string(),
            Self::Text(v) => v[row].clone(),
        }
    }

    /// The cell at `row` as a number, if it is one. Empty cells are NaN.
    pub fn value(&self, row: usize) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(v[row]),
            Self::Text(v) => parse_cell(&v[row]),
        }
    }

    fn from_cells(cells: Vec<String>) -> Self {
        let parsed: Option<Vec<f64>> = cells.iter().map(|c| parse_cell(c)).collect();
        match parsed {
            Some(values) => Self::Numeric(values),
            None => Self::Text(cells),
        }
    }

    fn select(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(rows.iter().map(|r| v[*r]).collect()),
            Self::Text(v) => Self::Text(rows.iter().map(|r| v[*r].clone()).collect()),
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// An ordered set of equal-length named columns
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: Vec<String>,
    columns: FxHashMap<String, Column>,
    n_rows: usize,
}

impl RawTable {
    /// Build a table from a header row and text rows. Short rows are padded with empty cells,
    /// and long rows widen the table with unnamed columns.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let mut names: Vec<String> = Vec::with_capacity(width);
        for idx in 0..width {
            let name = header.get(idx).map(|h| h.trim()).unwrap_or("");
            if name.is_empty() || names.iter().any(|n| n == name) {
                names.push(format!("Unnamed: {idx}"));
            } else {
                names.push(name.to_string());
            }
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); width];
        for row in rows.iter() {
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(row.get(idx).map(|c| c.trim().to_string()).unwrap_or_default());
            }
        }

        let mut table = Self {
            n_rows: rows.len(),
            ..Default::default()
        };
        for (name, column) in names.into_iter().zip(cells) {
            table.columns.insert(name.clone(), Column::from_cells(column));
            table.headers.push(name);
        }
        table
    }

    /// Parse delimited text. The first non-blank record is the header. Quoted fields follow
    /// RFC 4180, and records may have differing widths.
    pub fn parse_delimited(contents: &str, delimiter: char) -> Result<Self, TableError> {
        Self::from_reader(contents.as_bytes(), delimiter)
    }

    /// Read a delimited text file
    pub fn read_delimited(path: &Path, delimiter: char) -> Result<Self, TableError> {
        if !path.exists() {
            return Err(TableError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), delimiter)
    }

    fn from_reader<R: Read>(source: R, delimiter: char) -> Result<Self, TableError> {
        let delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(TableError::BadDelimiter(delimiter))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            records.push(record.iter().map(String::from).collect());
        }
        let mut records = records.into_iter();
        let header = records.next().ok_or(TableError::NoHeader)?;
        Ok(Self::from_rows(header, records.collect()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has_column(n))
    }

    /// The first of `names` present in the table
    pub fn first_present<'a>(&self, names: &[&'a str]) -> Option<&'a str> {
        names.iter().copied().find(|n| self.has_column(n))
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.columns
            .get(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// A column as numbers. Fails on the first cell that is not numeric.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>, TableError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values.clone()),
            Column::Text(cells) => cells
                .iter()
                .enumerate()
                .map(|(row, cell)| {
                    parse_cell(cell).ok_or_else(|| TableError::NonNumeric {
                        column: name.to_string(),
                        row,
                        value: cell.clone(),
                    })
                })
                .collect(),
        }
    }

    /// A column as text, numeric cells formatted
    pub fn text(&self, name: &str) -> Result<Vec<String>, TableError> {
        let column = self.column(name)?;
        Ok((0..self.n_rows).map(|row| column.cell(row)).collect())
    }

    /// Keep only the rows for which `keep` is true
    pub fn retain_rows(&self, keep: impl Fn(usize) -> bool) -> Self {
        let rows: Vec<usize> = (0..self.n_rows).filter(|r| keep(*r)).collect();
        self.select_rows(&rows)
    }

    /// Reorder the rows by a numeric column, ascending. NaN sorts last.
    pub fn sort_by(&self, name: &str) -> Result<Self, TableError> {
        let key = self.numeric(name)?;
        let mut rows: Vec<usize> = (0..self.n_rows).collect();
        rows.sort_by(|a, b| key[*a].total_cmp(&key[*b]));
        Ok(self.select_rows(&rows))
    }

    /// Use the first row holding a cell equal to `marker` as the header, dropping it and every
    /// row above it.
    ///
    /// Some exports prefix the data with a block of test metadata, so the real header is buried
    /// a few rows down.
    pub fn promote_header(&self, marker: &str) -> Result<Self, TableError> {
        let header_row = (0..self.n_rows)
            .find(|row| {
                self.headers
                    .iter()
                    .any(|h| self.columns[h].cell(*row).trim() == marker)
            })
            .ok_or_else(|| TableError::NoHeaderRow(marker.to_string()))?;

        let row_cells = |row: usize| -> Vec<String> {
            self.headers
                .iter()
                .map(|h| self.columns[h].cell(row))
                .collect()
        };
        let header = row_cells(header_row);
        let rows = ((header_row + 1)..self.n_rows).map(row_cells).collect();
        Ok(Self::from_rows(header, rows))
    }

    fn select_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.select(rows)))
            .collect();
        Self {
            headers: self.headers.clone(),
            columns,
            n_rows: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_types_columns() {
        let table =
            RawTable::parse_delimited("a,b,c\n1,x,\n2.5,y,3\n\n", ',').unwrap();
        assert_eq!(table.headers(), &["a", "b", "c"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.numeric("a").unwrap(), vec![1.0, 2.5]);
        assert!(matches!(table.column("b").unwrap(), Column::Text(_)));
        let c = table.numeric("c").unwrap();
        assert!(c[0].is_nan());
        assert_eq!(c[1], 3.0);
        match table.numeric("b") {
            Err(TableError::NonNumeric { row, value, .. }) => {
                assert_eq!(row, 0);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            table.numeric("d"),
            Err(TableError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(matches!(
            RawTable::parse_delimited("\n \n", '\t'),
            Err(TableError::NoHeader)
        ));
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let table = RawTable::parse_delimited("a\tb\n1\n2\t3\t4\n", '\t').unwrap();
        assert_eq!(table.headers(), &["a", "b", "Unnamed: 2"]);
        assert!(table.numeric("b").unwrap()[0].is_nan());
        assert_eq!(table.numeric("Unnamed: 2").unwrap()[1], 4.0);
    }

    #[test]
    fn test_promote_header() {
        let contents = "Test,info\nCell,A1\nIndex,Voltage/V\n1,3.1\n2,3.2\n";
        let table = RawTable::parse_delimited(contents, ',').unwrap();
        assert!(!table.has_column("Voltage/V"));
        let promoted = table.promote_header("Index").unwrap();
        assert_eq!(promoted.headers(), &["Index", "Voltage/V"]);
        assert_eq!(promoted.numeric("Voltage/V").unwrap(), vec![3.1, 3.2]);
        assert!(matches!(
            table.promote_header("Nothing"),
            Err(TableError::NoHeaderRow(_))
        ));
    }

    #[test]
    fn test_sort_and_retain() {
        let table = RawTable::parse_delimited("k,v\n3,c\n1,a\n2,b\n", ',').unwrap();
        let sorted = table.sort_by("k").unwrap();
        assert_eq!(sorted.text("v").unwrap(), vec!["a", "b", "c"]);
        let kept = sorted.retain_rows(|r| r != 1);
        assert_eq!(kept.numeric("k").unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_quoted_fields() {
        let contents = "\"Current(A)\",\"Voltage(V)\",Note\n\
                        0.5,3.1,\"a, b\"\n\
                        0.5,3.2,\"say \"\"hi\"\"\"\n";
        let table = RawTable::parse_delimited(contents, ',').unwrap();
        assert_eq!(table.headers(), &["Current(A)", "Voltage(V)", "Note"]);
        assert_eq!(table.numeric("Voltage(V)").unwrap(), vec![3.1, 3.2]);
        assert_eq!(table.text("Note").unwrap(), vec!["a, b", "say \"hi\""]);
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        assert!(matches!(
            RawTable::parse_delimited("a;b\n", '§'),
            Err(TableError::BadDelimiter('§'))
        ));
        assert!(matches!(
            RawTable::parse_delimited("a€b\n", '€'),
            Err(TableError::BadDelimiter('€'))
        ));
    }

    #[test]
    fn test_read_delimited_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "time /s\tI /mA\tE /V\r\n0\t1\t3.0\r\n1\t1\t3.1\r\n").unwrap();
        let table = RawTable::read_delimited(file.path(), '\t').unwrap();
        assert!(table.has_columns(&["time /s", "I /mA", "E /V"]));
        assert_eq!(table.numeric("E /V").unwrap(), vec![3.0, 3.1]);

        let missing = Path::new("/definitely/not/here.csv");
        assert!(matches!(
            RawTable::read_delimited(missing, ','),
            Err(TableError::BadFilePath(_))
        ));
    }
}
