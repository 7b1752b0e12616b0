use calamine::Data;

/// A single cell value as read from (and written back to) a worksheet.
#[derive(Clone, Debug, PartialEq)]
pub enum CellScalar {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel serial date/time (days since the 1900 epoch, fractional part = time of day).
    DateTime(f64),
    Error(String),
}

impl CellScalar {
    pub fn is_empty(&self) -> bool {
        match self {
            CellScalar::Empty => true,
            CellScalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for header cells.
    pub fn to_header_text(&self) -> String {
        match self {
            CellScalar::Empty => String::new(),
            CellScalar::Number(n) | CellScalar::DateTime(n) => format_number(*n),
            CellScalar::Text(s) => s.clone(),
            CellScalar::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellScalar::Error(e) => e.clone(),
        }
    }
}

impl From<&Data> for CellScalar {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => CellScalar::Empty,
            Data::Int(i) => CellScalar::Number(*i as f64),
            Data::Float(f) => CellScalar::Number(*f),
            Data::String(s) => CellScalar::Text(s.clone()),
            Data::Bool(b) => CellScalar::Bool(*b),
            Data::DateTime(dt) => CellScalar::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellScalar::Text(s.clone()),
            Data::Error(e) => CellScalar::Error(e.to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A worksheet read as a header row plus data rows.
///
/// Every data row has exactly `headers.len()` cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellScalar>>,
}

impl Table {
    pub fn new(sheet_name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a data row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<CellScalar>) {
        row.resize(self.headers.len(), CellScalar::Empty);
        self.rows.push(row);
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellScalar> + '_ {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }
}
