use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::error::{ReportError, Result};

const OUTLIER_IQR_MULTIPLIER: f64 = 1.5;

/// A single table value. Numeric cells render from the value they carry, so
/// the display text can never disagree with what sorting compares.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Cell {
    Text(String),
    Number(i64),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn number(value: impl Into<i64>) -> Self {
        Self::Number(value.into())
    }

    pub fn blank() -> Self {
        Self::Text(String::new())
    }

    pub fn flag(value: bool) -> Self {
        Self::Text(value.to_string())
    }

    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Self::Text(value) => Cow::Borrowed(value),
            Self::Number(value) => Cow::Owned(value.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Numbers compare by value, anything else by display text.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left.cmp(right),
            _ => self.display().cmp(&other.display()),
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text(value) => serializer.serialize_str(value),
            Self::Number(value) => serializer.serialize_i64(*value),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (column, descending) = match token.strip_prefix('!') {
            Some(name) => (name.trim(), true),
            None => (token, false),
        };
        if column.is_empty() {
            return None;
        }
        Some(Self {
            column: column.to_string(),
            descending,
        })
    }
}

/// Rows plus the view state layered over them. Hiding never removes data.
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
    hidden_columns: BTreeSet<usize>,
    hidden_rows: BTreeSet<usize>,
    sort_order: Vec<SortKey>,
}

impl Table {
    pub fn with_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn add_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.header.len() {
            return Err(ReportError::MalformedRow {
                expected: self.header.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn hidden_columns(&self) -> &BTreeSet<usize> {
        &self.hidden_columns
    }

    pub fn hide_columns(&mut self, columns: impl IntoIterator<Item = usize>) {
        let len = self.header.len();
        self.hidden_columns
            .extend(columns.into_iter().filter(|column| *column < len));
    }

    pub fn hidden_rows(&self) -> &BTreeSet<usize> {
        &self.hidden_rows
    }

    pub fn hide_rows(&mut self, rows: impl IntoIterator<Item = usize>) {
        let len = self.rows.len();
        self.hidden_rows
            .extend(rows.into_iter().filter(|row| *row < len));
    }

    pub fn visible_header(&self) -> Vec<&str> {
        self.header
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.hidden_columns.contains(index))
            .map(|(_, name)| name.as_str())
            .collect()
    }

    pub fn visible_rows(&self) -> Vec<Vec<&Cell>> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.hidden_rows.contains(index))
            .map(|(_, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(column, _)| !self.hidden_columns.contains(column))
                    .map(|(_, cell)| cell)
                    .collect()
            })
            .collect()
    }

    pub fn sort_order(&self) -> &[SortKey] {
        &self.sort_order
    }

    /// Sorts by one or more column names, first token being the primary key.
    /// A leading `!` sorts that key descending. Every token is resolved before
    /// any row moves, so an unknown name leaves the table untouched.
    pub fn sort_by_names<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<()> {
        let mut keys = Vec::new();
        let mut columns = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            let Some(key) = SortKey::parse(token) else {
                return Err(ReportError::UnknownSortColumn(token.to_string()));
            };
            let column = self
                .visible_column_index(&key.column)
                .ok_or_else(|| ReportError::UnknownSortColumn(key.column.clone()))?;
            columns.push((column, key.descending));
            keys.push(key);
        }

        if columns.is_empty() {
            return Ok(());
        }

        let mut order = (0..self.rows.len()).collect::<Vec<_>>();
        order.sort_by(|left, right| {
            compare_rows(&self.rows[*left], &self.rows[*right], &columns)
        });

        let mut slots = std::mem::take(&mut self.rows)
            .into_iter()
            .map(Some)
            .collect::<Vec<_>>();
        self.rows = order
            .iter()
            .map(|index| slots[*index].take().unwrap_or_default())
            .collect();
        self.hidden_rows = order
            .iter()
            .enumerate()
            .filter(|(_, previous)| self.hidden_rows.contains(*previous))
            .map(|(current, _)| current)
            .collect();
        self.sort_order = keys;
        Ok(())
    }

    /// Rows whose numeric value in `column` lies outside the Tukey fences
    /// (1.5 IQR beyond the quartiles) of every numeric value in that column.
    /// Text cells never count as out of range.
    pub fn list_out_of_range(&self, column: usize) -> Result<BTreeSet<usize>> {
        let Some((lower, upper)) = self.numeric_range(column)? else {
            return Ok(BTreeSet::new());
        };
        Ok(self.numeric_rows_where(column, |value| value < lower || value > upper))
    }

    /// The complement of `list_out_of_range` among numeric rows.
    pub fn list_in_range(&self, column: usize) -> Result<BTreeSet<usize>> {
        let Some((lower, upper)) = self.numeric_range(column)? else {
            return Ok(BTreeSet::new());
        };
        Ok(self.numeric_rows_where(column, |value| value >= lower && value <= upper))
    }

    fn numeric_range(&self, column: usize) -> Result<Option<(f64, f64)>> {
        if column >= self.header.len() {
            return Err(ReportError::ColumnOutOfBounds {
                index: column,
                len: self.header.len(),
            });
        }

        let mut values = self
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Cell::as_number))
            .map(|value| value as f64)
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_by(f64::total_cmp);

        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let spread = (q3 - q1) * OUTLIER_IQR_MULTIPLIER;
        Ok(Some((q1 - spread, q3 + spread)))
    }

    fn numeric_rows_where(&self, column: usize, keep: impl Fn(f64) -> bool) -> BTreeSet<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let value = row.get(column).and_then(Cell::as_number)? as f64;
                keep(value).then_some(index)
            })
            .collect()
    }

    fn visible_column_index(&self, name: &str) -> Option<usize> {
        self.header
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.hidden_columns.contains(index))
            .find(|(_, header)| header.eq_ignore_ascii_case(name))
            .map(|(index, _)| index)
    }
}

fn compare_rows(left: &Row, right: &Row, columns: &[(usize, bool)]) -> Ordering {
    for (column, descending) in columns {
        let ordering = match (left.get(*column), right.get(*column)) {
            (Some(left), Some(right)) => left.compare(right),
            (left, right) => left.is_some().cmp(&right.is_some()),
        };
        let ordering = if *descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

// linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], fraction: f64) -> f64 {
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
