//! Read-only scrollable cursor over a materialized rowset.
//!
//! The position is an ordinal: `-1` before the first row, `0..N` on a row,
//! `N` after the last row. Moves past either end saturate there.

use std::cell::Cell;

use crate::error::{CursorError, CursorResult};
use crate::value::{Number, Value};

/// A column addressed by 1-based index or by exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ColumnRef<'_> {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<i32> for ColumnRef<'_> {
    fn from(index: i32) -> Self {
        // Negative indexes map to 0, which is never valid.
        ColumnRef::Index(usize::try_from(index).unwrap_or(0))
    }
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(name: &'a str) -> Self {
        ColumnRef::Name(name)
    }
}

impl<'a> From<&'a String> for ColumnRef<'a> {
    fn from(name: &'a String) -> Self {
        ColumnRef::Name(name)
    }
}

/// Scrollable, read-only cursor.
#[derive(Debug, Clone)]
pub struct RowCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: i64,
    last_null: Cell<bool>,
}

impl RowCursor {
    /// Build a cursor positioned before the first row.
    ///
    /// Rows shorter than the column list are padded with nulls; longer
    /// rows are truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self {
            columns,
            rows,
            position: -1,
            last_null: Cell::new(false),
        }
    }

    /// A cursor with columns but no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn count(&self) -> i64 {
        self.rows.len() as i64
    }

    fn move_to(&mut self, target: i64) -> bool {
        if (0..self.count()).contains(&target) {
            self.position = target;
            true
        } else {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance one row. Saturates after the last row.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.position < self.count() {
            self.position += 1;
        }
        self.position < self.count()
    }

    /// Step back one row. Saturates before the first row.
    pub fn previous(&mut self) -> bool {
        if self.position >= 0 {
            self.position -= 1;
        }
        self.position >= 0
    }

    /// Jump to a 1-based row. Out of range leaves the cursor where it is.
    pub fn absolute(&mut self, row: i64) -> bool {
        self.move_to(row.saturating_sub(1))
    }

    /// Move by `delta - 1` rows, so `relative(1)` stays put and reports
    /// whether the cursor is on a row. Out of range leaves it where it is.
    pub fn relative(&mut self, delta: i64) -> bool {
        self.move_to(self.position.saturating_add(delta).saturating_sub(1))
    }

    /// Jump to the first row. `false` without moving when empty.
    pub fn first(&mut self) -> bool {
        self.move_to(0)
    }

    /// Jump to the last row. `false` without moving when empty.
    pub fn last(&mut self) -> bool {
        self.move_to(self.count() - 1)
    }

    pub fn before_first(&mut self) {
        self.position = -1;
    }

    pub fn after_last(&mut self) {
        self.position = self.count();
    }

    pub fn is_before_first(&self) -> bool {
        self.position < 0
    }

    pub fn is_after_last(&self) -> bool {
        self.position >= self.count()
    }

    pub fn is_first(&self) -> bool {
        !self.rows.is_empty() && self.position == 0
    }

    pub fn is_last(&self) -> bool {
        !self.rows.is_empty() && self.position == self.count() - 1
    }

    /// 1-based row number: 0 before the first row, `N + 1` after the last.
    pub fn row(&self) -> usize {
        usize::try_from(self.position + 1).unwrap_or(0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Column access
    // ─────────────────────────────────────────────────────────────────────────

    /// 1-based index of the column with exactly this name.
    pub fn find_column(&self, name: &str) -> CursorResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| i + 1)
            .ok_or_else(|| CursorError::ColumnNotFound(name.to_string()))
    }

    /// Whether the last value read was null.
    pub fn was_null(&self) -> bool {
        self.last_null.get()
    }

    pub fn get_object<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<Option<Value>> {
        let (_, value) = self.read(column)?;
        Ok((!value.is_null()).then(|| value.clone()))
    }

    pub fn get_string<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<Option<String>> {
        let (_, value) = self.read(column)?;
        Ok((!value.is_null()).then(|| value.to_string()))
    }

    /// Booleans as-is, text `true` (any case), non-zero numbers. Null is `false`.
    pub fn get_bool<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<bool> {
        let (_, value) = self.read(column)?;
        Ok(match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        })
    }

    pub fn get_byte<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<i8> {
        self.read_integer(column, "byte")
    }

    pub fn get_short<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<i16> {
        self.read_integer(column, "short")
    }

    pub fn get_int<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<i32> {
        self.read_integer(column, "int")
    }

    pub fn get_long<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<i64> {
        self.read_integer(column, "long")
    }

    pub fn get_float<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<f32> {
        self.read_float(column, "float").map(|d| d as f32)
    }

    pub fn get_double<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<f64> {
        self.read_float(column, "double")
    }

    fn column_index(&self, column: ColumnRef<'_>) -> CursorResult<usize> {
        match column {
            ColumnRef::Index(index) if (1..=self.columns.len()).contains(&index) => Ok(index - 1),
            ColumnRef::Index(index) => Err(CursorError::ColumnIndexOutOfRange {
                index,
                count: self.columns.len(),
            }),
            ColumnRef::Name(name) => self.find_column(name).map(|i| i - 1),
        }
    }

    fn read<'a>(&self, column: impl Into<ColumnRef<'a>>) -> CursorResult<(usize, &Value)> {
        let index = self.column_index(column.into())?;
        let row = usize::try_from(self.position)
            .ok()
            .and_then(|p| self.rows.get(p))
            .ok_or(CursorError::NoCurrentRow)?;
        let value = &row[index];
        self.last_null.set(value.is_null());
        Ok((index, value))
    }

    /// Integers go through [`Number`]; floats truncate toward zero, and a
    /// value outside the target range is a parse error.
    fn read_integer<'a, T>(&self, column: impl Into<ColumnRef<'a>>, target: &'static str) -> CursorResult<T>
    where
        T: TryFrom<i64> + Default,
    {
        let (index, value) = self.read(column)?;
        if value.is_null() {
            return Ok(T::default());
        }
        value
            .to_number()
            .and_then(Number::to_i64)
            .and_then(|i| T::try_from(i).ok())
            .ok_or_else(|| self.parse_error(index, value, target))
    }

    fn read_float<'a>(&self, column: impl Into<ColumnRef<'a>>, target: &'static str) -> CursorResult<f64> {
        let (index, value) = self.read(column)?;
        if value.is_null() {
            return Ok(0.0);
        }
        value
            .to_number()
            .map(Number::to_f64)
            .ok_or_else(|| self.parse_error(index, value, target))
    }

    fn parse_error(&self, index: usize, value: &Value, target: &'static str) -> CursorError {
        CursorError::Parse {
            column: self.columns[index].clone(),
            value: value.to_string(),
            target,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation (not supported)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn update<'a>(&mut self, _column: impl Into<ColumnRef<'a>>, _value: Value) -> CursorResult<()> {
        Err(CursorError::Unsupported("update"))
    }

    pub fn insert_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("insert_row"))
    }

    pub fn update_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("update_row"))
    }

    pub fn delete_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("delete_row"))
    }

    pub fn refresh_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("refresh_row"))
    }

    pub fn cancel_row_updates(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("cancel_row_updates"))
    }

    pub fn move_to_insert_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("move_to_insert_row"))
    }

    pub fn move_to_current_row(&mut self) -> CursorResult<()> {
        Err(CursorError::Unsupported("move_to_current_row"))
    }
}
