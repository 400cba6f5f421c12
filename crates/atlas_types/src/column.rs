//! Column and table schema value objects.

use serde::{Deserialize, Serialize};

/// Primitive column types understood by the ingestion core.
///
/// Geometry carries an explicit spatial reference identifier; a geometry
/// column without one cannot be declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    Geometry { srid: u32 },
}

impl ColumnType {
    /// Returns all candidate types, most specific first.
    ///
    /// Text is the fallback and always remains possible.
    pub fn candidates() -> Vec<ColumnType> {
        vec![
            ColumnType::Boolean,
            ColumnType::Integer,
            ColumnType::Decimal,
            ColumnType::Date,
            ColumnType::Text,
        ]
    }

    /// SQL column type used when materializing a table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Decimal => "REAL",
            ColumnType::Boolean => "INTEGER",
            ColumnType::Date => "TEXT",
            ColumnType::Geometry { .. } => "TEXT",
        }
    }

    /// Whether a value of `self` can be stored in a column of type `other`
    /// without loss. Everything widens to text; integer widens to decimal.
    pub fn coercible_to(&self, other: &ColumnType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (_, ColumnType::Text) => true,
            (ColumnType::Integer, ColumnType::Decimal) => true,
            (ColumnType::Boolean, ColumnType::Integer) => true,
            (ColumnType::Geometry { srid: a }, ColumnType::Geometry { srid: b }) => a == b,
            _ => false,
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, ColumnType::Geometry { .. })
    }
}

/// Normalize a column name for cross-source comparison: lowercase, with
/// whitespace and punctuation collapsed to single underscores.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// One column of a probed or cataloged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

/// Declarative description of a table: name plus ordered columns.
///
/// This is a value object, not a handle to a physical table. The catalog
/// stores one per staging/master table; the prober synthesizes one per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// True when every column in `other` exists here by name.
    pub fn covers(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }
}
