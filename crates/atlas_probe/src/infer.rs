//! Elimination-based type inference.
//!
//! The inferencer starts with every primitive type possible for a column and
//! eliminates candidates as values are seen. Whatever survives, most specific
//! first, is the inferred type; text is the fallback and never eliminated.

use atlas_types::ColumnType;
use chrono::NaiveDate;
use std::collections::HashSet;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];

const WKT_PREFIXES: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Per-column type inferencer.
#[derive(Debug)]
pub struct TypeInferencer {
    possible: HashSet<&'static str>,
    geometry_srid: u32,
    has_values: bool,
    null_count: usize,
    values_processed: usize,
}

impl TypeInferencer {
    pub fn new(geometry_srid: u32) -> Self {
        let possible = ["boolean", "integer", "decimal", "date", "geometry"]
            .into_iter()
            .collect();
        Self {
            possible,
            geometry_srid,
            has_values: false,
            null_count: 0,
            values_processed: 0,
        }
    }

    /// Add a value and eliminate impossible interpretations.
    pub fn add_value(&mut self, value: &str) {
        self.values_processed += 1;

        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "NA" {
            self.null_count += 1;
            return;
        }
        self.has_values = true;

        if self.possible.contains("boolean") && !is_boolean(trimmed) {
            self.possible.remove("boolean");
        }
        if self.possible.contains("integer") && !is_integer(trimmed) {
            self.possible.remove("integer");
        }
        if self.possible.contains("decimal") && !is_decimal(trimmed) {
            self.possible.remove("decimal");
        }
        if self.possible.contains("date") && !is_date(trimmed) {
            self.possible.remove("date");
        }
        if self.possible.contains("geometry") && !is_wkt(trimmed) {
            self.possible.remove("geometry");
        }
    }

    /// Resolve to the most specific surviving type.
    ///
    /// A column with no non-null values resolves to text: nothing was proven.
    pub fn resolve(&self) -> ColumnType {
        if !self.has_values {
            return ColumnType::Text;
        }
        if self.possible.contains("boolean") {
            return ColumnType::Boolean;
        }
        if self.possible.contains("integer") {
            return ColumnType::Integer;
        }
        if self.possible.contains("decimal") {
            return ColumnType::Decimal;
        }
        if self.possible.contains("date") {
            return ColumnType::Date;
        }
        if self.possible.contains("geometry") {
            return ColumnType::Geometry {
                srid: self.geometry_srid,
            };
        }
        ColumnType::Text
    }
}

fn is_boolean(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("no")
        || matches!(value, "y" | "Y" | "n" | "N" | "1" | "0" | "t" | "T" | "f" | "F")
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    // Leading zeros mean a code (postcode sector, admin key), not a number
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    true
}

fn is_decimal(value: &str) -> bool {
    if is_integer(value) {
        return true;
    }
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    if !unsigned.contains('.') {
        return false;
    }
    unsigned.parse::<f64>().is_ok()
}

fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
}

fn is_wkt(value: &str) -> bool {
    let upper = value.trim_start().to_ascii_uppercase();
    // EWKT is also accepted: SRID=27700;POINT(1 2)
    let body = match upper.strip_prefix("SRID=") {
        Some(rest) => match rest.split_once(';') {
            Some((_, body)) => body.trim_start().to_string(),
            None => return false,
        },
        None => upper,
    };
    WKT_PREFIXES
        .iter()
        .any(|prefix| body.starts_with(prefix) && body.contains('('))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_values(values: &[&str]) -> ColumnType {
        let mut inferencer = TypeInferencer::new(27700);
        for v in values {
            inferencer.add_value(v);
        }
        inferencer.resolve()
    }

    #[test]
    fn integers_resolve() {
        assert_eq!(
            resolve_values(&["385386", "-42", "801193"]),
            ColumnType::Integer
        );
    }

    #[test]
    fn leading_zero_codes_stay_text() {
        assert_eq!(resolve_values(&["0121", "0161", "0113"]), ColumnType::Text);
    }

    #[test]
    fn decimals_resolve() {
        assert_eq!(
            resolve_values(&["385386.5", "801193.0"]),
            ColumnType::Decimal
        );
    }

    #[test]
    fn mixed_integer_and_decimal_resolves_decimal() {
        assert_eq!(resolve_values(&["12", "12.5"]), ColumnType::Decimal);
    }

    #[test]
    fn booleans_resolve() {
        assert_eq!(resolve_values(&["true", "FALSE", "yes"]), ColumnType::Boolean);
        // One non-boolean value eliminates the candidate
        assert_eq!(resolve_values(&["true", "maybe"]), ColumnType::Text);
    }

    #[test]
    fn dates_resolve_across_formats() {
        assert_eq!(
            resolve_values(&["2024-06-15", "2024-12-01"]),
            ColumnType::Date
        );
        assert_eq!(
            resolve_values(&["15/06/2024", "01/12/2024"]),
            ColumnType::Date
        );
        assert_eq!(resolve_values(&["2024-06-15", "not a date"]), ColumnType::Text);
    }

    #[test]
    fn wkt_resolves_geometry_with_srid() {
        assert_eq!(
            resolve_values(&["POINT(385386 801193)", "point(1 2)"]),
            ColumnType::Geometry { srid: 27700 }
        );
        assert_eq!(
            resolve_values(&["SRID=27700;POINT(385386 801193)"]),
            ColumnType::Geometry { srid: 27700 }
        );
    }

    #[test]
    fn nulls_do_not_eliminate() {
        assert_eq!(
            resolve_values(&["", "NA", "42", "null", "7"]),
            ColumnType::Integer
        );
    }

    #[test]
    fn all_null_column_is_text() {
        assert_eq!(resolve_values(&["", "NA", "null"]), ColumnType::Text);
    }
}
