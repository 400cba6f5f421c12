//! Migration-time value coercion checks.
//!
//! SQLite's type affinity will happily store anything anywhere, so the
//! migrator validates values itself before promoting them into a typed
//! master column. Checks mirror the prober's inference rules.

use atlas_types::ColumnType;
use chrono::NaiveDate;

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

/// Check that a staging value can be stored in a master column of `ty`.
pub fn value_fits(value: &str, ty: &ColumnType) -> Result<(), String> {
    let trimmed = value.trim();
    match ty {
        ColumnType::Text => Ok(()),
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not an integer", trimmed)),
        ColumnType::Decimal => trimmed
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a number", trimmed)),
        ColumnType::Boolean => {
            let ok = trimmed.eq_ignore_ascii_case("true")
                || trimmed.eq_ignore_ascii_case("false")
                || trimmed.eq_ignore_ascii_case("yes")
                || trimmed.eq_ignore_ascii_case("no")
                || matches!(trimmed, "0" | "1" | "t" | "f" | "T" | "F" | "y" | "Y" | "n" | "N");
            if ok {
                Ok(())
            } else {
                Err(format!("'{}' is not a boolean", trimmed))
            }
        }
        ColumnType::Date => {
            if DATE_FORMATS
                .iter()
                .any(|fmt| NaiveDate::parse_from_str(trimmed, fmt).is_ok())
            {
                Ok(())
            } else {
                Err(format!("'{}' is not a date", trimmed))
            }
        }
        ColumnType::Geometry { srid } => geometry_fits(trimmed, *srid),
    }
}

fn geometry_fits(value: &str, srid: u32) -> Result<(), String> {
    let body = match value.strip_prefix("SRID=") {
        Some(rest) => {
            let (declared, body) = rest
                .split_once(';')
                .ok_or_else(|| format!("'{}' is malformed EWKT", value))?;
            let declared: u32 = declared
                .trim()
                .parse()
                .map_err(|_| format!("'{}' has a malformed SRID", value))?;
            if declared != srid {
                return Err(format!(
                    "SRID {} does not match target SRID {}",
                    declared, srid
                ));
            }
            body.trim()
        }
        None => value,
    };
    let upper = body.to_ascii_uppercase();
    if WKT_PREFIXES.iter().any(|p| upper.starts_with(p)) && upper.contains('(') {
        Ok(())
    } else {
        Err(format!("'{}' is not a geometry", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_decimals() {
        assert!(value_fits("42", &ColumnType::Integer).is_ok());
        assert!(value_fits("-7", &ColumnType::Integer).is_ok());
        assert!(value_fits("abc", &ColumnType::Integer).is_err());
        assert!(value_fits("3.5", &ColumnType::Decimal).is_ok());
        assert!(value_fits("3.5.1", &ColumnType::Decimal).is_err());
    }

    #[test]
    fn anything_fits_text() {
        assert!(value_fits("whatever", &ColumnType::Text).is_ok());
    }

    #[test]
    fn geometry_requires_matching_srid() {
        let ty = ColumnType::Geometry { srid: 27700 };
        assert!(value_fits("SRID=27700;POINT(1 2)", &ty).is_ok());
        assert!(value_fits("POINT(1 2)", &ty).is_ok());
        assert!(value_fits("SRID=4326;POINT(1 2)", &ty).is_err());
        assert!(value_fits("blob", &ty).is_err());
    }

    #[test]
    fn dates_accept_known_formats() {
        assert!(value_fits("2024-06-15", &ColumnType::Date).is_ok());
        assert!(value_fits("15/06/2024", &ColumnType::Date).is_ok());
        assert!(value_fits("June 15th", &ColumnType::Date).is_err());
    }
}
