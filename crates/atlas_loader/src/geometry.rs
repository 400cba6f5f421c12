//! Load-time geometry canonicalization.
//!
//! Geometry columns are stored as EWKT (`SRID=n;WKT`) so the spatial
//! reference travels with every value. Raw WKT is stamped with the
//! catalog-declared SRID; EWKT input must already agree with it.

use crate::LoadError;

const WKT_PREFIXES: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Canonicalize one geometry value against the column's declared SRID.
pub fn canonicalize(raw: &str, column: &str, srid: u32) -> Result<String, LoadError> {
    let trimmed = raw.trim();

    let body = match trimmed.strip_prefix("SRID=").or(trimmed.strip_prefix("srid=")) {
        Some(rest) => {
            let (declared, body) = rest.split_once(';').ok_or_else(|| LoadError::InvalidGeometry {
                column: column.to_string(),
                detail: format!("malformed EWKT '{}'", trimmed),
            })?;
            let declared: u32 = declared.trim().parse().map_err(|_| LoadError::InvalidGeometry {
                column: column.to_string(),
                detail: format!("malformed SRID '{}'", declared),
            })?;
            if declared != srid {
                return Err(LoadError::InvalidGeometry {
                    column: column.to_string(),
                    detail: format!("SRID {} does not match declared SRID {}", declared, srid),
                });
            }
            body.trim()
        }
        None => trimmed,
    };

    let upper = body.to_ascii_uppercase();
    let well_formed = WKT_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
        && upper.contains('(')
        && upper.ends_with(')');
    if !well_formed {
        return Err(LoadError::InvalidGeometry {
            column: column.to_string(),
            detail: format!("'{}' is not WKT", trimmed),
        });
    }

    Ok(format!("SRID={};{}", srid, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wkt_gains_declared_srid() {
        assert_eq!(
            canonicalize("POINT(385386 801193)", "geom", 27700).unwrap(),
            "SRID=27700;POINT(385386 801193)"
        );
    }

    #[test]
    fn matching_ewkt_passes_through() {
        assert_eq!(
            canonicalize("SRID=27700;POINT(1 2)", "geom", 27700).unwrap(),
            "SRID=27700;POINT(1 2)"
        );
    }

    #[test]
    fn mismatched_srid_is_rejected() {
        assert!(canonicalize("SRID=4326;POINT(1 2)", "geom", 27700).is_err());
    }

    #[test]
    fn opaque_text_is_rejected() {
        assert!(canonicalize("not a geometry", "geom", 27700).is_err());
        assert!(canonicalize("POINT", "geom", 27700).is_err());
    }
}
