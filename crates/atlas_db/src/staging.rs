//! Helpers over physical staging/master tables.
//!
//! The loader and migrator build their own transactional statements; the
//! read-side operations (existence checks, counts, paged preview) live here
//! so the rest of the system never touches raw SQL.

use crate::error::Result;
use crate::ident::quote_ident;
use crate::AtlasDb;
use atlas_types::StagingFilter;
use serde::Serialize;
use sqlx::Row;

/// One page of a staging preview.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewPage {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
}

impl AtlasDb {
    /// True when the physical table exists in the database.
    pub async fn physical_table_exists(&self, table_name: &str) -> Result<bool> {
        // Validated even though it is bound, to keep the whole surface strict.
        crate::ident::validate_ident(table_name)?;
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    /// Count rows in a table, optionally restricted by a provenance filter.
    pub async fn count_rows(&self, table_name: &str, filter: &StagingFilter) -> Result<i64> {
        let table = quote_ident(table_name)?;
        let (clause, binds) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) AS n FROM {} {}", table, clause);

        let mut q = sqlx::query(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Paged preview of a staging table, restricted to provenance filters.
    ///
    /// Column order comes from the catalog descriptor; every value is cast
    /// to text for display.
    pub async fn preview(
        &self,
        table_name: &str,
        filter: &StagingFilter,
        page: i64,
        page_size: i64,
    ) -> Result<PreviewPage> {
        let descriptor = self.require_table_descriptor(table_name).await?;
        let table = quote_ident(table_name)?;
        let page_size = page_size.clamp(1, 500);
        let offset = page.max(0) * page_size;

        let mut select_cols = Vec::with_capacity(descriptor.columns.len());
        let mut col_names = Vec::with_capacity(descriptor.columns.len());
        for col in &descriptor.columns {
            let quoted = quote_ident(&col.name)?;
            select_cols.push(format!("CAST({} AS TEXT)", quoted));
            col_names.push(col.name.clone());
        }

        let (clause, binds) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM {} {} LIMIT {} OFFSET {}",
            select_cols.join(", "),
            table,
            clause,
            page_size,
            offset
        );

        let mut q = sqlx::query(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut out_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(col_names.len());
            for idx in 0..col_names.len() {
                values.push(row.get::<Option<String>, _>(idx));
            }
            out_rows.push(values);
        }

        let total_rows = self.count_rows(table_name, filter).await?;

        Ok(PreviewPage {
            columns: col_names,
            rows: out_rows,
            total_rows,
            page: page.max(0),
            page_size,
        })
    }
}
