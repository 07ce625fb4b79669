//! crates/warehouse_core/src/links.rs
//!
//! The code → slug table. It is kept apart from the primary rows so a slug
//! survives every rewrite of the document it points to.

use crate::domain::SlugLink;
use crate::layout::{data_rows, link_from_row, LINK_SLUG_COLUMN};
use crate::ports::{CellSpan, PortResult, RowStore, TableRef};
use crate::reconcile::descending;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

pub const SLUG_LEN: usize = 12;

/// A fresh 12-character slug drawn uniformly from `[a-zA-Z0-9]`.
pub fn generate_slug() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_LEN)
        .map(char::from)
        .collect()
}

pub struct SlugLinks<'a> {
    store: &'a dyn RowStore,
    table: &'a TableRef,
}

impl<'a> SlugLinks<'a> {
    pub fn new(store: &'a dyn RowStore, table: &'a TableRef) -> Self {
        Self { store, table }
    }

    pub async fn all(&self) -> PortResult<Vec<SlugLink>> {
        let rows = self.store.read_rows(self.table).await?;
        Ok(data_rows(&rows)
            .map(|(_, row)| link_from_row(row))
            .filter(|link| !link.code.is_empty())
            .collect())
    }

    pub async fn get(&self, code: &str) -> PortResult<Option<String>> {
        let rows = self.store.read_rows(self.table).await?;
        let slug = data_rows(&rows)
            .map(|(_, row)| link_from_row(row))
            .find(|link| link.code == code)
            .map(|link| link.slug);
        Ok(slug)
    }

    /// Overwrites column B of the existing row for `code`, or appends `[code, slug]`.
    pub async fn upsert(&self, code: &str, slug: &str) -> PortResult<()> {
        let rows = self.store.read_rows(self.table).await?;
        let existing = data_rows(&rows)
            .find(|(_, row)| link_from_row(row).code == code)
            .map(|(row_number, _)| row_number);

        match existing {
            Some(row_number) => {
                debug!(code, row_number, "Overwriting slug link");
                self.store
                    .write_row(
                        self.table,
                        row_number,
                        CellSpan::column(LINK_SLUG_COLUMN),
                        &[slug.to_string()],
                    )
                    .await
            }
            None => {
                debug!(code, "Appending slug link");
                self.store
                    .append_rows(self.table, &[vec![code.to_string(), slug.to_string()]])
                    .await
            }
        }
    }

    /// Deletes every row for `code`. Returns how many were removed.
    pub async fn delete(&self, code: &str) -> PortResult<usize> {
        let rows = self.store.read_rows(self.table).await?;
        let targets = descending(
            data_rows(&rows)
                .filter(|(_, row)| link_from_row(row).code == code)
                .map(|(row_number, _)| row_number)
                .collect(),
        );
        if targets.is_empty() {
            return Ok(0);
        }
        self.store.delete_rows(self.table, &targets).await?;
        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRowStore;

    async fn store_with_links(links: &[(&str, &str)]) -> (MemoryRowStore, TableRef) {
        let store = MemoryRowStore::new();
        let table = TableRef::new("Link", 2);
        store
            .create_table("Link", vec!["code".into(), "slug".into()])
            .await;
        let rows: Vec<_> = links
            .iter()
            .map(|(c, s)| vec![c.to_string(), s.to_string()])
            .collect();
        if !rows.is_empty() {
            store.append_rows(&table, &rows).await.unwrap();
        }
        (store, table)
    }

    #[test]
    fn slugs_are_twelve_alphanumerics() {
        let slug = generate_slug();
        assert_eq!(slug.len(), SLUG_LEN);
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(slug, generate_slug());
    }

    #[tokio::test]
    async fn upsert_never_duplicates_a_code() {
        let (store, table) = store_with_links(&[("PNK10102501", "aaaaaaaaaaaa")]).await;
        let links = SlugLinks::new(&store, &table);

        links.upsert("PNK10102501", "bbbbbbbbbbbb").await.unwrap();
        links.upsert("PNK10102502", "cccccccccccc").await.unwrap();
        links.upsert("PNK10102501", "dddddddddddd").await.unwrap();

        let all = links.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            links.get("PNK10102501").await.unwrap().as_deref(),
            Some("dddddddddddd")
        );
        assert_eq!(links.get("PXK00000000").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_every_match_and_nothing_else() {
        let (store, table) = store_with_links(&[
            ("A", "slug-a-1"),
            ("B", "slug-b"),
            ("A", "slug-a-2"),
            ("C", "slug-c"),
        ])
        .await;
        let links = SlugLinks::new(&store, &table);

        assert_eq!(links.delete("A").await.unwrap(), 2);
        assert_eq!(links.delete("A").await.unwrap(), 0);

        let codes: Vec<_> = links.all().await.unwrap().into_iter().map(|l| l.code).collect();
        assert_eq!(codes, vec!["B", "C"]);
    }
}
