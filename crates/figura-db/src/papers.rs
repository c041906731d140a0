//! Paper store.
//!
//! `save` reconciles one [`Paper`] into the four tables inside a single
//! transaction:
//!
//! - papers are upserted by `paper_id`,
//! - figures by `(paper_id, label)`, with their entity links rebuilt,
//! - entities by `(name, type)` and links by `(figure_id, entity_id)`,
//!   both insert-if-absent.
//!
//! What happens to stored figures whose labels are missing from the new
//! fetch is decided by [`FigurePolicy`].

use std::sync::Arc;

use figura_common::config::FigurePolicy;
use figura_common::models::{fill_positional_labels, with_pmc_prefix, Entity, Figure, Paper};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, instrument, warn};

use crate::database::Database;
use crate::error::Result;
use crate::schema::SOURCE_PMC;

/// What a single `save` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SaveSummary {
    pub paper_row_id: i64,
    pub paper_created: bool,
    pub figures_inserted: usize,
    pub figures_updated: usize,
    pub figures_removed: usize,
    pub entities_created: usize,
    pub links_created: usize,
}

/// Repository for papers and everything hanging off them.
#[derive(Clone)]
pub struct PaperStore {
    db: Arc<Database>,
    policy: FigurePolicy,
}

impl PaperStore {
    pub fn new(db: Arc<Database>, policy: FigurePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> FigurePolicy {
        self.policy
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Upsert a paper with its figures and entities. All-or-nothing: on any
    /// failure the transaction is rolled back and the error returned.
    #[instrument(skip(self, paper), fields(paper_id = %paper.paper_id))]
    pub async fn save(&self, paper: &Paper) -> Result<SaveSummary> {
        let mut tx = self.db.pool().begin().await?;

        match self.write_paper(&mut tx, paper).await {
            Ok(summary) => {
                tx.commit().await?;
                info!(
                    "Saved {} ({} figures inserted, {} updated, {} links)",
                    paper.paper_id, summary.figures_inserted, summary.figures_updated, summary.links_created
                );
                Ok(summary)
            }
            Err(e) => {
                warn!("Save of {} failed, rolling back: {}", paper.paper_id, e);
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    async fn write_paper(&self, tx: &mut Transaction<'_, Sqlite>, paper: &Paper) -> Result<SaveSummary> {
        let mut summary = SaveSummary::default();
        let paper_id = with_pmc_prefix(&paper.paper_id);

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM papers WHERE paper_id = ?")
            .bind(&paper_id)
            .fetch_optional(&mut **tx)
            .await?;
        summary.paper_created = existing.is_none();

        sqlx::query(
            r#"
            INSERT INTO papers (paper_id, title, abstract, source, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (paper_id) DO UPDATE SET
                title = excluded.title,
                abstract = excluded.abstract,
                source = excluded.source,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&paper_id)
        .bind(&paper.title)
        .bind(&paper.abstract_text)
        .bind(SOURCE_PMC)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;

        let paper_row: i64 = sqlx::query_scalar("SELECT id FROM papers WHERE paper_id = ?")
            .bind(&paper_id)
            .fetch_one(&mut **tx)
            .await?;
        summary.paper_row_id = paper_row;

        if self.policy == FigurePolicy::ReplaceAll {
            sqlx::query(
                "DELETE FROM figure_entities WHERE figure_id IN (SELECT id FROM figures WHERE paper_id = ?)",
            )
            .bind(paper_row)
            .execute(&mut **tx)
            .await?;
            let removed = sqlx::query("DELETE FROM figures WHERE paper_id = ?")
                .bind(paper_row)
                .execute(&mut **tx)
                .await?;
            summary.figures_removed = removed.rows_affected() as usize;
        }

        let labels = fill_positional_labels(
            paper
                .figures
                .iter()
                .map(|f| Some(collapse_whitespace(&f.label)).filter(|l| !l.is_empty()))
                .collect(),
        );
        for (figure, label) in paper.figures.iter().zip(labels) {
            let figure_row = upsert_figure(tx, paper_row, &label, figure, &mut summary).await?;
            for entity in &figure.entities {
                link_entity(tx, figure_row, entity, &mut summary).await?;
            }
        }

        Ok(summary)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Load a paper with figures (in insertion order) and their entities.
    /// Accepts the id with or without the `PMC` prefix.
    pub async fn get(&self, paper_id: &str) -> Result<Option<Paper>> {
        let paper_id = with_pmc_prefix(paper_id);
        let pool = self.db.pool();

        let row: Option<(i64, String, String, String)> =
            sqlx::query_as("SELECT id, paper_id, title, abstract FROM papers WHERE paper_id = ?")
                .bind(&paper_id)
                .fetch_optional(pool)
                .await?;
        let Some((paper_row, paper_id, title, abstract_text)) = row else {
            return Ok(None);
        };

        let figure_rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, label, caption, figure_url FROM figures WHERE paper_id = ? ORDER BY id",
        )
        .bind(paper_row)
        .fetch_all(pool)
        .await?;

        let mut figures = Vec::with_capacity(figure_rows.len());
        for (figure_row, label, caption, url) in figure_rows {
            let entity_rows: Vec<(String, String, Option<i64>, Option<i64>)> = sqlx::query_as(
                r#"
                SELECT e.name, e.type, fe.start_offset, fe.end_offset
                FROM figure_entities fe
                JOIN entities e ON e.id = fe.entity_id
                WHERE fe.figure_id = ?
                ORDER BY fe.id
                "#,
            )
            .bind(figure_row)
            .fetch_all(pool)
            .await?;

            let entities = entity_rows
                .into_iter()
                .map(|(name, ty, start, end)| Entity {
                    text: name,
                    entity_type: if ty.is_empty() { None } else { Some(ty) },
                    start: start.and_then(|v| usize::try_from(v).ok()),
                    end: end.and_then(|v| usize::try_from(v).ok()),
                })
                .collect();

            figures.push(Figure { label, caption, url, entities });
        }

        Ok(Some(Paper { paper_id, title, abstract_text, figures }))
    }

    /// Stored paper ids in ingestion order.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT paper_id FROM papers ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids)
    }

    /// Every stored paper, fully loaded.
    pub async fn get_papers(&self) -> Result<Vec<Paper>> {
        let mut papers = Vec::new();
        for id in self.list_ids().await? {
            if let Some(paper) = self.get(&id).await? {
                papers.push(paper);
            }
        }
        Ok(papers)
    }

    pub async fn figure_entity_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM figure_entities")
            .fetch_one(self.db.pool())
            .await?;
        Ok(n)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insert or update one figure and return its row id. An existing figure
/// loses all its entity links; they are rebuilt by the caller.
async fn upsert_figure(
    tx: &mut Transaction<'_, Sqlite>,
    paper_row: i64,
    label: &str,
    figure: &Figure,
    summary: &mut SaveSummary,
) -> Result<i64> {

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM figures WHERE paper_id = ? AND label = ?")
        .bind(paper_row)
        .bind(label)
        .fetch_optional(&mut **tx)
        .await?;

    match existing {
        Some(figure_row) => {
            sqlx::query("UPDATE figures SET caption = ?, figure_url = ? WHERE id = ?")
                .bind(&figure.caption)
                .bind(&figure.url)
                .bind(figure_row)
                .execute(&mut **tx)
                .await?;
            sqlx::query("DELETE FROM figure_entities WHERE figure_id = ?")
                .bind(figure_row)
                .execute(&mut **tx)
                .await?;
            summary.figures_updated += 1;
            debug!("Updated figure '{}' (row {})", label, figure_row);
            Ok(figure_row)
        }
        None => {
            let result = sqlx::query("INSERT INTO figures (paper_id, label, caption, figure_url) VALUES (?, ?, ?, ?)")
                .bind(paper_row)
                .bind(label)
                .bind(&figure.caption)
                .bind(&figure.url)
                .execute(&mut **tx)
                .await?;
            summary.figures_inserted += 1;
            debug!("Inserted figure '{}' (row {})", label, result.last_insert_rowid());
            Ok(result.last_insert_rowid())
        }
    }
}

/// Ensure the entity row exists and link it to the figure. Entities with
/// blank text are skipped.
async fn link_entity(
    tx: &mut Transaction<'_, Sqlite>,
    figure_row: i64,
    entity: &Entity,
    summary: &mut SaveSummary,
) -> Result<()> {
    if entity.text.trim().is_empty() {
        return Ok(());
    }
    let (name, ty) = entity.identity();

    let inserted = sqlx::query("INSERT INTO entities (name, type) VALUES (?, ?) ON CONFLICT (name, type) DO NOTHING")
        .bind(&name)
        .bind(&ty)
        .execute(&mut **tx)
        .await?;
    summary.entities_created += inserted.rows_affected() as usize;

    let entity_row: i64 = sqlx::query_scalar("SELECT id FROM entities WHERE name = ? AND type = ?")
        .bind(&name)
        .bind(&ty)
        .fetch_one(&mut **tx)
        .await?;

    let linked = sqlx::query(
        r#"
        INSERT INTO figure_entities (figure_id, entity_id, start_offset, end_offset)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (figure_id, entity_id) DO NOTHING
        "#,
    )
    .bind(figure_row)
    .bind(entity_row)
    .bind(entity.start.and_then(|v| i64::try_from(v).ok()))
    .bind(entity.end.and_then(|v| i64::try_from(v).ok()))
    .execute(&mut **tx)
    .await?;
    summary.links_created += linked.rows_affected() as usize;

    Ok(())
}
