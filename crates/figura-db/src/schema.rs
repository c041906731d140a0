//! Table names and DDL.
//!
//! Row ids are engine-assigned (`INTEGER PRIMARY KEY AUTOINCREMENT`);
//! natural keys are enforced with `UNIQUE` constraints so writers can use
//! `INSERT ... ON CONFLICT DO NOTHING` and then look the row up.

pub const TABLE_PAPERS: &str = "papers";
pub const TABLE_FIGURES: &str = "figures";
pub const TABLE_ENTITIES: &str = "entities";
pub const TABLE_FIGURE_ENTITIES: &str = "figure_entities";

/// Value of `papers.source` for everything ingested from BioC PMC.
pub const SOURCE_PMC: &str = "PMC";

/// Creation order. Drop in reverse.
pub const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS papers (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        paper_id    TEXT NOT NULL UNIQUE,
        title       TEXT NOT NULL,
        abstract    TEXT NOT NULL DEFAULT '',
        source      TEXT NOT NULL DEFAULT 'PMC',
        ingested_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS figures (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        paper_id    INTEGER NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
        label       TEXT NOT NULL,
        caption     TEXT NOT NULL DEFAULT '',
        figure_url  TEXT,
        UNIQUE (paper_id, label)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        id    INTEGER PRIMARY KEY AUTOINCREMENT,
        name  TEXT NOT NULL,
        type  TEXT NOT NULL DEFAULT '',
        UNIQUE (name, type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS figure_entities (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        figure_id     INTEGER NOT NULL REFERENCES figures(id) ON DELETE CASCADE,
        entity_id     INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        start_offset  INTEGER,
        end_offset    INTEGER,
        UNIQUE (figure_id, entity_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_figures_paper ON figures(paper_id)",
    "CREATE INDEX IF NOT EXISTS idx_figure_entities_figure ON figure_entities(figure_id)",
];

pub const ALL_TABLES: &[&str] = &[TABLE_PAPERS, TABLE_FIGURES, TABLE_ENTITIES, TABLE_FIGURE_ENTITIES];
