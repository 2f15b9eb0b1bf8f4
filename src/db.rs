use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::dashboard::GrantSource;
use crate::error::{DataError, DataResult};
use crate::models::{Grant, GrantStatus, PipelineEntry, Priority, ProgressEntry, Template};
use crate::summary::parse_amount;

const GRANT_COLUMNS: &str = "id, title, funder, status, priority, \
     amount_requested::float8 AS amount_requested, \
     amount_awarded::float8 AS amount_awarded, deadline_date";

/// Postgres-backed store. Without a configured URL every query fails with
/// [`DataError::NotConfigured`].
pub struct PgGrantStore {
    pool: Option<PgPool>,
}

impl PgGrantStore {
    pub fn from_config(config: &Config) -> DataResult<Self> {
        let pool = match config.database_url.as_deref() {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_lazy(url)
                    .map_err(DataError::query("connection settings"))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    fn pool(&self) -> DataResult<&PgPool> {
        self.pool.as_ref().ok_or(DataError::NotConfigured)
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(self.pool()?).await?;
        Ok(())
    }

    pub async fn seed(&self) -> anyhow::Result<()> {
        let pool = self.pool()?;
        let grants = vec![
            (
                "seed-001",
                "Literacy Mentors Expansion",
                "Northwind Community Foundation",
                "submitted",
                "high",
                Some(45000.0),
                None,
                NaiveDate::from_ymd_opt(2026, 11, 6).context("invalid date")?,
            ),
            (
                "seed-002",
                "First-Gen Scholars Stipends",
                "Riverbend Education Trust",
                "awarded",
                "urgent",
                Some(60000.0),
                Some(52000.0),
                NaiveDate::from_ymd_opt(2026, 8, 15).context("invalid date")?,
            ),
            (
                "seed-003",
                "Summer Bridge Program",
                "Cedar Valley Fund",
                "declined",
                "medium",
                Some(18000.0),
                None,
                NaiveDate::from_ymd_opt(2026, 9, 1).context("invalid date")?,
            ),
            (
                "seed-004",
                "College Application Workshops",
                "Harbor Trust",
                "preparing",
                "medium",
                Some(12500.0),
                None,
                NaiveDate::from_ymd_opt(2026, 11, 20).context("invalid date")?,
            ),
        ];

        for (source_key, title, funder, status, priority, requested, awarded, deadline) in grants {
            sqlx::query(
                r#"
                INSERT INTO grant_pipeline.grants
                (id, title, funder, status, priority, amount_requested, amount_awarded, deadline_date, source_key)
                VALUES ($1, $2, $3, $4, $5, $6::float8, $7::float8, $8, $9)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(title)
            .bind(funder)
            .bind(status)
            .bind(priority)
            .bind(requested)
            .bind(awarded)
            .bind(deadline)
            .bind(source_key)
            .execute(pool)
            .await?;
        }

        let stages = vec![
            ("seed-001", "awaiting_decision", "Program officer confirmed receipt"),
            ("seed-004", "drafting", "Narrative outline shared with board"),
        ];

        for (source_key, stage, note) in stages {
            sqlx::query(
                r#"
                INSERT INTO grant_pipeline.pipeline_entries (id, grant_id, stage, notes, source_key)
                SELECT $1, g.id, $2, $3, $4
                FROM grant_pipeline.grants g
                WHERE g.source_key = $5
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(stage)
            .bind(note)
            .bind(format!("{source_key}-stage"))
            .bind(source_key)
            .execute(pool)
            .await?;
        }

        let milestones = vec![
            ("seed-002", "Interim report", 60, NaiveDate::from_ymd_opt(2026, 12, 1)),
            ("seed-004", "Budget narrative", 25, NaiveDate::from_ymd_opt(2026, 11, 10)),
        ];

        for (source_key, milestone, percent, due) in milestones {
            sqlx::query(
                r#"
                INSERT INTO grant_pipeline.progress_entries
                (id, grant_id, milestone, percent_complete, due_date, source_key)
                SELECT $1, g.id, $2, $3, $4, $5
                FROM grant_pipeline.grants g
                WHERE g.source_key = $6
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(milestone)
            .bind(percent)
            .bind(due)
            .bind(format!("{source_key}-{}", milestone.to_lowercase().replace(' ', "-")))
            .bind(source_key)
            .execute(pool)
            .await?;
        }

        let templates = vec![
            ("Organizational Background", "narrative", "Group Scholar supports first-generation students...", 14),
            ("Program Budget Justification", "budget", "Personnel costs cover two program coordinators...", 9),
            ("Evaluation Plan", "evaluation", "Outcomes are tracked through quarterly cohort reviews...", 5),
        ];

        for (name, category, body, usage_count) in templates {
            sqlx::query(
                r#"
                INSERT INTO grant_pipeline.templates (id, name, category, body, usage_count, is_active)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(category)
            .bind(body)
            .bind(usage_count as i64)
            .execute(pool)
            .await?;
        }

        Ok(())
    }

    pub async fn import_csv(&self, csv_path: &std::path::Path) -> anyhow::Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            title: String,
            funder: String,
            status: String,
            priority: String,
            #[serde(default)]
            amount_requested: String,
            #[serde(default)]
            amount_awarded: String,
            deadline_date: Option<NaiveDate>,
            source_key: Option<String>,
        }

        let pool = self.pool()?;
        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut inserted = 0usize;

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let line = index + 2;
            let row = result.with_context(|| format!("malformed CSV row at line {line}"))?;
            let priority: Priority = row
                .priority
                .parse()
                .map_err(|err: String| anyhow::anyhow!("line {line}: {err}"))?;
            let status = GrantStatus::from(row.status.as_str());
            let source_key = row
                .source_key
                .filter(|key| !key.trim().is_empty())
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

            let result = sqlx::query(
                r#"
                INSERT INTO grant_pipeline.grants
                (id, title, funder, status, priority, amount_requested, amount_awarded, deadline_date, source_key)
                VALUES ($1, $2, $3, $4, $5, $6::float8, $7::float8, $8, $9)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&row.title)
            .bind(&row.funder)
            .bind(status.as_str())
            .bind(priority.as_str())
            .bind(parse_amount(&row.amount_requested))
            .bind(parse_amount(&row.amount_awarded))
            .bind(row.deadline_date)
            .bind(source_key)
            .execute(pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        info!(inserted, path = %csv_path.display(), "csv import finished");
        Ok(inserted)
    }
}

#[async_trait]
impl GrantSource for PgGrantStore {
    async fn fetch_grants(&self) -> DataResult<Vec<Grant>> {
        let query = format!(
            "SELECT {GRANT_COLUMNS} FROM grant_pipeline.grants \
             WHERE deleted_at IS NULL \
             ORDER BY deadline_date ASC NULLS LAST"
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.pool()?)
            .await
            .map_err(DataError::query("grants"))?;
        debug!(rows = rows.len(), "fetched grants");
        rows.iter().map(grant_from_row).collect()
    }

    async fn fetch_pipeline(&self) -> DataResult<Vec<PipelineEntry>> {
        let rows = sqlx::query(
            "SELECT id, grant_id, stage, notes, updated_at FROM grant_pipeline.pipeline_entries",
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(DataError::query("pipeline"))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(PipelineEntry {
                id: row.try_get("id").map_err(DataError::query("pipeline"))?,
                grant_id: row.try_get("grant_id").map_err(DataError::query("pipeline"))?,
                stage: row.try_get("stage").map_err(DataError::query("pipeline"))?,
                notes: row.try_get("notes").map_err(DataError::query("pipeline"))?,
                updated_at: row.try_get("updated_at").map_err(DataError::query("pipeline"))?,
            });
        }
        Ok(entries)
    }

    async fn fetch_progress(&self) -> DataResult<Vec<ProgressEntry>> {
        let rows = sqlx::query(
            "SELECT id, grant_id, milestone, percent_complete, due_date, completed_at \
             FROM grant_pipeline.progress_entries",
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(DataError::query("progress"))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(ProgressEntry {
                id: row.try_get("id").map_err(DataError::query("progress"))?,
                grant_id: row.try_get("grant_id").map_err(DataError::query("progress"))?,
                milestone: row.try_get("milestone").map_err(DataError::query("progress"))?,
                percent_complete: row
                    .try_get("percent_complete")
                    .map_err(DataError::query("progress"))?,
                due_date: row.try_get("due_date").map_err(DataError::query("progress"))?,
                completed_at: row.try_get("completed_at").map_err(DataError::query("progress"))?,
            });
        }
        Ok(entries)
    }

    async fn fetch_grant(&self, id: Uuid) -> DataResult<Option<Grant>> {
        let query = format!(
            "SELECT {GRANT_COLUMNS} FROM grant_pipeline.grants \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(DataError::query("grant"))?;
        row.as_ref().map(grant_from_row).transpose()
    }

    async fn fetch_active_templates(&self) -> DataResult<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, category, body, usage_count, is_active \
             FROM grant_pipeline.templates \
             WHERE is_active \
             ORDER BY usage_count DESC",
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(DataError::query("templates"))?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            templates.push(Template {
                id: row.try_get("id").map_err(DataError::query("templates"))?,
                name: row.try_get("name").map_err(DataError::query("templates"))?,
                category: row.try_get("category").map_err(DataError::query("templates"))?,
                body: row.try_get("body").map_err(DataError::query("templates"))?,
                usage_count: row.try_get("usage_count").map_err(DataError::query("templates"))?,
                is_active: row.try_get("is_active").map_err(DataError::query("templates"))?,
            });
        }
        Ok(templates)
    }
}

pub(crate) fn priority_from_column(raw: &str) -> DataResult<Priority> {
    raw.parse::<Priority>().map_err(|reason| DataError::InvalidRow {
        context: "grant",
        reason,
    })
}

fn grant_from_row(row: &PgRow) -> DataResult<Grant> {
    let status: String = row.try_get("status").map_err(DataError::query("grants"))?;
    let priority: String = row.try_get("priority").map_err(DataError::query("grants"))?;
    let priority = priority_from_column(&priority)?;

    Ok(Grant {
        id: row.try_get("id").map_err(DataError::query("grants"))?,
        title: row.try_get("title").map_err(DataError::query("grants"))?,
        funder: row.try_get("funder").map_err(DataError::query("grants"))?,
        status: GrantStatus::from(status),
        priority,
        amount_requested: row
            .try_get("amount_requested")
            .map_err(DataError::query("grants"))?,
        amount_awarded: row
            .try_get("amount_awarded")
            .map_err(DataError::query("grants"))?,
        deadline_date: row.try_get("deadline_date").map_err(DataError::query("grants"))?,
    })
}
