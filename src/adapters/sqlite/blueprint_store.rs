//! SQLite implementation of the BlueprintStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Blueprint, BlueprintStatus, Hole, HoleSeverity, HoleStatus, HoleType, Optimization,
    PercolationDepth, PercolationLogEntry, StressTestRun, TestCategory,
};
use crate::domain::ports::BlueprintStore;

#[derive(Clone)]
pub struct SqliteBlueprintStore {
    pool: SqlitePool,
}

impl SqliteBlueprintStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BlueprintStore for SqliteBlueprintStore {
    async fn create_blueprint(&self, blueprint: &Blueprint) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO blueprints (id, original_content, current_content, status, depth,
               budget_tokens, tokens_used, confidence_score, submitted_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(blueprint.id.to_string())
        .bind(&blueprint.original_content)
        .bind(&blueprint.current_content)
        .bind(blueprint.status.as_str())
        .bind(blueprint.depth.as_str())
        .bind(blueprint.budget_tokens as i64)
        .bind(blueprint.tokens_used as i64)
        .bind(blueprint.confidence_score)
        .bind(blueprint.submitted_at.to_rfc3339())
        .bind(blueprint.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_blueprint(&self, id: Uuid) -> DomainResult<Option<Blueprint>> {
        let row: Option<BlueprintRow> = sqlx::query_as("SELECT * FROM blueprints WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_content(&self, id: Uuid, content: &str, tokens_delta: u64) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE blueprints SET current_content = ?, tokens_used = tokens_used + ? WHERE id = ?"
        )
        .bind(content)
        .bind(tokens_delta as i64)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::BlueprintNotFound(id));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BlueprintStatus,
        confidence: Option<f64>,
    ) -> DomainResult<()> {
        let completed_at = status.is_terminal().then(|| Utc::now().to_rfc3339());

        let result = sqlx::query(
            r#"UPDATE blueprints SET status = ?,
               confidence_score = COALESCE(?, confidence_score),
               completed_at = COALESCE(?, completed_at)
               WHERE id = ?"#
        )
        .bind(status.as_str())
        .bind(confidence.map(|c| c.clamp(0.0, 1.0)))
        .bind(completed_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::BlueprintNotFound(id));
        }
        Ok(())
    }

    async fn list_blueprints(
        &self,
        status: Option<BlueprintStatus>,
        limit: usize,
    ) -> DomainResult<Vec<Blueprint>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<BlueprintRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM blueprints WHERE status = ? ORDER BY submitted_at DESC, rowid DESC LIMIT ?"
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM blueprints ORDER BY submitted_at DESC, rowid DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_hole(&self, hole: &Hole) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO holes (id, blueprint_id, hole_type, description, severity, status,
               location, suggested_fix, identified_at, patched_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(hole.id.to_string())
        .bind(hole.blueprint_id.to_string())
        .bind(hole.hole_type.as_str())
        .bind(&hole.description)
        .bind(hole.severity.as_str())
        .bind(hole.status.as_str())
        .bind(&hole.location)
        .bind(&hole.suggested_fix)
        .bind(hole.identified_at.to_rfc3339())
        .bind(hole.patched_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_hole(&self, id: Uuid) -> DomainResult<Option<Hole>> {
        let row: Option<HoleRow> = sqlx::query_as("SELECT * FROM holes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_hole_status(&self, id: Uuid, status: HoleStatus) -> DomainResult<()> {
        let patched_at = (status == HoleStatus::Patched).then(|| Utc::now().to_rfc3339());

        let result = sqlx::query(
            "UPDATE holes SET status = ?, patched_at = COALESCE(?, patched_at) WHERE id = ?"
        )
        .bind(status.as_str())
        .bind(patched_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::HoleNotFound(id));
        }
        Ok(())
    }

    async fn get_holes_for_blueprint(
        &self,
        blueprint_id: Uuid,
        status: Option<HoleStatus>,
    ) -> DomainResult<Vec<Hole>> {
        let rows: Vec<HoleRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT * FROM holes WHERE blueprint_id = ? AND status = ? ORDER BY rowid")
                    .bind(blueprint_id.to_string())
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM holes WHERE blueprint_id = ? ORDER BY rowid")
                    .bind(blueprint_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_open_holes(&self, blueprint_id: Uuid) -> DomainResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM holes WHERE blueprint_id = ? AND status = 'open'")
                .bind(blueprint_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn create_stress_test(&self, run: &StressTestRun) -> DomainResult<()> {
        let findings_json = serde_json::to_string(&run.findings)?;

        sqlx::query(
            r#"INSERT INTO stress_tests (id, blueprint_id, category, intensity, passed,
               findings, duration_ms, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(run.id.to_string())
        .bind(run.blueprint_id.to_string())
        .bind(run.category.as_str())
        .bind(i64::from(run.intensity))
        .bind(run.passed)
        .bind(&findings_json)
        .bind(run.duration_ms as i64)
        .bind(run.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_stress_tests_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<StressTestRun>> {
        let rows: Vec<StressTestRow> =
            sqlx::query_as("SELECT * FROM stress_tests WHERE blueprint_id = ? ORDER BY rowid")
                .bind(blueprint_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_optimization(&self, optimization: &Optimization) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO optimizations (id, blueprint_id, source, description,
               improvement_score, token_cost, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(optimization.id.to_string())
        .bind(optimization.blueprint_id.to_string())
        .bind(&optimization.source)
        .bind(&optimization.description)
        .bind(optimization.improvement_score)
        .bind(optimization.token_cost as i64)
        .bind(optimization.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_optimizations_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<Optimization>> {
        let rows: Vec<OptimizationRow> =
            sqlx::query_as("SELECT * FROM optimizations WHERE blueprint_id = ? ORDER BY rowid")
                .bind(blueprint_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn log(&self, blueprint_id: Uuid, action: &str, details: serde_json::Value) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO percolation_logs (blueprint_id, action, details, created_at) VALUES (?, ?, ?, ?)"
        )
        .bind(blueprint_id.to_string())
        .bind(action)
        .bind(details.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_logs_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<PercolationLogEntry>> {
        let rows: Vec<LogRow> =
            sqlx::query_as("SELECT * FROM percolation_logs WHERE blueprint_id = ? ORDER BY id")
                .bind(blueprint_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

fn unknown(field: &str, value: &str) -> DomainError {
    DomainError::SerializationError(format!("Unknown {field}: {value}"))
}

#[derive(sqlx::FromRow)]
struct BlueprintRow {
    id: String,
    original_content: String,
    current_content: String,
    status: String,
    depth: String,
    budget_tokens: i64,
    tokens_used: i64,
    confidence_score: f64,
    submitted_at: String,
    completed_at: Option<String>,
}

impl TryFrom<BlueprintRow> for Blueprint {
    type Error = DomainError;

    fn try_from(row: BlueprintRow) -> Result<Self, Self::Error> {
        Ok(Blueprint {
            id: parse_uuid(&row.id)?,
            original_content: row.original_content,
            current_content: row.current_content,
            status: BlueprintStatus::from_str(&row.status).ok_or_else(|| unknown("status", &row.status))?,
            depth: PercolationDepth::from_str(&row.depth).ok_or_else(|| unknown("depth", &row.depth))?,
            budget_tokens: row.budget_tokens.max(0) as u64,
            tokens_used: row.tokens_used.max(0) as u64,
            confidence_score: row.confidence_score,
            submitted_at: parse_datetime(&row.submitted_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HoleRow {
    id: String,
    blueprint_id: String,
    hole_type: String,
    description: String,
    severity: String,
    status: String,
    location: Option<String>,
    suggested_fix: Option<String>,
    identified_at: String,
    patched_at: Option<String>,
}

impl TryFrom<HoleRow> for Hole {
    type Error = DomainError;

    fn try_from(row: HoleRow) -> Result<Self, Self::Error> {
        Ok(Hole {
            id: parse_uuid(&row.id)?,
            blueprint_id: parse_uuid(&row.blueprint_id)?,
            hole_type: HoleType::from_str(&row.hole_type).ok_or_else(|| unknown("hole_type", &row.hole_type))?,
            description: row.description,
            severity: HoleSeverity::from_str(&row.severity).ok_or_else(|| unknown("severity", &row.severity))?,
            status: HoleStatus::from_str(&row.status).ok_or_else(|| unknown("hole status", &row.status))?,
            location: row.location,
            suggested_fix: row.suggested_fix,
            identified_at: parse_datetime(&row.identified_at)?,
            patched_at: parse_optional_datetime(row.patched_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StressTestRow {
    id: String,
    blueprint_id: String,
    category: String,
    intensity: i64,
    passed: bool,
    findings: Option<String>,
    duration_ms: i64,
    created_at: String,
}

impl TryFrom<StressTestRow> for StressTestRun {
    type Error = DomainError;

    fn try_from(row: StressTestRow) -> Result<Self, Self::Error> {
        Ok(StressTestRun {
            id: parse_uuid(&row.id)?,
            blueprint_id: parse_uuid(&row.blueprint_id)?,
            category: TestCategory::from_str(&row.category).ok_or_else(|| unknown("category", &row.category))?,
            intensity: u8::try_from(row.intensity)
                .map_err(|_| unknown("intensity", &row.intensity.to_string()))?,
            passed: row.passed,
            findings: parse_json_or_default(row.findings)?,
            duration_ms: row.duration_ms.max(0) as u64,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OptimizationRow {
    id: String,
    blueprint_id: String,
    source: String,
    description: String,
    improvement_score: f64,
    token_cost: i64,
    created_at: String,
}

impl TryFrom<OptimizationRow> for Optimization {
    type Error = DomainError;

    fn try_from(row: OptimizationRow) -> Result<Self, Self::Error> {
        Ok(Optimization {
            id: parse_uuid(&row.id)?,
            blueprint_id: parse_uuid(&row.blueprint_id)?,
            source: row.source,
            description: row.description,
            improvement_score: row.improvement_score,
            token_cost: row.token_cost.max(0) as u64,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    blueprint_id: String,
    action: String,
    details: Option<String>,
    created_at: String,
}

impl TryFrom<LogRow> for PercolationLogEntry {
    type Error = DomainError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(PercolationLogEntry {
            id: row.id,
            blueprint_id: parse_uuid(&row.blueprint_id)?,
            action: row.action,
            details: parse_json_or_default(row.details)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::HoleCandidate;

    async fn setup_test_store() -> SqliteBlueprintStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteBlueprintStore::new(pool)
    }

    async fn seeded_blueprint(store: &SqliteBlueprintStore) -> Blueprint {
        let bp = Blueprint::new("Deploy the service.", PercolationDepth::Quick, 1_000);
        store.create_blueprint(&bp).await.unwrap();
        bp
    }

    #[tokio::test]
    async fn test_create_and_get_blueprint() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        let loaded = store.get_blueprint(bp.id).await.unwrap().unwrap();
        assert_eq!(loaded.original_content, "Deploy the service.");
        assert_eq!(loaded.status, BlueprintStatus::Pending);
        assert_eq!(loaded.depth, PercolationDepth::Quick);
        assert_eq!(loaded.budget_tokens, 1_000);

        assert!(store.get_blueprint(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_content_accumulates_tokens() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        store.update_content(bp.id, "v2", 10).await.unwrap();
        store.update_content(bp.id, "v3", 5).await.unwrap();

        let loaded = store.get_blueprint(bp.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_content, "v3");
        assert_eq!(loaded.tokens_used, 15);
        assert_eq!(loaded.original_content, "Deploy the service.");

        let missing = store.update_content(Uuid::new_v4(), "x", 1).await;
        assert!(matches!(missing, Err(DomainError::BlueprintNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status_stamps_completion() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        store.update_status(bp.id, BlueprintStatus::Percolating, None).await.unwrap();
        let loaded = store.get_blueprint(bp.id).await.unwrap().unwrap();
        assert!(loaded.completed_at.is_none());

        store.update_status(bp.id, BlueprintStatus::Completed, Some(0.75)).await.unwrap();
        let loaded = store.get_blueprint(bp.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BlueprintStatus::Completed);
        assert!((loaded.confidence_score - 0.75).abs() < f64::EPSILON);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_list_blueprints_by_status() {
        let store = setup_test_store().await;
        let a = seeded_blueprint(&store).await;
        let _b = seeded_blueprint(&store).await;
        store.update_status(a.id, BlueprintStatus::Percolating, None).await.unwrap();

        assert_eq!(store.list_blueprints(None, 10).await.unwrap().len(), 2);
        assert_eq!(store.list_blueprints(None, 1).await.unwrap().len(), 1);

        let percolating = store.list_blueprints(Some(BlueprintStatus::Percolating), 10).await.unwrap();
        assert_eq!(percolating.len(), 1);
        assert_eq!(percolating[0].id, a.id);
    }

    #[tokio::test]
    async fn test_hole_lifecycle() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        let hole = HoleCandidate::new(HoleType::MissingRollback, HoleSeverity::High, "no rollback")
            .with_suggested_fix("add a backup step")
            .into_hole(bp.id);
        store.create_hole(&hole).await.unwrap();
        assert_eq!(store.count_open_holes(bp.id).await.unwrap(), 1);

        store.update_hole_status(hole.id, HoleStatus::Patched).await.unwrap();
        let loaded = store.get_hole(hole.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, HoleStatus::Patched);
        assert!(loaded.patched_at.is_some());
        assert_eq!(loaded.suggested_fix.as_deref(), Some("add a backup step"));

        assert_eq!(store.count_open_holes(bp.id).await.unwrap(), 0);
        let patched = store.get_holes_for_blueprint(bp.id, Some(HoleStatus::Patched)).await.unwrap();
        assert_eq!(patched.len(), 1);
    }

    #[tokio::test]
    async fn test_stress_tests_and_optimizations() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        let run = StressTestRun::new(
            bp.id,
            TestCategory::Security,
            7,
            false,
            vec!["first".into(), "second".into()],
            3,
        );
        store.create_stress_test(&run).await.unwrap();
        let runs = store.get_stress_tests_for_blueprint(bp.id).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].findings, vec!["first".to_string(), "second".to_string()]);
        assert!(!runs[0].passed);

        let opt = Optimization::new(bp.id, "manual", "tighten wording", 0.1, 12);
        store.create_optimization(&opt).await.unwrap();
        let opts = store.get_optimizations_for_blueprint(bp.id).await.unwrap();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].token_cost, 12);
    }

    #[tokio::test]
    async fn test_logs_are_ordered() {
        let store = setup_test_store().await;
        let bp = seeded_blueprint(&store).await;

        store.log(bp.id, "first", serde_json::json!({"n": 1})).await.unwrap();
        store.log(bp.id, "second", serde_json::json!({"n": 2})).await.unwrap();

        let logs = store.get_logs_for_blueprint(bp.id).await.unwrap();
        let actions: Vec<_> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["first", "second"]);
        assert_eq!(logs[1].details["n"], 2);
    }
}
