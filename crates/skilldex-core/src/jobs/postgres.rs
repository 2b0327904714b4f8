//! PostgreSQL storage backend for job queue
//!
//! Used for the deployed service, where the job queue shares `DATABASE_URL`
//! with the catalog store. Mirrors `sqlite.rs`'s shape; differs only in SQL
//! dialect ($n placeholders, `RETURNING`, native `TIMESTAMPTZ`/`JSONB`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use super::config::JobConfig;
use super::storage::{JobFilter, JobStorage, StorageError, StorageResult};
use super::types::{Job, JobId, JobPriority, JobStats, JobStatus, JobType};

/// PostgreSQL-based job storage.
pub struct PostgresJobStorage {
    pool: PgPool,
}

impl PostgresJobStorage {
    pub async fn new(config: &JobConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.connection)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStorage for PostgresJobStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn setup(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS skill_jobs (
                id TEXT PRIMARY KEY,
                job_type JSONB NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 1,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                scheduled_at TIMESTAMPTZ,
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                worker_id TEXT,
                error TEXT,
                result JSONB,
                metadata JSONB NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_skill_jobs_status ON skill_jobs(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_skill_jobs_scheduled ON skill_jobs(scheduled_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_skill_jobs_worker ON skill_jobs(worker_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn enqueue(&self, job: Job) -> StorageResult<JobId> {
        let job_type = serde_json::to_value(&job.job_type).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let metadata =
            serde_json::to_value(&job.metadata).map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO skill_jobs (
                id, job_type, status, priority, attempts, max_attempts,
                created_at, updated_at, scheduled_at, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job_type)
        .bind(job.status.to_string())
        .bind(job.priority as i32)
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.scheduled_at)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(job.id)
    }

    async fn dequeue(&self, worker_id: &str) -> StorageResult<Option<Job>> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = 'running',
                worker_id = $1,
                started_at = $2,
                updated_at = $2,
                attempts = attempts + 1
            WHERE id = (
                SELECT id FROM skill_jobs
                WHERE status = 'pending'
                AND (scheduled_at IS NULL OR scheduled_at <= $2)
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn get(&self, job_id: JobId) -> StorageResult<Option<Job>> {
        let row = sqlx::query("SELECT * FROM skill_jobs WHERE id = $1")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn update(&self, job: &Job) -> StorageResult<()> {
        let job_type = serde_json::to_value(&job.job_type).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let metadata =
            serde_json::to_value(&job.metadata).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let result = job
            .result
            .clone()
            .map(|r| serde_json::to_value(r))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE skill_jobs SET
                job_type = $1, status = $2, priority = $3, attempts = $4, max_attempts = $5,
                updated_at = $6, scheduled_at = $7, started_at = $8, completed_at = $9,
                worker_id = $10, error = $11, result = $12, metadata = $13
            WHERE id = $14
            "#,
        )
        .bind(job_type)
        .bind(job.status.to_string())
        .bind(job.priority as i32)
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(Utc::now())
        .bind(job.scheduled_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.worker_id)
        .bind(&job.error)
        .bind(result)
        .bind(metadata)
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn complete(&self, job_id: JobId, result: Option<serde_json::Value>) -> StorageResult<()> {
        let now = Utc::now();

        let rows = sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = 'completed', completed_at = $1, updated_at = $1, result = $2
            WHERE id = $3
            "#,
        )
        .bind(now)
        .bind(result)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        if rows.rows_affected() == 0 {
            return Err(StorageError::NotFound(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job_id: JobId, error: &str) -> StorageResult<()> {
        let now = Utc::now();
        let job = self.get(job_id).await?.ok_or(StorageError::NotFound(job_id))?;
        let new_status = if job.attempts >= job.max_attempts { "dead" } else { "failed" };

        sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = $1, error = $2, updated_at = $3, worker_id = NULL
            WHERE id = $4
            "#,
        )
        .bind(new_status)
        .bind(error)
        .bind(now)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn cancel(&self, job_id: JobId) -> StorageResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = 'cancelled', updated_at = $1
            WHERE id = $2 AND status IN ('pending', 'failed')
            "#,
        )
        .bind(Utc::now())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        if rows.rows_affected() == 0 {
            return Err(StorageError::Operation(
                "Cannot cancel job that is running or already terminal".to_string(),
            ));
        }
        Ok(())
    }

    async fn retry(&self, job_id: JobId) -> StorageResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = 'pending', error = NULL, worker_id = NULL, updated_at = $1
            WHERE id = $2 AND status = 'failed'
            "#,
        )
        .bind(Utc::now())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        if rows.rows_affected() == 0 {
            return Err(StorageError::Operation(
                "Cannot retry job that is not in failed status".to_string(),
            ));
        }
        Ok(())
    }

    async fn list(&self, filter: JobFilter) -> StorageResult<Vec<Job>> {
        let mut query = String::from("SELECT * FROM skill_jobs WHERE 1=1");
        let mut params: Vec<String> = Vec::new();
        let mut idx = 1;

        if let Some(status) = &filter.status {
            query.push_str(&format!(" AND status = ${idx}"));
            params.push(status.to_string());
            idx += 1;
        }

        if let Some(skill_id) = &filter.skill_id {
            query.push_str(&format!(" AND job_type::text LIKE ${idx}"));
            params.push(format!("%\"skill_id\":\"{skill_id}%"));
            idx += 1;
        }

        if let Some(worker_id) = &filter.worker_id {
            query.push_str(&format!(" AND worker_id = ${idx}"));
            params.push(worker_id.clone());
            idx += 1;
        }
        let _ = idx;

        let order_field = filter.order_by.as_deref().unwrap_or("created_at");
        let order_dir = if filter.descending { "DESC" } else { "ASC" };
        query.push_str(&format!(" ORDER BY {order_field} {order_dir}"));

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = filter.offset {
            query.push_str(&format!(" OFFSET {offset}"));
        }

        let mut sql_query = sqlx::query(&query);
        for param in &params {
            sql_query = sql_query.bind(param);
        }

        let rows = sql_query.fetch_all(&self.pool).await.map_err(|e| StorageError::Database(e.to_string()))?;
        rows.iter().map(row_to_job).collect()
    }

    async fn stats(&self) -> StorageResult<JobStats> {
        let mut stats = JobStats::default();

        let rows = sqlx::query("SELECT status, COUNT(*) as count FROM skill_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        for row in rows {
            let status: String = row.try_get("status").map_err(|e| StorageError::Database(e.to_string()))?;
            let count: i64 = row.try_get("count").map_err(|e| StorageError::Database(e.to_string()))?;
            stats.by_status.insert(status, count as usize);
            stats.total += count as usize;
        }

        let completed = *stats.by_status.get("completed").unwrap_or(&0);
        let failed = *stats.by_status.get("failed").unwrap_or(&0);
        let dead = *stats.by_status.get("dead").unwrap_or(&0);
        let total_finished = completed + failed + dead;
        if total_finished > 0 {
            stats.success_rate = completed as f32 / total_finished as f32;
        }

        let avg_row = sqlx::query(
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (completed_at - started_at)) * 1000) as avg_ms
            FROM skill_jobs
            WHERE status = 'completed' AND started_at IS NOT NULL AND completed_at IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        stats.avg_execution_ms = avg_row
            .try_get::<Option<f64>, _>("avg_ms")
            .map_err(|e| StorageError::Database(e.to_string()))?
            .map(|v| v as u64)
            .unwrap_or(0);

        let workers_row = sqlx::query("SELECT COUNT(DISTINCT worker_id) as count FROM skill_jobs WHERE status = 'running'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        stats.active_workers =
            workers_row.try_get::<i64, _>("count").map_err(|e| StorageError::Database(e.to_string()))? as usize;

        Ok(stats)
    }

    async fn heartbeat(&self, worker_id: &str, job_id: JobId) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE skill_jobs SET updated_at = $1
            WHERE id = $2 AND worker_id = $3 AND status = 'running'
            "#,
        )
        .bind(Utc::now())
        .bind(job_id.to_string())
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn requeue_orphaned(&self, timeout_secs: u64) -> StorageResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(timeout_secs as i64);

        let result = sqlx::query(
            r#"
            UPDATE skill_jobs
            SET status = 'pending', worker_id = NULL, updated_at = $1
            WHERE status = 'running' AND updated_at < $2
            "#,
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }

    async fn cleanup(&self, older_than_secs: u64) -> StorageResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_secs as i64);

        let result = sqlx::query(
            r#"
            DELETE FROM skill_jobs
            WHERE status IN ('completed', 'cancelled', 'dead') AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_job(row: &PgRow) -> StorageResult<Job> {
    let id_str: String = row.try_get("id").map_err(|e| StorageError::Database(e.to_string()))?;
    let id = id_str.parse::<JobId>().map_err(|e| StorageError::Serialization(format!("invalid job id: {e}")))?;

    let job_type: serde_json::Value = row.try_get("job_type").map_err(|e| StorageError::Database(e.to_string()))?;
    let job_type: JobType =
        serde_json::from_value(job_type).map_err(|e| StorageError::Serialization(format!("invalid job type: {e}")))?;

    let status_str: String = row.try_get("status").map_err(|e| StorageError::Database(e.to_string()))?;
    let status = match status_str.as_str() {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        "dead" => JobStatus::Dead,
        other => return Err(StorageError::Serialization(format!("unknown status: {other}"))),
    };

    let priority_int: i32 = row.try_get("priority").map_err(|e| StorageError::Database(e.to_string()))?;
    let priority = match priority_int {
        0 => JobPriority::Low,
        1 => JobPriority::Normal,
        2 => JobPriority::High,
        3 => JobPriority::Critical,
        _ => JobPriority::Normal,
    };

    let metadata: serde_json::Value =
        row.try_get("metadata").map_err(|e| StorageError::Database(e.to_string()))?;
    let metadata: HashMap<String, String> = serde_json::from_value(metadata).unwrap_or_default();

    let result: Option<serde_json::Value> =
        row.try_get("result").map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(Job {
        id,
        job_type,
        status,
        priority,
        attempts: row.try_get::<i32, _>("attempts").map_err(|e| StorageError::Database(e.to_string()))? as u32,
        max_attempts: row.try_get::<i32, _>("max_attempts").map_err(|e| StorageError::Database(e.to_string()))?
            as u32,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(|e| StorageError::Database(e.to_string()))?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(|e| StorageError::Database(e.to_string()))?,
        scheduled_at: row
            .try_get::<Option<DateTime<Utc>>, _>("scheduled_at")
            .map_err(|e| StorageError::Database(e.to_string()))?,
        started_at: row
            .try_get::<Option<DateTime<Utc>>, _>("started_at")
            .map_err(|e| StorageError::Database(e.to_string()))?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(|e| StorageError::Database(e.to_string()))?,
        worker_id: row.try_get("worker_id").map_err(|e| StorageError::Database(e.to_string()))?,
        error: row.try_get("error").map_err(|e| StorageError::Database(e.to_string()))?,
        result,
        metadata,
    })
}

// Postgres has no in-memory mode like `SqliteJobStorage`'s `JobConfig::memory()`,
// so these run against a real database and are skipped unless `TEST_DATABASE_URL`
// is set; `SqliteJobStorage`'s test module above covers the shared `JobStorage`
// contract against an in-memory backend.
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage() -> Option<PostgresJobStorage> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let config = JobConfig::postgres(url);
        let storage = PostgresJobStorage::new(&config).await.unwrap();
        storage.setup().await.unwrap();
        Some(storage)
    }

    #[tokio::test]
    async fn test_enqueue_and_dequeue() {
        let Some(storage) = test_storage().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        let job = Job::deep_scan("kubernetes", "apply");
        let job_id = job.id;
        storage.enqueue(job).await.unwrap();

        let dequeued = storage.dequeue("worker-1").await.unwrap().unwrap();
        assert_eq!(dequeued.id, job_id);
        assert_eq!(dequeued.status, JobStatus::Running);
        assert_eq!(dequeued.worker_id, Some("worker-1".to_string()));
    }

    #[tokio::test]
    async fn test_dequeue_skip_locked_excludes_concurrent_claim() {
        let Some(storage) = test_storage().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        storage.enqueue(Job::full_crawl()).await.unwrap();

        let first = storage.dequeue("worker-1").await.unwrap();
        assert!(first.is_some());

        // No other pending job, so a second concurrent dequeue sees nothing
        // rather than double-claiming the one `worker-1` already holds.
        let second = storage.dequeue("worker-2").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let Some(storage) = test_storage().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };

        storage.enqueue(Job::score_batch()).await.unwrap();
        let stats = storage.stats().await.unwrap();
        assert!(stats.total >= 1);
    }
}
