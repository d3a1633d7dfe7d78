use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::models::{Host, Task, TaskLog, TaskLogStatus, TaskStatus};
use scheduler_core::traits::{HostRepository, TaskLogRepository, TaskRepository};
use scheduler_core::{SchedulerError, SchedulerResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use super::mapping::MappingHelpers;

const TASK_COLUMNS: &str = "id, name, level, dependency_status, dependency_task_ids, spec, \
    protocol, command, timeout_seconds, multi, retry_times, status, notify_status, notify_type, \
    notify_receiver_ids, tag, remark, created_at";

const TASK_LOG_COLUMNS: &str = "id, execution_id, task_id, task_name, trigger_source, host, \
    attempt_number, status, output, started_at, finished_at";

/// 基于 SQLite 的记录存储，同时实现任务、主机和执行日志仓储
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 连接数据库并创建表结构
    pub async fn connect(database_url: &str, max_connections: u32) -> SchedulerResult<Self> {
        debug!("连接SQLite数据库: {}", database_url);

        let mut connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !database_url.contains(":memory:") {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// 内存数据库，只保留一个连接以免数据丢失
    pub async fn in_memory() -> SchedulerResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
        debug!("创建SQLite表结构");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                level INTEGER NOT NULL DEFAULT 1,
                dependency_status INTEGER NOT NULL DEFAULT 1,
                dependency_task_ids TEXT NOT NULL DEFAULT '[]',
                spec TEXT NOT NULL DEFAULT '',
                protocol INTEGER NOT NULL,
                command TEXT NOT NULL,
                timeout_seconds INTEGER NOT NULL DEFAULT 0,
                multi INTEGER NOT NULL DEFAULT 1,
                retry_times INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                notify_status INTEGER NOT NULL DEFAULT 0,
                notify_type INTEGER NOT NULL DEFAULT 0,
                notify_receiver_ids TEXT NOT NULL DEFAULT '[]',
                tag TEXT NOT NULL DEFAULT '',
                remark TEXT NOT NULL DEFAULT '',
                created_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS hosts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                port INTEGER NOT NULL,
                alias TEXT NOT NULL DEFAULT '',
                remark TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS task_hosts (
                task_id INTEGER NOT NULL,
                host_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (task_id, host_id),
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS task_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                execution_id TEXT NOT NULL,
                task_id INTEGER NOT NULL,
                task_name TEXT NOT NULL,
                trigger_source TEXT NOT NULL,
                host TEXT NOT NULL,
                attempt_number INTEGER NOT NULL,
                status TEXT NOT NULL,
                output TEXT NOT NULL DEFAULT '',
                started_at DATETIME NOT NULL,
                finished_at DATETIME
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tasks_level_status ON tasks(level, status)",
            "CREATE INDEX IF NOT EXISTS idx_task_logs_task_id ON task_logs(task_id)",
            "CREATE INDEX IF NOT EXISTS idx_task_logs_execution_id ON task_logs(execution_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(pool).await?;
        }

        Ok(())
    }

    async fn load_host_ids(&self, task_id: i64) -> SchedulerResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT host_id FROM task_hosts WHERE task_id = ? ORDER BY position",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn with_host_ids(&self, mut task: Task) -> SchedulerResult<Task> {
        task.host_ids = self.load_host_ids(task.id).await?;
        Ok(task)
    }

    async fn replace_host_ids(
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
        host_ids: &[i64],
    ) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM task_hosts WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut **tx)
            .await?;

        for (position, host_id) in host_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO task_hosts (task_id, host_id, position) VALUES (?, ?, ?)",
            )
            .bind(task_id)
            .bind(host_id)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl TaskRepository for SqliteRecordStore {
    async fn get_enabled_parent_tasks(&self) -> SchedulerResult<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE level = ? AND status = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(scheduler_core::models::TaskLevel::Parent.as_i64())
            .bind(TaskStatus::Enabled.as_i64())
            .fetch_all(&self.pool)
            .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let task = MappingHelpers::row_to_task(&row)?;
            tasks.push(self.with_host_ids(task).await?);
        }
        debug!("查询到已启用的主任务: {}", tasks.len());
        Ok(tasks)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let task = MappingHelpers::row_to_task(&row)?;
                Ok(Some(self.with_host_ids(task).await?))
            }
            None => {
                debug!("查询任务不存在: ID {}", id);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, task), fields(task_name = %task.name))]
    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (name, level, dependency_status, dependency_task_ids, spec, protocol,
                command, timeout_seconds, multi, retry_times, status, notify_status, notify_type,
                notify_receiver_ids, tag, remark, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(task.level.as_i64())
        .bind(task.dependency_status.as_i64())
        .bind(MappingHelpers::to_json(&task.dependency_task_ids)?)
        .bind(&task.spec)
        .bind(task.protocol.as_i64())
        .bind(&task.command)
        .bind(i64::from(task.timeout_seconds))
        .bind(task.multi.as_i64())
        .bind(i64::from(task.retry_times))
        .bind(task.status.as_i64())
        .bind(task.notify_status.as_i64())
        .bind(task.notify_type.as_i64())
        .bind(MappingHelpers::to_json(&task.notify_receiver_ids)?)
        .bind(&task.tag)
        .bind(&task.remark)
        .bind(task.created_at)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        Self::replace_host_ids(&mut tx, id, &task.host_ids).await?;
        tx.commit().await?;

        debug!("创建任务成功: ID {}, 名称: {}", id, task.name);
        let mut created = task.clone();
        created.id = id;
        Ok(created)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn update(&self, task: &Task) -> SchedulerResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = ?, level = ?, dependency_status = ?, dependency_task_ids = ?, spec = ?,
                protocol = ?, command = ?, timeout_seconds = ?, multi = ?, retry_times = ?,
                status = ?, notify_status = ?, notify_type = ?, notify_receiver_ids = ?,
                tag = ?, remark = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.name)
        .bind(task.level.as_i64())
        .bind(task.dependency_status.as_i64())
        .bind(MappingHelpers::to_json(&task.dependency_task_ids)?)
        .bind(&task.spec)
        .bind(task.protocol.as_i64())
        .bind(&task.command)
        .bind(i64::from(task.timeout_seconds))
        .bind(task.multi.as_i64())
        .bind(i64::from(task.retry_times))
        .bind(task.status.as_i64())
        .bind(task.notify_status.as_i64())
        .bind(task.notify_type.as_i64())
        .bind(MappingHelpers::to_json(&task.notify_receiver_ids)?)
        .bind(&task.tag)
        .bind(&task.remark)
        .bind(task.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id: task.id });
        }

        Self::replace_host_ids(&mut tx, task.id, &task.host_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM task_hosts WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
            .bind(status.as_i64())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound { id });
        }
        Ok(())
    }

    async fn name_exists(&self, name: &str, exclude_id: i64) -> SchedulerResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE name = ? AND id != ?",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl HostRepository for SqliteRecordStore {
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Host>> {
        let row = sqlx::query("SELECT id, name, port, alias, remark FROM hosts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| MappingHelpers::row_to_host(&row)).transpose()
    }

    async fn get_hosts_for_task(&self, task_id: i64) -> SchedulerResult<Vec<Host>> {
        let rows = sqlx::query(
            r#"
            SELECT h.id, h.name, h.port, h.alias, h.remark
            FROM hosts h
            INNER JOIN task_hosts th ON th.host_id = h.id
            WHERE th.task_id = ?
            ORDER BY th.position
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(MappingHelpers::row_to_host).collect()
    }

    async fn create(&self, host: &Host) -> SchedulerResult<Host> {
        let result =
            sqlx::query("INSERT INTO hosts (name, port, alias, remark) VALUES (?, ?, ?, ?)")
                .bind(&host.name)
                .bind(i64::from(host.port))
                .bind(&host.alias)
                .bind(&host.remark)
                .execute(&self.pool)
                .await?;

        let mut created = host.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }
}

#[async_trait]
impl TaskLogRepository for SqliteRecordStore {
    async fn create(&self, log: &TaskLog) -> SchedulerResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO task_logs (execution_id, task_id, task_name, trigger_source, host,
                attempt_number, status, output, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.execution_id.to_string())
        .bind(log.task_id)
        .bind(&log.task_name)
        .bind(MappingHelpers::to_json(&log.trigger)?)
        .bind(&log.host)
        .bind(i64::from(log.attempt_number))
        .bind(log.status.as_str())
        .bind(&log.output)
        .bind(log.started_at)
        .bind(log.finished_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn finish(
        &self,
        id: i64,
        status: TaskLogStatus,
        output: &str,
        finished_at: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        sqlx::query(
            "UPDATE task_logs SET status = ?, output = ?, finished_at = ? \
             WHERE id = ? AND finished_at IS NULL",
        )
        .bind(status.as_str())
        .bind(output)
        .bind(finished_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_task(&self, task_id: i64) -> SchedulerResult<Vec<TaskLog>> {
        let sql = format!("SELECT {TASK_LOG_COLUMNS} FROM task_logs WHERE task_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(MappingHelpers::row_to_task_log).collect()
    }
}
