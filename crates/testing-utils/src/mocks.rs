//! Mock implementations for repository, notifier and executor traits
//!
//! In-memory doubles for unit and integration tests that need no
//! database, network or child processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::models::{
    ExecutionOutcome, Host, NotificationRequest, Task, TaskLog, TaskLogStatus, TaskResult,
    TaskStatus,
};
use scheduler_core::traits::{
    ExecutionRequest, HostRepository, Notifier, TaskExecutor, TaskLogRepository, TaskRepository,
};
use scheduler_core::{SchedulerError, SchedulerResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock implementation of TaskRepository for testing
#[derive(Debug, Clone)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<i64, Task>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let mut task_map = HashMap::new();
        let mut max_id = 0;

        for task in tasks {
            if task.id > max_id {
                max_id = task.id;
            }
            task_map.insert(task.id, task);
        }

        Self {
            tasks: Arc::new(Mutex::new(task_map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn insert(&self, task: Task) {
        let mut next_id = self.next_id.lock().unwrap();
        if task.id >= *next_id {
            *next_id = task.id + 1;
        }
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn get_task(&self, id: i64) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn get_enabled_parent_tasks(&self) -> SchedulerResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        let mut enabled: Vec<Task> = tasks
            .values()
            .filter(|t| t.is_schedulable())
            .cloned()
            .collect();
        enabled.sort_by_key(|t| t.id);
        Ok(enabled)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_task = task.clone();
        new_task.id = *next_id;
        *next_id += 1;

        tasks.insert(new_task.id, new_task.clone());
        Ok(new_task)
    }

    async fn update(&self, task: &Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        if !tasks.contains_key(&task.id) {
            return Err(SchedulerError::TaskNotFound { id: task.id });
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        self.tasks.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) => {
                task.status = status;
                Ok(())
            }
            None => Err(SchedulerError::TaskNotFound { id }),
        }
    }

    async fn name_exists(&self, name: &str, exclude_id: i64) -> SchedulerResult<bool> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .any(|t| t.name == name && t.id != exclude_id))
    }
}

/// Mock implementation of HostRepository
///
/// Host lookup for a task follows the task's `host_ids`, so it shares
/// the task repository it was built from.
#[derive(Debug, Clone)]
pub struct MockHostRepository {
    hosts: Arc<Mutex<HashMap<i64, Host>>>,
    task_repository: MockTaskRepository,
}

impl MockHostRepository {
    pub fn new(task_repository: MockTaskRepository) -> Self {
        Self {
            hosts: Arc::new(Mutex::new(HashMap::new())),
            task_repository,
        }
    }

    pub fn add_host(&self, host: Host) {
        self.hosts.lock().unwrap().insert(host.id, host);
    }
}

#[async_trait]
impl HostRepository for MockHostRepository {
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Host>> {
        Ok(self.hosts.lock().unwrap().get(&id).cloned())
    }

    async fn get_hosts_for_task(&self, task_id: i64) -> SchedulerResult<Vec<Host>> {
        let host_ids = self
            .task_repository
            .get_task(task_id)
            .map(|t| t.host_ids)
            .unwrap_or_default();
        let hosts = self.hosts.lock().unwrap();
        Ok(host_ids
            .iter()
            .filter_map(|id| hosts.get(id).cloned())
            .collect())
    }

    async fn create(&self, host: &Host) -> SchedulerResult<Host> {
        let mut hosts = self.hosts.lock().unwrap();
        let mut new_host = host.clone();
        new_host.id = hosts.keys().max().copied().unwrap_or(0) + 1;
        hosts.insert(new_host.id, new_host.clone());
        Ok(new_host)
    }
}

/// Mock implementation of TaskLogRepository
#[derive(Debug, Clone, Default)]
pub struct MockTaskLogRepository {
    logs: Arc<Mutex<Vec<TaskLog>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockTaskLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的写入全部返回数据库错误
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn logs(&self) -> Vec<TaskLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn logs_for(&self, task_id: i64) -> Vec<TaskLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.task_id == task_id)
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> SchedulerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SchedulerError::Internal("log store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskLogRepository for MockTaskLogRepository {
    async fn create(&self, log: &TaskLog) -> SchedulerResult<i64> {
        self.check_writable()?;
        let mut logs = self.logs.lock().unwrap();
        let mut new_log = log.clone();
        new_log.id = logs.len() as i64 + 1;
        logs.push(new_log);
        Ok(logs.len() as i64)
    }

    async fn finish(
        &self,
        id: i64,
        status: TaskLogStatus,
        output: &str,
        finished_at: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        self.check_writable()?;
        let mut logs = self.logs.lock().unwrap();
        if let Some(log) = logs.iter_mut().find(|l| l.id == id && l.finished_at.is_none()) {
            log.status = status;
            log.output = output.to_string();
            log.finished_at = Some(finished_at);
        }
        Ok(())
    }

    async fn list_by_task(&self, task_id: i64) -> SchedulerResult<Vec<TaskLog>> {
        Ok(self.logs_for(task_id))
    }
}

/// Notifier that records every request it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    requests: Arc<Mutex<Vec<NotificationRequest>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录请求后返回错误
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, request: &NotificationRequest) -> SchedulerResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SchedulerError::Transport("notifier unavailable".to_string()));
        }
        Ok(())
    }
}

/// Scripted executor
///
/// Each call pops the next scripted outcome; once the script is empty
/// the default outcome is used. An optional delay makes calls slow
/// enough to exercise timeouts and parallelism.
#[derive(Debug, Clone)]
pub struct MockTaskExecutor {
    script: Arc<Mutex<VecDeque<ExecutionOutcome>>>,
    default_outcome: ExecutionOutcome,
    delay: Duration,
    requests: Arc<Mutex<Vec<ExecutionRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    timeouts: Arc<AtomicUsize>,
}

impl MockTaskExecutor {
    pub fn succeeding() -> Self {
        Self::with_default(ExecutionOutcome::Success)
    }

    pub fn failing() -> Self {
        Self::with_default(ExecutionOutcome::Failure)
    }

    pub fn with_default(default_outcome: ExecutionOutcome) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_outcome,
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            timeouts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 依次返回给定结果，用完后返回默认结果
    pub fn with_script(self, outcomes: Vec<ExecutionOutcome>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// 同时执行中的最大调用数
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn timeout_count(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskExecutor for MockTaskExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult> {
        self.requests.lock().unwrap().push(request.clone());
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_outcome);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(Arc::clone(&self.in_flight));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match outcome {
            ExecutionOutcome::Success => Ok(TaskResult::success(format!(
                "{} attempt {}",
                request.command, request.attempt_number
            ))),
            ExecutionOutcome::Timeout => {
                // 睡过任务超时时间，由调用方的超时控制打断
                let overrun = u64::from(request.timeout_seconds) + 1;
                tokio::time::sleep(Duration::from_secs(overrun)).await;
                Err(SchedulerError::ExecutionTimeout {
                    seconds: request.timeout_seconds,
                })
            }
            _ => Ok(TaskResult::failure(format!(
                "{} failed on attempt {}",
                request.command, request.attempt_number
            ))),
        }
    }

    async fn on_timeout(&self, _request: &ExecutionRequest) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "mock"
    }
}
