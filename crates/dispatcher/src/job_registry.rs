//! 定时器注册表
//!
//! 每个已启用的主任务对应一个独立的 tokio 定时任务。定时器到期后
//! 另起一个 tokio 任务执行调度，所以执行时间再长也不会推迟任何定时器。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scheduler_core::models::Task;
use scheduler_core::traits::TaskRepository;
use scheduler_core::{SchedulerError, SchedulerResult};
use scheduler_infrastructure::MetricsCollector;

use crate::cron_utils::CronScheduler;

/// 定时器到期后执行任务
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_scheduled(&self, task: Task);
}

struct JobEntry {
    handle: JoinHandle<()>,
    /// 下一次触发时间 (毫秒时间戳)，0 表示没有
    next_fire_ms: Arc<AtomicI64>,
}

pub struct JobRegistry {
    jobs: Mutex<HashMap<i64, JobEntry>>,
    runner: Arc<dyn JobRunner>,
    task_repository: Arc<dyn TaskRepository>,
    metrics: Arc<MetricsCollector>,
    stopped: AtomicBool,
}

impl JobRegistry {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        task_repository: Arc<dyn TaskRepository>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            runner,
            task_repository,
            metrics,
            stopped: AtomicBool::new(false),
        }
    }

    /// 加载所有已启用的主任务并注册定时器，返回注册成功的数量
    pub async fn initialize(&self) -> SchedulerResult<usize> {
        info!("开始添加任务到调度器");

        let tasks = self.task_repository.get_enabled_parent_tasks().await?;
        let mut registered = 0;

        for task in tasks {
            match self.add(&task).await {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => error!("添加任务到调度器失败: task_id={}, error={}", task.id, e),
            }
        }

        info!("定时任务添加完成，共 {} 个", registered);
        Ok(registered)
    }

    /// 添加或替换任务的定时器
    ///
    /// 表达式无效时直接返回错误，已有的定时器不受影响。
    /// 非启用状态的任务会移除已有定时器并返回 `Ok(false)`。
    pub async fn add(&self, task: &Task) -> SchedulerResult<bool> {
        if !task.is_parent() {
            return Err(SchedulerError::Validation(format!(
                "子任务不能添加定时器: task_id={}",
                task.id
            )));
        }

        let schedule = Arc::new(CronScheduler::new(&task.spec)?);

        // 停止标记只在持有锁时修改，这里必须在锁内检查
        let mut jobs = self.jobs.lock().await;
        if self.is_stopped() {
            warn!("调度器已停止，忽略添加任务: task_id={}", task.id);
            return Ok(false);
        }

        if let Some(previous) = jobs.remove(&task.id) {
            previous.handle.abort();
            debug!("取消已有定时器: task_id={}", task.id);
        }

        if !task.is_enabled() {
            self.metrics.update_registered_jobs(jobs.len());
            debug!("任务未启用，不添加定时器: task_id={}", task.id);
            return Ok(false);
        }

        let next_fire_ms = Arc::new(AtomicI64::new(0));
        let handle = tokio::spawn(timer_loop(
            task.clone(),
            schedule,
            Arc::clone(&self.runner),
            Arc::clone(&next_fire_ms),
        ));

        jobs.insert(task.id, JobEntry { handle, next_fire_ms });
        self.metrics.update_registered_jobs(jobs.len());
        info!("添加定时任务: task_id={}, name={}, spec={}", task.id, task.name, task.spec);

        Ok(true)
    }

    /// 移除任务的定时器，任务不存在时不做任何处理
    pub async fn remove(&self, task_id: i64) {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.remove(&task_id) {
            entry.handle.abort();
            info!("移除定时任务: task_id={}", task_id);
        }
        self.metrics.update_registered_jobs(jobs.len());
    }

    /// 停止所有定时器，不等待正在执行的任务
    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.lock().await;
        self.stopped.store(true, Ordering::Release);

        let count = jobs.len();
        for (_, entry) in jobs.drain() {
            entry.handle.abort();
        }
        self.metrics.update_registered_jobs(0);
        info!("已停止所有定时任务，共 {} 个", count);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, task_id: i64) -> bool {
        self.jobs.lock().await.contains_key(&task_id)
    }

    pub async fn next_fire_time(&self, task_id: i64) -> Option<DateTime<Local>> {
        let jobs = self.jobs.lock().await;
        let ms = jobs.get(&task_id)?.next_fire_ms.load(Ordering::Acquire);
        if ms == 0 {
            return None;
        }
        Local.timestamp_millis_opt(ms).single()
    }
}

/// 单个任务的定时循环
///
/// `cursor` 记录上一次触发的时间点，下一次触发严格晚于它，同一时间点不会触发两次。
async fn timer_loop(
    task: Task,
    schedule: Arc<CronScheduler>,
    runner: Arc<dyn JobRunner>,
    next_fire_ms: Arc<AtomicI64>,
) {
    let mut cursor = Local::now();

    loop {
        let Some(mut next) = schedule.next_after(cursor) else {
            warn!("没有后续触发时间，定时器结束: task_id={}", task.id);
            next_fire_ms.store(0, Ordering::Release);
            return;
        };

        // 系统时间跳变后不补跑错过的时间点
        let now = Local::now();
        if next < now - chrono::Duration::seconds(1) {
            debug!("跳过已错过的触发时间: task_id={}, time={}", task.id, next);
            match schedule.next_after(now) {
                Some(upcoming) => next = upcoming,
                None => {
                    next_fire_ms.store(0, Ordering::Release);
                    return;
                }
            }
        }

        next_fire_ms.store(next.timestamp_millis(), Ordering::Release);
        let wait = (next - Local::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        cursor = next;

        debug!("定时器触发: task_id={}, time={}", task.id, next);
        let runner = Arc::clone(&runner);
        let scheduled = task.clone();
        tokio::spawn(async move {
            runner.run_scheduled(scheduled).await;
        });
    }
}
