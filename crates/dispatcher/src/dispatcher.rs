//! 任务执行调度
//!
//! 一次任务执行的完整流程：
//! 1. 运行计数加一
//! 2. 确定执行目标，Shell/HTTP 在本机执行，远程任务在任务配置的每台主机上执行
//! 3. 每个目标独立重试，串行或并行执行
//! 4. 汇总结果，所有目标的最后一次尝试都成功才算成功
//! 5. 运行计数减一
//! 6. 按通知策略发送通知
//! 7. 解析并执行子任务

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scheduler_core::config::DispatcherConfig;
use scheduler_core::models::{
    ExecutionOutcome, MultiMode, Task, TaskLog, TaskLogStatus, TaskProtocol, TriggerSource,
};
use scheduler_core::traits::{
    ExecutionRequest, ExecutionTarget, HostRepository, Notifier, TaskExecutor, TaskLogRepository,
    TaskRepository,
};
use scheduler_infrastructure::MetricsCollector;

use crate::dependency_resolver::DependencyResolver;
use crate::job_registry::JobRunner;
use crate::notification::NotificationDecision;
use crate::retry::{AttemptResult, RetryController};
use crate::run_tracker::RunTracker;

/// 各执行方式对应的执行器
#[derive(Clone)]
pub struct ExecutorSet {
    pub shell: Arc<dyn TaskExecutor>,
    pub http: Arc<dyn TaskExecutor>,
    pub remote_agent: Arc<dyn TaskExecutor>,
}

impl ExecutorSet {
    pub fn for_protocol(&self, protocol: TaskProtocol) -> &Arc<dyn TaskExecutor> {
        match protocol {
            TaskProtocol::Shell => &self.shell,
            TaskProtocol::Http => &self.http,
            TaskProtocol::RemoteAgent => &self.remote_agent,
        }
    }
}

/// 单个执行目标的结果
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub attempts: u32,
    pub outcome: ExecutionOutcome,
    pub output: String,
}

/// 一次任务执行的结果
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub task_id: i64,
    pub task_name: String,
    pub trigger: TriggerSource,
    pub outcome: ExecutionOutcome,
    pub targets: Vec<TargetReport>,
}

impl ExecutionReport {
    pub fn attempts(&self) -> u32 {
        self.targets.iter().map(|t| t.attempts).sum()
    }

    fn combined_output(&self) -> String {
        match self.targets.as_slice() {
            [single] => single.output.clone(),
            targets => targets
                .iter()
                .map(|t| format!("主机: [{}]\n{}", t.target, t.output))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// 一次调度的全部执行，包括依赖链上的子任务，第一个是触发的任务本身
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub executions: Vec<ExecutionReport>,
}

impl DispatchReport {
    pub fn root(&self) -> Option<&ExecutionReport> {
        self.executions.first()
    }

    pub fn root_outcome(&self) -> Option<ExecutionOutcome> {
        self.root().map(|r| r.outcome)
    }

    pub fn executions_of(&self, task_id: i64) -> Vec<&ExecutionReport> {
        self.executions
            .iter()
            .filter(|e| e.task_id == task_id)
            .collect()
    }
}

/// 等待执行的子任务及其祖先链
struct PendingChild {
    task: Task,
    parent_id: i64,
    ancestry: Vec<i64>,
}

pub struct TaskDispatcher {
    executors: ExecutorSet,
    host_repository: Arc<dyn HostRepository>,
    log_repository: Arc<dyn TaskLogRepository>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<RunTracker>,
    resolver: DependencyResolver,
    retry: RetryController,
    notification: NotificationDecision,
    metrics: Arc<MetricsCollector>,
    max_dependency_depth: usize,
}

impl TaskDispatcher {
    pub fn new(
        executors: ExecutorSet,
        task_repository: Arc<dyn TaskRepository>,
        host_repository: Arc<dyn HostRepository>,
        log_repository: Arc<dyn TaskLogRepository>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<RunTracker>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            executors,
            host_repository,
            log_repository,
            notifier,
            tracker,
            resolver: DependencyResolver::new(task_repository),
            retry: RetryController::new(Duration::from_millis(config.retry_interval_ms)),
            notification: NotificationDecision::default(),
            metrics: Arc::new(MetricsCollector::new()),
            max_dependency_depth: config.max_dependency_depth,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn tracker(&self) -> &Arc<RunTracker> {
        &self.tracker
    }

    /// 执行任务，并在结束后按依赖关系执行子任务
    ///
    /// 同一父任务的子任务并发执行；祖先链中已出现的任务不会再次执行，
    /// 超过最大深度的依赖链会被截断。
    pub async fn run(&self, task: Task, trigger: TriggerSource) -> DispatchReport {
        let root = self.execute_task(&task, trigger).await;
        let mut pending = FuturesUnordered::new();
        self.enqueue_children(&mut pending, &task, root.outcome, vec![task.id])
            .await;

        let mut executions = vec![root];
        while let Some((child, ancestry, report)) = pending.next().await {
            let outcome = report.outcome;
            executions.push(report);
            self.enqueue_children(&mut pending, &child, outcome, ancestry)
                .await;
        }

        DispatchReport { executions }
    }

    async fn enqueue_children<'a>(
        &'a self,
        pending: &mut FuturesUnordered<BoxFuture<'a, (Task, Vec<i64>, ExecutionReport)>>,
        parent: &Task,
        outcome: ExecutionOutcome,
        ancestry: Vec<i64>,
    ) {
        let children = self.resolver.resolve(parent, outcome).await;
        if children.is_empty() {
            return;
        }

        if ancestry.len() >= self.max_dependency_depth {
            warn!(
                "依赖链超过最大深度 {}，不再执行子任务: parent_id={}",
                self.max_dependency_depth, parent.id
            );
            return;
        }

        for child in children {
            if ancestry.contains(&child.id) {
                warn!(
                    "检测到循环依赖，跳过子任务: parent_id={}, task_id={}, chain={:?}",
                    parent.id, child.id, ancestry
                );
                continue;
            }

            let mut child_ancestry = ancestry.clone();
            child_ancestry.push(child.id);
            self.metrics.record_dependency_dispatch(parent.id, child.id);

            let item = PendingChild {
                task: child,
                parent_id: parent.id,
                ancestry: child_ancestry,
            };
            pending.push(Box::pin(async move {
                let trigger = TriggerSource::Dependency {
                    parent_id: item.parent_id,
                };
                let report = self.execute_task(&item.task, trigger).await;
                (item.task, item.ancestry, report)
            }));
        }
    }

    /// 执行单个任务 (不含子任务)
    pub async fn execute_task(&self, task: &Task, trigger: TriggerSource) -> ExecutionReport {
        let started = Instant::now();
        let execution_id = Uuid::new_v4();
        let guard = self.tracker.track();
        self.metrics.update_running_executions(self.tracker.num());

        info!(
            "开始执行任务: task_id={}, name={}, trigger={}, execution_id={}",
            task.id,
            task.name,
            trigger.describe(),
            execution_id
        );

        let targets = match self.resolve_targets(task).await {
            Ok(targets) => match task.multi {
                MultiMode::Parallel => {
                    join_all(
                        targets
                            .iter()
                            .map(|target| self.run_target(task, target, execution_id, trigger)),
                    )
                    .await
                }
                MultiMode::Serial => {
                    let mut reports = Vec::with_capacity(targets.len());
                    for target in &targets {
                        reports.push(self.run_target(task, target, execution_id, trigger).await);
                    }
                    reports
                }
            },
            Err(message) => {
                vec![
                    self.record_failed_dispatch(task, execution_id, trigger, message)
                        .await,
                ]
            }
        };

        let outcome = aggregate_outcome(&targets);
        drop(guard);
        self.metrics.update_running_executions(self.tracker.num());

        let report = ExecutionReport {
            execution_id,
            task_id: task.id,
            task_name: task.name.clone(),
            trigger,
            outcome,
            targets,
        };

        self.metrics.record_task_execution(
            task.id,
            TaskLogStatus::Finished(outcome).as_str(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            "任务执行结束: task_id={}, outcome={:?}, attempts={}, duration={}ms",
            task.id,
            outcome,
            report.attempts(),
            started.elapsed().as_millis()
        );

        self.send_notification(task, &report).await;

        report
    }

    async fn resolve_targets(&self, task: &Task) -> Result<Vec<ExecutionTarget>, String> {
        match task.protocol {
            TaskProtocol::Shell | TaskProtocol::Http => Ok(vec![ExecutionTarget::Local]),
            TaskProtocol::RemoteAgent => {
                let hosts = self
                    .host_repository
                    .get_hosts_for_task(task.id)
                    .await
                    .map_err(|e| format!("查询任务主机失败: {e}"))?;
                if hosts.is_empty() {
                    return Err("任务未配置执行主机".to_string());
                }
                Ok(hosts.into_iter().map(ExecutionTarget::Agent).collect())
            }
        }
    }

    /// 在单个目标上执行，失败时按重试次数重新尝试
    async fn run_target(
        &self,
        task: &Task,
        target: &ExecutionTarget,
        execution_id: Uuid,
        trigger: TriggerSource,
    ) -> TargetReport {
        let executor = self.executors.for_protocol(task.protocol);
        let max_attempts = self.retry.max_attempts(task);
        let label = target.label();
        let mut last = AttemptResult {
            outcome: ExecutionOutcome::Failure,
            output: String::new(),
        };
        let mut attempts = 0;

        for attempt_number in 1..=max_attempts {
            attempts = attempt_number;
            let request = ExecutionRequest {
                task_id: task.id,
                task_name: task.name.clone(),
                command: task.command.clone(),
                timeout_seconds: task.timeout_seconds,
                target: target.clone(),
                attempt_number,
            };

            let log = TaskLog::start(
                execution_id,
                task.id,
                &task.name,
                trigger,
                &label,
                attempt_number,
            );
            let log_id = self.start_log(&log).await;
            self.metrics.record_attempt();

            last = self.retry.run_attempt(executor.as_ref(), &request).await;
            self.finish_log(log_id, &last).await;

            match last.outcome {
                ExecutionOutcome::Success => break,
                ExecutionOutcome::Timeout => {
                    self.metrics
                        .record_task_timeout(task.id, &label, task.timeout_seconds)
                }
                _ => self.metrics.record_task_failure(task.id, &label),
            }

            if attempt_number < max_attempts {
                info!(
                    "任务执行失败，准备重试: task_id={}, target={}, next_attempt={}/{}",
                    task.id,
                    label,
                    attempt_number + 1,
                    max_attempts
                );
                self.metrics.record_task_retry(task.id, attempt_number + 1);
                self.retry.delay_before_retry().await;
            }
        }

        TargetReport {
            target: label,
            attempts,
            outcome: last.outcome,
            output: last.output,
        }
    }

    /// 没有可执行的目标时写一条失败日志
    async fn record_failed_dispatch(
        &self,
        task: &Task,
        execution_id: Uuid,
        trigger: TriggerSource,
        message: String,
    ) -> TargetReport {
        error!("任务无法执行: task_id={}, reason={}", task.id, message);

        let log = TaskLog::start(execution_id, task.id, &task.name, trigger, "-", 1);
        let log_id = self.start_log(&log).await;
        let result = AttemptResult {
            outcome: ExecutionOutcome::Failure,
            output: message,
        };
        self.finish_log(log_id, &result).await;
        self.metrics.record_task_failure(task.id, "-");

        TargetReport {
            target: "-".to_string(),
            attempts: 0,
            outcome: result.outcome,
            output: result.output,
        }
    }

    async fn start_log(&self, log: &TaskLog) -> Option<i64> {
        match self.log_repository.create(log).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("写入任务日志失败: task_id={}, error={}", log.task_id, e);
                None
            }
        }
    }

    async fn finish_log(&self, log_id: Option<i64>, result: &AttemptResult) {
        let Some(id) = log_id else {
            return;
        };
        if let Err(e) = self
            .log_repository
            .finish(
                id,
                TaskLogStatus::Finished(result.outcome),
                &result.output,
                Utc::now(),
            )
            .await
        {
            error!("更新任务日志失败: log_id={}, error={}", id, e);
        }
    }

    async fn send_notification(&self, task: &Task, report: &ExecutionReport) {
        let Some(request) = self.notification.evaluate(
            task,
            report.outcome,
            &report.combined_output(),
            report.execution_id,
        ) else {
            return;
        };

        self.metrics.record_notification();
        if let Err(e) = self.notifier.notify(&request).await {
            warn!("发送任务通知失败: task_id={}, error={}", task.id, e);
        }
    }
}

#[async_trait]
impl JobRunner for TaskDispatcher {
    async fn run_scheduled(&self, task: Task) {
        let report = self.run(task, TriggerSource::Scheduled).await;
        debug!(
            "定时调度完成: root_outcome={:?}, executions={}",
            report.root_outcome(),
            report.executions.len()
        );
    }
}

/// 所有目标的最后一次尝试都成功才算成功，超时只记录在单次执行日志上
fn aggregate_outcome(targets: &[TargetReport]) -> ExecutionOutcome {
    if !targets.is_empty() && targets.iter().all(|t| t.outcome.is_success()) {
        ExecutionOutcome::Success
    } else {
        ExecutionOutcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(outcome: ExecutionOutcome) -> TargetReport {
        TargetReport {
            target: "localhost".to_string(),
            attempts: 1,
            outcome,
            output: String::new(),
        }
    }

    #[test]
    fn test_aggregate_outcome() {
        use ExecutionOutcome::*;

        assert_eq!(aggregate_outcome(&[]), Failure);
        assert_eq!(aggregate_outcome(&[target(Success), target(Success)]), Success);
        assert_eq!(aggregate_outcome(&[target(Success), target(Failure)]), Failure);
        assert_eq!(aggregate_outcome(&[target(Success), target(Timeout)]), Failure);
        assert_eq!(aggregate_outcome(&[target(Timeout)]), Failure);
        assert_eq!(aggregate_outcome(&[target(Timeout), target(Failure)]), Failure);
    }

    #[test]
    fn test_combined_output_labels_hosts() {
        let mut first = target(ExecutionOutcome::Success);
        first.target = "web-01".to_string();
        first.output = "ok".to_string();
        let mut second = target(ExecutionOutcome::Failure);
        second.target = "web-02".to_string();
        second.output = "boom".to_string();

        let report = ExecutionReport {
            execution_id: Uuid::new_v4(),
            task_id: 1,
            task_name: "deploy".to_string(),
            trigger: TriggerSource::Manual,
            outcome: ExecutionOutcome::Failure,
            targets: vec![first.clone(), second],
        };
        assert_eq!(
            report.combined_output(),
            "主机: [web-01]\nok\n\n主机: [web-02]\nboom"
        );
        assert_eq!(report.attempts(), 2);

        let single = ExecutionReport {
            targets: vec![first],
            ..report
        };
        assert_eq!(single.combined_output(), "ok");
    }
}
