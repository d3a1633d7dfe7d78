//! 任务维护接口
//!
//! 管理端保存、启用、停用、删除和手动运行任务时调用的入口，
//! 负责保持记录存储和定时器注册表一致。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use scheduler_core::models::{Task, TaskStatus, TriggerSource};
use scheduler_core::traits::TaskRepository;
use scheduler_core::{SchedulerError, SchedulerResult};

use crate::dependency_resolver::DependencyResolver;
use crate::dispatcher::{DispatchReport, TaskDispatcher};
use crate::job_registry::JobRegistry;
use crate::validation::TaskValidator;

pub struct TaskService {
    task_repository: Arc<dyn TaskRepository>,
    resolver: DependencyResolver,
    registry: Arc<JobRegistry>,
    dispatcher: Arc<TaskDispatcher>,
}

impl TaskService {
    pub fn new(
        task_repository: Arc<dyn TaskRepository>,
        registry: Arc<JobRegistry>,
        dispatcher: Arc<TaskDispatcher>,
    ) -> Self {
        Self {
            resolver: DependencyResolver::new(Arc::clone(&task_repository)),
            task_repository,
            registry,
            dispatcher,
        }
    }

    /// 新建或更新任务，校验失败时记录存储和定时器都不会改变
    pub async fn save(&self, task: &Task) -> SchedulerResult<Task> {
        let task = TaskValidator::validate(task)?;

        if self
            .task_repository
            .name_exists(&task.name, task.id)
            .await?
        {
            return Err(SchedulerError::Validation(format!(
                "任务名称已存在: {}",
                task.name
            )));
        }

        self.resolver
            .validate_dependencies(task.id, &task.dependency_task_ids)
            .await?;

        let saved = if task.id == 0 {
            self.task_repository.create(&task).await?
        } else {
            if self.task_repository.get_by_id(task.id).await?.is_none() {
                return Err(SchedulerError::TaskNotFound { id: task.id });
            }
            self.task_repository.update(&task).await?;
            task
        };

        if saved.is_parent() {
            self.registry.add(&saved).await?;
        } else {
            self.registry.remove(saved.id).await;
        }

        info!("保存任务成功: task_id={}, name={}", saved.id, saved.name);
        Ok(saved)
    }

    pub async fn enable(&self, task_id: i64) -> SchedulerResult<()> {
        let mut task = self.get_task(task_id).await?;
        self.task_repository
            .update_status(task_id, TaskStatus::Enabled)
            .await?;
        task.status = TaskStatus::Enabled;

        if task.is_parent() {
            self.registry.add(&task).await?;
        }
        info!("启用任务: task_id={}", task_id);
        Ok(())
    }

    pub async fn disable(&self, task_id: i64) -> SchedulerResult<()> {
        self.get_task(task_id).await?;
        self.task_repository
            .update_status(task_id, TaskStatus::Disabled)
            .await?;
        self.registry.remove(task_id).await;
        info!("停用任务: task_id={}", task_id);
        Ok(())
    }

    pub async fn delete(&self, task_id: i64) -> SchedulerResult<()> {
        self.registry.remove(task_id).await;
        self.task_repository.delete(task_id).await?;
        info!("删除任务: task_id={}", task_id);
        Ok(())
    }

    /// 手动运行任务，不经过定时器，在后台执行
    pub async fn run_now(&self, task_id: i64) -> SchedulerResult<JoinHandle<DispatchReport>> {
        let task = self.get_task(task_id).await?;
        let dispatcher = Arc::clone(&self.dispatcher);

        info!("手动运行任务: task_id={}, name={}", task.id, task.name);
        Ok(tokio::spawn(async move {
            dispatcher.run(task, TriggerSource::Manual).await
        }))
    }

    async fn get_task(&self, task_id: i64) -> SchedulerResult<Task> {
        self.task_repository
            .get_by_id(task_id)
            .await?
            .ok_or(SchedulerError::TaskNotFound { id: task_id })
    }
}
