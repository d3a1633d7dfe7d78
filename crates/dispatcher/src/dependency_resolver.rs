use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use scheduler_core::{
    models::{DependencyStatus, ExecutionOutcome, Task, TaskLevel},
    traits::TaskRepository,
    SchedulerError, SchedulerResult,
};

/// 依赖解析
///
/// 主任务执行结束后决定哪些子任务需要执行。是否执行由主任务的依赖关系决定：
/// 强依赖时主任务成功才执行子任务，弱依赖时总是执行。
pub struct DependencyResolver {
    task_repo: Arc<dyn TaskRepository>,
}

impl DependencyResolver {
    pub fn new(task_repo: Arc<dyn TaskRepository>) -> Self {
        Self { task_repo }
    }

    /// 返回需要执行的子任务，按配置顺序，每个子任务最多出现一次
    pub async fn resolve(&self, parent: &Task, outcome: ExecutionOutcome) -> Vec<Task> {
        if !parent.has_dependencies() {
            return Vec::new();
        }

        if parent.dependency_status == DependencyStatus::Strong && !outcome.is_success() {
            debug!(
                "主任务执行未成功，强依赖子任务不执行: parent_id={}, outcome={:?}",
                parent.id, outcome
            );
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut children = Vec::new();

        for &child_id in &parent.dependency_task_ids {
            if !seen.insert(child_id) {
                continue;
            }

            match self.task_repo.get_by_id(child_id).await {
                Ok(Some(child)) if child.level != TaskLevel::Child => {
                    warn!(
                        "依赖任务不是子任务，跳过: parent_id={}, task_id={}",
                        parent.id, child_id
                    );
                }
                Ok(Some(child)) if !child.is_enabled() => {
                    debug!(
                        "子任务未启用，跳过: parent_id={}, task_id={}",
                        parent.id, child_id
                    );
                }
                Ok(Some(child)) => children.push(child),
                Ok(None) => {
                    warn!(
                        "子任务不存在，跳过: parent_id={}, task_id={}",
                        parent.id, child_id
                    );
                }
                Err(e) => {
                    warn!(
                        "查询子任务失败，跳过: parent_id={}, task_id={}, error={}",
                        parent.id, child_id, e
                    );
                }
            }
        }

        children
    }

    /// 保存任务前校验子任务列表
    pub async fn validate_dependencies(
        &self,
        task_id: i64,
        dependencies: &[i64],
    ) -> SchedulerResult<()> {
        for &dep_id in dependencies {
            if task_id != 0 && dep_id == task_id {
                return Err(SchedulerError::CircularDependency { task_id });
            }

            if self.task_repo.get_by_id(dep_id).await?.is_none() {
                return Err(SchedulerError::Validation(format!(
                    "依赖的子任务不存在: task_id={dep_id}"
                )));
            }
        }

        Ok(())
    }
}
