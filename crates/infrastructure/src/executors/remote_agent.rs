use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use scheduler_core::models::{RemoteTaskRequest, TaskResult};
use scheduler_core::traits::{ExecutionRequest, ExecutionTarget, TaskExecutor};
use scheduler_core::{SchedulerError, SchedulerResult};
use tracing::{info, warn};

use crate::connection_pool::AgentConnectionPool;

/// 远程Agent任务执行器
///
/// 通过连接池把命令发送到目标主机上的 Agent 执行。
pub struct RemoteAgentExecutor {
    pool: Arc<AgentConnectionPool>,
}

impl RemoteAgentExecutor {
    pub fn new(pool: Arc<AgentConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskExecutor for RemoteAgentExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult> {
        let host = match &request.target {
            ExecutionTarget::Agent(host) => host,
            ExecutionTarget::Local => {
                return Err(SchedulerError::Internal(format!(
                    "远程任务缺少目标主机: task_id={}",
                    request.task_id
                )));
            }
        };

        let start_time = Instant::now();
        let channel = self.pool.get(&host.address()).await?;
        let response = channel
            .call(&RemoteTaskRequest {
                command: request.command.clone(),
                timeout_seconds: request.timeout_seconds,
            })
            .await?;

        let success = response.is_success();
        info!(
            "远程任务执行完成: task_id={}, host={}, attempt={}, success={}",
            request.task_id,
            host.label(),
            request.attempt_number,
            success
        );

        Ok(TaskResult {
            success,
            output: if response.output.is_empty() {
                None
            } else {
                Some(response.output)
            },
            error_message: if success { None } else { Some(response.error) },
            exit_code: None,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    async fn on_timeout(&self, request: &ExecutionRequest) {
        if let ExecutionTarget::Agent(host) = &request.target {
            warn!(
                "远程任务执行超时，断开Agent通道: task_id={}, host={}",
                request.task_id,
                host.label()
            );
            self.pool.invalidate(&host.address()).await;
        }
    }

    fn name(&self) -> &str {
        "remote_agent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use scheduler_core::config::{AgentConfig, TlsConfig};
    use scheduler_core::models::{Host, RemoteTaskResponse, AGENT_RUN_PATH};

    async fn fake_agent() -> Host {
        let app = Router::new().route(
            AGENT_RUN_PATH,
            post(|Json(request): Json<RemoteTaskRequest>| async move {
                if request.command == "fail" {
                    Json(RemoteTaskResponse {
                        output: String::new(),
                        error: "exit status 1".to_string(),
                    })
                } else {
                    Json(RemoteTaskResponse {
                        output: format!("ran {}", request.command),
                        error: String::new(),
                    })
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Host::new("127.0.0.1", address.port())
    }

    fn request(command: &str, host: Host) -> ExecutionRequest {
        ExecutionRequest {
            task_id: 3,
            task_name: "remote".to_string(),
            command: command.to_string(),
            timeout_seconds: 10,
            target: ExecutionTarget::Agent(host),
            attempt_number: 1,
        }
    }

    fn executor() -> (RemoteAgentExecutor, Arc<AgentConnectionPool>) {
        let pool = Arc::new(
            AgentConnectionPool::new(&AgentConfig::default(), &TlsConfig::default()).unwrap(),
        );
        (RemoteAgentExecutor::new(Arc::clone(&pool)), pool)
    }

    #[tokio::test]
    async fn test_remote_success_and_failure() {
        let host = fake_agent().await;
        let (executor, _pool) = executor();

        let ok = executor
            .execute(&request("uptime", host.clone()))
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.output.as_deref(), Some("ran uptime"));

        let failed = executor.execute(&request("fail", host)).await.unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error_message.as_deref(), Some("exit status 1"));
    }

    #[tokio::test]
    async fn test_local_target_is_rejected() {
        let (executor, _pool) = executor();
        let mut req = request("uptime", Host::new("127.0.0.1", 1));
        req.target = ExecutionTarget::Local;
        assert!(matches!(
            executor.execute(&req).await,
            Err(SchedulerError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_invalidates_channel() {
        let host = fake_agent().await;
        let (executor, pool) = executor();
        let req = request("uptime", host);

        executor.execute(&req).await.unwrap();
        assert_eq!(pool.len().await, 1);

        executor.on_timeout(&req).await;
        assert!(pool.is_empty().await);
    }
}
