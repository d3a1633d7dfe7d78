use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use scheduler_core::models::{RemoteTaskRequest, RemoteTaskResponse, TaskResult};
use scheduler_core::traits::{ExecutionRequest, ExecutionTarget, TaskExecutor};
use scheduler_core::SchedulerError;

/// Agent 服务状态
#[derive(Clone)]
pub struct AgentState {
    pub executor: Arc<dyn TaskExecutor>,
    pub hostname: String,
}

impl AgentState {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self { executor, hostname }
    }
}

/// 请求被取消 (调度器断开连接) 时终止正在执行的命令
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 执行调度器下发的命令
///
/// 命令在独立的 tokio 任务中执行，执行器 panic 只会让本次请求返回错误。
pub async fn run_command(
    State(state): State<AgentState>,
    Json(request): Json<RemoteTaskRequest>,
) -> Json<RemoteTaskResponse> {
    info!(
        "收到执行请求: command={}, timeout={}s",
        request.command, request.timeout_seconds
    );

    let timeout_seconds = request.timeout_seconds;
    let execution = ExecutionRequest {
        task_id: 0,
        task_name: "remote".to_string(),
        command: request.command,
        timeout_seconds,
        target: ExecutionTarget::Local,
        attempt_number: 1,
    };

    let executor = Arc::clone(&state.executor);
    let mut task = AbortOnDrop(tokio::spawn(async move {
        if timeout_seconds == 0 {
            return executor.execute(&execution).await;
        }
        let limit = Duration::from_secs(u64::from(timeout_seconds));
        match tokio::time::timeout(limit, executor.execute(&execution)).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::ExecutionTimeout {
                seconds: timeout_seconds,
            }),
        }
    }));

    let response = match (&mut task.0).await {
        Ok(Ok(result)) => into_response(result),
        Ok(Err(e)) => {
            warn!("命令执行失败: {}", e);
            RemoteTaskResponse {
                output: String::new(),
                error: e.to_string(),
            }
        }
        Err(e) if e.is_panic() => {
            error!("命令执行发生异常: {}", e);
            RemoteTaskResponse {
                output: String::new(),
                error: format!("执行命令时发生异常: {e}"),
            }
        }
        Err(e) => RemoteTaskResponse {
            output: String::new(),
            error: format!("命令执行被取消: {e}"),
        },
    };

    Json(response)
}

fn into_response(result: TaskResult) -> RemoteTaskResponse {
    if result.success {
        return RemoteTaskResponse {
            output: result.combined_output(),
            error: String::new(),
        };
    }

    let error = result
        .error_message
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("命令执行失败，退出码: {:?}", result.exit_code));
    RemoteTaskResponse {
        output: result.output.unwrap_or_default(),
        error,
    }
}

pub async fn health_check(State(state): State<AgentState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "hostname": state.hostname,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_always_carries_error() {
        let result = TaskResult {
            success: false,
            output: Some("partial".to_string()),
            error_message: None,
            exit_code: Some(2),
            execution_time_ms: 5,
        };
        let response = into_response(result);
        assert!(!response.is_success());
        assert_eq!(response.output, "partial");
        assert!(response.error.contains("2"));
    }

    #[test]
    fn test_success_keeps_stderr_in_output() {
        let mut result = TaskResult::success("done");
        result.error_message = Some("warning".to_string());
        let response = into_response(result);
        assert!(response.is_success());
        assert_eq!(response.output, "done\nwarning");
    }
}
