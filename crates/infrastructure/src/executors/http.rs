use std::time::{Duration, Instant};

use async_trait::async_trait;
use scheduler_core::models::TaskResult;
use scheduler_core::traits::{ExecutionRequest, TaskExecutor};
use scheduler_core::{SchedulerError, SchedulerResult};
use tracing::{error, info};

/// HTTP任务执行器
///
/// 对任务命令中的 URL 发起 GET 请求，2xx 状态码视为成功。
pub struct HttpExecutor {
    client: reqwest::Client,
    /// 任务未设置超时时使用
    default_timeout: Duration,
}

impl HttpExecutor {
    pub fn new(default_timeout: Duration) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            default_timeout,
        })
    }

    /// 任务设置了超时时由调度端计时，客户端只在未设置时兜底
    fn client_timeout(&self, request: &ExecutionRequest) -> Option<Duration> {
        (request.timeout_seconds == 0).then_some(self.default_timeout)
    }
}

#[async_trait]
impl TaskExecutor for HttpExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult> {
        let start_time = Instant::now();
        let url = request.command.trim();

        info!(
            "执行HTTP任务: task_id={}, attempt={}, url={}",
            request.task_id, request.attempt_number, url
        );

        let mut builder = self.client.get(url);
        if let Some(timeout) = self.client_timeout(request) {
            builder = builder.timeout(timeout);
        }
        let response_result = builder.send().await;

        match response_result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let success = response.status().is_success();

                let response_body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("读取响应体失败: {e}"));

                let result = TaskResult {
                    success,
                    output: Some(response_body),
                    error_message: if success {
                        None
                    } else {
                        Some(format!("HTTP请求失败，状态码: {status_code}"))
                    },
                    exit_code: Some(i32::from(status_code)),
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                };

                info!(
                    "HTTP任务执行完成: task_id={}, success={}, status={}, duration={}ms",
                    request.task_id, success, status_code, result.execution_time_ms
                );

                Ok(result)
            }
            Err(e) if e.is_timeout() => {
                let seconds = self
                    .client_timeout(request)
                    .map_or(request.timeout_seconds, |t| {
                        u32::try_from(t.as_secs()).unwrap_or(u32::MAX)
                    });
                error!("HTTP任务请求超时: task_id={}, timeout={}s", request.task_id, seconds);
                Err(SchedulerError::ExecutionTimeout { seconds })
            }
            Err(e) => {
                let error_message = format!("HTTP请求失败: {e}");
                error!(
                    "HTTP任务执行失败: task_id={}, error={}",
                    request.task_id, error_message
                );

                let mut result = TaskResult::failure(error_message);
                result.execution_time_ms = start_time.elapsed().as_millis() as u64;
                Ok(result)
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
