use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use scheduler_core::models::TaskResult;
use scheduler_core::traits::{ExecutionRequest, TaskExecutor};
use scheduler_core::{SchedulerError, SchedulerResult};
use tokio::process::Command;
use tracing::{debug, info};

/// Shell任务执行器
///
/// 通过系统 shell 执行命令。子进程在执行 future 被丢弃时终止，
/// 所以外层的超时控制可以直接取消正在运行的命令。
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    fn build_command(command: &str) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// 执行命令并收集输出
    pub async fn run_command(&self, command: &str) -> SchedulerResult<TaskResult> {
        let start_time = Instant::now();

        debug!("执行Shell命令: {}", command);

        let output = Self::build_command(command)
            .output()
            .await
            .map_err(|e| SchedulerError::TaskExecution(format!("启动Shell命令失败: {e}")))?;

        let exit_code = output.status.code();
        let success = output.status.success();
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        let error_message = if !stderr.is_empty() {
            Some(stderr)
        } else if !success {
            Some(format!("命令执行失败，退出码: {exit_code:?}"))
        } else {
            None
        };

        Ok(TaskResult {
            success,
            output: if stdout.is_empty() { None } else { Some(stdout) },
            error_message,
            exit_code,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> SchedulerResult<TaskResult> {
        let result = self.run_command(&request.command).await?;

        info!(
            "Shell任务执行完成: task_id={}, attempt={}, success={}, exit_code={:?}, duration={}ms",
            request.task_id,
            request.attempt_number,
            result.success,
            result.exit_code,
            result.execution_time_ms
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        "shell"
    }
}
