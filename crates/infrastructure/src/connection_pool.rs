//! 远程 Agent 连接池
//!
//! 每个 Agent 地址缓存一个 [`AgentChannel`]，多个并发执行共享同一个通道。
//! 通道在传输错误后标记为失效，下一次 `get` 时被替换。
//! 启用 TLS 时，CA 证书和客户端证书在构造连接池时一次性读取，
//! 任何文件缺失都会让构造失败。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scheduler_core::config::{AgentConfig, TlsConfig};
use scheduler_core::models::{RemoteTaskRequest, RemoteTaskResponse, AGENT_RUN_PATH};
use scheduler_core::{SchedulerError, SchedulerResult};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 已加载的双向 TLS 证书
#[derive(Clone)]
struct TlsMaterial {
    ca: reqwest::Certificate,
    identity: reqwest::Identity,
}

impl TlsMaterial {
    fn load(tls: &TlsConfig) -> SchedulerResult<Self> {
        let ca_pem = read_pem("CA证书", &tls.ca_file)?;
        let mut identity_pem = read_pem("客户端证书", &tls.cert_file)?;
        identity_pem.push(b'\n');
        identity_pem.extend(read_pem("客户端私钥", &tls.key_file)?);

        let ca = reqwest::Certificate::from_pem(&ca_pem)
            .map_err(|e| SchedulerError::Configuration(format!("解析CA证书失败: {e}")))?;
        let identity = reqwest::Identity::from_pem(&identity_pem)
            .map_err(|e| SchedulerError::Configuration(format!("解析客户端证书失败: {e}")))?;

        Ok(Self { ca, identity })
    }
}

fn read_pem(kind: &str, path: &str) -> SchedulerResult<Vec<u8>> {
    if path.is_empty() {
        return Err(SchedulerError::Configuration(format!("未配置{kind}文件")));
    }
    std::fs::read(Path::new(path))
        .map_err(|e| SchedulerError::Configuration(format!("无法读取{kind}文件 {path}: {e}")))
}

/// 到单个 Agent 的执行通道
pub struct AgentChannel {
    address: String,
    endpoint: String,
    client: reqwest::Client,
    broken: AtomicBool,
}

impl AgentChannel {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_healthy(&self) -> bool {
        !self.broken.load(Ordering::Acquire)
    }

    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// 发送一次执行请求
    ///
    /// 传输层错误会把通道标记为失效，Agent 返回的执行错误则不会。
    pub async fn call(&self, request: &RemoteTaskRequest) -> SchedulerResult<RemoteTaskResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                self.mark_broken();
                SchedulerError::Transport(format!("连接Agent {} 失败: {e}", self.address))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchedulerError::Transport(format!(
                "Agent {} 返回异常状态码: {}",
                self.address,
                status.as_u16()
            )));
        }

        response.json::<RemoteTaskResponse>().await.map_err(|e| {
            self.mark_broken();
            SchedulerError::Transport(format!("读取Agent {} 响应失败: {e}", self.address))
        })
    }
}

/// Agent 连接池
pub struct AgentConnectionPool {
    channels: RwLock<HashMap<String, Arc<AgentChannel>>>,
    connect_timeout: Duration,
    tls: Option<TlsMaterial>,
    released: AtomicBool,
}

impl AgentConnectionPool {
    pub fn new(agent: &AgentConfig, tls: &TlsConfig) -> SchedulerResult<Self> {
        let material = if tls.enabled {
            Some(TlsMaterial::load(tls)?)
        } else {
            None
        };

        info!(
            "初始化Agent连接池: tls_enabled={}, connect_timeout={}s",
            tls.enabled, agent.connect_timeout_seconds
        );

        Ok(Self {
            channels: RwLock::new(HashMap::new()),
            connect_timeout: Duration::from_secs(agent.connect_timeout_seconds),
            tls: material,
            released: AtomicBool::new(false),
        })
    }

    /// 获取到指定地址的通道，缓存中没有可用通道时新建
    pub async fn get(&self, address: &str) -> SchedulerResult<Arc<AgentChannel>> {
        self.ensure_open()?;

        {
            let channels = self.channels.read().await;
            if let Some(channel) = channels.get(address) {
                if channel.is_healthy() {
                    return Ok(Arc::clone(channel));
                }
            }
        }

        let mut channels = self.channels.write().await;
        self.ensure_open()?;

        if let Some(channel) = channels.get(address) {
            if channel.is_healthy() {
                return Ok(Arc::clone(channel));
            }
            debug!("移除失效的Agent通道: {}", address);
            channels.remove(address);
        }

        let channel = Arc::new(self.create_channel(address)?);
        channels.insert(address.to_string(), Arc::clone(&channel));
        debug!("创建Agent通道: {}", address);

        Ok(channel)
    }

    /// 移除指定地址的通道，下一次 `get` 会重新建立
    pub async fn invalidate(&self, address: &str) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.remove(address) {
            channel.mark_broken();
            warn!("已移除Agent通道: {}", address);
        }
    }

    /// 关闭连接池并释放所有通道，之后的 `get` 都会失败
    pub async fn release_all(&self) {
        self.released.store(true, Ordering::Release);
        let mut channels = self.channels.write().await;
        let count = channels.len();
        for (_, channel) in channels.drain() {
            channel.mark_broken();
        }
        info!("Agent连接池已释放，关闭通道数: {}", count);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_open(&self) -> SchedulerResult<()> {
        if self.is_released() {
            return Err(SchedulerError::Transport("Agent连接池已关闭".to_string()));
        }
        Ok(())
    }

    fn create_channel(&self, address: &str) -> SchedulerResult<AgentChannel> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(self.connect_timeout);

        let scheme = match &self.tls {
            Some(material) => {
                builder = builder
                    .add_root_certificate(material.ca.clone())
                    .identity(material.identity.clone());
                "https"
            }
            None => "http",
        };

        let client = builder
            .build()
            .map_err(|e| SchedulerError::Transport(format!("创建Agent客户端失败: {e}")))?;

        Ok(AgentChannel {
            address: address.to_string(),
            endpoint: format!("{scheme}://{address}{AGENT_RUN_PATH}"),
            client,
            broken: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> AgentConnectionPool {
        AgentConnectionPool::new(&AgentConfig::default(), &TlsConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_reuses_healthy_channel() {
        let pool = pool();
        let first = pool.get("127.0.0.1:5921").await.unwrap();
        let second = pool.get("127.0.0.1:5921").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len().await, 1);

        pool.get("127.0.0.1:5922").await.unwrap();
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn test_broken_channel_is_replaced() {
        let pool = pool();
        let first = pool.get("127.0.0.1:5921").await.unwrap();
        first.mark_broken();

        let second = pool.get("127.0.0.1:5921").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_healthy());
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_evicts_channel() {
        let pool = pool();
        let channel = pool.get("127.0.0.1:5921").await.unwrap();
        pool.invalidate("127.0.0.1:5921").await;
        assert!(!channel.is_healthy());
        assert!(pool.is_empty().await);

        // 不存在的地址
        pool.invalidate("127.0.0.1:9999").await;
    }

    #[tokio::test]
    async fn test_release_all_closes_pool() {
        let pool = pool();
        pool.get("127.0.0.1:5921").await.unwrap();
        pool.release_all().await;

        assert!(pool.is_released());
        assert!(pool.is_empty().await);
        let err = pool.get("127.0.0.1:5921").await.err().unwrap();
        assert!(matches!(err, SchedulerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_call_marks_channel_broken_on_transport_error() {
        let pool = pool();
        // 端口 1 上没有 Agent
        let channel = pool.get("127.0.0.1:1").await.unwrap();
        let request = RemoteTaskRequest {
            command: "echo hi".to_string(),
            timeout_seconds: 0,
        };

        let err = channel.call(&request).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Transport(_)));
        assert!(!channel.is_healthy());
    }

    #[test]
    fn test_missing_tls_material_is_fatal() {
        let tls = TlsConfig {
            enabled: true,
            ca_file: "/nonexistent/ca.pem".to_string(),
            cert_file: "/nonexistent/cert.pem".to_string(),
            key_file: "/nonexistent/key.pem".to_string(),
        };
        let err = AgentConnectionPool::new(&AgentConfig::default(), &tls)
            .err()
            .unwrap();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    #[test]
    fn test_missing_key_file_is_fatal() {
        let ca = tempfile::NamedTempFile::new().unwrap();
        let cert = tempfile::NamedTempFile::new().unwrap();
        let tls = TlsConfig {
            enabled: true,
            ca_file: ca.path().display().to_string(),
            cert_file: cert.path().display().to_string(),
            key_file: String::new(),
        };
        let err = AgentConnectionPool::new(&AgentConfig::default(), &tls)
            .err()
            .unwrap();
        assert!(err.to_string().contains("客户端私钥"));
    }
}
