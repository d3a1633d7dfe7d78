use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

/// 调度器与 Agent 之间的双向 TLS 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
}

impl TlsConfig {
    /// 启用 TLS 时证书文件必须全部存在
    pub fn ensure_material(&self) -> SchedulerResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let files = [
            ("CA证书", &self.ca_file),
            ("客户端证书", &self.cert_file),
            ("客户端私钥", &self.key_file),
        ];
        for (kind, path) in files {
            if path.is_empty() || !Path::new(path).is_file() {
                return Err(SchedulerError::Configuration(format!(
                    "无法读取{kind}文件: {path}"
                )));
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.ensure_material()?;
        Ok(())
    }
}
