use serde::{Deserialize, Serialize};

/// 远程 Agent 主机
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    pub id: i64,
    /// 主机名或IP地址
    pub name: String,
    pub port: u16,
    /// 别名，日志中优先显示
    pub alias: String,
    pub remark: String,
}

impl Host {
    pub fn new(name: &str, port: u16) -> Self {
        Self {
            id: 0, // 将由数据库生成
            name: name.to_string(),
            port,
            alias: String::new(),
            remark: String::new(),
        }
    }

    /// 连接池使用的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.name, self.port)
    }

    pub fn label(&self) -> String {
        if self.alias.is_empty() {
            self.address()
        } else {
            format!("{}({})", self.alias, self.address())
        }
    }
}
