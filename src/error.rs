//! Bistro 同步核心错误模块
//!
//! - 统一定义拉取、变更、状态迁移等错误类型
//! - 错误作为返回值在组件边界传递，不跨边界 panic

use thiserror::Error;

/// 同步核心统一 Result
pub type Result<T> = std::result::Result<T, SyncError>;

/// 同步核心错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// 拉取失败（网络错误、解码失败或非 2xx 响应）
    #[error("fetch failed: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    /// 变更调用失败（本地乐观变更已经生效）
    #[error("{operation} failed: {message}")]
    Mutation {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// 会话状态迁移不合法
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// 本地副本中不存在目标记录
    #[error("{entity} {id} not found in local replica")]
    NotFound { entity: &'static str, id: String },

    /// 所属会话已结束
    #[error("sync session already closed")]
    SessionClosed,

    /// 附件读取失败
    #[error("attachment error: {0}")]
    Attachment(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn fetch(message: impl Into<String>) -> Self {
        SyncError::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn mutation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Mutation {
            operation: operation.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// 将传输层错误归类为指定操作的变更错误
    pub fn into_mutation(self, operation: &str) -> Self {
        match self {
            SyncError::Fetch { status, message } => SyncError::Mutation {
                operation: operation.to_string(),
                status,
                message,
            },
            other => other,
        }
    }

    /// HTTP 状态码（如果有）
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Fetch { status, .. } | SyncError::Mutation { status, .. } => *status,
            _ => None,
        }
    }

    /// 是否为可通过重新拉取恢复的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Fetch { status, .. } | SyncError::Mutation { status, .. } => {
                !matches!(
                    status,
                    Some(code) if (400..500).contains(code) && *code != 408 && *code != 429
                )
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Fetch {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::fetch(format!("invalid response body: {}", err))
    }
}
