//! Bistro 同步核心公共库
//!
//! 提供配置加载、错误类型、日志、指标以及通知/会话同步共用的
//! 分页游标、拉取序号器、本地副本存储与后端 REST 客户端

pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod pagination;
pub mod replica;
pub mod sequencer;
pub mod tracing;
pub mod transport;

pub use config::{
    BackendConfig, BistroAppConfig, ConfigManager, ConversationServiceConfig, LoggingConfig,
    NotificationServiceConfig, load_config,
};
pub use error::{Result, SyncError};
pub use identity::{Role, SessionIdentity};
pub use pagination::PageCursor;
pub use replica::{ReplicaStore, Replicated};
pub use sequencer::{Completion, FetchSequencer, FetchTicket};
pub use transport::BackendClient;
