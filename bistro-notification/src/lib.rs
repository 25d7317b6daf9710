//! 后台通知同步核心
//!
//! 分页拉取、受众过滤、本地副本与乐观变更对账。

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use config::NotificationConfig;
pub use domain::model::{
    FetchOutcome, FetchReport, Notification, NotificationSnapshot, NotificationStats,
    NotificationTarget, SyncStatus,
};
pub use domain::repository::NotificationGateway;
pub use domain::service::NotificationDomainService;
