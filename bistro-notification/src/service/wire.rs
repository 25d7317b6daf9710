//! Wire 风格的依赖注入模块
//!
//! 组合根按依赖顺序构建会话级组件；副本存储随会话创建、随会话结束。

use std::sync::Arc;

use anyhow::{Context, Result};
use bistro_core::{BackendClient, BistroAppConfig, SessionIdentity};

use crate::application::handlers::{NotificationCommandHandler, NotificationQueryHandler};
use crate::config::NotificationConfig;
use crate::domain::model::NotificationDomainConfig;
use crate::domain::repository::NotificationGateway;
use crate::domain::service::NotificationDomainService;
use crate::infrastructure::transport::HttpNotificationGateway;

/// 应用上下文 - 一个会话内的全部组件
pub struct ApplicationContext {
    pub domain_service: Arc<NotificationDomainService>,
    pub command_handler: NotificationCommandHandler,
    pub query_handler: NotificationQueryHandler,
}

/// 构建应用上下文
///
/// # 参数
/// * `app_config` - 应用配置
/// * `identity` - 外部认证模块提供的调用方身份
pub fn initialize(
    app_config: &BistroAppConfig,
    identity: SessionIdentity,
) -> Result<ApplicationContext> {
    // 1. 加载通知配置
    let config = NotificationConfig::from_app_config(app_config)
        .context("Failed to load notification service configuration")?;

    // 2. 创建后端客户端
    let client = BackendClient::new(&config.backend, identity.access_token.clone())
        .context("Failed to create backend client")?;

    // 3. 创建网关
    let gateway: Arc<dyn NotificationGateway> = Arc::new(HttpNotificationGateway::new(client));

    Ok(initialize_with_gateway(identity, gateway, config.domain_config()))
}

/// 使用外部提供的网关构建（测试与嵌入场景）
pub fn initialize_with_gateway(
    identity: SessionIdentity,
    gateway: Arc<dyn NotificationGateway>,
    domain_config: NotificationDomainConfig,
) -> ApplicationContext {
    let domain_service = Arc::new(NotificationDomainService::new(
        identity,
        gateway,
        domain_config,
    ));

    ApplicationContext {
        command_handler: NotificationCommandHandler::new(domain_service.clone()),
        query_handler: NotificationQueryHandler::new(domain_service.clone()),
        domain_service,
    }
}
