//! Wire 风格的依赖注入模块

use std::sync::Arc;

use anyhow::{Context, Result};
use bistro_core::{BackendClient, BistroAppConfig, SessionIdentity};

use crate::application::handlers::{ConversationCommandHandler, ConversationQueryHandler};
use crate::config::ConversationConfig;
use crate::domain::model::ConversationDomainConfig;
use crate::domain::repository::ConversationGateway;
use crate::domain::service::ConversationDomainService;
use crate::infrastructure::transport::HttpConversationGateway;

/// 应用上下文 - 一个会话内的全部组件
pub struct ApplicationContext {
    pub domain_service: Arc<ConversationDomainService>,
    pub command_handler: ConversationCommandHandler,
    pub query_handler: ConversationQueryHandler,
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
    // 1. 加载会话配置
    let config = ConversationConfig::from_app_config(app_config)
        .context("Failed to load conversation service configuration")?;

    // 2. 创建后端客户端
    let client = BackendClient::new(&config.backend, identity.access_token.clone())
        .context("Failed to create backend client")?;

    // 3. 创建网关
    let gateway: Arc<dyn ConversationGateway> = Arc::new(HttpConversationGateway::new(client));

    Ok(initialize_with_gateway(identity, gateway, config.domain_config()))
}

/// 使用外部提供的网关构建（测试与嵌入场景）
pub fn initialize_with_gateway(
    identity: SessionIdentity,
    gateway: Arc<dyn ConversationGateway>,
    domain_config: ConversationDomainConfig,
) -> ApplicationContext {
    let domain_service = Arc::new(ConversationDomainService::new(
        identity,
        gateway,
        domain_config,
    ));

    ApplicationContext {
        command_handler: ConversationCommandHandler::new(domain_service.clone()),
        query_handler: ConversationQueryHandler::new(domain_service.clone()),
        domain_service,
    }
}
