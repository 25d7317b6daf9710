pub mod attachment;
pub mod conversation_domain_service;
pub mod conversation_state;
pub mod reconciliation;

pub use conversation_domain_service::ConversationDomainService;
