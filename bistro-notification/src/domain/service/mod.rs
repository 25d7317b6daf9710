pub mod fetcher;
pub mod notification_domain_service;
pub mod reconciliation;
pub mod replica_state;
pub mod visibility;

pub use fetcher::PaginatedFetcher;
pub use notification_domain_service::NotificationDomainService;
