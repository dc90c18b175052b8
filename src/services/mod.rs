pub mod application_service;
pub mod export_service;
pub mod notification_service;
pub mod opening_service;
pub mod storage_service;
pub mod taxonomy_service;
