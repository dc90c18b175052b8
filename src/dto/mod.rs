pub mod application_dto;
pub mod opening_dto;
pub mod taxonomy_dto;
