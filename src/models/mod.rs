pub mod application;
pub mod category;
pub mod family;
pub mod notification;
pub mod opening;
pub mod user;
