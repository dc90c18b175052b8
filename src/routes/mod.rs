pub mod admin;
pub mod employer;
pub mod health;
pub mod opportunity;
pub mod taxonomy;
