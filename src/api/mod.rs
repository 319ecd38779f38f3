pub mod announcement;
pub mod auth;
pub mod booking;
pub mod feedback;
pub mod health;
pub mod inventory;
pub mod service;
pub mod user;
