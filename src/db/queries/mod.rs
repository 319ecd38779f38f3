pub mod announcement;
pub mod booking;
pub mod feedback;
pub mod inventory;
pub mod service;
pub mod user;
