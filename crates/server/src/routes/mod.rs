pub mod customers;
pub mod health;
pub mod staff;
pub mod tasks;
pub mod timeline;
pub mod tracking;
pub mod verification;
