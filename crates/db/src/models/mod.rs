pub mod customer;
pub mod ids;
pub mod staff;
pub mod task;
pub mod tracking_sample;
pub mod verification_challenge;
