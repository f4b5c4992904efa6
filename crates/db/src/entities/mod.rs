pub mod customer;
pub mod staff;
pub mod task;
pub mod task_location_point;
pub mod tracking_sample;
pub mod verification_challenge;
