pub mod geo;
pub mod pubsub;
pub mod response;
