pub mod config;
pub mod events;
pub mod geocode;
pub mod mailer;
pub mod timeline;
pub mod tracking;
pub mod verification;
