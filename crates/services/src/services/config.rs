//! Company-level settings read from the environment at startup.

use std::{env, time::Duration};

use db::models::task::StepRequirements;
use tracing::warn;

const DEFAULT_OTP_REQUIRED: bool = true;
const DEFAULT_GEOFENCE_REQUIRED: bool = true;
const DEFAULT_PHOTO_REQUIRED: bool = false;
const DEFAULT_FORM_REQUIRED: bool = false;
const DEFAULT_LOCATION_HISTORY_CAP: usize = 500;
const DEFAULT_OTP_TTL_SECS: u64 = 600;
const DEFAULT_GEOCODE_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct CompanySettings {
    /// Org-wide step requirement defaults; per-task overrides win.
    pub otp_required: bool,
    pub geofence_required: bool,
    pub photo_required: bool,
    pub form_required: bool,
    /// Ring-buffer size of the bounded live-view history per task.
    pub location_history_cap: usize,
    /// A code older than this can no longer be verified.
    pub otp_ttl: Duration,
    /// Reverse geocoding is best-effort and cut off at this deadline.
    pub geocode_timeout: Duration,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            otp_required: DEFAULT_OTP_REQUIRED,
            geofence_required: DEFAULT_GEOFENCE_REQUIRED,
            photo_required: DEFAULT_PHOTO_REQUIRED,
            form_required: DEFAULT_FORM_REQUIRED,
            location_history_cap: DEFAULT_LOCATION_HISTORY_CAP,
            otp_ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            geocode_timeout: Duration::from_secs(DEFAULT_GEOCODE_TIMEOUT_SECS),
        }
    }
}

impl CompanySettings {
    pub fn from_env() -> Self {
        Self::from_env_with(|name| env::var(name).ok())
    }

    fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            otp_required: read_env_bool("FIELDOPS_OTP_REQUIRED", defaults.otp_required, &get_env),
            geofence_required: read_env_bool(
                "FIELDOPS_GEOFENCE_REQUIRED",
                defaults.geofence_required,
                &get_env,
            ),
            photo_required: read_env_bool(
                "FIELDOPS_PHOTO_REQUIRED",
                defaults.photo_required,
                &get_env,
            ),
            form_required: read_env_bool(
                "FIELDOPS_FORM_REQUIRED",
                defaults.form_required,
                &get_env,
            ),
            location_history_cap: read_env_usize(
                "FIELDOPS_LOCATION_HISTORY_CAP",
                defaults.location_history_cap,
                &get_env,
            )
            .max(1),
            otp_ttl: Duration::from_secs(read_env_u64(
                "FIELDOPS_OTP_TTL_SECS",
                DEFAULT_OTP_TTL_SECS,
                &get_env,
            )),
            geocode_timeout: Duration::from_secs(read_env_u64(
                "FIELDOPS_GEOCODE_TIMEOUT_SECS",
                DEFAULT_GEOCODE_TIMEOUT_SECS,
                &get_env,
            )),
        }
    }

    pub fn step_defaults(&self) -> StepRequirements {
        StepRequirements {
            otp: self.otp_required,
            geofence: self.geofence_required,
            photo: self.photo_required,
            form: self.form_required,
        }
    }
}

fn read_env_usize<F>(name: &str, default: usize, get_env: &F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match get_env(name) {
        Some(value) => match value.parse::<usize>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        None => default,
    }
}

fn read_env_u64<F>(name: &str, default: u64, get_env: &F) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match get_env(name) {
        Some(value) => match value.parse::<u64>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        None => default,
    }
}

fn read_env_bool<F>(name: &str, default: bool, get_env: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match get_env(name) {
        Some(value) => match value.parse::<bool>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_is_empty() {
        let settings = CompanySettings::from_env_with(|_| None);
        assert!(settings.otp_required);
        assert!(settings.geofence_required);
        assert_eq!(settings.location_history_cap, 500);
        assert_eq!(settings.otp_ttl, Duration::from_secs(600));
    }

    #[test]
    fn invalid_values_fall_back() {
        let settings = CompanySettings::from_env_with(|name| match name {
            "FIELDOPS_LOCATION_HISTORY_CAP" => Some("not-a-number".to_string()),
            "FIELDOPS_OTP_REQUIRED" => Some("definitely".to_string()),
            _ => None,
        });
        assert_eq!(settings.location_history_cap, 500);
        assert!(settings.otp_required);
    }

    #[test]
    fn overrides_are_honored_and_cap_is_floored() {
        let settings = CompanySettings::from_env_with(|name| match name {
            "FIELDOPS_OTP_REQUIRED" => Some("false".to_string()),
            "FIELDOPS_LOCATION_HISTORY_CAP" => Some("0".to_string()),
            "FIELDOPS_OTP_TTL_SECS" => Some("120".to_string()),
            _ => None,
        });
        assert!(!settings.otp_required);
        assert_eq!(settings.location_history_cap, 1);
        assert_eq!(settings.otp_ttl, Duration::from_secs(120));
    }
}
