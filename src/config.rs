// src/config.rs

use std::{env, str::FromStr};

use dotenvy::dotenv;

use crate::scoring::Tolerance;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Numeric-answer tolerances applied when a request does not override them.
    pub nat_abs_tolerance: f64,
    pub nat_rel_tolerance: f64,
    pub default_question_count: i64,
    /// Seconds on the clock for a new test.
    pub default_test_duration: i32,
    pub port: u16,
}

/// Reads an optional variable, falling back when absent or unparseable.
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{} has an invalid value '{}', using the default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Log filter directives from `RUST_LOG`, `info` when unset.
/// Read on its own so logging is up before the rest of the config is parsed.
pub fn log_filter() -> String {
    dotenv().ok();
    env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

impl Config {
    /// Invalid optional values are logged and replaced by their defaults, so
    /// install the subscriber first.
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let defaults = Tolerance::default();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: var_or("JWT_EXPIRATION", 86_400),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            nat_abs_tolerance: var_or("NAT_ABS_TOLERANCE", defaults.abs_tol),
            nat_rel_tolerance: var_or("NAT_REL_TOLERANCE", defaults.rel_tol),
            default_question_count: var_or("DEFAULT_QUESTION_COUNT", 65),
            default_test_duration: var_or("DEFAULT_TEST_DURATION", 10_800),
            port: var_or("PORT", 3000),
        }
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            abs_tol: self.nat_abs_tolerance,
            rel_tol: self.nat_rel_tolerance,
        }
    }
}
