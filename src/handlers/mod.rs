// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod evaluate;
pub mod test_session;
