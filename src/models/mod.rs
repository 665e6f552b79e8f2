// src/models/mod.rs

pub mod answer;
pub mod question;
pub mod test_session;
pub mod user;
