// src/services/mod.rs

pub mod session_lock;
pub mod test_session;
