//! Session management for tracking connected clients
//!
//! This module handles:
//! - Tracking all connected client sessions
//! - Serialized writes to each session's text adapter
//! - Direct and broadcast delivery of text messages

mod connection;
mod manager;

pub use connection::{Session, SessionHandle, SessionId};
pub use manager::SessionManager;
