//! Chatroom - client for a real-time chat-room server
//!
//! The core is the authenticated request layer in [`auth`]: business calls
//! are wrapped once and transparently carry a bearer credential that is
//! renewed before it expires.

pub mod auth;
pub mod config;
pub mod error;
pub mod password;
pub mod rooms;
pub mod ui;

pub use error::{Error, Result};
