//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `send_message` - Text-to-speech synthesis and publishing

pub mod api;
pub mod send_message;
