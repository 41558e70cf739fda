//! mailpress: publish blog posts received by email.

pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod posts;
pub mod site;
