//! Generative fallback: prompt construction and validated model calls.
pub mod client;
pub mod prompt;

pub use client::GenerativeClient;
