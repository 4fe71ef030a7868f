//! Core domain types
//!
//! These types are shared between the relay (which persists and drives them)
//! and the admin client / CLI (which only read them).

pub mod cursor;
pub mod event;
pub mod job;
pub mod training;
