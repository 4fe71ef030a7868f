//! Data Transfer Objects for the relay admin API

pub mod cursor;
pub mod job;
