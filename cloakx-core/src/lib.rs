//! CloakX Core
//!
//! Core types shared by the CloakX relay, its admin client and the operator CLI.
//!
//! This crate contains:
//! - Domain types: jobs, event cursors, ledger events and training payloads
//! - DTOs: request/response bodies of the relay admin API

pub mod domain;
pub mod dto;
