//! Masumi Core
//!
//! Core types shared by the Masumi agent service and its payment client.
//!
//! This crate contains:
//! - Domain types: the Job record and its lifecycle transitions
//! - DTOs: request and response bodies of the agent HTTP API
//! - Hashing: input and result digests exchanged with the payment service

pub mod domain;
pub mod dto;
pub mod hash;
