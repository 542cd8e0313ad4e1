//! Lexgate - Request Gating Service
//!
//! This crate guards the backend functions of a law-office case-management
//! application. Its core is a fixed-window rate limiter keyed by caller
//! identity, exposed as a tower layer for axum routers. It also hosts the
//! subscription lifecycle: the payment webhook that activates or cancels
//! subscribers and the sweep that expires lapsed subscriptions.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod subscriptions;
