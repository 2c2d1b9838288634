//! # kadernim-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Accept domain events (`POST /api/events`) and campaign triggers
//!   (`POST /api/campaigns/{id}/schedule`) and hand them to the event bus
//! - Expose the execution log and the active rules for an event as JSON
//! - Map application errors into HTTP responses
//!
//! Processing is asynchronous: intake endpoints answer `202 Accepted` as
//! soon as the event is on the bus.
//!
//! ## Dependency rule
//! Depends on `kadernim-app` (for port traits) and `kadernim-domain` (for
//! domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
