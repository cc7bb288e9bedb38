//! Lead/Call Bridge Library
//!
//! Connects a lead platform to a call service: lead webhooks become call
//! placements, and the call service's status callbacks are written back onto
//! the originating lead.
//!
//! # Modules
//!
//! - `api`: HTTP handlers.
//! - `core`: Domain models, normalization and errors.
//! - `integrations`: Outbound clients for the call service and lead platform.
//! - `call_handler`: Call-initiation endpoint.
//! - `call_models`: Inbound call request, auxiliary data and outbound payload.
//! - `call_service_client`: Call placement with flat/wrapped schema negotiation.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: Shared state, health check and router.
//! - `lead_platform_client`: Lead update and submission client.
//! - `phone`: Phone normalization.
//! - `status_handler`: Status-callback endpoint.
//! - `status_models`: Status callback, identifier resolution and update form.

pub mod api;
pub mod core;
pub mod integrations;

pub mod call_handler;
pub mod call_models;
pub mod call_service_client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod lead_platform_client;
pub mod phone;
pub mod status_handler;
pub mod status_models;
