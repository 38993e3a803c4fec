//! BigDaddyG bridge - model discovery and chat routing for local LLM backends
//!
//! Builds a catalog of locally available models, routes chat and embedding
//! requests to one of two backends by model name, caches repeated results and
//! runs a fixed pool of agent slots on top of the same chat service.

pub mod agents;
pub mod backends;
pub mod bridge;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod telemetry;
