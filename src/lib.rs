//! Storefront Reviews API Library
//!
//! This library provides the core functionality for the storefront
//! reviews proxy: configuration, the Judge.me API client, the
//! fetch/filter/transform pipeline, data models, and HTTP handlers.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `judgeme`: Judge.me API client.
//! - `models`: Upstream and frontend data models.
//! - `reviews`: Stats aggregation, filtering, and normalization.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod judgeme;
pub mod models;
pub mod reviews;
