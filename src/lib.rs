//! Atrium - content backend for an institutional website
//!
//! Contact inquiries, media, partners, settings and testimonials served as a
//! JSON API. Row ids are never exposed directly; see [`ids`].

pub mod api;
pub mod config;
pub mod db;
pub mod ids;
pub mod models;
pub mod services;
