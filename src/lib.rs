//! Client library for configuring a project's RAG databases, embedding and retrieval
//! strategies, local embedding models and parser settings against the designer API.

pub mod api;
pub mod catalog;
pub mod config;
pub mod crypto;
pub mod database;
pub mod download;
pub mod error;
pub mod legacy;
pub mod notice;
pub mod parser_settings;
pub mod project;
pub mod strategy;
pub mod validation;
