//! # Pitchbot
//!
//! A Telegram bot that turns a short client brief into a branded sales
//! proposal: it scrapes the client's branding, expands the brief into a
//! priced scope of work with a generative model, renders an architecture
//! diagram and publishes the compiled HTML on a small dashboard.

pub mod bot;
pub mod branding;
pub mod brief_expander;
pub mod circuit_breaker;
pub mod compiler;
pub mod config;
pub mod dashboard;
pub mod dialogue;
pub mod diagram;
pub mod document;
pub mod llm_client;
pub mod localization;
pub mod net_guard;
pub mod pipeline;
pub mod pitch_errors;
pub mod proposal_model;
pub mod storage;
