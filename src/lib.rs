//! Guided perception sessions.
//!
//! A subject records impressions about a hidden image target across a fixed
//! sequence of stages; the notes are then compared against a structured
//! description of the target and turned into a rubric score.
//!
//! The two core pieces are the [`orchestrator`] (the stage state machine) and
//! the [`scoring`] engine. Everything they talk to is a trait in
//! [`providers`] or [`orchestrator::SessionStore`], with concrete adapters in
//! [`db`], [`api`], [`client`] and [`console`].

pub mod api;
pub mod client;
pub mod config;
pub mod console;
pub mod db;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod scoring;
