#![doc = "gpm-core: change detection, generation and publishing of gRPC proto stubs."]

//! This crate contains all the logic behind `gpm generate`: walking a proto
//! project, deciding which directories changed since their last published
//! version, regenerating the stubs and publishing them with a new tag.
//! Command-line parsing and configuration loading live in the `gpm` crate.
//!
//! # Usage
//! Build a [`config::ServiceConfig`], hand it to [`orchestrator::Orchestrator`]
//! and call `run` with the project root.

pub mod command;
pub mod config;
pub mod error;
pub mod files;
pub mod generator;
pub mod orchestrator;
pub mod repository;
pub mod version;

pub use error::{GpmError, Result};
