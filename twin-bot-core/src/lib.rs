#![doc = "twin-bot-core: core pipeline for submitting entries to This Week in Neovim."]

//! This crate contains the logic that does not depend on a concrete transport:
//! ref reconciliation between upstream and a fork, section sequencing from existing pull requests,
//! and the single-file branch/commit/pull request submission.
//!
//! # Usage
//! Implement [`contract::GithubApi`] (or use the GraphQL client of the `twin-bot` crate) and call
//! [`pipeline::submit`].

pub mod config;
pub mod contract;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod sequence;
pub mod submit;
