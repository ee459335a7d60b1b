#![doc = "issue-blog-core: core logic library for issue-blog."]

//! This crate holds the data model, the collaborator contracts and every
//! pipeline step: emitting content, building the site, detecting changes in
//! the build output and publishing it.
//!
//! # Usage
//! Construct a [`config::PipelineConfig`], an [`contract::IssueSource`] and a
//! [`contract::CommandRunner`], then call [`pipeline::run_pipeline`].

pub mod build;
pub mod command;
pub mod config;
pub mod contract;
pub mod detect;
pub mod emit;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod snapshot;
