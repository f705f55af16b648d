//! YumeChain: LLM novel generation
//!
//! Generates Japanese novels from a user-written setting: a plot of named arcs and numbered
//! episodes, then episode bodies with the plot and the previous episode as context. Projects
//! live on disk, can be read through a local web reader and published to Hatena Blog.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod plot;
pub mod prompts;
pub mod provider;
pub mod publish;
pub mod reader;
pub mod store;
pub mod workflow;
