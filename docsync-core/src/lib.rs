#![doc = "docsync-core: core logic library for docsync."]

//! This crate contains the documentation structure model, the validator, the
//! remote sync orchestrator and the legacy document migrator.
//! It performs no network I/O itself: the remote CMS is reached through the
//! [`contract::RemoteApi`] trait, implemented by the `docsync` crate.
//!
//! # Usage
//! Load a [`schema::StructureSchema`], run [`validate::validate`] against a docs
//! root, then [`synchronise::synchronise`] with any `RemoteApi`.

pub mod contract;
pub mod frontmatter;
pub mod migrate;
pub mod report;
pub mod revision;
pub mod schema;
pub mod synchronise;
pub mod validate;
