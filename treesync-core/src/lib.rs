#![doc = "treesync-core: core logic library for treesync."]

//! This crate holds the folder-tree download engine and everything it needs:
//! the tree data model, category routing, outcome reporting and message intake.
//! Queue, object-store and notification clients live outside this crate and
//! plug in through the traits in [`contract`].
//!
//! # Usage
//! Build a [`download::TreeDownloader`] from a [`category::CategoryMapping`] and an
//! [`contract::ObjectFetcher`], wrap it in an [`intake::MessageHandler`] and feed it messages.

pub mod category;
pub mod contract;
pub mod download;
pub mod error;
pub mod intake;
pub mod outcome;
pub mod tree;
