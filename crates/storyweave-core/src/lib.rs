//! Storyweave Core — shared coordination types.
//!
//! This crate defines the entity, event and payload model shared by the
//! event bus, the dependency graph and the coordination hub, together with
//! the clock, configuration, error and state-store abstractions. It contains
//! no infrastructure code.

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod payload;
pub mod store;
