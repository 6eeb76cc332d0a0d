//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the client and the server. These types travel over the Mutation API, the
//! read path and the broadcast channel as JSON.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used
//! in both server and client code. Everything here is plain data plus
//! validation; no I/O happens in this module.

/// Posts, users, comments and follow shapes
pub mod entity;

/// Broadcast events
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use entity::{
    Comment, EntityKind, FollowList, FollowOutcome, FollowStats, NewPost, NewUser, Post, PostId,
    PostPatch, User, UserId, UserRef,
};
pub use error::{ApiErrorBody, ApiErrorKind, SharedError};
pub use event::{BroadcastEvent, DeletedEntity, EntityPayload, EventType, RealtimeEvent, SessionId};
