//! Campus Match - study-buddy matching service for Campus Connect
//!
//! This library provides the ranking engine that surfaces study partners
//! for a student, plus the stores, cache and catalog import around it.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::Matcher;
pub use models::{MatchResult, MatchTier, RankingPolicy, UserId, UserProfile};
pub use services::{CourseCatalog, InMemoryStore, ProfileStore};
