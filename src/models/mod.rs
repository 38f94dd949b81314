//! Core data models for the Study Share service.
//!
//! These entities represent uploaded resources (papers and notes), the
//! stored payload metadata, and the gamification profile rows. They map
//! cleanly to database tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod object;
pub mod profile;
pub mod record;
