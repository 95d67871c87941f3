//! Use-case services over the repositories.
//!
//! # Responsibility
//! - Compose repository calls into transactional logbook operations.
//! - Keep current-state settings consistent with trip data.

pub mod settings_service;
pub mod trip_service;
