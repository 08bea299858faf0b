//! Service layer
//!
//! Workflows that span a repository and an outside collaborator.

mod registration;

pub use registration::{RegisterUser, Registration, RegistrationService};
