//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports` and never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

use std::time::Duration;

/// Extra time granted to a connector to honour its own timeout before the
/// outer deadline fires.
pub const CONNECT_GRACE: Duration = Duration::from_secs(2);

pub mod config_service;
pub mod plan;
pub mod provision;
