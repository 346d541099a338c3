//! Shared utilities for the scenario binaries.

pub mod setup_util;
