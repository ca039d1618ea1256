// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filewerk: core job types, error definitions, and the transform adapter
// contract shared across all crates.

pub mod adapter;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod integrity;
pub mod lazy;
pub mod projection;
pub mod types;

pub use adapter::{AdapterMode, ProgressReporter, TransformAdapter, TransformContext};
pub use config::{AppConfig, FailurePolicy, TimeoutClass};
pub use error::{ErrorKind, FilewerkError, JobError};
pub use lazy::SharedResource;
pub use projection::{ViewState, project};
pub use types::*;
