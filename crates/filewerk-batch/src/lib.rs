// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filewerk Batch: turns a set of user files into jobs, runs a transform
// adapter over them with bounded concurrency, and hands the results to a
// delivery sink.

pub mod delivery;
pub mod intake;
pub mod runner;

pub use delivery::{
    Deliverer, DeliveryFailure, DeliveryReceipt, DeliveryReport, DeliverySink, DirectorySink,
};
pub use intake::{AcceptList, FileIntake, IntakeReport, Rejection};
pub use runner::{BatchEvent, BatchReport, BatchRunner, RunnerConfig};
