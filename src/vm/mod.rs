// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Execution engine for linked images.

pub mod device;
pub mod system;

pub use device::{Console, OutputDevice};
pub use system::{CycleResult, System, VmError};
