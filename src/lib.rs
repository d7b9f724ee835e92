// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler toolchain and execution engine for the bitforge 16-bit platform.

pub mod assembler;
pub mod core;
pub mod vm;
