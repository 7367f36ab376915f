// SPDX-License-Identifier: GPL-2.0

//! Core types and error definitions for the BPF program generator.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
