//! # BPF Program Fuzzer
//!
//! A constraint-aware generator of verifier-plausible BPF programs.
//!
//! Given a catalogue of helpers, program types, context structs and map
//! types, the generator synthesizes a [`state::BpfProgState`]: maps, record
//! layouts, and a sequence of helper calls whose argument types, return
//! types, map types and context accesses are mutually consistent with a
//! model of the kernel verifier's rules. The state is consumed by an
//! external C emitter and compiler.
//!
//! ## Quick Start
//!
//! ```rust
//! use bpf_fuzzer::catalog::Catalog;
//! use bpf_fuzzer::gen::gen_bpf_prog;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let cat = Catalog::linux();
//! let mut rng = StdRng::seed_from_u64(42);
//! match gen_bpf_prog(&cat, &mut rng) {
//!     Ok(prog) => println!("{} calls for {}", prog.calls.len(), prog.sec_str),
//!     Err(e) => println!("generation failed: {e}"),
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`core`]: type tags and error definitions
//! - [`catalog`]: immutable helper/program-type/map-type tables
//! - [`state`]: the generated program state and its persistence
//! - [`gen`]: the driver, argument resolver, map manager and struct builder
//! - [`repair`]: reference and spin-lock balancing passes
//!
//! ## What it does not do
//!
//! The generator does not reimplement the verifier and does not track
//! register ranges or pointer arithmetic. A generated program is plausible
//! along the axes the model covers; the kernel has the last word.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod core;
pub mod gen;
pub mod repair;
pub mod state;

/// Commonly used types and entry points.
pub mod prelude {
    pub use crate::catalog::Catalog;
    pub use crate::core::error::{GenError, Result};
    pub use crate::core::types::{ArgType, MapType, RegType, RetType};
    pub use crate::gen::{gen_bpf_prog, gen_bpf_seed_prog, mut_bpf_prog, mut_bpf_seed_prog};
    pub use crate::state::persist::restore_seed_prog;
    pub use crate::state::BpfProgState;
}

pub use crate::core::error::{GenError, Result};
