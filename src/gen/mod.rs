// SPDX-License-Identifier: GPL-2.0

//! The program generation driver.
//!
//! [`Generator`] owns the catalogue reference and the recursion budget; it
//! is the context every generation step runs in (there is no global
//! state). The driver picks a program type and a root helper at random,
//! generates the call tree, and runs the repair passes. Generation that
//! fails to converge is retried up to a fixed budget.

pub mod call;
pub mod ctx_access;
pub mod maps;
pub mod reg_types;
pub mod struct_builder;

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::catalog::Catalog;
use crate::core::error::{GenError, Result};
use crate::core::types::CallGenHint;
use crate::repair::{fix_ref, fix_spin_lock};
use crate::state::persist::seed_base_path;
use crate::state::BpfProgState;

/// Whole-program retry budget.
pub const GEN_PROG_ATTEMPTS: usize = 20;
/// Recursion (and failed-attempt) budget per program.
pub const MAX_GEN_DEPTH: u32 = 100;
/// Retries per argument slot.
pub const ARG_GEN_ATTEMPTS: usize = 50;
/// Register classes tried per direct synthesis.
pub const DIRECT_GEN_ATTEMPTS: usize = 5;
/// Mutation retry budget.
pub const MUT_PROG_ATTEMPTS: usize = 20;

/// Generation context: the catalogue plus the recursion budget.
pub struct Generator<'a> {
    pub(crate) cat: &'a Catalog,
    pub(crate) depth: u32,
}

impl<'a> Generator<'a> {
    /// A fresh generator over `cat`.
    pub fn new(cat: &'a Catalog) -> Self {
        Generator { cat, depth: 0 }
    }

    /// One generation attempt: random program type, random root helper.
    fn try_gen_prog(&mut self, r: &mut impl Rng) -> Option<BpfProgState> {
        let names: Vec<&String> = self.cat.prog_types.keys().collect();
        if names.is_empty() {
            return None;
        }
        let pt = &self.cat.prog_types[names[r.random_range(0..names.len())]];
        if pt.helpers.is_empty() {
            return None;
        }
        let helper = pt.helpers[r.random_range(0..pt.helpers.len())].clone();

        let mut s = BpfProgState::new(pt);
        s.ret_val = gen_rand_return_val(r, &pt.enum_name);
        if !pt.sec_defs.is_empty() {
            s.sec = pt.sec_defs[r.random_range(0..pt.sec_defs.len())].clone();
        }
        s.sec_str = match s.sec.name_gen {
            Some(g) => format!("{}{}", s.sec.sec, g.generate(r)),
            None => s.sec.sec.clone(),
        };

        log::debug!("gen prog {} {}", pt.name, helper.enum_name);
        self.depth = 0;
        self.gen_helper_call(&mut s, r, &helper, CallGenHint::default(), false)?;
        Some(s)
    }

    /// Generate one program, retrying up to the budget, then balance
    /// references and spin locks.
    pub fn gen_prog(&mut self, r: &mut impl Rng) -> Result<BpfProgState> {
        for _ in 0..GEN_PROG_ATTEMPTS {
            if let Some(mut s) = self.try_gen_prog(r) {
                fix_ref(self.cat, &mut s, r);
                fix_spin_lock(self.cat, &mut s);
                return Ok(s);
            }
        }
        Err(GenError::NotConverged(GEN_PROG_ATTEMPTS))
    }

    /// Re-resolve one random argument of one random call.
    pub fn mutate(&mut self, s: &mut BpfProgState, r: &mut impl Rng) -> bool {
        let candidates: Vec<usize> = s
            .calls
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.args.is_empty())
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return false;
        }
        let ci = candidates[r.random_range(0..candidates.len())];
        let ai = r.random_range(0..s.calls[ci].args.len());

        self.depth = 0;
        let mut call = s.calls[ci].clone();
        if !self.gen_call_arg(s, r, &mut call, ai) {
            return false;
        }
        s.calls[ci] = call;
        true
    }
}

/// Program return value, constrained by what the attach point verifies.
pub fn gen_rand_return_val(r: &mut impl Rng, prog_enum: &str) -> i64 {
    match prog_enum {
        "BPF_PROG_TYPE_CGROUP_SOCK_ADDR" => 1,
        "BPF_PROG_TYPE_CGROUP_SKB"
        | "BPF_PROG_TYPE_CGROUP_SOCK"
        | "BPF_PROG_TYPE_SOCK_OPS"
        | "BPF_PROG_TYPE_CGROUP_DEVICE"
        | "BPF_PROG_TYPE_CGROUP_SYSCTL"
        | "BPF_PROG_TYPE_CGROUP_SOCKOPT"
        | "BPF_PROG_TYPE_SK_LOOKUP" => r.random_range(0..2),
        "BPF_PROG_TYPE_RAW_TRACEPOINT" | "BPF_PROG_TYPE_TRACING" => 0,
        _ => r.random_range(0..1i64 << 32),
    }
}

/// Generate one balanced program state.
pub fn gen_bpf_prog(cat: &Catalog, r: &mut impl Rng) -> Result<BpfProgState> {
    Generator::new(cat).gen_prog(r)
}

/// Generate a seed program and persist it under `dir`. Returns the state
/// and the path of the state blob; compiling the C rendition is the
/// caller's business.
pub fn gen_bpf_seed_prog(
    cat: &Catalog,
    r: &mut impl Rng,
    dir: &Path,
) -> Result<(BpfProgState, PathBuf)> {
    let mut s = gen_bpf_prog(cat, r)?;
    let base = seed_base_path(dir, &s.prog_type_name);
    s.path = base.with_extension("o").display().to_string();
    let blob = base.with_extension("json");
    s.write_state(&blob)?;
    Ok((s, blob))
}

/// Mutate one argument of one call in `s`. Returns whether a mutation was
/// applied.
pub fn mut_bpf_prog(cat: &Catalog, r: &mut impl Rng, s: &mut BpfProgState) -> bool {
    Generator::new(cat).mutate(s, r)
}

/// Seed-level mutation: retry the single-argument mutation up to the
/// budget, then re-run both balancers (a re-resolved release argument can
/// orphan an acquire).
pub fn mut_bpf_seed_prog(cat: &Catalog, r: &mut impl Rng, s: &mut BpfProgState) -> Result<()> {
    for _ in 0..MUT_PROG_ATTEMPTS {
        if mut_bpf_prog(cat, r, s) {
            fix_ref(cat, s, r);
            fix_spin_lock(cat, s);
            return Ok(());
        }
    }
    Err(GenError::NotConverged(MUT_PROG_ATTEMPTS))
}
