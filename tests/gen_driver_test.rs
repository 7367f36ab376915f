// SPDX-License-Identifier: GPL-2.0
//! Driver-level properties of generated programs.

use std::collections::{BTreeMap, BTreeSet};

use bpf_fuzzer::catalog::compat::{func_compat_maps, map_compat_funcs, map_func_compatible};
use bpf_fuzzer::catalog::Catalog;
use bpf_fuzzer::core::types::{ArgHints, ArgType, FieldType};
use bpf_fuzzer::gen::gen_bpf_prog;
use bpf_fuzzer::state::{BpfCall, BpfProgState};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn generate_corpus(n: usize) -> Vec<BpfProgState> {
    let cat = Catalog::linux();
    let mut corpus = Vec::new();
    for seed in 0..n as u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        if let Ok(s) = gen_bpf_prog(&cat, &mut rng) {
            corpus.push(s);
        }
    }
    assert!(corpus.len() > n / 2, "only {} of {n} seeds generated", corpus.len());
    corpus
}

#[test]
fn test_map_helper_consistency() {
    let cat = Catalog::linux();
    for s in generate_corpus(40) {
        let pt = cat.prog_type(&s.prog_type_name).unwrap();
        for call in &s.calls {
            assert!(
                pt.get_helper(&call.helper.enum_name).is_some(),
                "{} not allowed for {}",
                call.helper.enum_name,
                pt.name
            );
            if let Some(m) = call.arg_map {
                let map = &s.maps[m];
                assert!(
                    map_func_compatible(map.map_type, &call.helper.enum_name),
                    "{} bound to incompatible {}",
                    call.helper.enum_name,
                    map.map_type.c_name()
                );
                if let Some(maps) = func_compat_maps(&call.helper.enum_name) {
                    assert!(maps.contains(&map.map_type));
                }
                if let Some(funcs) = map_compat_funcs(map.map_type) {
                    assert!(funcs.contains(&call.helper.enum_name.as_str()));
                }
            }
            // A const-map-ptr argument names the bound map.
            for (i, arg) in call.args.iter().enumerate() {
                if call.helper.args[i] == ArgType::ConstMapPtr {
                    let m = call.arg_map.expect("const map ptr without bound map");
                    assert_eq!(arg.name, format!("&{}", s.maps[m].name));
                }
            }
        }
    }
}

#[test]
fn test_struct_size_law() {
    for s in generate_corpus(40) {
        for sd in &s.structs {
            let sum: usize = sd.fields.iter().map(|f| f.size()).sum();
            assert_eq!(sum, sd.size, "size law violated for {}", sd.name);
            if sd.hints.contains(ArgHints::GEN_SPINLOCK) {
                let i = sd.find_field(FieldType::SpinLock).expect("hinted lock missing");
                assert!(sd.offset_of(i) + 4 <= sd.size);
            }
            if sd.hints.contains(ArgHints::GEN_TIMER) {
                let i = sd.find_field(FieldType::Timer).expect("hinted timer missing");
                assert!(sd.offset_of(i) + 16 <= sd.size);
            }
            if sd.hints.contains(ArgHints::GEN_CONST_STR) {
                let i = sd.find_field(FieldType::CharArr8).expect("hinted string missing");
                assert!(sd.offset_of(i) + 8 <= sd.size);
            }
        }
    }
}

#[test]
fn test_reference_balance() {
    for s in generate_corpus(40) {
        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        let mut counts: BTreeMap<String, i32> = BTreeMap::new();
        let mut visit = |call: &BpfCall| {
            if call.ref_acquire_kind(&s.maps).is_some() {
                *counts.entry(call.ret.clone()).or_default() += 1;
                aliases.insert(call.ret.clone(), call.ret.clone());
            }
            if call.ref_propagate_kind().is_some() {
                if let Some(a0) = call.args.first() {
                    if let Some(root) = aliases.get(&a0.name).cloned() {
                        aliases.insert(call.ret.clone(), root);
                    }
                }
            }
            if call.ref_release_kind().is_some() {
                if let Some(a0) = call.args.first() {
                    let root = aliases.get(&a0.name).cloned().unwrap_or_else(|| a0.name.clone());
                    *counts.entry(root).or_default() -= 1;
                }
            }
        };
        for call in &s.calls {
            visit(call);
            for pc in &call.post_calls {
                visit(pc);
            }
        }
        for (var, count) in counts {
            assert_eq!(count, 0, "reference {var} unbalanced in {}", s.prog_type_name);
        }
    }
}

#[test]
fn test_spin_lock_balance() {
    for s in generate_corpus(40) {
        let mut held = String::new();
        for (i, call) in s.calls.iter().enumerate() {
            match call.helper.enum_name.as_str() {
                "BPF_FUNC_spin_lock" => {
                    assert!(held.is_empty(), "nested lock at call {i}");
                    held = call.args[0].name.clone();
                    let next = s.calls.get(i + 1).expect("lock at end of sequence");
                    assert_eq!(next.helper.enum_name, "BPF_FUNC_spin_unlock");
                    assert_eq!(next.args[0].name, held);
                }
                "BPF_FUNC_spin_unlock" => {
                    assert_eq!(held, call.args[0].name, "unlock without lock at call {i}");
                    held.clear();
                }
                _ => {}
            }
        }
        assert!(held.is_empty());
    }
}

#[test]
fn test_ctx_var_uniqueness() {
    for s in generate_corpus(40) {
        // One variable per context field, one field per variable.
        let vars: BTreeSet<&String> = s.ctx_vars.values().collect();
        assert_eq!(vars.len(), s.ctx_vars.len());
        for field in s.ctx_vars.keys() {
            assert!(s.ctx_types.contains_key(field), "untyped ctx var for {field}");
        }
    }
}

#[test]
fn test_var_names_within_counter() {
    for s in generate_corpus(20) {
        for call in &s.calls {
            if !call.ret.is_empty() {
                let n: u32 = call.ret.trim_start_matches('v').parse().unwrap();
                assert!(n < s.var_id);
            }
        }
        for v in s.ctx_vars.values() {
            let n: u32 = v.trim_start_matches('v').parse().unwrap();
            assert!(n < s.var_id);
        }
    }
}

#[test]
fn test_generation_terminates() {
    // Any seed either converges or reports non-convergence; nothing hangs
    // or panics.
    let cat = Catalog::linux();
    for seed in 1000..1040u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let _ = gen_bpf_prog(&cat, &mut rng);
    }
}
