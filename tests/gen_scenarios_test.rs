// SPDX-License-Identifier: GPL-2.0
//! Seed scenarios against reduced catalogues.

use bpf_fuzzer::catalog::{Catalog, CtxAccess, ProgTypeDef, SecDef};
use bpf_fuzzer::core::error::GenError;
use bpf_fuzzer::core::types::{
    ArgHints, ArgType, CallGenHint, FieldType, MapType, RegType, RetType,
};
use bpf_fuzzer::gen::struct_builder::generate_struct;
use bpf_fuzzer::gen::{gen_bpf_prog, Generator};
use bpf_fuzzer::repair::{fix_ref, fix_spin_lock};
use bpf_fuzzer::state::BpfProgState;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn reduced_catalog(
    helpers: &[&str],
    map_types: &[MapType],
    prog_name: &str,
    prog_enum: &str,
) -> Catalog {
    let linux = Catalog::linux();
    let mut cat = Catalog::new();
    for h in helpers {
        cat.add_helper(linux.helper(h).unwrap().clone());
    }
    cat.map_types = map_types
        .iter()
        .map(|mt| linux.map_type_def(*mt).unwrap().clone())
        .collect();
    let pt = ProgTypeDef::new(1, prog_name, prog_enum, "struct __sk_buff", "struct sk_buff")
        .sec(SecDef::plain("socket"));
    cat.add_prog_type(pt, helpers).unwrap();
    cat.set_ctx_access(prog_name, CtxAccess::read_all());
    cat
}

fn gen_with_any_seed(cat: &Catalog) -> BpfProgState {
    for seed in 0..10u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        if let Ok(s) = gen_bpf_prog(cat, &mut rng) {
            return s;
        }
    }
    panic!("no seed generated a program");
}

#[test]
fn test_lookup_only_catalog_binds_hash_map() {
    // A catalogue with one helper and one map type: the driver must emit at
    // least one lookup bound to a hash map.
    let cat = reduced_catalog(
        &["BPF_FUNC_map_lookup_elem"],
        &[MapType::Hash],
        "socket_filter",
        "BPF_PROG_TYPE_SOCKET_FILTER",
    );
    let s = gen_with_any_seed(&cat);

    assert!(!s.calls.is_empty());
    assert!(!s.maps.is_empty());
    assert!(s.maps.iter().all(|m| m.map_type == MapType::Hash));

    // The root call is the last of the sequence; producers precede it.
    let root = s.calls.last().unwrap();
    assert_eq!(root.helper.enum_name, "BPF_FUNC_map_lookup_elem");
    let m = root.arg_map.expect("lookup must bind a map");
    assert_eq!(s.maps[m].map_type, MapType::Hash);
    assert_eq!(root.args[0].name, format!("&{}", s.maps[m].name));
}

#[test]
fn test_spin_lock_materializes_lock_value_and_pairs() {
    let cat = reduced_catalog(
        &["BPF_FUNC_spin_lock", "BPF_FUNC_spin_unlock", "BPF_FUNC_map_lookup_elem"],
        &[MapType::Hash, MapType::Array],
        "sched_cls",
        "BPF_PROG_TYPE_SCHED_CLS",
    );
    let pt = cat.prog_type("sched_cls").unwrap();
    let lock = cat.helper("BPF_FUNC_spin_lock").unwrap().clone();

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut g = Generator::new(&cat);
        let Some(idx) = g.gen_helper_call(&mut s, &mut rng, &lock, CallGenHint::default(), false)
        else {
            continue;
        };

        // The lock argument projects a spin-lock member of a map value.
        let arg0 = s.calls[idx].args[0].name.clone();
        assert!(arg0.starts_with('&') && arg0.contains("->e"), "unexpected arg {arg0}");
        let locked_val = s
            .maps
            .iter()
            .filter_map(|m| m.val)
            .any(|v| s.structs[v].has_field(FieldType::SpinLock));
        assert!(locked_val, "no map value carries a spin lock");

        fix_spin_lock(&cat, &mut s);
        let pos = s
            .calls
            .iter()
            .position(|c| c.helper.enum_name == "BPF_FUNC_spin_lock")
            .unwrap();
        let next = &s.calls[pos + 1];
        assert_eq!(next.helper.enum_name, "BPF_FUNC_spin_unlock");
        assert_eq!(next.args[0].name, s.calls[pos].args[0].name);
        return;
    }
    panic!("spin_lock never generated");
}

#[test]
fn test_socket_lookup_without_release_never_converges() {
    let cat = reduced_catalog(
        &["BPF_FUNC_sk_lookup_tcp"],
        &[MapType::Hash],
        "socket_filter",
        "BPF_PROG_TYPE_SOCKET_FILTER",
    );
    let mut rng = StdRng::seed_from_u64(0);
    let err = gen_bpf_prog(&cat, &mut rng).unwrap_err();
    assert!(matches!(err, GenError::NotConverged(_)));
}

#[test]
fn test_socket_lookup_with_release_balances() {
    let cat = reduced_catalog(
        &["BPF_FUNC_sk_lookup_tcp", "BPF_FUNC_sk_release", "BPF_FUNC_ktime_get_ns"],
        &[MapType::Hash],
        "sched_cls",
        "BPF_PROG_TYPE_SCHED_CLS",
    );
    for seed in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let Ok(s) = gen_bpf_prog(&cat, &mut rng) else {
            continue;
        };
        let Some(acquire) = s
            .calls
            .iter()
            .find(|c| c.helper.enum_name == "BPF_FUNC_sk_lookup_tcp")
        else {
            continue;
        };
        // Released either in line or as a post-call of the acquire.
        let released = s
            .calls
            .iter()
            .chain(s.calls.iter().flat_map(|c| c.post_calls.iter()))
            .any(|c| c.helper.enum_name == "BPF_FUNC_sk_release");
        assert!(released, "acquire {} never released", acquire.ret);
        return;
    }
    panic!("no program with a socket lookup was generated");
}

#[test]
fn test_ringbuf_reserve_creates_ringbuf_and_release() {
    let cat = reduced_catalog(
        &["BPF_FUNC_ringbuf_reserve", "BPF_FUNC_ringbuf_submit", "BPF_FUNC_ringbuf_discard"],
        &[MapType::Ringbuf],
        "sched_cls",
        "BPF_PROG_TYPE_SCHED_CLS",
    );
    let pt = cat.prog_type("sched_cls").unwrap();
    let reserve = cat.helper("BPF_FUNC_ringbuf_reserve").unwrap().clone();

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut g = Generator::new(&cat);
        let Some(idx) = g.gen_helper_call(&mut s, &mut rng, &reserve, CallGenHint::default(), false)
        else {
            continue;
        };
        let reserve_ret = s.calls[idx].ret.clone();
        let m = s.calls[idx].arg_map.expect("reserve must bind its ring buffer");
        assert_eq!(s.maps[m].map_type, MapType::Ringbuf);
        let pages = s.maps[m].max_entries / 4096;
        assert_eq!(s.maps[m].max_entries % 4096, 0);
        assert!(pages > 0 && pages & (pages - 1) == 0);

        fix_ref(&cat, &mut s, &mut rng);
        let release = s
            .calls
            .iter()
            .find(|c| {
                matches!(
                    c.helper.enum_name.as_str(),
                    "BPF_FUNC_ringbuf_submit" | "BPF_FUNC_ringbuf_discard"
                )
            })
            .expect("reserve left unreleased");
        assert_eq!(release.args[0].name, reserve_ret);
        return;
    }
    panic!("ringbuf_reserve never generated");
}

#[test]
fn test_pkt_classes_respect_read_only_prog_types() {
    // A packet helper with a readable and a writable memory slot.
    let mut cat = Catalog::linux();
    let h = bpf_fuzzer::catalog::HelperDef::new(
        200,
        "BPF_FUNC_pkt_probe",
        RetType::Integer,
        &[ArgType::PtrToMem, ArgType::PtrToUninitMem],
    )
    .pkt();
    cat.add_helper(h.clone());
    for name in ["cgroup_skb", "sched_cls"] {
        let base = cat.prog_type(name).unwrap().clone();
        cat.add_prog_type(base, &["BPF_FUNC_pkt_probe"]).unwrap();
    }

    let call = bpf_fuzzer::state::BpfCall::new(h, CallGenHint::default());

    // Read-only packet pointers: reads may use them, writes may not.
    let ro = BpfProgState::new(cat.prog_type("cgroup_skb").unwrap());
    let g = Generator::new(&cat);
    let (read_regs, _) = g.compatible_reg_types(&ro, &call, 0);
    assert!(read_regs.contains(&RegType::PtrToPacket));
    let (write_regs, _) = g.compatible_reg_types(&ro, &call, 1);
    assert!(!write_regs.contains(&RegType::PtrToPacket));
    assert!(!write_regs.contains(&RegType::PtrToPacketMeta));

    // Read-write packet pointers admit both.
    let rw = BpfProgState::new(cat.prog_type("sched_cls").unwrap());
    let (write_regs, _) = g.compatible_reg_types(&rw, &call, 1);
    assert!(write_regs.contains(&RegType::PtrToPacket));
}

#[test]
fn test_struct_hints_exceeding_pinned_size_fail() {
    // Spin lock (4) + const string (8) cannot fit an exact 8-byte layout.
    let mut rng = StdRng::seed_from_u64(1);
    let mut structs = Vec::new();
    let mut hints = ArgHints::GEN_SPINLOCK | ArgHints::GEN_CONST_STR;
    let res = generate_struct(
        &mut structs,
        &mut rng,
        &bpf_fuzzer::catalog::SizeConstraint::aligned(8, 8, 8),
        &mut hints,
        true,
        0,
    );
    assert!(res.is_none());
    assert!(structs.is_empty());
}
