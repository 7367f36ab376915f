// SPDX-License-Identifier: GPL-2.0

//! Reference balancing.
//!
//! Every acquired kernel reference must be released on every path, and
//! every release must have something to release. The pass counts acquires
//! and releases per return variable, following propagation helpers that
//! alias a reference into a new variable, then repairs the imbalance:
//! a release without an acquire gets a matching acquire prepended and its
//! argument rebound; an acquire without a release gets a release attached
//! after it (socket references) or appended to the sequence (ring buffer
//! records).

use std::collections::BTreeMap;

use rand::Rng;

use crate::catalog::Catalog;
use crate::core::types::{CallGenHint, MapId};
use crate::gen::Generator;
use crate::state::{BpfArg, BpfCall, BpfProgState, RefKind};

struct ObjRef {
    /// The acquiring return variable and every alias propagated from it.
    vars: Vec<String>,
    /// Map involved in the acquire, if any.
    obj_map: Option<MapId>,
    kind: RefKind,
    /// Acquires minus releases.
    count: i32,
    /// Index of the first call recorded for this reference.
    first_call: usize,
}

fn acquire_enums(kind: RefKind) -> &'static [&'static str] {
    match kind {
        RefKind::Socket => &[
            "BPF_FUNC_sk_lookup_tcp",
            "BPF_FUNC_sk_lookup_udp",
            "BPF_FUNC_skc_lookup_tcp",
            "BPF_FUNC_map_lookup_elem",
        ],
        RefKind::Ringbuf => &["BPF_FUNC_ringbuf_reserve"],
    }
}

fn release_enums(kind: RefKind) -> &'static [&'static str] {
    match kind {
        RefKind::Socket => &["BPF_FUNC_sk_release"],
        RefKind::Ringbuf => &["BPF_FUNC_ringbuf_submit", "BPF_FUNC_ringbuf_discard"],
    }
}

/// Balance acquires and releases in `s`.
pub fn fix_ref(cat: &Catalog, s: &mut BpfProgState, r: &mut impl Rng) {
    let mut refs: Vec<ObjRef> = Vec::new();
    let mut by_var: BTreeMap<String, usize> = BTreeMap::new();

    for i in 0..s.calls.len() {
        let call = &s.calls[i];
        if let Some(kind) = call.ref_acquire_kind(&s.maps) {
            let v = call.ret.clone();
            let ri = *by_var.entry(v.clone()).or_insert_with(|| {
                refs.push(ObjRef {
                    vars: vec![v.clone()],
                    obj_map: call.arg_map,
                    kind,
                    count: 0,
                    first_call: i,
                });
                refs.len() - 1
            });
            refs[ri].count += 1;
            log::debug!("ref({v}:{}) acquired by call #{i} {}", refs[ri].count, call.helper.enum_name);
        }
        if let Some(kind) = call.ref_release_kind() {
            let Some(v) = call.args.first().map(|a| a.name.clone()) else {
                continue;
            };
            let ri = *by_var.entry(v.clone()).or_insert_with(|| {
                refs.push(ObjRef {
                    vars: vec![v.clone()],
                    obj_map: call.arg_map,
                    kind,
                    count: 0,
                    first_call: i,
                });
                refs.len() - 1
            });
            refs[ri].count -= 1;
            log::debug!("ref({v}:{}) released by call #{i} {}", refs[ri].count, call.helper.enum_name);
        }
        if call.ref_propagate_kind().is_some() {
            let Some(v) = call.args.first().map(|a| a.name.clone()) else {
                continue;
            };
            let vp = call.ret.clone();
            if let Some(&ri) = by_var.get(&v) {
                refs[ri].vars.push(vp.clone());
                by_var.insert(vp, ri);
                log::debug!("ref({v}) propagated by call #{i} {}", call.helper.enum_name);
            }
        }
    }

    // Each prepend below shifts previously recorded call indices by one;
    // nested producers only append, which shifts nothing.
    let mut prepended = 0usize;
    for rf in &refs {
        if rf.count < 0 {
            // Release without acquire: synthesize the acquire in front and
            // rebind the release to its return.
            let Ok(pt) = cat.prog_type(&s.prog_type_name) else {
                return;
            };
            let helpers: Vec<_> = pt
                .get_helpers(acquire_enums(rf.kind))
                .into_iter()
                .cloned()
                .collect();
            if helpers.is_empty() {
                log::debug!("ref: no helper can acquire for {}", rf.vars[0]);
                continue;
            }
            let helper = helpers[r.random_range(0..helpers.len())].clone();
            let hint = CallGenHint::with_map(rf.obj_map);
            let mut g = Generator::new(cat);
            if let Some(idx) = g.gen_helper_call(s, r, &helper, hint, true) {
                let new_ret = s.calls[idx].ret.clone();
                let release_idx = rf.first_call + prepended + 1;
                s.calls[release_idx].args[0].name = new_ret;
                prepended += 1;
                log::debug!(
                    "ref: fixed invalid release of {} by adding {}",
                    rf.vars[0],
                    helper.enum_name
                );
            } else {
                log::debug!("ref: failed to acquire a reference for {}", rf.vars[0]);
            }
        }
        if rf.count > 0 {
            // Acquire without release: synthesize the release, bound to a
            // random alias of the reference.
            let Ok(pt) = cat.prog_type(&s.prog_type_name) else {
                return;
            };
            let helpers: Vec<_> = pt
                .get_helpers(release_enums(rf.kind))
                .into_iter()
                .cloned()
                .collect();
            if helpers.is_empty() {
                log::debug!("ref: no helper can release {}", rf.vars[0]);
                continue;
            }
            let helper = helpers[r.random_range(0..helpers.len())].clone();
            let mut call = BpfCall::new(helper.clone(), CallGenHint::with_map(rf.obj_map));
            let mut a0 = BpfArg::for_slot(&helper, 0);
            a0.name = rf.vars[r.random_range(0..rf.vars.len())].clone();
            call.args.push(a0);
            match rf.kind {
                RefKind::Socket => {
                    let acquire_idx = rf.first_call + prepended;
                    s.calls[acquire_idx].post_calls.push(call);
                }
                RefKind::Ringbuf => {
                    call.args.push(BpfArg::constant(&helper, 1, "0"));
                    s.calls.push(call);
                }
            }
            log::debug!(
                "ref: fixed leaking {} by adding {}",
                rf.vars[0],
                helper.enum_name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn balance(s: &BpfProgState) -> BTreeMap<String, i32> {
        // Acquires +1 keyed by return var, releases -1 keyed by arg 0,
        // following post-calls and aliases.
        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        let mut counts: BTreeMap<String, i32> = BTreeMap::new();
        let mut visit = |call: &BpfCall, counts: &mut BTreeMap<String, i32>, aliases: &mut BTreeMap<String, String>| {
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
                    let root = aliases.get(&a0.name).cloned().unwrap_or(a0.name.clone());
                    *counts.entry(root).or_default() -= 1;
                }
            }
        };
        for call in &s.calls {
            visit(call, &mut counts, &mut aliases);
            for pc in &call.post_calls {
                visit(pc, &mut counts, &mut aliases);
            }
        }
        counts
    }

    #[test]
    fn test_orphan_acquire_gets_release() {
        let cat = Catalog::linux();
        let pt = cat.prog_type("sched_cls").unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut r = StdRng::seed_from_u64(8);

        let mut g = Generator::new(&cat);
        let h = cat.helper("BPF_FUNC_sk_lookup_tcp").unwrap().clone();
        g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false)
            .expect("lookup must generate");
        fix_ref(&cat, &mut s, &mut r);

        for (var, count) in balance(&s) {
            assert_eq!(count, 0, "unbalanced reference {var}");
        }
        // The release rides as a post-call of the acquire.
        let acquire = s
            .calls
            .iter()
            .find(|c| c.helper.enum_name == "BPF_FUNC_sk_lookup_tcp")
            .unwrap();
        assert!(acquire
            .post_calls
            .iter()
            .any(|pc| pc.helper.enum_name == "BPF_FUNC_sk_release"));
    }

    #[test]
    fn test_orphan_ringbuf_reserve_gets_submit_or_discard() {
        let cat = Catalog::linux();
        let pt = cat.prog_type("sched_cls").unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut r = StdRng::seed_from_u64(9);

        let mut g = Generator::new(&cat);
        let h = cat.helper("BPF_FUNC_ringbuf_reserve").unwrap().clone();
        let idx = g
            .gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false)
            .expect("reserve must generate");
        let reserve_ret = s.calls[idx].ret.clone();
        fix_ref(&cat, &mut s, &mut r);

        let release = s
            .calls
            .iter()
            .find(|c| {
                matches!(
                    c.helper.enum_name.as_str(),
                    "BPF_FUNC_ringbuf_submit" | "BPF_FUNC_ringbuf_discard"
                )
            })
            .expect("a release must be appended");
        assert_eq!(release.args[0].name, reserve_ret);
        assert_eq!(release.args[1].name, "0");
    }

    #[test]
    fn test_orphan_release_gets_acquire_prepended() {
        // Restrict the acquire pool so the prepended call is a socket
        // lookup rather than a plain map lookup.
        let mut cat = Catalog::linux();
        let pt = crate::catalog::ProgTypeDef::new(
            3,
            "release_heavy",
            "BPF_PROG_TYPE_SCHED_CLS",
            "struct __sk_buff",
            "struct sk_buff",
        )
        .sec(crate::catalog::SecDef::plain("tc"));
        cat.add_prog_type(
            pt,
            &["BPF_FUNC_sk_lookup_tcp", "BPF_FUNC_sk_release", "BPF_FUNC_ktime_get_ns"],
        )
        .unwrap();
        cat.set_ctx_access("release_heavy", crate::catalog::CtxAccess::read_all());
        let pt = cat.prog_type("release_heavy").unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut r = StdRng::seed_from_u64(10);

        // A bare sk_release with a dangling variable.
        let rel = cat.helper("BPF_FUNC_sk_release").unwrap().clone();
        let mut call = BpfCall::new(rel.clone(), CallGenHint::default());
        let mut a0 = BpfArg::for_slot(&rel, 0);
        a0.name = "v0".to_string();
        a0.is_not_null = true;
        call.args.push(a0);
        call.ret = "v1".to_string();
        s.var_id = 2;
        s.calls.push(call);

        fix_ref(&cat, &mut s, &mut r);

        // An acquiring call was prepended and the release rebound to it.
        let first = &s.calls[0];
        assert!(first.ref_acquire_kind(&s.maps).is_some(), "no acquire prepended");
        let release = s
            .calls
            .iter()
            .find(|c| c.helper.enum_name == "BPF_FUNC_sk_release")
            .unwrap();
        assert_eq!(release.args[0].name, first.ret);
    }

    #[test]
    fn test_balanced_sequence_untouched() {
        let cat = Catalog::linux();
        let pt = cat.prog_type("sched_cls").unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut r = StdRng::seed_from_u64(11);

        let mut g = Generator::new(&cat);
        let h = cat.helper("BPF_FUNC_ktime_get_ns").unwrap().clone();
        g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false)
            .unwrap();
        let before = s.calls.len();
        fix_ref(&cat, &mut s, &mut r);
        assert_eq!(s.calls.len(), before);
    }
}
