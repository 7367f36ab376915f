// SPDX-License-Identifier: GPL-2.0

//! Context-field access synthesis.
//!
//! A context access projects a wanted register class onto a context struct
//! field (`data` for `PTR_TO_PACKET`, `sk` for `PTR_TO_SOCK_COMMON`, ...),
//! declares a local bound to that field and caches the binding so repeated
//! accesses to the same field reuse one variable. Packet projections also
//! allocate the bounds variable the emitted guard compares against.

use rand::Rng;

use crate::core::types::{ArgType, RegType};
use crate::gen::reg_types::round_up;
use crate::gen::Generator;
use crate::state::{BpfArg, BpfCall, BpfProgState};

const CTX_PTR_TYPE: &str = "void *";
const SOCK_COMMON_PTR_TYPE: &str = "struct sock_common*";

/// Bytes the callee will access through a packet-projected argument:
/// the sibling map's key/value size rounded up to 8, a random size for raw
/// memory (recorded as the call's scratch size), or the int/long width.
fn pkt_access_size(
    s: &BpfProgState,
    r: &mut impl Rng,
    call: &mut BpfCall,
    arg: usize,
) -> usize {
    match call.helper.args[arg] {
        ArgType::PtrToMapKey => call
            .arg_map
            .and_then(|m| s.maps[m].key)
            .map(|k| round_up(s.structs[k].size, 8))
            .unwrap_or(0),
        ArgType::PtrToMapValue | ArgType::PtrToMapValueOrNull | ArgType::PtrToUninitMapValue => {
            call.arg_map
                .and_then(|m| s.maps[m].val)
                .map(|v| round_up(s.structs[v].size, 8))
                .unwrap_or(0)
        }
        ArgType::PtrToMem | ArgType::PtrToMemOrNull | ArgType::PtrToUninitMem => {
            let size = r.random_range(0..128);
            call.stack_var_size = size;
            size
        }
        ArgType::PtrToInt => 4,
        ArgType::PtrToLong => 8,
        _ => 0,
    }
}

impl Generator<'_> {
    /// Bind a context variable for `field`, reusing a cached binding.
    fn ctx_var(s: &mut BpfProgState, field: &str, c_type: &str) -> String {
        if let Some(v) = s.ctx_vars.get(field) {
            return v.clone();
        }
        let v = s.fresh_var();
        s.ctx_vars.insert(field.to_string(), v.clone());
        s.ctx_types.insert(field.to_string(), c_type.to_string());
        v
    }

    /// Try to satisfy slot `arg` of `call` with a context-field access.
    pub(crate) fn gen_ctx_access(
        &self,
        s: &mut BpfProgState,
        r: &mut impl Rng,
        call: &mut BpfCall,
        arg: usize,
    ) -> Option<BpfArg> {
        let (compat, _) = self.compatible_reg_types(s, call, arg);
        if compat.is_empty() {
            return None;
        }

        for _ in 0..super::DIRECT_GEN_ATTEMPTS {
            let rt = compat[r.random_range(0..compat.len())];
            let Some(access) = self.cat.ctx_access_for(&s.prog_type_name) else {
                return None;
            };
            let Some(field) = access.fields_for(rt).and_then(|f| f.first().cloned()) else {
                continue;
            };
            let policy = access.policy(&field);
            if !policy.can_read && !policy.can_write {
                continue;
            }

            let c_type = if rt == RegType::PtrToSockCommon {
                SOCK_COMMON_PTR_TYPE
            } else {
                CTX_PTR_TYPE
            };

            let mut a = BpfArg::for_slot(&call.helper, arg);
            a.name = Self::ctx_var(s, &field, c_type);

            if rt == RegType::PtrToPacketMeta {
                Self::ctx_var(s, "data", CTX_PTR_TYPE);
                a.is_pkt_meta_access = true;
                a.access_size = pkt_access_size(s, r, call, arg);
            }
            if rt == RegType::PtrToPacket {
                Self::ctx_var(s, "data_end", CTX_PTR_TYPE);
                a.is_pkt_access = true;
                a.access_size = pkt_access_size(s, r, call, arg);
            }
            log::trace!("ctx access {} via {}", field, rt.name());
            return Some(a);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::core::types::CallGenHint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(prog: &str) -> (Catalog, BpfProgState) {
        let cat = Catalog::linux();
        let pt = cat.prog_type(prog).unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        (cat, s)
    }

    #[test]
    fn test_ctx_binding_is_stable() {
        let (cat, mut s) = setup("sched_cls");
        let g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(13);
        let h = cat.helper("BPF_FUNC_skb_load_bytes").unwrap().clone();

        let mut names = Vec::new();
        for _ in 0..20 {
            let mut call = BpfCall::new(h.clone(), CallGenHint::default());
            if let Some(a) = g.gen_ctx_access(&mut s, &mut r, &mut call, 2) {
                names.push(a.name);
            }
        }
        assert!(!names.is_empty());
        // Same field always resolves to the same variable.
        for field in s.ctx_vars.keys() {
            assert!(s.ctx_types.contains_key(field));
        }
        let data_var = s.ctx_vars.get("data");
        for n in &names {
            if Some(n) == data_var {
                // Packet access allocated the bounds variable too.
                assert!(s.ctx_vars.contains_key("data_end"));
            }
        }
    }

    #[test]
    fn test_pkt_access_sets_flags_and_size() {
        let (cat, mut s) = setup("sched_cls");
        let g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(99);
        let h = cat.helper("BPF_FUNC_skb_load_bytes").unwrap().clone();

        for _ in 0..100 {
            let mut call = BpfCall::new(h.clone(), CallGenHint::default());
            if let Some(a) = g.gen_ctx_access(&mut s, &mut r, &mut call, 2) {
                if a.is_pkt_access {
                    assert!(a.access_size < 128);
                    assert_eq!(call.stack_var_size, a.access_size);
                    assert!(s.ctx_vars.contains_key("data_end"));
                    return;
                }
            }
        }
        panic!("packet access never generated");
    }

    #[test]
    fn test_no_ctx_table_fails() {
        let cat = Catalog::linux();
        let mut s = BpfProgState {
            prog_type_name: "bogus".to_string(),
            prog_type_enum: "BPF_PROG_TYPE_SCHED_CLS".to_string(),
            ..BpfProgState::default()
        };
        let g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(1);
        let h = cat.helper("BPF_FUNC_skb_load_bytes").unwrap().clone();
        let mut call = BpfCall::new(h, CallGenHint::default());
        assert!(g.gen_ctx_access(&mut s, &mut r, &mut call, 2).is_none());
    }
}
