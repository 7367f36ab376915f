// SPDX-License-Identifier: GPL-2.0

//! Helper call generation.
//!
//! One call is built argument by argument. Each slot is resolved by a
//! strategy ladder: special-cased constants, a nested helper call producing
//! a compatible register class, a context-field access, then direct
//! synthesis. The recursion into producers draws on a depth budget; a
//! failed attempt keeps its budget spent, which bounds the total work per
//! program.

use rand::Rng;

use crate::catalog::compat::{compatible_reg_types, helper_can_return};
use crate::catalog::HelperDef;
use crate::core::types::{ArgHints, ArgType, CallGenHint, RegType, RetType};
use crate::gen::reg_types::{check_pkt_access, round_up};
use crate::gen::{Generator, ARG_GEN_ATTEMPTS, DIRECT_GEN_ATTEMPTS, MAX_GEN_DEPTH};
use crate::state::{BpfArg, BpfCall, BpfProgState};

/// C type of a call's return variable; empty for void.
fn ret_c_type(s: &BpfProgState, call: &BpfCall) -> String {
    match call.helper.ret {
        RetType::Integer => "uint64_t".to_string(),
        RetType::PtrToMapValue | RetType::PtrToMapValueOrNull => {
            match call.arg_map.and_then(|m| s.maps[m].val) {
                Some(v) => format!("{}*", s.structs[v].name),
                None => "void *".to_string(),
            }
        }
        RetType::PtrToBtfIdOrNull | RetType::PtrToBtfId => {
            format!("{}*", call.helper.ret_btf_id)
        }
        RetType::PtrToAllocMemOrNull | RetType::PtrToMemOrBtfIdOrNull | RetType::PtrToMemOrBtfId => {
            "void *".to_string()
        }
        RetType::PtrToTcpSockOrNull | RetType::PtrToSocketOrNull | RetType::PtrToSockCommonOrNull => {
            "struct bpf_sock*".to_string()
        }
        RetType::Void => String::new(),
    }
}

/// Derive the hint for a nested producer from the consumer's slot: special
/// members for lock/timer/string slots, sock-map kinds for socket slots fed
/// from map values, and the return-access size implied by the consumer's
/// map.
fn derive_hint(
    r: &mut impl Rng,
    producer: &HelperDef,
    consumer: &BpfCall,
    arg: usize,
    s: &BpfProgState,
) -> CallGenHint {
    let mut hint = CallGenHint::default();
    let consumer_arg = consumer.helper.args[arg];

    if matches!(consumer_arg, ArgType::PtrToSockCommon | ArgType::PtrToBtfIdSockCommon)
        && producer.ret == RetType::PtrToMapValueOrNull
    {
        if r.random_ratio(1, 2) {
            hint.arg_hints |= ArgHints::GEN_XDP_SOCK_MAP;
        } else {
            hint.arg_hints |= ArgHints::GEN_SOCK_MAP;
        }
    }
    if matches!(consumer_arg, ArgType::PtrToSocket | ArgType::PtrToSocketOrNull)
        && producer.ret == RetType::PtrToMapValueOrNull
    {
        hint.arg_hints |= ArgHints::GEN_SOCK_MAP;
    }
    match consumer_arg {
        ArgType::PtrToSpinLock => hint.arg_hints |= ArgHints::GEN_SPINLOCK,
        ArgType::PtrToTimer => hint.arg_hints |= ArgHints::GEN_TIMER,
        ArgType::PtrToConstStr => hint.arg_hints |= ArgHints::GEN_CONST_STR,
        _ => {}
    }

    if consumer_arg == ArgType::PtrToMapKey {
        if let Some(k) = consumer.arg_map.and_then(|m| s.maps[m].key) {
            hint.ret_access_size = round_up(s.structs[k].size, 8);
        }
    }
    if matches!(
        consumer_arg,
        ArgType::PtrToMapValue | ArgType::PtrToMapValueOrNull | ArgType::PtrToUninitMapValue
    ) {
        if let Some(v) = consumer.arg_map.and_then(|m| s.maps[m].val) {
            hint.ret_access_size = round_up(s.structs[v].size, 8);
        }
    }
    if matches!(consumer_arg, ArgType::PtrToUninitMapValue | ArgType::PtrToUninitMem) {
        hint.ret_access_raw = true;
    }
    hint
}

impl<'a> Generator<'a> {
    /// Register classes acceptable for slot `arg`, plus the BTF type the
    /// slot requires. Writable classes only for uninitialized slots, packet
    /// classes only when the program type can touch packets at all.
    pub fn compatible_reg_types(
        &self,
        s: &BpfProgState,
        call: &BpfCall,
        arg: usize,
    ) -> (Vec<RegType>, Option<String>) {
        let arg_type = call.helper.args[arg];
        let mut regs: Vec<RegType> = compatible_reg_types(arg_type).to_vec();
        if arg_type.is_uninit() {
            regs.retain(|rt| rt.check_access(s, &call.helper, true));
        }
        if !check_pkt_access(s, &call.helper, false) {
            regs.retain(|rt| !rt.is_pkt());
        }
        let btf_id = match arg_type {
            ArgType::PtrToBtfId => call.helper.arg_btf_ids.first().cloned(),
            ArgType::PtrToBtfIdSockCommon => Some("struct sock_common".to_string()),
            _ => None,
        };
        (regs, btf_id)
    }

    /// Direct synthesis: pick a compatible register class and let it
    /// generate, a few times over.
    fn gen_direct(
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
        for _ in 0..DIRECT_GEN_ATTEMPTS {
            let rt = compat[r.random_range(0..compat.len())];
            if let Some(a) = rt.generate(self.cat, s, r, call, arg) {
                log::trace!("({}) arg[{arg}] via {} directly", self.depth, rt.name());
                return Some(a);
            }
        }
        None
    }

    /// Nested synthesis: generate a helper call whose return feeds slot
    /// `arg`, deriving the argument expression from the producer's return.
    fn gen_producer(
        &mut self,
        s: &mut BpfProgState,
        r: &mut impl Rng,
        call: &mut BpfCall,
        arg: usize,
    ) -> Option<BpfArg> {
        let (compat_regs, btf_id) = self.compatible_reg_types(s, call, arg);
        let arg_type = call.helper.args[arg];

        let pt = self.cat.prog_type(&s.prog_type_name).ok()?;
        let compat_helpers: Vec<HelperDef> = pt
            .helpers
            .iter()
            .filter(|h| {
                compat_regs.iter().any(|rt| {
                    // Sizes for alloc slots must be compile-time constants,
                    // not helper results.
                    if arg_type == ArgType::ConstAllocSizeOrZero && *rt == RegType::Scalar {
                        return false;
                    }
                    helper_can_return(h, *rt, btf_id.as_deref())
                })
            })
            .cloned()
            .collect();
        if compat_helpers.is_empty() {
            return None;
        }

        let producer = compat_helpers[r.random_range(0..compat_helpers.len())].clone();
        let hint = derive_hint(r, &producer, call, arg, s);
        let idx = self.gen_helper_call(s, r, &producer, hint, false)?;

        let prod_ret = s.calls[idx].ret.clone();
        let prod_ret_type = s.calls[idx].ret_type.clone();
        let prod_map = s.calls[idx].arg_map;
        let ret_struct = prod_ret_type
            .find("struct_")
            .and_then(|start| prod_ret_type.find('*').map(|end| prod_ret_type[start..end].to_string()));

        let mut a = BpfArg::for_slot(&call.helper, arg);
        match arg_type {
            ArgType::PtrToSpinLock => {
                let mi = s.find_member(ret_struct.as_deref()?, crate::core::types::FieldType::SpinLock)?;
                a.name = format!("&{prod_ret}->e{mi}");
            }
            ArgType::PtrToTimer => {
                call.arg_map = prod_map;
                let mi = s.find_member(ret_struct.as_deref()?, crate::core::types::FieldType::Timer)?;
                a.name = format!("&{prod_ret}->e{mi}");
            }
            ArgType::PtrToConstStr => {
                let mi = s.find_member(ret_struct.as_deref()?, crate::core::types::FieldType::CharArr8)?;
                a.name = format!("{prod_ret}->e{mi}");
            }
            _ => {
                let val = prod_map.and_then(|m| s.maps[m].val);
                let producer_ret = s.calls[idx].helper.ret;
                match val {
                    Some(v) if producer_ret.is_map_value() && s.structs[v].fields.len() >= 2 => {
                        // Project a member that leaves room for the access
                        // and is not a lock or timer.
                        let sd = &s.structs[v];
                        let need = s.calls[idx].hint.ret_access_size;
                        let members: Vec<usize> = sd
                            .fields
                            .iter()
                            .enumerate()
                            .filter(|(mi, ft)| {
                                !matches!(
                                    ft,
                                    crate::core::types::FieldType::SpinLock
                                        | crate::core::types::FieldType::Timer
                                ) && sd.size - sd.offset_of(*mi) >= need
                            })
                            .map(|(mi, _)| mi)
                            .collect();
                        if members.is_empty() {
                            log::debug!("({}) no usable offset in map_{}", self.depth, prod_map.unwrap());
                            return None;
                        }
                        let mi = members[r.random_range(0..members.len())];
                        a.name = format!("&{prod_ret}->e{mi}");
                        a.can_be_null = false;
                    }
                    _ => a.name = prod_ret.clone(),
                }
            }
        }

        if matches!(
            s.calls[idx].helper.ret,
            RetType::Integer
                | RetType::Void
                | RetType::PtrToMapValue
                | RetType::PtrToMemOrBtfId
                | RetType::PtrToBtfId
        ) && !a.can_be_null
        {
            a.is_not_null = true;
        }

        // Writing through a produced map value needs a writable map; reading
        // needs a readable one.
        if s.calls[idx].helper.ret.is_map_value() {
            if let Some(m) = prod_map {
                if arg_type.is_uninit() {
                    s.maps[m].remove_flag(crate::core::types::MapFlag::RdonlyProg);
                } else {
                    s.maps[m].remove_flag(crate::core::types::MapFlag::WronlyProg);
                }
            }
        }
        Some(a)
    }

    /// Resolve slot `arg` of `call`, writing the argument on success.
    pub(crate) fn gen_call_arg(
        &mut self,
        s: &mut BpfProgState,
        r: &mut impl Rng,
        call: &mut BpfCall,
        arg: usize,
    ) -> bool {
        let arg_type = call.helper.args[arg];
        log::trace!(
            "({}) gen call[{}] arg[{arg}]={} ({})",
            self.depth,
            s.calls.len(),
            arg_type.name(),
            call.helper.enum_name
        );

        let mut a = None;
        // Cgroup storage takes a fixed zero flags argument.
        if call.helper.enum_name == "BPF_FUNC_get_local_storage" && arg == 1 {
            a = Some(BpfArg::constant(&call.helper, arg, "0"));
        }
        if a.is_none() && r.random_ratio(1, 3) {
            a = self.gen_producer(s, r, call, arg);
        }
        if a.is_none() && r.random_ratio(1, 2) {
            a = self.gen_ctx_access(s, r, call, arg);
        }
        if a.is_none() {
            a = self.gen_direct(s, r, call, arg);
        }
        let Some(mut a) = a else {
            return false;
        };

        // The emitted size must agree with the sibling buffer.
        if arg_type.is_const_size() {
            a.umax = Some(call.stack_var_size as u64);
        }

        // A guard on anything but the released object can create paths that
        // leak the reference.
        if call.ref_release_kind().is_some() && arg != 0 && !a.is_not_null && !a.can_be_null {
            return false;
        }

        if call.args.len() == arg {
            call.args.push(a);
        } else {
            call.args[arg] = a;
        }
        true
    }

    /// Build one helper call and insert it into the sequence. Fails when
    /// the depth budget is exhausted, an argument defeats its retry budget,
    /// or the call would acquire a reference no allowed helper can release.
    pub fn gen_helper_call(
        &mut self,
        s: &mut BpfProgState,
        r: &mut impl Rng,
        helper: &HelperDef,
        hint: CallGenHint,
        prepend: bool,
    ) -> Option<usize> {
        self.depth += 1;
        if self.depth > MAX_GEN_DEPTH {
            log::debug!("({}) recursion budget exhausted for {}", self.depth, helper.enum_name);
            return None;
        }
        log::trace!(
            "({}) gen call[{}] {} hints={:?} ret_access_size={} raw={} preferred={:?}",
            self.depth,
            s.calls.len(),
            helper.enum_name,
            hint.arg_hints,
            hint.ret_access_size,
            hint.ret_access_raw,
            hint.preferred_map
        );

        let mut call = BpfCall::new(helper.clone(), hint);
        let mut attempt = 0;
        let mut i = 0;
        while i < helper.args.len() {
            if self.gen_call_arg(s, r, &mut call, i) {
                attempt = 0;
                i += 1;
            } else {
                attempt += 1;
                if attempt > ARG_GEN_ATTEMPTS {
                    log::debug!("failed to gen arg[{i}] for {}", helper.enum_name);
                    return None;
                }
            }
        }

        // Do not acquire references the program type cannot release.
        if let Some(kind) = call.ref_acquire_kind(&s.maps) {
            let pt = self.cat.prog_type(&s.prog_type_name).ok()?;
            let releasers: &[&str] = match kind {
                crate::state::RefKind::Socket => &["BPF_FUNC_sk_release"],
                crate::state::RefKind::Ringbuf => {
                    &["BPF_FUNC_ringbuf_submit", "BPF_FUNC_ringbuf_discard"]
                }
            };
            if pt.get_helpers(releasers).is_empty() {
                log::debug!("({}) {} has no release helper", self.depth, helper.enum_name);
                return None;
            }
        }

        call.ret_type = ret_c_type(s, &call);
        call.ret = s.fresh_var();
        let idx = if prepend {
            s.calls.insert(0, call);
            0
        } else {
            s.calls.push(call);
            s.calls.len() - 1
        };
        self.depth -= 1;
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
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
    fn test_compat_reg_types_filter_uninit() {
        let (cat, s) = setup("cgroup_skb");
        let g = Generator::new(&cat);
        let h = cat.helper("BPF_FUNC_skb_load_bytes").unwrap().clone();
        let call = BpfCall::new(h, CallGenHint::default());
        // Slot 2 is uninit memory; cgroup_skb packet pointers are read-only,
        // so packet classes must be gone and read-only classes filtered.
        let (regs, _) = g.compatible_reg_types(&s, &call, 2);
        assert!(!regs.contains(&RegType::PtrToPacket));
        assert!(!regs.contains(&RegType::PtrToPacketMeta));
        assert!(!regs.contains(&RegType::PtrToMapKey));
        assert!(regs.contains(&RegType::PtrToStack));
    }

    #[test]
    fn test_pkt_classes_only_for_pkt_helpers() {
        let (cat, s) = setup("sched_cls");
        let g = Generator::new(&cat);
        // ktime_get_ns never touches packets, so even in a packet-capable
        // program type the classes are dropped for a mem slot of a non-pkt
        // helper.
        let h = HelperDef::new(
            0,
            "BPF_FUNC_test_mem",
            RetType::Integer,
            &[ArgType::PtrToMem],
        );
        let call = BpfCall::new(h, CallGenHint::default());
        let (regs, _) = g.compatible_reg_types(&s, &call, 0);
        assert!(!regs.contains(&RegType::PtrToPacket));
    }

    #[test]
    fn test_btf_id_requirement() {
        let (cat, s) = setup("sched_cls");
        let g = Generator::new(&cat);
        let h = cat.helper("BPF_FUNC_sk_release").unwrap().clone();
        let call = BpfCall::new(h, CallGenHint::default());
        let (_, btf) = g.compatible_reg_types(&s, &call, 0);
        assert_eq!(btf.as_deref(), Some("struct sock_common"));
    }

    #[test]
    fn test_gen_helper_call_simple() {
        let (cat, mut s) = setup("sched_cls");
        let mut g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(5);
        let h = cat.helper("BPF_FUNC_map_lookup_elem").unwrap().clone();
        let idx = g
            .gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false)
            .expect("lookup must generate");
        let call = &s.calls[idx];
        assert_eq!(call.args.len(), 2);
        assert!(call.arg_map.is_some());
        assert!(!call.ret.is_empty());
        // Return type names the value struct or void.
        assert!(call.ret_type.ends_with('*') || call.ret_type == "void *");
        // The bound map admits the helper both ways.
        let m = &s.maps[call.arg_map.unwrap()];
        assert!(crate::catalog::compat::map_func_compatible(
            m.map_type,
            "BPF_FUNC_map_lookup_elem"
        ));
    }

    #[test]
    fn test_const_size_clamped_to_buffer() {
        let (cat, mut s) = setup("kprobe");
        let mut g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(21);
        let h = cat.helper("BPF_FUNC_get_current_comm").unwrap().clone();
        for _ in 0..10 {
            if let Some(idx) = g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false) {
                let call = &s.calls[idx];
                assert_eq!(call.args[1].umax, Some(call.stack_var_size as u64));
            }
            g.depth = 0;
        }
    }

    #[test]
    fn test_depth_budget_enforced() {
        let (cat, mut s) = setup("sched_cls");
        let mut g = Generator::new(&cat);
        g.depth = MAX_GEN_DEPTH;
        let mut r = StdRng::seed_from_u64(5);
        let h = cat.helper("BPF_FUNC_ktime_get_ns").unwrap().clone();
        assert!(g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false).is_none());
        assert!(s.calls.is_empty());
    }

    #[test]
    fn test_acquire_without_release_fails() {
        let mut cat = Catalog::linux();
        // A program type that can look sockets up but never release them.
        let pt = crate::catalog::ProgTypeDef::new(
            99,
            "lookup_only",
            "BPF_PROG_TYPE_SCHED_CLS",
            "struct __sk_buff",
            "struct sk_buff",
        )
        .sec(crate::catalog::SecDef::plain("tc"));
        cat.add_prog_type(pt, &["BPF_FUNC_sk_lookup_tcp", "BPF_FUNC_ktime_get_ns"]).unwrap();
        cat.set_ctx_access("lookup_only", crate::catalog::CtxAccess::read_all());

        let pt = cat.prog_type("lookup_only").unwrap();
        let mut s = BpfProgState::new(pt);
        s.sec = pt.sec_defs[0].clone();
        let mut g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(31);
        let h = cat.helper("BPF_FUNC_sk_lookup_tcp").unwrap().clone();
        for _ in 0..20 {
            g.depth = 0;
            assert!(g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false).is_none());
        }
    }

    #[test]
    fn test_get_local_storage_flags_are_zero() {
        let (cat, mut s) = setup("cgroup_skb");
        let mut g = Generator::new(&cat);
        let mut r = StdRng::seed_from_u64(41);
        let h = cat.helper("BPF_FUNC_get_local_storage").unwrap().clone();
        for _ in 0..20 {
            g.depth = 0;
            if let Some(idx) = g.gen_helper_call(&mut s, &mut r, &h, CallGenHint::default(), false) {
                assert_eq!(s.calls[idx].args[1].name, "0");
                return;
            }
        }
        panic!("get_local_storage never generated");
    }
}
