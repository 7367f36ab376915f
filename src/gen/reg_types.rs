// SPDX-License-Identifier: GPL-2.0

//! Per-register-class argument synthesis and access queries.
//!
//! Each register class knows how to conjure a C expression of its own kind
//! (or admit that it cannot) and whether the current program type may read
//! or write through it. Classes that can only be produced by helpers or
//! context projection return `None` here and are covered by the other
//! resolver strategies.

use rand::Rng;

use crate::catalog::prog_types::{
    pkt_ptr_read_only, pkt_ptr_read_write, pkt_ptr_read_write_no_check,
};
use crate::catalog::{Catalog, HelperDef};
use crate::core::types::{ArgType, RegType};
use crate::gen::maps::select_or_create_map;
use crate::state::{BpfArg, BpfCall, BpfProgState};

/// Round `val` up to a multiple of `align`.
pub(crate) fn round_up(val: usize, align: usize) -> usize {
    val.div_ceil(align) * align
}

/// Packet access policy: the program type must class packet pointers as
/// writable (or readable, for reads), and the helper itself must be marked
/// for packet access.
pub(crate) fn check_pkt_access(s: &BpfProgState, h: &HelperDef, is_write: bool) -> bool {
    let can_write = if pkt_ptr_read_only(&s.prog_type_enum) {
        false
    } else if pkt_ptr_read_write(&s.prog_type_enum) {
        true
    } else if pkt_ptr_read_write_no_check(&s.prog_type_enum) {
        return true;
    } else {
        return false;
    };

    if !can_write && is_write {
        false
    } else {
        h.pkt_access
    }
}

impl RegType {
    /// Produce an argument of this register class for slot `arg` of `call`,
    /// or fail so the resolver can retry another class.
    pub(crate) fn generate(
        self,
        cat: &Catalog,
        s: &mut BpfProgState,
        r: &mut impl Rng,
        call: &mut BpfCall,
        arg: usize,
    ) -> Option<BpfArg> {
        match self {
            RegType::Scalar => {
                let mut a = BpfArg::for_slot(&call.helper, arg);
                let value = if call.stack_var_size != 0 {
                    call.stack_var_size
                } else {
                    r.random_range(0..64)
                };
                a.name = s.fresh_var();
                a.prepare = format!("\tint64_t {} = {};\n", a.name, value);
                a.is_not_null = true;
                Some(a)
            }
            RegType::PtrToCtx => {
                let mut a = BpfArg::for_slot(&call.helper, arg);
                a.name = "ctx".to_string();
                a.is_not_null = true;
                Some(a)
            }
            RegType::ConstPtrToMap => {
                let mut a = BpfArg::for_slot(&call.helper, arg);
                let m = select_or_create_map(cat, s, r, call)?;
                a.name = format!("&{}", s.maps[m].name);
                a.is_not_null = true;
                Some(a)
            }
            RegType::PtrToStack => {
                let mut a = BpfArg::for_slot(&call.helper, arg);
                let mut var_size = r.random_range(0..64);
                if let Some(m) = call.arg_map {
                    let map = &s.maps[m];
                    if call.helper.args[arg] == ArgType::PtrToMapKey {
                        if let Some(k) = map.key {
                            var_size = round_up(s.structs[k].size, 8);
                        }
                    }
                    if matches!(
                        call.helper.args[arg],
                        ArgType::PtrToMapValue
                            | ArgType::PtrToMapValueOrNull
                            | ArgType::PtrToUninitMapValue
                    ) {
                        if let Some(v) = map.val {
                            var_size = round_up(s.structs[v].size, 8);
                        }
                    }
                }
                call.stack_var_size = var_size;
                a.name = s.fresh_var();
                a.prepare = format!("\tchar {}[{}] = {{}};\n", a.name, var_size);
                a.is_not_null = true;
                Some(a)
            }
            RegType::PtrToPercpuBtfId => {
                let mut a = BpfArg::for_slot(&call.helper, arg);
                s.externs
                    .insert("bpf_prog_active".to_string(), "int".to_string());
                a.name = "&bpf_prog_active".to_string();
                a.is_not_null = true;
                Some(a)
            }
            // Produced only by helpers or context projection.
            _ => None,
        }
    }

    /// Whether the current program type permits a read (or write) through
    /// this register class for `h`.
    pub(crate) fn check_access(self, s: &BpfProgState, h: &HelperDef, is_write: bool) -> bool {
        match self {
            RegType::PtrToPacket | RegType::PtrToPacketMeta => check_pkt_access(s, h, is_write),
            RegType::PtrToSocket
            | RegType::PtrToSockCommon
            | RegType::PtrToTcpSock
            | RegType::PtrToXdpSock
            | RegType::PtrToRdonlyBuf
            | RegType::PtrToMapKey => !is_write,
            RegType::PtrToPacketEnd | RegType::PtrToPercpuBtfId | RegType::PtrToFunc => false,
            _ => true,
        }
    }
}
