// SPDX-License-Identifier: GPL-2.0

//! Compatibility relations between helpers, map types, argument tags and
//! register classes.
//!
//! Two directed relations mirror the kernel's `check_map_func_compatibility`:
//! a helper may constrain the map types it accepts, and a map type may
//! constrain the helpers that operate on it. Both directions must agree for
//! a (map, helper) pair to be usable.

use crate::catalog::HelperDef;
use crate::core::types::{ArgType, MapType, RegType};

/// Map types a helper may reference, if the helper is constrained.
pub fn func_compat_maps(helper_enum: &str) -> Option<&'static [MapType]> {
    use crate::core::types::MapType::*;
    let maps: &'static [MapType] = match helper_enum {
        "BPF_FUNC_tail_call" => &[ProgArray],
        "BPF_FUNC_perf_event_read"
        | "BPF_FUNC_perf_event_output"
        | "BPF_FUNC_perf_event_read_value"
        | "BPF_FUNC_skb_output"
        | "BPF_FUNC_xdp_output" => &[PerfEventArray],
        "BPF_FUNC_ringbuf_output" | "BPF_FUNC_ringbuf_reserve" | "BPF_FUNC_ringbuf_query" => {
            &[Ringbuf]
        }
        "BPF_FUNC_get_stackid" => &[StackTrace],
        "BPF_FUNC_current_task_under_cgroup" | "BPF_FUNC_skb_under_cgroup" => &[CgroupArray],
        "BPF_FUNC_redirect_map" => &[Devmap, DevmapHash, Cpumap, Xskmap],
        "BPF_FUNC_sk_redirect_map" | "BPF_FUNC_msg_redirect_map" | "BPF_FUNC_sock_map_update" => {
            &[Sockmap]
        }
        "BPF_FUNC_sk_redirect_hash"
        | "BPF_FUNC_msg_redirect_hash"
        | "BPF_FUNC_sock_hash_update" => &[Sockhash],
        "BPF_FUNC_get_local_storage" => &[CgroupStorage, PercpuCgroupStorage],
        "BPF_FUNC_sk_select_reuseport" => &[ReuseportSockarray, Sockmap, Sockhash],
        "BPF_FUNC_map_peek_elem" | "BPF_FUNC_map_pop_elem" | "BPF_FUNC_map_push_elem" => {
            &[Queue, Stack]
        }
        "BPF_FUNC_sk_storage_get" | "BPF_FUNC_sk_storage_delete" => &[SkStorage],
        "BPF_FUNC_inode_storage_get" | "BPF_FUNC_inode_storage_delete" => &[InodeStorage],
        "BPF_FUNC_task_storage_get" | "BPF_FUNC_task_storage_delete" => &[TaskStorage],
        _ => return None,
    };
    Some(maps)
}

/// Helpers a map type admits, if the map type is constrained.
pub fn map_compat_funcs(map_type: MapType) -> Option<&'static [&'static str]> {
    use crate::core::types::MapType::*;
    let funcs: &'static [&'static str] = match map_type {
        ProgArray => &["BPF_FUNC_tail_call"],
        PerfEventArray => &[
            "BPF_FUNC_perf_event_read",
            "BPF_FUNC_perf_event_output",
            "BPF_FUNC_skb_output",
            "BPF_FUNC_perf_event_read_value",
            "BPF_FUNC_xdp_output",
        ],
        Ringbuf => &[
            "BPF_FUNC_ringbuf_output",
            "BPF_FUNC_ringbuf_reserve",
            "BPF_FUNC_ringbuf_query",
        ],
        StackTrace => &["BPF_FUNC_get_stackid"],
        CgroupArray => &["BPF_FUNC_skb_under_cgroup", "BPF_FUNC_current_task_under_cgroup"],
        CgroupStorage | PercpuCgroupStorage => &["BPF_FUNC_get_local_storage"],
        Devmap | DevmapHash => &["BPF_FUNC_redirect_map", "BPF_FUNC_map_lookup_elem"],
        Cpumap => &["BPF_FUNC_redirect_map"],
        Xskmap => &["BPF_FUNC_redirect_map", "BPF_FUNC_map_lookup_elem"],
        ArrayOfMaps | HashOfMaps => &["BPF_FUNC_map_lookup_elem"],
        Sockmap => &[
            "BPF_FUNC_sk_redirect_map",
            "BPF_FUNC_sock_map_update",
            "BPF_FUNC_map_delete_elem",
            "BPF_FUNC_msg_redirect_map",
            "BPF_FUNC_sk_select_reuseport",
            "BPF_FUNC_map_lookup_elem",
            "BPF_FUNC_map_update_elem",
        ],
        Sockhash => &[
            "BPF_FUNC_sk_redirect_hash",
            "BPF_FUNC_sock_hash_update",
            "BPF_FUNC_map_delete_elem",
            "BPF_FUNC_msg_redirect_hash",
            "BPF_FUNC_sk_select_reuseport",
            "BPF_FUNC_map_lookup_elem",
            "BPF_FUNC_map_update_elem",
        ],
        ReuseportSockarray => &["BPF_FUNC_sk_select_reuseport"],
        Queue | Stack => &[
            "BPF_FUNC_map_peek_elem",
            "BPF_FUNC_map_pop_elem",
            "BPF_FUNC_map_push_elem",
        ],
        SkStorage => &["BPF_FUNC_sk_storage_get", "BPF_FUNC_sk_storage_delete"],
        InodeStorage => &["BPF_FUNC_inode_storage_get", "BPF_FUNC_inode_storage_delete"],
        TaskStorage => &["BPF_FUNC_task_storage_get", "BPF_FUNC_task_storage_delete"],
        _ => return None,
    };
    Some(funcs)
}

/// Two-way agreement: a (map, helper) pair is usable only when neither side
/// vetoes it.
pub fn map_func_compatible(map_type: MapType, helper_enum: &str) -> bool {
    if let Some(maps) = func_compat_maps(helper_enum) {
        if !maps.contains(&map_type) {
            return false;
        }
    }
    if let Some(funcs) = map_compat_funcs(map_type) {
        if !funcs.contains(&helper_enum) {
            return false;
        }
    }
    true
}

use crate::core::types::RegType::*;

static MAP_KEY_VALUE_TYPES: &[RegType] =
    &[PtrToStack, PtrToPacket, PtrToPacketMeta, PtrToMapKey, PtrToMapValue];

static SCALAR_TYPES: &[RegType] = &[Scalar];

static CONST_MAP_PTR_TYPES: &[RegType] = &[ConstPtrToMap];

static CONTEXT_TYPES: &[RegType] = &[PtrToCtx];

static SOCK_TYPES: &[RegType] = &[PtrToSockCommon, PtrToSocket, PtrToTcpSock, PtrToXdpSock];

static BTF_ID_SOCK_COMMON_TYPES: &[RegType] =
    &[PtrToSockCommon, PtrToSocket, PtrToTcpSock, PtrToXdpSock, PtrToBtfId];

static FULLSOCK_TYPES: &[RegType] = &[PtrToSocket];

static BTF_PTR_TYPES: &[RegType] = &[PtrToBtfId];

static SPIN_LOCK_TYPES: &[RegType] = &[PtrToMapValue];

static MEM_TYPES: &[RegType] = &[
    PtrToStack,
    PtrToPacket,
    PtrToPacketMeta,
    PtrToMapKey,
    PtrToMapValue,
    PtrToAllocMem,
    PtrToRdonlyBuf,
    PtrToRdwrBuf,
];

static ALLOC_MEM_TYPES: &[RegType] = &[PtrToAllocMem];

static INT_PTR_TYPES: &[RegType] =
    &[PtrToStack, PtrToPacket, PtrToPacketMeta, PtrToMapKey, PtrToMapValue];

static PERCPU_BTF_PTR_TYPES: &[RegType] = &[PtrToPercpuBtfId];

static FUNC_PTR_TYPES: &[RegType] = &[PtrToFunc];

static STACK_PTR_TYPES: &[RegType] = &[PtrToStack];

static CONST_STR_PTR_TYPES: &[RegType] = &[PtrToMapValue];

static TIMER_TYPES: &[RegType] = &[PtrToMapValue];

static ALL_TYPES: &[RegType] = &[
    Scalar,
    PtrToCtx,
    ConstPtrToMap,
    PtrToMapValue,
    PtrToStack,
    PtrToPacketMeta,
    PtrToPacket,
    PtrToPacketEnd,
    PtrToFlowKeys,
    PtrToSocket,
    PtrToSockCommon,
    PtrToTcpSock,
    PtrToTpBuffer,
    PtrToXdpSock,
    PtrToBtfId,
    PtrToAllocMem,
    PtrToRdonlyBuf,
    PtrToRdwrBuf,
    PtrToPercpuBtfId,
    PtrToFunc,
    PtrToMapKey,
];

/// Register classes an argument tag accepts.
pub fn compatible_reg_types(arg: ArgType) -> &'static [RegType] {
    match arg {
        ArgType::Anything => ALL_TYPES,
        ArgType::PtrToMapKey
        | ArgType::PtrToMapValue
        | ArgType::PtrToUninitMapValue
        | ArgType::PtrToMapValueOrNull => MAP_KEY_VALUE_TYPES,
        ArgType::ConstSize | ArgType::ConstSizeOrZero | ArgType::ConstAllocSizeOrZero => {
            SCALAR_TYPES
        }
        ArgType::ConstMapPtr => CONST_MAP_PTR_TYPES,
        ArgType::PtrToCtx | ArgType::PtrToCtxOrNull => CONTEXT_TYPES,
        ArgType::PtrToSockCommon => SOCK_TYPES,
        ArgType::PtrToBtfIdSockCommon => BTF_ID_SOCK_COMMON_TYPES,
        ArgType::PtrToSocket | ArgType::PtrToSocketOrNull => FULLSOCK_TYPES,
        ArgType::PtrToBtfId => BTF_PTR_TYPES,
        ArgType::PtrToSpinLock => SPIN_LOCK_TYPES,
        ArgType::PtrToMem | ArgType::PtrToMemOrNull | ArgType::PtrToUninitMem => MEM_TYPES,
        ArgType::PtrToAllocMem | ArgType::PtrToAllocMemOrNull => ALLOC_MEM_TYPES,
        ArgType::PtrToInt | ArgType::PtrToLong => INT_PTR_TYPES,
        ArgType::PtrToPercpuBtfId => PERCPU_BTF_PTR_TYPES,
        ArgType::PtrToFunc => FUNC_PTR_TYPES,
        ArgType::PtrToStackOrNull => STACK_PTR_TYPES,
        ArgType::PtrToConstStr => CONST_STR_PTR_TYPES,
        ArgType::PtrToTimer => TIMER_TYPES,
    }
}

/// Register classes a return tag can produce.
///
/// A nullable map value may come back as a socket pointer when the map is a
/// sockmap/sockhash/xskmap, which is why those classes appear alongside
/// `PTR_TO_MAP_VALUE`.
pub fn ret_reg_types(ret: crate::core::types::RetType) -> &'static [RegType] {
    use crate::core::types::RetType;
    match ret {
        RetType::Integer => &[Scalar],
        RetType::Void => &[],
        RetType::PtrToMapValue => &[PtrToMapValue],
        RetType::PtrToMapValueOrNull => &[PtrToMapValue, PtrToXdpSock, PtrToSocket],
        RetType::PtrToSocketOrNull => &[PtrToSocket],
        RetType::PtrToTcpSockOrNull => &[PtrToTcpSock],
        RetType::PtrToSockCommonOrNull => &[PtrToSockCommon],
        RetType::PtrToAllocMemOrNull => &[PtrToAllocMem],
        RetType::PtrToBtfIdOrNull | RetType::PtrToBtfId => &[PtrToBtfId],
        RetType::PtrToMemOrBtfIdOrNull | RetType::PtrToMemOrBtfId => &[PtrToAllocMem, PtrToBtfId],
    }
}

/// Whether `helper` can produce a value of register class `reg`, optionally
/// constrained to a specific BTF type.
pub fn helper_can_return(helper: &HelperDef, reg: RegType, btf_id: Option<&str>) -> bool {
    use crate::core::types::RetType;
    if !ret_reg_types(helper.ret).contains(&reg) {
        return false;
    }
    if let Some(btf_id) = btf_id {
        match helper.ret {
            RetType::PtrToBtfIdOrNull | RetType::PtrToBtfId => {
                return btf_id == helper.ret_btf_id;
            }
            // Kernel symbol returns would need a random ksym; not generated.
            RetType::PtrToMemOrBtfIdOrNull | RetType::PtrToMemOrBtfId => return false,
            _ => {}
        }
    }
    true
}
