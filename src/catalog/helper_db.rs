// SPDX-License-Identifier: GPL-2.0

//! Default helper function database.
//!
//! Prototypes follow the kernel's `bpf_func_proto` definitions: numeric id,
//! return tag and up to five argument tags, plus the GPL and packet-access
//! markers the generator consults.

use crate::catalog::HelperDef;
use crate::core::types::{ArgType, RetType};

use crate::core::types::ArgType::*;

const INT: RetType = RetType::Integer;
const VOID: RetType = RetType::Void;
const MAP_VAL: RetType = RetType::PtrToMapValue;
const MAP_VAL_NULL: RetType = RetType::PtrToMapValueOrNull;
const SOCK_NULL: RetType = RetType::PtrToSocketOrNull;
const TCP_NULL: RetType = RetType::PtrToTcpSockOrNull;
const SKC_NULL: RetType = RetType::PtrToSockCommonOrNull;
const ALLOC_NULL: RetType = RetType::PtrToAllocMemOrNull;
const BTF_NULL: RetType = RetType::PtrToBtfIdOrNull;
const MEM_BTF: RetType = RetType::PtrToMemOrBtfId;
const MEM_BTF_NULL: RetType = RetType::PtrToMemOrBtfIdOrNull;

fn h(num: u32, enum_name: &str, ret: RetType, args: &[ArgType]) -> HelperDef {
    HelperDef::new(num, enum_name, ret, args)
}

/// The default helper table.
pub fn default_helpers() -> Vec<HelperDef> {
    vec![
        // Map operations
        h(1, "BPF_FUNC_map_lookup_elem", MAP_VAL_NULL, &[ConstMapPtr, PtrToMapKey]),
        h(2, "BPF_FUNC_map_update_elem", INT, &[ConstMapPtr, PtrToMapKey, PtrToMapValue, Anything]),
        h(3, "BPF_FUNC_map_delete_elem", INT, &[ConstMapPtr, PtrToMapKey]),
        h(87, "BPF_FUNC_map_push_elem", INT, &[ConstMapPtr, PtrToMapValue, Anything]),
        h(88, "BPF_FUNC_map_pop_elem", INT, &[ConstMapPtr, PtrToUninitMapValue]),
        h(89, "BPF_FUNC_map_peek_elem", INT, &[ConstMapPtr, PtrToUninitMapValue]),
        // Probing
        h(4, "BPF_FUNC_probe_read", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(45, "BPF_FUNC_probe_read_str", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(112, "BPF_FUNC_probe_read_user", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(113, "BPF_FUNC_probe_read_kernel", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(114, "BPF_FUNC_probe_read_user_str", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(115, "BPF_FUNC_probe_read_kernel_str", INT, &[PtrToUninitMem, ConstSize, Anything]).gpl(),
        h(36, "BPF_FUNC_probe_write_user", INT, &[Anything, PtrToMem, ConstSize]).gpl(),
        // Time, randomness, cpu ids
        h(5, "BPF_FUNC_ktime_get_ns", INT, &[]),
        h(125, "BPF_FUNC_ktime_get_boot_ns", INT, &[]),
        h(160, "BPF_FUNC_ktime_get_coarse_ns", INT, &[]),
        h(118, "BPF_FUNC_jiffies64", INT, &[]),
        h(7, "BPF_FUNC_get_prandom_u32", INT, &[]),
        h(8, "BPF_FUNC_get_smp_processor_id", INT, &[]),
        h(42, "BPF_FUNC_get_numa_node_id", INT, &[]),
        // Tracing output
        h(6, "BPF_FUNC_trace_printk", INT, &[PtrToMem, ConstSize]).gpl(),
        h(25, "BPF_FUNC_perf_event_output", INT, &[PtrToCtx, ConstMapPtr, Anything, PtrToMem, ConstSizeOrZero]).gpl(),
        h(22, "BPF_FUNC_perf_event_read", INT, &[ConstMapPtr, Anything]).gpl(),
        h(55, "BPF_FUNC_perf_event_read_value", INT, &[ConstMapPtr, Anything, PtrToUninitMem, ConstSize]).gpl(),
        h(56, "BPF_FUNC_perf_prog_read_value", INT, &[PtrToCtx, PtrToUninitMem, ConstSize]).gpl(),
        h(27, "BPF_FUNC_get_stackid", INT, &[PtrToCtx, ConstMapPtr, Anything]).gpl(),
        h(67, "BPF_FUNC_get_stack", INT, &[PtrToCtx, PtrToUninitMem, ConstSizeOrZero, Anything]).gpl(),
        h(119, "BPF_FUNC_read_branch_records", INT, &[PtrToCtx, PtrToMemOrNull, ConstSizeOrZero, Anything]).gpl(),
        h(111, "BPF_FUNC_skb_output", INT, &[PtrToCtx, ConstMapPtr, Anything, PtrToMem, ConstSizeOrZero]).gpl(),
        h(121, "BPF_FUNC_xdp_output", INT, &[PtrToCtx, ConstMapPtr, Anything, PtrToMem, ConstSizeOrZero]).gpl(),
        // Current task
        h(14, "BPF_FUNC_get_current_pid_tgid", INT, &[]),
        h(15, "BPF_FUNC_get_current_uid_gid", INT, &[]),
        h(16, "BPF_FUNC_get_current_comm", INT, &[PtrToUninitMem, ConstSize]).gpl(),
        h(35, "BPF_FUNC_get_current_task", INT, &[]).gpl(),
        h(80, "BPF_FUNC_get_current_cgroup_id", INT, &[]),
        h(123, "BPF_FUNC_get_current_ancestor_cgroup_id", INT, &[Anything]),
        // Cgroup
        h(17, "BPF_FUNC_get_cgroup_classid", INT, &[PtrToCtx]),
        h(33, "BPF_FUNC_skb_under_cgroup", INT, &[PtrToCtx, ConstMapPtr, Anything]),
        h(37, "BPF_FUNC_current_task_under_cgroup", INT, &[ConstMapPtr, Anything]).gpl(),
        h(79, "BPF_FUNC_skb_cgroup_id", INT, &[PtrToCtx]),
        h(83, "BPF_FUNC_skb_ancestor_cgroup_id", INT, &[PtrToCtx, Anything]),
        h(81, "BPF_FUNC_get_local_storage", MAP_VAL, &[ConstMapPtr, Anything]),
        // Tail call
        h(12, "BPF_FUNC_tail_call", VOID, &[PtrToCtx, ConstMapPtr, Anything]),
        // SKB
        h(9, "BPF_FUNC_skb_store_bytes", INT, &[PtrToCtx, Anything, PtrToMem, ConstSize, Anything]).pkt(),
        h(26, "BPF_FUNC_skb_load_bytes", INT, &[PtrToCtx, Anything, PtrToUninitMem, ConstSize]).pkt(),
        h(68, "BPF_FUNC_skb_load_bytes_relative", INT, &[PtrToCtx, Anything, PtrToUninitMem, ConstSize, Anything]).pkt(),
        h(39, "BPF_FUNC_skb_pull_data", INT, &[PtrToCtx, Anything]).pkt(),
        h(32, "BPF_FUNC_skb_change_type", INT, &[PtrToCtx, Anything]),
        h(31, "BPF_FUNC_skb_change_proto", INT, &[PtrToCtx, Anything, Anything]),
        h(38, "BPF_FUNC_skb_change_tail", INT, &[PtrToCtx, Anything, Anything]),
        h(43, "BPF_FUNC_skb_change_head", INT, &[PtrToCtx, Anything, Anything]),
        h(50, "BPF_FUNC_skb_adjust_room", INT, &[PtrToCtx, Anything, Anything, Anything]),
        h(18, "BPF_FUNC_skb_vlan_push", INT, &[PtrToCtx, Anything, Anything]),
        h(19, "BPF_FUNC_skb_vlan_pop", INT, &[PtrToCtx]),
        h(20, "BPF_FUNC_skb_get_tunnel_key", INT, &[PtrToCtx, PtrToUninitMem, ConstSize, Anything]),
        h(21, "BPF_FUNC_skb_set_tunnel_key", INT, &[PtrToCtx, PtrToMem, ConstSize, Anything]),
        h(29, "BPF_FUNC_skb_get_tunnel_opt", INT, &[PtrToCtx, PtrToUninitMem, ConstSize]),
        h(30, "BPF_FUNC_skb_set_tunnel_opt", INT, &[PtrToCtx, PtrToMem, ConstSize]),
        h(97, "BPF_FUNC_skb_ecn_set_ce", INT, &[PtrToCtx]),
        // Checksums
        h(10, "BPF_FUNC_l3_csum_replace", INT, &[PtrToCtx, Anything, Anything, Anything, Anything]),
        h(11, "BPF_FUNC_l4_csum_replace", INT, &[PtrToCtx, Anything, Anything, Anything, Anything]),
        h(28, "BPF_FUNC_csum_diff", INT, &[PtrToMemOrNull, ConstSizeOrZero, PtrToMemOrNull, ConstSizeOrZero, Anything]),
        h(40, "BPF_FUNC_csum_update", INT, &[PtrToCtx, Anything]),
        h(135, "BPF_FUNC_csum_level", INT, &[PtrToCtx, Anything]),
        // Hash / routing
        h(34, "BPF_FUNC_get_hash_recalc", INT, &[PtrToCtx]),
        h(48, "BPF_FUNC_set_hash", INT, &[PtrToCtx, Anything]),
        h(41, "BPF_FUNC_set_hash_invalid", INT, &[PtrToCtx]),
        h(24, "BPF_FUNC_get_route_realm", INT, &[PtrToCtx]),
        h(69, "BPF_FUNC_fib_lookup", INT, &[PtrToCtx, PtrToMem, ConstSize, Anything]),
        // Redirection
        h(23, "BPF_FUNC_redirect", INT, &[Anything, Anything]),
        h(51, "BPF_FUNC_redirect_map", INT, &[ConstMapPtr, Anything, Anything]),
        h(13, "BPF_FUNC_clone_redirect", INT, &[PtrToCtx, Anything, Anything]),
        h(52, "BPF_FUNC_sk_redirect_map", INT, &[PtrToCtx, ConstMapPtr, Anything, Anything]),
        h(72, "BPF_FUNC_sk_redirect_hash", INT, &[PtrToCtx, ConstMapPtr, PtrToMapKey, Anything]),
        h(60, "BPF_FUNC_msg_redirect_map", INT, &[PtrToCtx, ConstMapPtr, Anything, Anything]),
        h(71, "BPF_FUNC_msg_redirect_hash", INT, &[PtrToCtx, ConstMapPtr, PtrToMapKey, Anything]),
        // XDP
        h(44, "BPF_FUNC_xdp_adjust_head", INT, &[PtrToCtx, Anything]),
        h(65, "BPF_FUNC_xdp_adjust_tail", INT, &[PtrToCtx, Anything]),
        h(54, "BPF_FUNC_xdp_adjust_meta", INT, &[PtrToCtx, Anything]),
        // Socket lookup and references
        h(84, "BPF_FUNC_sk_lookup_tcp", SOCK_NULL, &[PtrToCtx, PtrToMem, ConstSize, Anything, Anything]),
        h(85, "BPF_FUNC_sk_lookup_udp", SOCK_NULL, &[PtrToCtx, PtrToMem, ConstSize, Anything, Anything]),
        h(99, "BPF_FUNC_skc_lookup_tcp", SKC_NULL, &[PtrToCtx, PtrToMem, ConstSize, Anything, Anything]),
        h(86, "BPF_FUNC_sk_release", INT, &[PtrToBtfIdSockCommon]),
        h(95, "BPF_FUNC_sk_fullsock", SOCK_NULL, &[PtrToSockCommon]),
        h(96, "BPF_FUNC_tcp_sock", TCP_NULL, &[PtrToSockCommon]).gpl(),
        h(98, "BPF_FUNC_get_listener_sock", SOCK_NULL, &[PtrToSockCommon]),
        h(124, "BPF_FUNC_sk_assign", INT, &[PtrToCtx, PtrToBtfIdSockCommon, Anything]),
        // Socket casts
        h(137, "BPF_FUNC_skc_to_tcp_sock", BTF_NULL, &[PtrToBtfIdSockCommon]).ret_btf("struct tcp_sock"),
        h(136, "BPF_FUNC_skc_to_tcp6_sock", BTF_NULL, &[PtrToBtfIdSockCommon]).ret_btf("struct tcp6_sock"),
        h(140, "BPF_FUNC_skc_to_udp6_sock", BTF_NULL, &[PtrToBtfIdSockCommon]).ret_btf("struct udp6_sock"),
        h(138, "BPF_FUNC_skc_to_tcp_timewait_sock", BTF_NULL, &[PtrToBtfIdSockCommon]).ret_btf("struct tcp_timewait_sock"),
        h(139, "BPF_FUNC_skc_to_tcp_request_sock", BTF_NULL, &[PtrToBtfIdSockCommon]).ret_btf("struct tcp_request_sock"),
        // Socket metadata
        h(46, "BPF_FUNC_get_socket_cookie", INT, &[PtrToCtx]),
        h(47, "BPF_FUNC_get_socket_uid", INT, &[PtrToCtx]),
        h(122, "BPF_FUNC_get_netns_cookie", INT, &[PtrToCtx]),
        // TCP
        h(100, "BPF_FUNC_tcp_check_syncookie", INT, &[PtrToBtfIdSockCommon, PtrToMemOrNull, ConstSizeOrZero, PtrToMem, ConstSize]),
        h(110, "BPF_FUNC_tcp_gen_syncookie", INT, &[PtrToBtfIdSockCommon, PtrToMemOrNull, ConstSizeOrZero, PtrToMem, ConstSize]),
        h(116, "BPF_FUNC_tcp_send_ack", INT, &[PtrToBtfId, Anything]).arg_btf("struct tcp_sock"),
        // Sock map updates
        h(53, "BPF_FUNC_sock_map_update", INT, &[PtrToCtx, ConstMapPtr, PtrToMapKey, Anything]),
        h(70, "BPF_FUNC_sock_hash_update", INT, &[PtrToCtx, ConstMapPtr, PtrToMapKey, Anything]),
        h(82, "BPF_FUNC_sk_select_reuseport", INT, &[PtrToCtx, ConstMapPtr, PtrToMapKey, Anything]),
        // Sock ops
        h(59, "BPF_FUNC_sock_ops_cb_flags_set", INT, &[PtrToCtx, Anything]),
        h(142, "BPF_FUNC_load_hdr_opt", INT, &[PtrToCtx, PtrToUninitMem, ConstSize, Anything]),
        h(143, "BPF_FUNC_store_hdr_opt", INT, &[PtrToCtx, PtrToMem, ConstSize, Anything]),
        h(144, "BPF_FUNC_reserve_hdr_opt", INT, &[PtrToCtx, Anything, Anything]),
        // SK_MSG
        h(61, "BPF_FUNC_msg_apply_bytes", INT, &[PtrToCtx, Anything]),
        h(62, "BPF_FUNC_msg_cork_bytes", INT, &[PtrToCtx, Anything]),
        h(63, "BPF_FUNC_msg_pull_data", INT, &[PtrToCtx, Anything, Anything, Anything]),
        h(90, "BPF_FUNC_msg_push_data", INT, &[PtrToCtx, Anything, Anything, Anything]),
        h(91, "BPF_FUNC_msg_pop_data", INT, &[PtrToCtx, Anything, Anything, Anything]),
        // Bind / sockopt
        h(64, "BPF_FUNC_bind", INT, &[PtrToCtx, PtrToMem, ConstSize]),
        h(49, "BPF_FUNC_setsockopt", INT, &[PtrToCtx, Anything, Anything, PtrToMem, ConstSize]),
        h(57, "BPF_FUNC_getsockopt", INT, &[PtrToCtx, Anything, Anything, PtrToUninitMem, ConstSize]),
        // Ring buffers
        h(130, "BPF_FUNC_ringbuf_output", INT, &[ConstMapPtr, PtrToMem, ConstSizeOrZero, Anything]),
        h(131, "BPF_FUNC_ringbuf_reserve", ALLOC_NULL, &[ConstMapPtr, ConstAllocSizeOrZero, Anything]),
        h(132, "BPF_FUNC_ringbuf_submit", VOID, &[PtrToAllocMem, Anything]),
        h(133, "BPF_FUNC_ringbuf_discard", VOID, &[PtrToAllocMem, Anything]),
        h(134, "BPF_FUNC_ringbuf_query", INT, &[ConstMapPtr, Anything]),
        // Spin locks
        h(93, "BPF_FUNC_spin_lock", VOID, &[PtrToSpinLock]).gpl(),
        h(94, "BPF_FUNC_spin_unlock", VOID, &[PtrToSpinLock]).gpl(),
        // Signals
        h(109, "BPF_FUNC_send_signal", INT, &[Anything]),
        h(117, "BPF_FUNC_send_signal_thread", INT, &[Anything]),
        h(58, "BPF_FUNC_override_return", INT, &[PtrToCtx, Anything]).gpl(),
        // Sysctl
        h(101, "BPF_FUNC_sysctl_get_name", INT, &[PtrToCtx, PtrToUninitMem, ConstSizeOrZero, Anything]),
        h(102, "BPF_FUNC_sysctl_get_current_value", INT, &[PtrToCtx, PtrToUninitMem, ConstSize]),
        h(103, "BPF_FUNC_sysctl_get_new_value", INT, &[PtrToCtx, PtrToUninitMem, ConstSize]),
        h(104, "BPF_FUNC_sysctl_set_new_value", INT, &[PtrToCtx, PtrToMem, ConstSize]),
        // String conversion
        h(105, "BPF_FUNC_strtol", INT, &[PtrToMem, ConstSize, Anything, PtrToLong]),
        h(106, "BPF_FUNC_strtoul", INT, &[PtrToMem, ConstSize, Anything, PtrToLong]),
        // Local storage
        h(107, "BPF_FUNC_sk_storage_get", MAP_VAL_NULL, &[ConstMapPtr, PtrToSocket, PtrToMapValueOrNull, Anything]),
        h(108, "BPF_FUNC_sk_storage_delete", INT, &[ConstMapPtr, PtrToSocket]),
        h(145, "BPF_FUNC_inode_storage_get", MAP_VAL_NULL, &[ConstMapPtr, PtrToBtfId, PtrToMapValueOrNull, Anything]).arg_btf("struct inode"),
        h(146, "BPF_FUNC_inode_storage_delete", INT, &[ConstMapPtr, PtrToBtfId]).arg_btf("struct inode"),
        h(156, "BPF_FUNC_task_storage_get", MAP_VAL_NULL, &[ConstMapPtr, PtrToBtfId, PtrToMapValueOrNull, Anything]).arg_btf("struct task_struct"),
        h(157, "BPF_FUNC_task_storage_delete", INT, &[ConstMapPtr, PtrToBtfId]).arg_btf("struct task_struct"),
        // Paths and user memory (sleepable)
        h(147, "BPF_FUNC_d_path", INT, &[PtrToBtfId, PtrToMem, ConstSizeOrZero]).arg_btf("struct path"),
        h(148, "BPF_FUNC_copy_from_user", INT, &[PtrToUninitMem, ConstSizeOrZero, Anything]),
        // Per-cpu kernel data
        h(153, "BPF_FUNC_per_cpu_ptr", MEM_BTF_NULL, &[PtrToPercpuBtfId, Anything]),
        h(154, "BPF_FUNC_this_cpu_ptr", MEM_BTF, &[PtrToPercpuBtfId]),
        // Timers
        h(169, "BPF_FUNC_timer_init", INT, &[PtrToTimer, ConstMapPtr, Anything]),
        h(170, "BPF_FUNC_timer_set_callback", INT, &[PtrToTimer, PtrToFunc]),
        h(171, "BPF_FUNC_timer_start", INT, &[PtrToTimer, Anything, Anything]),
        h(172, "BPF_FUNC_timer_cancel", INT, &[PtrToTimer]),
        // Misc
        h(163, "BPF_FUNC_check_mtu", INT, &[PtrToCtx, Anything, PtrToInt, Anything, Anything]),
        h(164, "BPF_FUNC_for_each_map_elem", INT, &[ConstMapPtr, PtrToFunc, PtrToStackOrNull, Anything]),
        h(165, "BPF_FUNC_snprintf", INT, &[PtrToMemOrNull, ConstSizeOrZero, PtrToConstStr, PtrToMemOrNull, ConstSizeOrZero]),
        h(173, "BPF_FUNC_get_func_ip", INT, &[PtrToCtx]),
        h(174, "BPF_FUNC_get_attach_cookie", INT, &[PtrToCtx]),
    ]
}
