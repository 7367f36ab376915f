// SPDX-License-Identifier: GPL-2.0

//! Default program type definitions and program-type classifications.
//!
//! Besides the per-type tables (sections, allowed helpers, context access)
//! this module holds the fixed classifications the generator consults:
//! which program types may read or write packet data, which may update
//! sockmaps, and which count as tracing.

use crate::catalog::ctx::{AccessPolicy, CtxAccess};
use crate::catalog::{Catalog, ProgTypeDef, SecDef, SecNameGen};
use crate::core::error::Result;
use crate::core::types::RegType;

/// Program types whose packet pointers are read-only.
pub fn pkt_ptr_read_only(prog_enum: &str) -> bool {
    matches!(
        prog_enum,
        "BPF_PROG_TYPE_LWT_IN"
            | "BPF_PROG_TYPE_LWT_OUT"
            | "BPF_PROG_TYPE_LWT_SEG6LOCAL"
            | "BPF_PROG_TYPE_SK_REUSEPORT"
            | "BPF_PROG_TYPE_FLOW_DISSECTOR"
            | "BPF_PROG_TYPE_CGROUP_SKB"
    )
}

/// Program types whose packet pointers are writable.
pub fn pkt_ptr_read_write(prog_enum: &str) -> bool {
    matches!(
        prog_enum,
        "BPF_PROG_TYPE_SCHED_CLS"
            | "BPF_PROG_TYPE_SCHED_ACT"
            | "BPF_PROG_TYPE_XDP"
            | "BPF_PROG_TYPE_LWT_XMIT"
            | "BPF_PROG_TYPE_SK_SKB"
            | "BPF_PROG_TYPE_SK_MSG"
    )
}

/// Program types whose packet pointers are writable without a helper-side
/// packet-access check.
pub fn pkt_ptr_read_write_no_check(prog_enum: &str) -> bool {
    matches!(prog_enum, "BPF_PROG_TYPE_CGROUP_SOCKOPT")
}

/// Program types permitted to update sockmap/sockhash entries.
pub fn may_update_sockmap(prog_enum: &str) -> bool {
    matches!(
        prog_enum,
        "BPF_PROG_TYPE_TRACING"
            | "BPF_PROG_TYPE_SOCKET_FILTER"
            | "BPF_PROG_TYPE_SCHED_CLS"
            | "BPF_PROG_TYPE_SCHED_ACT"
            | "BPF_PROG_TYPE_XDP"
            | "BPF_PROG_TYPE_SK_REUSEPORT"
            | "BPF_PROG_TYPE_FLOW_DISSECTOR"
            | "BPF_PROG_TYPE_SK_LOOKUP"
    )
}

/// Tracing program types (spin-lock maps are off limits).
pub fn is_tracing_prog_type(prog_enum: &str) -> bool {
    matches!(
        prog_enum,
        "BPF_PROG_TYPE_KPROBE"
            | "BPF_PROG_TYPE_TRACEPOINT"
            | "BPF_PROG_TYPE_PERF_EVENT"
            | "BPF_PROG_TYPE_RAW_TRACEPOINT"
    )
}

const MAP_OPS: &[&str] = &[
    "BPF_FUNC_map_lookup_elem",
    "BPF_FUNC_map_update_elem",
    "BPF_FUNC_map_delete_elem",
    "BPF_FUNC_map_push_elem",
    "BPF_FUNC_map_pop_elem",
    "BPF_FUNC_map_peek_elem",
];

const BASE: &[&str] = &[
    "BPF_FUNC_ktime_get_ns",
    "BPF_FUNC_ktime_get_boot_ns",
    "BPF_FUNC_jiffies64",
    "BPF_FUNC_get_prandom_u32",
    "BPF_FUNC_get_smp_processor_id",
    "BPF_FUNC_get_numa_node_id",
    "BPF_FUNC_trace_printk",
    "BPF_FUNC_tail_call",
    "BPF_FUNC_for_each_map_elem",
    "BPF_FUNC_snprintf",
    "BPF_FUNC_per_cpu_ptr",
    "BPF_FUNC_this_cpu_ptr",
];

const RINGBUF: &[&str] = &[
    "BPF_FUNC_ringbuf_output",
    "BPF_FUNC_ringbuf_reserve",
    "BPF_FUNC_ringbuf_submit",
    "BPF_FUNC_ringbuf_discard",
    "BPF_FUNC_ringbuf_query",
];

const SK_LOOKUP_REF: &[&str] = &[
    "BPF_FUNC_sk_lookup_tcp",
    "BPF_FUNC_sk_lookup_udp",
    "BPF_FUNC_skc_lookup_tcp",
    "BPF_FUNC_sk_release",
];

const SOCK_CASTS: &[&str] = &[
    "BPF_FUNC_skc_to_tcp_sock",
    "BPF_FUNC_skc_to_tcp6_sock",
    "BPF_FUNC_skc_to_udp6_sock",
    "BPF_FUNC_skc_to_tcp_timewait_sock",
    "BPF_FUNC_skc_to_tcp_request_sock",
];

const SPIN_LOCK: &[&str] = &["BPF_FUNC_spin_lock", "BPF_FUNC_spin_unlock"];

const TIMERS: &[&str] = &[
    "BPF_FUNC_timer_init",
    "BPF_FUNC_timer_set_callback",
    "BPF_FUNC_timer_start",
    "BPF_FUNC_timer_cancel",
];

const TRACING_COMMON: &[&str] = &[
    "BPF_FUNC_probe_read",
    "BPF_FUNC_probe_read_str",
    "BPF_FUNC_probe_read_user",
    "BPF_FUNC_probe_read_kernel",
    "BPF_FUNC_probe_read_user_str",
    "BPF_FUNC_probe_read_kernel_str",
    "BPF_FUNC_get_current_pid_tgid",
    "BPF_FUNC_get_current_uid_gid",
    "BPF_FUNC_get_current_comm",
    "BPF_FUNC_get_current_task",
    "BPF_FUNC_get_current_cgroup_id",
    "BPF_FUNC_get_current_ancestor_cgroup_id",
    "BPF_FUNC_current_task_under_cgroup",
    "BPF_FUNC_perf_event_output",
    "BPF_FUNC_perf_event_read",
    "BPF_FUNC_perf_event_read_value",
    "BPF_FUNC_get_stackid",
    "BPF_FUNC_get_stack",
    "BPF_FUNC_send_signal",
    "BPF_FUNC_send_signal_thread",
    "BPF_FUNC_task_storage_get",
    "BPF_FUNC_task_storage_delete",
    "BPF_FUNC_probe_write_user",
];

fn skb_ctx_access() -> CtxAccess {
    CtxAccess::read_all()
        .project(RegType::PtrToPacket, &["data"])
        .project(RegType::PtrToPacketEnd, &["data_end"])
        .project(RegType::PtrToPacketMeta, &["data_meta"])
        .project(RegType::PtrToSockCommon, &["sk"])
        .with_fields(
            AccessPolicy::RW,
            &["mark", "priority", "tc_index", "tc_classid", "cb", "queue_mapping"],
        )
        .with_fields(AccessPolicy::NONE, &["flow_keys"])
}

/// Install the default program types into `cat`.
pub fn install_default_prog_types(cat: &mut Catalog) -> Result<()> {
    // Socket filter
    let pt = ProgTypeDef::new(
        1,
        "socket_filter",
        "BPF_PROG_TYPE_SOCKET_FILTER",
        "struct __sk_buff",
        "struct sk_buff",
    )
    .sec(SecDef::plain("socket"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SK_LOOKUP_REF);
    helpers.extend([
        "BPF_FUNC_skb_load_bytes",
        "BPF_FUNC_skb_load_bytes_relative",
        "BPF_FUNC_get_socket_cookie",
        "BPF_FUNC_get_socket_uid",
        "BPF_FUNC_get_netns_cookie",
        "BPF_FUNC_sk_fullsock",
        "BPF_FUNC_perf_event_output",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("socket_filter", skb_ctx_access());

    // Traffic control classifier / action
    for (num, name, enum_name) in [
        (3, "sched_cls", "BPF_PROG_TYPE_SCHED_CLS"),
        (4, "sched_act", "BPF_PROG_TYPE_SCHED_ACT"),
    ] {
        let mut pt = ProgTypeDef::new(num, name, enum_name, "struct __sk_buff", "struct sk_buff");
        if name == "sched_cls" {
            pt = pt.sec(SecDef::plain("tc")).sec(SecDef::plain("classifier"));
        } else {
            pt = pt.sec(SecDef::plain("action"));
        }
        let mut helpers: Vec<&str> = Vec::new();
        helpers.extend(MAP_OPS);
        helpers.extend(BASE);
        helpers.extend(RINGBUF);
        helpers.extend(SK_LOOKUP_REF);
        helpers.extend(SOCK_CASTS);
        helpers.extend(SPIN_LOCK);
        helpers.extend(TIMERS);
        helpers.extend([
            "BPF_FUNC_skb_store_bytes",
            "BPF_FUNC_skb_load_bytes",
            "BPF_FUNC_skb_load_bytes_relative",
            "BPF_FUNC_skb_pull_data",
            "BPF_FUNC_skb_change_type",
            "BPF_FUNC_skb_change_proto",
            "BPF_FUNC_skb_change_tail",
            "BPF_FUNC_skb_change_head",
            "BPF_FUNC_skb_adjust_room",
            "BPF_FUNC_skb_vlan_push",
            "BPF_FUNC_skb_vlan_pop",
            "BPF_FUNC_skb_get_tunnel_key",
            "BPF_FUNC_skb_set_tunnel_key",
            "BPF_FUNC_skb_get_tunnel_opt",
            "BPF_FUNC_skb_set_tunnel_opt",
            "BPF_FUNC_skb_ecn_set_ce",
            "BPF_FUNC_l3_csum_replace",
            "BPF_FUNC_l4_csum_replace",
            "BPF_FUNC_csum_diff",
            "BPF_FUNC_csum_update",
            "BPF_FUNC_csum_level",
            "BPF_FUNC_get_hash_recalc",
            "BPF_FUNC_set_hash",
            "BPF_FUNC_set_hash_invalid",
            "BPF_FUNC_get_route_realm",
            "BPF_FUNC_get_cgroup_classid",
            "BPF_FUNC_skb_cgroup_id",
            "BPF_FUNC_skb_ancestor_cgroup_id",
            "BPF_FUNC_skb_under_cgroup",
            "BPF_FUNC_redirect",
            "BPF_FUNC_redirect_map",
            "BPF_FUNC_clone_redirect",
            "BPF_FUNC_sk_redirect_map",
            "BPF_FUNC_sk_redirect_hash",
            "BPF_FUNC_perf_event_output",
            "BPF_FUNC_skb_output",
            "BPF_FUNC_get_socket_cookie",
            "BPF_FUNC_get_socket_uid",
            "BPF_FUNC_sk_fullsock",
            "BPF_FUNC_tcp_sock",
            "BPF_FUNC_get_listener_sock",
            "BPF_FUNC_tcp_check_syncookie",
            "BPF_FUNC_tcp_gen_syncookie",
            "BPF_FUNC_tcp_send_ack",
            "BPF_FUNC_fib_lookup",
            "BPF_FUNC_check_mtu",
            "BPF_FUNC_sk_storage_get",
            "BPF_FUNC_sk_storage_delete",
        ]);
        cat.add_prog_type(pt, &helpers)?;
        cat.set_ctx_access(name, skb_ctx_access());
    }

    // XDP
    let pt = ProgTypeDef::new(6, "xdp", "BPF_PROG_TYPE_XDP", "struct xdp_md", "struct xdp_buff")
        .sec(SecDef::plain("xdp"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SK_LOOKUP_REF);
    helpers.extend(SPIN_LOCK);
    helpers.extend(TIMERS);
    helpers.extend([
        "BPF_FUNC_xdp_adjust_head",
        "BPF_FUNC_xdp_adjust_tail",
        "BPF_FUNC_xdp_adjust_meta",
        "BPF_FUNC_xdp_output",
        "BPF_FUNC_redirect",
        "BPF_FUNC_redirect_map",
        "BPF_FUNC_perf_event_output",
        "BPF_FUNC_tcp_check_syncookie",
        "BPF_FUNC_tcp_gen_syncookie",
        "BPF_FUNC_fib_lookup",
        "BPF_FUNC_check_mtu",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "xdp",
        CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["data"])
            .project(RegType::PtrToPacketEnd, &["data_end"])
            .project(RegType::PtrToPacketMeta, &["data_meta"]),
    );

    // Kprobe
    let pt = ProgTypeDef::new(
        2,
        "kprobe",
        "BPF_PROG_TYPE_KPROBE",
        "struct bpf_user_pt_regs_t",
        "struct pt_regs",
    )
    .sec(SecDef::with_gen("kprobe/", SecNameGen::KernelSymbol))
    .sec(SecDef::with_gen("kretprobe/", SecNameGen::KernelSymbol));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(TRACING_COMMON);
    helpers.extend([
        "BPF_FUNC_override_return",
        "BPF_FUNC_get_func_ip",
        "BPF_FUNC_get_attach_cookie",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("kprobe", CtxAccess::read_all());

    // Tracepoint
    let pt = ProgTypeDef::new(5, "tracepoint", "BPF_PROG_TYPE_TRACEPOINT", "void", "void")
        .sec(SecDef::with_gen("tracepoint/", SecNameGen::TracepointEvent));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(TRACING_COMMON);
    helpers.push("BPF_FUNC_get_attach_cookie");
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("tracepoint", CtxAccess::read_all());

    // Perf event
    let pt = ProgTypeDef::new(
        7,
        "perf_event",
        "BPF_PROG_TYPE_PERF_EVENT",
        "struct bpf_perf_event_data",
        "struct bpf_perf_event_data_kern",
    )
    .sec(SecDef::plain("perf_event"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(TRACING_COMMON);
    helpers.extend(["BPF_FUNC_perf_prog_read_value", "BPF_FUNC_read_branch_records"]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("perf_event", CtxAccess::read_all());

    // Raw tracepoint
    let pt = ProgTypeDef::new(
        17,
        "raw_tracepoint",
        "BPF_PROG_TYPE_RAW_TRACEPOINT",
        "struct bpf_raw_tracepoint_args",
        "struct bpf_raw_tracepoint_args",
    )
    .sec(SecDef::with_gen("raw_tp/", SecNameGen::RawTracepointName));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(TRACING_COMMON);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("raw_tracepoint", CtxAccess::read_all());

    // Tracing (fentry/fexit), optionally sleepable
    let pt = ProgTypeDef::new(26, "tracing", "BPF_PROG_TYPE_TRACING", "void", "void")
        .sec(SecDef::with_gen("fentry/", SecNameGen::KernelSymbol))
        .sec(SecDef::with_gen("fexit/", SecNameGen::KernelSymbol))
        .sec(SecDef::with_gen("fentry.s/", SecNameGen::KernelSymbol).sleepable());
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(TRACING_COMMON);
    helpers.extend(SOCK_CASTS);
    helpers.extend(["BPF_FUNC_d_path", "BPF_FUNC_copy_from_user", "BPF_FUNC_get_func_ip"]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("tracing", CtxAccess::read_all());

    // Cgroup skb
    let pt = ProgTypeDef::new(
        8,
        "cgroup_skb",
        "BPF_PROG_TYPE_CGROUP_SKB",
        "struct __sk_buff",
        "struct sk_buff",
    )
    .sec(SecDef::plain("cgroup_skb/ingress"))
    .sec(SecDef::plain("cgroup_skb/egress"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SK_LOOKUP_REF);
    helpers.extend(SPIN_LOCK);
    helpers.extend([
        "BPF_FUNC_skb_load_bytes",
        "BPF_FUNC_skb_load_bytes_relative",
        "BPF_FUNC_get_local_storage",
        "BPF_FUNC_get_socket_cookie",
        "BPF_FUNC_get_netns_cookie",
        "BPF_FUNC_get_cgroup_classid",
        "BPF_FUNC_skb_cgroup_id",
        "BPF_FUNC_skb_ancestor_cgroup_id",
        "BPF_FUNC_sk_fullsock",
        "BPF_FUNC_tcp_sock",
        "BPF_FUNC_sk_storage_get",
        "BPF_FUNC_sk_storage_delete",
        "BPF_FUNC_perf_event_output",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("cgroup_skb", skb_ctx_access());

    // Sock ops
    let pt = ProgTypeDef::new(
        13,
        "sock_ops",
        "BPF_PROG_TYPE_SOCK_OPS",
        "struct bpf_sock_ops",
        "struct bpf_sock_ops_kern",
    )
    .sec(SecDef::plain("sockops"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SPIN_LOCK);
    helpers.extend([
        "BPF_FUNC_sock_map_update",
        "BPF_FUNC_sock_hash_update",
        "BPF_FUNC_sock_ops_cb_flags_set",
        "BPF_FUNC_load_hdr_opt",
        "BPF_FUNC_store_hdr_opt",
        "BPF_FUNC_reserve_hdr_opt",
        "BPF_FUNC_setsockopt",
        "BPF_FUNC_getsockopt",
        "BPF_FUNC_get_socket_cookie",
        "BPF_FUNC_get_netns_cookie",
        "BPF_FUNC_sk_storage_get",
        "BPF_FUNC_sk_storage_delete",
        "BPF_FUNC_perf_event_output",
        "BPF_FUNC_tcp_sock",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "sock_ops",
        CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["skb_data"])
            .project(RegType::PtrToPacketEnd, &["skb_data_end"])
            .project(RegType::PtrToSockCommon, &["sk"])
            .with_fields(AccessPolicy::RW, &["sk_txhash", "bpf_sock_ops_cb_flags"]),
    );

    // SK_MSG
    let pt = ProgTypeDef::new(
        16,
        "sk_msg",
        "BPF_PROG_TYPE_SK_MSG",
        "struct sk_msg_md",
        "struct sk_msg",
    )
    .sec(SecDef::plain("sk_msg"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend([
        "BPF_FUNC_msg_redirect_map",
        "BPF_FUNC_msg_redirect_hash",
        "BPF_FUNC_msg_apply_bytes",
        "BPF_FUNC_msg_cork_bytes",
        "BPF_FUNC_msg_pull_data",
        "BPF_FUNC_msg_push_data",
        "BPF_FUNC_msg_pop_data",
        "BPF_FUNC_get_current_pid_tgid",
        "BPF_FUNC_get_current_uid_gid",
        "BPF_FUNC_sk_storage_get",
        "BPF_FUNC_sk_storage_delete",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "sk_msg",
        CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["data"])
            .project(RegType::PtrToPacketEnd, &["data_end"])
            .project(RegType::PtrToSockCommon, &["sk"]),
    );

    // SK_SKB
    let pt = ProgTypeDef::new(
        14,
        "sk_skb",
        "BPF_PROG_TYPE_SK_SKB",
        "struct __sk_buff",
        "struct sk_buff",
    )
    .sec(SecDef::plain("sk_skb/stream_parser"))
    .sec(SecDef::plain("sk_skb/stream_verdict"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SK_LOOKUP_REF);
    helpers.extend([
        "BPF_FUNC_sk_redirect_map",
        "BPF_FUNC_sk_redirect_hash",
        "BPF_FUNC_skb_store_bytes",
        "BPF_FUNC_skb_load_bytes",
        "BPF_FUNC_skb_adjust_room",
        "BPF_FUNC_skb_change_tail",
        "BPF_FUNC_skb_change_head",
        "BPF_FUNC_skb_pull_data",
        "BPF_FUNC_get_socket_cookie",
        "BPF_FUNC_get_socket_uid",
        "BPF_FUNC_sk_fullsock",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access("sk_skb", skb_ctx_access());

    // Cgroup sock_addr
    let pt = ProgTypeDef::new(
        18,
        "cgroup_sock_addr",
        "BPF_PROG_TYPE_CGROUP_SOCK_ADDR",
        "struct bpf_sock_addr",
        "struct bpf_sock_addr_kern",
    )
    .sec(SecDef::plain("cgroup/bind4"))
    .sec(SecDef::plain("cgroup/bind6"))
    .sec(SecDef::plain("cgroup/connect4"))
    .sec(SecDef::plain("cgroup/connect6"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(RINGBUF);
    helpers.extend(SK_LOOKUP_REF);
    helpers.extend(SPIN_LOCK);
    helpers.extend([
        "BPF_FUNC_bind",
        "BPF_FUNC_get_local_storage",
        "BPF_FUNC_get_current_pid_tgid",
        "BPF_FUNC_get_current_uid_gid",
        "BPF_FUNC_get_current_comm",
        "BPF_FUNC_get_current_cgroup_id",
        "BPF_FUNC_get_netns_cookie",
        "BPF_FUNC_get_socket_cookie",
        "BPF_FUNC_sk_storage_get",
        "BPF_FUNC_sk_storage_delete",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "cgroup_sock_addr",
        CtxAccess::read_all()
            .project(RegType::PtrToSockCommon, &["sk"])
            .with_fields(
                AccessPolicy::RW,
                &["user_ip4", "user_ip6", "user_port", "msg_src_ip4", "msg_src_ip6"],
            ),
    );

    // Cgroup sysctl
    let pt = ProgTypeDef::new(
        23,
        "cgroup_sysctl",
        "BPF_PROG_TYPE_CGROUP_SYSCTL",
        "struct bpf_sysctl",
        "struct bpf_sysctl_kern",
    )
    .sec(SecDef::plain("cgroup/sysctl"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend([
        "BPF_FUNC_sysctl_get_name",
        "BPF_FUNC_sysctl_get_current_value",
        "BPF_FUNC_sysctl_get_new_value",
        "BPF_FUNC_sysctl_set_new_value",
        "BPF_FUNC_strtol",
        "BPF_FUNC_strtoul",
        "BPF_FUNC_get_local_storage",
        "BPF_FUNC_get_current_pid_tgid",
        "BPF_FUNC_get_current_uid_gid",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "cgroup_sysctl",
        CtxAccess::read_all().with_fields(AccessPolicy::RW, &["file_pos"]),
    );

    // Cgroup sockopt
    let pt = ProgTypeDef::new(
        25,
        "cgroup_sockopt",
        "BPF_PROG_TYPE_CGROUP_SOCKOPT",
        "struct bpf_sockopt",
        "struct bpf_sockopt_kern",
    )
    .sec(SecDef::plain("cgroup/getsockopt"))
    .sec(SecDef::plain("cgroup/setsockopt"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(SPIN_LOCK);
    helpers.extend([
        "BPF_FUNC_get_local_storage",
        "BPF_FUNC_get_netns_cookie",
        "BPF_FUNC_sk_storage_get",
        "BPF_FUNC_sk_storage_delete",
        "BPF_FUNC_tcp_sock",
        "BPF_FUNC_sk_fullsock",
    ]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "cgroup_sockopt",
        CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["optval"])
            .project(RegType::PtrToPacketEnd, &["optval_end"])
            .project(RegType::PtrToSockCommon, &["sk"])
            .with_fields(AccessPolicy::RW, &["optlen", "retval"]),
    );

    // SK_LOOKUP
    let pt = ProgTypeDef::new(
        30,
        "sk_lookup",
        "BPF_PROG_TYPE_SK_LOOKUP",
        "struct bpf_sk_lookup",
        "struct bpf_sk_lookup_kern",
    )
    .sec(SecDef::plain("sk_lookup"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(SK_LOOKUP_REF);
    helpers.push("BPF_FUNC_sk_assign");
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "sk_lookup",
        CtxAccess::read_all().project(RegType::PtrToSockCommon, &["sk"]),
    );

    // SK_REUSEPORT
    let pt = ProgTypeDef::new(
        21,
        "sk_reuseport",
        "BPF_PROG_TYPE_SK_REUSEPORT",
        "struct sk_reuseport_md",
        "struct sk_reuseport_kern",
    )
    .sec(SecDef::plain("sk_reuseport"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.extend(["BPF_FUNC_sk_select_reuseport", "BPF_FUNC_skb_load_bytes"]);
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "sk_reuseport",
        CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["data"])
            .project(RegType::PtrToPacketEnd, &["data_end"])
            .project(RegType::PtrToSockCommon, &["sk"]),
    );

    // Flow dissector
    let pt = ProgTypeDef::new(
        22,
        "flow_dissector",
        "BPF_PROG_TYPE_FLOW_DISSECTOR",
        "struct __sk_buff",
        "struct sk_buff",
    )
    .sec(SecDef::plain("flow_dissector"));
    let mut helpers: Vec<&str> = Vec::new();
    helpers.extend(MAP_OPS);
    helpers.extend(BASE);
    helpers.push("BPF_FUNC_skb_load_bytes");
    cat.add_prog_type(pt, &helpers)?;
    cat.set_ctx_access(
        "flow_dissector",
        skb_ctx_access()
            .project(RegType::PtrToFlowKeys, &["flow_keys"])
            .with_fields(AccessPolicy::RO, &["flow_keys"]),
    );

    // Lightweight tunnels
    for (num, name, enum_name, extra) in [
        (10, "lwt_in", "BPF_PROG_TYPE_LWT_IN", false),
        (12, "lwt_xmit", "BPF_PROG_TYPE_LWT_XMIT", true),
    ] {
        let pt = ProgTypeDef::new(num, name, enum_name, "struct __sk_buff", "struct sk_buff")
            .sec(SecDef::plain(if name == "lwt_in" { "lwt_in" } else { "lwt_xmit" }));
        let mut helpers: Vec<&str> = Vec::new();
        helpers.extend(MAP_OPS);
        helpers.extend(BASE);
        helpers.extend([
            "BPF_FUNC_skb_load_bytes",
            "BPF_FUNC_skb_pull_data",
            "BPF_FUNC_csum_diff",
            "BPF_FUNC_get_route_realm",
            "BPF_FUNC_get_cgroup_classid",
            "BPF_FUNC_perf_event_output",
            "BPF_FUNC_get_hash_recalc",
        ]);
        if extra {
            helpers.extend([
                "BPF_FUNC_skb_store_bytes",
                "BPF_FUNC_skb_change_head",
                "BPF_FUNC_redirect",
                "BPF_FUNC_clone_redirect",
                "BPF_FUNC_l3_csum_replace",
                "BPF_FUNC_l4_csum_replace",
                "BPF_FUNC_set_hash_invalid",
            ]);
        }
        cat.add_prog_type(pt, &helpers)?;
        cat.set_ctx_access(name, skb_ctx_access());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkt_classifications_disjoint() {
        for pt in [
            "BPF_PROG_TYPE_SCHED_CLS",
            "BPF_PROG_TYPE_XDP",
            "BPF_PROG_TYPE_SK_SKB",
        ] {
            assert!(pkt_ptr_read_write(pt));
            assert!(!pkt_ptr_read_only(pt));
        }
        assert!(pkt_ptr_read_only("BPF_PROG_TYPE_CGROUP_SKB"));
        assert!(pkt_ptr_read_write_no_check("BPF_PROG_TYPE_CGROUP_SOCKOPT"));
    }

    #[test]
    fn test_tracing_classification() {
        assert!(is_tracing_prog_type("BPF_PROG_TYPE_KPROBE"));
        assert!(!is_tracing_prog_type("BPF_PROG_TYPE_SCHED_CLS"));
        assert!(!is_tracing_prog_type("BPF_PROG_TYPE_TRACING"));
    }

    #[test]
    fn test_default_prog_types_install() {
        let cat = Catalog::linux();
        let cls = cat.prog_type("sched_cls").unwrap();
        assert!(cls.get_helper("BPF_FUNC_spin_lock").is_some());
        assert!(cls.get_helper("BPF_FUNC_sk_release").is_some());
        // Helper lists are deduplicated.
        let mut enums: Vec<&str> = cls.helpers.iter().map(|h| h.enum_name.as_str()).collect();
        let before = enums.len();
        enums.sort_unstable();
        enums.dedup();
        assert_eq!(before, enums.len());
        // Sleepable sections exist only where declared.
        let tracing = cat.prog_type("tracing").unwrap();
        assert!(tracing.sec_defs.iter().any(|s| s.sleepable));
        let xdp = cat.prog_type("xdp").unwrap();
        assert!(xdp.sec_defs.iter().all(|s| !s.sleepable));
    }
}
