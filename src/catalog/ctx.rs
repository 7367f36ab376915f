// SPDX-License-Identifier: GPL-2.0

//! Context struct layouts and per-program-type access tables.
//!
//! A context access table answers two questions during generation: which
//! context field projects to a wanted register class (`data` for
//! `PTR_TO_PACKET`, `sk` for `PTR_TO_SOCK_COMMON`, ...), and whether a field
//! may be read or written by this program type. Program types without a
//! known struct layout fall back to the catch-all default policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::RegType;

/// Layout of one context struct as the program sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtxStruct {
    /// Struct name without the `struct ` prefix, e.g. `__sk_buff`.
    pub name: String,
    /// Field names, in declaration order.
    pub field_names: Vec<String>,
    /// Field C types, parallel to `field_names`.
    pub field_types: Vec<String>,
    /// Total size in bytes.
    pub size: usize,
}

impl CtxStruct {
    fn new(name: &str, fields: &[(&str, &str)], size: usize) -> Self {
        CtxStruct {
            name: name.to_string(),
            field_names: fields.iter().map(|(n, _)| n.to_string()).collect(),
            field_types: fields.iter().map(|(_, t)| t.to_string()).collect(),
            size,
        }
    }

    /// Index of a field by name.
    pub fn field_idx(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == name)
    }
}

/// Read/write permission for one context field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Field may be read.
    pub can_read: bool,
    /// Field may be written.
    pub can_write: bool,
}

impl AccessPolicy {
    /// Read-only access.
    pub const RO: AccessPolicy = AccessPolicy { can_read: true, can_write: false };
    /// Read-write access.
    pub const RW: AccessPolicy = AccessPolicy { can_read: true, can_write: true };
    /// No access.
    pub const NONE: AccessPolicy = AccessPolicy { can_read: false, can_write: false };
}

/// Per-program-type context access table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtxAccess {
    /// Context fields projecting to a register class.
    pub projections: Vec<(RegType, Vec<String>)>,
    /// Per-field policies; fields not listed use the default.
    pub fields: BTreeMap<String, AccessPolicy>,
    /// Catch-all policy.
    pub default_policy: AccessPolicy,
}

impl CtxAccess {
    /// A table where every field is readable and nothing is writable.
    pub fn read_all() -> Self {
        CtxAccess {
            default_policy: AccessPolicy::RO,
            ..CtxAccess::default()
        }
    }

    /// Add a projection from a register class to context fields.
    pub fn project(mut self, reg: RegType, fields: &[&str]) -> Self {
        self.projections
            .push((reg, fields.iter().map(|f| f.to_string()).collect()));
        self
    }

    /// Set the policy of specific fields.
    pub fn with_fields(mut self, policy: AccessPolicy, fields: &[&str]) -> Self {
        for f in fields {
            self.fields.insert(f.to_string(), policy);
        }
        self
    }

    /// Candidate fields projecting to `reg`, if any.
    pub fn fields_for(&self, reg: RegType) -> Option<&[String]> {
        self.projections
            .iter()
            .find(|(r, _)| *r == reg)
            .map(|(_, fields)| fields.as_slice())
    }

    /// Effective policy of a field.
    pub fn policy(&self, field: &str) -> AccessPolicy {
        self.fields.get(field).copied().unwrap_or(self.default_policy)
    }
}

const U32: &str = "uint32_t";
const U64: &str = "uint64_t";
const I32: &str = "int32_t";
const U32X4: &str = "uint32_t [4]";
const VOIDP: &str = "void *";
const SOCKP: &str = "struct bpf_sock*";

/// The context struct layouts of the default catalogue.
pub fn default_ctx_structs() -> BTreeMap<String, CtxStruct> {
    let structs = [
        CtxStruct::new(
            "__sk_buff",
            &[
                ("len", U32),
                ("pkt_type", U32),
                ("mark", U32),
                ("queue_mapping", U32),
                ("protocol", U32),
                ("vlan_present", U32),
                ("vlan_tci", U32),
                ("vlan_proto", U32),
                ("priority", U32),
                ("ingress_ifindex", U32),
                ("ifindex", U32),
                ("tc_index", U32),
                ("cb", "uint32_t [5]"),
                ("hash", U32),
                ("tc_classid", U32),
                ("data", U32),
                ("data_end", U32),
                ("napi_id", U32),
                ("family", U32),
                ("remote_ip4", U32),
                ("local_ip4", U32),
                ("remote_ip6", U32X4),
                ("local_ip6", U32X4),
                ("remote_port", U32),
                ("local_port", U32),
                ("data_meta", U32),
                ("flow_keys", "struct bpf_flow_keys*"),
                ("tstamp", U64),
                ("wire_len", U32),
                ("gso_segs", U32),
                ("sk", SOCKP),
                ("gso_size", U32),
            ],
            180,
        ),
        CtxStruct::new(
            "xdp_md",
            &[
                ("data", U32),
                ("data_end", U32),
                ("data_meta", U32),
                ("ingress_ifindex", U32),
                ("rx_queue_index", U32),
                ("egress_ifindex", U32),
            ],
            24,
        ),
        CtxStruct::new(
            "bpf_sock_ops",
            &[
                ("op", U32),
                ("args", U32X4),
                ("family", U32),
                ("remote_ip4", U32),
                ("local_ip4", U32),
                ("remote_ip6", U32X4),
                ("local_ip6", U32X4),
                ("remote_port", U32),
                ("local_port", U32),
                ("is_fullsock", U32),
                ("snd_cwnd", U32),
                ("srtt_us", U32),
                ("bpf_sock_ops_cb_flags", U32),
                ("state", U32),
                ("rtt_min", U32),
                ("snd_ssthresh", U32),
                ("rcv_nxt", U32),
                ("snd_nxt", U32),
                ("snd_una", U32),
                ("mss_cache", U32),
                ("ecn_flags", U32),
                ("rate_delivered", U32),
                ("rate_interval_us", U32),
                ("packets_out", U32),
                ("retrans_out", U32),
                ("total_retrans", U32),
                ("segs_in", U32),
                ("data_segs_in", U32),
                ("segs_out", U32),
                ("data_segs_out", U32),
                ("lost_out", U32),
                ("sacked_out", U32),
                ("sk_txhash", U32),
                ("bytes_received", U64),
                ("bytes_acked", U64),
                ("sk", SOCKP),
                ("skb_data", VOIDP),
                ("skb_data_end", VOIDP),
                ("skb_len", U32),
                ("skb_tcp_flags", U32),
            ],
            216,
        ),
        CtxStruct::new(
            "sk_msg_md",
            &[
                ("data", VOIDP),
                ("data_end", VOIDP),
                ("family", U32),
                ("remote_ip4", U32),
                ("local_ip4", U32),
                ("remote_ip6", U32X4),
                ("local_ip6", U32X4),
                ("remote_port", U32),
                ("local_port", U32),
                ("size", U32),
                ("sk", SOCKP),
            ],
            80,
        ),
        CtxStruct::new(
            "sk_reuseport_md",
            &[
                ("data", VOIDP),
                ("data_end", VOIDP),
                ("len", U32),
                ("eth_protocol", U32),
                ("ip_protocol", U32),
                ("bind_inany", U32),
                ("hash", U32),
                ("sk", SOCKP),
                ("migrating_sk", SOCKP),
            ],
            52,
        ),
        CtxStruct::new(
            "bpf_sock_addr",
            &[
                ("user_family", U32),
                ("user_ip4", U32),
                ("user_ip6", U32X4),
                ("user_port", U32),
                ("family", U32),
                ("type", U32),
                ("protocol", U32),
                ("msg_src_ip4", U32),
                ("msg_src_ip6", U32X4),
                ("sk", SOCKP),
            ],
            68,
        ),
        CtxStruct::new(
            "bpf_sysctl",
            &[("write", U32), ("file_pos", U32)],
            8,
        ),
        CtxStruct::new(
            "bpf_sk_lookup",
            &[
                ("sk", SOCKP),
                ("family", U32),
                ("protocol", U32),
                ("remote_ip4", U32),
                ("remote_ip6", U32X4),
                ("remote_port", U32),
                ("local_ip4", U32),
                ("local_ip6", U32X4),
                ("local_port", U32),
            ],
            64,
        ),
        CtxStruct::new(
            "bpf_sockopt",
            &[
                ("sk", SOCKP),
                ("optval", VOIDP),
                ("optval_end", VOIDP),
                ("level", I32),
                ("optname", I32),
                ("optlen", I32),
                ("retval", I32),
            ],
            40,
        ),
        CtxStruct::new(
            "bpf_perf_event_data",
            &[
                ("regs", "struct bpf_user_pt_regs_t"),
                ("sample_period", U64),
                ("addr", U64),
            ],
            184,
        ),
        CtxStruct::new(
            "bpf_user_pt_regs_t",
            &[
                ("r15", U64),
                ("r14", U64),
                ("r13", U64),
                ("r12", U64),
                ("bp", U64),
                ("bx", U64),
                ("r11", U64),
                ("r10", U64),
                ("r9", U64),
                ("r8", U64),
                ("ax", U64),
                ("cx", U64),
                ("dx", U64),
                ("si", U64),
                ("di", U64),
                ("orig_ax", U64),
                ("ip", U64),
                ("cs", U64),
                ("flags", U64),
                ("sp", U64),
                ("ss", U64),
            ],
            168,
        ),
        CtxStruct::new("bpf_raw_tracepoint_args", &[("args", "uint64_t [0]")], 8),
        CtxStruct::new(
            "bpf_sock",
            &[
                ("bound_dev_if", U32),
                ("family", U32),
                ("type", U32),
                ("protocol", U32),
                ("mark", U32),
                ("priority", U32),
                ("src_ip4", U32),
                ("src_ip6", U32X4),
                ("src_port", U32),
                ("dst_port", U32),
                ("dst_ip4", U32),
                ("dst_ip6", U32X4),
                ("state", U32),
                ("rx_queue_mapping", I32),
            ],
            80,
        ),
    ];
    structs.into_iter().map(|s| (s.name.clone(), s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let structs = default_ctx_structs();
        let skb = &structs["__sk_buff"];
        assert_eq!(skb.field_idx("data"), Some(15));
        assert_eq!(skb.field_idx("sk"), Some(30));
        assert_eq!(skb.field_idx("nonexistent"), None);
    }

    #[test]
    fn test_policy_fallback() {
        let access = CtxAccess::read_all()
            .with_fields(AccessPolicy::RW, &["mark"])
            .with_fields(AccessPolicy::NONE, &["flow_keys"]);
        assert_eq!(access.policy("mark"), AccessPolicy::RW);
        assert_eq!(access.policy("flow_keys"), AccessPolicy::NONE);
        assert_eq!(access.policy("len"), AccessPolicy::RO);
    }

    #[test]
    fn test_projection_lookup() {
        let access = CtxAccess::read_all()
            .project(RegType::PtrToPacket, &["data"])
            .project(RegType::PtrToPacketEnd, &["data_end"]);
        assert_eq!(access.fields_for(RegType::PtrToPacket).unwrap()[0], "data");
        assert!(access.fields_for(RegType::PtrToSockCommon).is_none());
    }
}
