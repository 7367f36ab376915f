// SPDX-License-Identifier: GPL-2.0

//! Program state: the structured result of one generation run.
//!
//! A [`BpfProgState`] aggregates everything the C emitter needs: maps,
//! record layouts, the ordered helper call sequence, context variable
//! bindings and the program return value. Cross references between maps,
//! structs and calls are indices into the state's own lists, never
//! pointers, so the whole state serializes as a plain tree.

pub mod persist;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{HelperDef, ProgTypeDef, SecDef};
use crate::core::types::{
    ArgHints, ArgType, CallGenHint, FieldType, MapFlag, MapId, MapType, StructId,
};

/// A synthesized record layout used as a map key or value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    /// Emitted type name: `struct_<N>`, or the scalar C type for demoted
    /// single-field layouts.
    pub name: String,
    /// Field types in offset order; emitted as `e0, e1, ...`.
    pub fields: Vec<FieldType>,
    /// Total byte size; equals the sum of field sizes.
    pub size: usize,
    /// Special members this layout was built to contain.
    pub hints: ArgHints,
    /// False for a demoted single-scalar layout.
    pub is_struct: bool,
}

impl StructDef {
    /// Byte offset of field `idx`.
    pub fn offset_of(&self, idx: usize) -> usize {
        self.fields[..idx].iter().map(|f| f.size()).sum()
    }

    /// Index of the first field of type `ft`.
    pub fn find_field(&self, ft: FieldType) -> Option<usize> {
        self.fields.iter().position(|&f| f == ft)
    }

    /// Whether the layout contains a field of type `ft`.
    pub fn has_field(&self, ft: FieldType) -> bool {
        self.find_field(ft).is_some()
    }
}

/// A BPF map declared by the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpfMap {
    /// Map type tag.
    pub map_type: MapType,
    /// Creation flags, in emission order.
    pub flags: Vec<MapFlag>,
    /// Emitted name; equals `map_<index>`.
    pub name: String,
    /// Key layout, if the map has keys.
    pub key: Option<StructId>,
    /// Value layout, if the map has values.
    pub val: Option<StructId>,
    /// `max_entries` attribute.
    pub max_entries: i64,
    /// Inner map for map-of-maps types.
    pub inner: Option<MapId>,
}

impl BpfMap {
    /// Whether the map carries `flag`.
    pub fn has_flag(&self, flag: MapFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Add `flag` unless already present.
    pub fn add_flag(&mut self, flag: MapFlag) {
        if !self.has_flag(flag) {
            self.flags.push(flag);
        }
    }

    /// Remove `flag` if present.
    pub fn remove_flag(&mut self, flag: MapFlag) {
        self.flags.retain(|f| *f != flag);
    }

    /// The C expression for the `map_flags` attribute.
    pub fn flags_expr(&self) -> String {
        let mut expr = String::from("0");
        for f in &self.flags {
            expr.push_str(" | ");
            expr.push_str(f.c_name());
        }
        expr
    }
}

/// One argument of a helper call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpfArg {
    /// C expression passed in this slot.
    pub name: String,
    /// The slot's argument type tag.
    pub arg_type: ArgType,
    /// Declarations emitted before the call.
    pub prepare: String,
    /// The expression may evaluate to NULL and the helper tolerates it.
    pub can_be_null: bool,
    /// The expression is statically known non-null.
    pub is_not_null: bool,
    /// Lower bound the emitted guard must enforce.
    pub umin: Option<u64>,
    /// Upper bound the emitted guard must enforce.
    pub umax: Option<u64>,
    /// Argument dereferences packet data.
    pub is_pkt_access: bool,
    /// Argument dereferences packet metadata.
    pub is_pkt_meta_access: bool,
    /// Bytes the callee will access through this argument.
    pub access_size: usize,
}

impl BpfArg {
    /// Blank argument for slot `arg` of `helper`, with the slot's default
    /// nullability and integer range.
    pub fn for_slot(helper: &HelperDef, arg: usize) -> Self {
        let arg_type = helper.args[arg];
        let (umin, umax) = arg_type.initial_range();
        BpfArg {
            name: String::new(),
            arg_type,
            prepare: String::new(),
            can_be_null: arg_type.default_nullable(),
            is_not_null: false,
            umin,
            umax,
            is_pkt_access: false,
            is_pkt_meta_access: false,
            access_size: 0,
        }
    }

    /// A literal constant argument.
    pub fn constant(helper: &HelperDef, arg: usize, value: &str) -> Self {
        let mut a = BpfArg::for_slot(helper, arg);
        a.name = value.to_string();
        a.is_not_null = true;
        a
    }
}

/// Classification of a call's effect on kernel references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// Socket references (`sk_lookup_*`, `sk_release`).
    Socket,
    /// Ring buffer records (`ringbuf_reserve`, `ringbuf_submit/discard`).
    Ringbuf,
}

/// One helper invocation in the program's execution sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpfCall {
    /// The helper being invoked.
    pub helper: HelperDef,
    /// Arguments, filled in slot order.
    pub args: Vec<BpfArg>,
    /// Map bound to this call's `ARG_CONST_MAP_PTR` slot.
    pub arg_map: Option<MapId>,
    /// Name of the return variable, empty for void.
    pub ret: String,
    /// C type of the return variable, empty for void.
    pub ret_type: String,
    /// Size of the scratch buffer implied by a pointer-to-stack argument;
    /// a sibling size argument is clamped to it.
    pub stack_var_size: usize,
    /// Hint bundle this call was generated under.
    pub hint: CallGenHint,
    /// Calls emitted immediately after this one.
    pub post_calls: Vec<BpfCall>,
}

impl BpfCall {
    /// New call with no arguments resolved yet.
    pub fn new(helper: HelperDef, hint: CallGenHint) -> Self {
        BpfCall {
            helper,
            args: Vec::new(),
            arg_map: None,
            ret: String::new(),
            ret_type: String::new(),
            stack_var_size: 0,
            hint,
            post_calls: Vec::new(),
        }
    }

    /// Whether the call acquires a kernel reference, and of which kind.
    /// A `map_lookup_elem` acquires only when the map holds sockets.
    pub fn ref_acquire_kind(&self, maps: &[BpfMap]) -> Option<RefKind> {
        match self.helper.enum_name.as_str() {
            "BPF_FUNC_sk_lookup_tcp" | "BPF_FUNC_sk_lookup_udp" | "BPF_FUNC_skc_lookup_tcp" => {
                Some(RefKind::Socket)
            }
            "BPF_FUNC_map_lookup_elem" => match self.arg_map {
                Some(m) if maps[m].map_type.is_sock_storage() => Some(RefKind::Socket),
                _ => None,
            },
            "BPF_FUNC_ringbuf_reserve" => Some(RefKind::Ringbuf),
            _ => None,
        }
    }

    /// Whether the call releases a kernel reference, and of which kind.
    pub fn ref_release_kind(&self) -> Option<RefKind> {
        match self.helper.enum_name.as_str() {
            "BPF_FUNC_sk_release" => Some(RefKind::Socket),
            "BPF_FUNC_ringbuf_submit" | "BPF_FUNC_ringbuf_discard" => Some(RefKind::Ringbuf),
            _ => None,
        }
    }

    /// Whether the call propagates a reference into a new variable.
    pub fn ref_propagate_kind(&self) -> Option<RefKind> {
        match self.helper.enum_name.as_str() {
            "BPF_FUNC_tcp_sock"
            | "BPF_FUNC_sk_fullsock"
            | "BPF_FUNC_skc_to_tcp_sock"
            | "BPF_FUNC_skc_to_tcp6_sock"
            | "BPF_FUNC_skc_to_udp6_sock"
            | "BPF_FUNC_skc_to_tcp_timewait_sock"
            | "BPF_FUNC_skc_to_tcp_request_sock" => Some(RefKind::Socket),
            _ => None,
        }
    }

    /// Guard expressions the emitter must check before invoking the helper:
    /// packet bounds, non-null pointers and integer ranges.
    pub fn arg_constraints(&self, s: &BpfProgState) -> Vec<String> {
        let mut constraints = Vec::new();
        for arg in &self.args {
            if arg.is_pkt_meta_access {
                if let (Some(meta), Some(data)) = (s.ctx_vars.get("data_meta"), s.ctx_vars.get("data")) {
                    constraints.push(format!("{} + {} < {}", meta, arg.access_size, data));
                }
                continue;
            }
            if arg.is_pkt_access {
                if let (Some(data), Some(end)) = (s.ctx_vars.get("data"), s.ctx_vars.get("data_end")) {
                    constraints.push(format!("{} + {} < {}", data, arg.access_size, end));
                }
                continue;
            }
            if !arg.can_be_null && !arg.is_not_null {
                let start = arg.name.find('&').map(|i| i + 1).unwrap_or(0);
                let end = arg.name.find("->").unwrap_or(arg.name.len());
                constraints.push(arg.name[start..end].to_string());
                continue;
            }
            match arg.umin {
                Some(0) => constraints.push(format!(
                    "({} != 0 && ({} & 0x8000000000000000UL == 0))",
                    arg.name, arg.name
                )),
                Some(umin) => constraints.push(format!("{} > {}", arg.name, umin)),
                None => {}
            }
            if let Some(umax) = arg.umax {
                constraints.push(format!("{} < {}", arg.name, umax));
            }
        }
        constraints
    }
}

/// Attach options forwarded to the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachOption {
    /// First string option.
    pub str1: String,
    /// Second string option.
    pub str2: String,
    /// Integer option slots.
    pub int_opts: [i64; 8],
}

/// The structured result of one program generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpfProgState {
    /// Short program type name (`socket_filter`, ...).
    pub prog_type_name: String,
    /// Program type enum spelling (`BPF_PROG_TYPE_SOCKET_FILTER`, ...).
    pub prog_type_enum: String,
    /// User-visible context C type.
    pub ctx_type: String,
    /// Counter minting fresh `v<N>` variable names.
    pub var_id: u32,
    /// Declared maps; a map's name equals its positional index.
    pub maps: Vec<BpfMap>,
    /// Synthesized record layouts, referenced by index.
    pub structs: Vec<StructDef>,
    /// The execution sequence of helper calls.
    pub calls: Vec<BpfCall>,
    /// Extern declarations: name to C type.
    pub externs: BTreeMap<String, String>,
    /// Context field name to local variable name.
    pub ctx_vars: BTreeMap<String, String>,
    /// Context field name to local variable C type.
    pub ctx_types: BTreeMap<String, String>,
    /// The program's return value.
    pub ret_val: i64,
    /// Full section name including any generated attach point.
    pub sec_str: String,
    /// The chosen section descriptor.
    pub sec: SecDef,
    /// Path of the compiled object, once built.
    pub path: String,
    /// Loader attach options.
    pub attach_opt: AttachOption,
}

impl BpfProgState {
    /// Fresh state for a program type; return value and section are chosen
    /// by the driver.
    pub fn new(pt: &ProgTypeDef) -> Self {
        BpfProgState {
            prog_type_name: pt.name.clone(),
            prog_type_enum: pt.enum_name.clone(),
            ctx_type: pt.user.clone(),
            ..BpfProgState::default()
        }
    }

    /// Mint a fresh variable name.
    pub fn fresh_var(&mut self) -> String {
        let name = format!("v{}", self.var_id);
        self.var_id += 1;
        name
    }

    /// Look up a synthesized struct by emitted name.
    pub fn find_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|sd| sd.name == name)
    }

    /// Index of the first `ft` field in the struct named `name`.
    pub fn find_member(&self, name: &str, ft: FieldType) -> Option<usize> {
        self.find_struct(name).and_then(|sd| sd.find_field(ft))
    }

    /// Append a fully specified map (used by repair passes and tests).
    pub fn add_map(
        &mut self,
        map_type: MapType,
        flags: Vec<MapFlag>,
        key: Option<StructId>,
        val: Option<StructId>,
        max_entries: i64,
    ) -> MapId {
        let id = self.maps.len();
        self.maps.push(BpfMap {
            map_type,
            flags,
            name: format!("map_{id}"),
            key,
            val,
            max_entries,
            inner: None,
        });
        id
    }
}
