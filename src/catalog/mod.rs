// SPDX-License-Identifier: GPL-2.0

//! Immutable catalogues of BPF helpers, program types, context structs and
//! map types.
//!
//! The generator never consults the kernel; everything it knows about the
//! verifier's surface lives in a [`Catalog`] built once and passed by
//! reference to every entry point. The default catalogue
//! ([`Catalog::linux`]) describes a mainline kernel; tests build reduced
//! catalogues with only the helpers and program types under test.

pub mod compat;
pub mod ctx;
pub mod helper_db;
pub mod map_types;
pub mod prog_types;

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{GenError, Result};
use crate::core::types::{ArgType, MapType, RetType};

pub use ctx::{AccessPolicy, CtxAccess, CtxStruct};
pub use map_types::{MapTypeDef, MaxEntriesPolicy, SizeConstraint};

/// One BPF helper function, as scraped from the kernel's `bpf_func_proto`
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperDef {
    /// Numeric `BPF_FUNC_*` id.
    pub num: u32,
    /// Enum spelling, e.g. `BPF_FUNC_map_lookup_elem`.
    pub enum_name: String,
    /// Callable name without the `bpf_` prefix, e.g. `map_lookup_elem`.
    pub name: String,
    /// Prototype symbol, e.g. `bpf_map_lookup_elem_proto`.
    pub proto: String,
    /// Argument type tags, in order (0 to 5 of them).
    pub args: Vec<ArgType>,
    /// BTF type names for `ARG_PTR_TO_BTF_ID` slots.
    pub arg_btf_ids: Vec<String>,
    /// Return type tag.
    pub ret: RetType,
    /// BTF type name of the return, for `RET_PTR_TO_BTF_ID*`.
    pub ret_btf_id: String,
    /// Helper is restricted to GPL programs.
    pub gpl_only: bool,
    /// Helper reads or writes packet data.
    pub pkt_access: bool,
}

impl HelperDef {
    /// Create a helper definition; `name` and `proto` are derived from the
    /// enum spelling.
    pub fn new(num: u32, enum_name: &str, ret: RetType, args: &[ArgType]) -> Self {
        let name = enum_name.strip_prefix("BPF_FUNC_").unwrap_or(enum_name).to_string();
        HelperDef {
            num,
            enum_name: enum_name.to_string(),
            proto: format!("bpf_{name}_proto"),
            name,
            args: args.to_vec(),
            arg_btf_ids: Vec::new(),
            ret,
            ret_btf_id: String::new(),
            gpl_only: false,
            pkt_access: false,
        }
    }

    /// Mark GPL-only.
    pub fn gpl(mut self) -> Self {
        self.gpl_only = true;
        self
    }

    /// Mark as packet-accessing.
    pub fn pkt(mut self) -> Self {
        self.pkt_access = true;
        self
    }

    /// Set the BTF type of the return value.
    pub fn ret_btf(mut self, ty: &str) -> Self {
        self.ret_btf_id = ty.to_string();
        self
    }

    /// Append a BTF type for the next `ARG_PTR_TO_BTF_ID` slot.
    pub fn arg_btf(mut self, ty: &str) -> Self {
        self.arg_btf_ids.push(ty.to_string());
        self
    }

    /// Build a helper from a parsed attribute map with keys `proto`, `func`,
    /// `ret_type`, `gpl_only` and `arg1_type` .. `arg5_type`.
    pub fn from_attrs(num: u32, attrs: &BTreeMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| -> Result<&String> {
            attrs.get(key).ok_or_else(|| GenError::BadCatalogAttr {
                key: key.to_string(),
                value: "<missing>".to_string(),
            })
        };
        let func = lookup("func")?;
        let name = func.strip_prefix("bpf_").unwrap_or(func).to_string();
        let ret_name = lookup("ret_type")?;
        let ret = RetType::from_name(ret_name).ok_or_else(|| GenError::BadCatalogAttr {
            key: "ret_type".to_string(),
            value: ret_name.clone(),
        })?;
        let mut args = Vec::new();
        for i in 1..=5 {
            let key = format!("arg{i}_type");
            if let Some(v) = attrs.get(&key) {
                let arg = ArgType::from_name(v).ok_or_else(|| GenError::BadCatalogAttr {
                    key,
                    value: v.clone(),
                })?;
                args.push(arg);
            }
        }
        Ok(HelperDef {
            num,
            enum_name: format!("BPF_FUNC_{name}"),
            name,
            proto: lookup("proto")?.clone(),
            args,
            arg_btf_ids: Vec::new(),
            ret,
            ret_btf_id: String::new(),
            gpl_only: attrs.get("gpl_only").map(String::as_str) == Some("true"),
            pkt_access: false,
        })
    }
}

/// How to derive the attach-point suffix of a section name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecNameGen {
    /// A random kernel function symbol (kprobe/fentry style).
    KernelSymbol,
    /// A random `category/event` tracepoint name.
    TracepointEvent,
    /// A random raw tracepoint name.
    RawTracepointName,
}

static KERNEL_SYMBOLS: &[&str] = &[
    "__x64_sys_openat",
    "__x64_sys_read",
    "__x64_sys_write",
    "__x64_sys_close",
    "__x64_sys_mmap",
    "do_sys_openat2",
    "vfs_read",
    "tcp_v4_connect",
];

static TRACEPOINT_EVENTS: &[&str] = &[
    "syscalls/sys_enter_openat",
    "syscalls/sys_exit_openat",
    "syscalls/sys_enter_read",
    "sched/sched_switch",
    "sched/sched_process_exec",
    "net/net_dev_queue",
];

static RAW_TRACEPOINT_NAMES: &[&str] = &["sys_enter", "sys_exit", "sched_switch", "task_newtask"];

impl SecNameGen {
    /// Pick a suffix for the section name.
    pub fn generate(self, r: &mut impl Rng) -> String {
        let pool = match self {
            SecNameGen::KernelSymbol => KERNEL_SYMBOLS,
            SecNameGen::TracepointEvent => TRACEPOINT_EVENTS,
            SecNameGen::RawTracepointName => RAW_TRACEPOINT_NAMES,
        };
        pool[r.random_range(0..pool.len())].to_string()
    }
}

/// One ELF section a program type can attach through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecDef {
    /// Section prefix, e.g. `kprobe/` or `socket`.
    pub sec: String,
    /// Optional suffix generator for the attach point.
    pub name_gen: Option<SecNameGen>,
    /// Whether programs in this section run sleepable.
    pub sleepable: bool,
}

impl SecDef {
    /// A plain section with a fixed name.
    pub fn plain(sec: &str) -> Self {
        SecDef {
            sec: sec.to_string(),
            name_gen: None,
            sleepable: false,
        }
    }

    /// A section whose attach point is generated.
    pub fn with_gen(sec: &str, name_gen: SecNameGen) -> Self {
        SecDef {
            sec: sec.to_string(),
            name_gen: Some(name_gen),
            sleepable: false,
        }
    }

    /// Mark the section sleepable.
    pub fn sleepable(mut self) -> Self {
        self.sleepable = true;
        self
    }
}

/// One BPF program type: its context type, its attachable sections and the
/// helpers it may call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgTypeDef {
    /// Short name used in seed file paths, e.g. `socket_filter`.
    pub name: String,
    /// User-visible context C type, e.g. `struct __sk_buff`.
    pub user: String,
    /// Kernel-side context C type, e.g. `struct sk_buff`.
    pub kern: String,
    /// Enum spelling, e.g. `BPF_PROG_TYPE_SOCKET_FILTER`.
    pub enum_name: String,
    /// Numeric `BPF_PROG_TYPE_*` value.
    pub num: u32,
    /// Attachable sections.
    pub sec_defs: Vec<SecDef>,
    /// Helpers this program type may call, deduplicated.
    pub helpers: Vec<HelperDef>,
}

impl ProgTypeDef {
    /// Create a program type with no helpers resolved yet.
    pub fn new(num: u32, name: &str, enum_name: &str, user: &str, kern: &str) -> Self {
        ProgTypeDef {
            name: name.to_string(),
            user: user.to_string(),
            kern: kern.to_string(),
            enum_name: enum_name.to_string(),
            num,
            sec_defs: Vec::new(),
            helpers: Vec::new(),
        }
    }

    /// Add an attachable section.
    pub fn sec(mut self, sec: SecDef) -> Self {
        self.sec_defs.push(sec);
        self
    }

    /// Find a helper by enum name.
    pub fn get_helper(&self, enum_name: &str) -> Option<&HelperDef> {
        self.helpers.iter().find(|h| h.enum_name == enum_name)
    }

    /// Collect the subset of this type's helpers matching `enums`.
    pub fn get_helpers(&self, enums: &[&str]) -> Vec<&HelperDef> {
        self.helpers
            .iter()
            .filter(|h| enums.contains(&h.enum_name.as_str()))
            .collect()
    }

    /// Name of the user context struct, without the `struct ` prefix.
    pub fn ctx_struct_name(&self) -> Option<&str> {
        self.user.strip_prefix("struct ")
    }
}

/// The immutable catalogue handed to every generator entry point.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Helpers keyed by enum name.
    pub helpers: BTreeMap<String, HelperDef>,
    /// Program types keyed by short name.
    pub prog_types: BTreeMap<String, ProgTypeDef>,
    /// Context access tables keyed by program type short name.
    pub ctx_access: BTreeMap<String, CtxAccess>,
    /// Context struct layouts keyed by struct name.
    pub ctx_structs: BTreeMap<String, CtxStruct>,
    /// Map type descriptors; the numeric map type enum is index + 1.
    pub map_types: Vec<MapTypeDef>,
}

impl Catalog {
    /// An empty catalogue.
    pub fn new() -> Self {
        Catalog::default()
    }

    /// The default catalogue describing a mainline Linux kernel.
    pub fn linux() -> Self {
        let mut cat = Catalog {
            map_types: map_types::default_map_types(),
            ctx_structs: ctx::default_ctx_structs(),
            ..Catalog::default()
        };
        for h in helper_db::default_helpers() {
            cat.add_helper(h);
        }
        prog_types::install_default_prog_types(&mut cat)
            .expect("default catalogue must be self-consistent");
        cat
    }

    /// Register a helper.
    pub fn add_helper(&mut self, h: HelperDef) {
        self.helpers.insert(h.enum_name.clone(), h);
    }

    /// Register a program type, resolving `helper_enums` against the helper
    /// table. Unknown enums are logical bugs and abort with the missing key.
    pub fn add_prog_type(&mut self, mut pt: ProgTypeDef, helper_enums: &[&str]) -> Result<()> {
        for e in helper_enums {
            let h = self
                .helpers
                .get(*e)
                .ok_or_else(|| GenError::UnknownHelper((*e).to_string()))?;
            if pt.get_helper(e).is_none() {
                pt.helpers.push(h.clone());
            }
        }
        self.prog_types.insert(pt.name.clone(), pt);
        Ok(())
    }

    /// Register a context access table for a program type.
    pub fn set_ctx_access(&mut self, prog_type: &str, access: CtxAccess) {
        self.ctx_access.insert(prog_type.to_string(), access);
    }

    /// Register a context struct layout.
    pub fn add_ctx_struct(&mut self, cs: CtxStruct) {
        self.ctx_structs.insert(cs.name.clone(), cs);
    }

    /// Look up a helper; a miss names the missing key.
    pub fn helper(&self, enum_name: &str) -> Result<&HelperDef> {
        self.helpers
            .get(enum_name)
            .ok_or_else(|| GenError::UnknownHelper(enum_name.to_string()))
    }

    /// Look up a program type; a miss names the missing key.
    pub fn prog_type(&self, name: &str) -> Result<&ProgTypeDef> {
        self.prog_types
            .get(name)
            .ok_or_else(|| GenError::UnknownProgType(name.to_string()))
    }

    /// Context access table for a program type, if any.
    pub fn ctx_access_for(&self, prog_type: &str) -> Option<&CtxAccess> {
        self.ctx_access.get(prog_type)
    }

    /// Context struct layout for a program type's user context, if known.
    pub fn ctx_struct_for(&self, pt: &ProgTypeDef) -> Option<&CtxStruct> {
        pt.ctx_struct_name().and_then(|n| self.ctx_structs.get(n))
    }

    /// Map type descriptor for a map type tag.
    pub fn map_type_def(&self, map_type: MapType) -> Option<&MapTypeDef> {
        self.map_types.iter().find(|mt| mt.map_type == map_type)
    }

    /// Translate a numeric program type value to its enum spelling.
    pub fn prog_type_enum_to_string(&self, num: u32) -> Option<&str> {
        self.prog_types
            .values()
            .find(|pt| pt.num == num)
            .map(|pt| pt.enum_name.as_str())
    }

    /// Translate a numeric helper id, within a program type, to its enum
    /// spelling.
    pub fn helper_enum_to_string(&self, pt_num: u32, helper_num: u32) -> Option<&str> {
        let pt = self.prog_types.values().find(|pt| pt.num == pt_num)?;
        pt.helpers
            .iter()
            .find(|h| h.num == helper_num)
            .map(|h| h.enum_name.as_str())
    }

    /// Translate a numeric map type value (index + 1) to its spelling.
    pub fn map_type_enum_to_string(&self, num: usize) -> Option<&str> {
        if num == 0 {
            return None;
        }
        self.map_types.get(num - 1).map(|mt| mt.map_type.c_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_from_attrs() {
        let mut attrs = BTreeMap::new();
        attrs.insert("proto".to_string(), "bpf_map_lookup_elem_proto".to_string());
        attrs.insert("func".to_string(), "bpf_map_lookup_elem".to_string());
        attrs.insert("ret_type".to_string(), "RET_PTR_TO_MAP_VALUE_OR_NULL".to_string());
        attrs.insert("gpl_only".to_string(), "false".to_string());
        attrs.insert("arg1_type".to_string(), "ARG_CONST_MAP_PTR".to_string());
        attrs.insert("arg2_type".to_string(), "ARG_PTR_TO_MAP_KEY".to_string());

        let h = HelperDef::from_attrs(1, &attrs).unwrap();
        assert_eq!(h.enum_name, "BPF_FUNC_map_lookup_elem");
        assert_eq!(h.args, vec![ArgType::ConstMapPtr, ArgType::PtrToMapKey]);
        assert_eq!(h.ret, RetType::PtrToMapValueOrNull);
        assert!(!h.gpl_only);
    }

    #[test]
    fn test_helper_from_attrs_bad_ret() {
        let mut attrs = BTreeMap::new();
        attrs.insert("proto".to_string(), "p".to_string());
        attrs.insert("func".to_string(), "bpf_x".to_string());
        attrs.insert("ret_type".to_string(), "RET_NOT_A_TYPE".to_string());
        assert!(HelperDef::from_attrs(0, &attrs).is_err());
    }

    #[test]
    fn test_add_prog_type_unknown_helper() {
        let mut cat = Catalog::new();
        let pt = ProgTypeDef::new(1, "socket_filter", "BPF_PROG_TYPE_SOCKET_FILTER", "struct __sk_buff", "struct sk_buff");
        let err = cat.add_prog_type(pt, &["BPF_FUNC_nonexistent"]).unwrap_err();
        assert!(matches!(err, GenError::UnknownHelper(_)));
    }

    #[test]
    fn test_linux_catalog_is_consistent() {
        let cat = Catalog::linux();
        assert!(!cat.prog_types.is_empty());
        assert_eq!(cat.map_types.len(), 29);
        // Every helper referenced by a program type resolves in the table.
        for pt in cat.prog_types.values() {
            for h in &pt.helpers {
                assert!(cat.helpers.contains_key(&h.enum_name), "{}", h.enum_name);
            }
            assert!(!pt.sec_defs.is_empty(), "{} has no sections", pt.name);
        }
        // Numeric map type values follow catalogue order.
        assert_eq!(cat.map_type_enum_to_string(1), Some("BPF_MAP_TYPE_HASH"));
        assert_eq!(cat.map_type_enum_to_string(27), Some("BPF_MAP_TYPE_RINGBUF"));
    }
}
