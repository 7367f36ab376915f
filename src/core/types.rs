// SPDX-License-Identifier: GPL-2.0

//! Core type tags for BPF program generation.
//!
//! Every classification the kernel verifier cares about is modeled as a
//! closed enum: helper argument types, helper return types, register types,
//! map types, map flags, and record field types. The string forms are the
//! kernel's own spellings, so catalogue data parsed from kernel source can
//! be converted losslessly.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Helper argument type tags (`ARG_*` in the kernel).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgType {
    Anything,
    ConstSize,
    ConstSizeOrZero,
    ConstAllocSizeOrZero,
    ConstMapPtr,
    PtrToMapKey,
    PtrToMapValue,
    PtrToUninitMapValue,
    PtrToMapValueOrNull,
    PtrToCtx,
    PtrToCtxOrNull,
    PtrToSockCommon,
    PtrToBtfIdSockCommon,
    PtrToSocket,
    PtrToSocketOrNull,
    PtrToBtfId,
    PtrToSpinLock,
    PtrToMem,
    PtrToMemOrNull,
    PtrToUninitMem,
    PtrToAllocMem,
    PtrToAllocMemOrNull,
    PtrToInt,
    PtrToLong,
    PtrToPercpuBtfId,
    PtrToFunc,
    PtrToStackOrNull,
    PtrToConstStr,
    PtrToTimer,
}

impl ArgType {
    /// The kernel's name for this tag.
    pub fn name(self) -> &'static str {
        match self {
            ArgType::Anything => "ARG_ANYTHING",
            ArgType::ConstSize => "ARG_CONST_SIZE",
            ArgType::ConstSizeOrZero => "ARG_CONST_SIZE_OR_ZERO",
            ArgType::ConstAllocSizeOrZero => "ARG_CONST_ALLOC_SIZE_OR_ZERO",
            ArgType::ConstMapPtr => "ARG_CONST_MAP_PTR",
            ArgType::PtrToMapKey => "ARG_PTR_TO_MAP_KEY",
            ArgType::PtrToMapValue => "ARG_PTR_TO_MAP_VALUE",
            ArgType::PtrToUninitMapValue => "ARG_PTR_TO_UNINIT_MAP_VALUE",
            ArgType::PtrToMapValueOrNull => "ARG_PTR_TO_MAP_VALUE_OR_NULL",
            ArgType::PtrToCtx => "ARG_PTR_TO_CTX",
            ArgType::PtrToCtxOrNull => "ARG_PTR_TO_CTX_OR_NULL",
            ArgType::PtrToSockCommon => "ARG_PTR_TO_SOCK_COMMON",
            ArgType::PtrToBtfIdSockCommon => "ARG_PTR_TO_BTF_ID_SOCK_COMMON",
            ArgType::PtrToSocket => "ARG_PTR_TO_SOCKET",
            ArgType::PtrToSocketOrNull => "ARG_PTR_TO_SOCKET_OR_NULL",
            ArgType::PtrToBtfId => "ARG_PTR_TO_BTF_ID",
            ArgType::PtrToSpinLock => "ARG_PTR_TO_SPIN_LOCK",
            ArgType::PtrToMem => "ARG_PTR_TO_MEM",
            ArgType::PtrToMemOrNull => "ARG_PTR_TO_MEM_OR_NULL",
            ArgType::PtrToUninitMem => "ARG_PTR_TO_UNINIT_MEM",
            ArgType::PtrToAllocMem => "ARG_PTR_TO_ALLOC_MEM",
            ArgType::PtrToAllocMemOrNull => "ARG_PTR_TO_ALLOC_MEM_OR_NULL",
            ArgType::PtrToInt => "ARG_PTR_TO_INT",
            ArgType::PtrToLong => "ARG_PTR_TO_LONG",
            ArgType::PtrToPercpuBtfId => "ARG_PTR_TO_PERCPU_BTF_ID",
            ArgType::PtrToFunc => "ARG_PTR_TO_FUNC",
            ArgType::PtrToStackOrNull => "ARG_PTR_TO_STACK_OR_NULL",
            ArgType::PtrToConstStr => "ARG_PTR_TO_CONST_STR",
            ArgType::PtrToTimer => "ARG_PTR_TO_TIMER",
        }
    }

    /// Parse a kernel `ARG_*` spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_ARG_TYPES.iter().copied().find(|t| t.name() == name)
    }

    /// Whether this is one of the constant-size tags whose emitted value
    /// must agree with a sibling buffer.
    pub fn is_const_size(self) -> bool {
        matches!(self, ArgType::ConstSize | ArgType::ConstSizeOrZero)
    }

    /// Whether the slot accepts an uninitialized buffer (the helper writes).
    pub fn is_uninit(self) -> bool {
        matches!(self, ArgType::PtrToUninitMapValue | ArgType::PtrToUninitMem)
    }

    /// Whether a NULL may be passed in this slot.
    ///
    /// Constant tags keep the default; of the `*_OR_NULL` pointer tags the
    /// verifier special-cases map values, which stay non-null here.
    pub fn default_nullable(self) -> bool {
        match self {
            ArgType::ConstSize
            | ArgType::ConstSizeOrZero
            | ArgType::ConstAllocSizeOrZero
            | ArgType::ConstMapPtr => true,
            ArgType::PtrToCtxOrNull
            | ArgType::PtrToSocketOrNull
            | ArgType::PtrToMemOrNull
            | ArgType::PtrToAllocMemOrNull
            | ArgType::PtrToStackOrNull => true,
            _ => false,
        }
    }

    /// Initial unsigned range for the slot, `(umin, umax)`.
    pub fn initial_range(self) -> (Option<u64>, Option<u64>) {
        match self {
            ArgType::ConstSize => (Some(0), Some(1 << 29)),
            ArgType::ConstSizeOrZero => (None, Some(1 << 29)),
            _ => (None, None),
        }
    }
}

/// All argument tags, in a fixed order usable for parsing.
pub static ALL_ARG_TYPES: &[ArgType] = &[
    ArgType::Anything,
    ArgType::ConstSize,
    ArgType::ConstSizeOrZero,
    ArgType::ConstAllocSizeOrZero,
    ArgType::ConstMapPtr,
    ArgType::PtrToMapKey,
    ArgType::PtrToMapValue,
    ArgType::PtrToUninitMapValue,
    ArgType::PtrToMapValueOrNull,
    ArgType::PtrToCtx,
    ArgType::PtrToCtxOrNull,
    ArgType::PtrToSockCommon,
    ArgType::PtrToBtfIdSockCommon,
    ArgType::PtrToSocket,
    ArgType::PtrToSocketOrNull,
    ArgType::PtrToBtfId,
    ArgType::PtrToSpinLock,
    ArgType::PtrToMem,
    ArgType::PtrToMemOrNull,
    ArgType::PtrToUninitMem,
    ArgType::PtrToAllocMem,
    ArgType::PtrToAllocMemOrNull,
    ArgType::PtrToInt,
    ArgType::PtrToLong,
    ArgType::PtrToPercpuBtfId,
    ArgType::PtrToFunc,
    ArgType::PtrToStackOrNull,
    ArgType::PtrToConstStr,
    ArgType::PtrToTimer,
];

/// Helper return type tags (`RET_*` in the kernel).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetType {
    Integer,
    Void,
    PtrToMapValue,
    PtrToMapValueOrNull,
    PtrToSocketOrNull,
    PtrToTcpSockOrNull,
    PtrToSockCommonOrNull,
    PtrToAllocMemOrNull,
    PtrToBtfIdOrNull,
    PtrToMemOrBtfIdOrNull,
    PtrToMemOrBtfId,
    PtrToBtfId,
}

/// All return tags, in a fixed order usable for parsing.
pub static ALL_RET_TYPES: &[RetType] = &[
    RetType::Integer,
    RetType::Void,
    RetType::PtrToMapValue,
    RetType::PtrToMapValueOrNull,
    RetType::PtrToSocketOrNull,
    RetType::PtrToTcpSockOrNull,
    RetType::PtrToSockCommonOrNull,
    RetType::PtrToAllocMemOrNull,
    RetType::PtrToBtfIdOrNull,
    RetType::PtrToMemOrBtfIdOrNull,
    RetType::PtrToMemOrBtfId,
    RetType::PtrToBtfId,
];

impl RetType {
    /// The kernel's name for this tag.
    pub fn name(self) -> &'static str {
        match self {
            RetType::Integer => "RET_INTEGER",
            RetType::Void => "RET_VOID",
            RetType::PtrToMapValue => "RET_PTR_TO_MAP_VALUE",
            RetType::PtrToMapValueOrNull => "RET_PTR_TO_MAP_VALUE_OR_NULL",
            RetType::PtrToSocketOrNull => "RET_PTR_TO_SOCKET_OR_NULL",
            RetType::PtrToTcpSockOrNull => "RET_PTR_TO_TCP_SOCK_OR_NULL",
            RetType::PtrToSockCommonOrNull => "RET_PTR_TO_SOCK_COMMON_OR_NULL",
            RetType::PtrToAllocMemOrNull => "RET_PTR_TO_ALLOC_MEM_OR_NULL",
            RetType::PtrToBtfIdOrNull => "RET_PTR_TO_BTF_ID_OR_NULL",
            RetType::PtrToMemOrBtfIdOrNull => "RET_PTR_TO_MEM_OR_BTF_ID_OR_NULL",
            RetType::PtrToMemOrBtfId => "RET_PTR_TO_MEM_OR_BTF_ID",
            RetType::PtrToBtfId => "RET_PTR_TO_BTF_ID",
        }
    }

    /// Parse a kernel `RET_*` spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_RET_TYPES.iter().copied().find(|t| t.name() == name)
    }

    /// Whether the return is a map value pointer (nullable or not).
    pub fn is_map_value(self) -> bool {
        matches!(self, RetType::PtrToMapValue | RetType::PtrToMapValueOrNull)
    }
}

/// The verifier's static register classification.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegType {
    Scalar,
    PtrToCtx,
    ConstPtrToMap,
    PtrToMapValue,
    PtrToStack,
    PtrToPacket,
    PtrToPacketMeta,
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
}

impl RegType {
    /// The verifier's name for this register class.
    pub fn name(self) -> &'static str {
        match self {
            RegType::Scalar => "SCALAR_VALUE",
            RegType::PtrToCtx => "PTR_TO_CTX",
            RegType::ConstPtrToMap => "CONST_PTR_TO_MAP",
            RegType::PtrToMapValue => "PTR_TO_MAP_VALUE",
            RegType::PtrToStack => "PTR_TO_STACK",
            RegType::PtrToPacket => "PTR_TO_PACKET",
            RegType::PtrToPacketMeta => "PTR_TO_PACKET_META",
            RegType::PtrToPacketEnd => "PTR_TO_PACKET_END",
            RegType::PtrToFlowKeys => "PTR_TO_FLOW_KEYS",
            RegType::PtrToSocket => "PTR_TO_SOCKET",
            RegType::PtrToSockCommon => "PTR_TO_SOCK_COMMON",
            RegType::PtrToTcpSock => "PTR_TO_TCP_SOCK",
            RegType::PtrToTpBuffer => "PTR_TO_TP_BUFFER",
            RegType::PtrToXdpSock => "PTR_TO_XDP_SOCK",
            RegType::PtrToBtfId => "PTR_TO_BTF_ID",
            RegType::PtrToAllocMem => "PTR_TO_ALLOC_MEM",
            RegType::PtrToRdonlyBuf => "PTR_TO_RDONLY_BUF",
            RegType::PtrToRdwrBuf => "PTR_TO_RDWR_BUF",
            RegType::PtrToPercpuBtfId => "PTR_TO_PERCPU_BTF_ID",
            RegType::PtrToFunc => "PTR_TO_FUNC",
            RegType::PtrToMapKey => "PTR_TO_MAP_KEY",
        }
    }

    /// Whether this class is a pointer.
    pub fn is_ptr(self) -> bool {
        self != RegType::Scalar
    }

    /// Whether this class points into packet data.
    pub fn is_pkt(self) -> bool {
        matches!(self, RegType::PtrToPacket | RegType::PtrToPacketMeta)
    }
}

/// BPF map types, in the order of the map-type catalogue.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapType {
    Hash,
    Array,
    ProgArray,
    PerfEventArray,
    PercpuHash,
    PercpuArray,
    StackTrace,
    CgroupArray,
    LruHash,
    LruPercpuHash,
    LpmTrie,
    ArrayOfMaps,
    HashOfMaps,
    Devmap,
    Sockmap,
    Cpumap,
    Xskmap,
    Sockhash,
    CgroupStorage,
    ReuseportSockarray,
    PercpuCgroupStorage,
    Queue,
    Stack,
    SkStorage,
    DevmapHash,
    StructOps,
    Ringbuf,
    InodeStorage,
    TaskStorage,
}

impl MapType {
    /// The `BPF_MAP_TYPE_*` spelling.
    pub fn c_name(self) -> &'static str {
        match self {
            MapType::Hash => "BPF_MAP_TYPE_HASH",
            MapType::Array => "BPF_MAP_TYPE_ARRAY",
            MapType::ProgArray => "BPF_MAP_TYPE_PROG_ARRAY",
            MapType::PerfEventArray => "BPF_MAP_TYPE_PERF_EVENT_ARRAY",
            MapType::PercpuHash => "BPF_MAP_TYPE_PERCPU_HASH",
            MapType::PercpuArray => "BPF_MAP_TYPE_PERCPU_ARRAY",
            MapType::StackTrace => "BPF_MAP_TYPE_STACK_TRACE",
            MapType::CgroupArray => "BPF_MAP_TYPE_CGROUP_ARRAY",
            MapType::LruHash => "BPF_MAP_TYPE_LRU_HASH",
            MapType::LruPercpuHash => "BPF_MAP_TYPE_LRU_PERCPU_HASH",
            MapType::LpmTrie => "BPF_MAP_TYPE_LPM_TRIE",
            MapType::ArrayOfMaps => "BPF_MAP_TYPE_ARRAY_OF_MAPS",
            MapType::HashOfMaps => "BPF_MAP_TYPE_HASH_OF_MAPS",
            MapType::Devmap => "BPF_MAP_TYPE_DEVMAP",
            MapType::Sockmap => "BPF_MAP_TYPE_SOCKMAP",
            MapType::Cpumap => "BPF_MAP_TYPE_CPUMAP",
            MapType::Xskmap => "BPF_MAP_TYPE_XSKMAP",
            MapType::Sockhash => "BPF_MAP_TYPE_SOCKHASH",
            MapType::CgroupStorage => "BPF_MAP_TYPE_CGROUP_STORAGE",
            MapType::ReuseportSockarray => "BPF_MAP_TYPE_REUSEPORT_SOCKARRAY",
            MapType::PercpuCgroupStorage => "BPF_MAP_TYPE_PERCPU_CGROUP_STORAGE",
            MapType::Queue => "BPF_MAP_TYPE_QUEUE",
            MapType::Stack => "BPF_MAP_TYPE_STACK",
            MapType::SkStorage => "BPF_MAP_TYPE_SK_STORAGE",
            MapType::DevmapHash => "BPF_MAP_TYPE_DEVMAP_HASH",
            MapType::StructOps => "BPF_MAP_TYPE_STRUCT_OPS",
            MapType::Ringbuf => "BPF_MAP_TYPE_RINGBUF",
            MapType::InodeStorage => "BPF_MAP_TYPE_INODE_STORAGE",
            MapType::TaskStorage => "BPF_MAP_TYPE_TASK_STORAGE",
        }
    }

    /// Whether the map is a devmap variant (no raw value access allowed).
    pub fn is_devmap(self) -> bool {
        matches!(self, MapType::Devmap | MapType::DevmapHash)
    }

    /// Whether the map holds sockets addressable through its values.
    pub fn is_sock_storage(self) -> bool {
        matches!(self, MapType::Sockmap | MapType::Sockhash)
    }

    /// Map types usable from sleepable programs.
    pub fn sleepable_compatible(self) -> bool {
        matches!(
            self,
            MapType::Hash
                | MapType::LruHash
                | MapType::Array
                | MapType::PercpuHash
                | MapType::PercpuArray
                | MapType::LruPercpuHash
                | MapType::ArrayOfMaps
                | MapType::HashOfMaps
                | MapType::Ringbuf
        )
    }
}

/// Map creation flags (`BPF_F_*`).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapFlag {
    NoPrealloc,
    NumaNode,
    Rdonly,
    Wronly,
    RdonlyProg,
    WronlyProg,
    ZeroSeed,
    Mmapable,
    InnerMap,
    NoCommonLru,
    StackBuildId,
    PreserveElems,
    Clone,
}

impl MapFlag {
    /// The `BPF_F_*` spelling.
    pub fn c_name(self) -> &'static str {
        match self {
            MapFlag::NoPrealloc => "BPF_F_NO_PREALLOC",
            MapFlag::NumaNode => "BPF_F_NUMA_NODE",
            MapFlag::Rdonly => "BPF_F_RDONLY",
            MapFlag::Wronly => "BPF_F_WRONLY",
            MapFlag::RdonlyProg => "BPF_F_RDONLY_PROG",
            MapFlag::WronlyProg => "BPF_F_WRONLY_PROG",
            MapFlag::ZeroSeed => "BPF_F_ZERO_SEED",
            MapFlag::Mmapable => "BPF_F_MMAPABLE",
            MapFlag::InnerMap => "BPF_F_INNER_MAP",
            MapFlag::NoCommonLru => "BPF_F_NO_COMMON_LRU",
            MapFlag::StackBuildId => "BPF_F_STACK_BUILD_ID",
            MapFlag::PreserveElems => "BPF_F_PRESERVE_ELEMS",
            MapFlag::Clone => "BPF_F_CLONE",
        }
    }
}

/// Field types available to the record synthesizer.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    SpinLock,
    Timer,
    CharArr8,
}

impl FieldType {
    /// Byte size of one field of this type.
    pub fn size(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 => 2,
            FieldType::U32 => 4,
            FieldType::U64 => 8,
            FieldType::SpinLock => 4,
            FieldType::Timer => 16,
            FieldType::CharArr8 => 8,
        }
    }

    /// The C spelling of the field type.
    pub fn c_name(self) -> &'static str {
        match self {
            FieldType::U8 => "uint8_t",
            FieldType::U16 => "uint16_t",
            FieldType::U32 => "uint32_t",
            FieldType::U64 => "uint64_t",
            FieldType::SpinLock => "struct bpf_spin_lock",
            FieldType::Timer => "struct bpf_timer",
            FieldType::CharArr8 => "char [8]",
        }
    }

    /// Whether the field is one of the special members a hint can request.
    pub fn is_special(self) -> bool {
        matches!(self, FieldType::SpinLock | FieldType::Timer | FieldType::CharArr8)
    }
}

bitflags! {
    /// Hints steering what a generated call (and its maps/structs) must
    /// provide.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArgHints: u8 {
        /// Value struct must contain a `struct bpf_spin_lock`.
        const GEN_SPINLOCK = 1 << 0;
        /// Value struct must contain a `struct bpf_timer`.
        const GEN_TIMER = 1 << 1;
        /// Value struct must contain a `char [8]` constant string.
        const GEN_CONST_STR = 1 << 2;
        /// Map must be a sockmap/sockhash.
        const GEN_SOCK_MAP = 1 << 3;
        /// Map must be an xskmap.
        const GEN_XDP_SOCK_MAP = 1 << 4;
    }
}

impl Default for ArgHints {
    fn default() -> Self {
        ArgHints::empty()
    }
}

impl Serialize for ArgHints {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ArgHints {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Ok(ArgHints::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

impl ArgHints {
    /// Bytes reserved by the special members this hint set requests.
    pub fn occupied_size(self) -> usize {
        let mut occupied = 0;
        if self.contains(ArgHints::GEN_SPINLOCK) {
            occupied += FieldType::SpinLock.size();
        }
        if self.contains(ArgHints::GEN_TIMER) {
            occupied += FieldType::Timer.size();
        }
        if self.contains(ArgHints::GEN_CONST_STR) {
            occupied += FieldType::CharArr8.size();
        }
        occupied
    }
}

/// A map id: index into the program state's map list.
pub type MapId = usize;

/// A struct id: index into the program state's struct list.
pub type StructId = usize;

/// Hint bundle guiding the synthesis of one helper call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGenHint {
    /// Requested special members and map kinds.
    pub arg_hints: ArgHints,
    /// The return value will be accessed with this many bytes.
    pub ret_access_size: usize,
    /// The return value is used for raw (written) memory access.
    pub ret_access_raw: bool,
    /// Use this map instead of selecting one.
    pub preferred_map: Option<MapId>,
}

impl CallGenHint {
    /// Hint preferring an already existing map.
    pub fn with_map(map: Option<MapId>) -> Self {
        CallGenHint {
            preferred_map: map,
            ..CallGenHint::default()
        }
    }
}
