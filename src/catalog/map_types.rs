// SPDX-License-Identifier: GPL-2.0

//! Map type descriptors.
//!
//! Each entry carries the flag groups a map of that type must or may carry,
//! the key/value size constraints, and the policy for sizing `max_entries`.
//! The order of [`default_map_types`] is observable: the numeric
//! `BPF_MAP_TYPE_*` value equals the index + 1.

use serde::{Deserialize, Serialize};

use crate::core::types::{MapFlag, MapType};

/// Inclusive size constraint with optional alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeConstraint {
    /// Minimum size in bytes.
    pub min: usize,
    /// Maximum size in bytes.
    pub max: usize,
    /// Required alignment; 1 means unconstrained.
    pub align: usize,
}

impl SizeConstraint {
    /// An exact size.
    pub fn fixed(n: usize) -> Self {
        SizeConstraint { min: n, max: n, align: 1 }
    }

    /// An inclusive range.
    pub fn range(min: usize, max: usize) -> Self {
        SizeConstraint { min, max, align: 1 }
    }

    /// An inclusive range with alignment.
    pub fn aligned(min: usize, max: usize, align: usize) -> Self {
        SizeConstraint { min, max, align }
    }

    /// Whether `size` satisfies the constraint.
    pub fn contains(&self, size: usize) -> bool {
        size >= self.min && size <= self.max && (self.align <= 1 || size % self.align == 0)
    }
}

/// How `max_entries` is chosen for a new map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxEntriesPolicy {
    /// Uniform below 2^10.
    RandomSmall,
    /// Always zero (the kernel sizes these itself).
    Zero,
    /// Uniform below `k`; for ring buffers, `2^rand(k) * 4096`.
    Capped(u32),
}

/// Descriptor of one map type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapTypeDef {
    /// The map type tag.
    pub map_type: MapType,
    /// Flag groups that must all be present (one member per group).
    pub man_flags: Vec<Vec<MapFlag>>,
    /// Flag groups included with 50% probability (one member per group).
    pub opt_flags: Vec<Vec<MapFlag>>,
    /// Key size constraint; `0..=0` means the map has no key.
    pub key_size: SizeConstraint,
    /// Value size constraint; `0..=0` means the map has no value.
    pub val_size: SizeConstraint,
    /// Sizing policy for `max_entries`.
    pub max_entries: MaxEntriesPolicy,
}

impl MapTypeDef {
    fn new(
        map_type: MapType,
        man_flags: &[&[MapFlag]],
        opt_flags: &[&[MapFlag]],
        key_size: SizeConstraint,
        val_size: SizeConstraint,
        max_entries: MaxEntriesPolicy,
    ) -> Self {
        MapTypeDef {
            map_type,
            man_flags: man_flags.iter().map(|g| g.to_vec()).collect(),
            opt_flags: opt_flags.iter().map(|g| g.to_vec()).collect(),
            key_size,
            val_size,
            max_entries,
        }
    }
}

use crate::core::types::MapFlag::*;
use self::MaxEntriesPolicy::*;

const RW: &[MapFlag] = &[Wronly, Rdonly];
const RW_PROG: &[MapFlag] = &[WronlyProg, RdonlyProg];

/// The default, ordered map type table.
pub fn default_map_types() -> Vec<MapTypeDef> {
    vec![
        MapTypeDef::new(
            MapType::Hash,
            &[],
            &[&[NoPrealloc], &[NumaNode], RW, RW_PROG, &[ZeroSeed]],
            SizeConstraint::range(1, 1 << 12),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Array,
            &[],
            &[&[NumaNode], &[Mmapable], RW, RW_PROG, &[InnerMap]],
            SizeConstraint::fixed(4),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::ProgArray,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::PerfEventArray,
            &[],
            &[&[NumaNode], RW, &[PreserveElems]],
            SizeConstraint::fixed(4),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::PercpuHash,
            &[],
            &[&[NoPrealloc], RW, RW_PROG, &[ZeroSeed]],
            SizeConstraint::range(1, 1 << 12),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::PercpuArray,
            &[],
            &[RW, RW_PROG],
            SizeConstraint::fixed(4),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::StackTrace,
            &[],
            &[&[NumaNode], &[Rdonly, Wronly], &[StackBuildId]],
            SizeConstraint::fixed(4),
            SizeConstraint::aligned(8, 1 << 12, 8),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::CgroupArray,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::LruHash,
            &[],
            &[&[NoCommonLru, NumaNode], RW, RW_PROG, &[ZeroSeed]],
            SizeConstraint::range(1, 1 << 12),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::LruPercpuHash,
            &[],
            &[&[NoCommonLru], RW, RW_PROG, &[ZeroSeed]],
            SizeConstraint::range(1, 1 << 12),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        // BPF_F_RDONLY is left out so loaders can still prefill the trie.
        MapTypeDef::new(
            MapType::LpmTrie,
            &[&[NoPrealloc]],
            &[&[NumaNode], &[Wronly], RW_PROG],
            SizeConstraint::range(9, 264),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::ArrayOfMaps,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        // No BPF_F_RDONLY so libbpf can fill in the inner maps.
        MapTypeDef::new(
            MapType::HashOfMaps,
            &[],
            &[&[NoPrealloc], &[NumaNode], &[Wronly], RW_PROG, &[ZeroSeed]],
            SizeConstraint::range(1, 1 << 12),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Devmap,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Sockmap,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Cpumap,
            &[],
            &[&[NumaNode]],
            SizeConstraint::fixed(4),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Xskmap,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::fixed(4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Sockhash,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::range(1, 512),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::CgroupStorage,
            &[],
            &[&[NumaNode], &[RdonlyProg, WronlyProg]],
            SizeConstraint::aligned(8, 12, 4),
            SizeConstraint::range(8, 1 << 16),
            Zero,
        ),
        MapTypeDef::new(
            MapType::ReuseportSockarray,
            &[],
            &[&[NumaNode], RW, RW_PROG],
            SizeConstraint::range(1, 1 << 16),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::PercpuCgroupStorage,
            &[],
            &[&[NumaNode], &[RdonlyProg, WronlyProg]],
            SizeConstraint::aligned(8, 12, 4),
            SizeConstraint::range(8, 1 << 16),
            Zero,
        ),
        MapTypeDef::new(
            MapType::Queue,
            &[],
            &[&[NumaNode], RW, &[RdonlyProg], &[WronlyProg]],
            SizeConstraint::fixed(0),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::Stack,
            &[],
            &[&[NumaNode], RW, &[RdonlyProg], &[WronlyProg]],
            SizeConstraint::fixed(0),
            SizeConstraint::range(1, 1 << 12),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::SkStorage,
            &[&[NoPrealloc]],
            &[&[Clone]],
            SizeConstraint::fixed(4),
            SizeConstraint::range(1, 1 << 16),
            Zero,
        ),
        MapTypeDef::new(
            MapType::DevmapHash,
            &[],
            &[&[NumaNode], RW],
            SizeConstraint::fixed(4),
            SizeConstraint::aligned(4, 8, 4),
            RandomSmall,
        ),
        MapTypeDef::new(
            MapType::StructOps,
            &[],
            &[],
            SizeConstraint::fixed(4),
            SizeConstraint::range(0, 1 << 12),
            Capped(1),
        ),
        MapTypeDef::new(
            MapType::Ringbuf,
            &[],
            &[&[NumaNode]],
            SizeConstraint::fixed(0),
            SizeConstraint::fixed(0),
            Capped(24),
        ),
        MapTypeDef::new(
            MapType::InodeStorage,
            &[&[NoPrealloc]],
            &[&[Clone]],
            SizeConstraint::fixed(4),
            SizeConstraint::range(1, 1 << 16),
            Zero,
        ),
        MapTypeDef::new(
            MapType::TaskStorage,
            &[&[NoPrealloc]],
            &[&[Clone]],
            SizeConstraint::fixed(4),
            SizeConstraint::range(1, 1 << 16),
            Zero,
        ),
    ]
}
