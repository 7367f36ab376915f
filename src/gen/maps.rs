// SPDX-License-Identifier: GPL-2.0

//! Map selection and creation.
//!
//! For a `ARG_CONST_MAP_PTR` slot the generator reuses the call's bound or
//! preferred map, picks an existing compatible map, or creates a new one.
//! Compatibility folds together the two-way helper/map-type relation, flag
//! state, special value members, program type restrictions and the
//! requested return access.

use rand::Rng;

use crate::catalog::compat::map_func_compatible;
use crate::catalog::prog_types::{is_tracing_prog_type, may_update_sockmap};
use crate::catalog::{Catalog, MapTypeDef, MaxEntriesPolicy};
use crate::core::types::{ArgHints, CallGenHint, FieldType, MapFlag, MapId, MapType, StructId};
use crate::gen::struct_builder::generate_struct;
use crate::state::{BpfCall, BpfMap, BpfProgState};

fn is_mutating_map_op(helper_enum: &str) -> bool {
    matches!(
        helper_enum,
        "BPF_FUNC_map_delete_elem"
            | "BPF_FUNC_map_update_elem"
            | "BPF_FUNC_map_push_elem"
            | "BPF_FUNC_map_pop_elem"
    )
}

fn val_struct<'a>(s: &'a BpfProgState, m: &BpfMap) -> Option<&'a crate::state::StructDef> {
    m.val.map(|v| &s.structs[v])
}

/// Existing maps usable by `call` under its hint.
pub(crate) fn helper_compat_maps(s: &BpfProgState, call: &BpfCall) -> Vec<MapId> {
    let hint = &call.hint;
    let gen_spin = hint.arg_hints.contains(ArgHints::GEN_SPINLOCK);
    let gen_timer = hint.arg_hints.contains(ArgHints::GEN_TIMER);
    let gen_str = hint.arg_hints.contains(ArgHints::GEN_CONST_STR);
    let gen_sock = hint.arg_hints.contains(ArgHints::GEN_SOCK_MAP);
    let gen_xdp = hint.arg_hints.contains(ArgHints::GEN_XDP_SOCK_MAP);

    let mut compat = Vec::new();
    for (id, m) in s.maps.iter().enumerate() {
        if !map_func_compatible(m.map_type, &call.helper.enum_name) {
            continue;
        }

        let val = val_struct(s, m);
        let has_spin = val.is_some_and(|v| v.has_field(FieldType::SpinLock));
        let has_timer = val.is_some_and(|v| v.has_field(FieldType::Timer));
        let has_str = val.is_some_and(|v| v.has_field(FieldType::CharArr8));
        let rd_only = m.has_flag(MapFlag::RdonlyProg);
        let wr_only = m.has_flag(MapFlag::WronlyProg);

        if is_mutating_map_op(&call.helper.enum_name) && rd_only {
            continue;
        }
        if (gen_spin && (!has_spin || rd_only))
            || (gen_timer && (!has_timer || rd_only))
            || (gen_str && !has_str)
        {
            continue;
        }
        if has_spin
            && (s.prog_type_enum == "BPF_PROG_TYPE_SOCKET_FILTER"
                || is_tracing_prog_type(&s.prog_type_enum)
                || s.sec.sleepable)
        {
            continue;
        }
        if m.map_type == MapType::StructOps {
            continue;
        }
        if s.sec.sleepable && !m.map_type.sleepable_compatible() {
            continue;
        }
        // One cgroup storage of each flavor per program; a candidate does
        // not exclude itself.
        if m.map_type == MapType::CgroupStorage
            && s.maps
                .iter()
                .enumerate()
                .any(|(i, pm)| i != id && pm.map_type == MapType::CgroupStorage)
        {
            continue;
        }
        if m.map_type == MapType::PercpuCgroupStorage
            && s.maps
                .iter()
                .enumerate()
                .any(|(i, pm)| i != id && pm.map_type == MapType::PercpuCgroupStorage)
        {
            continue;
        }
        if call.helper.ret == crate::core::types::RetType::PtrToMapValueOrNull {
            if gen_xdp != (m.map_type == MapType::Xskmap) {
                continue;
            }
            if gen_sock != m.map_type.is_sock_storage() {
                continue;
            }
        }
        if call.helper.ret.is_map_value() && hint.ret_access_size != 0 {
            match val {
                Some(v) if v.size >= hint.ret_access_size => {}
                _ => continue,
            }
            if rd_only && hint.ret_access_raw {
                continue;
            }
            if wr_only && !hint.ret_access_raw {
                continue;
            }
            if hint.ret_access_raw && m.map_type.is_devmap() {
                continue;
            }
        }
        compat.push(id);
    }
    compat
}

/// Indices into the map-type table usable for a new map for `call`.
pub(crate) fn helper_compat_map_type_idxs(
    cat: &Catalog,
    s: &BpfProgState,
    call: &BpfCall,
) -> Vec<usize> {
    let hint = &call.hint;
    let gen_sock = hint.arg_hints.contains(ArgHints::GEN_SOCK_MAP);
    let gen_xdp = hint.arg_hints.contains(ArgHints::GEN_XDP_SOCK_MAP);

    let mut idxs = Vec::new();
    for (i, mt) in cat.map_types.iter().enumerate() {
        if !map_func_compatible(mt.map_type, &call.helper.enum_name) {
            continue;
        }
        if mt.val_size.max < hint.arg_hints.occupied_size() {
            continue;
        }
        if hint.arg_hints.contains(ArgHints::GEN_SPINLOCK) {
            if !matches!(
                mt.map_type,
                MapType::Hash
                    | MapType::Array
                    | MapType::CgroupStorage
                    | MapType::SkStorage
                    | MapType::InodeStorage
                    | MapType::TaskStorage
            ) {
                continue;
            }
            if s.prog_type_enum == "BPF_PROG_TYPE_SOCKET_FILTER"
                || is_tracing_prog_type(&s.prog_type_enum)
                || s.sec.sleepable
            {
                continue;
            }
        }
        if hint.arg_hints.contains(ArgHints::GEN_TIMER) {
            if !matches!(mt.map_type, MapType::Hash | MapType::LruHash | MapType::Array) {
                continue;
            }
            if is_tracing_prog_type(&s.prog_type_enum) {
                continue;
            }
        }
        if mt.map_type == MapType::StructOps {
            continue;
        }
        if s.sec.sleepable && !mt.map_type.sleepable_compatible() {
            continue;
        }
        if mt.map_type == MapType::CgroupStorage
            && s.maps.iter().any(|m| m.map_type == MapType::CgroupStorage)
        {
            continue;
        }
        if mt.map_type == MapType::PercpuCgroupStorage
            && s.maps.iter().any(|m| m.map_type == MapType::PercpuCgroupStorage)
        {
            continue;
        }
        if call.helper.ret == crate::core::types::RetType::PtrToMapValueOrNull {
            if gen_xdp != (mt.map_type == MapType::Xskmap) {
                continue;
            }
            if gen_sock != mt.map_type.is_sock_storage() {
                continue;
            }
        }
        if hint.ret_access_raw && mt.map_type.is_devmap() {
            continue;
        }
        if call.helper.enum_name == "BPF_FUNC_map_update_elem"
            && mt.map_type.is_sock_storage()
            && !may_update_sockmap(&s.prog_type_enum)
        {
            continue;
        }
        idxs.push(i);
    }
    idxs
}

/// Existing layouts reusable as a key for `mtd`.
fn compat_key_structs(s: &BpfProgState, mtd: &MapTypeDef) -> Vec<StructId> {
    s.structs
        .iter()
        .enumerate()
        .filter(|(_, sd)| mtd.key_size.contains(sd.size))
        .map(|(id, _)| id)
        .collect()
}

/// Existing layouts reusable as a value for `mtd` under `hint`.
fn compat_val_structs(
    s: &BpfProgState,
    hint: &CallGenHint,
    min_val_size: usize,
    mtd: &MapTypeDef,
) -> Vec<StructId> {
    if hint
        .arg_hints
        .intersects(ArgHints::GEN_SOCK_MAP | ArgHints::GEN_XDP_SOCK_MAP)
    {
        return Vec::new();
    }
    s.structs
        .iter()
        .enumerate()
        .filter(|(_, sd)| {
            if min_val_size > 0 && sd.size < min_val_size {
                return false;
            }
            if hint.arg_hints.contains(ArgHints::GEN_SPINLOCK) && !sd.has_field(FieldType::SpinLock)
            {
                return false;
            }
            if hint.arg_hints.contains(ArgHints::GEN_TIMER) && !sd.has_field(FieldType::Timer) {
                return false;
            }
            if hint.arg_hints.contains(ArgHints::GEN_CONST_STR) && !sd.has_field(FieldType::CharArr8)
            {
                return false;
            }
            mtd.val_size.contains(sd.size)
        })
        .map(|(id, _)| id)
        .collect()
}

/// Create a map of type `mtd`, synthesizing or reusing key/value layouts.
/// Special members requested by `hint` are consumed as they are placed.
pub(crate) fn new_map(
    cat: &Catalog,
    s: &mut BpfProgState,
    r: &mut impl Rng,
    mtd: &MapTypeDef,
    hint: &mut CallGenHint,
    min_val_size: usize,
) -> Option<MapId> {
    let mut max_entries = match mtd.max_entries {
        MaxEntriesPolicy::RandomSmall => r.random_range(0..1 << 10) as i64,
        MaxEntriesPolicy::Zero => 0,
        MaxEntriesPolicy::Capped(k) => {
            if mtd.map_type == MapType::Ringbuf {
                (1i64 << r.random_range(0..k)) * 4096
            } else {
                r.random_range(0..k) as i64
            }
        }
    };
    if hint.arg_hints.contains(ArgHints::GEN_CONST_STR) {
        max_entries = 1;
    }

    let compat_keys = compat_key_structs(s, mtd);
    let key = if r.random_bool(0.5) && !compat_keys.is_empty() {
        Some(compat_keys[r.random_range(0..compat_keys.len())])
    } else {
        generate_struct(&mut s.structs, r, &mtd.key_size, &mut hint.arg_hints, false, 0)?
    };

    let compat_vals = compat_val_structs(s, hint, min_val_size, mtd);
    let val = if r.random_bool(0.5) && !compat_vals.is_empty() {
        Some(compat_vals[r.random_range(0..compat_vals.len())])
    } else {
        generate_struct(
            &mut s.structs,
            r,
            &mtd.val_size,
            &mut hint.arg_hints,
            true,
            min_val_size,
        )?
    };

    let inner = if matches!(mtd.map_type, MapType::ArrayOfMaps | MapType::HashOfMaps) {
        let inner_mtd = cat.map_types[r.random_range(0..cat.map_types.len())].clone();
        let mut inner_hint = CallGenHint::default();
        new_map(cat, s, r, &inner_mtd, &mut inner_hint, 0)
    } else {
        None
    };

    let mut flags = Vec::new();
    for group in &mtd.man_flags {
        if group.len() == 1 {
            flags.push(group[0]);
        } else {
            flags.push(group[r.random_range(0..group.len())]);
        }
    }
    let val_has_str = val
        .map(|v| s.structs[v].has_field(FieldType::CharArr8))
        .unwrap_or(false);
    for group in &mtd.opt_flags {
        // A constant string must stay readable from the program side.
        if val_has_str && *group == [MapFlag::Wronly, MapFlag::Rdonly] {
            flags.push(MapFlag::Rdonly);
            continue;
        }
        if r.random_bool(0.5) {
            continue;
        }
        if group.len() == 1 {
            flags.push(group[0]);
        } else {
            flags.push(group[r.random_range(0..group.len())]);
        }
    }

    let id = s.maps.len();
    s.maps.push(BpfMap {
        map_type: mtd.map_type,
        flags,
        name: format!("map_{id}"),
        key,
        val,
        max_entries,
        inner,
    });
    log::debug!(
        "new map_{id} {} max_entries={max_entries}",
        mtd.map_type.c_name()
    );
    Some(id)
}

/// Bind a map to `call`: the preferred map, the already bound map, an
/// existing compatible map (2 out of 3 times when one exists), or a newly
/// created one.
pub(crate) fn select_or_create_map(
    cat: &Catalog,
    s: &mut BpfProgState,
    r: &mut impl Rng,
    call: &mut BpfCall,
) -> Option<MapId> {
    if let Some(pm) = call.hint.preferred_map {
        call.arg_map = Some(pm);
        return Some(pm);
    }
    if let Some(m) = call.arg_map {
        return Some(m);
    }

    let compat = helper_compat_maps(s, call);
    if !compat.is_empty() && r.random_ratio(2, 3) {
        let m = compat[r.random_range(0..compat.len())];
        call.arg_map = Some(m);
        return Some(m);
    }

    let idxs = helper_compat_map_type_idxs(cat, s, call);
    if idxs.is_empty() {
        return None;
    }
    let mtd = if call.hint.arg_hints.contains(ArgHints::GEN_CONST_STR) {
        let i = *idxs
            .iter()
            .find(|&&i| cat.map_types[i].map_type == MapType::Array)?;
        &cat.map_types[i]
    } else {
        &cat.map_types[idxs[r.random_range(0..idxs.len())]]
    };

    let min_val_size = if call.helper.ret.is_map_value() {
        call.hint.ret_access_size
    } else {
        0
    };
    let mut hint = std::mem::take(&mut call.hint);
    let created = new_map(cat, s, r, mtd, &mut hint, min_val_size);
    call.hint = hint;
    let m = created?;

    if is_mutating_map_op(&call.helper.enum_name) {
        s.maps[m].remove_flag(MapFlag::RdonlyProg);
    }
    let val_special = s.maps[m]
        .val
        .map(|v| {
            s.structs[v].has_field(FieldType::SpinLock) || s.structs[v].has_field(FieldType::Timer)
        })
        .unwrap_or(false);
    if val_special {
        s.maps[m].remove_flag(MapFlag::RdonlyProg);
    }
    if s.prog_type_enum == "BPF_PROG_TYPE_PERF_EVENT"
        && matches!(
            s.maps[m].map_type,
            MapType::Hash | MapType::PercpuHash | MapType::HashOfMaps
        )
    {
        s.maps[m].remove_flag(MapFlag::NoPrealloc);
    }
    if s.sec.sleepable
        && matches!(
            s.maps[m].map_type,
            MapType::Hash
                | MapType::LruHash
                | MapType::Array
                | MapType::PercpuHash
                | MapType::PercpuArray
                | MapType::LruPercpuHash
                | MapType::ArrayOfMaps
                | MapType::HashOfMaps
        )
    {
        s.maps[m].remove_flag(MapFlag::NoPrealloc);
    }
    call.arg_map = Some(m);
    Some(m)
}
