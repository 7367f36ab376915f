// SPDX-License-Identifier: GPL-2.0

//! Record layout synthesis for map keys and values.
//!
//! Layouts are filled front to back: special members requested by hints
//! first (each consumes its hint), then the largest scalar that still fits.
//! A single-field result is demoted to a bare scalar typedef.

use rand::Rng;

use crate::catalog::SizeConstraint;
use crate::core::types::{ArgHints, FieldType, StructId};
use crate::state::StructDef;

/// Upper bound applied to open-ended size ranges.
const MAX_GEN_STRUCT_SIZE: usize = 128;

/// Synthesize a layout satisfying `constraint` and append it to `structs`.
///
/// With `use_hint`, the special members in `hints` reserve space and are
/// placed first; each placed member is removed from `hints`. `min_size_hint`
/// raises the minimum when the constraint leaves room. Returns `None` when
/// the constraint cannot be met, `Some(None)` when the chosen size is zero
/// (no layout needed), and `Some(Some(id))` otherwise.
pub fn generate_struct(
    structs: &mut Vec<StructDef>,
    r: &mut impl Rng,
    constraint: &SizeConstraint,
    hints: &mut ArgHints,
    use_hint: bool,
    min_size_hint: usize,
) -> Option<Option<StructId>> {
    let mut min = constraint.min;
    let max = constraint.max;
    let align = constraint.align;
    let occupied = if use_hint { hints.occupied_size() } else { 0 };

    log::trace!(
        "gen {} struct_{} min={} max={} align={} occupied={}",
        if use_hint { "val" } else { "key" },
        structs.len(),
        min,
        max,
        align,
        occupied
    );

    if use_hint {
        if occupied > max {
            log::debug!("map type value size {max} cannot accommodate members of {occupied} bytes");
            return None;
        }
        if occupied > min {
            min = occupied;
        }
        if min_size_hint > max {
            log::debug!("map type size {max} cannot accommodate access of {min_size_hint} bytes");
            return None;
        } else if min != max && min_size_hint > min {
            min = min_size_hint;
        }
    }

    let size = if min == max {
        min
    } else if max > min {
        let capped = max.min(MAX_GEN_STRUCT_SIZE).max(min);
        let mut size = r.random_range(min..=capped);
        if align > 1 {
            size -= size % align;
        }
        size
    } else {
        return None;
    };
    if size == 0 {
        return Some(None);
    }
    if size < occupied {
        return None;
    }

    let mut fields = Vec::new();
    let mut placed = ArgHints::empty();
    let mut offset = 0;
    while offset < size {
        let to_end = size - offset;
        let ft = if use_hint && hints.contains(ArgHints::GEN_SPINLOCK) {
            hints.remove(ArgHints::GEN_SPINLOCK);
            placed |= ArgHints::GEN_SPINLOCK;
            FieldType::SpinLock
        } else if use_hint && hints.contains(ArgHints::GEN_TIMER) {
            hints.remove(ArgHints::GEN_TIMER);
            placed |= ArgHints::GEN_TIMER;
            FieldType::Timer
        } else if use_hint && hints.contains(ArgHints::GEN_CONST_STR) {
            hints.remove(ArgHints::GEN_CONST_STR);
            placed |= ArgHints::GEN_CONST_STR;
            FieldType::CharArr8
        } else if to_end >= 8 {
            FieldType::U64
        } else if to_end >= 4 {
            FieldType::U32
        } else if to_end >= 2 {
            FieldType::U16
        } else {
            FieldType::U8
        };
        offset += ft.size();
        fields.push(ft);
    }

    let id = structs.len();
    let (name, is_struct) = if fields.len() == 1 {
        (fields[0].c_name().to_string(), false)
    } else {
        (format!("struct_{id}"), true)
    };
    structs.push(StructDef {
        name,
        fields,
        size,
        hints: placed,
        is_struct,
    });
    Some(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field_sum(sd: &StructDef) -> usize {
        sd.fields.iter().map(|f| f.size()).sum()
    }

    #[test]
    fn test_size_law_holds() {
        let mut r = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut structs = Vec::new();
            let mut hints = ArgHints::empty();
            let id = generate_struct(
                &mut structs,
                &mut r,
                &SizeConstraint::range(1, 1 << 12),
                &mut hints,
                false,
                0,
            )
            .unwrap()
            .unwrap();
            let sd = &structs[id];
            assert_eq!(field_sum(sd), sd.size);
            assert!(sd.size <= 128);
        }
    }

    #[test]
    fn test_hint_members_placed_and_consumed() {
        let mut r = StdRng::seed_from_u64(11);
        let mut structs = Vec::new();
        let mut hints = ArgHints::GEN_SPINLOCK | ArgHints::GEN_TIMER;
        let id = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::range(1, 1 << 12),
            &mut hints,
            true,
            0,
        )
        .unwrap()
        .unwrap();
        let sd = &structs[id];
        assert!(hints.is_empty());
        assert!(sd.hints.contains(ArgHints::GEN_SPINLOCK | ArgHints::GEN_TIMER));
        let spin = sd.find_field(FieldType::SpinLock).unwrap();
        let timer = sd.find_field(FieldType::Timer).unwrap();
        assert!(sd.offset_of(spin) + 4 <= sd.size);
        assert!(sd.offset_of(timer) + 16 <= sd.size);
        assert_eq!(field_sum(sd), sd.size);
    }

    #[test]
    fn test_hints_exceed_fixed_max_fails() {
        // Spin lock + const string need 12 bytes, the constraint allows 8.
        let mut r = StdRng::seed_from_u64(3);
        let mut structs = Vec::new();
        let mut hints = ArgHints::GEN_SPINLOCK | ArgHints::GEN_CONST_STR;
        let res = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::aligned(8, 8, 8),
            &mut hints,
            true,
            0,
        );
        assert!(res.is_none());
        assert!(structs.is_empty());
    }

    #[test]
    fn test_min_size_hint_over_max_fails() {
        let mut r = StdRng::seed_from_u64(3);
        let mut structs = Vec::new();
        let mut hints = ArgHints::empty();
        let res = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::fixed(8),
            &mut hints,
            true,
            16,
        );
        assert!(res.is_none());
    }

    #[test]
    fn test_pinned_size_ignores_min_size_hint_below_max() {
        // min == max pins the size; a smaller floor changes nothing.
        let mut r = StdRng::seed_from_u64(3);
        let mut structs = Vec::new();
        let mut hints = ArgHints::empty();
        let id = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::fixed(8),
            &mut hints,
            true,
            4,
        )
        .unwrap()
        .unwrap();
        assert_eq!(structs[id].size, 8);
    }

    #[test]
    fn test_zero_size_means_no_struct() {
        let mut r = StdRng::seed_from_u64(5);
        let mut structs = Vec::new();
        let mut hints = ArgHints::empty();
        let res = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::fixed(0),
            &mut hints,
            false,
            0,
        );
        assert_eq!(res, Some(None));
        assert!(structs.is_empty());
    }

    #[test]
    fn test_single_field_demoted_to_scalar() {
        let mut r = StdRng::seed_from_u64(5);
        let mut structs = Vec::new();
        let mut hints = ArgHints::empty();
        let id = generate_struct(
            &mut structs,
            &mut r,
            &SizeConstraint::fixed(4),
            &mut hints,
            false,
            0,
        )
        .unwrap()
        .unwrap();
        let sd = &structs[id];
        assert!(!sd.is_struct);
        assert_eq!(sd.name, "uint32_t");
        assert_eq!(sd.fields, vec![FieldType::U32]);
    }

    #[test]
    fn test_alignment_rounds_down() {
        let mut r = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let mut structs = Vec::new();
            let mut hints = ArgHints::empty();
            let id = generate_struct(
                &mut structs,
                &mut r,
                &SizeConstraint::aligned(8, 64, 8),
                &mut hints,
                false,
                0,
            )
            .unwrap()
            .unwrap();
            assert_eq!(structs[id].size % 8, 0);
        }
    }
}
