// SPDX-License-Identifier: GPL-2.0

//! Spin-lock balancing.
//!
//! The verifier requires a lock/unlock pair on the same lock expression
//! with nothing in between. A single walk keeps the currently held
//! expression: an unlock with nothing held gets a lock inserted before it,
//! an unlock on the wrong expression is rebound to the held one, and a
//! lock not immediately followed by its unlock gets one inserted after it.

use crate::catalog::Catalog;
use crate::core::types::CallGenHint;
use crate::state::{BpfArg, BpfCall, BpfProgState};

const SPIN_LOCK: &str = "BPF_FUNC_spin_lock";
const SPIN_UNLOCK: &str = "BPF_FUNC_spin_unlock";

fn lock_call(helper: &crate::catalog::HelperDef, expr: &str) -> BpfCall {
    let mut call = BpfCall::new(helper.clone(), CallGenHint::default());
    let mut a0 = BpfArg::for_slot(helper, 0);
    a0.name = expr.to_string();
    call.args.push(a0);
    call
}

/// Balance spin locks in `s`.
pub fn fix_spin_lock(cat: &Catalog, s: &mut BpfProgState) {
    let Ok(pt) = cat.prog_type(&s.prog_type_name) else {
        return;
    };
    let mut lock_held = String::new();
    let mut i = 0;
    while i < s.calls.len() {
        match s.calls[i].helper.enum_name.as_str() {
            SPIN_UNLOCK => {
                let expr = s.calls[i].args[0].name.clone();
                if lock_held.is_empty() {
                    let Some(helper) = pt.get_helper(SPIN_LOCK) else {
                        log::warn!("spinlock: no helper can lock the spinlock");
                        break;
                    };
                    s.calls.insert(i, lock_call(helper, &expr));
                    lock_held = expr;
                    // The next iteration revisits the unlock, now paired.
                } else if lock_held == expr {
                    lock_held.clear();
                } else {
                    log::debug!("spinlock: rebinding mismatched unlock to {lock_held}");
                    s.calls[i].args[0].name = lock_held.clone();
                    lock_held.clear();
                }
            }
            SPIN_LOCK => {
                let expr = s.calls[i].args[0].name.clone();
                let next_is_unlock = s
                    .calls
                    .get(i + 1)
                    .is_some_and(|c| c.helper.enum_name == SPIN_UNLOCK);
                if !next_is_unlock {
                    let Some(helper) = pt.get_helper(SPIN_UNLOCK) else {
                        log::warn!("spinlock: no helper can unlock the spinlock");
                        break;
                    };
                    s.calls.insert(i + 1, lock_call(helper, &expr));
                }
                lock_held = expr;
            }
            _ => {}
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HelperDef;
    use crate::core::types::{ArgType, RetType};

    fn test_catalog() -> Catalog {
        let mut cat = Catalog::new();
        cat.add_helper(HelperDef::new(93, SPIN_LOCK, RetType::Void, &[ArgType::PtrToSpinLock]));
        cat.add_helper(HelperDef::new(94, SPIN_UNLOCK, RetType::Void, &[ArgType::PtrToSpinLock]));
        cat.add_helper(HelperDef::new(5, "BPF_FUNC_ktime_get_ns", RetType::Integer, &[]));
        let pt = crate::catalog::ProgTypeDef::new(
            3,
            "sched_cls",
            "BPF_PROG_TYPE_SCHED_CLS",
            "struct __sk_buff",
            "struct sk_buff",
        )
        .sec(crate::catalog::SecDef::plain("tc"));
        cat.add_prog_type(pt, &[SPIN_LOCK, SPIN_UNLOCK, "BPF_FUNC_ktime_get_ns"]).unwrap();
        cat
    }

    fn state(cat: &Catalog) -> BpfProgState {
        BpfProgState::new(cat.prog_type("sched_cls").unwrap())
    }

    fn push(cat: &Catalog, s: &mut BpfProgState, enum_name: &str, expr: &str) {
        let helper = cat.helper(enum_name).unwrap();
        let mut call = BpfCall::new(helper.clone(), CallGenHint::default());
        if !helper.args.is_empty() {
            let mut a0 = BpfArg::for_slot(helper, 0);
            a0.name = expr.to_string();
            call.args.push(a0);
        }
        s.calls.push(call);
    }

    fn assert_paired(s: &BpfProgState) {
        let mut held = String::new();
        for call in &s.calls {
            match call.helper.enum_name.as_str() {
                SPIN_LOCK => {
                    assert!(held.is_empty(), "nested lock");
                    held = call.args[0].name.clone();
                }
                SPIN_UNLOCK => {
                    assert_eq!(held, call.args[0].name, "unlock without matching lock");
                    held.clear();
                }
                _ => {}
            }
        }
        assert!(held.is_empty(), "lock never released");
        // Every lock is immediately followed by its unlock.
        for w in s.calls.windows(2) {
            if w[0].helper.enum_name == SPIN_LOCK {
                assert_eq!(w[1].helper.enum_name, SPIN_UNLOCK);
                assert_eq!(w[0].args[0].name, w[1].args[0].name);
            }
        }
        if let Some(last) = s.calls.last() {
            assert_ne!(last.helper.enum_name, SPIN_LOCK);
        }
    }

    #[test]
    fn test_orphan_unlock_gets_lock_inserted() {
        let cat = test_catalog();
        let mut s = state(&cat);
        push(&cat, &mut s, SPIN_UNLOCK, "&v0->e1");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls.len(), 2);
        assert_eq!(s.calls[0].helper.enum_name, SPIN_LOCK);
        assert_eq!(s.calls[0].args[0].name, "&v0->e1");
        assert_paired(&s);
    }

    #[test]
    fn test_orphan_lock_gets_unlock_appended() {
        let cat = test_catalog();
        let mut s = state(&cat);
        push(&cat, &mut s, SPIN_LOCK, "&v0->e0");
        push(&cat, &mut s, "BPF_FUNC_ktime_get_ns", "");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls[1].helper.enum_name, SPIN_UNLOCK);
        assert_eq!(s.calls[1].args[0].name, "&v0->e0");
        assert_paired(&s);
    }

    #[test]
    fn test_mismatched_unlock_rebound() {
        let cat = test_catalog();
        let mut s = state(&cat);
        push(&cat, &mut s, SPIN_LOCK, "&v0->e0");
        push(&cat, &mut s, SPIN_UNLOCK, "&v9->e3");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls.len(), 2);
        assert_eq!(s.calls[1].args[0].name, "&v0->e0");
        assert_paired(&s);
    }

    #[test]
    fn test_trailing_lock_gets_unlock() {
        let cat = test_catalog();
        let mut s = state(&cat);
        push(&cat, &mut s, "BPF_FUNC_ktime_get_ns", "");
        push(&cat, &mut s, SPIN_LOCK, "&v2->e2");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls.len(), 3);
        assert_paired(&s);
    }

    #[test]
    fn test_balanced_sequence_untouched() {
        let cat = test_catalog();
        let mut s = state(&cat);
        push(&cat, &mut s, SPIN_LOCK, "&v0->e0");
        push(&cat, &mut s, SPIN_UNLOCK, "&v0->e0");
        push(&cat, &mut s, "BPF_FUNC_ktime_get_ns", "");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls.len(), 3);
        assert_paired(&s);
    }

    #[test]
    fn test_missing_lock_helper_leaves_sequence() {
        let mut cat = Catalog::new();
        cat.add_helper(HelperDef::new(94, SPIN_UNLOCK, RetType::Void, &[ArgType::PtrToSpinLock]));
        let pt = crate::catalog::ProgTypeDef::new(
            3,
            "sched_cls",
            "BPF_PROG_TYPE_SCHED_CLS",
            "struct __sk_buff",
            "struct sk_buff",
        );
        cat.add_prog_type(pt, &[SPIN_UNLOCK]).unwrap();
        let mut s = state(&cat);
        push(&cat, &mut s, SPIN_UNLOCK, "&v0->e1");
        fix_spin_lock(&cat, &mut s);
        assert_eq!(s.calls.len(), 1);
    }
}
