// SPDX-License-Identifier: GPL-2.0

//! Post-generation repair passes.
//!
//! Generation is local: a call is built without knowing what the rest of
//! the sequence does with references or locks. These passes walk the
//! finished sequence and insert or rebind calls until the global pairing
//! invariants hold.

pub mod reference;
pub mod spinlock;

pub use reference::fix_ref;
pub use spinlock::fix_spin_lock;
