// SPDX-License-Identifier: GPL-2.0
//! Seed persistence round-trips.

use bpf_fuzzer::catalog::Catalog;
use bpf_fuzzer::core::error::GenError;
use bpf_fuzzer::gen::{gen_bpf_prog, gen_bpf_seed_prog};
use bpf_fuzzer::state::persist::{prog_type_from_path, restore_seed_prog, seed_base_path};
use bpf_fuzzer::state::BpfProgState;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_round_trip_preserves_every_field() {
    let cat = Catalog::linux();
    let dir = tempfile::tempdir().unwrap();
    let mut restored_any = false;
    for seed in 0..10u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let Ok(s) = gen_bpf_prog(&cat, &mut rng) else {
            continue;
        };
        let path = seed_base_path(dir.path(), &s.prog_type_name).with_extension("json");
        s.write_state(&path).unwrap();
        let back = BpfProgState::read_state(&path).unwrap();
        assert_eq!(s, back);
        restored_any = true;
    }
    assert!(restored_any);
}

#[test]
fn test_seed_prog_writes_blob_with_path_convention() {
    let cat = Catalog::linux();
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let (s, blob) = gen_bpf_seed_prog(&cat, &mut rng, dir.path()).unwrap();

    assert_eq!(prog_type_from_path(&blob).unwrap(), s.prog_type_name);
    assert!(s.path.ends_with(".o"));

    let back = restore_seed_prog(&cat, &blob).unwrap();
    assert_eq!(s, back);
}

#[test]
fn test_restore_rejects_unknown_prog_type() {
    let cat = Catalog::linux();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog_1234_not_a_prog_type.json");
    std::fs::write(&path, b"{}").unwrap();
    let err = restore_seed_prog(&cat, &path).unwrap_err();
    assert!(matches!(err, GenError::UnknownProgType(_)));
}

#[test]
fn test_restore_rejects_malformed_name() {
    let cat = Catalog::linux();
    let err = restore_seed_prog(&cat, std::path::Path::new("whatever.json")).unwrap_err();
    assert!(matches!(err, GenError::BadSeedPath(_)));
}
