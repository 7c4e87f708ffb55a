mod common;

use common::{carve_dump, insert_bytes, offsets_of, read_manifest, synth_lip};

/// With far more valid LIP headers than the per-type cap, exactly the cap's
/// worth of entries reach the manifest, every one at a distinct offset.
#[test]
fn per_type_quota_bounds_manifest_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dump = Vec::new();
    for i in 0..60 {
        insert_bytes(&mut dump, 1024 + i * 256, &synth_lip());
    }
    dump.resize(64 * 1024, 0);

    let cap = 10u64;
    let run = carve_dump(dir.path(), &dump, |opts| {
        opts.max_files_per_type = Some(cap);
        opts.workers = 4;
    });

    let records = read_manifest(&run.run_dir);
    assert_eq!(records.len() as u64, cap);
    assert!(records.iter().all(|r| r.file_type == "lip"));
    assert_eq!(
        offsets_of(&records).len(),
        records.len(),
        "offsets must be unique"
    );
}

/// Without a cap every distinct offset appears exactly once.
#[test]
fn uncapped_run_is_unique_by_offset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dump = Vec::new();
    for i in 0..20 {
        insert_bytes(&mut dump, 2048 + i * 512, &synth_lip());
    }
    dump.resize(64 * 1024, 0);

    let run = carve_dump(dir.path(), &dump, |opts| {
        opts.max_files_per_type = None;
    });

    let records = read_manifest(&run.run_dir);
    assert_eq!(records.len(), 20);
    assert_eq!(offsets_of(&records).len(), 20);
}

/// Quotas are per signature: capping one type must not starve another.
#[test]
fn quota_is_independent_per_signature() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dump = Vec::new();
    for i in 0..8 {
        insert_bytes(&mut dump, 1024 + i * 256, &synth_lip());
    }
    insert_bytes(&mut dump, 16 * 1024, &common::synth_nif(3));
    dump.resize(64 * 1024, 0);

    let run = carve_dump(dir.path(), &dump, |opts| {
        opts.max_files_per_type = Some(2);
    });

    let records = read_manifest(&run.run_dir);
    let lips = records.iter().filter(|r| r.file_type == "lip").count();
    let nifs = records
        .iter()
        .filter(|r| r.file_type == "nif_gamebryo")
        .count();
    assert_eq!(lips, 2);
    assert_eq!(nifs, 1, "NIF unaffected by the LIP cap");
}
