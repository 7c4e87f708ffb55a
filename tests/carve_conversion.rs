mod common;

use common::{carve_dump, insert_bytes, read_manifest, synth_ddx};

/// A 3XDR texture is recognized but not convertible: the raw `.ddx` lands in
/// `ddx/`, nothing lands in `textures/`, and the failure is counted.
#[test]
fn non_convertible_ddx_falls_back_to_raw() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dump = Vec::new();
    insert_bytes(&mut dump, 512, &synth_ddx(32, 32, b"3XDR"));
    dump.resize(16 * 1024, 0);

    let run = carve_dump(dir.path(), &dump, |opts| {
        opts.enable_conversion = true;
    });

    assert_eq!(run.stats.conversion_failures, 1);
    assert!(run.run_dir.join("ddx").join("00000200.ddx").exists());
    assert!(!run.run_dir.join("textures").exists());

    let records = read_manifest(&run.run_dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_type, "ddx_3xdr");
    assert!(!records[0].is_compressed);
    assert!(records[0].content_type.is_none());
}

/// An XUIS scene is declared unsupported by the converter; skipping it is
/// not a failure.
#[test]
fn xui_scene_skip_is_not_a_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dump = Vec::new();
    let mut scene = vec![0u8; 32];
    scene[0..4].copy_from_slice(b"XUIS");
    scene[4..8].copy_from_slice(&5u32.to_be_bytes());
    scene[14..18].copy_from_slice(&256u32.to_be_bytes());
    insert_bytes(&mut dump, 1024, &scene);
    dump.resize(8 * 1024, 0);

    let run = carve_dump(dir.path(), &dump, |opts| {
        opts.enable_conversion = true;
    });

    assert_eq!(run.stats.conversion_failures, 0);
    assert!(run.run_dir.join("xur").join("00000400.xur").exists());

    let records = read_manifest(&run.run_dir);
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_compressed);
}

/// A repair-flagged XMA is patched in place and noted in the manifest.
#[test]
fn xma_missing_seek_table_is_repaired() {
    let dir = tempfile::tempdir().expect("tempdir");

    // XMA2 fmt chunk, no seek chunk: flagged for repair.
    let mut xma = Vec::new();
    xma.extend_from_slice(b"RIFF");
    xma.extend_from_slice(&0u32.to_le_bytes());
    xma.extend_from_slice(b"WAVE");
    xma.extend_from_slice(b"fmt ");
    xma.extend_from_slice(&16u32.to_le_bytes());
    xma.extend_from_slice(&0x0166u16.to_le_bytes());
    xma.extend_from_slice(&[0u8; 14]);
    xma.extend_from_slice(b"data");
    xma.extend_from_slice(&64u32.to_le_bytes());
    xma.extend_from_slice(&[0u8; 64]);
    let declared = (xma.len() - 8) as u32;
    xma[4..8].copy_from_slice(&declared.to_le_bytes());

    let mut dump = Vec::new();
    insert_bytes(&mut dump, 4096, &xma);
    dump.resize(32 * 1024, 0);

    let run = carve_dump(dir.path(), &dump, |_| {});
    let records = read_manifest(&run.run_dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].notes.as_deref(), Some("Repaired"));

    let saved = std::fs::read(run.run_dir.join("xma").join("00001000.xma")).expect("read");
    let patched = u32::from_le_bytes([saved[4], saved[5], saved[6], saved[7]]);
    assert_eq!(patched as usize, saved.len() - 8);
}
