//! Shared test infrastructure: synthetic dump builders and manifest readers.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use xbcarve::pipeline::{CarveOptions, CarveStats, MemoryCarver};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestRecord {
    pub file_type: String,
    pub offset: u64,
    pub size_in_dump: u32,
    pub size_output: u32,
    pub filename: String,
    pub original_path: Option<String>,
    pub is_compressed: bool,
    pub content_type: Option<String>,
    pub is_partial: bool,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

pub fn insert_bytes(target: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if end > target.len() {
        target.resize(end, 0u8);
    }
    target[offset..end].copy_from_slice(data);
}

/// Little-endian DDS header: 64-ish bytes of real fields, rest zero.
pub fn synth_dds(width: u32, height: u32, mips: u32) -> Vec<u8> {
    let mut h = vec![0u8; 128];
    h[0..4].copy_from_slice(b"DDS ");
    h[4..8].copy_from_slice(&124u32.to_le_bytes());
    h[12..16].copy_from_slice(&height.to_le_bytes());
    h[16..20].copy_from_slice(&width.to_le_bytes());
    h[28..32].copy_from_slice(&mips.to_le_bytes());
    h[84..88].copy_from_slice(b"DXT1");
    h
}

/// Valid 0x44-byte DDX header (DXT1, tiled).
pub fn synth_ddx(width: u32, height: u32, variant: &[u8; 4]) -> Vec<u8> {
    let mut h = vec![0u8; 0x44];
    h[0..4].copy_from_slice(variant);
    h[4] = 0x00;
    h[7..9].copy_from_slice(&5u16.to_le_bytes());
    h[0x24..0x28].copy_from_slice(&0x9040_0000u32.to_be_bytes());
    h[0x28..0x2C].copy_from_slice(&0x12u32.to_be_bytes());
    let dims: u32 = (width - 1) | ((height - 1) << 13);
    h[0x2C..0x30].copy_from_slice(&dims.to_be_bytes());
    h
}

pub fn synth_nif(num_blocks: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"Gamebryo File Format, Version 20.0.0.4\n");
    data.extend_from_slice(&0x1400_0004u32.to_le_bytes());
    data.push(0); // big endian
    data.extend_from_slice(&11u32.to_be_bytes());
    data.extend_from_slice(&num_blocks.to_be_bytes());
    data
}

pub fn synth_lip() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"LIPS");
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    data
}

pub struct CarveRun {
    pub stats: CarveStats,
    pub run_dir: PathBuf,
}

/// Write `dump` to disk and carve it with conversion disabled (tests opt in
/// explicitly where conversion behavior is under test).
pub fn carve_dump(dir: &Path, dump: &[u8], tweak: impl FnOnce(&mut CarveOptions)) -> CarveRun {
    let input = dir.join("image.dmp");
    std::fs::write(&input, dump).expect("write dump");
    let output = dir.join("out");

    let mut options = CarveOptions::new(input, output.clone());
    options.enable_conversion = false;
    options.workers = 2;
    tweak(&mut options);

    let stats = MemoryCarver::new(options)
        .run(None, None)
        .expect("carve run");
    CarveRun {
        stats,
        run_dir: output.join("image"),
    }
}

pub fn read_manifest(run_dir: &Path) -> Vec<ManifestRecord> {
    let text = std::fs::read_to_string(run_dir.join("manifest.json")).expect("manifest");
    serde_json::from_str(&text).expect("manifest json")
}

pub fn offsets_of(records: &[ManifestRecord]) -> HashSet<u64> {
    records.iter().map(|r| r.offset).collect()
}
