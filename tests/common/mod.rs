#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use genotyper::genomics::AlignedRead;

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("GENOTYPER_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set GENOTYPER_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Reads on a single contig from `(start, bases)` pairs.
pub fn reads_on(contig: &str, specs: &[(u32, &str)]) -> Vec<AlignedRead> {
    let contig: Arc<str> = Arc::from(contig);
    specs
        .iter()
        .map(|&(start, bases)| {
            AlignedRead::new(Arc::clone(&contig), start, bases.as_bytes().to_vec())
        })
        .collect()
}

/// `copies` identical reads.
pub fn repeated(contig: &str, start: u32, bases: &str, copies: usize) -> Vec<AlignedRead> {
    reads_on(contig, &vec![(start, bases); copies])
}
