use std::fs::{self, File};
use std::path::Path;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mp-tiles"))
}

fn write_tile(root: &Path, name: &str, mp: &str, mpi: &str) {
    let dir = root.join("run");
    fs::create_dir_all(&dir).unwrap();
    let mut builder = tar::Builder::new(File::create(dir.join(format!("{name}.tar"))).unwrap());
    for (file, body) in [("mpA", mp), ("mpiA", mpi)] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, file, body.as_bytes()).unwrap();
    }
    builder.finish().unwrap();
}

#[test]
fn test_insufficient_arguments_exit_1() {
    let status = bin().args(["bucket", "prefix", "10"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_invalid_self_join_flag_exit_1() {
    let status = bin()
        .args(["bucket", "prefix", "10", "10", "100", "2"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_help_exit_0() {
    let status = bin().arg("--help").status().unwrap();
    assert_eq!(status.code(), Some(0));
}

#[test]
fn test_bad_tile_identifier_exit_1() {
    let store = tempfile::tempdir().unwrap();
    let status = bin()
        .args(["bucket", "run", "2", "2", "4", "0", "not-a-tile"])
        .arg("--local-store")
        .arg(store.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_empty_listing_exit_0_without_output() {
    let store = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let status = bin()
        .args(["bucket", "run", "2", "2", "4", "1"])
        .arg("--local-store")
        .arg(store.path())
        .arg("--output-dir")
        .arg(out.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_local_merge_writes_profile_and_summary() {
    let store = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_tile(store.path(), "result_0_0", "0.5\n0.25\n", "1\n0\n");
    write_tile(store.path(), "result_0_1", "0.75\n1.5\n", "0\n1\n");

    let summary = out.path().join("summary.json");
    let status = bin()
        .args(["bucket", "run", "2", "2", "4", "0", "--workers", "2"])
        .arg("--local-store")
        .arg(store.path())
        .arg("--scratch-dir")
        .arg(scratch.path())
        .arg("--output-dir")
        .arg(out.path())
        .arg("--summary")
        .arg(&summary)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let profile = fs::read_to_string(out.path().join("full_matrix_profile.txt")).unwrap();
    assert_eq!(profile, "0.5\n0.25\n0.75\n1.5\n");
    let index = fs::read_to_string(out.path().join("full_matrix_profile_index.txt")).unwrap();
    assert_eq!(index, "1\n0\n0\n1\n");

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(summary).unwrap()).unwrap();
    assert_eq!(json["tiles_merged"], 2);
    assert_eq!(json["uncovered"], 0);
    assert_eq!(json["improved_positions"], 4);
}

#[test]
fn test_missing_requested_tile_exit_1() {
    let store = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_tile(store.path(), "result_0_0", "0.5\n", "0\n");
    let status = bin()
        .args(["bucket", "run", "1", "1", "2", "0", "result_0_1"])
        .arg("--local-store")
        .arg(store.path())
        .arg("--output-dir")
        .arg(out.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_corrupt_tile_exit_1_without_output() {
    let store = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_tile(store.path(), "result_0_0", "0.5\n0.25\n", "1\n0\n");
    fs::write(store.path().join("run/result_0_1.tar.gz"), b"not a gzip stream").unwrap();

    let status = bin()
        .args(["bucket", "run", "2", "2", "4", "0", "--retries", "3"])
        .arg("--local-store")
        .arg(store.path())
        .arg("--scratch-dir")
        .arg(scratch.path())
        .arg("--output-dir")
        .arg(out.path())
        .arg("--summary")
        .arg(out.path().join("summary.json"))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}
