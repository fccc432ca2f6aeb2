use std::fs;
use std::process::Command;

use tempfile::tempdir;

/// A 14-run slice of a central composite design: factorial corners plus axial points.
const DESIGN: &str = "time,temp,solvent,et_w,pg_w,gly_w\n\
50,40,20,8.1,5.2,9.9\n\
50,40,80,10.3,6.1,12.0\n\
50,80,20,7.2,4.8,8.7\n\
50,80,80,9.9,6.3,11.5\n\
170,40,20,9.4,5.9,10.8\n\
170,40,80,13.0,7.7,15.1\n\
170,80,20,8.8,5.5,10.1\n\
170,80,80,12.1,7.4,14.2\n\
20,60,50,7.5,4.6,8.9\n\
200,60,50,10.2,6.2,11.8\n\
110,30,50,11.0,6.6,12.7\n\
110,90,50,10.1,6.1,11.9\n\
110,60,5,9.6,5.8,11.2\n\
110,60,95,13.4,8.0,15.6\n";

#[test]
fn fit_and_surface_commands_write_their_outputs() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("ccd.csv");
    fs::write(&data_path, DESIGN).expect("write design");
    let source = data_path.to_str().expect("path str");

    let exe = env!("CARGO_BIN_EXE_aloe-rsm");
    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args(["fit", source])
        .status()
        .expect("run aloe-rsm fit");
    assert!(status.success(), "fit exited with status {status:?}");
    let summary = fs::read_to_string(tmp.path().join("fit_summary.toml")).expect("summary");
    assert!(summary.contains("Glycerol-Water"));

    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "surface",
            source,
            "--solvent",
            "pg_w",
            "--fixed",
            "temp",
            "--value",
            "55",
            "--resolution",
            "6",
        ])
        .status()
        .expect("run aloe-rsm surface");
    assert!(status.success(), "surface exited with status {status:?}");

    let table = fs::read_to_string(tmp.path().join("surface.tsv")).expect("surface table");
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("solvent\ttime\tpg_w"));
    assert_eq!(lines.count(), 36);
}

#[test]
fn missing_source_fails_cleanly() {
    let tmp = tempdir().expect("temporary directory");
    let exe = env!("CARGO_BIN_EXE_aloe-rsm");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args(["importance", "does_not_exist.csv"])
        .output()
        .expect("run aloe-rsm importance");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does_not_exist.csv"));
}
