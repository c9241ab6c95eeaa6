use std::path::PathBuf;
use std::process::Command;

use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn spotred() -> Command {
    Command::new(env!("CARGO_BIN_EXE_spotred"))
}

#[test]
fn reduce_writes_verifiable_report() {
    let dir = tempdir().unwrap();
    let status = spotred()
        .arg("reduce")
        .arg("--task")
        .arg(fixture("task.yaml"))
        .arg("--spots")
        .arg(fixture("spots.json"))
        .arg("--out")
        .arg(dir.path())
        .arg("--poll-ms")
        .arg("5")
        .status()
        .unwrap();
    assert!(status.success());

    let report = dir.path().join("report.json");
    assert!(report.exists());
    assert!(dir.path().join("summary.json").exists());

    let output = spotred()
        .arg("verify")
        .arg("--report")
        .arg(&report)
        .output()
        .unwrap();
    assert!(output.status.success());
    let printed = String::from_utf8(output.stdout).unwrap();
    assert_eq!(printed.trim().len(), 64);
}

#[test]
fn sequential_and_parallel_reports_share_a_hash() {
    let sequential = tempdir().unwrap();
    let parallel = tempdir().unwrap();
    for (dir, extra) in [(&sequential, None), (&parallel, Some("--parallel"))] {
        let mut command = spotred();
        command
            .arg("reduce")
            .arg("--task")
            .arg(fixture("task.yaml"))
            .arg("--spots")
            .arg(fixture("spots.json"))
            .arg("--out")
            .arg(dir.path());
        if let Some(flag) = extra {
            command.arg(flag);
        }
        assert!(command.status().unwrap().success());
    }
    let a = std::fs::read(sequential.path().join("report.json")).unwrap();
    let b = std::fs::read(parallel.path().join("report.json")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn tampered_report_fails_verification() {
    let dir = tempdir().unwrap();
    let status = spotred()
        .args(["reduce", "--mode", "none", "--task"])
        .arg(fixture("task.yaml"))
        .arg("--spots")
        .arg(fixture("spots.json"))
        .arg("--out")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let path = dir.path().join("report.json");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("temora-session", "edited")).unwrap();
    let status = spotred().arg("verify").arg("--report").arg(&path).status().unwrap();
    assert!(!status.success());
}

#[test]
fn order_lists_builtins_before_dependents() {
    let output = spotred()
        .arg("order")
        .arg("--task")
        .arg(fixture("task.yaml"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let listing = String::from_utf8(output.stdout).unwrap();
    let position = |name: &str| {
        listing
            .lines()
            .position(|line| line.split('\t').nth(1) == Some(name))
            .unwrap()
    };
    assert!(position("Age") < position("WtdAge"));
    assert!(position("WtdAge") < position("AgeRatio"));
}

#[test]
fn covariance_writes_one_entry_per_model() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("matrices.json");
    let status = spotred()
        .arg("covariance")
        .arg("--task")
        .arg(fixture("task.yaml"))
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    let matrices: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(matrices.as_array().unwrap().len(), 3);
}
