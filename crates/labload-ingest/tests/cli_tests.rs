//! End-to-end tests for the labload binary
//!
//! These tests validate exit status and the files a run leaves behind:
//! - Successful preview and load runs
//! - Fatal conditions (short lines, missing input, bad mode)
//! - Run summary JSON

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CLONE_LINE: &str = "ProbeX\tMGI:001\tJ:99999\tLib1\tbrain\tsite\t500\tGenBank:AB123|\tjdoe";

/// Scratch workspace with reference data, an input file and an output dir
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(input: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("ref");
        std::fs::create_dir_all(&reference).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();

        for (file, content) in [
            ("user.tsv", "jdoe\t1001\n"),
            ("reference.tsv", "J:99999\t5000\n"),
            ("library.tsv", "Lib1\t300\n"),
            ("vector_type.tsv", "Phagemid\t11\n"),
            ("segment_type.tsv", "cDNA\t12\n"),
            ("logical_db.tsv", "GenBank\t9\n"),
            ("marker.tsv", "MGI:1\t71\n"),
            ("max_keys.tsv", "probe\t1000\nreference\t50\naccession\t2000\n"),
            ("accession_max.tsv", "MGI:\t5000\n"),
        ] {
            std::fs::write(reference.join(file), content).unwrap();
        }
        std::fs::write(dir.path().join("clones.txt"), input).unwrap();

        Self { dir }
    }

    fn command(&self, load_type: &str, mode: &str) -> Command {
        let mut cmd = Command::cargo_bin("labload").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("LABLOAD_BULK_COMMAND")
            .env_remove("LABLOAD_DELIMITER")
            .arg(load_type)
            .arg("--input")
            .arg(self.dir.path().join("clones.txt"))
            .arg("--output-dir")
            .arg(self.dir.path().join("out"))
            .arg("--reference-dir")
            .arg(self.dir.path().join("ref"))
            .arg("--mode")
            .arg(mode)
            .arg("--load-date")
            .arg("2024-03-01");
        cmd
    }

    fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(relative)).unwrap()
    }
}

#[test]
fn test_preview_run_succeeds() {
    let ws = Workspace::new(&format!("{}\n", CLONE_LINE));

    ws.command("clone", "preview")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 accepted, 0 rejected"));

    assert_eq!(
        ws.read("out/PRB_Probe.bcp"),
        "1001|ProbeX||300|11|12|||brain|site|500||1001|1001|03/01/2024|03/01/2024\n"
    );
    assert_eq!(ws.read("out/clones.txt.error"), "");
    assert!(ws.read("out/clones.txt.diagnostics").contains("Preview mode: PRB_Probe not loaded"));
}

#[test]
fn test_rejected_records_still_exit_zero() {
    let ws = Workspace::new(&format!("{}\n", CLONE_LINE.replace("J:99999", "J:1")));

    ws.command("clone", "dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 accepted, 1 rejected"));

    assert_eq!(ws.read("out/clones.txt.error"), "Line 1: Invalid Reference: J:1\n");
    assert_eq!(ws.read("out/PRB_Probe.bcp"), "");
}

#[test]
fn test_short_line_exits_non_zero() {
    let ws = Workspace::new("ProbeX\tMGI:001\tJ:99999\n");

    ws.command("clone", "preview")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid Line (1)"));

    assert!(ws.read("out/clones.txt.error").starts_with("Invalid Line (1)"));
}

#[test]
fn test_missing_input_exits_non_zero() {
    let ws = Workspace::new("");
    std::fs::remove_file(ws.dir.path().join("clones.txt")).unwrap();

    ws.command("clone", "preview")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not open input file"));

    assert!(ws.read("out/clones.txt.error").starts_with("Could not open input file"));
    assert!(ws.read("out/clones.txt.diagnostics").contains("FATAL: Could not open input file"));
}

#[test]
fn test_blank_line_exits_non_zero() {
    let ws = Workspace::new(&format!("{}\n\n{}\n", CLONE_LINE, CLONE_LINE));

    ws.command("clone", "preview")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid Line (2)"));
}

#[test]
fn test_probe_extras_preview() {
    let ws = Workspace::new("MGI:100\tnone\tJ:99999\t\tpA\tjdoe\n");
    std::fs::write(ws.dir.path().join("ref/probe.tsv"), "MGI:100\t42\n").unwrap();
    std::fs::write(
        ws.dir.path().join("ref/max_keys.tsv"),
        "probe\t1000\nreference\t50\naccession\t2000\nalias\t7\n",
    )
    .unwrap();

    ws.command("probe-extras", "preview")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe-extras (preview): 1 lines read, 1 accepted"));

    assert_eq!(ws.read("out/PRB_Marker.bcp"), "");
    assert_eq!(ws.read("out/PRB_Reference.bcp"), "51|42|5000|0|0|1001|1001|03/01/2024|03/01/2024\n");
    assert_eq!(ws.read("out/PRB_Alias.bcp"), "8|51|pA|1001|1001|03/01/2024|03/01/2024\n");
}

#[test]
fn test_invalid_mode_exits_non_zero() {
    let ws = Workspace::new(&format!("{}\n", CLONE_LINE));

    ws.command("clone", "incremental")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid Processing Mode: incremental"));
}

#[test]
fn test_unknown_load_type_is_a_usage_error() {
    let ws = Workspace::new("");

    ws.command("probeassay", "preview").assert().failure();
}

#[test]
fn test_summary_json() {
    let ws = Workspace::new(&format!("{}\n", CLONE_LINE));
    let summary_path = ws.dir.path().join("summary.json");

    ws.command("clone", "preview")
        .arg("--summary-json")
        .arg(&summary_path)
        .assert()
        .success();

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["load_type"], "clone");
    assert_eq!(summary["mode"], "preview");
    assert_eq!(summary["accepted"], 1);
    assert_eq!(summary["primary_keys"], serde_json::json!([1001]));
    assert_eq!(summary["rows"]["ACC_Accession"], 2);
}

#[cfg(unix)]
#[test]
fn test_load_mode_runs_bulk_command_and_finalizes() {
    let line = [
        "p1", "J:99999", "Lib1", "", "", "", "", "", "", "Phagemid", "cDNA", "", "", "", "MGI:1",
        "E", "", "", "jdoe",
    ]
    .join("\t");
    let ws = Workspace::new(&format!("{}\n", line));

    ws.command("probe", "load")
        .arg("--bulk-command")
        .arg("true {table} {file}")
        .assert()
        .success();

    assert_eq!(ws.read("ref/accession_max.tsv"), "MGI:\t5001\n");
    let diagnostics = ws.read("out/clones.txt.diagnostics");
    assert!(diagnostics.contains("Bulk load PRB_Probe: true PRB_Probe "));
    assert_eq!(ws.read("out/newProbe.txt").lines().count(), 1);
}

#[cfg(unix)]
#[test]
fn test_failing_bulk_command_exits_non_zero() {
    let ws = Workspace::new(&format!("{}\n", CLONE_LINE));

    ws.command("clone", "load")
        .arg("--bulk-command")
        .arg("false {file}")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Bulk load of PRB_Probe failed"));
}
