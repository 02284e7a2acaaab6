use assert_cmd::Command;
use ferritin_test_data::TestFile;
use std::fs;
use std::path::Path;

fn query_dir(dir: &Path) -> std::path::PathBuf {
    let queries = dir.join("queries");
    fs::create_dir_all(&queries).unwrap();
    TestFile::query_monomer().write_to(&queries).unwrap();
    TestFile::query_complex().write_to(&queries).unwrap();
    queries
}

#[test]
fn test_cli_featurize_single_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let queries = query_dir(dir.path());
    let out = dir.path().join("out");

    let mut cmd = Command::cargo_bin("ferritin-af2").unwrap();
    cmd.arg("featurize")
        .arg("--input-dir")
        .arg(&queries)
        .arg("--output-dir")
        .arg(&out)
        .arg("--msa-mode")
        .arg("single_sequence");
    cmd.assert().success();

    assert!(out.join("monomer_0_monomer.safetensors").exists());
    assert!(out.join("complex_0_multimer.safetensors").exists());
    assert!(out.join("prediction.log").exists());
}

#[test]
fn test_cli_accepts_no_filter() {
    let dir = tempfile::tempdir().unwrap();
    let queries = query_dir(dir.path());
    let out = dir.path().join("out");

    let mut cmd = Command::cargo_bin("ferritin-af2").unwrap();
    cmd.arg("featurize")
        .arg("--input-dir")
        .arg(&queries)
        .arg("--output-dir")
        .arg(&out)
        .arg("--msa-mode")
        .arg("single_sequence")
        .arg("--model-type")
        .arg("monomer")
        .arg("--no-filter");
    cmd.assert().success();

    assert!(out.join("monomer_0_monomer.safetensors").exists());
    assert!(!out.join("complex_0_multimer.safetensors").exists());
}

#[test]
fn test_cli_rejects_unknown_msa_mode() {
    let dir = tempfile::tempdir().unwrap();
    let queries = query_dir(dir.path());

    let mut cmd = Command::cargo_bin("ferritin-af2").unwrap();
    cmd.arg("featurize")
        .arg("--input-dir")
        .arg(&queries)
        .arg("--msa-mode")
        .arg("jackhmmer");
    cmd.assert().failure();
}

#[test]
fn test_cli_amber_needs_relaxer() {
    let dir = tempfile::tempdir().unwrap();
    let queries = query_dir(dir.path());

    let mut cmd = Command::cargo_bin("ferritin-af2").unwrap();
    cmd.arg("predict")
        .arg("--input-dir")
        .arg(&queries)
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .arg("--msa-mode")
        .arg("single_sequence")
        .arg("--runner")
        .arg("af2-runner")
        .arg("--use-amber");
    cmd.assert().failure();
}

#[cfg(unix)]
#[test]
fn test_cli_predict_with_runner_program() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let queries = query_dir(dir.path());
    let out = dir.path().join("out");

    let runner = dir.path().join("runner.sh");
    fs::write(
        &runner,
        r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
  esac
  shift
done
printf 'END\n' > "$out/unrelaxed.pdb"
printf '{"ranking_confidence": 0.5, "plddt": [90.0]}' > "$out/result.json"
"#,
    )
    .unwrap();
    fs::set_permissions(&runner, fs::Permissions::from_mode(0o755)).unwrap();

    let mut cmd = Command::cargo_bin("ferritin-af2").unwrap();
    cmd.arg("predict")
        .arg("--input-dir")
        .arg(&queries)
        .arg("--output-dir")
        .arg(&out)
        .arg("--msa-mode")
        .arg("single_sequence")
        .arg("--model-type")
        .arg("monomer")
        .arg("--num-models")
        .arg("1")
        .arg("--random-seed")
        .arg("0")
        .arg("--runner")
        .arg(&runner)
        .arg("--save-timing");
    cmd.assert().success();

    assert_eq!(
        fs::read_to_string(out.join("monomer_0_model_1_ptm_0_unrelaxed.pdb")).unwrap(),
        "END\n"
    );
    assert!(out.join("monomer_0_model_1_ptm_0_results.json").exists());
    assert!(!out.join("complex_0_model_1_multimer_v3_0_results.json").exists());
    assert!(out.join("timing.json").exists());
}
