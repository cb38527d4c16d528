use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin("mzspotter")?;

    cmd.arg("not_real.mzML").arg("-o").arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not_real.mzML"))
        .stderr(predicate::str::contains("LoadFailed"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzspotter")?;

    cmd.arg("not_real.mzML").args(["-r", "a-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzspotter")?;

    cmd.arg("not_real.mzML").arg("--time-range=-z");
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_no_inputs() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzspotter")?;
    cmd.assert().failure().stderr(predicate::str::contains("INPUT_FILES"));
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin("mzspotter")?;
    cmd.arg("not_real.mzML")
        .arg("-o")
        .arg(dir.path())
        .args(["--config-file", "not_a_config.toml"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("ConfigFileMissing"));
    Ok(())
}

#[test]
fn test_help() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzspotter")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--time-range"))
        .stdout(predicate::str::contains("--config-file"));
    Ok(())
}
