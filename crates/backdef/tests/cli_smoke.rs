use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn backdef() -> Command {
    let mut cmd = Command::cargo_bin("backdef").expect("binary exists");
    cmd.env_remove("BACKDEF_EXTGLOB")
        .env_remove("BACKDEF_FOLLOW")
        .env_remove("BACKDEF_ARCHIVE_FORMAT");
    cmd
}

#[test]
fn help_displays_usage() {
    backdef()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn archive_requires_a_definition_file() {
    backdef().arg("archive").assert().code(2);
}

#[test]
fn archive_prints_plan_listing() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    fs::create_dir_all(temp.path().join("data"))?;
    fs::write(temp.path().join("data/report.txt"), "x")?;
    fs::write(temp.path().join("set.def"), "data/*.txt  # reports\n")?;

    backdef()
        .current_dir(temp.path())
        .args(["archive", "-z", "set.def"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set.tar.gz"))
        .stdout(predicate::str::contains("[___] report.txt <- "));
    Ok(())
}

#[test]
fn sync_reads_stdin_and_emits_json() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    backdef()
        .current_dir(temp.path())
        .args(["sync", "--json", "-t", "/bak"])
        .write_stdin("/srv/./www/index.html\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"members\""))
        .stdout(predicate::str::contains("www/index.html"));
    Ok(())
}

#[test]
fn sync_purges_into_working_directory_by_default() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    fs::create_dir_all(temp.path().join("notes"))?;
    fs::write(temp.path().join("notes/a.txt"), "x")?;

    backdef()
        .current_dir(temp.path())
        .arg("sync")
        .write_stdin("!./notes/*.txt\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[___] a.txt <- "))
        .stdout(predicate::str::contains("purge *.txt under "));
    Ok(())
}

#[test]
fn failed_definition_sets_exit_status() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    backdef()
        .current_dir(temp.path())
        .args(["sync", "-t", "host:/bak"])
        .write_stdin("!/srv/*.conf\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot purge non-local destination"));
    Ok(())
}
