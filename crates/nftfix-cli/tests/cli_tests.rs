//! Command-line surface tests for the nftfix binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn nftfix(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nftfix").unwrap();
    cmd.current_dir(temp.path())
        .env_remove("HOLAPLEX_INDEXER_POSTGRES_URL")
        .env_remove("NFTFIX_DATA_DIR")
        .env("LOG_LEVEL", "error");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    nftfix(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("runall"));
}

#[test]
fn test_missing_subcommand_fails() {
    let temp = TempDir::new().unwrap();
    nftfix(&temp)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("subcommand is required"));
}

#[test]
fn test_status_on_empty_data_dir() {
    let temp = TempDir::new().unwrap();
    nftfix(&temp)
        .arg("status")
        .arg("--data-dir")
        .arg(temp.path().join("cmids"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpointed batches"));
}

#[test]
fn test_status_shows_checkpoints() {
    let temp = TempDir::new().unwrap();
    let batch = temp.path().join("cmids").join("cm1");
    std::fs::create_dir_all(&batch).unwrap();
    std::fs::write(batch.join("mintA"), "invalid").unwrap();
    std::fs::write(batch.join("mintB"), "valid").unwrap();
    std::fs::write(batch.join("metadata.json"), "{}").unwrap();
    std::fs::write(batch.join("metadata.json.upload.devnet"), "https://arweave.net/x").unwrap();

    nftfix(&temp)
        .arg("status")
        .arg("--data-dir")
        .arg(temp.path().join("cmids"))
        .assert()
        .success()
        .stdout(predicate::str::contains("cm1"))
        .stdout(predicate::str::contains("Invalid:  1"))
        .stdout(predicate::str::contains("https://arweave.net/x"));
}

#[test]
fn test_validate_missing_batch_file_fails() {
    let temp = TempDir::new().unwrap();
    nftfix(&temp)
        .args(["validate", "--cmids", "nope.txt", "--indexer-url", "postgres://127.0.0.1:9/db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.txt"));
}

#[test]
fn test_validate_requires_indexer_url() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("cmids.txt"), "cm1\n").unwrap();
    nftfix(&temp)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("HOLAPLEX_INDEXER_POSTGRES_URL"));
}

#[test]
fn test_upload_requires_payer() {
    let temp = TempDir::new().unwrap();
    nftfix(&temp)
        .arg("upload")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--payer"));
}
