use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn inventory_json_lists_every_entity() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("vsim.yml"),
        r#"
model:
  folders: 2
  vms_per_folder: 3
"#,
    )?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("vsim")?
        .current_dir(dir.path())
        .env_remove("VSIM_CONFIG")
        .args(["inventory", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    let entries = value.as_array().expect("json array");
    assert_eq!(entries.len(), 8);

    let vms: Vec<&Value> = entries
        .iter()
        .filter(|e| e["kind"] == "VirtualMachine")
        .collect();
    assert_eq!(vms.len(), 6);
    assert!(vms.iter().all(|vm| vm["power_state"] == "poweredOff"));
    assert_eq!(vms[0]["name"], "DC0_F0_VM0");
    Ok(())
}

#[test]
fn inventory_text_without_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    #[allow(deprecated)]
    Command::cargo_bin("vsim")?
        .current_dir(dir.path())
        .env_remove("VSIM_CONFIG")
        .arg("inventory")
        .assert()
        .success()
        .stdout(predicate::str::contains("DC0_F0_VM1"))
        .stdout(predicate::str::contains("3 entities"));
    Ok(())
}

#[test]
fn watch_reports_enter_then_modify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    #[allow(deprecated)]
    Command::cargo_bin("vsim")?
        .current_dir(dir.path())
        .env_remove("VSIM_CONFIG")
        .args(["watch", "--power-on", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Enter"))
        .stdout(predicate::str::contains("Modify"))
        .stdout(predicate::str::contains("runtime.powerState=poweredOn"));
    Ok(())
}

#[test]
fn config_prints_effective_values() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("custom.yml"), "collector:\n  max_object_updates: 7\n")?;

    #[allow(deprecated)]
    Command::cargo_bin("vsim")?
        .current_dir(dir.path())
        .args(["--config", "custom.yml", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_object_updates: 7"))
        .stdout(predicate::str::contains("poll_interval_ms: 20"))
        .stdout(predicate::str::contains("lock_handoff: true"));
    Ok(())
}

#[test]
fn invalid_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("vsim.yml"), "tasks:\n  delay_jitter: 3\n")?;

    #[allow(deprecated)]
    Command::cargo_bin("vsim")?
        .current_dir(dir.path())
        .env_remove("VSIM_CONFIG")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("delay_jitter"));
    Ok(())
}
