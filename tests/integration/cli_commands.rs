#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn pagelist(config_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pagelist");
    cmd.env("PAGELIST_CONFIG", config_dir.join("absent.toml"));
    cmd
}

fn json_output(config_dir: &Path, args: &[&str], store: &Path) -> Value {
    let output = pagelist(config_dir)
        .args(["--format", "json"])
        .args(args)
        .arg(store)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

#[test]
fn init_recycle_take_across_invocations() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");

    let init = json_output(dir.path(), &["init"], &store);
    assert_eq!(init["page_size"].as_u64(), Some(8192));

    let recycled = json_output(dir.path(), &["recycle", "--count", "3"], &store);
    assert_eq!(recycled["pages"].as_array().map(Vec::len), Some(3));
    assert_eq!(recycled["recycled_pages"].as_u64(), Some(3));

    let stats = json_output(dir.path(), &["stats"], &store);
    assert_eq!(stats["list"]["buckets"][0]["stored_pages"].as_u64(), Some(3));
    assert_eq!(stats["list"]["buckets"][0]["cached_pages"].as_u64(), Some(0));

    let taken = json_output(dir.path(), &["take", "--count", "5"], &store);
    assert_eq!(taken["pages"].as_array().map(Vec::len), Some(3));
    assert_eq!(taken["recycled_pages"].as_u64(), Some(0));
    assert_eq!(page_ids(&taken), page_ids(&recycled));
}

fn page_ids(report: &Value) -> Vec<u64> {
    let mut ids: Vec<u64> = report["pages"]
        .as_array()
        .expect("pages array")
        .iter()
        .filter_map(Value::as_u64)
        .collect();
    ids.sort_unstable();
    ids
}

#[test]
fn text_output_reports_pages() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");
    pagelist(dir.path())
        .arg("init")
        .arg(&store)
        .assert()
        .success();
    let output = pagelist(dir.path())
        .args(["recycle", "--count", "2"])
        .arg(&store)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("recycled 2 page(s)"), "{text}");
    assert!(text.contains("recycled_pages=2"), "{text}");
}

#[test]
fn commands_require_an_initialized_store() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");
    let output = pagelist(dir.path())
        .arg("stats")
        .arg(&store)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("error:"));

    pagelist(dir.path()).arg("init").arg(&store).assert().success();
    pagelist(dir.path()).arg("init").arg(&store).assert().failure();
}

#[test]
fn config_file_sets_page_size() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[store]\npage_size = 1024\n\n[list]\nname = \"cli\"\ngroup = 4\n")
        .expect("write config");

    let output = cargo_bin_cmd!("pagelist")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "init"])
        .arg(&store)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let init: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(init["page_size"].as_u64(), Some(1024));
    assert!(store.join("part-4-ffff.pages").exists());

    let output = cargo_bin_cmd!("pagelist")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "stats"])
        .arg(&store)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stats: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(stats["list"]["name"].as_str(), Some("cli"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[store]\npage_size = 1000\n").expect("write config");
    let output = cargo_bin_cmd!("pagelist")
        .arg("--config")
        .arg(&config)
        .arg("init")
        .arg(dir.path().join("store"))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("store.page_size"));
}

#[test]
fn stress_conserves_pages() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");
    json_output(dir.path(), &["init"], &store);
    json_output(dir.path(), &["recycle", "--count", "16"], &store);

    let report = json_output(
        dir.path(),
        &["stress", "--threads", "4", "--ops", "300", "--seed", "9"],
        &store,
    );
    assert_eq!(report["conserved"].as_bool(), Some(true));
    let puts = report["puts"].as_u64().unwrap();
    let takes = report["takes"].as_u64().unwrap();
    assert_eq!(
        report["recycled_before"].as_u64().unwrap() + puts,
        report["recycled_after"].as_u64().unwrap() + takes
    );

    let stats = json_output(dir.path(), &["stats"], &store);
    assert_eq!(
        stats["list"]["buckets"][0]["stored_pages"].as_u64(),
        report["recycled_after"].as_u64()
    );
}

#[test]
fn stress_under_a_shared_cache_limit() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("store");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[list]\ncache_pages_per_bucket = 64\ncache_limit_pages = 2\n",
    )
    .expect("write config");
    let run = |args: &[&str]| -> Value {
        let output = cargo_bin_cmd!("pagelist")
            .arg("--config")
            .arg(&config)
            .args(["--format", "json"])
            .args(args)
            .arg(&store)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json output")
    };

    run(&["init"]);
    run(&["recycle", "--count", "8"]);
    let report = run(&["stress", "--threads", "4", "--ops", "200", "--seed", "3"]);
    assert_eq!(report["conserved"].as_bool(), Some(true));
    let stats = run(&["stats"]);
    assert_eq!(
        stats["list"]["buckets"][0]["stored_pages"].as_u64(),
        report["recycled_after"].as_u64()
    );
}
