use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn parse_jsonl(stdout: &[u8]) -> Vec<Value> {
    let s = String::from_utf8_lossy(stdout);
    s.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).expect("valid jsonl line"))
        .collect()
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn prewarm(cache_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("prewarm"));
    cmd.env_remove("PREWARM_COMPILER")
        .env_remove("PREWARM_LOAD_PATH")
        .env_remove("PREWARM_ENV")
        .env_remove("PREWARM_DEVELOPMENT")
        .env_remove("PREWARM_READONLY")
        .env_remove("PREWARM_REVALIDATE")
        .arg("--cache-dir")
        .arg(cache_dir);
    cmd
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

#[test]
fn scan_lists_requirables_then_dirs() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("lib");
    write_file(&root.join("b.rb"), "");
    write_file(&root.join("a.rb"), "");
    write_file(&root.join("sub/c.rb"), "");
    write_file(&root.join("README.md"), "");

    let assert = prewarm(&temp.path().join("cache"))
        .arg("scan")
        .arg(&root)
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);

    let listed: Vec<_> = items
        .iter()
        .map(|v| (str_field(v, "kind").to_string(), str_field(v, "path").to_string()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("file".to_string(), "a.rb".to_string()),
            ("file".to_string(), "b.rb".to_string()),
            ("file".to_string(), "sub/c.rb".to_string()),
            ("dir".to_string(), "sub".to_string()),
        ]
    );
}

#[test]
fn scan_rejects_missing_root() {
    let temp = tempdir().unwrap();
    prewarm(&temp.path().join("cache"))
        .arg("scan")
        .arg(temp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn resolve_reports_each_outcome() {
    let temp = tempdir().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");
    write_file(&first.join("conflict.rb"), "");
    write_file(&second.join("conflict.rb"), "");
    write_file(&second.join("only/second.rb"), "");

    let load_path = format!("{}:{}", first.display(), second.display());
    let assert = prewarm(&temp.path().join("cache"))
        .arg("resolve")
        .args(["conflict", "only/second", "thread", "missing"])
        .arg("--load-path")
        .arg(load_path)
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 4);

    assert_eq!(str_field(&items[0], "status"), "found");
    assert!(str_field(&items[0], "path").ends_with("first/conflict.rb"));
    assert_eq!(str_field(&items[1], "status"), "found");
    assert!(str_field(&items[1], "path").ends_with("second/only/second.rb"));
    assert_eq!(str_field(&items[2], "status"), "suppressed");
    assert_eq!(str_field(&items[3], "status"), "not_found");

    assert!(temp.path().join("cache/load-path-cache").is_file());
}

#[test]
fn resolve_in_development_mode_falls_back() {
    let temp = tempdir().unwrap();
    let lib = temp.path().join("lib");
    fs::create_dir_all(&lib).unwrap();

    let assert = prewarm(&temp.path().join("cache"))
        .arg("--development")
        .arg("resolve")
        .arg("missing")
        .arg("--load-path")
        .arg(&lib)
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(str_field(&items[0], "status"), "fallback");
}

#[test]
fn precompile_inline_then_inspect_hits() {
    let temp = tempdir().unwrap();
    let app = temp.path().join("app");
    let cache = temp.path().join("cache");
    write_file(&app.join("models/user.rb"), "class User; end");
    write_file(&app.join("config/settings.yml"), "a: 1\nb: [1, 2]\n");
    write_file(&app.join("config/locale.json"), "{\"hello\": \"world\"}");
    write_file(&app.join("notes.txt"), "skip me");

    let assert = prewarm(&cache)
        .arg("precompile")
        .arg(&app)
        .args(["--jobs", "0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("3 compiled"));
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|v| str_field(v, "status") == "ok"));

    assert!(cache.join("compile-cache").is_dir());
    assert!(cache.join("compile-cache-yaml").is_dir());
    assert!(cache.join("compile-cache-json").is_dir());

    let assert = prewarm(&cache)
        .arg("inspect")
        .arg(app.join("config/settings.yml"))
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 1);
    assert_eq!(str_field(&items[0], "kind"), "entry");
    assert_eq!(str_field(&items[0], "status"), "hit");
    let data = items[0].get("data").unwrap();
    assert_eq!(data["exists"], Value::Bool(true));
    assert_eq!(data["kind"], Value::String("yaml".into()));
    assert_eq!(data["stored"], data["current"]);
}

#[test]
fn precompile_with_worker_processes() {
    let temp = tempdir().unwrap();
    let lib = temp.path().join("lib");
    let cache = temp.path().join("cache");
    for i in 0..6 {
        write_file(&lib.join(format!("f{i}.rb")), &format!("x = {i}"));
    }

    let assert = prewarm(&cache)
        .args(["--format", "json"])
        .arg("precompile")
        .arg(&lib)
        .args(["--jobs", "2", "--kinds", "source"])
        .assert()
        .success();
    let items: Vec<Value> = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(items.len(), 6);

    for i in 0..6 {
        prewarm(&cache)
            .arg("inspect")
            .arg(lib.join(format!("f{i}.rb")))
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\":\"hit\""));
    }
}

#[test]
fn precompile_failure_exits_nonzero() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config");
    write_file(&config.join("good.json"), "[1, 2, 3]");
    write_file(&config.join("bad.json"), "{ nope");

    for jobs in ["0", "2"] {
        let assert = prewarm(&temp.path().join("cache"))
            .arg("precompile")
            .arg(&config)
            .args(["--jobs", jobs])
            .assert()
            .code(1);
        let items = parse_jsonl(&assert.get_output().stdout);
        let failed: Vec<_> = items
            .iter()
            .filter(|v| str_field(v, "status") == "failed")
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(str_field(failed[0], "path").ends_with("bad.json"));
        assert_eq!(failed[0]["errors"][0]["code"], "UNCOMPILABLE");
    }
}

#[test]
fn precompile_exclude_skips_matching_paths() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("proj");
    write_file(&root.join("lib/a.rb"), "");
    write_file(&root.join("spec/a_spec.rb"), "");

    let assert = prewarm(&temp.path().join("cache"))
        .arg("precompile")
        .arg(&root)
        .args(["--jobs", "0", "--exclude", "/spec(/|$)"])
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 1);
    assert!(str_field(&items[0], "path").ends_with("lib/a.rb"));
}

#[cfg(unix)]
#[test]
fn precompile_uses_external_compiler() {
    let temp = tempdir().unwrap();
    let lib = temp.path().join("lib");
    let cache = temp.path().join("cache");
    write_file(&lib.join("ok.rb"), "x = 1");

    prewarm(&cache)
        .arg("precompile")
        .arg(&lib)
        .args(["--jobs", "1", "--compiler", "tr a-z A-Z"])
        .assert()
        .success();

    let assert = prewarm(&cache)
        .arg("inspect")
        .arg(lib.join("ok.rb"))
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    let entry = str_field(&items[0], "path").to_string();
    let bytes = fs::read(entry).unwrap();
    assert_eq!(&bytes[64..], b"X = 1");
}

#[test]
fn inspect_reports_miss_before_precompile() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("a.rb");
    write_file(&file, "x");

    let assert = prewarm(&temp.path().join("cache"))
        .arg("inspect")
        .arg(&file)
        .assert()
        .success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(str_field(&items[0], "status"), "miss");
    assert_eq!(items[0]["data"]["exists"], Value::Bool(false));
}

#[test]
fn inspect_requires_known_kind() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("notes.txt");
    write_file(&file, "x");

    prewarm(&temp.path().join("cache"))
        .arg("inspect")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--kind"));
}

#[test]
fn clear_removes_every_cache() {
    let temp = tempdir().unwrap();
    let lib = temp.path().join("lib");
    let cache = temp.path().join("cache");
    write_file(&lib.join("a.rb"), "x");
    write_file(&lib.join("b.yml"), "a: 1");

    prewarm(&cache)
        .arg("precompile")
        .arg(&lib)
        .args(["--jobs", "0"])
        .assert()
        .success();
    prewarm(&cache)
        .arg("resolve")
        .arg("a")
        .arg("--load-path")
        .arg(&lib)
        .assert()
        .success();
    assert!(cache.join("load-path-cache").is_file());

    let assert = prewarm(&cache).arg("clear").assert().success();
    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|v| str_field(v, "status") == "cleared"));

    assert!(!cache.join("compile-cache").exists());
    assert!(!cache.join("compile-cache-yaml").exists());
    assert!(!cache.join("load-path-cache").exists());
}

#[test]
fn readonly_precompile_writes_nothing() {
    let temp = tempdir().unwrap();
    let lib = temp.path().join("lib");
    let cache = temp.path().join("cache");
    write_file(&lib.join("a.rb"), "x");

    prewarm(&cache)
        .arg("--readonly")
        .arg("precompile")
        .arg(&lib)
        .args(["--jobs", "0"])
        .assert()
        .success();
    assert!(!cache.join("compile-cache").exists());
}
