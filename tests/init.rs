use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "lexrag init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".lexrag.toml");
    assert!(config_path.exists(), ".lexrag.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[llm]"));
    assert!(content.contains("[retrieval]"));

    // Every option is commented out, so the template parses to the defaults.
    let config: lexrag_core::LexConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.retrieval.k, 5);
    config.validate().unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".lexrag.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn search_without_index_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .args(["search", "section 69"])
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lexrag index"), "stderr: {stderr}");
}

#[test]
fn doctor_reports_json_checks() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .args(["doctor", "--format", "json"])
        .current_dir(dir.path())
        .env_remove("GROQ_API_KEY")
        .output()
        .unwrap();

    assert!(output.status.success(), "lexrag doctor failed: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let checks = report["checks"].as_array().unwrap();
    let llm_key = checks.iter().find(|c| c["name"] == "llm_api_key").unwrap();
    assert_eq!(llm_key["status"], "fail");
    let index = checks.iter().find(|c| c["name"] == "statute_index").unwrap();
    assert_eq!(index["status"], "info");
}

#[test]
fn invalid_label_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".lexrag.toml"), "[index]\nlabel = \"Clause\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .arg("doctor")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn failed_index_build_is_reported_as_not_built() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".lexrag.toml"),
        "[embedding]\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 5\n\n[index]\ncorpus = \"bns.json\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("bns.json"),
        r#"[{"bns_section": "303", "subject": "Theft", "extra_data": "Whoever, intending to take dishonestly any movable property ..."}]"#,
    )
    .unwrap();

    let index = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .arg("index")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!index.status.success());
    assert!(dir.path().join(".lexrag/index.db").exists());

    let search = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .args(["search", "section 303"])
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(!search.status.success());
    let stderr = String::from_utf8_lossy(&search.stderr);
    assert!(stderr.contains("has not been built"), "stderr: {stderr}");

    let doctor = Command::new(env!("CARGO_BIN_EXE_lexrag"))
        .args(["doctor", "--format", "json"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&doctor.stdout).unwrap();
    let checks = report["checks"].as_array().unwrap();
    let index = checks.iter().find(|c| c["name"] == "statute_index").unwrap();
    assert_eq!(index["status"], "fail");
}
