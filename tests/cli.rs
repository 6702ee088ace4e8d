use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pdfchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pdfchat");
    path
}

/// Config with both providers disabled, so no command reaches the network.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("france.txt"),
        "The capital of France is Paris.",
    )
    .unwrap();
    fs::write(files_dir.join("notes.md"), "# Notes\n\nWine regions of France.").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/pdfchat.sqlite"

[embedding]
provider = "disabled"

[generation]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("pdfchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdfchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdfchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdfchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .join("files")
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/pdfchat.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_pdfchat(&config_path, &["init"]);
    let (_, _, second) = run_pdfchat(&config_path, &["init"]);
    assert!(first && second);
}

#[test]
fn test_collections_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["collections"]);
    assert!(success, "collections failed: {}", stderr);
    assert!(stdout.contains("No collections"));
}

#[test]
fn test_index_fails_cleanly_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (_, stderr, success) = run_pdfchat(&config_path, &["index", &files]);
    assert!(!success);
    assert!(
        stderr.contains("embedding service is unavailable"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_index_missing_path_errors() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pdfchat(&config_path, &["index", "/no/such/dir"]);
    assert!(!success);
    assert!(stderr.contains("No such file or directory"));
}

#[test]
fn test_clear_unknown_collection() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (stdout, stderr, success) = run_pdfchat(&config_path, &["clear", &files]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("No collection pdfs_"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n",
    )
    .unwrap();

    let (_, stderr, success) = run_pdfchat(&config_path, &["collections"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}
