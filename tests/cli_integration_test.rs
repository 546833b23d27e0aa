use std::fs;
use std::process::Command;
use tempfile::TempDir;

const BINARY: &str = env!("CARGO_BIN_EXE_xform-formlist");

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn test_cli_local_files() {
    let output = Command::new(BINARY)
        .arg("--download-url")
        .arg("https://example.com/forms/${formId}.xml")
        .arg(fixture("birds.xml"))
        .arg(fixture("geo_tagger.xml"))
        .output()
        .expect("Failed to run xform-formlist");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        println!("STDOUT: {}", stdout);
        println!("STDERR: {}", stderr);
    }

    assert!(output.status.success());
    assert!(stdout.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(stdout.contains("<formId>birds</formId>"));
    assert!(stdout.contains("<downloadUrl>https://example.com/forms/geo_tagger_v2.xml</downloadUrl>"));
    assert!(stdout.find("birds").unwrap() < stdout.find("geo_tagger_v2").unwrap());
}

#[test]
fn test_cli_writes_output_file() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("formList.xml");

    let output = Command::new(BINARY)
        .arg("-o")
        .arg(&output_path)
        .arg(fixture("widgets.xml"))
        .output()
        .expect("Failed to run xform-formlist");

    assert!(output.status.success());
    let written = fs::read_to_string(&output_path).unwrap();
    assert!(written.contains("<formId>widgets</formId>"));
    assert!(written.ends_with("</xforms>"));
}

#[test]
fn test_cli_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("formlist.toml");
    fs::write(
        &config_path,
        "manifest_url = \"https://example.com/manifest/${formId}\"\n",
    )
    .unwrap();

    let output = Command::new(BINARY)
        .arg("--config")
        .arg(&config_path)
        .arg(fixture("widgets.xml"))
        .output()
        .expect("Failed to run xform-formlist");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<manifestUrl>https://example.com/manifest/widgets</manifestUrl>"));
}

#[test]
fn test_cli_missing_file() {
    let output = Command::new(BINARY)
        .arg("/nonexistent/path/that/really/should/not/exist.xml")
        .output()
        .expect("Failed to run xform-formlist");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to open form source"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(BINARY)
        .arg("--help")
        .output()
        .expect("Failed to run xform-formlist");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}
