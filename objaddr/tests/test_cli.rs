use std::process::Command;

fn objaddr() -> Command {
    Command::new(env!("CARGO_BIN_EXE_objaddr"))
}

#[test]
fn test_image_base_json() {
    let binary_path = env!("CARGO_BIN_EXE_objaddr");

    let output = objaddr()
        .args(["--image-base", binary_path, "--json"])
        .output()
        .expect("Failed to run objaddr");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).expect("Invalid UTF-8");
    let record: serde_json::Value = serde_json::from_str(stdout.trim()).expect("Invalid JSON");
    assert_eq!(record["path"], binary_path);
    assert!(record["image_base"].is_u64());
}

#[test]
#[cfg(target_os = "linux")]
fn test_unknown_address_resolves_to_empty_frame() {
    let output = objaddr().args(["--json", "0x10"]).output().expect("Failed to run objaddr");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).expect("Invalid UTF-8");
    let frame: serde_json::Value = serde_json::from_str(stdout.trim()).expect("Invalid JSON");
    assert_eq!(frame["raw_address"], 0x10);
    assert_eq!(frame["object_address"], 0);
    assert_eq!(frame["object_path"], "");
}

#[test]
fn test_invalid_address_is_usage_error() {
    let output = objaddr().arg("not-an-address").output().expect("Failed to run objaddr");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid address"));
}

#[test]
fn test_missing_arguments_is_usage_error() {
    let output = objaddr().output().expect("Failed to run objaddr");
    assert_eq!(output.status.code(), Some(2));
}
