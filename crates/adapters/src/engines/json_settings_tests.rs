// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn configure_creates_file_and_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".cursor").join("mcp.json");

    configure(&path).unwrap();
    assert!(is_configured(&path).unwrap());

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        raw["mcpServers"]["codemachine"]["command"],
        "codemachine"
    );
}

#[test]
fn configure_preserves_existing_servers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mcp.json");
    std::fs::write(
        &path,
        r#"{"mcpServers": {"other": {"command": "other-server"}}}"#,
    )
    .unwrap();

    configure(&path).unwrap();
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["mcpServers"]["other"]["command"], "other-server");
    assert!(raw["mcpServers"]["codemachine"].is_object());
}

#[test]
fn cleanup_removes_only_our_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mcp.json");
    std::fs::write(
        &path,
        r#"{"mcpServers": {"other": {"command": "other-server"}}}"#,
    )
    .unwrap();

    configure(&path).unwrap();
    cleanup(&path).unwrap();

    assert!(!is_configured(&path).unwrap());
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(raw["mcpServers"]["other"].is_object());
}

#[test]
fn missing_file_is_not_configured() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!is_configured(&dir.path().join("absent.json")).unwrap());
}
