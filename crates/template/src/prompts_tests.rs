// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn single_file_is_loaded_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "You are an architect.\n").unwrap();

    let merged = merge_prompt_files(dir.path(), &[PathBuf::from("a.md")]).unwrap();
    assert_eq!(merged, "You are an architect.");
}

#[test]
fn multiple_files_concatenate_with_blank_line() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "Part one.\n").unwrap();
    std::fs::write(dir.path().join("b.md"), "Part two.\n").unwrap();

    let merged =
        merge_prompt_files(dir.path(), &[PathBuf::from("a.md"), PathBuf::from("b.md")]).unwrap();
    assert_eq!(merged, "Part one.\n\nPart two.");
}

#[test]
fn missing_file_is_a_dedicated_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = merge_prompt_files(dir.path(), &[PathBuf::from("nope.md")]).unwrap_err();
    assert!(matches!(err, TemplateError::MissingPromptFile(_)));
}

#[test]
fn absolute_paths_bypass_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("abs.md");
    std::fs::write(&abs, "absolute").unwrap();

    let merged = merge_prompt_files(Path::new("/unrelated"), &[abs]).unwrap();
    assert_eq!(merged, "absolute");
}

#[test]
fn path_list_untagged_forms() {
    let one: PathList = toml::from_str::<toml::Value>("v = \"a.md\"")
        .unwrap()
        .get("v")
        .cloned()
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(one.into_vec(), vec![PathBuf::from("a.md")]);

    let many: PathList = toml::from_str::<toml::Value>("v = [\"a.md\", \"b.md\"]")
        .unwrap()
        .get("v")
        .cloned()
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(many.into_vec().len(), 2);
}
