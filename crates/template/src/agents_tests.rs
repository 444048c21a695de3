// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const AGENTS: &str = r#"
[[agents]]
id = "architect"
name = "Architect"
description = "Designs the system"
prompt_path = "prompts/architect.md"
engine = "codex"
model = "gpt-5-codex"

[[agents]]
id = "implementer"
name = "Implementer"
prompt_path = "prompts/implementer.md"
chained_prompts_path = [
    "prompts/impl-verify.md",
    { path = "prompts/impl-ui.md", conditions = ["with-ui"] },
]

[[agents]]
id = "controller"
name = "Controller"
role = "controller"
prompt_path = "prompts/controller.md"
"#;

fn registry(dir: &Path) -> AgentRegistry {
    let path = dir.join("agents.toml");
    std::fs::write(&path, AGENTS).unwrap();
    AgentRegistry::load(&path).unwrap()
}

#[test]
fn load_indexes_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());

    assert_eq!(registry.len(), 3);
    let architect = registry.get(&AgentId::new("architect")).unwrap();
    assert_eq!(architect.name, "Architect");
    assert_eq!(architect.engine.as_deref(), Some("codex"));
}

#[test]
fn controller_lookup_by_role() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    assert_eq!(
        registry.controller().map(|a| a.id.as_str()),
        Some("controller")
    );
}

#[test]
fn duplicate_ids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.toml");
    std::fs::write(
        &path,
        r#"
[[agents]]
id = "a"
name = "A"
prompt_path = "a.md"

[[agents]]
id = "a"
name = "A again"
prompt_path = "a.md"
"#,
    )
    .unwrap();
    let err = AgentRegistry::load(&path).unwrap_err();
    assert!(matches!(err, TemplateError::Validation(_)));
}

#[test]
fn chained_prompts_respect_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let implementer = registry.get(&AgentId::new("implementer")).unwrap();

    let chained = implementer.chained_prompts_path.as_ref().unwrap();
    assert_eq!(
        chained.resolve(&[]),
        vec![PathBuf::from("prompts/impl-verify.md")]
    );
    assert_eq!(chained.resolve(&["with-ui".to_string()]).len(), 2);
}

#[test]
fn queued_prompts_load_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
    std::fs::write(
        dir.path().join("prompts/impl-verify.md"),
        "Verify your work.\n",
    )
    .unwrap();

    let implementer = registry.get(&AgentId::new("implementer")).unwrap();
    let prompts = implementer.queued_prompts(dir.path(), &[]).unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].name, "impl-verify");
    assert_eq!(prompts[0].content, "Verify your work.");
}

#[test]
fn missing_chained_prompt_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let implementer = registry.get(&AgentId::new("implementer")).unwrap();
    let err = implementer.queued_prompts(dir.path(), &[]).unwrap_err();
    assert!(matches!(err, TemplateError::MissingPromptFile(_)));
}

#[test]
fn agent_without_chained_prompts_has_empty_queue() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let architect = registry.get(&AgentId::new("architect")).unwrap();
    assert!(architect.queued_prompts(dir.path(), &[]).unwrap().is_empty());
}

#[test]
fn single_path_form_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.toml");
    std::fs::write(
        &path,
        r#"
[[agents]]
id = "a"
name = "A"
prompt_path = "a.md"
chained_prompts_path = "follow.md"
"#,
    )
    .unwrap();
    let registry = AgentRegistry::load(&path).unwrap();
    let chained = registry
        .get(&AgentId::new("a"))
        .unwrap()
        .chained_prompts_path
        .clone()
        .unwrap();
    assert_eq!(chained.resolve(&[]), vec![PathBuf::from("follow.md")]);
}
