//! Template and agent config loading against real files.

use cm_template::{validate, AgentRegistry, TemplateError, WorkflowTemplate};

fn write_project(dir: &std::path::Path) {
    std::fs::write(
        dir.join("workflow.toml"),
        r#"
name = "release"
tracks = ["backend"]

[[steps]]
type = "module"
agent_id = "builder"
tracks = ["backend"]

[[steps]]
type = "module"
agent_id = "reviewer"
execute_once = true
interactive = false
"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("agents.toml"),
        r#"
[[agents]]
id = "builder"
name = "Builder"
prompt_path = "prompts/builder.md"
engine = "codex"
model = "gpt-5-codex"

[[agents]]
id = "reviewer"
name = "Reviewer"
prompt_path = ["prompts/reviewer.md", "prompts/house-rules.md"]
"#,
    )
    .unwrap();
    let prompts = dir.join("prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    std::fs::write(prompts.join("builder.md"), "Build.").unwrap();
    std::fs::write(prompts.join("reviewer.md"), "Review.").unwrap();
    std::fs::write(prompts.join("house-rules.md"), "Follow the rules.").unwrap();
}

#[test]
fn template_resolves_agent_defaults() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());

    let template = WorkflowTemplate::load(&dir.path().join("workflow.toml")).unwrap();
    let agents = AgentRegistry::load(&dir.path().join("agents.toml")).unwrap();
    validate(&template, &agents, dir.path()).unwrap();

    let steps = template
        .module_steps(&agents, &["backend".into()], &[])
        .unwrap();
    assert_eq!(steps.len(), 2);

    // Engine and model flow from the agent definition.
    assert_eq!(steps[0].engine.as_deref(), Some("codex"));
    assert_eq!(steps[0].model.as_deref(), Some("gpt-5-codex"));

    // Multi-file prompt path resolved from the agent.
    assert_eq!(steps[1].prompt_paths.len(), 2);
    assert!(steps[1].execute_once);
    assert_eq!(steps[1].interactive, Some(false));
}

#[test]
fn prompt_merging_concatenates_files() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());

    let merged = cm_template::merge_prompt_files(
        dir.path(),
        &[
            "prompts/reviewer.md".into(),
            "prompts/house-rules.md".into(),
        ],
    )
    .unwrap();
    assert_eq!(merged, "Review.\n\nFollow the rules.");
}

#[test]
fn validation_catches_missing_prompt_files() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    std::fs::remove_file(dir.path().join("prompts/builder.md")).unwrap();

    let template = WorkflowTemplate::load(&dir.path().join("workflow.toml")).unwrap();
    let agents = AgentRegistry::load(&dir.path().join("agents.toml")).unwrap();
    let err = validate(&template, &agents, dir.path()).unwrap_err();
    assert!(matches!(err, TemplateError::MissingPromptFile(_)));
}
