// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn layout() -> (tempfile::TempDir, StateLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure().unwrap();
    (dir, layout)
}

#[test]
fn first_monitoring_id_is_one() {
    let (_dir, layout) = layout();
    assert_eq!(allocate_monitoring_id(&layout).unwrap(), 1);
}

#[test]
fn monitoring_ids_count_past_existing_logs() {
    let (_dir, layout) = layout();
    std::fs::write(layout.log_file(1), b"").unwrap();
    std::fs::write(layout.log_file(7), b"").unwrap();
    std::fs::write(layout.logs_dir().join("junk.txt"), b"").unwrap();
    assert_eq!(allocate_monitoring_id(&layout).unwrap(), 8);
}

#[test]
fn append_writes_timestamped_lines() {
    let (_dir, layout) = layout();
    let mut writer = AgentLogWriter::open(&layout, 1).unwrap();
    writer.append("agent started").unwrap();
    writer.append("agent finished").unwrap();
    writer.flush().unwrap();

    let content = std::fs::read_to_string(layout.log_file(1)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("agent started"));
    assert!(lines[0].starts_with('['));
}

#[test]
fn append_is_append_only_across_reopens() {
    let (_dir, layout) = layout();
    {
        let mut writer = AgentLogWriter::open(&layout, 2).unwrap();
        writer.append("first run").unwrap();
    }
    {
        let mut writer = AgentLogWriter::open(&layout, 2).unwrap();
        writer.append("second run").unwrap();
    }
    let content = std::fs::read_to_string(layout.log_file(2)).unwrap();
    assert!(content.contains("first run"));
    assert!(content.contains("second run"));
}

#[test]
fn lock_blocks_second_writer() {
    let (_dir, layout) = layout();
    let _writer = AgentLogWriter::open(&layout, 3).unwrap();
    let err = AgentLogWriter::open(&layout, 3).unwrap_err();
    assert!(matches!(err, StorageError::LogLocked(3)));
}

#[test]
fn lock_released_on_drop() {
    let (_dir, layout) = layout();
    {
        let _writer = AgentLogWriter::open(&layout, 4).unwrap();
    }
    assert!(AgentLogWriter::open(&layout, 4).is_ok());
}

#[test]
fn mark_aborted_appends_marker() {
    let (_dir, layout) = layout();
    let mut writer = AgentLogWriter::open(&layout, 5).unwrap();
    writer.mark_aborted().unwrap();
    let content = std::fs::read_to_string(layout.log_file(5)).unwrap();
    assert!(content.contains("agent aborted"));
}
