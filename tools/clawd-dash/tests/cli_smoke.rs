use assert_cmd::cargo::cargo_bin_cmd;
use std::path::Path;

const MISSING_AGENT: &str = "clawd-dash-missing-agent-binary";

fn write_config(dir: &Path, agent: &str) -> std::path::PathBuf {
    let notes = dir.join("notes");
    std::fs::create_dir_all(&notes).expect("notes dir");
    let path = dir.join("clawd-dash.toml");
    let body = format!(
        "[agent]\nbinary = \"{agent}\"\nstatus_timeout_seconds = 5\ncron_timeout_seconds = 5\n\n\
         [memory]\ndir = \"{}\"\n\n[logging]\npath = \"{}\"\n",
        notes.display(),
        dir.join("logs/dashboard.jsonl").display(),
    );
    std::fs::write(&path, body).expect("write config");
    path
}

fn stdout_of(out: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(out.get_output().stdout.clone()).expect("utf8")
}

#[test]
fn help_lists_dashboard_flags() {
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    assert!(stdout.contains("--once"));
    assert!(stdout.contains("--agent-bin"));
    assert!(stdout.contains("--refresh-seconds"));
}

#[test]
fn once_with_missing_agent_renders_not_found_reasons() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), MISSING_AGENT);
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path())
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .arg("--width")
        .arg("140")
        .arg("--height")
        .arg("36");
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    assert!(stdout.contains("Status unavailable"), "{stdout}");
    assert!(stdout.contains("reason: NotFound"), "{stdout}");
    assert!(stdout.contains("No notes yet."), "{stdout}");
    assert!(temp.path().join("logs/dashboard.jsonl").exists());
}

#[test]
fn agent_bin_flag_overrides_config_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), "true");
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("--agent-bin")
        .arg(MISSING_AGENT);
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    assert!(stdout.contains("panel=session state=failed"), "{stdout}");
    assert!(stdout.contains("reason: NotFound"), "{stdout}");
}

#[test]
fn piped_stdout_falls_back_to_structured_lines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), MISSING_AGENT);
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path()).arg("--config").arg(&config);
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    for panel in ["session", "cron", "memory", "health", "actions"] {
        assert!(stdout.contains(&format!("panel={panel} ")), "missing {panel}: {stdout}");
    }
    assert!(stdout.contains("message=Standing by."));
}

#[test]
fn invalid_config_path_exits_nonzero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path())
        .arg("--once")
        .arg("--config")
        .arg(temp.path().join("missing.toml"));
    cmd.assert().failure();
}

#[test]
fn unknown_config_keys_are_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "[agent]\nbinnary = \"moltbot\"\n").expect("write");
    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path()).arg("--once").arg("--config").arg(&path);
    cmd.assert().failure();
}

#[cfg(unix)]
#[test]
fn scripted_agent_populates_session_and_cron_panels() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let script = temp.path().join("fake-agent");
    let status = include_str!("fixtures/status_flat_tokens.json").replace('\n', " ");
    let cron = include_str!("fixtures/cron_bare_array.json").replace('\n', " ");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nif [ \"$1\" = status ]; then\n  echo '{status}'\nelse\n  echo '{cron}'\nfi\n"
        ),
    )
    .expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    let config = write_config(temp.path(), &script.display().to_string());

    let mut cmd = cargo_bin_cmd!("clawd-dash");
    cmd.current_dir(temp.path())
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .arg("--width")
        .arg("160")
        .arg("--height")
        .arg("36");
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    assert!(stdout.contains("Model: claude-opus"), "{stdout}");
    assert!(stdout.contains("Uptime: 1d 01:00:00"), "{stdout}");
    assert!(stdout.contains("sync_memory"), "{stdout}");
}
