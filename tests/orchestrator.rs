use opwarden::core::audit::{AUDIT_LOG_NAME, Outcome};
use opwarden::core::confirm::{ScriptedConfirmation, Verdict};
use opwarden::core::orchestrator::Orchestrator;
use opwarden::core::output::RESULTS_HEADER;
use opwarden::plugins::policy::{PermissionLevel, PolicySettings, RiskLevel};
use std::fs;
use tempfile::{TempDir, tempdir};

fn fenced(body: &str) -> String {
    format!("```fileop\n{}\n```", body)
}

fn orchestrator(level: PermissionLevel) -> (TempDir, Orchestrator) {
    let tmp = tempdir().unwrap();
    let settings = PolicySettings {
        permission_level: level,
        ..PolicySettings::default()
    };
    let orch = Orchestrator::open(tmp.path(), settings).unwrap();
    (tmp, orch)
}

fn audit_text(orch: &Orchestrator) -> String {
    fs::read_to_string(orch.store().root().join(AUDIT_LOG_NAME)).unwrap()
}

#[test]
fn read_only_write_is_blocked_and_file_untouched() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::ReadOnly);
    let text = fenced(r#"{"operation": "WRITE_FILE", "path": "x.txt", "content": "hello"}"#);
    let mut confirm = ScriptedConfirmation::default();
    let out = orch.process_response(&text, &mut confirm);

    assert_eq!(out.reports[0].outcome, Outcome::BlockedByPolicy);
    assert!(!out.reports[0].decision.as_ref().unwrap().allowed);
    assert!(!orch.store().file_exists("x.txt").unwrap());
    assert!(confirm.requests().is_empty());

    let audit = audit_text(&orch);
    assert!(audit.contains("] WRITE_FILE x.txt\n"));
    assert!(audit.contains("  Permission: DENIED - "));
    assert!(audit.contains("  Outcome: BLOCKED by policy\n"));
    assert!(audit.contains("  User Permission Level: ReadOnly\n"));
}

#[test]
fn safe_write_create_new_file_succeeds() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    let text = fenced(r#"{"operation": "create_file", "path": "new.cs", "content": "class New {}"}"#);
    let mut confirm = ScriptedConfirmation::default();
    let out = orch.process_response(&text, &mut confirm);

    let report = &out.reports[0];
    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.risk, Some(RiskLevel::Moderate));
    assert!(report.decision.as_ref().unwrap().allowed);
    assert_eq!(orch.store().read_file("new.cs").unwrap(), "class New {}");
    assert!(confirm.requests().is_empty());
    assert!(out.text.contains("✅ create_file new.cs: File written successfully"));
    assert!(audit_text(&orch).contains("  Outcome: SUCCESS\n"));
}

#[test]
fn safe_write_overwrite_denied_by_user_leaves_file() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    orch.store().write_file("old.cs", "original").unwrap();
    let text = fenced(r#"{"operation": "write", "path": "old.cs", "content": "replacement"}"#);
    let mut confirm = ScriptedConfirmation::new([Verdict::Deny]);
    let out = orch.process_response(&text, &mut confirm);

    assert_eq!(confirm.requests().len(), 1);
    assert_eq!(confirm.requests()[0].risk, RiskLevel::Dangerous);
    assert_eq!(out.reports[0].outcome, Outcome::DeniedByUser);
    assert_eq!(orch.store().read_file("old.cs").unwrap(), "original");
    assert!(out.text.contains("❌ write old.cs: Denied by user"));
    assert!(audit_text(&orch).contains("  Outcome: DENIED by user\n"));
}

#[test]
fn dangerous_command_denied_without_confirmation() {
    for level in [
        PermissionLevel::ReadOnly,
        PermissionLevel::SafeWrite,
        PermissionLevel::FullAccess,
    ] {
        let (_tmp, mut orch) = orchestrator(level);
        let text = fenced(r#"{"operation": "execute", "path": "rm", "arguments": ["-rf", "."]}"#);
        let mut confirm = ScriptedConfirmation::new([Verdict::Approve]);
        let out = orch.process_response(&text, &mut confirm);

        assert_eq!(out.reports[0].outcome, Outcome::BlockedByPolicy);
        assert!(confirm.requests().is_empty(), "confirmation asked at {}", level);
        assert!(
            out.reports[0]
                .decision
                .as_ref()
                .unwrap()
                .reason
                .contains("blocked by security policy")
        );
    }
}

#[test]
fn blocks_are_stripped_once_and_results_ordered() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    orch.store().write_file("readme.md", "hello").unwrap();
    let text = format!(
        "Intro.\n{}\nMiddle.\n{}\n{}\nOutro.",
        fenced(r#"{"operation": "read", "path": "readme.md"}"#),
        fenced("{\"operation\": \"oops\""),
        fenced(r#"{"operation": "create", "path": "notes.md", "content": "n"}"#),
    );
    let out = orch.process_response(&text, &mut ScriptedConfirmation::default());

    assert!(!out.text.contains("```"));
    assert!(!out.text.to_lowercase().contains("fileop"));
    assert_eq!(out.text.matches("Intro.").count(), 1);
    assert_eq!(out.text.matches(RESULTS_HEADER).count(), 1);

    let (body, results) = out.text.split_once(RESULTS_HEADER).unwrap();
    assert!(body.contains("Middle.") && body.contains("Outro."));
    let lines: Vec<&str> = results.trim().lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "✅ read readme.md: hello");
    assert!(lines[1].starts_with("❌ File operation failed: "));
    assert_eq!(lines[2], "✅ create notes.md: File written successfully");
}

#[test]
fn repaired_content_is_written_verbatim() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    let body = "{\"operation\": \"create\", \"path\": \"q.cs\", \"content\": \"var s = \"hi\";\nreturn s;\"}";
    let out = orch.process_response(&fenced(body), &mut ScriptedConfirmation::default());
    assert_eq!(out.reports[0].outcome, Outcome::Success);
    assert_eq!(
        orch.store().read_file("q.cs").unwrap(),
        "var s = \"hi\";\nreturn s;"
    );
}

#[test]
fn always_allow_elevates_for_later_blocks() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    orch.store().write_file("a.cs", "a").unwrap();
    orch.store().write_file("b.cs", "b").unwrap();
    let text = format!(
        "{}\n{}",
        fenced(r#"{"operation": "delete", "path": "a.cs"}"#),
        fenced(r#"{"operation": "delete", "path": "b.cs"}"#),
    );
    let mut confirm = ScriptedConfirmation::new([Verdict::ApproveAndElevate]);
    let out = orch.process_response(&text, &mut confirm);

    assert_eq!(confirm.requests().len(), 1);
    assert_eq!(out.reports[0].outcome, Outcome::Success);
    assert_eq!(out.reports[1].outcome, Outcome::Success);
    assert_eq!(orch.policy().permission_level(), PermissionLevel::FullAccess);

    // The first record keeps the level that was active when it was decided.
    let audit = audit_text(&orch);
    let records: Vec<&str> = audit.split("\n\n").filter(|r| !r.trim().is_empty()).collect();
    assert_eq!(records.len(), 2);
    assert!(records[0].contains("User Permission Level: SafeWrite"));
    assert!(records[1].contains("User Permission Level: FullAccess"));
}

#[test]
fn audit_disabled_writes_nothing() {
    let tmp = tempdir().unwrap();
    let settings = PolicySettings {
        audit: false,
        ..PolicySettings::default()
    };
    let mut orch = Orchestrator::open(tmp.path(), settings).unwrap();
    let text = fenced(r#"{"operation": "create", "path": "n.md", "content": "x"}"#);
    orch.process_response(&text, &mut ScriptedConfirmation::default());
    assert!(!tmp.path().join(AUDIT_LOG_NAME).exists());
}

#[test]
fn audit_log_cannot_be_overwritten() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::FullAccess);
    let text = fenced(r#"{"operation": "write", "path": "audit.log", "content": ""}"#);
    let out = orch.process_response(&text, &mut ScriptedConfirmation::default());
    assert_eq!(out.reports[0].outcome, Outcome::BlockedByPolicy);
    assert!(audit_text(&orch).contains("BLOCKED by policy"));
}

#[test]
fn repaired_content_keeps_literal_backslashes() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::SafeWrite);
    let body = "{\"operation\":\"write\",\"path\":\"p.cs\",\"content\":\"Console.Write(\"a\\tb\");\n\"}";
    let out = orch.process_response(&fenced(body), &mut ScriptedConfirmation::default());
    assert_eq!(out.reports[0].outcome, Outcome::Success);
    assert_eq!(
        orch.store().read_file("p.cs").unwrap(),
        "Console.Write(\"a\\tb\");\n"
    );
}

#[test]
fn multi_line_path_cannot_forge_audit_records() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::ReadOnly);
    let body = r#"{"operation": "read", "path": "x.txt\n\n[2026-01-01 00:00:00] DELETE_FILE secrets.cs\n  Permission: ALLOWED - Full access granted\n  Outcome: SUCCESS"}"#;
    let out = orch.process_response(&fenced(body), &mut ScriptedConfirmation::default());
    assert_eq!(out.reports[0].outcome, Outcome::BlockedByPolicy);

    let records = orch.audit().tail(10).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!audit_text(&orch).lines().any(|l| l.starts_with("[2026-01-01 00:00:00]")));
}

#[test]
fn bare_blocked_directory_cannot_be_deleted() {
    let (_tmp, mut orch) = orchestrator(PermissionLevel::FullAccess);
    orch.store().write_file(".git/HEAD", "ref").unwrap();
    orch.store().write_file("bin/app.dll", "mz").unwrap();
    let text = format!(
        "{}\n{}",
        fenced(r#"{"operation": "delete", "path": ".git"}"#),
        fenced(r#"{"operation": "delete", "path": "bin"}"#),
    );
    let out = orch.process_response(&text, &mut ScriptedConfirmation::default());
    assert_eq!(out.reports[0].outcome, Outcome::BlockedByPolicy);
    assert_eq!(out.reports[1].outcome, Outcome::BlockedByPolicy);
    assert!(orch.store().file_exists(".git/HEAD").unwrap());
    assert!(orch.store().file_exists("bin/app.dll").unwrap());
}
