use opwarden::core::gatekeeper::check_operation;
use opwarden::core::operation::{Operation, OperationKind};
use opwarden::core::store::Store;
use opwarden::plugins::policy::{
    DecisionStage, PermissionLevel, PolicySettings, PolicyState, RiskLevel, classify, preview,
};
use tempfile::tempdir;

const LEVELS: [PermissionLevel; 3] = [
    PermissionLevel::ReadOnly,
    PermissionLevel::SafeWrite,
    PermissionLevel::FullAccess,
];

fn state(level: PermissionLevel) -> PolicyState {
    PolicyState::new(PolicySettings {
        permission_level: level,
        ..PolicySettings::default()
    })
}

fn operations() -> Vec<Operation> {
    vec![
        Operation::new("read_file", "src/a.cs"),
        Operation::new("list", "."),
        Operation::new("write", "src/a.cs").with_content("x"),
        Operation::new("write", "fresh.cs").with_content("x"),
        Operation::new("create", "run.sh").with_content("x"),
        Operation::new("delete", "src/a.cs"),
        Operation::new("delete", "bin/app.dll"),
        Operation::new("write", ".git/config").with_content("x"),
        Operation::new("execute", "rm").with_arguments(["-rf", "."]),
        Operation::new("RUN_COMMAND", "Format.exe"),
        Operation::new("execute", "dotnet").with_arguments(["build"]),
        Operation::new("delete", "audit.log"),
        Operation::new("frobnicate", "notes.md"),
    ]
}

#[test]
fn test_allowed_implies_block_list_passed() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    store.write_file("src/a.cs", "class A {}").unwrap();

    for level in LEVELS {
        let state = state(level);
        for op in operations() {
            let assessment = state.assess(&op, &store).unwrap();
            let gate = check_operation(&op, state.settings());
            if assessment.decision.allowed {
                assert!(gate.passed, "{} allowed at {} despite block list", op.label(), level);
            }
            if !gate.passed {
                assert_eq!(assessment.decision.stage, DecisionStage::BlockList);
                assert!(!assessment.decision.requires_confirmation);
            }
        }
    }
}

#[test]
fn test_classify_fixed_rows() {
    for exists in [false, true] {
        for dangerous in [false, true] {
            assert_eq!(classify(OperationKind::Read, exists, dangerous), RiskLevel::Safe);
            assert_eq!(classify(OperationKind::List, exists, dangerous), RiskLevel::Safe);
            assert_eq!(classify(OperationKind::Delete, exists, dangerous), RiskLevel::Dangerous);
        }
    }
    assert_eq!(classify(OperationKind::Write, false, false), RiskLevel::Moderate);
    assert_eq!(classify(OperationKind::Create, true, false), RiskLevel::Dangerous);
    assert_eq!(classify(OperationKind::Execute, false, true), RiskLevel::Dangerous);
    assert_eq!(classify(OperationKind::Execute, false, false), RiskLevel::Moderate);
}

#[test]
fn test_write_risk_depends_on_target() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    store.write_file("old.cs", "old").unwrap();
    let state = state(PermissionLevel::SafeWrite);

    let new = state
        .assess(&Operation::new("write", "new.cs").with_content("x"), &store)
        .unwrap();
    assert_eq!(new.risk, RiskLevel::Moderate);
    assert!(new.decision.allowed);

    let old = state
        .assess(&Operation::new("write", "old.cs").with_content("x"), &store)
        .unwrap();
    assert_eq!(old.risk, RiskLevel::Dangerous);
    assert!(!old.decision.allowed);
    assert!(old.decision.requires_confirmation);
}

#[test]
fn test_dangerous_command_is_hard_deny_by_default() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let op = Operation::new("execute", "rm");
    for level in LEVELS {
        let assessment = state(level).assess(&op, &store).unwrap();
        assert!(!assessment.decision.allowed);
        assert_eq!(assessment.decision.stage, DecisionStage::BlockList);
        assert!(assessment.decision.reason.contains("blocked by security policy"));
    }
}

#[test]
fn test_confirmable_dangerous_command_reaches_permission_table() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let state = PolicyState::new(PolicySettings {
        dangerous_commands_confirmable: true,
        ..PolicySettings::default()
    });
    let assessment = state.assess(&Operation::new("execute", "rm"), &store).unwrap();
    assert_eq!(assessment.risk, RiskLevel::Dangerous);
    assert!(assessment.decision.requires_confirmation);
}

#[test]
fn test_sandbox_violation_propagates_from_assess() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("ws")).unwrap();
    let op = Operation::new("write", "../outside.txt").with_content("x");
    assert!(state(PermissionLevel::FullAccess).assess(&op, &store).is_err());
}

#[test]
fn test_preview_texts() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    store.write_file("old.cs", "12345").unwrap();
    store.write_file("dir/x.md", "").unwrap();

    let write = Operation::new("write", "old.cs").with_content("1234567");
    assert_eq!(preview(&write, &store), "Modify existing file old.cs (5 -> 7 bytes)");
    let create = Operation::new("create", "new.cs").with_content("12");
    assert_eq!(preview(&create, &store), "Create new file new.cs (2 bytes)");
    assert_eq!(
        preview(&Operation::new("delete", "dir"), &store),
        "Delete directory dir recursively"
    );
    assert_eq!(
        preview(&Operation::new("list", "nope"), &store),
        "Directory nope not found"
    );
    let exec = Operation::new("execute", "dotnet").with_arguments(["test", "--no-build"]);
    assert_eq!(preview(&exec, &store), "Run command: dotnet test --no-build");
    assert!(preview(&Operation::new("read", "../x"), &store).starts_with("Preview unavailable: "));
}
