use anyhow::Result;
use corowave::config::{DbConfig, SUSPEND_MARKER, SuspendRules};
use corowave::db::MethodDatabase;
use corowave::diag::{CollectingDiagnostics, Severity};
use corowave::scan::scan_tree;
use corowave::suspend::SuspendType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "corowave_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

/// Emits a minimal valid class file: constant pool with Utf8 and Class
/// entries only, no fields, and one optional `Exceptions` attribute per
/// method.
fn build_class(
    name: &str,
    super_name: &str,
    methods: &[(&str, &str, /* throws marker */ bool)],
) -> Vec<u8> {
    let mut constants: Vec<Vec<u8>> = Vec::new();

    fn utf8(constants: &mut Vec<Vec<u8>>, value: &str) -> u16 {
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        if let Some(i) = constants.iter().position(|e| *e == entry) {
            return (i + 1) as u16;
        }
        constants.push(entry);
        constants.len() as u16
    }

    fn class(constants: &mut Vec<Vec<u8>>, name: &str) -> u16 {
        let name_index = utf8(constants, name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_index.to_be_bytes());
        if let Some(i) = constants.iter().position(|e| *e == entry) {
            return (i + 1) as u16;
        }
        constants.push(entry);
        constants.len() as u16
    }

    let this_index = class(&mut constants, name);
    let super_index = class(&mut constants, super_name);
    let marker_index = class(&mut constants, SUSPEND_MARKER);
    let exceptions_attr = utf8(&mut constants, "Exceptions");

    let mut method_bytes = Vec::new();
    for (method_name, method_desc, suspendable) in methods {
        let name_index = utf8(&mut constants, method_name);
        let desc_index = utf8(&mut constants, method_desc);
        method_bytes.extend_from_slice(&0x0001u16.to_be_bytes()); // ACC_PUBLIC
        method_bytes.extend_from_slice(&name_index.to_be_bytes());
        method_bytes.extend_from_slice(&desc_index.to_be_bytes());
        if *suspendable {
            method_bytes.extend_from_slice(&1u16.to_be_bytes());
            method_bytes.extend_from_slice(&exceptions_attr.to_be_bytes());
            method_bytes.extend_from_slice(&4u32.to_be_bytes());
            method_bytes.extend_from_slice(&1u16.to_be_bytes());
            method_bytes.extend_from_slice(&marker_index.to_be_bytes());
        } else {
            method_bytes.extend_from_slice(&0u16.to_be_bytes());
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&52u16.to_be_bytes());
    out.extend_from_slice(&((constants.len() as u16 + 1).to_be_bytes()));
    for entry in &constants {
        out.extend_from_slice(entry);
    }
    out.extend_from_slice(&0x0021u16.to_be_bytes());
    out.extend_from_slice(&this_index.to_be_bytes());
    out.extend_from_slice(&super_index.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
    out.extend_from_slice(&0u16.to_be_bytes()); // fields
    out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
    out.extend_from_slice(&method_bytes);
    out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
    out
}

fn write_class(root: &Path, class_name: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(format!("{class_name}.class"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}

fn populate_tree(root: &Path) -> PathBuf {
    write_class(
        root,
        "demo/Mid",
        &build_class("demo/Mid", "demo/Base", &[("helper", "()I", false)]),
    );
    write_class(
        root,
        "demo/Leaf1",
        &build_class("demo/Leaf1", "demo/Mid", &[("other", "()V", false)]),
    );
    write_class(
        root,
        "demo/Leaf2",
        &build_class("demo/Leaf2", "demo/Mid", &[]),
    );
    write_class(
        root,
        "demo/AppError",
        &build_class("demo/AppError", "java/lang/Exception", &[]),
    );
    write_class(
        root,
        "java/lang/Exception",
        &build_class("java/lang/Exception", "java/lang/Throwable", &[]),
    );
    write_class(
        root,
        "demo/Base",
        &build_class(
            "demo/Base",
            "java/lang/Object",
            &[("run", "()V", true), ("io", "()V", false)],
        ),
    )
}

#[test]
fn scan_then_classify_across_the_decoded_hierarchy() -> Result<()> {
    let root = temp_dir("scan_classify");
    let base_path = populate_tree(&root);

    let diag = Arc::new(CollectingDiagnostics::new());
    let db = MethodDatabase::with_classpath(DbConfig::default(), vec![root.clone()], diag.clone());

    let report = scan_tree(&db, &root)?;
    assert_eq!(report.scanned, 6);
    assert_eq!(report.queued, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(db.work_list(), vec![base_path]);

    // inherited classification resolves through two hierarchy levels
    assert_eq!(
        db.classify("demo/Leaf1", "run", "()V", true),
        SuspendType::Normal
    );
    assert_eq!(
        db.classify("demo/Leaf1", "helper", "()I", true),
        SuspendType::None
    );
    assert_eq!(
        db.classify("demo/Leaf1", "<init>", "()V", true),
        SuspendType::None
    );
    assert_eq!(diag.count(Severity::Warn), 0);

    assert_eq!(
        db.common_superclass("demo/Leaf1", "demo/Leaf2"),
        Some("demo/Mid".to_string())
    );
    assert_eq!(
        db.common_superclass("demo/Leaf1", "demo/Leaf1"),
        Some("demo/Leaf1".to_string())
    );

    assert!(db.is_exception("demo/AppError"));
    assert!(!db.is_exception("demo/Base"));

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

#[test]
fn classify_builds_the_family_on_demand_without_a_scan() -> Result<()> {
    let root = temp_dir("on_demand");
    populate_tree(&root);

    let diag = Arc::new(CollectingDiagnostics::new());
    let db = MethodDatabase::with_classpath(DbConfig::default(), vec![root.clone()], diag.clone());

    // no scan ran; decode-on-miss builds demo/Leaf1, demo/Mid and demo/Base
    assert_eq!(
        db.classify("demo/Leaf1", "run", "()V", true),
        SuspendType::Normal
    );
    assert!(db.lookup("demo/Base").unwrap().known().is_some());
    assert_eq!(diag.count(Severity::Warn), 0);

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}

#[test]
fn rules_file_overrides_decoded_classifications() -> Result<()> {
    let root = temp_dir("rules");
    populate_tree(&root);

    let rules_path = root.join("rules.json");
    std::fs::write(&rules_path, r#"{"demo/Base": {"io()V": "blocking"}}"#)?;

    let diag = Arc::new(CollectingDiagnostics::new());
    let db = MethodDatabase::with_classpath(DbConfig::default(), vec![root.clone()], diag)
        .with_rules(SuspendRules::load(&rules_path)?);

    scan_tree(&db, &root)?;
    assert_eq!(
        db.classify("demo/Base", "io", "()V", true),
        SuspendType::Blocking
    );
    assert_eq!(
        db.classify("demo/Base", "run", "()V", true),
        SuspendType::Normal
    );

    let _ = std::fs::remove_dir_all(root);
    Ok(())
}
