// CLI integration tests for export/import/restore/keys flows.
use std::path::{Path, PathBuf};
use std::process::Command;

use loadout_bridge::core::persist::backup_path;
use loadout_bridge::core::record::{Collection, Loadout};
use loadout_bridge::core::store::{DEFAULT_COLLECTION_PATH, Document, Store};
use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_loadout-bridge");
    let mut command = Command::new(exe);
    command.env_remove("RUST_LOG");
    command
}

fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("valid json")
}

fn stderr_error(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().last().expect("stderr line");
    serde_json::from_str(line).expect("error envelope")
}

fn loadout(key: &str, name: &str) -> Loadout {
    Loadout {
        key: Some(key.to_string()),
        name: Some(name.to_string()),
        ..Loadout::default()
    }
}

fn seed_store(dir: &Path, records: Vec<Loadout>) -> PathBuf {
    let mut store = Store::new();
    store.insert("/modules/items/data/items.xml", Document::Blob(b"<items/>".to_vec()));
    store.insert(
        DEFAULT_COLLECTION_PATH,
        Document::Records(Collection::new(records).to_table()),
    );
    let path = dir.join("game.store");
    store.save_atomic(&path).expect("seed store");
    path
}

fn stored_loadouts(path: &Path) -> Vec<Loadout> {
    let store = Store::load(path).expect("load");
    let table = store.table(DEFAULT_COLLECTION_PATH).expect("collection");
    Collection::<Loadout>::from_table(table)
        .expect("typed")
        .records()
        .to_vec()
}

fn write_json(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("edits.json");
    std::fs::write(&path, text).expect("write json");
    path
}

#[test]
fn warrior_becomes_knight_end_to_end() {
    let temp = tempfile::tempdir().expect("tempdir");
    let warrior = Loadout {
        major_skills: Some("sword, shield".to_string()),
        ..loadout("A", "Warrior")
    };
    let store = seed_store(temp.path(), vec![warrior]);

    let export = cmd()
        .args(["export", store.to_str().unwrap(), "true"])
        .output()
        .expect("export");
    assert!(export.status.success());
    let text = String::from_utf8(export.stdout).expect("utf8");
    assert_eq!(
        text,
        r#"[{"key":"A","name":"Warrior","majorSkills":["sword","shield"]}]"#
    );

    let edits = write_json(temp.path(), &text.replace("Warrior", "Knight"));
    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert!(import.status.success());
    let summary = parse_json(&import.stdout);
    assert_eq!(summary["imported"], 1);
    assert_eq!(summary["updated"], 1);
    assert_eq!(summary["created"], 0);
    assert_eq!(summary["dropped"], 0);
    assert!(summary["sha256"].as_str().unwrap().starts_with("sha256:"));

    let records = stored_loadouts(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name.as_deref(), Some("Knight"));
    assert_eq!(records[0].major_skills.as_deref(), Some("sword, shield"));
    assert_eq!(records[0].sort_order, Some(0));

    let reexport = cmd()
        .args(["export", store.to_str().unwrap(), "false"])
        .output()
        .expect("re-export");
    assert!(reexport.status.success());
    assert_eq!(
        String::from_utf8(reexport.stdout).unwrap(),
        r#"[{"key":"A","name":"Knight","sortOrder":0,"selectMajorSkills":0,"selectMinorSkills":0,"majorSkills":"sword, shield"}]"#
    );
}

#[test]
fn import_drops_omitted_and_creates_new_records() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(
        temp.path(),
        vec![loadout("A", "a"), loadout("B", "b"), loadout("C", "c")],
    );
    let edits = write_json(temp.path(), r#"[{"key":"B"},{"key":"D","perks":["x"," y ",""]}]"#);

    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert!(import.status.success());
    let summary = parse_json(&import.stdout);
    assert_eq!(summary["updated"], 1);
    assert_eq!(summary["created"], 1);
    assert_eq!(summary["dropped"], 2);

    let records = stored_loadouts(&store);
    let keys = records
        .iter()
        .map(|record| record.key.as_deref().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["B", "D"]);
    assert_eq!(records[0].name, None);
    assert_eq!(records[1].perks.as_deref(), Some("x, y"));
    assert_eq!(records[1].select_perks, None);
    assert_eq!(records[1].select_major_skills, Some(0));

    let store_after = Store::load(&store).expect("load");
    assert!(
        store_after
            .documents()
            .any(|(path, _)| path == "/modules/items/data/items.xml")
    );
}

#[test]
fn malformed_import_leaves_store_bytes_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(temp.path(), vec![loadout("A", "a")]);
    let before = std::fs::read(&store).expect("read");
    let edits = write_json(temp.path(), r#"[{"key": "A", }]"#);

    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(4));
    assert!(import.stdout.is_empty());
    let err = stderr_error(&import.stderr);
    assert_eq!(err["error"]["kind"], "Parse");
    assert_eq!(err["error"]["offset"], 14);

    assert_eq!(std::fs::read(&store).expect("read"), before);
    assert!(!backup_path(&store).exists());
}

#[test]
fn schema_error_exits_with_schema_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(temp.path(), vec![loadout("A", "a")]);
    let edits = write_json(temp.path(), r#"[{"key":"A","sortOrder":"first"}]"#);

    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(5));
    let err = stderr_error(&import.stderr);
    assert_eq!(err["error"]["kind"], "Schema");
}

#[test]
fn usage_errors_exit_one_without_touching_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = temp.path().join("never.store");

    let missing = cmd()
        .args(["import", store.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(missing.status.code(), Some(1));
    let err = stderr_error(&missing.stderr);
    assert_eq!(err["error"]["kind"], "Usage");

    let bad_flag = cmd()
        .args(["export", store.to_str().unwrap(), "yes"])
        .output()
        .expect("export");
    assert_eq!(bad_flag.status.code(), Some(1));

    let bare = cmd().output().expect("bare");
    assert_eq!(bare.status.code(), Some(1));

    assert_eq!(std::fs::read_dir(temp.path()).expect("list").count(), 0);
}

#[test]
fn export_of_store_without_collection_is_empty_array() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("empty.store");
    Store::new().save_atomic(&path).expect("save");

    let export = cmd()
        .args(["export", path.to_str().unwrap(), "true"])
        .output()
        .expect("export");
    assert!(export.status.success());
    assert_eq!(export.stdout, b"[]");

    let edits = write_json(temp.path(), "[]");
    let import = cmd()
        .args(["import", path.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(3));
}

#[test]
fn collection_flag_and_suffix_fallback() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut store = Store::new();
    store.insert(
        "/Mods/Custom/LOADOUTS.XML",
        Document::Records(Collection::new(vec![loadout("Z", "zed")]).to_table()),
    );
    store.insert(
        "/alt/other.xml",
        Document::Records(Collection::new(vec![loadout("Q", "queue")]).to_table()),
    );
    let path = temp.path().join("mod.store");
    store.save_atomic(&path).expect("save");

    let keys = cmd()
        .args(["keys", path.to_str().unwrap()])
        .output()
        .expect("keys");
    assert!(keys.status.success());
    assert_eq!(String::from_utf8(keys.stdout).unwrap(), "Z\n");

    let keys = cmd()
        .args(["keys", path.to_str().unwrap(), "--collection", "/alt/other.xml"])
        .output()
        .expect("keys");
    assert!(keys.status.success());
    assert_eq!(String::from_utf8(keys.stdout).unwrap(), "Q\n");
}

#[test]
fn backup_created_once_and_restorable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(temp.path(), vec![loadout("A", "a"), loadout("B", "b")]);
    let original = std::fs::read(&store).expect("read");

    let edits = write_json(temp.path(), r#"[{"key":"A"}]"#);
    let first = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert!(first.status.success());
    let summary = parse_json(&first.stdout);
    assert!(summary["backup"].as_str().unwrap().ends_with("game.store.backup"));
    assert_eq!(std::fs::read(backup_path(&store)).expect("backup"), original);

    let second = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import again");
    assert!(second.status.success());
    assert!(parse_json(&second.stdout).get("backup").is_none());
    assert_eq!(std::fs::read(backup_path(&store)).expect("backup"), original);

    let restore = cmd()
        .args(["restore", store.to_str().unwrap()])
        .output()
        .expect("restore");
    assert!(restore.status.success());
    assert_eq!(std::fs::read(&store).expect("read"), original);
    assert_eq!(stored_loadouts(&store).len(), 2);
}

#[test]
fn no_backup_skips_backup_and_restore_reports_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(temp.path(), vec![loadout("A", "a")]);
    let edits = write_json(temp.path(), r#"[{"key":"A","name":"b"}]"#);

    let import = cmd()
        .args([
            "import",
            store.to_str().unwrap(),
            edits.to_str().unwrap(),
            "--no-backup",
        ])
        .output()
        .expect("import");
    assert!(import.status.success());
    assert!(!backup_path(&store).exists());

    let restore = cmd()
        .args(["restore", store.to_str().unwrap()])
        .output()
        .expect("restore");
    assert_eq!(restore.status.code(), Some(3));
    let err = stderr_error(&restore.stderr);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn corrupt_store_exits_with_corrupt_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("junk.store");
    std::fs::write(&path, b"not a store at all").expect("write");

    let export = cmd()
        .args(["export", path.to_str().unwrap(), "false"])
        .output()
        .expect("export");
    assert_eq!(export.status.code(), Some(8));
    let err = stderr_error(&export.stderr);
    assert_eq!(err["error"]["kind"], "Corrupt");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn import_into_missing_store_leaves_no_sidecar() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = temp.path().join("absent.store");
    let edits = write_json(temp.path(), "[]");

    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(3));

    let restore = cmd()
        .args(["restore", store.to_str().unwrap()])
        .output()
        .expect("restore");
    assert_eq!(restore.status.code(), Some(3));

    let names = std::fs::read_dir(temp.path())
        .expect("list")
        .map(|entry| entry.expect("entry").file_name())
        .collect::<Vec<_>>();
    assert_eq!(names, vec![std::ffi::OsString::from("edits.json")]);
}

#[test]
fn parse_offsets_are_relative_to_the_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = seed_store(temp.path(), vec![loadout("A", "a")]);

    let edits = write_json(temp.path(), "\u{feff}[{\"key\": \"A\", }]");
    let import = cmd()
        .args(["import", store.to_str().unwrap(), edits.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(4));
    assert_eq!(stderr_error(&import.stderr)["error"]["offset"], 15);

    let invalid = temp.path().join("invalid.json");
    std::fs::write(&invalid, b"[\"\xc3\xa9\xff\"]").expect("write");
    let import = cmd()
        .args(["import", store.to_str().unwrap(), invalid.to_str().unwrap()])
        .output()
        .expect("import");
    assert_eq!(import.status.code(), Some(4));
    let err = stderr_error(&import.stderr);
    assert_eq!(err["error"]["offset"], 4);
    assert!(err["error"]["message"].as_str().unwrap().contains("bytes"));
}
