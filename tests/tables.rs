use assert_fs::prelude::*;
use assert_fs::TempDir;

use tokio_test::assert_ok;

use locaflow::error::LocaflowError;
use locaflow::table::{load_table, save_table};

const GODOT_CSV: &str = "keys,en,zh_cn,ja\n\
GREETING,Hello,你好,\n\
FAREWELL,\"Bye, see you\",,さようなら\n\
MULTI,\"Line one\nLine two\",,\n";

#[test]
fn test_csv_roundtrip_keeps_keys_order_and_cells() {
    let dir = TempDir::new().unwrap();
    let input = dir.child("strings.csv");
    input.write_str(GODOT_CSV).unwrap();

    let mut table = load_table(input.path(), "en").unwrap();
    assert_eq!(table.languages(), ["en", "zh_cn", "ja"]);
    assert_eq!(table.text("FAREWELL", "en"), Some("Bye, see you"));
    assert_eq!(table.text("FAREWELL", "zh_cn"), None);
    assert_eq!(table.text("MULTI", "en"), Some("Line one\nLine two"));

    table.set_column("ko", vec![(0, "안녕".to_string())]);
    let output = dir.child("out/strings.csv");
    std::fs::create_dir_all(output.path().parent().unwrap()).unwrap();
    assert_ok!(save_table(&table, output.path(), "en", None));

    let reloaded = load_table(output.path(), "en").unwrap();
    assert_eq!(reloaded.languages(), ["en", "zh_cn", "ja", "ko"]);
    let keys: Vec<&str> = reloaded.rows().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, ["GREETING", "FAREWELL", "MULTI"]);
    assert_eq!(reloaded.text("GREETING", "ko"), Some("안녕"));
    assert_eq!(reloaded.text("FAREWELL", "ja"), Some("さようなら"));
    assert_eq!(reloaded.text("MULTI", "en"), Some("Line one\nLine two"));
}

#[test]
fn test_po_template_to_translated_catalog() {
    let dir = TempDir::new().unwrap();
    let template = dir.child("messages.pot");
    template
        .write_str(
            "msgid \"\"\n\
             msgstr \"\"\n\
             \"Content-Type: text/plain; charset=UTF-8\\n\"\n\
             \n\
             #: menu.gd:12\n\
             msgid \"Start\"\n\
             msgstr \"\"\n\
             \n\
             msgctxt \"verb\"\n\
             msgid \"Open\"\n\
             msgstr \"\"\n",
        )
        .unwrap();

    let mut table = load_table(template.path(), "en").unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.text("Start", "en"), Some("Start"));
    assert_eq!(table.text("verb\u{4}Open", "en"), Some("Open"));

    table.set_column("de", vec![(0, "Starten".to_string()), (1, "Öffnen".to_string())]);
    let catalog = dir.child("de.po");
    assert_ok!(save_table(&table, catalog.path(), "en", Some("de")));
    let written = std::fs::read_to_string(catalog.path()).unwrap();
    assert!(written.contains("\"Language: de\\n\""));

    let reloaded = load_table(catalog.path(), "en").unwrap();
    assert_eq!(reloaded.text("Start", "de"), Some("Starten"));
    assert_eq!(reloaded.text("verb\u{4}Open", "de"), Some("Öffnen"));
}

#[test]
fn test_missing_and_unsupported_files() {
    let dir = TempDir::new().unwrap();

    let err = load_table(dir.path().join("absent.csv"), "en").unwrap_err();
    assert!(matches!(err, LocaflowError::FileNotFound(_)));

    let json = dir.child("strings.json");
    json.write_str("{}").unwrap();
    let err = load_table(json.path(), "en").unwrap_err();
    assert!(matches!(err, LocaflowError::UnsupportedFormat(_)));
}
