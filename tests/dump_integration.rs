//! Integration tests for JSON-lines record dumps on disk.

mod common;

use std::fs::File;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;

use common::match_recording;
use flate2::write::GzEncoder;
use flate2::Compression;
use replay_extract::collectors::{CombatLogConfig, EntitySnapshotsConfig, HeaderConfig};
use replay_extract::config::ParseConfig;
use replay_extract::error::ExtractError;
use replay_extract::index::build_index;
use replay_extract::session::parse;
use replay_extract::source::{DumpOpener, KindSet, Record, Recording, SourceOpener};

fn dump_lines(recording: &Recording) -> String {
    let mut out = String::new();
    for record in recording.records() {
        out.push_str(&serde_json::to_string(record).unwrap());
        out.push('\n');
    }
    out
}

fn write_plain(path: &Path, recording: &Recording) {
    std::fs::write(path, dump_lines(recording)).unwrap();
}

fn write_gzip(path: &Path, recording: &Recording) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(dump_lines(recording).as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn config() -> ParseConfig {
    ParseConfig {
        header: Some(HeaderConfig::default()),
        combat_log: Some(CombatLogConfig::default()),
        entities: Some(EntitySnapshotsConfig::default()),
        ..ParseConfig::default()
    }
}

// ============================================================================
// Encodings
// ============================================================================

#[test]
fn test_plain_dump_matches_in_memory() {
    let recording = match_recording();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("match.jsonl");
    write_plain(&path, &recording);

    let from_dump = parse(&DumpOpener::new(&path), &config()).unwrap();
    let in_memory = parse(&recording, &config()).unwrap();
    assert_eq!(from_dump, in_memory);
}

#[test]
fn test_gzip_dump_matches_in_memory() {
    let recording = match_recording();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("match.jsonl.gz");
    write_gzip(&path, &recording);

    let from_dump = parse(&DumpOpener::new(&path), &config()).unwrap();
    let in_memory = parse(&recording, &config()).unwrap();
    assert_eq!(from_dump, in_memory);

    let index = build_index(&DumpOpener::new(&path), 1800).unwrap();
    assert_eq!(index, build_index(&recording, 1800).unwrap());
}

#[test]
fn test_blank_lines_ignored() {
    let recording = match_recording();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spaced.jsonl");
    let spaced = dump_lines(&recording).replace('\n', "\n\n");
    std::fs::write(&path, spaced).unwrap();

    let result = parse(&DumpOpener::new(&path), &config()).unwrap();
    assert_eq!(result, parse(&recording, &config()).unwrap());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_malformed_line_is_source_error() {
    let recording = match_recording();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jsonl");
    let first = serde_json::to_string(&recording.records()[0]).unwrap();
    std::fs::write(&path, format!("{first}\n{{\"tick\": oops}}\n")).unwrap();

    let err = parse(&DumpOpener::new(&path), &config()).unwrap_err();
    match err {
        ExtractError::Source { tick, reason } => {
            assert_eq!(tick, 1);
            assert!(reason.contains("line 2"), "{reason}");
        }
        other => panic!("expected source error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse(&DumpOpener::new(dir.path().join("absent.jsonl")), &config()).unwrap_err();
    assert!(matches!(err, ExtractError::Io(_)));
}

#[test]
fn test_dump_source_is_single_use() {
    let recording = match_recording();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("match.jsonl");
    write_plain(&path, &recording);

    let mut source = DumpOpener::new(&path).open().unwrap();
    let mut seen = 0;
    source
        .start(KindSet::ALL, &mut |_: &Record| {
            seen += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(seen, recording.len());
    assert_eq!(source.lookup_string("CombatLogNames", 5).as_deref(), Some("npc_dota_hero_axe"));

    let again = source.start(KindSet::ALL, &mut |_: &Record| ControlFlow::Continue(()));
    assert!(matches!(again, Err(ExtractError::SourceReused)));
}
