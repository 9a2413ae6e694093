//! Cross-process specs
//!
//! The parent test re-runs this test binary filtered to `child_process`,
//! which acts on the same backing file according to environment variables
//! and reports what it did on stdout.

use crate::prelude::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const CHILD_TEST: &str = "datastore_processes::child_process";
const ENV_PATH: &str = "DURAMEN_SPEC_PATH";
const ENV_MODE: &str = "DURAMEN_SPEC_MODE";
const ENV_ID: &str = "DURAMEN_SPEC_ID";

const ENTRIES: u32 = 256;
const ENTRY_SIZE: u32 = 64;
const BULK_COUNT: u8 = 40;

fn child_config(path: impl Into<PathBuf>) -> StoreConfig {
    StoreConfig::new(path)
        .with_entries(ENTRIES)
        .with_entry_size(ENTRY_SIZE)
}

/// Body of the child process; a no-op in a normal test run
#[test]
fn child_process() {
    let (Ok(path), Ok(mode)) = (std::env::var(ENV_PATH), std::env::var(ENV_MODE)) else {
        return;
    };
    let store = FileDatastore::open(&child_config(path)).unwrap();

    match mode.as_str() {
        "handoff" => {
            let parent_id: EventId = std::env::var(ENV_ID).unwrap().parse().unwrap();
            let events = store.stored_events().unwrap();
            assert_eq!(events.get(&parent_id), Some(&b"from parent".to_vec()));
            store.delete_event(parent_id).unwrap();
            let id = store.save_event(b"from child").unwrap();
            println!("CHILD_ID={}", id);
        }
        "bulk" => {
            for i in 0..BULK_COUNT {
                store.save_event(&[i]).unwrap();
            }
        }
        other => panic!("unknown child mode {}", other),
    }

    store.close().unwrap();
}

fn spawn_child(path: &Path, mode: &str, id: Option<EventId>) -> std::process::Child {
    let mut command = Command::new(std::env::current_exe().unwrap());
    command
        .args([CHILD_TEST, "--exact", "--nocapture", "--test-threads=1"])
        .env(ENV_PATH, path)
        .env(ENV_MODE, mode)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    if let Some(id) = id {
        command.env(ENV_ID, id.to_string());
    }
    command.spawn().unwrap()
}

fn assert_child_passed(output: &Output) {
    assert!(
        output.status.success(),
        "child failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn another_process_sees_and_changes_open_store() {
    let file = StoreFile::new();
    let store = FileDatastore::open(&child_config(file.path())).unwrap();
    let parent_id = store.save_event(b"from parent").unwrap();

    let output = spawn_child(file.path(), "handoff", Some(parent_id))
        .wait_with_output()
        .unwrap();
    assert_child_passed(&output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let child_id: EventId = stdout
        .lines()
        // The harness prints the test name on the same line
        .find_map(|line| line.split_once("CHILD_ID=").map(|(_, id)| id.trim()))
        .unwrap()
        .parse()
        .unwrap();

    // Same handle, never reopened
    similar_asserts::assert_eq!(
        store.stored_events().unwrap(),
        HashMap::from([(child_id, b"from child".to_vec())])
    );
}

#[test]
fn concurrent_processes_do_not_lose_writes() {
    let file = StoreFile::new();
    let store = FileDatastore::open(&child_config(file.path())).unwrap();

    let children: Vec<_> = (0..3)
        .map(|_| spawn_child(file.path(), "bulk", None))
        .collect();
    for i in 0..BULK_COUNT {
        store.save_event(&[100 + i]).unwrap();
    }
    for child in children {
        assert_child_passed(&child.wait_with_output().unwrap());
    }

    let events = store.stored_events().unwrap();
    assert_eq!(events.len(), 4 * BULK_COUNT as usize);
    for payload in events.values() {
        assert_eq!(payload.len(), 1, "torn payload {:?}", payload);
    }
}
