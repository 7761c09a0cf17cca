use serde_json::{Value, json};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_chat_file(path: &Path) {
    let chat = json!({
        "id": "conv-1",
        "title": "peak load question",
        "owner_id": "user-1",
        "created_at": "1700000000",
        "path": "/chat/conv-1",
        "messages": [
            {
                "role": "user",
                "id": "m1",
                "content": [{"type": "text", "text": "what is the peak load"}]
            },
            {
                "role": "assistant_text",
                "id": "m2",
                "content": "let me check"
            },
            {
                "role": "assistant_tool_call",
                "id": "m3",
                "calls": [{
                    "tool_name": "sql_query",
                    "call_id": "c1",
                    "args": {"query": "select max(load) from demand"}
                }]
            },
            {
                "role": "tool_result",
                "id": "m4",
                "results": [{
                    "tool_name": "sql_query",
                    "call_id": "c1",
                    "result": {"response": "812 MW"}
                }]
            },
            {
                "role": "assistant_text",
                "id": "m5",
                "content": "the peak load is 812 MW"
            }
        ]
    });
    std::fs::write(path, serde_json::to_vec_pretty(&chat).expect("chat should serialize"))
        .expect("chat file write should succeed");
}

fn run_cli(args: &[&str], cwd: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_relay-cli"))
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("cli process should start")
}

#[test]
fn replay_command_text_expected_reconstituted_roles() {
    let temp = TempDir::new().expect("tempdir should create");
    let chat_file = temp.path().join("conv-1.json");
    write_chat_file(&chat_file);

    let output = run_cli(
        &[
            "replay",
            "--file",
            chat_file.to_str().expect("chat path should be utf8"),
        ],
        temp.path(),
    );

    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("chat: peak load question"));
    assert!(stdout.contains("[human] what is the peak load"));
    assert!(stdout.contains("call sql_query"));
    assert!(stdout.contains("[ai] the peak load is 812 MW"));
}

#[test]
fn replay_command_json_expected_merged_ai_message() {
    let temp = TempDir::new().expect("tempdir should create");
    let chat_file = temp.path().join("conv-1.json");
    write_chat_file(&chat_file);

    let output = run_cli(
        &[
            "replay",
            "--file",
            chat_file.to_str().expect("chat path should be utf8"),
            "--json",
        ],
        temp.path(),
    );

    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let messages: Vec<Value> = serde_json::from_str(&stdout).expect("json output should parse");

    // Text + adjacent tool call collapse into one ai message.
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1]["role"], "ai");
    assert_eq!(messages[1]["content"], "let me check");
    assert_eq!(messages[1]["tool_calls"][0]["call_id"], "c1");
    assert_eq!(messages[2]["role"], "tool");
}

#[test]
fn replay_command_missing_file_expected_failure() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["replay", "--file", "missing.json"], temp.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}
