use std::path::Path;
use std::process::{Command, Output};

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn benchkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_benchkit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn backends_lists_every_variant() {
    let out = benchkit(&["backends"]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let names: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split('\t').next())
        .collect();
    assert_eq!(names, vec!["openai", "ollama", "hf"]);
}

#[test]
fn unknown_backend_is_a_config_fault() {
    let out = benchkit(&[
        "run",
        "--dataset",
        "jsonl",
        "--data",
        "missing.jsonl",
        "--backend",
        "anthropic",
        "--backend-config",
        "missing.toml",
    ]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("unknown backend 'anthropic'"), "{stderr}");
}

#[test]
fn unknown_strategy_and_zero_k_are_config_faults() {
    let base = [
        "run",
        "--dataset",
        "gsm8k",
        "--data",
        "missing.jsonl",
        "--backend",
        "ollama",
        "--backend-config",
        "missing.toml",
    ];

    let mut args = base.to_vec();
    args.extend(["--strategy", "beam"]);
    let out = benchkit(&args);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8(out.stderr)
        .unwrap()
        .contains("unknown strategy 'beam'"));

    let mut args = base.to_vec();
    args.extend(["--strategy", "sc", "--k", "0"]);
    let out = benchkit(&args);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8(out.stderr).unwrap().contains("invalid k"));
}

#[test]
fn score_recomputes_summary_and_writes_annotations() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("results.jsonl");
    let annotated = dir.path().join("annotated.jsonl");
    std::fs::write(
        &input,
        concat!(
            "{\"idx\": 0, \"question\": \"q0\", \"gold\": \"C\", \"final\": \"C) red\"}\n",
            "{\"idx\": 1, \"question\": \"q1\", \"gold\": \"A\", \"final\": \"B\"}\n",
            "{\"_summary\": true, \"metric\": \"mc\", \"value\": 0.5, \"n\": 2}\n",
        ),
    )
    .unwrap();

    let out = benchkit(&[
        "score",
        "--input",
        path_str(&input),
        "--metric",
        "mc",
        "--annotate-out",
        path_str(&annotated),
    ]);
    assert!(out.status.success());

    let summary: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(summary["metric"], "mc");
    assert_eq!(summary["value"], 0.5);
    assert_eq!(summary["n"], 2);

    let raw = std::fs::read_to_string(&annotated).unwrap();
    let rows: Vec<serde_json::Value> = raw
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["metric_correct"], true);
    assert_eq!(rows[1]["metric_correct"], false);
    assert_eq!(rows[2]["_summary"], true);
}

#[test]
fn score_rejects_unknown_metric() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("results.jsonl");
    std::fs::write(&input, "").unwrap();

    let out = benchkit(&["score", "--input", path_str(&input), "--metric", "bleu"]);
    assert_eq!(out.status.code(), Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_against_local_ollama_writes_records_and_summary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "2 + 2 = 4\nFINAL: 4" },
            "done_reason": "stop"
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = dir.path().join("ollama.yaml");
    std::fs::write(
        &config,
        format!("model: llama3.1:8b\nbase_url: {}\ntimeout_secs: 5\n", server.uri()),
    )
    .unwrap();
    let data = dir.path().join("questions.jsonl");
    std::fs::write(
        &data,
        concat!(
            "{\"question\": \"What is 2+2?\", \"gold\": \"4\"}\n",
            "{\"question\": \"What is 3+3?\", \"gold\": \"6\"}\n",
            "{\"question\": \"unused\", \"gold\": \"0\"}\n",
        ),
    )
    .unwrap();
    let out_path = dir.path().join("out").join("run.jsonl");

    let args: Vec<String> = [
        "run",
        "--dataset",
        "jsonl",
        "--data",
        path_str(&data),
        "--backend",
        "ollama",
        "--backend-config",
        path_str(&config),
        "--strategy",
        "sc",
        "--k",
        "3",
        "--max-samples",
        "2",
        "--metric",
        "accuracy",
        "--out",
        path_str(&out_path),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let out = tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        benchkit(&args)
    })
    .await
    .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8(out.stdout).unwrap();
    let metrics_line = stdout
        .lines()
        .find(|l| l.starts_with("[metrics] "))
        .unwrap();
    let summary: serde_json::Value =
        serde_json::from_str(metrics_line.trim_start_matches("[metrics] ")).unwrap();
    assert_eq!(summary["value"], 0.5);
    assert_eq!(summary["n"], 2);

    let raw = std::fs::read_to_string(&out_path).unwrap();
    let rows: Vec<serde_json::Value> = raw
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["idx"], 0);
    assert_eq!(rows[0]["final"], "4");
    assert_eq!(rows[1]["gold"], "6");
    assert_eq!(rows[2]["_summary"], true);

    // Two questions, three samples each.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_where_every_question_fails_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = dir.path().join("ollama.toml");
    std::fs::write(
        &config,
        format!("model = \"m\"\nbase_url = \"{}\"\n", server.uri()),
    )
    .unwrap();
    let data = dir.path().join("q.jsonl");
    std::fs::write(&data, "{\"q\": \"x\", \"a\": \"1\"}\n").unwrap();
    let out_path = dir.path().join("run.jsonl");

    let args: Vec<String> = [
        "run",
        "--dataset",
        "jsonl",
        "--data",
        path_str(&data),
        "--backend",
        "ollama",
        "--backend-config",
        path_str(&config),
        "--out",
        path_str(&out_path),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let out = tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        benchkit(&args)
    })
    .await
    .unwrap();
    assert_eq!(out.status.code(), Some(1));

    let raw = std::fs::read_to_string(&out_path).unwrap();
    let summary: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["n"], 0);
}
