use benchkit::records::{
    read_records, JsonlRecordWriter, OutputLine, RecordError, RecordSink, ResultRecord,
    SummaryLine,
};
use benchkit::scoring::{annotate_rows, summarize, Metric};
use tempfile::tempdir;

fn make_record(index: usize, gold: &str, final_answer: &str) -> ResultRecord {
    ResultRecord {
        index,
        question: format!("What is {index}?"),
        gold: gold.to_string(),
        final_answer: final_answer.to_string(),
        subject: (index % 2 == 0).then(|| "math".to_string()),
    }
}

#[test]
fn jsonl_writer_preserves_order_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("run.jsonl");

    let rows = vec![make_record(0, "1", "1"), make_record(1, "2", "3")];
    let (writer, worker) = JsonlRecordWriter::create(&path).unwrap();
    for row in &rows {
        writer.record(OutputLine::Result(row.clone())).unwrap();
    }
    let summary = summarize(&rows, Metric::Accuracy);
    writer
        .record(OutputLine::Summary(SummaryLine::new(summary, None)))
        .unwrap();
    drop(writer);
    assert_eq!(worker.join().unwrap(), 3);

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 3);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["idx"], 0);
    assert_eq!(first["final"], "1");
    assert_eq!(first["subject"], "math");
    let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(last["_summary"], true);
    assert_eq!(last["metric"], "accuracy");
    assert_eq!(last["value"], 0.5);
    assert!(last.get("failed").is_none());

    assert_eq!(read_records(&path).unwrap(), rows);
}

#[test]
fn annotated_rows_flatten_and_read_back_as_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("annotated.jsonl");

    let rows = vec![make_record(0, "cat sat", "the cat sat")];
    let (writer, worker) = JsonlRecordWriter::create(&path).unwrap();
    for row in annotate_rows(&rows, Metric::F1) {
        writer.record(OutputLine::Annotated(row)).unwrap();
    }
    drop(writer);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(value["idx"], 0);
    assert_eq!(value["metric_name"], "f1");
    assert_eq!(value["metric_correct"], true);
    assert_eq!(value["metric_score"], 1.0);

    assert_eq!(read_records(&path).unwrap(), rows);
}

#[test]
fn append_keeps_existing_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.jsonl");

    let (writer, worker) = JsonlRecordWriter::create(&path).unwrap();
    writer
        .record(OutputLine::Result(make_record(0, "a", "a")))
        .unwrap();
    drop(writer);
    worker.join().unwrap();

    let (writer, worker) = JsonlRecordWriter::append(&path).unwrap();
    writer
        .record(OutputLine::Result(make_record(1, "b", "b")))
        .unwrap();
    drop(writer);
    worker.join().unwrap();

    let indices: Vec<usize> = read_records(&path)
        .unwrap()
        .iter()
        .map(|r| r.index)
        .collect();
    assert_eq!(indices, vec![0, 1]);
}

#[test]
fn read_records_skips_blank_lines_and_reports_bad_ones() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.jsonl");
    std::fs::write(
        &path,
        "{\"idx\": 0, \"gold\": \"A\", \"winner\": \"A\"}\n\n{\"_summary\": true, \"metric\": \"mc\", \"value\": 1.0, \"n\": 1}\n",
    )
    .unwrap();
    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].final_answer, "A");

    std::fs::write(&path, "{\"idx\": 0}\nnot json\n").unwrap();
    let err = read_records(&path).unwrap_err();
    assert!(matches!(err, RecordError::Parse { line: 2, .. }));
}
