use std::fs;
use std::path::Path;
use std::time::Duration;

use bigram::coordinator::{self, Coordinator, ServeOptions};
use bigram::pipeline::run_sequential;
use bigram::report::read_report;
use bigram::worker::Worker;
use bigram::{Job, JobConfig, JobKind};
use tokio::sync::oneshot;

fn write_corpus(dir: &Path) -> Vec<String> {
    let files = [
        ("a.txt", "the cat sat on the mat\nthe dog sat\n"),
        ("b.txt", "a cat ran\n\nthe cat ran on a mat\n"),
        ("nested/c.txt", "dog ran on the mat\nsolitary\n"),
        ("nested/d.txt", "the the the cat\n"),
        ("_logs", "not input at all\n"),
    ];
    let mut lines = vec![];
    for (name, contents) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        if !name.starts_with('_') {
            lines.extend(contents.lines().map(|l| l.to_string()));
        }
    }
    lines
}

async fn run_job(config: JobConfig, workers: usize) -> (tempfile::TempDir, anyhow::Result<()>) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_corpus(&input);
    let coordinator = Coordinator::from_input_dir(
        &input,
        3,
        config,
        dir.path().join("work"),
        dir.path().join("output"),
    )
    .unwrap();

    let (tx, rx) = oneshot::channel();
    let options = ServeOptions {
        max_workers: 10,
        linger: Duration::from_millis(500),
    };
    let server = tokio::spawn(coordinator::run(
        coordinator,
        "127.0.0.1:0".parse().unwrap(),
        options,
        move |addr| {
            let _ = tx.send(addr);
        },
    ));
    let addr = rx.await.unwrap();

    let mut handles = vec![];
    for _ in 0..workers {
        handles.push(tokio::spawn(async move {
            let mut worker = Worker::new(addr).set_poll_interval(Duration::from_millis(20));
            worker.start().await?;
            worker.run().await
        }));
    }

    let result = server.await.unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    (dir, result)
}

fn sorted_report(dir: &Path, kind: JobKind) -> Vec<String> {
    let mut lines: Vec<String> = read_report(dir, kind)
        .unwrap()
        .iter()
        .map(|r| r.to_string())
        .collect();
    lines.sort();
    lines
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distributed_frequency_job() {
    let (dir, result) = run_job(JobConfig::default().set_reducers(3), 2).await;
    result.unwrap();

    let output = dir.path().join("output");
    assert!(output.join("_SUCCESS").exists());
    for p in 0..3 {
        assert!(output.join(format!("part-r-{:05}", p)).exists());
    }
    assert!(!dir.path().join("work").exists());

    let scratch = tempfile::tempdir().unwrap();
    let lines = write_corpus(scratch.path());
    let expected = run_sequential(&Job::new(JobConfig::default()).unwrap(), &lines).unwrap();
    let mut expected: Vec<String> = expected.iter().map(|r| r.to_string()).collect();
    expected.sort();

    assert_eq!(sorted_report(&output, JobKind::Frequency), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distributed_count_job() {
    let config = JobConfig::new(JobKind::Count)
        .set_reducers(2)
        .set_combine(false);
    let (dir, result) = run_job(config, 3).await;
    result.unwrap();

    let lines = sorted_report(&dir.path().join("output"), JobKind::Count);
    assert!(lines.contains(&"the\tcat\t3".to_string()));
    assert!(lines.contains(&"the\tthe\t2".to_string()));
    assert!(!lines.iter().any(|l| l.starts_with("not\t")));
}
