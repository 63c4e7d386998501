//! End-to-end jobs over a real gRPC loopback.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use minimr::coordinator::{CoordinatorService, Job};
use minimr::proto;
use minimr::proto::coordinator_client::CoordinatorClient;
use minimr::worker::Worker;
use minimr::workload;

/// Serve `service` on an ephemeral loopback port.
async fn spawn_coordinator(service: CoordinatorService) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(service.into_server())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    (format!("http://{}", addr), handle)
}

fn no_aux() -> Bytes {
    Bytes::from(serde_json::to_string(&Vec::<String>::new()).unwrap())
}

#[tokio::test]
async fn wordcount_job_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = [
        ("00.txt", "apple pear apple"),
        ("01.txt", "plum apple"),
        ("02.txt", "pear quince fig"),
    ];
    let mut files = Vec::new();
    for (name, contents) in inputs {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        files.push(path);
    }

    let service = CoordinatorService::new(Job::new(files, 2));
    let (endpoint, server) = spawn_coordinator(service.clone()).await;

    let mut workers = Vec::new();
    for _ in 0..3 {
        let worker = Worker::new(
            dir.path().to_path_buf(),
            workload::named("wc").unwrap(),
            no_aux(),
        );
        let endpoint = endpoint.clone();
        workers.push(tokio::spawn(async move {
            worker.run(endpoint).await.unwrap();
        }));
    }
    // Every worker terminates on its own once the coordinator says exit.
    for handle in workers {
        handle.await.unwrap();
    }
    assert!(service.done());

    // One output file per bucket, keys ascending, no key in two buckets.
    let mut counts = HashMap::new();
    for bucket in 0..2 {
        let contents =
            fs::read_to_string(dir.path().join(format!("mr-out-{bucket}"))).unwrap();
        let keys: Vec<&str> = contents
            .lines()
            .map(|line| line.split_whitespace().next().unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        for line in contents.lines() {
            let (word, count) = line.split_once(' ').unwrap();
            let previous = counts.insert(word.to_string(), count.parse::<u64>().unwrap());
            assert_eq!(previous, None, "key {word} appeared in two buckets");
        }
    }

    let expected: HashMap<String, u64> =
        [("apple", 3), ("pear", 2), ("plum", 1), ("quince", 1), ("fig", 1)]
            .into_iter()
            .map(|(word, count)| (word.to_string(), count))
            .collect();
    assert_eq!(counts, expected);

    server.abort();
}

#[tokio::test]
async fn stalled_worker_is_reassigned_and_the_job_still_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("00.txt");
    fs::write(&path, "apple pear").unwrap();

    let timeout = Duration::from_millis(300);
    let service = CoordinatorService::new(Job::with_timeout(vec![path], 1, timeout));
    let (endpoint, server) = spawn_coordinator(service.clone()).await;

    // A worker that claims the map task and then goes silent.
    let mut staller = CoordinatorClient::connect(endpoint.clone()).await.unwrap();
    let reply = staller
        .request_task(proto::TaskRequest {
            worker_id: "staller".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(matches!(
        reply.kind,
        Some(proto::task_assignment::Kind::Map(_))
    ));

    tokio::time::sleep(timeout * 2).await;

    // A healthy worker picks up the reclaimed task and finishes the job
    // on its own.
    let worker = Worker::new(
        dir.path().to_path_buf(),
        workload::named("wc").unwrap(),
        no_aux(),
    );
    worker.run(endpoint.clone()).await.unwrap();

    assert!(service.done());
    let out = fs::read_to_string(dir.path().join("mr-out-0")).unwrap();
    assert_eq!(out, "apple 1\npear 1\n");

    // The staller's late report is rejected and changes nothing.
    let ack = staller
        .notify_complete(proto::CompletionReport {
            worker_id: "staller".into(),
            kind: proto::TaskKind::Map as i32,
            task_index: 0,
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!ack.accepted);
    assert!(service.done());

    server.abort();
}
