use forklift_store::{EntryPayload, IndexEntry, QdrantIndex, VectorIndex, entry_id};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup(dimension: usize) -> (QdrantIndex, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let url = format!("http://127.0.0.1:{grpc_port}");
    let index = QdrantIndex::open(&url, "forklift_test", dimension)
        .await
        .unwrap();
    (index, container)
}

fn entry(repo: &str, path: &str, line: usize, vector: Vec<f32>) -> IndexEntry {
    IndexEntry {
        id: entry_id(repo, path, line),
        vector,
        payload: EntryPayload {
            repository: repo.into(),
            file_path: path.into(),
            kind: "class".into(),
            name: "Widget".into(),
            line_start: line,
            line_end: line + 3,
        },
        document: "Class: Widget".into(),
    }
}

#[tokio::test]
async fn upsert_search_and_isolation() {
    let (index, _container) = setup(4).await;

    let written = index
        .upsert(vec![
            entry("alpha", "w.py", 1, vec![1.0, 0.0, 0.0, 0.0]),
            entry("beta", "w.py", 1, vec![1.0, 0.0, 0.0, 0.0]),
        ])
        .await
        .unwrap();
    assert_eq!(written, 2);

    let results = index
        .search(vec![1.0, 0.0, 0.0, 0.0], 10, Some("alpha".into()))
        .await
        .unwrap();
    assert_eq!(results.ids, vec![entry_id("alpha", "w.py", 1)]);
    assert_eq!(results.documents[0], "Class: Widget");
    assert!((results.scores[0] - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn reupsert_is_idempotent_and_stats_reflect_state() {
    let (index, _container) = setup(4).await;

    for _ in 0..2 {
        index
            .upsert(vec![
                entry("alpha", "a.py", 1, vec![0.0, 1.0, 0.0, 0.0]),
                entry("beta", "b.py", 1, vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
    }
    let stats = index.stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.dimension, 4);
    assert_eq!(stats.repositories.len(), 2);

    assert_eq!(index.delete_by_repository("alpha".into()).await.unwrap(), 1);
    assert_eq!(index.delete_by_repository("alpha".into()).await.unwrap(), 0);
    let stats = index.stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
    assert!(stats.repositories.contains("beta"));
}

#[tokio::test]
async fn clear_recreates_empty_collection() {
    let (index, _container) = setup(4).await;
    index
        .upsert(vec![entry("alpha", "a.py", 1, vec![1.0, 1.0, 0.0, 0.0])])
        .await
        .unwrap();
    index.clear().await.unwrap();
    assert_eq!(index.stats().await.unwrap().total_entries, 0);
    assert!(
        index
            .search(vec![1.0, 1.0, 0.0, 0.0], 5, None)
            .await
            .unwrap()
            .is_empty()
    );
}
