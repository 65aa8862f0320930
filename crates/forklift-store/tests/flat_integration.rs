use std::sync::Arc;

use forklift_store::{EntryPayload, FlatIndex, IndexEntry, StoreError, VectorIndex, entry_id};

fn entry(repo: &str, path: &str, line: usize, vector: Vec<f32>) -> IndexEntry {
    IndexEntry {
        id: entry_id(repo, path, line),
        vector,
        payload: EntryPayload {
            repository: repo.into(),
            file_path: path.into(),
            kind: "function".into(),
            name: format!("fn_{line}"),
            line_start: line,
            line_end: line + 1,
        },
        document: format!("File: {path}\nType: function"),
    }
}

#[tokio::test]
async fn restart_resumes_last_acknowledged_state() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = FlatIndex::open(dir.path(), 3).await.unwrap();
        index
            .upsert(vec![
                entry("alpha", "a.py", 1, vec![1.0, 0.0, 0.0]),
                entry("beta", "b.py", 1, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        index.delete_by_repository("beta".into()).await.unwrap();
        index.close().await.unwrap();
    }

    let reopened = FlatIndex::open(dir.path(), 3).await.unwrap();
    let stats = reopened.stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.repositories.len(), 1);
    assert!(stats.repositories.contains("alpha"));

    let results = reopened
        .search(vec![1.0, 0.0, 0.0], 5, None)
        .await
        .unwrap();
    assert_eq!(results.ids, vec![entry_id("alpha", "a.py", 1)]);
    assert!((results.scores[0] - 1.0).abs() < 1e-6);
    assert_eq!(results.payloads[0].file_path, "a.py");
}

#[tokio::test]
async fn reopen_with_other_dimension_fails() {
    let dir = tempfile::tempdir().unwrap();
    let index = FlatIndex::open(dir.path(), 2).await.unwrap();
    index
        .upsert(vec![entry("r", "a.py", 1, vec![1.0, 0.0])])
        .await
        .unwrap();
    drop(index);

    let err = FlatIndex::open(dir.path(), 4).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 4,
            found: 2
        }
    ));
}

#[tokio::test]
async fn clear_removes_durable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let index = FlatIndex::open(dir.path(), 2).await.unwrap();
    index
        .upsert(vec![entry("r", "a.py", 1, vec![1.0, 0.0])])
        .await
        .unwrap();
    index.clear().await.unwrap();
    assert_eq!(index.stats().await.unwrap().total_entries, 0);
    assert!(!dir.path().join("CURRENT").exists());

    let reopened = FlatIndex::open(dir.path(), 2).await.unwrap();
    assert_eq!(reopened.stats().await.unwrap().total_entries, 0);
}

#[tokio::test]
async fn repository_filter_isolates_results() {
    let index = FlatIndex::in_memory(2);
    index
        .upsert(vec![
            entry("alpha", "a.py", 1, vec![1.0, 0.0]),
            entry("beta", "a.py", 1, vec![1.0, 0.0]),
            entry("beta", "b.py", 5, vec![0.9, 0.1]),
        ])
        .await
        .unwrap();

    let results = index
        .search(vec![1.0, 0.0], 10, Some("alpha".into()))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results.payloads.iter().all(|p| p.repository == "alpha"));

    let unscoped = index.search(vec![1.0, 0.0], 10, None).await.unwrap();
    assert_eq!(unscoped.len(), 3);
}

#[tokio::test]
async fn delete_removes_every_entry_of_repository() {
    let index = FlatIndex::in_memory(2);
    let batch: Vec<_> = (1..=20)
        .map(|line| entry("gone", "x.rs", line, vec![1.0, line as f32]))
        .chain([entry("kept", "y.rs", 1, vec![1.0, 0.0])])
        .collect();
    index.upsert(batch).await.unwrap();

    assert_eq!(index.delete_by_repository("gone".into()).await.unwrap(), 20);
    let results = index
        .search(vec![1.0, 0.0], 50, Some("gone".into()))
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(index.stats().await.unwrap().total_entries, 1);
}

#[tokio::test]
async fn cosine_ranks_near_duplicate_above_orthogonal() {
    let index = FlatIndex::in_memory(3);
    index
        .upsert(vec![
            entry("r", "orth.py", 1, vec![0.0, 0.0, 1.0]),
            entry("r", "near.py", 1, vec![1.0, 0.01, 0.0]),
            entry("r", "opposite.py", 1, vec![-1.0, 0.0, 0.0]),
        ])
        .await
        .unwrap();

    let results = index.search(vec![1.0, 0.0, 0.0], 3, None).await.unwrap();
    let paths: Vec<_> = results.payloads.iter().map(|p| p.file_path.as_str()).collect();
    assert_eq!(paths, vec!["near.py", "orth.py", "opposite.py"]);
    assert!(results.scores[0] > 0.99);
    assert!(results.scores[1].abs() < 1e-6);
    assert!((results.scores[2] + 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn readers_never_see_partial_delete() {
    let index = Arc::new(FlatIndex::in_memory(2));
    let batch: Vec<_> = (1..=200)
        .map(|line| entry("victim", "v.py", line, vec![1.0, 0.0]))
        .chain((1..=50).map(|line| entry("bystander", "b.py", line, vec![1.0, 0.0])))
        .collect();
    index.upsert(batch).await.unwrap();

    let reader = {
        let index = Arc::clone(&index);
        tokio::spawn(async move {
            for _ in 0..200 {
                let n = index
                    .search(vec![1.0, 0.0], 1000, Some("victim".into()))
                    .await
                    .unwrap()
                    .len();
                assert!(n == 200 || n == 0, "observed partial delete: {n}");
                tokio::task::yield_now().await;
            }
        })
    };
    index.delete_by_repository("victim".into()).await.unwrap();
    reader.await.unwrap();

    let remaining = index.search(vec![1.0, 0.0], 1000, None).await.unwrap();
    assert_eq!(remaining.len(), 50);
}

#[tokio::test]
async fn idempotent_upsert_keeps_single_entry() {
    let index = FlatIndex::in_memory(2);
    for _ in 0..3 {
        index
            .upsert(vec![entry("r", "app.py", 1, vec![0.5, 0.5])])
            .await
            .unwrap();
    }
    assert_eq!(index.stats().await.unwrap().total_entries, 1);
}

#[tokio::test]
async fn handles_sharing_a_root_keep_each_others_writes() {
    let dir = tempfile::tempdir().unwrap();
    let a = FlatIndex::open(dir.path(), 2).await.unwrap();
    let b = FlatIndex::open(dir.path(), 2).await.unwrap();

    assert_eq!(
        a.upsert(vec![entry("alpha", "a.py", 1, vec![1.0, 0.0])])
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        b.upsert(vec![entry("beta", "b.py", 1, vec![0.0, 1.0])])
            .await
            .unwrap(),
        1
    );
    // b caught up with a's generation before writing its own.
    assert_eq!(b.stats().await.unwrap().total_entries, 2);
    a.close().await.unwrap();
    b.close().await.unwrap();

    let reopened = FlatIndex::open(dir.path(), 2).await.unwrap();
    let stats = reopened.stats().await.unwrap();
    assert_eq!(
        stats.repositories.into_iter().collect::<Vec<_>>(),
        vec!["alpha", "beta"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_on_one_root_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let a = Arc::new(FlatIndex::open(dir.path(), 2).await.unwrap());
    let b = Arc::new(FlatIndex::open(dir.path(), 2).await.unwrap());

    let writer = |index: Arc<FlatIndex>, repo: &'static str| {
        tokio::spawn(async move {
            for line in 1..=20 {
                index
                    .upsert(vec![entry(repo, "x.py", line, vec![1.0, 0.5])])
                    .await
                    .unwrap();
            }
        })
    };
    let (ra, rb) = tokio::join!(
        writer(Arc::clone(&a), "alpha"),
        writer(Arc::clone(&b), "beta")
    );
    ra.unwrap();
    rb.unwrap();

    let reopened = FlatIndex::open(dir.path(), 2).await.unwrap();
    assert_eq!(reopened.stats().await.unwrap().total_entries, 40);
}

#[tokio::test]
async fn delete_through_stale_handle_sees_latest_generation() {
    let dir = tempfile::tempdir().unwrap();
    let stale = FlatIndex::open(dir.path(), 2).await.unwrap();
    let writer = FlatIndex::open(dir.path(), 2).await.unwrap();
    writer
        .upsert(vec![
            entry("gone", "g.py", 1, vec![1.0, 0.0]),
            entry("kept", "k.py", 1, vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

    assert_eq!(stale.delete_by_repository("gone".into()).await.unwrap(), 1);
    let stats = stale.stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
    assert!(stats.repositories.contains("kept"));
}

#[tokio::test]
async fn clear_leaves_root_empty_for_next_open() {
    let dir = tempfile::tempdir().unwrap();
    let index = FlatIndex::open(dir.path(), 2).await.unwrap();
    index
        .upsert(vec![entry("r", "a.py", 1, vec![1.0, 0.0])])
        .await
        .unwrap();
    index.clear().await.unwrap();
    assert_eq!(index.stats().await.unwrap().total_entries, 0);
    index
        .upsert(vec![entry("r", "b.py", 1, vec![0.0, 1.0])])
        .await
        .unwrap();
    drop(index);

    let reopened = FlatIndex::open(dir.path(), 2).await.unwrap();
    let results = reopened.search(vec![0.0, 1.0], 5, None).await.unwrap();
    assert_eq!(results.ids, vec![entry_id("r", "b.py", 1)]);
}
