use std::io::Write;
use std::path::Path;

use forklift_core::bootstrap::{AppServices, local_source, open_index};
use forklift_core::config::{Config, ProviderKind};
use forklift_index::repository_tag;
use forklift_store::entry_id;
use serial_test::serial;

fn write_checkout(root: &Path) {
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("app.py"), "def add(a, b):\n    return a + b\n").unwrap();
    std::fs::write(
        root.join("src/lib.rs"),
        "/// Multiply.\npub fn mul(a: i32, b: i32) -> i32 {\n    a * b\n}\n",
    )
    .unwrap();
    std::fs::write(root.join("notes.txt"), "not indexed\n").unwrap();
}

fn write_config(dir: &Path, store: &Path) -> std::path::PathBuf {
    let path = dir.join("forklift.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "[embedding]\nprovider = \"mock\"\ndimension = 32\nbatch_size = 2\n\n\
         [store]\nbackend = \"flat\"\npath = {:?}\n",
        store.display().to_string()
    )
    .unwrap();
    path
}

#[tokio::test]
#[serial]
async fn index_search_and_reopen_through_config() {
    let work = tempfile::tempdir().unwrap();
    let checkout = work.path().join("calc");
    write_checkout(&checkout);
    let config_path = write_config(work.path(), &work.path().join("index"));

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.embedding.provider, ProviderKind::Mock);

    let indexer = AppServices::from_config(&config).await.unwrap().indexer();
    let report = indexer
        .index_repository("calc", &local_source(&config, &checkout))
        .await
        .unwrap();
    assert_eq!(report.files_fetched, 2);
    assert_eq!(report.chunks_created, report.entries_stored);
    assert!(report.entries_stored >= 2);

    let results = indexer.search("add", 10, Some("calc")).await.unwrap();
    assert!(results.ids.contains(&entry_id("calc", "app.py", 1)));
    indexer.index().close().await.unwrap();

    let index = open_index(&config).await.unwrap();
    let stats = index.stats().await.unwrap();
    assert_eq!(stats.total_entries, report.entries_stored);
    assert_eq!(stats.dimension, 32);
    assert!(stats.repositories.contains("calc"));
}

#[tokio::test]
#[serial]
async fn branch_tags_share_one_index() {
    let work = tempfile::tempdir().unwrap();
    let checkout = work.path().join("calc");
    write_checkout(&checkout);
    let config = Config::load(&write_config(work.path(), &work.path().join("index"))).unwrap();

    let indexer = AppServices::from_config(&config).await.unwrap().indexer();
    let source = local_source(&config, &checkout);
    let main_tag = repository_tag("calc", Some("main"), &config.ingest.default_branch);
    let dev_tag = repository_tag("calc", Some("dev"), &config.ingest.default_branch);
    let main = indexer.index_repository(&main_tag, &source).await.unwrap();
    indexer.index_repository(&dev_tag, &source).await.unwrap();

    let removed = indexer
        .index()
        .delete_by_repository(dev_tag.clone())
        .await
        .unwrap();
    assert_eq!(removed, main.entries_stored);
    let stats = indexer.index().stats().await.unwrap();
    assert_eq!(stats.total_entries, main.entries_stored);
    assert_eq!(stats.repositories.into_iter().collect::<Vec<_>>(), vec![main_tag]);
}

#[tokio::test]
#[serial]
async fn env_store_path_overrides_file() {
    let work = tempfile::tempdir().unwrap();
    let config_path = write_config(work.path(), &work.path().join("from-file"));
    let env_store = work.path().join("from-env");
    unsafe { std::env::set_var("FORKLIFT_STORE_PATH", &env_store) };
    let config = Config::load(&config_path);
    unsafe { std::env::remove_var("FORKLIFT_STORE_PATH") };
    let config = config.unwrap();

    assert_eq!(config.store.path, env_store);
    let index = open_index(&config).await.unwrap();
    index.clear().await.unwrap();
    index.close().await.unwrap();
}
