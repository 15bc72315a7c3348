use redraft_state::{
    StoreTarget, SurrealVersionStore, VersionMetadata, VersionOrigin, VersionStore,
};

#[tokio::test]
async fn local_target_creates_directory_and_stores_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corpus").join("db");
    let target = StoreTarget::Local(path.clone());

    let store = SurrealVersionStore::connect(&target).await.unwrap();
    assert!(path.is_dir());

    let first = store
        .append("Chapter one.", VersionMetadata::new(VersionOrigin::Seed))
        .await
        .unwrap();
    let second = store
        .append("Chapter one, revised.", VersionMetadata::new(VersionOrigin::Manual))
        .await
        .unwrap();
    assert_eq!((first, second), (0, 1));

    let latest = store.latest().await.unwrap().unwrap();
    assert_eq!(latest.content, "Chapter one, revised.");
    assert_eq!(latest.metadata.origin, VersionOrigin::Manual);
}
