use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beat_net::{Deadline, MemorySwarm};
use beat_session::{
    add, cat, init, ls, pin, share, BeatConfig, Context, Lookup, Manifest, SessionError, Share,
};
use beat_store::EntryKind;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn context(dir: &Path, home: &Path) -> Context {
    let mut config = BeatConfig::default();
    config.store.root = Some(home.join("store"));
    config.swarm.poll_interval_ms = 20;
    config.http.bind_addr = "127.0.0.1:0".parse().unwrap();
    Context::new(dir, home, config)
}

fn populate(dir: &Path) {
    std::fs::create_dir_all(dir.join("docs/deep")).unwrap();
    std::fs::write(dir.join("index.html"), b"<h1>beat</h1>").unwrap();
    std::fs::write(dir.join("docs/a.md"), b"# a").unwrap();
    std::fs::write(dir.join("docs/deep/b.bin"), vec![42u8; 200_000]).unwrap();
    std::fs::write(dir.join(".hidden"), b"secret").unwrap();
}

fn names(lookup: Lookup<Vec<(String, EntryKind)>>) -> Vec<String> {
    lookup
        .found()
        .expect("directory exists")
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

#[tokio::test]
async fn init_writes_manifest_once() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), home.path());

    let outcome = init(&ctx).await.unwrap();
    assert_eq!(outcome.manifest_path, dir.path().join("dat.json"));
    assert_eq!(Manifest::load(dir.path()).unwrap().key, outcome.address);
    assert_eq!(outcome.discovery_id, outcome.address.discovery_id());
    let before = std::fs::read(&outcome.manifest_path).unwrap();

    let err = init(&ctx).await.unwrap_err();
    assert!(matches!(err, SessionError::ConfigConflict { .. }));
    assert_eq!(std::fs::read(&outcome.manifest_path).unwrap(), before);
}

#[tokio::test]
async fn announcer_sees_tree_before_completion() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let ctx = context(dir.path(), home.path())
        .with_announcer(Arc::new(move |address, _| sink.lock().unwrap().push(address)));

    let outcome = init(&ctx).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![outcome.address]);
}

#[tokio::test]
async fn add_round_trips_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path());
    init(&ctx).await.unwrap();

    let added = add(&ctx).await.unwrap();
    let mut paths: Vec<String> = added.files.iter().map(|f| f.path.to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/dat.json", "/docs/a.md", "/docs/deep/b.bin", "/index.html"]);
    assert_eq!(added.version, 4);

    let root = ls(&ctx, "/").await.unwrap();
    assert_eq!(names(root.entries), vec!["dat.json", "docs", "index.html"]);
    let docs = ls(&ctx, "/docs").await.unwrap().entries.found().unwrap();
    assert_eq!(
        docs,
        vec![
            ("a.md".to_string(), EntryKind::File),
            ("deep".to_string(), EntryKind::Directory),
        ]
    );

    let big = cat(&ctx, "/docs/deep/b.bin").await.unwrap();
    assert_eq!(big.content, Lookup::Found(vec![42u8; 200_000]));
    let index = cat(&ctx, "index.html").await.unwrap();
    assert_eq!(index.content, Lookup::Found(b"<h1>beat</h1>".to_vec()));
}

#[tokio::test]
async fn add_twice_keeps_content() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path());
    init(&ctx).await.unwrap();

    let first = add(&ctx).await.unwrap();
    let listing = names(ls(&ctx, "/docs").await.unwrap().entries);
    let second = add(&ctx).await.unwrap();

    assert_eq!(first.address, second.address);
    assert_eq!(first.files.len(), second.files.len());
    assert_eq!(second.version, first.version);
    assert_eq!(names(ls(&ctx, "/docs").await.unwrap().entries), listing);
    assert_eq!(
        cat(&ctx, "/docs/a.md").await.unwrap().content,
        Lookup::Found(b"# a".to_vec())
    );
}

#[tokio::test]
async fn add_does_not_remove_deleted_files() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path());
    init(&ctx).await.unwrap();
    add(&ctx).await.unwrap();

    std::fs::remove_file(dir.path().join("index.html")).unwrap();
    add(&ctx).await.unwrap();
    assert!(matches!(
        cat(&ctx, "/index.html").await.unwrap().content,
        Lookup::Found(_)
    ));
}

#[tokio::test]
async fn missing_paths_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path());
    init(&ctx).await.unwrap();
    add(&ctx).await.unwrap();
    let manifest = std::fs::read(dir.path().join("dat.json")).unwrap();

    let listing = ls(&ctx, "/nope").await.unwrap();
    assert_eq!(listing.entries, Lookup::NotFound("/nope".into()));
    let read = cat(&ctx, "/docs").await.unwrap();
    assert_eq!(read.content, Lookup::NotFound("/docs".into()));
    let hidden = cat(&ctx, "/.hidden").await.unwrap();
    assert_eq!(hidden.content, Lookup::NotFound("/.hidden".into()));

    assert_eq!(std::fs::read(dir.path().join("dat.json")).unwrap(), manifest);
}

#[tokio::test]
async fn commands_need_a_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), home.path());

    assert!(matches!(add(&ctx).await, Err(SessionError::ConfigMissing { .. })));
    assert!(matches!(ls(&ctx, "/").await, Err(SessionError::ConfigMissing { .. })));
    assert!(matches!(cat(&ctx, "/a").await, Err(SessionError::ConfigMissing { .. })));
    assert!(matches!(share(&ctx, None, Some(0)).await, Err(SessionError::ConfigMissing { .. })));
    assert!(!home.path().join("store").exists());
}

#[tokio::test]
async fn bad_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), home.path()).with_transport(Arc::new(MemorySwarm::new()));

    let err = pin(&ctx, "not-hex", Deadline::Unbounded).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidKey { .. }));
}

#[tokio::test]
async fn pin_without_peers_times_out_and_store_reopens() {
    let swarm = MemorySwarm::new();
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path()).with_transport(Arc::new(swarm.clone()));
    init(&ctx).await.unwrap();
    add(&ctx).await.unwrap();

    let stranger_dir = tempfile::tempdir().unwrap();
    let stranger_home = tempfile::tempdir().unwrap();
    let stranger = init(&context(stranger_dir.path(), stranger_home.path()))
        .await
        .unwrap();

    let err = pin(
        &ctx,
        &stranger.address.to_hex(),
        Deadline::After(Duration::from_millis(150)),
    )
    .await
    .unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert_eq!(swarm.members(&stranger.discovery_id), 0);

    let root = ls(&ctx, "/").await.unwrap();
    assert_eq!(names(root.entries), vec!["dat.json", "docs", "index.html"]);
}

#[tokio::test]
async fn pin_replicates_a_shared_tree() {
    let swarm = MemorySwarm::new();
    let a_dir = tempfile::tempdir().unwrap();
    let a_home = tempfile::tempdir().unwrap();
    populate(a_dir.path());
    let a = context(a_dir.path(), a_home.path()).with_transport(Arc::new(swarm.clone()));
    let created = init(&a).await.unwrap();
    add(&a).await.unwrap();

    let b_dir = tempfile::tempdir().unwrap();
    let b_home = tempfile::tempdir().unwrap();
    let b = context(b_dir.path(), b_home.path()).with_transport(Arc::new(swarm.clone()));

    let shared = share(&a, None, Some(0)).await.unwrap();
    assert_eq!(shared.address, created.address);
    let (stop, stopped) = oneshot::channel::<()>();
    let server = shared.run(async move {
        let _ = stopped.await;
    });
    let client = async {
        let pinned = pin(
            &b,
            &created.address.to_hex(),
            Deadline::After(Duration::from_secs(10)),
        )
        .await;
        let _ = stop.send(());
        pinned
    };
    let (served, pinned) = tokio::join!(server, client);
    served.unwrap();
    let pinned = pinned.unwrap();
    assert_eq!(pinned.report.version, 4);
    assert!(pinned.report.blocks_fetched > 0);
    assert_eq!(swarm.members(&created.discovery_id), 0);

    Manifest::new(created.address).create(b_dir.path()).unwrap();
    let copy = cat(&b, "/docs/deep/b.bin").await.unwrap();
    assert_eq!(copy.content, Lookup::Found(vec![42u8; 200_000]));
}

/// Serve `shared` until one `GET path` has been answered; the raw response.
async fn fetch(shared: Share, path: &str) -> String {
    let addr = shared.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = shared.run(async move {
        let _ = stopped.await;
    });
    let client = async {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        let _ = stop.send(());
        response
    };
    let (served, response) = tokio::join!(server, client);
    served.unwrap();
    response
}

#[tokio::test]
async fn share_lists_top_level_names() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    let ctx = context(dir.path(), home.path()).with_transport(Arc::new(MemorySwarm::new()));
    init(&ctx).await.unwrap();
    add(&ctx).await.unwrap();

    let shared = share(&ctx, None, Some(0)).await.unwrap();
    let addr = shared.local_addr();
    assert_eq!(shared.url(), format!("http://{addr}/"));
    let response = fetch(shared, "/").await;

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("<a href=\"docs/\">docs/</a>"));
    assert!(response.contains("<a href=\"index.html\">index.html</a>"));
    assert!(response.contains("<a href=\"dat.json\">dat.json</a>"));
    assert!(!response.contains(".hidden"));
}

#[tokio::test]
async fn share_serves_assets_from_home() {
    let dir = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    populate(dir.path());
    std::fs::create_dir_all(home.path().join("public")).unwrap();
    std::fs::write(home.path().join("public/app.css"), b"body{}").unwrap();
    let ctx = context(dir.path(), home.path()).with_transport(Arc::new(MemorySwarm::new()));
    init(&ctx).await.unwrap();
    add(&ctx).await.unwrap();

    let shared = share(&ctx, None, Some(0)).await.unwrap();
    let response = fetch(shared, "/app.css").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("body{}"));
}
