use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hierarchy_browser::{
    BrowserSession, ClientError, ExecutorLimits, MenuAction, PartExecutionError, SessionOptions,
};
use hierarchy_model::ClassHierarchy;
use hierarchy_provider::{ProviderContext, ProviderOptions, Server};
use hierarchy_static::StaticResolver;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SUBMIT_SCRIPT: &str = "print('sbatch --partition', argv[1], 'for', argv[0]);";

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("parent created");
    }
    std::fs::write(path, contents).expect("file written");
}

fn write_json(path: &Path, value: &Value) {
    write(path, &value.to_string());
}

/// A cluster with two partitions, one of them a GPU subclass, and one part
/// targeting partitions.
fn fixture(root: &Path) {
    let objects = root.join("Objects");
    write_json(
        &objects.join("ComputeSystems.json"),
        &json!({"class": "WPObject", "title": "Compute Systems"}),
    );
    write_json(
        &objects.join("ComputeSystems").join("Quartz.json"),
        &json!({"class": "WPSlurmPartition"}),
    );
    write_json(
        &objects.join("ComputeSystems").join("BigRed.json"),
        &json!({"class": "WPGpuPartition", "title": "BigRed 200"}),
    );

    let parts = root.join("Parts");
    write_json(
        &parts.join("submit.json"),
        &json!({
            "UniqueID": "Slurm/SubmitInteractiveJob",
            "ContextMenuEntryName": "Submit interactive job",
            "ScriptReference": "submit.js",
            "ObjectClassList": ["WPSlurmPartition"],
        }),
    );
    write(&parts.join("submit.js"), SUBMIT_SCRIPT);
}

struct Provider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    _root: TempDir,
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_provider() -> Provider {
    let root = tempfile::tempdir().expect("temporary directory should be created");
    fixture(root.path());

    let resolver = StaticResolver::open(&root.path().join("Objects"), root.path())
        .expect("objects directory opens");
    let options = ProviderOptions {
        root_name: "Research Computing".to_string(),
        parts_dir: Some(root.path().join("Parts")),
        ..ProviderOptions::default()
    };
    let context = ProviderContext::new(options, Arc::new(resolver)).expect("parts load");
    let server = Server::bind("127.0.0.1:0", Arc::new(context))
        .await
        .expect("provider binds");
    let addr = server.local_addr().expect("bound address");
    let shutdown = CancellationToken::new();
    tokio::spawn(server.run(shutdown.clone()));

    Provider {
        addr,
        shutdown,
        _root: root,
    }
}

fn options(store_dir: &Path) -> SessionOptions {
    SessionOptions {
        store_dir: store_dir.to_path_buf(),
        hierarchy: ClassHierarchy::builtin()
            .with_classes([("WPGpuPartition", "WPSlurmPartition")])
            .expect("acyclic"),
        limits: ExecutorLimits::default(),
        poll_interval: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn downloads_every_part_once_and_persists_it() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");

    let session = BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
        .await
        .expect("session connects");

    assert_eq!(session.info().root_name, "Research Computing");
    assert_eq!(session.inventory().len(), 1);
    let part = session
        .inventory()
        .get("Slurm/SubmitInteractiveJob")
        .expect("part installed");
    assert_eq!(part.script, SUBMIT_SCRIPT);
    let path = part.path.as_deref().expect("script persisted");
    assert_eq!(
        std::fs::read_to_string(path).expect("script readable"),
        SUBMIT_SCRIPT
    );
    assert_eq!(
        session.store().load_manifest().map(|m| m.len()),
        Some(1)
    );
}

#[tokio::test]
async fn unknown_part_ids_are_provider_errors() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");
    let mut session =
        BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
            .await
            .expect("session connects");

    let error = session
        .client()
        .part("Slurm/DoesNotExist")
        .await
        .expect_err("unknown part");

    assert!(error.is_provider_error());
    assert!(matches!(error, ClientError::Provider(message) if message.contains("Slurm/DoesNotExist")));
}

#[tokio::test]
async fn browses_static_objects_with_child_counts() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");
    let mut session =
        BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
            .await
            .expect("session connects");

    let roots = session.children("/").await.expect("root objects");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, "/ComputeSystems");
    assert_eq!(roots[0].objects, 2);

    let systems = session.children("/ComputeSystems").await.expect("children");
    let titles: Vec<_> = systems.iter().map(|o| o.title.as_str()).collect();
    assert_eq!(titles, ["BigRed 200", "Quartz"]);
    assert!(systems.iter().all(|o| o.objects == 0));
}

#[tokio::test]
async fn unsupported_search_is_empty_without_a_handle() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");
    let mut session =
        BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
            .await
            .expect("session connects");

    let raw = session
        .client()
        .request(&json!({"method": "Search", "id": "/ComputeSystems", "search": "Q"}))
        .await
        .expect("search answers");
    assert_eq!(raw, json!({"objects": []}));

    let results = session
        .search("/ComputeSystems", "Q", true)
        .await
        .expect("search completes");
    assert!(results.is_empty());
}

#[tokio::test]
async fn subclass_menu_offers_and_runs_the_parent_class_part() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");
    let mut session =
        BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
            .await
            .expect("session connects");

    let gpu = session
        .locate("/ComputeSystems/BigRed")
        .await
        .expect("listing succeeds")
        .expect("object exists");
    let menu = session.menu(&gpu);
    assert_eq!(menu.len(), 1);
    let MenuAction::RunPart { unique_id } = &menu[0].action else {
        panic!("expected a part entry, got {:?}", menu[0].action);
    };

    let output = session.run_part(unique_id, &gpu).await.expect("part runs");
    assert_eq!(
        output.lines,
        ["sbatch --partition BigRed 200 for Slurm/SubmitInteractiveJob"]
    );

    let folder = session
        .locate("/ComputeSystems")
        .await
        .expect("listing succeeds")
        .expect("object exists");
    assert!(session.menu(&folder).is_empty());
}

#[tokio::test]
async fn running_an_uninstalled_part_fails_locally() {
    let provider = start_provider().await;
    let store_dir = tempfile::tempdir().expect("temporary directory should be created");
    let session = BrowserSession::connect(&provider.addr.to_string(), options(store_dir.path()))
        .await
        .expect("session connects");
    let object = hierarchy_model::WPObject::new("WPSlurmPartition", "/q", "q");

    let error = session
        .run_part("Slurm/DoesNotExist", &object)
        .await
        .expect_err("part is not installed");

    assert_eq!(
        error,
        PartExecutionError::UnknownPart("Slurm/DoesNotExist".to_string())
    );
}
