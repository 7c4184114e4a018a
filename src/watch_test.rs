//! Tests for typed watch streams

use crate::reactor::WatchReactor;
use crate::seldon::{SeldonDeployment, SeldonDeploymentSpec};
use crate::{ClientBuilder, Error, FakeClient, Verb};
use futures::StreamExt;
use kube::api::{DeleteParams, PatchParams, PostParams, WatchParams};
use kube::core::WatchEvent;
use kube::ResourceExt;
use serde_json::json;

fn sdep(name: &str) -> SeldonDeployment {
    SeldonDeployment::new(name, SeldonDeploymentSpec::default())
}

fn describe(event: WatchEvent<SeldonDeployment>) -> (&'static str, String) {
    match event {
        WatchEvent::Added(s) => ("ADDED", s.name_any()),
        WatchEvent::Modified(s) => ("MODIFIED", s.name_any()),
        WatchEvent::Deleted(s) => ("DELETED", s.name_any()),
        WatchEvent::Bookmark(_) => ("BOOKMARK", String::new()),
        WatchEvent::Error(e) => ("ERROR", e.message),
    }
}

#[tokio::test]
async fn test_watch_one_event_per_mutation_in_order() {
    let client = FakeClient::new();
    let api = client.seldon_deployments("default");
    let mut stream = api.watch(&WatchParams::default()).unwrap();

    let created = api.create(&PostParams::default(), &sdep("iris")).unwrap();
    api.update(&PostParams::default(), &created).unwrap();
    api.patch(
        "iris",
        crate::PatchType::Merge,
        r#"{"metadata":{"labels":{"app":"iris"}}}"#,
        &PatchParams::default(),
        &[],
    )
    .unwrap();
    api.delete("iris", &DeleteParams::default()).unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(describe(stream.next().await.unwrap().unwrap()));
    }
    assert_eq!(
        seen,
        vec![
            ("ADDED", "iris".to_string()),
            ("MODIFIED", "iris".to_string()),
            ("MODIFIED", "iris".to_string()),
            ("DELETED", "iris".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_watch_does_not_replay_existing_objects() {
    let client = ClientBuilder::new()
        .with_object(sdep("seeded"))
        .build()
        .unwrap();
    let api = client.seldon_deployments("default");
    let mut stream = api.watch(&WatchParams::default()).unwrap();

    api.create(&PostParams::default(), &sdep("fresh")).unwrap();

    let (kind, name) = describe(stream.next().await.unwrap().unwrap());
    assert_eq!((kind, name.as_str()), ("ADDED", "fresh"));
}

#[tokio::test]
async fn test_watch_does_not_filter_labels() {
    let client = FakeClient::new();
    let api = client.seldon_deployments("default");
    let mut stream = api
        .watch(&WatchParams::default().labels("app=iris"))
        .unwrap();

    api.create(&PostParams::default(), &sdep("unlabelled")).unwrap();

    let (_, name) = describe(stream.next().await.unwrap().unwrap());
    assert_eq!(name, "unlabelled");
}

#[tokio::test]
async fn test_watch_scoped_to_namespace() {
    let client = FakeClient::new();
    let models = client.seldon_deployments("models");
    let default = client.seldon_deployments("default");
    let mut stream = models.watch(&WatchParams::default()).unwrap();

    default.create(&PostParams::default(), &sdep("iris")).unwrap();
    models.create(&PostParams::default(), &sdep("income")).unwrap();

    let (_, name) = describe(stream.next().await.unwrap().unwrap());
    assert_eq!(name, "income");
}

#[tokio::test]
async fn test_stop_ends_delivery() {
    let client = FakeClient::new();
    let api = client.seldon_deployments("default");
    let mut stream = api.watch(&WatchParams::default()).unwrap();
    assert_eq!(client.with_tracker(|t| t.watcher_count()), 1);

    stream.stop();
    stream.stop();
    assert!(stream.is_stopped());
    assert_eq!(client.with_tracker(|t| t.watcher_count()), 0);

    api.create(&PostParams::default(), &sdep("iris")).unwrap();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_dropped_stream_does_not_block_writers() {
    let client = ClientBuilder::new().with_watch_buffer(1).build().unwrap();
    let api = client.seldon_deployments("default");
    let stream = api.watch(&WatchParams::default()).unwrap();
    let mut slow = api.watch(&WatchParams::default()).unwrap();
    drop(stream);

    for i in 0..3 {
        api.create(&PostParams::default(), &sdep(&format!("sdep-{}", i)))
            .unwrap();
    }

    // The slow watcher got one event before it was cut off
    assert!(slow.next().await.is_some());
    assert!(slow.next().await.is_none());
    assert_eq!(client.with_tracker(|t| t.watcher_count()), 0);
}

#[tokio::test]
async fn test_watch_reactor_events_are_decoded() {
    let client = FakeClient::new();
    client.add_watch_reactor(
        WatchReactor::new(|_| {
            Ok(Some(vec![
                WatchEvent::Added(serde_json::to_value(sdep("canned"))?),
                WatchEvent::Modified(json!({"not": "a deployment"})),
            ]))
        })
        .resource("seldondeployments"),
    );
    let api = client.seldon_deployments("default");
    let mut stream = api.watch(&WatchParams::default()).unwrap();

    let (_, name) = describe(stream.next().await.unwrap().unwrap());
    assert_eq!(name, "canned");
    assert!(matches!(
        stream.next().await,
        Some(Err(Error::TypeMismatch { .. }))
    ));
    assert!(stream.next().await.is_none());
    assert!(client.actions()[0].matches(Verb::Watch, "seldondeployments"));
}

#[test]
fn test_watch_wakes_on_mutation() {
    let client = FakeClient::new();
    let api = client.seldon_deployments("default");
    let mut watch = tokio_test::task::spawn(api.watch(&WatchParams::default()).unwrap());

    tokio_test::assert_pending!(watch.poll_next());

    api.create(&PostParams::default(), &sdep("iris")).unwrap();
    assert!(watch.is_woken());

    let event = tokio_test::assert_ready!(watch.poll_next());
    assert_eq!(describe(event.unwrap().unwrap()), ("ADDED", "iris".to_string()));
    tokio_test::assert_pending!(watch.poll_next());
}
