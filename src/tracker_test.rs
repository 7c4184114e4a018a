#[cfg(test)]
mod tests {
    use crate::label_selector::LabelSelector;
    use crate::patch::PatchType;
    use crate::resource::GVR;
    use crate::tracker::*;
    use crate::Error;
    use kube::core::WatchEvent;
    use serde_json::{json, Value};

    fn gvr() -> GVR {
        GVR::new("machinelearning.seldon.io", "v1alpha2", "seldondeployments")
    }

    fn create_test_object(name: &str, namespace: &str) -> Value {
        json!({
            "apiVersion": "machinelearning.seldon.io/v1alpha2",
            "kind": "SeldonDeployment",
            "metadata": {
                "name": name,
                "namespace": namespace,
            },
            "spec": {
                "predictors": [{
                    "name": "default",
                    "graph": {"name": "classifier", "implementation": "SKLEARN_SERVER"}
                }]
            }
        })
    }

    fn labelled(name: &str, namespace: &str, labels: Value) -> Value {
        let mut object = create_test_object(name, namespace);
        object["metadata"]["labels"] = labels;
        object
    }

    fn event_name(event: &WatchEvent<Value>) -> (&'static str, String) {
        let (kind, object) = match event {
            WatchEvent::Added(o) => ("ADDED", o),
            WatchEvent::Modified(o) => ("MODIFIED", o),
            WatchEvent::Deleted(o) => ("DELETED", o),
            other => panic!("unexpected event {:?}", other),
        };
        let name = object["metadata"]["name"].as_str().unwrap_or_default();
        (kind, name.to_string())
    }

    #[test]
    fn test_add_sets_globally_increasing_resource_version() {
        let mut tracker = ObjectTracker::new();

        let added = tracker
            .add(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
        let rv1: u64 = added["metadata"]["resourceVersion"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let added2 = tracker
            .add(&gvr(), create_test_object("income", "models"), "models")
            .unwrap();
        let rv2: u64 = added2["metadata"]["resourceVersion"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        assert!(rv2 > rv1, "Resource version should be globally increasing");
        assert_eq!(tracker.resource_version(), rv2);
        assert!(added["metadata"]["uid"].is_string());
    }

    #[test]
    fn test_add_preserves_existing_resource_version() {
        let mut tracker = ObjectTracker::new();
        let mut obj = create_test_object("iris", "default");
        obj["metadata"]["resourceVersion"] = json!("42");

        let added = tracker.add(&gvr(), obj, "default").unwrap();
        assert_eq!(added["metadata"]["resourceVersion"], "42");
    }

    #[test]
    fn test_create_and_get() {
        let mut tracker = ObjectTracker::new();

        let created = tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
        assert_eq!(created["metadata"]["resourceVersion"], "1");

        let fetched = tracker.get(&gvr(), "default", "iris").unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_fills_in_namespace() {
        let mut tracker = ObjectTracker::new();
        let mut obj = create_test_object("iris", "default");
        obj["metadata"].as_object_mut().unwrap().remove("namespace");

        let created = tracker.create(&gvr(), obj, "models").unwrap();
        assert_eq!(created["metadata"]["namespace"], "models");
    }

    #[test]
    fn test_create_rejects_namespace_mismatch() {
        let mut tracker = ObjectTracker::new();
        let err = tracker
            .create(&gvr(), create_test_object("iris", "default"), "models")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_create_rejects_resource_version() {
        let mut tracker = ObjectTracker::new();
        let mut obj = create_test_object("iris", "default");
        obj["metadata"]["resourceVersion"] = json!("7");

        let err = tracker.create(&gvr(), obj, "default").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_create_already_exists() {
        let mut tracker = ObjectTracker::new();
        tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();

        let mut duplicate = create_test_object("iris", "default");
        duplicate["spec"] = json!({"predictors": []});
        let err = tracker.create(&gvr(), duplicate, "default").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));

        // The original object is untouched
        let stored = tracker.get(&gvr(), "default", "iris").unwrap();
        assert_eq!(stored["spec"]["predictors"][0]["name"], "default");

        // Same name in another namespace is a different object
        tracker
            .create(&gvr(), create_test_object("iris", "models"), "models")
            .unwrap();
    }

    #[test]
    fn test_missing_objects_are_not_found() {
        let mut tracker = ObjectTracker::new();

        assert!(matches!(
            tracker.get(&gvr(), "default", "iris"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            tracker.update(&gvr(), create_test_object("iris", "default"), "default", None),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            tracker.delete(&gvr(), "default", "iris"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            tracker.patch(&gvr(), "default", "iris", PatchType::Merge, b"{}", None),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_keeps_uid_and_bumps_resource_version() {
        let mut tracker = ObjectTracker::new();
        let created = tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();

        let mut changed = created.clone();
        changed["spec"]["predictors"][0]["replicas"] = json!(3);
        changed["metadata"]["uid"] = json!("overwritten");
        let updated = tracker.update(&gvr(), changed, "default", None).unwrap();

        assert_eq!(updated["metadata"]["uid"], created["metadata"]["uid"]);
        assert_eq!(updated["metadata"]["resourceVersion"], "2");
        assert_eq!(updated["spec"]["predictors"][0]["replicas"], 3);
    }

    #[test]
    fn test_update_ignores_stale_resource_version() {
        let mut tracker = ObjectTracker::new();
        let created = tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
        tracker
            .update(&gvr(), created.clone(), "default", None)
            .unwrap();

        // `created` still carries resourceVersion 1
        let updated = tracker.update(&gvr(), created, "default", None).unwrap();
        assert_eq!(updated["metadata"]["resourceVersion"], "3");
    }

    #[test]
    fn test_status_subresource() {
        let mut tracker = ObjectTracker::new();
        tracker.add_status_subresource(gvr());
        assert!(tracker.has_status_subresource(&gvr()));

        let mut obj = create_test_object("iris", "default");
        obj["status"] = json!({"state": "Creating"});
        let created = tracker.create(&gvr(), obj, "default").unwrap();

        // A plain update cannot touch the status
        let mut changed = created.clone();
        changed["status"] = json!({"state": "Available"});
        changed["spec"]["predictors"][0]["replicas"] = json!(2);
        let updated = tracker.update(&gvr(), changed, "default", None).unwrap();
        assert_eq!(updated["status"]["state"], "Creating");
        assert_eq!(updated["spec"]["predictors"][0]["replicas"], 2);

        // A status update changes nothing but the status
        let mut changed = updated.clone();
        changed["status"] = json!({"state": "Available"});
        changed["spec"]["predictors"][0]["replicas"] = json!(5);
        let updated = tracker
            .update(&gvr(), changed, "default", Some("status"))
            .unwrap();
        assert_eq!(updated["status"]["state"], "Available");
        assert_eq!(updated["spec"]["predictors"][0]["replicas"], 2);
    }

    #[test]
    fn test_patch_merge() {
        let mut tracker = ObjectTracker::new();
        tracker
            .create(&gvr(), labelled("iris", "default", json!({"app": "x"})), "default")
            .unwrap();

        let patched = tracker
            .patch(
                &gvr(),
                "default",
                "iris",
                PatchType::Merge,
                br#"{"metadata":{"labels":{"app":"y"}}}"#,
                None,
            )
            .unwrap();
        assert_eq!(patched["metadata"]["labels"]["app"], "y");
        assert_eq!(patched["metadata"]["resourceVersion"], "2");
        assert_eq!(tracker.get(&gvr(), "default", "iris").unwrap(), patched);
    }

    #[test]
    fn test_patch_status_subresource_only_changes_status() {
        let mut tracker = ObjectTracker::new();
        tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();

        let patched = tracker
            .patch(
                &gvr(),
                "default",
                "iris",
                PatchType::Merge,
                br#"{"status":{"state":"Available"},"spec":{"predictors":[]}}"#,
                Some("status"),
            )
            .unwrap();
        assert_eq!(patched["status"]["state"], "Available");
        assert_eq!(patched["spec"]["predictors"][0]["name"], "default");
    }

    #[test]
    fn test_patch_cannot_rename() {
        let mut tracker = ObjectTracker::new();
        tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();

        let err = tracker
            .patch(
                &gvr(),
                "default",
                "iris",
                PatchType::Merge,
                br#"{"metadata":{"name":"other"}}"#,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(tracker.get(&gvr(), "default", "iris").is_ok());
    }

    #[test]
    fn test_list_is_scoped_and_ordered() {
        let mut tracker = ObjectTracker::new();
        for (name, ns) in [("b", "models"), ("a", "models"), ("c", "default")] {
            tracker
                .create(&gvr(), create_test_object(name, ns), ns)
                .unwrap();
        }

        let names = |items: Vec<Value>| -> Vec<String> {
            items
                .iter()
                .map(|o| o["metadata"]["name"].as_str().unwrap().to_string())
                .collect()
        };

        assert_eq!(names(tracker.list(&gvr(), "models")), vec!["a", "b"]);
        assert_eq!(names(tracker.list(&gvr(), "")), vec!["c", "a", "b"]);
        assert!(tracker.list(&gvr(), "staging").is_empty());
        assert!(tracker
            .list(&GVR::new("", "v1", "pods"), "")
            .is_empty());
    }

    #[test]
    fn test_delete_collection_removes_matching_subset() {
        let mut tracker = ObjectTracker::new();
        tracker
            .create(&gvr(), labelled("one", "default", json!({"a": "1"})), "default")
            .unwrap();
        tracker
            .create(&gvr(), labelled("two", "default", json!({"a": "2"})), "default")
            .unwrap();
        tracker
            .create(&gvr(), labelled("three", "default", json!({"b": "1"})), "default")
            .unwrap();
        tracker
            .create(&gvr(), labelled("other", "models", json!({"a": "1"})), "models")
            .unwrap();

        let selector: LabelSelector = "a=1".parse().unwrap();
        let removed = tracker.delete_collection(&gvr(), "default", &selector);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0]["metadata"]["name"], "one");

        assert_eq!(tracker.list(&gvr(), "default").len(), 2);
        assert!(tracker.get(&gvr(), "models", "other").is_ok());

        // Nothing matches: success, no change
        let version = tracker.resource_version();
        let removed = tracker.delete_collection(&gvr(), "default", &selector);
        assert!(removed.is_empty());
        assert_eq!(tracker.list(&gvr(), "default").len(), 2);
        assert_eq!(tracker.resource_version(), version);
    }

    #[tokio::test]
    async fn test_watch_delivers_mutations_in_order() {
        let mut tracker = ObjectTracker::new();
        let mut events = tracker.watch(&gvr(), "default");

        let created = tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
        tracker
            .create(&gvr(), create_test_object("ignored", "models"), "models")
            .unwrap();
        tracker.update(&gvr(), created, "default", None).unwrap();
        tracker.delete(&gvr(), "default", "iris").unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event_name(&event));
        }
        assert_eq!(
            seen,
            vec![
                ("ADDED", "iris".to_string()),
                ("MODIFIED", "iris".to_string()),
                ("DELETED", "iris".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_watch_all_namespaces() {
        let mut tracker = ObjectTracker::new();
        let mut events = tracker.watch(&gvr(), "");

        tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
        tracker
            .create(&gvr(), create_test_object("income", "models"), "models")
            .unwrap();

        assert_eq!(event_name(&events.try_recv().unwrap()).1, "iris");
        assert_eq!(event_name(&events.try_recv().unwrap()).1, "income");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_watcher_is_pruned() {
        let mut tracker = ObjectTracker::new();
        let events = tracker.watch(&gvr(), "default");
        assert_eq!(tracker.watcher_count(), 1);

        drop(events);
        assert_eq!(tracker.watcher_count(), 0);

        // Writers are not affected by the closed subscription
        tracker
            .create(&gvr(), create_test_object("iris", "default"), "default")
            .unwrap();
    }

    #[tokio::test]
    async fn test_slow_watcher_is_dropped_without_blocking() {
        let mut tracker = ObjectTracker::with_watch_buffer(2);
        let mut events = tracker.watch(&gvr(), "default");

        for i in 0..5 {
            tracker
                .create(&gvr(), create_test_object(&format!("sdep-{}", i), "default"), "default")
                .unwrap();
        }
        assert_eq!(tracker.watcher_count(), 0);

        // Buffered events are still readable, then the stream ends
        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_none());
    }
}
