//! Reactor usage patterns

use futures::StreamExt;
use kube::api::{GetParams, PostParams, WatchParams};
use kube::core::WatchEvent;
use kube::ResourceExt;
use seldon_fake_client::{
    ClientBuilder, Error, Reactor, Request, SeldonDeployment, SeldonDeploymentSpec, Verb,
    WatchReactor,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Example 1: Error Injection ===");
    let client = ClientBuilder::new()
        .with_reactor(
            Reactor::new(|ctx| {
                if ctx.action.name() == Some("trigger-error") {
                    return Err(Error::Injected("admission webhook denied the request".into()));
                }
                Ok(None)
            })
            .verb(Verb::Create)
            .resource("seldondeployments"),
        )
        .build()?;
    let deployments = client.seldon_deployments("default");

    let normal = SeldonDeployment::new("iris", SeldonDeploymentSpec::default());
    match deployments.create(&PostParams::default(), &normal) {
        Ok(_) => println!("✓ Created iris successfully"),
        Err(e) => println!("✗ Failed to create iris: {}", e),
    }

    let failing = SeldonDeployment::new("trigger-error", SeldonDeploymentSpec::default());
    match deployments.create(&PostParams::default(), &failing) {
        Ok(_) => println!("✗ Should have failed!"),
        Err(e) => println!("✓ Expected error: {}", e),
    }

    println!("\n=== Example 2: Canned Responses ===");
    client.prepend_reactor(
        Reactor::new(|ctx| match &ctx.action.request {
            Request::Get { name } if name == "phantom" => Ok(Some(json!({
                "apiVersion": "machinelearning.seldon.io/v1alpha2",
                "kind": "SeldonDeployment",
                "metadata": {"name": "phantom", "namespace": "default"},
                "spec": {"predictors": []},
            }))),
            _ => Ok(None),
        })
        .verb(Verb::Get),
    );
    let phantom = deployments.get("phantom", &GetParams::default())?;
    println!("✓ Got {} without it being stored", phantom.name_any());

    println!("\n=== Example 3: Scripted Watch ===");
    client.add_watch_reactor(WatchReactor::new(|_| {
        let sdep = SeldonDeployment::new("scripted", SeldonDeploymentSpec::default());
        let object = serde_json::to_value(sdep)?;
        Ok(Some(vec![
            WatchEvent::Added(object.clone()),
            WatchEvent::Deleted(object),
        ]))
    }));
    let mut stream = deployments.watch(&WatchParams::default())?;
    while let Some(event) = stream.next().await {
        match event? {
            WatchEvent::Added(s) => println!("  added {}", s.name_any()),
            WatchEvent::Deleted(s) => println!("  deleted {}", s.name_any()),
            other => println!("  {:?}", other),
        }
    }

    println!("\n{} actions recorded", client.actions().len());
    Ok(())
}
