//! Basic usage: typed facade, label selection and the action log

use kube::api::{DeleteParams, GetParams, ListParams, PostParams};
use kube::ResourceExt;
use seldon_fake_client::{
    ClientBuilder, PredictiveUnit, PredictorSpec, SeldonDeployment, SeldonDeploymentSpec,
};
use std::collections::BTreeMap;

fn deployment(name: &str, app: &str, model_uri: &str) -> SeldonDeployment {
    let mut sdep = SeldonDeployment::new(
        name,
        SeldonDeploymentSpec {
            name: Some(name.to_string()),
            predictors: vec![PredictorSpec {
                name: "default".to_string(),
                graph: PredictiveUnit {
                    name: "classifier".to_string(),
                    unit_type: Some("MODEL".to_string()),
                    implementation: Some("SKLEARN_SERVER".to_string()),
                    model_uri: Some(model_uri.to_string()),
                    ..Default::default()
                },
                replicas: Some(1),
                traffic: 100,
                ..Default::default()
            }],
            ..Default::default()
        },
    );
    sdep.metadata.labels = Some(BTreeMap::from([("app".to_string(), app.to_string())]));
    sdep
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = ClientBuilder::new().build()?;
    let deployments = client.seldon_deployments("default");

    deployments.create(
        &PostParams::default(),
        &deployment("iris", "iris", "gs://seldon-models/sklearn/iris"),
    )?;
    deployments.create(
        &PostParams::default(),
        &deployment("income", "income", "gs://seldon-models/sklearn/income"),
    )?;

    let all = deployments.list(&ListParams::default())?;
    println!("All deployments (resourceVersion {:?}):", all.metadata.resource_version);
    for sdep in &all.items {
        println!("  {} labels={:?}", sdep.name_any(), sdep.labels());
    }

    let iris_only = deployments.list(&ListParams::default().labels("app=iris"))?;
    println!("\nSelected by app=iris: {}", iris_only.items.len());

    let iris = deployments.get("iris", &GetParams::default())?;
    println!("\nFetched {} with uid {:?}", iris.name_any(), iris.uid());

    deployments.delete("income", &DeleteParams::default())?;
    match deployments.get("income", &GetParams::default()) {
        Ok(_) => println!("✗ income should be gone"),
        Err(e) => println!("✓ Expected error: {}", e),
    }

    println!("\nRecorded actions:");
    for action in client.actions() {
        println!(
            "  {} {} ns={:?} name={:?}",
            action.verb(),
            action.resource,
            action.namespace,
            action.name()
        );
    }

    Ok(())
}
