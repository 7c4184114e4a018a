//! SeldonDeployment controller testing against a standard `kube::Api`

use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::ResourceExt;
use seldon_fake_client::{ClientBuilder, SeldonDeployment, SeldonDeploymentSpec};
use serde_json::json;

/// Marks every deployment whose predictors' traffic adds up to 100 as Available
pub struct StatusController {
    api: Api<SeldonDeployment>,
}

impl StatusController {
    pub fn new(api: Api<SeldonDeployment>) -> Self {
        Self { api }
    }

    pub async fn reconcile(&self, name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let sdep = self.api.get(name).await?;

        let traffic: i32 = sdep.spec.predictors.iter().map(|p| p.traffic).sum();
        let state = if traffic == 100 { "Available" } else { "Failed" };

        let current = sdep.status.as_ref().and_then(|s| s.state.as_deref());
        if current != Some(state) {
            let patch = json!({
                "status": {
                    "state": state,
                    "description": format!("predictor traffic totals {}", traffic),
                }
            });
            self.api
                .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }

        Ok(())
    }

    pub async fn reconcile_all(&self) -> Result<(), Box<dyn std::error::Error>> {
        let list = self.api.list(&ListParams::default()).await?;
        for sdep in list.items {
            self.reconcile(&sdep.name_any()).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fake = ClientBuilder::new()
        .with_status_subresource::<SeldonDeployment>()
        .with_fixture_dir("fixtures")
        .load_fixture("seldondeployments.yaml")?
        .build()?;

    let api: Api<SeldonDeployment> = Api::namespaced(fake.kube_client(), "models");
    let controller = StatusController::new(api.clone());

    println!("Running controller...");
    controller.reconcile_all().await?;

    println!("\nDeployments after reconciliation:");
    for sdep in api.list(&ListParams::default()).await?.items {
        let state = sdep.status.and_then(|s| s.state);
        println!("  {}: state = {:?}", sdep.metadata.name.unwrap_or_default(), state);
    }

    println!("\n{} actions recorded", fake.actions().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seldon_fake_client::{PredictorSpec, Verb};

    fn sdep(name: &str, traffic: &[i32]) -> SeldonDeployment {
        let predictors = traffic
            .iter()
            .enumerate()
            .map(|(i, t)| PredictorSpec {
                name: format!("p{}", i),
                traffic: *t,
                ..Default::default()
            })
            .collect();
        let mut sdep = SeldonDeployment::new(
            name,
            SeldonDeploymentSpec {
                predictors,
                ..Default::default()
            },
        );
        sdep.metadata.namespace = Some("default".to_string());
        sdep
    }

    #[tokio::test]
    async fn test_controller_sets_state() {
        let fake = ClientBuilder::new()
            .with_status_subresource::<SeldonDeployment>()
            .with_objects(vec![sdep("good", &[90, 10]), sdep("bad", &[50])])
            .build()
            .unwrap();
        let api: Api<SeldonDeployment> = Api::namespaced(fake.kube_client(), "default");

        StatusController::new(api.clone())
            .reconcile_all()
            .await
            .unwrap();

        let good = api.get("good").await.unwrap();
        assert_eq!(good.status.and_then(|s| s.state).as_deref(), Some("Available"));
        let bad = api.get("bad").await.unwrap();
        assert_eq!(bad.status.and_then(|s| s.state).as_deref(), Some("Failed"));
    }

    #[tokio::test]
    async fn test_controller_is_idempotent() {
        let fake = ClientBuilder::new()
            .with_status_subresource::<SeldonDeployment>()
            .with_object(sdep("good", &[100]))
            .build()
            .unwrap();
        let api: Api<SeldonDeployment> = Api::namespaced(fake.kube_client(), "default");
        let controller = StatusController::new(api);

        controller.reconcile("good").await.unwrap();
        fake.clear_actions();
        controller.reconcile("good").await.unwrap();

        let actions = fake.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].verb(), Verb::Get);
    }
}
