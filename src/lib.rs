//! In-memory, action-recording fake client for `SeldonDeployment` controllers.
//!
//! Modeled on client-go's generated fake clientsets: every call made through
//! a [`FakeApi`] is recorded as an [`Action`], offered to a chain of
//! reactors, and finally answered by an in-memory object tracker.
//!
//! # Examples
//!
//! ## Typed facade
//!
//! ```rust
//! use seldon_fake_client::{ClientBuilder, SeldonDeployment, SeldonDeploymentSpec, Verb};
//! use kube::api::{ListParams, PostParams};
//!
//! let client = ClientBuilder::new().build().unwrap();
//! let deployments = client.seldon_deployments("default");
//!
//! let mut sdep = SeldonDeployment::new("iris", SeldonDeploymentSpec::default());
//! sdep.metadata.labels = Some([("app".to_string(), "iris".to_string())].into());
//! deployments.create(&PostParams::default(), &sdep).unwrap();
//!
//! let list = deployments
//!     .list(&ListParams::default().labels("app=iris"))
//!     .unwrap();
//! assert_eq!(list.items.len(), 1);
//!
//! let actions = client.actions();
//! assert!(actions[0].matches(Verb::Create, "seldondeployments"));
//! assert!(actions[1].matches(Verb::List, "seldondeployments"));
//! ```
//!
//! ## Standard `kube::Api`
//!
//! ```rust
//! use seldon_fake_client::{ClientBuilder, SeldonDeployment, SeldonDeploymentSpec};
//! use kube::api::{Api, PostParams};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fake = ClientBuilder::new().build()?;
//! let api: Api<SeldonDeployment> = Api::namespaced(fake.kube_client(), "default");
//!
//! let sdep = SeldonDeployment::new("iris", SeldonDeploymentSpec::default());
//! api.create(&PostParams::default(), &sdep).await?;
//! assert_eq!(fake.actions().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod action;
mod api;
mod builder;
mod client;
mod error;
pub mod label_selector;
pub mod patch;
pub mod reactor;
pub mod resource;
mod seldon;
mod service;
pub mod tracker;
mod utils;
mod watch;

#[cfg(test)]
mod tracker_test;
#[cfg(test)]
mod watch_test;

pub use action::{Action, ListRestrictions, Request, Verb};
pub use api::FakeApi;
pub use builder::ClientBuilder;
pub use client::FakeClient;
pub use error::{Error, Result};
pub use patch::PatchType;
pub use reactor::{ReactionContext, Reactor, WatchReactor};
pub use resource::{KindScope, GVK, GVR};
pub use seldon::{
    DeploymentStatus, PredictiveUnit, PredictorSpec, SeldonDeployment, SeldonDeploymentSpec,
    SeldonDeploymentStatus, SeldonDeployments,
};
pub use service::FakeService;
pub use tracker::ObjectTracker;
pub use watch::WatchStream;
