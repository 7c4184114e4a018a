//! Tower service that routes `kube::Client` HTTP requests to a fake client

use crate::action::Action;
use crate::client::FakeClient;
use crate::error::Error;
use crate::label_selector::LabelSelector;
use crate::patch::PatchType;
use crate::resource::GVR;
use crate::utils::labels_of;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use http::{Method, Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use kube::api::{ListParams, WatchParams};
use kube::client::Body as KubeBody;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Handle a fallible step by answering with a `Status` body
macro_rules! handle_error {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => return error_response(e),
        }
    };
}

/// Kubernetes API path split into its parts
///
/// Examples:
/// - /apis/machinelearning.seldon.io/v1alpha2/namespaces/default/seldondeployments
/// - /apis/machinelearning.seldon.io/v1alpha2/namespaces/default/seldondeployments/iris/status
/// - /apis/machinelearning.seldon.io/v1alpha2/seldondeployments (every namespace)
/// - /api/v1/nodes/node-1
#[derive(Debug, PartialEq)]
pub(crate) struct ParsedPath {
    pub(crate) resource: GVR,
    pub(crate) namespace: String,
    pub(crate) name: Option<String>,
    pub(crate) subresource: Option<String>,
}

pub(crate) fn parse_path(path: &str) -> Option<ParsedPath> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (group, rest) = match parts.as_slice() {
        ["api", rest @ ..] => ("", rest),
        ["apis", group, rest @ ..] => (*group, rest),
        _ => return None,
    };
    let (version, rest) = rest.split_first()?;

    let (namespace, rest) = match rest {
        ["namespaces", namespace, resource, rest @ ..] => {
            (*namespace, [std::slice::from_ref(resource), rest].concat())
        }
        _ => ("", rest.to_vec()),
    };
    let (resource, rest) = rest.split_first()?;
    let (name, subresource) = match rest.split_first() {
        Some((name, sub)) => (
            Some(name.to_string()),
            (!sub.is_empty()).then(|| sub.join("/")),
        ),
        None => (None, None),
    };

    Some(ParsedPath {
        resource: GVR::new(group, *version, *resource),
        namespace: namespace.to_string(),
        name,
        subresource,
    })
}

/// Query parameters understood by the fake API server
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Query {
    pub(crate) watch: bool,
    pub(crate) label_selector: Option<String>,
    pub(crate) field_selector: Option<String>,
    pub(crate) resource_version: Option<String>,
}

impl Query {
    pub(crate) fn parse(query: Option<&str>) -> Self {
        let mut parsed = Self::default();
        for pair in query.unwrap_or_default().split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match key {
                "watch" => parsed.watch = value == "true" || value == "1",
                "labelSelector" => parsed.label_selector = Some(value),
                "fieldSelector" => parsed.field_selector = Some(value),
                "resourceVersion" => parsed.resource_version = Some(value),
                _ => {}
            }
        }
        parsed
    }

    fn list_params(&self) -> ListParams {
        let mut params = ListParams::default();
        params.label_selector = self.label_selector.clone();
        params.field_selector = self.field_selector.clone();
        params.resource_version = self.resource_version.clone();
        params
    }

    fn watch_params(&self) -> WatchParams {
        let mut params = WatchParams::default();
        params.label_selector = self.label_selector.clone();
        params.field_selector = self.field_selector.clone();
        params
    }
}

/// HTTP front of a [`FakeClient`], for use with `kube::Client::new`
///
/// Every request becomes one action on the wrapped client, so requests made
/// through `kube::Api<K>` show up in the same action log as facade calls.
#[derive(Clone)]
pub struct FakeService {
    client: FakeClient,
}

impl FakeService {
    pub fn new(client: FakeClient) -> Self {
        Self { client }
    }

    async fn handle_request(
        &self,
        req: Request<KubeBody>,
    ) -> Result<Response<ResponseBody>, BoxError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = Query::parse(req.uri().query());
        let content_type = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = req.into_body().collect().await?.to_bytes();

        debug!("{} {}", method, path);

        let Some(parsed) = parse_path(&path) else {
            return error_response(Error::InvalidRequest(format!("unsupported path {}", path)));
        };
        let kind = handle_error!(self.client.kind_for(&parsed.resource));
        let ParsedPath {
            resource,
            namespace,
            name,
            subresource,
        } = parsed;

        let action = match (&method, name) {
            (&Method::GET, Some(name)) => Action::get(resource, &namespace, &name),
            (&Method::GET, None) if query.watch => {
                let action = Action::watch(resource, &namespace, &query.watch_params());
                let receiver = handle_error!(self.client.invokes_watch(action));
                return watch_response(receiver);
            }
            (&Method::GET, None) => {
                let params = query.list_params();
                let action = Action::list(resource, kind, &namespace, &params);
                let mut list = handle_error!(self.client.invokes(action));
                let selector =
                    handle_error!(LabelSelector::from_optional(params.label_selector.as_deref()));
                if let Some(items) = list.get_mut("items").and_then(Value::as_array_mut) {
                    items.retain(|item| selector.matches(&labels_of(item)));
                }
                return json_response(StatusCode::OK, &list);
            }
            (&Method::POST, None) => {
                let mut object = handle_error!(parse_object(&body));
                if object.get("apiVersion").is_none() {
                    object["apiVersion"] = json!(kind.api_version());
                }
                if object.get("kind").is_none() {
                    object["kind"] = json!(kind.kind);
                }
                let created = handle_error!(
                    self.client
                        .invokes(Action::create(resource, &namespace, object))
                );
                return json_response(StatusCode::CREATED, &created);
            }
            (&Method::PUT, Some(_)) => {
                let object = handle_error!(parse_object(&body));
                Action::update(resource, &namespace, object)
            }
            (&Method::PATCH, Some(name)) => {
                let patch_type = PatchType::from_content_type(content_type.as_deref());
                Action::patch(resource, &namespace, &name, patch_type, body)
            }
            (&Method::DELETE, Some(name)) => Action::delete(resource, &namespace, &name),
            (&Method::DELETE, None) => {
                Action::delete_collection(resource, &namespace, &query.list_params())
            }
            _ => {
                return status_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "MethodNotAllowed",
                    &format!("{} is not supported on {}", method, path),
                )
            }
        };
        let action = match subresource {
            Some(subresource) => action.with_subresource(subresource),
            None => action,
        };

        let answer = handle_error!(self.client.invokes(action));
        if answer.is_null() {
            return json_response(
                StatusCode::OK,
                &json!({
                    "kind": "Status",
                    "apiVersion": "v1",
                    "metadata": {},
                    "status": "Success",
                    "code": 200,
                }),
            );
        }
        json_response(StatusCode::OK, &answer)
    }
}

impl Service<Request<KubeBody>> for FakeService {
    type Response = Response<ResponseBody>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        let this = self.clone();
        async move { this.handle_request(req).await }.boxed()
    }
}

impl FakeClient {
    /// A standard `kube::Client` answered by this fake client
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use seldon_fake_client::{FakeClient, SeldonDeployment};
    /// use kube::api::{Api, ListParams};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let fake = FakeClient::new();
    /// let api: Api<SeldonDeployment> = Api::namespaced(fake.kube_client(), "default");
    ///
    /// let list = api.list(&ListParams::default()).await?;
    /// assert!(list.items.is_empty());
    /// assert_eq!(fake.actions().len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn kube_client(&self) -> kube::Client {
        kube::Client::new(FakeService::new(self.clone()), "default")
    }
}

fn parse_object(body: &[u8]) -> crate::Result<Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(object) if object.is_object() => Ok(object),
        Ok(_) => Err(Error::InvalidRequest(
            "request body is not a JSON object".to_string(),
        )),
        Err(e) => Err(Error::InvalidRequest(format!(
            "request body is not valid JSON: {}",
            e
        ))),
    }
}

fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync()
}

fn json_response(status: StatusCode, data: &Value) -> Result<Response<ResponseBody>, BoxError> {
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(full_body(data.to_string()))?)
}

fn status_response(
    status: StatusCode,
    reason: &str,
    message: &str,
) -> Result<Response<ResponseBody>, BoxError> {
    json_response(
        status,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": status.as_u16(),
        }),
    )
}

/// Kubernetes `Status` body for a dispatcher error
fn error_response(err: Error) -> Result<Response<ResponseBody>, BoxError> {
    debug!("Answering with error: {}", err);
    status_response(err.status_code(), err.reason(), &err.to_string())
}

/// Stream events as newline-delimited JSON until the subscription ends
fn watch_response(
    receiver: crate::tracker::EventReceiver,
) -> Result<Response<ResponseBody>, BoxError> {
    let events = futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|event| (event, receiver))
    })
    .map(|event| {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        Ok::<_, BoxError>(Frame::data(Bytes::from(line)))
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(StreamBody::new(events).boxed_unsync())?)
}
