//! Provider setup and consumer flows against an in-process mock connector.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use edcflow_core::{
    ApiVariant, Asset, ConnectorEndpoint, DataAddress, DataPlaneDescriptor, EdcError, Endpoint,
    ErrorKind, ResourceKind,
};
use edcflow_poll::{CancelToken, PollPolicy, Poller, TerminalStates};
use edcflow_sdk::{
    Consumer, ConsumerFlow, ContractScope, ManagementClient, NegotiationDriver, ProviderSetup,
    RegistrationMode, TransferDriver,
};
use serde_json::{json, Value};

const API_KEY: &str = "password";
const PROVIDER_PROTOCOL: &str = "http://provider:8282/protocol";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    api_key: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Debug)]
struct MockConnector {
    variant: ApiVariant,
    requests: Vec<Recorded>,
    dataplane_status: StatusCode,
    asset_status: StatusCode,
    negotiation_states: VecDeque<&'static str>,
    transfer_states: VecDeque<&'static str>,
    negotiations: u32,
    transfers: u32,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self {
            variant: ApiVariant::JsonLd,
            requests: Vec::new(),
            dataplane_status: StatusCode::OK,
            asset_status: StatusCode::OK,
            negotiation_states: VecDeque::from(["REQUESTED", "AGREED", "FINALIZED"]),
            transfer_states: VecDeque::from(["REQUESTED", "STARTED", "COMPLETED"]),
            negotiations: 0,
            transfers: 0,
        }
    }
}

impl MockConnector {
    fn speaking(variant: ApiVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    fn route(&self, endpoint: Endpoint<'_>) -> String {
        format!("/management/{}", self.variant.path(endpoint))
    }

    fn catalog(&self) -> Value {
        match self.variant {
            ApiVariant::Legacy => json!({
                "id": "catalog",
                "contractOffers": [{
                    "id": "offer-1",
                    "assetId": "assetId",
                    "policy": { "permissions": [] },
                }],
            }),
            ApiVariant::Namespaced | ApiVariant::JsonLd => json!({
                "@id": "catalog",
                "dcat:dataset": {
                    "@id": "dataset-1",
                    "edc:id": "assetId",
                    "odrl:hasPolicy": {
                        "@id": "offer-1",
                        "@type": "odrl:Set",
                        "odrl:permission": [],
                    },
                },
            }),
        }
    }

    /// Reply body of a negotiation or transfer lookup.
    fn lifecycle(&self, id: &str, state: &str) -> Value {
        let mut reply = json!({});
        reply[self.variant.id_field()] = json!(id);
        reply[self.variant.state_field()] = json!(state);
        reply
    }

    fn created(&self, id: String) -> Value {
        let mut reply = json!({});
        reply[self.variant.id_field()] = json!(id);
        reply
    }

    fn echo_id(&self, body: &Value, generated: &str) -> Value {
        let field = self.variant.id_field();
        let id = body
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(generated)
            .to_string();
        self.created(id)
    }
}

type Shared = Arc<Mutex<MockConnector>>;

/// Pop the next scripted state, repeating the last one forever.
fn next_state(states: &mut VecDeque<&'static str>) -> &'static str {
    if states.len() > 1 {
        states.pop_front().unwrap()
    } else {
        states.front().copied().unwrap()
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut mock = state.lock().unwrap();
    mock.requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let instances = mock.route(Endpoint::DataPlaneInstances);
    let assets = mock.route(Endpoint::Assets);
    let policies = mock.route(Endpoint::PolicyDefinitions);
    let definitions = mock.route(Endpoint::ContractDefinitions);
    let catalog = mock.route(Endpoint::CatalogRequest);
    let negotiations = mock.route(Endpoint::Negotiations);
    let transfers = mock.route(Endpoint::TransferProcesses);
    let negotiation_prefix = mock.route(Endpoint::Negotiation(""));
    let transfer_prefix = mock.route(Endpoint::TransferProcess(""));

    let (status, reply) = match (method.as_str(), path.as_str()) {
        ("POST", p) if p == instances => (mock.dataplane_status, json!({})),
        ("POST", p) if p == assets => {
            if mock.asset_status.is_success() {
                (StatusCode::OK, mock.echo_id(&body, "generated-asset"))
            } else {
                (mock.asset_status, json!([{ "message": "asset already exists" }]))
            }
        }
        ("POST", p) if p == policies => (StatusCode::OK, mock.echo_id(&body, "generated-policy")),
        ("POST", p) if p == definitions => (
            StatusCode::OK,
            mock.echo_id(&body, "generated-definition"),
        ),
        ("POST", p) if p == catalog => (StatusCode::OK, mock.catalog()),
        ("POST", p) if p == negotiations => {
            mock.negotiations += 1;
            let id = format!("negotiation-{}", mock.negotiations);
            (StatusCode::OK, mock.created(id))
        }
        ("POST", p) if p == transfers => {
            mock.transfers += 1;
            let id = format!("transfer-{}", mock.transfers);
            (StatusCode::OK, mock.created(id))
        }
        ("POST", p) if p.starts_with(&transfer_prefix) && p.ends_with("/deprovision") => {
            (StatusCode::NO_CONTENT, Value::Null)
        }
        ("GET", p) if p.starts_with(&negotiation_prefix) => {
            let id = &p[negotiation_prefix.len()..];
            let current = next_state(&mut mock.negotiation_states);
            let mut reply = mock.lifecycle(id, current);
            if current == "FINALIZED" {
                reply[mock.variant.agreement_field()] = json!("agreement-1");
            }
            (StatusCode::OK, reply)
        }
        ("GET", p) if p.starts_with(&transfer_prefix) => {
            let id = &p[transfer_prefix.len()..];
            let current = next_state(&mut mock.transfer_states);
            (StatusCode::OK, mock.lifecycle(id, current))
        }
        _ => (StatusCode::NOT_FOUND, json!({ "error": "no route" })),
    };

    if reply.is_null() {
        status.into_response()
    } else {
        (status, Json(reply)).into_response()
    }
}

async fn spawn_connector(mock: MockConnector) -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(Mutex::new(mock));
    let app = Router::new().fallback(handle).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn client_for(addr: SocketAddr, variant: ApiVariant) -> ManagementClient {
    let endpoint =
        ConnectorEndpoint::new(format!("http://{addr}/management")).with_api_key(API_KEY);
    ManagementClient::new(endpoint, variant).unwrap()
}

fn client(addr: SocketAddr) -> ManagementClient {
    client_for(addr, ApiVariant::JsonLd)
}

fn fast_policy() -> PollPolicy {
    PollPolicy::default()
        .with_interval(Duration::from_millis(10))
        .with_deadline(Duration::from_secs(5))
}

fn sample_asset() -> Asset {
    Asset::builder()
        .id("assetId")
        .name("product description")
        .data_address(DataAddress::http("Test asset", "https://jsonplaceholder.typicode.com/users"))
        .build()
        .unwrap()
}

fn requests(state: &Shared) -> Vec<Recorded> {
    state.lock().unwrap().requests.clone()
}

#[tokio::test]
async fn test_provider_setup_publishes_offer() {
    let (addr, state) = spawn_connector(MockConnector::default()).await;

    let setup = ProviderSetup::new(sample_asset())
        .with_dataplane(
            DataPlaneDescriptor::new("http://provider:19192/control/transfer", "http://provider:19291/public/"),
            RegistrationMode::Strict,
        )
        .with_policy_id("aPolicy")
        .with_contract_definition_id("1");

    let offer = setup.provision(&client(addr)).await.unwrap();
    assert_eq!(offer.asset_id, "assetId");
    assert_eq!(offer.policy_id, "aPolicy");
    assert_eq!(offer.contract_definition_id, "1");

    let recorded = requests(&state);
    let paths: Vec<&str> = recorded.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/management/instances",
            "/management/v3/assets",
            "/management/v2/policydefinitions",
            "/management/v2/contractdefinitions",
        ]
    );
    assert!(recorded
        .iter()
        .all(|r| r.api_key.as_deref() == Some(API_KEY)));

    let dataplane = &recorded[0].body;
    assert_eq!(dataplane["allowedSourceTypes"], json!(["HttpData"]));
    assert_eq!(dataplane["allowedDestTypes"], json!(["HttpProxy", "HttpData"]));

    let definition = &recorded[3].body;
    assert_eq!(definition["accessPolicyId"], "aPolicy");
    assert_eq!(definition["contractPolicyId"], "aPolicy");
    assert_eq!(definition["assetsSelector"][0]["operandRight"], "assetId");
}

#[tokio::test]
async fn test_all_assets_scope_and_server_ids() {
    let (addr, state) = spawn_connector(MockConnector::default()).await;

    let asset = Asset::builder()
        .name("unnamed")
        .data_address(DataAddress::http("unnamed", "http://example.org"))
        .build()
        .unwrap();
    let offer = ProviderSetup::new(asset)
        .with_scope(ContractScope::AllAssets)
        .provision(&client(addr))
        .await
        .unwrap();

    assert_eq!(offer.asset_id, "generated-asset");
    assert_eq!(offer.policy_id, "generated-policy");
    assert_eq!(offer.contract_definition_id, "generated-definition");

    let recorded = requests(&state);
    assert_eq!(recorded.len(), 3);
    assert_eq!(recorded[2].body["assetsSelector"], json!([]));
}

#[tokio::test]
async fn test_rejected_asset_is_unexpected_status() {
    let (addr, _state) = spawn_connector(MockConnector {
        asset_status: StatusCode::CONFLICT,
        ..MockConnector::default()
    })
    .await;

    let err = ProviderSetup::new(sample_asset())
        .provision(&client(addr))
        .await
        .unwrap_err();

    match err {
        EdcError::UnexpectedStatus { status, endpoint, .. } => {
            assert_eq!(status, 409);
            assert!(endpoint.ends_with("/management/v3/assets"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_dataplane_registration_modes() {
    let (addr, _state) = spawn_connector(MockConnector {
        dataplane_status: StatusCode::CONFLICT,
        ..MockConnector::default()
    })
    .await;
    let client = client(addr);
    let descriptor = DataPlaneDescriptor::new("http://p/transfer", "http://p/public");

    let status = client
        .register_dataplane(&descriptor, RegistrationMode::WarnOnFailure)
        .await
        .unwrap();
    assert_eq!(status, 409);

    let err = client
        .register_dataplane(&descriptor, RegistrationMode::Strict)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_consumer_flow_runs_to_completion() {
    let (addr, state) = spawn_connector(MockConnector::default()).await;
    let consumer = Consumer::new(client(addr), fast_policy(), fast_policy());
    let flow = ConsumerFlow::new("pull", PROVIDER_PROTOCOL, DataAddress::HttpProxy);

    let report = consumer.run(&flow, &CancelToken::new()).await.unwrap();
    assert_eq!(report.flow, "pull");
    assert_eq!(report.offer.offer_id, "offer-1");
    assert_eq!(report.offer.asset_id, "assetId");
    assert_eq!(report.negotiation_id, "negotiation-1");
    assert_eq!(report.agreement_id, "agreement-1");
    assert_eq!(report.transfer_id, "transfer-1");
    assert!(!report.deprovisioned);
    assert!(report.finished_at >= report.started_at);

    let recorded = requests(&state);
    let negotiation = recorded
        .iter()
        .find(|r| r.method == Method::POST && r.path == "/management/v2/contractnegotiations")
        .unwrap();
    assert_eq!(negotiation.body["counterPartyAddress"], PROVIDER_PROTOCOL);
    assert_eq!(negotiation.body["policy"]["@id"], "offer-1");
    assert_eq!(negotiation.body["policy"]["target"], "assetId");

    let transfer = recorded
        .iter()
        .find(|r| r.method == Method::POST && r.path == "/management/v2/transferprocesses")
        .unwrap();
    assert_eq!(transfer.body["contractId"], "agreement-1");
    assert_eq!(transfer.body["dataDestination"]["type"], "HttpProxy");

    let negotiation_polls = recorded
        .iter()
        .filter(|r| r.method == Method::GET && r.path.ends_with("/negotiation-1"))
        .count();
    assert_eq!(negotiation_polls, 3);
    assert!(!recorded.iter().any(|r| r.path.ends_with("/deprovision")));
}

#[tokio::test]
async fn test_namespaced_connector_flow() {
    let (addr, state) = spawn_connector(MockConnector::speaking(ApiVariant::Namespaced)).await;
    let consumer = Consumer::new(
        client_for(addr, ApiVariant::Namespaced),
        fast_policy(),
        fast_policy(),
    );
    let flow = ConsumerFlow::new(
        "push",
        PROVIDER_PROTOCOL,
        DataAddress::object_destination("s3.example.org", "company2", "result/"),
    );

    let report = consumer.run(&flow, &CancelToken::new()).await.unwrap();
    assert_eq!(report.offer.offer_id, "offer-1");
    assert_eq!(report.offer.asset_id, "assetId");
    assert_eq!(report.agreement_id, "agreement-1");
    assert_eq!(report.transfer_id, "transfer-1");
    assert!(report.deprovisioned);

    let recorded = requests(&state);
    let paths: Vec<&str> = recorded
        .iter()
        .filter(|r| r.method == Method::POST)
        .map(|r| r.path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/management/v2/catalog/request",
            "/management/v2/contractnegotiations",
            "/management/v2/transferprocesses",
            "/management/v2/transferprocesses/transfer-1/deprovision",
        ]
    );

    let negotiation = &recorded[1].body;
    assert_eq!(negotiation["@type"], "edc:NegotiationInitiateRequestDto");
    assert_eq!(negotiation["edc:offer"]["edc:offerId"], "offer-1");
    assert_eq!(negotiation["edc:offer"]["edc:assetId"], "assetId");

    let transfer = recorded
        .iter()
        .find(|r| r.method == Method::POST && r.path == "/management/v2/transferprocesses")
        .unwrap();
    assert_eq!(transfer.body["edc:contractId"], "agreement-1");
}

#[tokio::test]
async fn test_legacy_connector_flow() {
    let (addr, state) = spawn_connector(MockConnector::speaking(ApiVariant::Legacy)).await;
    let consumer = Consumer::new(
        client_for(addr, ApiVariant::Legacy),
        fast_policy(),
        fast_policy(),
    );
    let flow = ConsumerFlow::new("pull", PROVIDER_PROTOCOL, DataAddress::HttpProxy);

    let report = consumer.run(&flow, &CancelToken::new()).await.unwrap();
    assert_eq!(report.offer.offer_id, "offer-1");
    assert_eq!(report.offer.asset_id, "assetId");
    assert_eq!(report.negotiation_id, "negotiation-1");
    assert_eq!(report.agreement_id, "agreement-1");
    assert_eq!(report.transfer_id, "transfer-1");
    assert!(!report.deprovisioned);

    let recorded = requests(&state);
    let negotiation = recorded
        .iter()
        .find(|r| r.method == Method::POST && r.path == "/management/v1/data/contractnegotiations")
        .unwrap();
    assert_eq!(negotiation.body["protocol"], "ids-multipart");
    assert_eq!(negotiation.body["offer"]["offerId"], "offer-1");

    let transfer = recorded
        .iter()
        .find(|r| r.method == Method::POST && r.path == "/management/v1/data/transferprocess")
        .unwrap();
    assert_eq!(transfer.body["contractId"], "agreement-1");
    assert_eq!(transfer.body["assetId"], "assetId");

    let transfer_polls = recorded
        .iter()
        .filter(|r| r.method == Method::GET && r.path == "/management/v1/data/transferprocess/transfer-1")
        .count();
    assert_eq!(transfer_polls, 3);
}

#[tokio::test]
async fn test_object_storage_destination_is_deprovisioned() {
    let (addr, state) = spawn_connector(MockConnector::default()).await;
    let consumer = Consumer::new(client(addr), fast_policy(), fast_policy());
    let flow = ConsumerFlow::new(
        "push",
        PROVIDER_PROTOCOL,
        DataAddress::object_destination("s3-eu-central-1.ionoscloud.com", "company2", "result/"),
    );

    let report = consumer.run(&flow, &CancelToken::new()).await.unwrap();
    assert!(report.deprovisioned);

    let recorded = requests(&state);
    let last = recorded.last().unwrap();
    assert_eq!(last.method, Method::POST);
    assert_eq!(
        last.path,
        "/management/v2/transferprocesses/transfer-1/deprovision"
    );
    assert_eq!(last.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_transfer_that_never_completes_times_out() {
    let (addr, _state) = spawn_connector(MockConnector {
        transfer_states: VecDeque::from(["STARTED"]),
        ..MockConnector::default()
    })
    .await;
    let consumer = Consumer::new(
        client(addr),
        fast_policy(),
        PollPolicy::default()
            .with_interval(Duration::from_millis(5))
            .with_max_attempts(4),
    );
    let flow = ConsumerFlow::new("stuck", PROVIDER_PROTOCOL, DataAddress::HttpProxy);

    let err = consumer.run(&flow, &CancelToken::new()).await.unwrap_err();
    match err {
        EdcError::Timeout { id, attempts, .. } => {
            assert_eq!(id, "transfer-1");
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_configured_failure_state_stops_negotiation() {
    let (addr, state) = spawn_connector(MockConnector {
        negotiation_states: VecDeque::from(["REQUESTED", "TERMINATED"]),
        ..MockConnector::default()
    })
    .await;
    let client = client(addr);
    let negotiation = NegotiationDriver::with_poller(
        client.clone(),
        Poller::new(fast_policy()),
        TerminalStates::negotiation().with_failures(["TERMINATED"]),
    );
    let transfer = TransferDriver::new(client.clone(), fast_policy());
    let consumer = Consumer::from_drivers(client, negotiation, transfer);
    let flow = ConsumerFlow::new("declined", PROVIDER_PROTOCOL, DataAddress::HttpProxy);

    let err = consumer.run(&flow, &CancelToken::new()).await.unwrap_err();
    match err {
        EdcError::TerminalFailure { id, state, .. } => {
            assert_eq!(id, "negotiation-1");
            assert_eq!(state, "TERMINATED");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!requests(&state)
        .iter()
        .any(|r| r.path == "/management/v2/transferprocesses"));
}

#[tokio::test]
async fn test_cancelled_flow_stops_waiting() {
    let (addr, _state) = spawn_connector(MockConnector {
        negotiation_states: VecDeque::from(["REQUESTED"]),
        ..MockConnector::default()
    })
    .await;
    let consumer = Consumer::new(client(addr), PollPolicy::unbounded(), fast_policy());
    let flow = ConsumerFlow::new("cancelled", PROVIDER_PROTOCOL, DataAddress::HttpProxy);
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = consumer.run(&flow, &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_flow_cancelled_up_front_sends_nothing() {
    let (addr, state) = spawn_connector(MockConnector::default()).await;
    let consumer = Consumer::new(client(addr), fast_policy(), fast_policy());
    let flow = ConsumerFlow::new("cancelled", PROVIDER_PROTOCOL, DataAddress::HttpProxy);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = consumer.run(&flow, &cancel).await.unwrap_err();
    match err {
        EdcError::Cancelled { resource, .. } => assert_eq!(resource, ResourceKind::Catalog),
        other => panic!("unexpected error: {other}"),
    }
    assert!(requests(&state).is_empty());
}

#[tokio::test]
async fn test_concurrent_flows_each_report() {
    let (addr, state) = spawn_connector(MockConnector {
        negotiation_states: VecDeque::from(["FINALIZED"]),
        transfer_states: VecDeque::from(["COMPLETED"]),
        ..MockConnector::default()
    })
    .await;
    let consumer = Consumer::new(client(addr), fast_policy(), fast_policy());
    let flows = vec![
        ConsumerFlow::new("first", PROVIDER_PROTOCOL, DataAddress::HttpProxy),
        ConsumerFlow::new("second", PROVIDER_PROTOCOL, DataAddress::HttpProxy),
    ];

    let results = consumer.run_concurrently(flows, &CancelToken::new()).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "first");
    assert_eq!(results[1].0, "second");
    assert!(results.iter().all(|(_, result)| result.is_ok()));

    let mut transfer_ids: Vec<String> = results
        .into_iter()
        .map(|(_, result)| result.unwrap().transfer_id)
        .collect();
    transfer_ids.sort();
    assert_eq!(transfer_ids, vec!["transfer-1", "transfer-2"]);
    assert_eq!(state.lock().unwrap().negotiations, 2);
}

#[tokio::test]
async fn test_unreachable_connector_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr)
        .query_catalog(PROVIDER_PROTOCOL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.is_recoverable());
}
