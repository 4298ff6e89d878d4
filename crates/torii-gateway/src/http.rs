//! JSON-over-HTTP bridge.
//!
//! Offers put, range and deleterange to clients without a gRPC stack.
//! Every accepted request is decoded from JSON, forwarded through a fresh
//! loopback connection to the gateway's own binary listener, and the reply
//! is re-encoded as JSON. The bridge never touches the store directly, so
//! the two surfaces cannot diverge in business logic.

use crate::proto::{self, kv_client::KvClient};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

/// Dial timeout for the loopback connection to the binary listener.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call timeout for a forwarded request, independent of the listener
/// lifetime.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared router state: where the binary listener is bound.
#[derive(Clone)]
pub(crate) struct BridgeState {
    grpc_addr: SocketAddr,
}

/// Build the bridge router for a gateway whose binary listener is bound at
/// `grpc_addr`. The router is per-instance, so multiple gateways can
/// coexist in one process.
pub(crate) fn router(grpc_addr: SocketAddr) -> Router {
    Router::new()
        .route("/kv/put", post(put))
        .route("/kv/range", post(range))
        .route("/kv/deleterange", post(delete_range))
        .layer(middleware::from_fn(cors))
        .with_state(BridgeState { grpc_addr })
}

/// Permissive cross-origin headers on every response; OPTIONS preflight
/// short-circuits with 200 and no body before routing.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS, PUT, DELETE"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(
            "Accept, Content-Type, Content-Length, Accept-Encoding, Authorization",
        ),
    );
    response
}

// Request bodies. Keys and values travel as plain text, mirroring the
// binary request shapes field for field.

#[derive(Debug, Deserialize)]
pub struct PutBody {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeBody {
    pub key: String,
    #[serde(default)]
    pub range_end: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRangeBody {
    pub key: String,
    #[serde(default)]
    pub range_end: String,
}

// Reply bodies, re-encoded from the binary responses.

#[derive(Debug, Serialize)]
pub struct HeaderReply {
    pub cluster_id: u64,
    pub member_id: u64,
    pub revision: i64,
    pub raft_term: u64,
}

#[derive(Debug, Serialize)]
pub struct KeyValueReply {
    pub key: String,
    pub create_revision: i64,
    pub mod_revision: i64,
    pub version: i64,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct RangeReply {
    pub header: Option<HeaderReply>,
    pub kvs: Vec<KeyValueReply>,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct PutReply {
    pub header: Option<HeaderReply>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRangeReply {
    pub header: Option<HeaderReply>,
    pub deleted: i64,
}

impl From<proto::ResponseHeader> for HeaderReply {
    fn from(h: proto::ResponseHeader) -> Self {
        Self {
            cluster_id: h.cluster_id,
            member_id: h.member_id,
            revision: h.revision,
            raft_term: h.raft_term,
        }
    }
}

impl From<proto::KeyValue> for KeyValueReply {
    fn from(kv: proto::KeyValue) -> Self {
        Self {
            key: String::from_utf8_lossy(&kv.key).into_owned(),
            create_revision: kv.create_revision,
            mod_revision: kv.mod_revision,
            version: kv.version,
            value: String::from_utf8_lossy(&kv.value).into_owned(),
        }
    }
}

impl From<proto::RangeResponse> for RangeReply {
    fn from(r: proto::RangeResponse) -> Self {
        Self {
            header: r.header.map(Into::into),
            kvs: r.kvs.into_iter().map(Into::into).collect(),
            count: r.count,
        }
    }
}

impl From<proto::PutResponse> for PutReply {
    fn from(r: proto::PutResponse) -> Self {
        Self {
            header: r.header.map(Into::into),
        }
    }
}

impl From<proto::DeleteRangeResponse> for DeleteRangeReply {
    fn from(r: proto::DeleteRangeResponse) -> Self {
        Self {
            header: r.header.map(Into::into),
            deleted: r.deleted,
        }
    }
}

/// Bridge failure modes, mapped onto HTTP statuses.
enum BridgeError {
    /// The JSON body could not be decoded. Rejected before anything is
    /// forwarded.
    BadRequest(String),
    /// The forwarded call came back with a gRPC status.
    Rpc(tonic::Status),
    /// The loopback connection to the binary listener failed.
    Connect(tonic::transport::Error),
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        match self {
            BridgeError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {msg}"),
            )
                .into_response(),
            BridgeError::Rpc(status) => match status.code() {
                Code::InvalidArgument => {
                    (StatusCode::BAD_REQUEST, status.message().to_string()).into_response()
                }
                Code::Unimplemented => {
                    (StatusCode::NOT_IMPLEMENTED, status.message().to_string()).into_response()
                }
                code => {
                    tracing::error!(?code, message = status.message(), "forwarded call failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal gateway error").into_response()
                }
            },
            BridgeError::Connect(e) => {
                tracing::error!(error = %e, "loopback connection to binary listener failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal gateway error").into_response()
            }
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, BridgeError> {
    serde_json::from_slice(body).map_err(|e| BridgeError::BadRequest(e.to_string()))
}

/// Open a fresh loopback connection for one forwarded call; nothing is
/// shared across requests.
async fn connect(addr: SocketAddr) -> Result<KvClient<Channel>, BridgeError> {
    let endpoint = Endpoint::from_shared(format!("http://{addr}"))
        .map_err(BridgeError::Connect)?
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(FORWARD_TIMEOUT);
    let channel = endpoint.connect().await.map_err(BridgeError::Connect)?;
    Ok(KvClient::new(channel))
}

async fn put(
    State(state): State<BridgeState>,
    body: Bytes,
) -> Result<Json<PutReply>, BridgeError> {
    let req: PutBody = decode_body(&body)?;

    let mut client = connect(state.grpc_addr).await?;
    let reply = client
        .put(proto::PutRequest {
            key: req.key.into_bytes(),
            value: req.value.into_bytes(),
        })
        .await
        .map_err(BridgeError::Rpc)?
        .into_inner();

    Ok(Json(reply.into()))
}

async fn range(
    State(state): State<BridgeState>,
    body: Bytes,
) -> Result<Json<RangeReply>, BridgeError> {
    let req: RangeBody = decode_body(&body)?;

    let mut client = connect(state.grpc_addr).await?;
    let reply = client
        .range(proto::RangeRequest {
            key: req.key.into_bytes(),
            range_end: req.range_end.into_bytes(),
        })
        .await
        .map_err(BridgeError::Rpc)?
        .into_inner();

    Ok(Json(reply.into()))
}

async fn delete_range(
    State(state): State<BridgeState>,
    body: Bytes,
) -> Result<Json<DeleteRangeReply>, BridgeError> {
    let req: DeleteRangeBody = decode_body(&body)?;

    let mut client = connect(state.grpc_addr).await?;
    let reply = client
        .delete_range(proto::DeleteRangeRequest {
            key: req.key.into_bytes(),
            range_end: req.range_end.into_bytes(),
        })
        .await
        .map_err(BridgeError::Rpc)?
        .into_inner();

    Ok(Json(reply.into()))
}
