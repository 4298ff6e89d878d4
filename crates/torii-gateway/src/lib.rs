//! Dual-protocol gateway onto a pluggable key-value store.
//!
//! One logical store, two wire surfaces served concurrently:
//! - Kv over gRPC: Range, Put, DeleteRange (Txn and Compact report
//!   UNIMPLEMENTED)
//! - JSON over HTTP: POST /kv/put, /kv/range, /kv/deleterange, bridged
//!   onto the gRPC listener so both surfaces share one logic path
//!
//! Storage is consumed through the [`StoreAdapter`] trait; the gateway
//! itself owns no persistence or consensus.

pub mod proto {
    //! Generated protobuf types and service stubs.
    tonic::include_proto!("torii.v1");
}

pub mod http;
pub mod kv;
pub mod server;
pub mod store;

pub use kv::KvService;
pub use server::{Gateway, GatewayError};
pub use store::StoreAdapter;
