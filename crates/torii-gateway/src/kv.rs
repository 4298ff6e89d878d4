//! Kv service implementation.
//!
//! Translates Range, Put and DeleteRange requests into calls against the
//! [`StoreAdapter`] and assembles protocol-correct responses. Txn and
//! Compact are stubbed out with UNIMPLEMENTED.

use crate::proto::{self, kv_server::Kv};
use crate::store::StoreAdapter;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Kv service implementation.
///
/// Holds the shared store handle; each inbound call runs on its own task
/// and performs exactly one store operation, so no additional locking
/// happens here.
pub struct KvService {
    store: Arc<dyn StoreAdapter>,
}

impl KvService {
    /// Create a new Kv service over the given store.
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    /// Header attached to every response. The gateway owns no consensus
    /// layer, so cluster, member, revision and term are fixed placeholders.
    fn response_header() -> proto::ResponseHeader {
        proto::ResponseHeader {
            cluster_id: 1,
            member_id: 1,
            revision: 1,
            raft_term: 1,
        }
    }
}

#[tonic::async_trait]
impl Kv for KvService {
    async fn range(
        &self,
        request: Request<proto::RangeRequest>,
    ) -> Result<Response<proto::RangeResponse>, Status> {
        let req = request.into_inner();

        if req.key.is_empty() {
            return Err(Status::invalid_argument("key is required"));
        }

        let key = String::from_utf8_lossy(&req.key).into_owned();
        let mut kvs = Vec::new();

        if req.range_end.is_empty() {
            // Single-key lookup. A missing key is an empty result, not an
            // error.
            match self.store.get(&key).await {
                Ok(Some(value)) => {
                    kvs.push(proto::KeyValue {
                        key: req.key.clone(),
                        value: value.into_bytes(),
                        create_revision: 1,
                        mod_revision: 1,
                        version: 1,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%key, error = %e, "store get failed");
                    return Err(Status::internal("store read failed"));
                }
            }
        } else if req.range_end.last() == Some(&0) {
            // Trailing zero byte is the prefix-scan convention: range_end is
            // the key with its final byte incremented plus a zero sentinel.
            // The store contract exposes no key enumeration, so the scan
            // cannot be satisfied; recognize it and return an empty result.
            let prefix =
                String::from_utf8_lossy(&req.range_end[..req.range_end.len() - 1]).into_owned();
            tracing::debug!(%prefix, "prefix scan requested but the store does not enumerate keys, returning empty result");
        } else {
            tracing::debug!(%key, "bounded range scan is not supported, returning empty result");
        }

        let count = kvs.len() as i64;
        Ok(Response::new(proto::RangeResponse {
            header: Some(Self::response_header()),
            kvs,
            count,
        }))
    }

    async fn put(
        &self,
        request: Request<proto::PutRequest>,
    ) -> Result<Response<proto::PutResponse>, Status> {
        let req = request.into_inner();

        if req.key.is_empty() {
            return Err(Status::invalid_argument("key is required"));
        }

        let key = String::from_utf8_lossy(&req.key).into_owned();
        let value = String::from_utf8_lossy(&req.value).into_owned();

        // The call does not return until the store acknowledges the write.
        if let Err(e) = self.store.set(&key, &value).await {
            tracing::error!(%key, error = %e, "store set failed");
            return Err(Status::internal("store write failed"));
        }

        // No prev_kv payload: the store contract has no atomic get-and-set.
        Ok(Response::new(proto::PutResponse {
            header: Some(Self::response_header()),
        }))
    }

    async fn delete_range(
        &self,
        request: Request<proto::DeleteRangeRequest>,
    ) -> Result<Response<proto::DeleteRangeResponse>, Status> {
        let req = request.into_inner();

        if req.key.is_empty() {
            return Err(Status::invalid_argument("key is required"));
        }

        // Single-key delete only; the range form is reported as a
        // capability gap before any store access.
        if !req.range_end.is_empty() {
            return Err(Status::unimplemented("range delete not implemented"));
        }

        let key = String::from_utf8_lossy(&req.key).into_owned();

        if let Err(e) = self.store.delete(&key).await {
            tracing::error!(%key, error = %e, "store delete failed");
            return Err(Status::internal("store delete failed"));
        }

        // deleted is always 1: the store does not report whether the key
        // existed, so callers must not infer prior existence from it.
        Ok(Response::new(proto::DeleteRangeResponse {
            header: Some(Self::response_header()),
            deleted: 1,
        }))
    }

    async fn txn(
        &self,
        _request: Request<proto::TxnRequest>,
    ) -> Result<Response<proto::TxnResponse>, Status> {
        Err(Status::unimplemented("txn not implemented"))
    }

    async fn compact(
        &self,
        _request: Request<proto::CompactionRequest>,
    ) -> Result<Response<proto::CompactionResponse>, Status> {
        Err(Status::unimplemented("compact not implemented"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tonic::Code;

    /// In-memory store that counts every adapter call, so tests can assert
    /// which operations never reach the store at all.
    #[derive(Default)]
    struct CountingStore {
        data: RwLock<HashMap<String, String>>,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoreAdapter for CountingStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.data.read().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.data.write().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.data.write().remove(key);
            Ok(())
        }
    }

    /// Store whose every operation fails, for exercising the internal-error
    /// path.
    struct FailingStore;

    #[async_trait]
    impl StoreAdapter for FailingStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk on fire")
        }

        async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk on fire")
        }

        async fn delete(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk on fire")
        }
    }

    fn service() -> (KvService, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        (KvService::new(store.clone()), store)
    }

    fn range_req(key: &[u8], range_end: &[u8]) -> Request<proto::RangeRequest> {
        Request::new(proto::RangeRequest {
            key: key.to_vec(),
            range_end: range_end.to_vec(),
        })
    }

    #[tokio::test]
    async fn test_put_range_delete_lifecycle() {
        let (svc, _store) = service();

        let put = svc
            .put(Request::new(proto::PutRequest {
                key: b"foo".to_vec(),
                value: b"bar".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(put.header.is_some());

        let range = svc.range(range_req(b"foo", b"")).await.unwrap().into_inner();
        assert_eq!(range.count, 1);
        assert_eq!(range.kvs.len(), 1);
        assert_eq!(range.kvs[0].key, b"foo");
        assert_eq!(range.kvs[0].value, b"bar");
        assert_eq!(range.kvs[0].version, 1);
        assert_eq!(range.kvs[0].create_revision, 1);
        assert_eq!(range.kvs[0].mod_revision, 1);

        let deleted = svc
            .delete_range(Request::new(proto::DeleteRangeRequest {
                key: b"foo".to_vec(),
                range_end: vec![],
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(deleted.deleted, 1);

        let range = svc.range(range_req(b"foo", b"")).await.unwrap().into_inner();
        assert_eq!(range.count, 0);
        assert!(range.kvs.is_empty());
        assert!(range.header.is_some(), "envelope must be present even when empty");
    }

    #[tokio::test]
    async fn test_range_missing_key_is_empty_not_error() {
        let (svc, _store) = service();

        let range = svc
            .range(range_req(b"missing", b""))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(range.count, 0);
        assert!(range.kvs.is_empty());
        assert!(range.header.is_some());
    }

    #[tokio::test]
    async fn test_empty_key_rejected_before_store_access() {
        let (svc, store) = service();

        let err = svc.range(range_req(b"", b"")).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = svc
            .put(Request::new(proto::PutRequest {
                key: vec![],
                value: b"v".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = svc
            .delete_range(Request::new(proto::DeleteRangeRequest {
                key: vec![],
                range_end: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_a_delete() {
        let (svc, _store) = service();

        svc.put(Request::new(proto::PutRequest {
            key: b"k".to_vec(),
            value: vec![],
        }))
        .await
        .unwrap();

        let range = svc.range(range_req(b"k", b"")).await.unwrap().into_inner();
        assert_eq!(range.count, 1);
        assert!(range.kvs[0].value.is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_range_end_is_unimplemented_and_leaves_store_untouched() {
        let (svc, store) = service();
        store
            .data
            .write()
            .insert("a".to_string(), "1".to_string());

        let err = svc
            .delete_range(Request::new(proto::DeleteRangeRequest {
                key: b"a".to_vec(),
                range_end: b"b".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        assert_eq!(store.calls(), 0);
        assert_eq!(store.data.read().get("a"), Some(&"1".to_string()));
    }

    #[tokio::test]
    async fn test_txn_and_compact_never_reach_the_store() {
        let (svc, store) = service();

        let err = svc
            .txn(Request::new(proto::TxnRequest {}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);

        let err = svc
            .compact(Request::new(proto::CompactionRequest { revision: 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_prefix_scan_is_recognized_and_returns_empty() {
        let (svc, store) = service();
        store
            .data
            .write()
            .insert("app/one".to_string(), "1".to_string());

        // range_end carries the trailing zero sentinel.
        let range = svc
            .range(range_req(b"app/", b"app0\x00"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(range.count, 0);
        assert!(range.kvs.is_empty());
        assert!(range.header.is_some());
        // The scan branch performs no store access.
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_bounded_range_scan_returns_empty() {
        let (svc, _store) = service();

        let range = svc
            .range(range_req(b"a", b"z"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(range.count, 0);
        assert!(range.header.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_internal() {
        let svc = KvService::new(Arc::new(FailingStore));

        let err = svc.range(range_req(b"k", b"")).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);

        let err = svc
            .put(Request::new(proto::PutRequest {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        // The cause stays in the logs; callers get a generic message.
        assert!(!err.message().contains("disk on fire"));

        let err = svc
            .delete_range(Request::new(proto::DeleteRangeRequest {
                key: b"k".to_vec(),
                range_end: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }
}
