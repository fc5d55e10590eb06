//! Key layout of vector records in the store's key space
//!
//! ```text
//! vec/field/{name}                 -> FieldRecord
//! vec/graph/{name}                 -> GraphHeader
//! vec/node/{name}/{id:be64}        -> NodeRecord
//! vec/container/{name}/{page:be64} -> ContainerRecord
//! ```
//!
//! Field names never contain '/', so every per-field prefix is unambiguous.
//! Big-endian ids keep prefix scans in numeric order.

use strata_core::PageId;

use crate::vector::types::VectorId;

const FIELD_PREFIX: &[u8] = b"vec/field/";

/// Prefix of every field record
pub(crate) fn field_prefix() -> &'static [u8] {
    FIELD_PREFIX
}

/// Field name from a field record key
pub(crate) fn field_name_from_key(key: &[u8]) -> Option<&str> {
    key.strip_prefix(FIELD_PREFIX)
        .and_then(|name| std::str::from_utf8(name).ok())
}

/// Keys of one field's records
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldKeys {
    field: Vec<u8>,
    graph: Vec<u8>,
    node_prefix: Vec<u8>,
    container_prefix: Vec<u8>,
}

impl FieldKeys {
    pub(crate) fn new(name: &str) -> Self {
        let mut field = FIELD_PREFIX.to_vec();
        field.extend_from_slice(name.as_bytes());
        FieldKeys {
            field,
            graph: format!("vec/graph/{}", name).into_bytes(),
            node_prefix: format!("vec/node/{}/", name).into_bytes(),
            container_prefix: format!("vec/container/{}/", name).into_bytes(),
        }
    }

    pub(crate) fn field(&self) -> &[u8] {
        &self.field
    }

    pub(crate) fn graph(&self) -> &[u8] {
        &self.graph
    }

    pub(crate) fn node(&self, id: VectorId) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.node_prefix.len() + 8);
        key.extend_from_slice(&self.node_prefix);
        key.extend_from_slice(&id.as_u64().to_be_bytes());
        key
    }

    pub(crate) fn container_prefix(&self) -> &[u8] {
        &self.container_prefix
    }

    pub(crate) fn container(&self, page: PageId) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.container_prefix.len() + 8);
        key.extend_from_slice(&self.container_prefix);
        key.extend_from_slice(&page.as_u64().to_be_bytes());
        key
    }
}
