//! VectorIndex: field catalog and entry points
//!
//! `VectorIndex` is stateless apart from its configuration. Every call takes
//! the transaction to work in, so the same index value serves any number of
//! concurrent readers and the single writer.

use strata_core::{PageRead, PageWrite};
use tracing::info;

use crate::config::VectorIndexConfig;
use crate::vector::codec::Codec;
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::graph::{GraphIndex, GraphState};
use crate::vector::keys::{field_name_from_key, field_prefix, FieldKeys};
use crate::vector::registration::Registration;
use crate::vector::search::{ApproximateSearch, ExactSearch};
use crate::vector::types::{validate_field_name, FieldRecord, VectorOptions};

/// Entry point to the vector index
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    config: VectorIndexConfig,
}

impl VectorIndex {
    /// Create an index handle with the given configuration
    pub fn new(config: VectorIndexConfig) -> Self {
        VectorIndex { config }
    }

    /// Active configuration
    pub fn config(&self) -> &VectorIndexConfig {
        &self.config
    }

    /// Define a new vector field
    ///
    /// # Errors
    ///
    /// - `InvalidOptions` / `InvalidEncoding` if the name or options are invalid
    /// - `FieldAlreadyExists` if the name is taken
    pub fn create_field<W: PageWrite + ?Sized>(
        &self,
        txn: &mut W,
        name: &str,
        options: VectorOptions,
    ) -> VectorResult<FieldRecord> {
        validate_field_name(name)?;
        options.validate()?;

        let keys = FieldKeys::new(name);
        if txn.get(keys.field())?.is_some() {
            return Err(VectorError::FieldAlreadyExists {
                name: name.to_string(),
            });
        }

        let record = FieldRecord {
            name: name.to_string(),
            options,
            created_version: txn.version(),
        };
        txn.put(keys.field().to_vec(), record.to_bytes()?)?;
        info!(
            target: "strata::vector",
            field = name,
            edges = record.options.number_of_edges,
            candidates = record.options.number_of_candidates,
            destination = ?record.options.destination,
            "Vector field created"
        );
        Ok(record)
    }

    /// Definition of an existing field
    pub fn field_info<R: PageRead + ?Sized>(
        &self,
        txn: &R,
        name: &str,
    ) -> VectorResult<FieldRecord> {
        match txn.get(FieldKeys::new(name).field())? {
            Some(raw) => FieldRecord::from_bytes(&raw),
            None => Err(VectorError::FieldNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Names of all fields, in byte order
    pub fn list_fields<R: PageRead + ?Sized>(&self, txn: &R) -> VectorResult<Vec<String>> {
        Ok(txn
            .scan_prefix(field_prefix())?
            .iter()
            .filter_map(|(key, _)| field_name_from_key(key).map(str::to_string))
            .collect())
    }

    /// Open an insertion session on `name`
    pub fn open_registration<'a, W: PageWrite + ?Sized>(
        &self,
        txn: &'a mut W,
        name: &str,
    ) -> VectorResult<Registration<'a, W>> {
        let field = self.field_info(&*txn, name)?;
        Registration::open(txn, field, &self.config)
    }

    /// Read-only view of a field's graph
    pub fn graph<'t, R: PageRead + ?Sized>(
        &self,
        txn: &'t R,
        name: &str,
    ) -> VectorResult<GraphIndex<'t, R>> {
        let field = self.field_info(txn, name)?;
        let codec = Codec::for_options(&field.options);
        let state = GraphState::open(txn, FieldKeys::new(name), codec)?;
        Ok(GraphIndex::new(txn, state))
    }

    /// Exhaustive search for the `k` closest vectors scoring at least
    /// `min_similarity`
    pub fn exact_nearest<R: PageRead + ?Sized>(
        &self,
        txn: &R,
        name: &str,
        k: usize,
        query: &[u8],
        min_similarity: f32,
    ) -> VectorResult<ExactSearch> {
        let field = self.field_info(txn, name)?;
        ExactSearch::new(txn, &field, k, query, min_similarity, self.config.buffer_growth())
    }

    /// Graph search with beam width `candidate_breadth`
    pub fn approximate_nearest<R: PageRead + ?Sized>(
        &self,
        txn: &R,
        name: &str,
        candidate_breadth: usize,
        query: &[u8],
        min_similarity: f32,
    ) -> VectorResult<ApproximateSearch> {
        let field = self.field_info(txn, name)?;
        ApproximateSearch::new(
            txn,
            &field,
            candidate_breadth,
            query,
            min_similarity,
            self.config.buffer_growth(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::types::EmbeddingType;
    use strata_storage::PageStore;

    #[test]
    fn test_create_and_describe_field() {
        let store = PageStore::new();
        let index = VectorIndex::default();
        let mut txn = store.begin_write();
        let created = index
            .create_field(&mut txn, "body", VectorOptions::with_defaults(index.config()))
            .unwrap();
        txn.commit().unwrap();

        let read = store.begin_read();
        let info = index.field_info(&read, "body").unwrap();
        assert_eq!(info, created);
        assert_eq!(info.options.number_of_edges, 16);
        assert_eq!(info.created_version, 0);
    }

    #[test]
    fn test_recreate_is_rejected() {
        let store = PageStore::new();
        let index = VectorIndex::default();
        let mut txn = store.begin_write();
        index.create_field(&mut txn, "body", VectorOptions::new(3, 16)).unwrap();
        let err = index
            .create_field(&mut txn, "body", VectorOptions::new(8, 16))
            .unwrap_err();
        assert!(matches!(err, VectorError::FieldAlreadyExists { .. }));
    }

    #[test]
    fn test_invalid_definitions() {
        let store = PageStore::new();
        let index = VectorIndex::default();
        let mut txn = store.begin_write();
        assert!(index.create_field(&mut txn, "a/b", VectorOptions::new(3, 16)).is_err());
        assert!(index.create_field(&mut txn, "x", VectorOptions::new(0, 16)).is_err());
        let err = index
            .create_field(
                &mut txn,
                "x",
                VectorOptions::new(3, 16)
                    .source(EmbeddingType::Binary)
                    .destination(EmbeddingType::Int8),
            )
            .unwrap_err();
        assert!(matches!(err, VectorError::InvalidEncoding { .. }));
        assert!(txn.is_clean());
    }

    #[test]
    fn test_list_fields_and_missing() {
        let store = PageStore::new();
        let index = VectorIndex::default();
        let mut txn = store.begin_write();
        for name in ["title", "body", "abstract"] {
            index.create_field(&mut txn, name, VectorOptions::new(3, 16)).unwrap();
        }
        assert_eq!(index.list_fields(&txn).unwrap(), vec!["abstract", "body", "title"]);
        let err = index.field_info(&txn, "summary").unwrap_err();
        assert!(err.is_not_found());
        assert!(index.open_registration(&mut txn, "summary").is_err());
    }
}
