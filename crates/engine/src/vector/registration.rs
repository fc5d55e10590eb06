//! Registration: write-scoped insertion session
//!
//! ## Lifecycle
//!
//! ```text
//! open_registration(txn, field) -> Registration
//!   register(id, raw)*            buffered in the session's graph cache
//!   commit()                      nodes, containers and header written to txn
//! txn.commit()                    published atomically with the rest of txn
//! ```
//!
//! Input that fails validation (bad id, corrupt bytes, wrong length, duplicate
//! id) is rejected before anything is touched and the session stays usable.
//! A failure after insertion has started poisons the session: the call returns
//! `VectorError::Registration` and `commit()` refuses with
//! `RegistrationAborted`, so no partial graph is ever written.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_core::PageWrite;
use tracing::{debug, info, warn};

use crate::config::VectorIndexConfig;
use crate::vector::buffer::GrowableBuffer;
use crate::vector::codec::Codec;
use crate::vector::container::SlotRef;
use crate::vector::error::{VectorError, VectorResult};
use crate::vector::graph::{Candidate, GraphState, MAX_LEVEL};
use crate::vector::keys::FieldKeys;
use crate::vector::types::{FieldRecord, RawVector, VectorId};

/// Turns text into a raw vector in the field's source precision
///
/// Implemented by the embedding pipeline; the index only calls it.
pub trait TextEmbedder {
    /// Embed `text` into raw vector bytes
    fn embed(&self, text: &str) -> VectorResult<Vec<u8>>;
}

/// SplitMix64 finalizer
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Session seed derived from the configured seed and the field's size
///
/// Consecutive sessions on the same field draw different levels while a
/// replay of the same history draws the same ones.
pub(crate) fn session_seed(base: u64, node_count: u64) -> u64 {
    splitmix64(base ^ splitmix64(node_count))
}

/// Insertion session over one field, bound to a write transaction
pub struct Registration<'a, W: PageWrite + ?Sized> {
    txn: &'a mut W,
    field: FieldRecord,
    codec: Codec,
    graph: GraphState,
    rng: StdRng,
    /// Level multiplier: 1/ln(number_of_edges)
    ml: f64,
    scratch: GrowableBuffer<Candidate>,
    registered: usize,
    /// First failure after insertion began: (id, message)
    poisoned: Option<(u64, String)>,
    finished: bool,
}

impl<'a, W: PageWrite + ?Sized> Registration<'a, W> {
    pub(crate) fn open(
        txn: &'a mut W,
        field: FieldRecord,
        config: &VectorIndexConfig,
    ) -> VectorResult<Self> {
        let codec = Codec::for_options(&field.options);
        let graph = GraphState::open(&*txn, FieldKeys::new(&field.name), codec)?;
        let seed = session_seed(config.seed, graph.header().node_count);
        let ml = 1.0 / (field.options.number_of_edges as f64).ln();
        debug!(
            target: "strata::vector",
            field = %field.name,
            nodes = graph.header().node_count,
            seed,
            "Registration opened"
        );
        Ok(Registration {
            txn,
            field,
            codec,
            graph,
            rng: StdRng::seed_from_u64(seed),
            ml,
            scratch: GrowableBuffer::new(config.buffer_growth()),
            registered: 0,
            poisoned: None,
            finished: false,
        })
    }

    /// Replace the level-assignment seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Field being written
    pub fn field(&self) -> &FieldRecord {
        &self.field
    }

    /// Vectors registered in this session
    pub fn len(&self) -> usize {
        self.registered
    }

    /// True if nothing has been registered yet
    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Register raw vector bytes (in the field's source precision) under `id`
    ///
    /// # Errors
    ///
    /// - Configuration: `InvalidId`, `DimensionMismatch`, `DuplicateNode`
    /// - Encoding: `CorruptInput`, `InvalidEncoding`
    /// - `Registration` wrapping the cause if insertion fails midway
    /// - `RegistrationAborted` if an earlier insertion failed
    pub fn register(&mut self, id: u64, raw: &[u8]) -> VectorResult<()> {
        if let Some((failed, reason)) = &self.poisoned {
            return Err(VectorError::RegistrationAborted {
                id: *failed,
                reason: reason.clone(),
            });
        }

        let vector_id = VectorId::new(id)?;
        let encoded = self.codec.encode(raw)?;
        self.check_lengths(raw.len(), encoded.len())?;
        if self.graph.contains(&*self.txn, vector_id)? {
            return Err(VectorError::DuplicateNode { id });
        }
        let level = self.draw_level();

        match self.insert(vector_id, raw.len(), &encoded, level) {
            Ok(()) => {
                self.registered += 1;
                Ok(())
            }
            Err(e) => {
                warn!(
                    target: "strata::vector",
                    field = %self.field.name,
                    id,
                    error = %e,
                    "Registration poisoned"
                );
                self.poisoned = Some((id, e.to_string()));
                Err(VectorError::Registration {
                    id,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Register an f32 vector
    pub fn register_f32(&mut self, id: u64, values: &[f32]) -> VectorResult<()> {
        self.register(id, RawVector::from_f32(values).as_bytes())
    }

    /// Register a base64-encoded raw vector
    pub fn register_base64(&mut self, id: u64, text: &str) -> VectorResult<()> {
        let raw = RawVector::from_base64(text)?;
        self.register(id, raw.as_bytes())
    }

    /// Embed `text` and register the result
    pub fn register_text(
        &mut self,
        id: u64,
        text: &str,
        embedder: &dyn TextEmbedder,
    ) -> VectorResult<()> {
        let raw = embedder.embed(text)?;
        self.register(id, &raw)
    }

    /// Write all buffered mutations into the transaction
    ///
    /// Returns the number of vectors registered. The caller still commits the
    /// transaction itself.
    pub fn commit(mut self) -> VectorResult<usize> {
        self.finished = true;
        if let Some((id, reason)) = self.poisoned.take() {
            return Err(VectorError::RegistrationAborted { id, reason });
        }
        let nodes = self.graph.flush(&mut *self.txn)?;
        info!(
            target: "strata::vector",
            field = %self.field.name,
            registered = self.registered,
            nodes_written = nodes,
            total = self.graph.header().node_count,
            "Registration committed"
        );
        Ok(self.registered)
    }

    /// Discard everything registered in this session
    pub fn rollback(mut self) {
        self.finished = true;
        debug!(
            target: "strata::vector",
            field = %self.field.name,
            discarded = self.registered,
            "Registration rolled back"
        );
    }

    fn check_lengths(&self, raw_len: usize, encoded_len: usize) -> VectorResult<()> {
        let fixed = self.field.options.vector_byte_size;
        if fixed > 0 && raw_len != fixed {
            return Err(VectorError::DimensionMismatch {
                expected: fixed,
                got: raw_len,
            });
        }
        let header = self.graph.header();
        if header.raw_len > 0 && raw_len != header.raw_len {
            return Err(VectorError::DimensionMismatch {
                expected: header.raw_len,
                got: raw_len,
            });
        }
        if header.vector_len > 0 && encoded_len != header.vector_len {
            return Err(VectorError::DimensionMismatch {
                expected: header.vector_len,
                got: encoded_len,
            });
        }
        Ok(())
    }

    /// Exponentially distributed level: floor(-ln(U) * ml), capped
    fn draw_level(&mut self) -> usize {
        let uniform: f64 = self.rng.gen();
        // 1 - U is in (0, 1], so the log is finite
        let level = (-(1.0 - uniform).ln() * self.ml).floor();
        (level as usize).min(MAX_LEVEL)
    }

    fn insert(
        &mut self,
        id: VectorId,
        raw_len: usize,
        encoded: &[u8],
        level: usize,
    ) -> VectorResult<()> {
        self.graph.init_lengths(raw_len, encoded.len())?;
        let open = self.graph.header().open_container;
        let containers = self.graph.containers_mut()?;
        let container = containers.allocate(&mut *self.txn, open)?;
        let slot = containers.put(&*self.txn, container, id, encoded)?;
        self.graph.set_open_container(container);

        let options = &self.field.options;
        self.graph.insert(
            &*self.txn,
            id,
            SlotRef { container, slot },
            level,
            options.number_of_edges,
            options.number_of_candidates,
            &mut self.scratch,
        )
    }
}

impl<W: PageWrite + ?Sized> Drop for Registration<'_, W> {
    fn drop(&mut self) {
        if !self.finished && self.registered > 0 {
            warn!(
                target: "strata::vector",
                field = %self.field.name,
                discarded = self.registered,
                "Registration dropped without commit"
            );
        }
    }
}
