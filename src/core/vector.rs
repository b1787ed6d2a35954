//! Embedding codec and cosine similarity
//!
//! Embeddings are stored as little-endian `f32` blobs. Similarity ranking runs
//! inside SQLite through the `cosine_distance(a, b)` scalar function that
//! [`register_functions`] installs on every connection.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use thiserror::Error;

/// Name of the SQL distance function
pub const COSINE_DISTANCE: &str = "cosine_distance";

/// Serialize an embedding to bytes (little-endian f32)
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Deserialize an embedding. Trailing bytes that don't form a full f32 are ignored.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`.
///
/// `None` when the dimensions differ. A zero vector has similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Debug, Error)]
#[error("embedding dimensions differ: {0} vs {1}")]
struct DimensionMismatch(usize, usize);

/// Install `cosine_distance(blob, blob) -> real` on a connection
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        COSINE_DISTANCE,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = decode(&ctx.get::<Vec<u8>>(0)?);
            let b = decode(&ctx.get::<Vec<u8>>(1)?);
            let similarity = cosine_similarity(&a, &b).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(Box::new(DimensionMismatch(a.len(), b.len())))
            })?;
            Ok(1.0 - similarity)
        },
    )
}
