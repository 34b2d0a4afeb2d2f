//! Exact (brute-force) vector index and its binary file format.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "RAGDBFLT" | version u32 | metric u8 | pad [u8; 3] | dim u32 | count u64
//! | count * dim f32 | blake3(all preceding bytes) [u8; 32]
//! ```

use std::path::Path;

use ragdb_core::error::{Error, Result};
use ragdb_core::{Metric, ScoreOrder};

use crate::metric;

const MAGIC: &[u8; 8] = b"RAGDBFLT";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 1 + 3 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

/// Row-major store of fixed-dimension vectors. Row position is the vector id.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: Metric) -> Self { Self { dim, metric, data: Vec::new() } }

    pub fn dim(&self) -> usize { self.dim }
    pub fn metric(&self) -> Metric { self.metric }
    pub fn len(&self) -> usize { if self.dim == 0 { 0 } else { self.data.len() / self.dim } }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Append one vector; its id is the previous `len()`.
    pub fn push(&mut self, v: &[f32]) -> Result<usize> {
        if v.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() }); }
        self.data.extend_from_slice(v);
        Ok(self.len() - 1)
    }

    /// Best `k` rows by the metric's native order; ties resolve to the lower id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() }); }
        if k == 0 || self.is_empty() { return Ok(Vec::new()); }
        let order: ScoreOrder = self.metric.score_order();
        let mut scored: Vec<(usize, f32)> = self.data.chunks_exact(self.dim).enumerate().map(|(id, row)| (id, metric::score(self.metric, query, row))).collect();
        scored.sort_by(|a, b| order.compare(a.1, b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 + CHECKSUM_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.push(match self.metric { Metric::L2 => 0, Metric::InnerProduct => 1 });
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&(self.dim as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for x in &self.data { out.extend_from_slice(&x.to_le_bytes()); }
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        out
    }

    /// Decode bytes produced by [`FlatIndex::to_bytes`]; `path` only labels errors.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN { return Err(Error::corrupt(path, "file too short")); }
        let (body, footer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if blake3::hash(body).as_bytes() != footer { return Err(Error::corrupt(path, "checksum mismatch")); }
        if &body[..8] != MAGIC { return Err(Error::corrupt(path, "bad magic")); }
        let version = u32::from_le_bytes(le_array(&body[8..12]));
        if version != VERSION { return Err(Error::corrupt(path, format!("unsupported version {version}"))); }
        let metric = match body[12] {
            0 => Metric::L2,
            1 => Metric::InnerProduct,
            other => return Err(Error::corrupt(path, format!("unknown metric tag {other}"))),
        };
        let dim = u32::from_le_bytes(le_array(&body[16..20])) as usize;
        let count = u64::from_le_bytes(le_array(&body[20..28])) as usize;
        let payload = &body[HEADER_LEN..];
        if dim == 0 || payload.len() != count.saturating_mul(dim).saturating_mul(4) {
            return Err(Error::corrupt(path, format!("payload of {} bytes does not hold {count} x {dim} floats", payload.len())));
        }
        let data = payload.chunks_exact(4).map(|b| f32::from_le_bytes(le_array(b))).collect();
        Ok(Self { dim, metric, data })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(&bytes, path)
    }
}

fn le_array<const N: usize>(b: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&b[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn index(metric: Metric) -> FlatIndex {
        let mut idx = FlatIndex::new(2, metric);
        idx.push(&[1.0, 0.0]).unwrap();
        idx.push(&[0.0, 1.0]).unwrap();
        idx.push(&[0.6, 0.8]).unwrap();
        idx
    }

    #[test]
    fn l2_search_is_ascending() {
        let hits = index(Metric::L2).search(&[0.0, 1.0], 3).unwrap();
        assert_eq!(hits[0].0, 1);
        assert!(hits[0].1.abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn inner_product_search_is_descending() {
        let hits = index(Metric::InnerProduct).search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 2]);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let mut idx = index(Metric::L2);
        assert!(matches!(idx.push(&[1.0]), Err(Error::DimensionMismatch { expected: 2, actual: 1 })));
        assert!(idx.search(&[1.0, 2.0, 3.0], 1).is_err());
    }

    #[test]
    fn bytes_round_trip_and_detect_corruption() {
        let idx = index(Metric::InnerProduct);
        let path = PathBuf::from("mem.index");
        let mut bytes = idx.to_bytes();
        assert_eq!(FlatIndex::from_bytes(&bytes, &path).unwrap(), idx);

        bytes[HEADER_LEN] ^= 0xff;
        assert!(matches!(FlatIndex::from_bytes(&bytes, &path), Err(Error::Corrupt { .. })));
        assert!(FlatIndex::from_bytes(&bytes[..10], &path).is_err());
    }

    #[test]
    fn empty_index_round_trips() {
        let idx = FlatIndex::new(4, Metric::L2);
        let back = FlatIndex::from_bytes(&idx.to_bytes(), Path::new("e")).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.dim(), 4);
        assert!(back.search(&[0.0; 4], 5).unwrap().is_empty());
    }
}
