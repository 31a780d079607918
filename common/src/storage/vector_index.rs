use std::cmp::Ordering;

use serde::Serialize;

use crate::error::AppError;

/// One search hit: the ordinal of the stored vector and its squared L2
/// distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

/// Append-only, exact nearest-neighbour store for a single document.
///
/// Vectors are kept row-major in one flat buffer. The dimension is fixed by
/// the first non-empty insertion and every later insertion must match it.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    len: usize,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the stored vector at `ordinal`, if any.
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        if ordinal >= self.len {
            return None;
        }
        let start = ordinal.checked_mul(dimension)?;
        self.data.get(start..start.checked_add(dimension)?)
    }

    /// Appends `vectors` in order. The whole batch is validated before
    /// anything is written, so a rejected batch leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), AppError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let expected = self.dimension.unwrap_or(first.len());

        if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len().saturating_mul(expected));
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        self.dimension = Some(expected);
        self.len = self.len.saturating_add(vectors.len());

        Ok(())
    }

    /// Returns up to `k` nearest vectors by ascending squared Euclidean
    /// distance. Ties go to the lower ordinal. An empty index yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AppError> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(AppError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = if dimension == 0 {
            (0..self.len)
                .map(|ordinal| Neighbor {
                    ordinal,
                    distance: 0.0,
                })
                .collect()
        } else {
            self.data
                .chunks_exact(dimension)
                .enumerate()
                .map(|(ordinal, row)| Neighbor {
                    ordinal,
                    distance: squared_l2(row, query),
                })
                .collect()
        };

        neighbors.sort_by(compare_neighbors);
        neighbors.truncate(k);

        Ok(neighbors)
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
