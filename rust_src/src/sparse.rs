//! Minimal sparse matrices for one-hot IRT design matrices.
//!
//! Rows are built as coordinate triples and compressed to CSR. The logistic
//! solver walks columns through [`CsrMatrix::transpose`].

use ndarray::{Array1, ArrayView1};

use crate::error::{Result, SkillModelError};

/// Coordinate-list builder. Duplicate entries are summed on compression.
#[derive(Debug, Clone, Default)]
pub struct CooMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    data: Vec<f64>,
}

impl CooMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        CooMatrix {
            nrows,
            ncols,
            ..Default::default()
        }
    }

    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Self {
        CooMatrix {
            nrows,
            ncols,
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            data: Vec::with_capacity(nnz),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.nrows || col >= self.ncols {
            return Err(SkillModelError::DimensionMismatch {
                expected: format!("index within {}x{}", self.nrows, self.ncols),
                actual: format!("({row}, {col})"),
            });
        }
        self.rows.push(row);
        self.cols.push(col);
        self.data.push(value);
        Ok(())
    }

    pub fn to_csr(&self) -> CsrMatrix {
        let mut indptr = vec![0usize; self.nrows + 1];
        for &r in &self.rows {
            indptr[r + 1] += 1;
        }
        for r in 0..self.nrows {
            indptr[r + 1] += indptr[r];
        }

        let nnz = self.data.len();
        let mut indices = vec![0usize; nnz];
        let mut data = vec![0.0; nnz];
        let mut next = indptr.clone();
        for k in 0..nnz {
            let r = self.rows[k];
            let dest = next[r];
            indices[dest] = self.cols[k];
            data[dest] = self.data[k];
            next[r] += 1;
        }

        let mut csr = CsrMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        };
        csr.sort_and_sum_duplicates();
        csr
    }
}

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// `(column, value)` pairs of row `i`, by ascending column.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[i]..self.indptr[i + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.data[span].iter().copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// `X · w` for a dense `w` of length `ncols`.
    pub fn dot(&self, w: ArrayView1<f64>) -> Array1<f64> {
        (0..self.nrows)
            .map(|i| self.row(i).map(|(j, v)| v * w[j]).sum::<f64>())
            .collect()
    }

    /// Rows `rows` of this matrix, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> CsrMatrix {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for &i in rows {
            let span = self.indptr[i]..self.indptr[i + 1];
            indices.extend_from_slice(&self.indices[span.clone()]);
            data.extend_from_slice(&self.data[span]);
            indptr.push(indices.len());
        }
        CsrMatrix {
            nrows: rows.len(),
            ncols: self.ncols,
            indptr,
            indices,
            data,
        }
    }

    /// The transpose, also in CSR form (i.e. this matrix in CSC form).
    pub fn transpose(&self) -> CsrMatrix {
        let mut coo = CooMatrix::with_capacity(self.ncols, self.nrows, self.nnz());
        for i in 0..self.nrows {
            for (j, v) in self.row(i) {
                coo.rows.push(j);
                coo.cols.push(i);
                coo.data.push(v);
            }
        }
        coo.to_csr()
    }

    fn sort_and_sum_duplicates(&mut self) {
        let mut indptr = Vec::with_capacity(self.nrows + 1);
        let mut indices = Vec::with_capacity(self.indices.len());
        let mut data = Vec::with_capacity(self.data.len());
        indptr.push(0);

        for i in 0..self.nrows {
            let span = self.indptr[i]..self.indptr[i + 1];
            let mut entries: Vec<(usize, f64)> = self.indices[span.clone()]
                .iter()
                .copied()
                .zip(self.data[span].iter().copied())
                .collect();
            entries.sort_by_key(|&(j, _)| j);

            for (j, v) in entries {
                let row_start = indptr[i];
                if indices.len() > row_start && indices.last() == Some(&j) {
                    if let Some(last) = data.last_mut() {
                        *last += v;
                    }
                } else {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }

        self.indptr = indptr;
        self.indices = indices;
        self.data = data;
    }
}
