use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// Computes the elements of the matrix whose inverse is maintained by a
/// [`DetManager`]: rows are indexed by `X` keys, columns by `Y` keys.
pub trait MatrixBuilder {
    type X: Copy + Debug;
    type Y: Copy + Debug;

    fn element(&self, x: &Self::X, y: &Self::Y) -> f64;
}

/// Pending insertion of one row (`x` at position `i`) and one column (`y` at
/// position `j`).
#[derive(Clone, Debug)]
struct InsertTrial<X, Y> {
    i: usize,
    j: usize,
    x: X,
    y: Y,
    /// `A^{-1} B`, where `B` is the new column. Indexed by column slot.
    minv_b: Array1<f64>,
    /// `C A^{-1}`, where `C` is the new row. Indexed by row slot.
    c_minv: Array1<f64>,
    /// Schur complement `D - C A^{-1} B`.
    schur: f64,
    ratio: f64,
}

/// Pending removal of row `i` and column `j`.
#[derive(Clone, Debug)]
struct RemoveTrial {
    i: usize,
    j: usize,
    ratio: f64,
}

#[derive(Clone, Debug)]
enum PendingOperation<X, Y> {
    Idle,
    Insert(InsertTrial<X, Y>),
    Remove(RemoveTrial),
}

/// Fast-update structure for the determinant and inverse of the matrix
/// `A[i, j] = builder.element(x_i, y_j)`.
///
/// Rows and columns are kept in the order given by the insertion positions the
/// caller chooses. Every change goes through a trial (`try_insert`,
/// `try_remove`) which returns the ratio `det(A_new) / det(A)` without touching
/// the committed state, followed by either `complete_operation` or
/// `reject_last_try`. At most one trial can be pending.
///
/// The stored inverse is `M = A^{-1}`, so `M[j, i]` has the column (`y`) index
/// first and the row (`x`) index second.
///
/// # Examples
/// ```
/// use ctseg::det::det_manager::{DetManager, MatrixBuilder};
///
/// struct Kernel;
/// impl MatrixBuilder for Kernel {
///     type X = f64;
///     type Y = f64;
///     fn element(&self, x: &f64, y: &f64) -> f64 {
///         (-(x - y).abs()).exp()
///     }
/// }
///
/// let mut det = DetManager::new(Kernel);
/// let ratio = det.try_insert(0, 0, 0.3, 0.5);
/// assert!((ratio - (-0.2f64).exp()).abs() < 1e-14);
/// det.complete_operation();
/// assert_eq!(det.size(), 1);
/// assert!((det.inverse_matrix(0, 0) * ratio - 1.0).abs() < 1e-14);
/// ```
#[derive(Clone, Debug)]
pub struct DetManager<B: MatrixBuilder> {
    builder: B,
    x: Vec<B::X>,
    y: Vec<B::Y>,
    minv: Array2<f64>,
    det: f64,
    pending: PendingOperation<B::X, B::Y>,
}

fn permutation_sign(i: usize, j: usize) -> f64 {
    if (i + j) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

impl<B: MatrixBuilder> DetManager<B> {
    /// Creates an empty structure (0x0 matrix, determinant 1).
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            x: Vec::new(),
            y: Vec::new(),
            minv: Array2::zeros((0, 0)),
            det: 1.0,
            pending: PendingOperation::Idle,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Number of committed rows (and columns).
    pub fn size(&self) -> usize {
        self.x.len()
    }

    /// The i-th committed row key.
    pub fn get_x(&self, i: usize) -> B::X {
        self.x[i]
    }

    /// The j-th committed column key.
    pub fn get_y(&self, j: usize) -> B::Y {
        self.y[j]
    }

    /// Committed element `A^{-1}[j, i]`, with `j` a column index of `A` and
    /// `i` a row index.
    pub fn inverse_matrix(&self, j: usize, i: usize) -> f64 {
        self.minv[[j, i]]
    }

    /// Determinant of the committed matrix, tracked through the accepted ratios.
    pub fn determinant(&self) -> f64 {
        self.det
    }

    /// Sign of the committed determinant.
    pub fn sign(&self) -> f64 {
        if self.det < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// True if no trial is waiting for a decision.
    pub fn is_idle(&self) -> bool {
        matches!(self.pending, PendingOperation::Idle)
    }

    /// Rebuilds the committed matrix `A` from its keys.
    pub fn matrix(&self) -> Array2<f64> {
        let n = self.size();
        Array2::from_shape_fn((n, n), |(i, j)| {
            self.builder.element(&self.x[i], &self.y[j])
        })
    }

    fn assert_idle(&self, operation: &str) {
        assert!(
            self.is_idle(),
            "{} called while another trial is pending: {:?}",
            operation,
            self.pending
        );
    }

    /// Proposes to insert the row key `x` at row `i` and the column key `y` at
    /// column `j`, and returns the determinant ratio.
    ///
    /// The cost is O(N^2). The committed state is not modified.
    ///
    /// # Panics
    /// Panics if a trial is already pending or if an index exceeds the size.
    pub fn try_insert(&mut self, i: usize, j: usize, x: B::X, y: B::Y) -> f64 {
        self.assert_idle("try_insert");
        let n = self.size();
        assert!(
            i <= n && j <= n,
            "Insertion at ({}, {}) out of range for size {}",
            i,
            j,
            n
        );

        let b = Array1::from_shape_fn(n, |k| self.builder.element(&self.x[k], &y));
        let c = Array1::from_shape_fn(n, |l| self.builder.element(&x, &self.y[l]));
        let minv_b = self.minv.dot(&b);
        let c_minv = c.dot(&self.minv);
        let schur = self.builder.element(&x, &y) - c.dot(&minv_b);
        let ratio = schur * permutation_sign(i, j);

        self.pending = PendingOperation::Insert(InsertTrial {
            i,
            j,
            x,
            y,
            minv_b,
            c_minv,
            schur,
            ratio,
        });
        ratio
    }

    /// Proposes to remove row `i` and column `j`, and returns the determinant
    /// ratio. O(1).
    ///
    /// # Panics
    /// Panics if a trial is already pending or if an index is out of range.
    pub fn try_remove(&mut self, i: usize, j: usize) -> f64 {
        self.assert_idle("try_remove");
        let n = self.size();
        assert!(
            i < n && j < n,
            "Removal at ({}, {}) out of range for size {}",
            i,
            j,
            n
        );
        let ratio = permutation_sign(i, j) * self.minv[[j, i]];
        self.pending = PendingOperation::Remove(RemoveTrial { i, j, ratio });
        ratio
    }

    /// Commits the pending trial.
    ///
    /// # Panics
    /// Panics if no trial is pending.
    pub fn complete_operation(&mut self) {
        match std::mem::replace(&mut self.pending, PendingOperation::Idle) {
            PendingOperation::Idle => {
                panic!("complete_operation called without a pending trial")
            }
            PendingOperation::Insert(trial) => self.complete_insert(trial),
            PendingOperation::Remove(trial) => self.complete_remove(trial),
        }
    }

    /// Discards the pending trial, if any. The committed state is untouched.
    pub fn reject_last_try(&mut self) {
        self.pending = PendingOperation::Idle;
    }

    fn complete_insert(&mut self, trial: InsertTrial<B::X, B::Y>) {
        let n = self.size();
        let s_inv = 1.0 / trial.schur;
        // Maps a slot of the enlarged matrix to the old slot, None for the new one
        let old_slot = |slot: usize, new_pos: usize| -> Option<usize> {
            match slot.cmp(&new_pos) {
                std::cmp::Ordering::Less => Some(slot),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(slot - 1),
            }
        };

        let minv = Array2::from_shape_fn((n + 1, n + 1), |(a, b)| {
            match (old_slot(a, trial.j), old_slot(b, trial.i)) {
                (Some(l), Some(k)) => {
                    self.minv[[l, k]] + trial.minv_b[l] * trial.c_minv[k] * s_inv
                }
                (Some(l), None) => -trial.minv_b[l] * s_inv,
                (None, Some(k)) => -trial.c_minv[k] * s_inv,
                (None, None) => s_inv,
            }
        });

        self.minv = minv;
        self.x.insert(trial.i, trial.x);
        self.y.insert(trial.j, trial.y);
        self.det *= trial.ratio;
    }

    fn complete_remove(&mut self, trial: RemoveTrial) {
        let n = self.size();
        let (i, j) = (trial.i, trial.j);
        let pivot = self.minv[[j, i]];
        let skip = |slot: usize, removed: usize| if slot < removed { slot } else { slot + 1 };

        let minv = Array2::from_shape_fn((n - 1, n - 1), |(a, b)| {
            let (l, k) = (skip(a, j), skip(b, i));
            self.minv[[l, k]] - self.minv[[l, i]] * self.minv[[j, k]] / pivot
        });

        self.minv = minv;
        self.x.remove(i);
        self.y.remove(j);
        self.det *= trial.ratio;
    }
}
