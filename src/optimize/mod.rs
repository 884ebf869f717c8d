//! Unconstrained minimization of scalar cost functions.
//!
//! BFGS with a finite-difference gradient, so costs only need to be
//! evaluable, not differentiable in closed form. An optional callback
//! observes every accepted iterate, which is how solves get animated.

use log::{debug, trace};
use nalgebra::{SMatrix, SVector};
use thiserror::Error;

/// Curvature below this is treated as singular and skips the Hessian update.
const SINGULAR_THRESHOLD: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("zero-dimensional problem")]
    Empty,
    #[error("cost function returned a non-finite value at iteration {0}")]
    NonFiniteCost(usize),
}

/// Options for minimization.
#[derive(Debug, Clone)]
pub struct MinimizeOptions {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Tolerance for convergence (function value change).
    pub f_tol: f64,
    /// Tolerance for convergence (argument change).
    pub x_tol: f64,
    /// Tolerance for the gradient norm.
    pub g_tol: f64,
    /// Step size for the finite-difference gradient.
    pub eps: f64,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            f_tol: 1e-12,
            x_tol: 1e-12,
            g_tol: 1e-6,
            eps: 1e-8,
        }
    }
}

/// Result from a minimization.
#[derive(Debug, Clone)]
pub struct MinimizeResult<const N: usize> {
    /// The minimum point found.
    pub x: SVector<f64, N>,
    /// Function value at the minimum.
    pub fun: f64,
    /// Number of iterations used.
    pub iterations: usize,
    /// Number of function evaluations.
    pub nfev: usize,
    /// Whether the method converged.
    pub converged: bool,
}

/// BFGS quasi-Newton minimization.
///
/// Maintains an inverse Hessian approximation and uses central finite
/// differences for the gradient. Superlinear convergence near smooth
/// minima; on a non-smooth cost it walks down until the line search stalls
/// and then reports the last iterate as converged.
pub fn bfgs<const N: usize, F>(
    f: F,
    x0: &SVector<f64, N>,
    options: &MinimizeOptions,
) -> Result<MinimizeResult<N>, OptimizeError>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    bfgs_with_callback(f, x0, options, |_: &SVector<f64, N>| {})
}

/// BFGS with a callback invoked on every accepted iterate.
///
/// The callback sees each point the line search accepts, in order, and its
/// final invocation is the returned `x`. A start point that already meets
/// the gradient tolerance returns without the callback firing at all.
pub fn bfgs_with_callback<const N: usize, F, C>(
    f: F,
    x0: &SVector<f64, N>,
    options: &MinimizeOptions,
    mut callback: C,
) -> Result<MinimizeResult<N>, OptimizeError>
where
    F: Fn(&SVector<f64, N>) -> f64,
    C: FnMut(&SVector<f64, N>),
{
    if N == 0 {
        return Err(OptimizeError::Empty);
    }

    let mut x = *x0;
    let mut fx = f(&x);
    let mut nfev = 1;
    if !fx.is_finite() {
        return Err(OptimizeError::NonFiniteCost(0));
    }

    let mut grad = central_gradient(&f, &x, options.eps);
    nfev += 2 * N;

    let mut h_inv = SMatrix::<f64, N, N>::identity();

    for iter in 0..options.max_iter {
        if grad.norm() < options.g_tol {
            debug!("bfgs: gradient norm below tolerance after {} iterations", iter);
            return Ok(MinimizeResult {
                x,
                fun: fx,
                iterations: iter + 1,
                nfev,
                converged: true,
            });
        }

        // Search direction: p = -H_inv * grad
        let p = -(h_inv * grad);

        let (alpha, x_new, fx_new, evals) = backtracking_line_search(&f, &x, &p, fx, &grad);
        nfev += evals;
        if !fx_new.is_finite() {
            return Err(OptimizeError::NonFiniteCost(iter + 1));
        }

        callback(&x_new);
        trace!("bfgs: iter {iter} f = {fx_new:.6e} step = {alpha:.3e}");

        let dx = (x_new - x).norm();
        if dx < options.x_tol || (fx - fx_new).abs() < options.f_tol {
            debug!("bfgs: step below tolerance after {} iterations", iter + 1);
            return Ok(MinimizeResult {
                x: x_new,
                fun: fx_new,
                iterations: iter + 1,
                nfev,
                converged: true,
            });
        }

        let grad_new = central_gradient(&f, &x_new, options.eps);
        nfev += 2 * N;

        let s = x_new - x;
        let y = grad_new - grad;

        // Sherman-Morrison form of the inverse BFGS update. Only positive
        // curvature is accepted, which keeps H_inv positive definite.
        let ys = y.dot(&s);
        if ys > SINGULAR_THRESHOLD {
            let rho = 1.0 / ys;
            let h_y = h_inv * y;
            let yhy = y.dot(&h_y);
            let ss = s * s.transpose();
            let sy = s * h_y.transpose() + h_y * s.transpose();
            h_inv += ss * (rho * (1.0 + rho * yhy)) - sy * rho;
        }

        x = x_new;
        fx = fx_new;
        grad = grad_new;
    }

    debug!("bfgs: iteration budget exhausted");
    Ok(MinimizeResult {
        x,
        fun: fx,
        iterations: options.max_iter,
        nfev,
        converged: false,
    })
}

/// Central finite-difference gradient.
fn central_gradient<const N: usize, F>(f: &F, x: &SVector<f64, N>, eps: f64) -> SVector<f64, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    let mut grad = SVector::zeros();
    for i in 0..N {
        let mut xp = *x;
        let mut xm = *x;
        xp[i] += eps;
        xm[i] -= eps;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * eps);
    }
    grad
}

/// Backtracking line search with the Armijo condition.
/// Returns (step size, new x, new f, evaluations). A failed search returns
/// the starting point with a zero step, which the caller reads as a stall.
fn backtracking_line_search<const N: usize, F>(
    f: &F,
    x: &SVector<f64, N>,
    p: &SVector<f64, N>,
    fx: f64,
    grad: &SVector<f64, N>,
) -> (f64, SVector<f64, N>, f64, usize)
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    let c = 0.0001; // Armijo constant
    let rho = 0.5; // Step reduction factor

    let grad_dot_p = grad.dot(p);
    let mut alpha = 1.0;
    let mut nfev = 0;

    for _ in 0..50 {
        let x_new = x + p * alpha;
        let fx_new = f(&x_new);
        nfev += 1;

        if fx_new <= fx + c * alpha * grad_dot_p {
            return (alpha, x_new, fx_new, nfev);
        }

        alpha *= rho;
    }

    (0.0, *x, fx, nfev)
}
