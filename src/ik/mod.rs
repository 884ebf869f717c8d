//! Inverse geometry: joint angles whose placement reaches a target.
//!
//! A target is either a point (orientation free) or a full pose. Both turn
//! into scalar costs over the configuration, minimized by BFGS; every
//! accepted iterate is streamed to a viewer so the solve can be watched.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::lie::{Mat3, Vec3, SE3};
use crate::optimize::{bfgs_with_callback, MinimizeOptions, OptimizeError};
use crate::robot::{Config, SerialChain};
use crate::viz::Viewer;

/// Viewer object name for the target marker.
pub const TARGET_MARKER: &str = "world/target";
/// Viewer object name for the end-effector marker.
pub const TIP_MARKER: &str = "world/tip";

/// What the chosen frame should reach.
#[derive(Debug, Clone)]
pub enum Goal {
    /// Bring the frame origin to a point; orientation is free.
    Point(Vec3),
    /// Bring the frame to a full pose.
    Pose(SE3),
}

/// Options for an inverse geometry solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Options handed to the minimizer.
    pub minimize: MinimizeOptions,
    /// Pause after each displayed iterate, for the illusion of animation.
    pub frame_delay: Duration,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            minimize: MinimizeOptions::default(),
            frame_delay: Duration::from_millis(10),
        }
    }
}

/// Outcome of an inverse geometry solve.
#[derive(Debug, Clone)]
pub struct Solution<const N: usize> {
    /// Optimized configuration.
    pub q: Config<N>,
    /// Final cost value.
    pub cost: f64,
    /// Minimizer iterations used.
    pub iterations: usize,
    /// Cost evaluations used.
    pub nfev: usize,
    /// Whether the minimizer reported convergence.
    pub converged: bool,
}

/// Cost of missing a target point: squared Euclidean distance between the
/// frame origin and the target.
pub fn position_cost<'a, const N: usize>(
    chain: &'a SerialChain<N>,
    frame: usize,
    target: &Vec3,
) -> impl Fn(&Config<N>) -> f64 + 'a {
    let target = *target;
    move |q| (chain.placement(q, frame).trans - target).norm_squared()
}

/// Cost of missing a target pose: norm of the 6-vector logarithm of the
/// transform from the frame to the target.
pub fn pose_cost<'a, const N: usize>(
    chain: &'a SerialChain<N>,
    frame: usize,
    target: &SE3,
) -> impl Fn(&Config<N>) -> f64 + 'a {
    let target = *target;
    move |q| (chain.placement(q, frame).inverse() * target).log().norm()
}

/// Solve inverse geometry for `frame` of `chain`, starting from `q0`.
///
/// Runs BFGS over the goal's cost. After every accepted iterate the target
/// marker and end-effector marker are re-posed, the configuration is
/// displayed, and the solve pauses for `frame_delay`. Solving is blocking
/// and single-threaded; with [`NullViewer`](crate::viz::NullViewer) and a
/// zero delay it runs headless at full speed.
///
/// Different initial guesses may land on different local optima; the solver
/// does not retry.
pub fn solve<const N: usize, V: Viewer>(
    chain: &SerialChain<N>,
    frame: usize,
    goal: &Goal,
    q0: &Config<N>,
    options: &SolveOptions,
    viewer: &mut V,
) -> Result<Solution<N>, OptimizeError> {
    let target_pose = match goal {
        Goal::Point(p) => SE3::new(Mat3::identity(), *p),
        Goal::Pose(m) => *m,
    };
    debug!("solving {N}-dof inverse geometry for frame {frame}");

    let result = match goal {
        Goal::Point(p) => {
            let cost = position_cost(chain, frame, p);
            bfgs_with_callback(&cost, q0, &options.minimize, |q: &Config<N>| {
                show_iterate(chain, frame, &target_pose, q, options.frame_delay, viewer)
            })
        }
        Goal::Pose(m) => {
            let cost = pose_cost(chain, frame, m);
            bfgs_with_callback(&cost, q0, &options.minimize, |q: &Config<N>| {
                show_iterate(chain, frame, &target_pose, q, options.frame_delay, viewer)
            })
        }
    }?;

    info!(
        "inverse geometry {} after {} iterations, {} cost evaluations, cost {:.3e}",
        if result.converged { "converged" } else { "stopped" },
        result.iterations,
        result.nfev,
        result.fun,
    );
    Ok(Solution {
        q: result.x,
        cost: result.fun,
        iterations: result.iterations,
        nfev: result.nfev,
        converged: result.converged,
    })
}

fn show_iterate<const N: usize, V: Viewer>(
    chain: &SerialChain<N>,
    frame: usize,
    target: &SE3,
    q: &Config<N>,
    delay: Duration,
    viewer: &mut V,
) {
    viewer.apply_configuration(TARGET_MARKER, target);
    viewer.apply_configuration(TIP_MARKER, &chain.placement(q, frame));
    viewer.display(q.as_slice(), &chain.joint_placements(q));
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::robot::Robot;
    use crate::viz::{Command, NullViewer, RecordingViewer};
    use approx::assert_relative_eq;

    fn ur5_chain() -> SerialChain<6> {
        let robot = Robot::load("ur5").unwrap();
        robot.serial_chain::<6>("base_link", "ee_link").unwrap()
    }

    fn headless() -> SolveOptions {
        SolveOptions {
            frame_delay: Duration::ZERO,
            ..SolveOptions::default()
        }
    }

    #[test]
    fn test_position_cost_is_zero_on_target() {
        let chain = ur5_chain();
        let q = Config::from([0.1, -0.9, 1.2, 0.3, -0.4, 0.8]);
        let target = chain.placement(&q, 6).trans;
        let cost = position_cost(&chain, 6, &target);
        assert_relative_eq!(cost(&q), 0.0, epsilon = 1e-30);
    }

    #[test]
    fn test_pose_cost_is_zero_on_target() {
        let chain = ur5_chain();
        let q = Config::from([0.1, -0.9, 1.2, 0.3, -0.4, 0.8]);
        let target = chain.placement(&q, 6);
        let cost = pose_cost(&chain, 6, &target);
        assert_relative_eq!(cost(&q), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_position_cost_is_squared_distance() {
        let chain = ur5_chain();
        let q = Config::<6>::zeros();
        let reached = chain.placement(&q, 6).trans;
        let target = reached + Vec3::new(0.0, 0.0, 0.1);
        let cost = position_cost(&chain, 6, &target);
        assert_relative_eq!(cost(&q), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_reaches_point_goal() {
        let chain = ur5_chain();
        let q0 = Config::from([0.0, -1.57, 0.0, 0.0, 0.0, 0.0]);
        let goal = Goal::Point(Vec3::new(0.5, 0.1, 0.2));
        let solution = solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer)
            .expect("solve failed");

        assert!(solution.converged);
        let reached = chain.placement(&solution.q, 6).trans;
        for i in 0..3 {
            assert!(
                (reached[i] - [0.5, 0.1, 0.2][i]).abs() < 1e-4,
                "axis {}: reached {} vs target {}",
                i,
                reached[i],
                [0.5, 0.1, 0.2][i]
            );
        }
    }

    #[test]
    fn test_solve_streams_markers_and_frames() {
        let chain = ur5_chain();
        let q0 = Config::from([0.0, -1.57, 0.0, 0.0, 0.0, 0.0]);
        let goal = Goal::Point(Vec3::new(0.5, 0.1, 0.2));
        let mut viewer = RecordingViewer::new();
        let solution =
            solve(&chain, 6, &goal, &q0, &headless(), &mut viewer).expect("solve failed");

        let displays: Vec<_> = viewer
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Display { q } => Some(q.clone()),
                _ => None,
            })
            .collect();
        assert!(!displays.is_empty());
        assert!(displays.len() <= solution.iterations);
        // the last displayed configuration is the returned solution
        assert_eq!(displays.last().unwrap().as_slice(), solution.q.as_slice());

        // each display is preceded by the two marker updates
        let target_updates = viewer
            .commands
            .iter()
            .filter(|c| matches!(c, Command::ApplyConfiguration { name, .. } if name == TARGET_MARKER))
            .count();
        assert_eq!(target_updates, displays.len());
    }
}
