//! End-to-end inverse geometry regression on the bundled UR5 description.

use std::time::Duration;

use approx::assert_relative_eq;
use invgeom::{solve, Config, Goal, NullViewer, Robot, SerialChain, SolveOptions, Vec3, SE3};

/// First four joint values of the point solve below, recorded from this
/// implementation. The solution manifold is one-dimensional, so the landing
/// point is a property of the solver path, not of the problem.
const POINT_REFERENCE: [f64; 4] = [-0.0183349, -0.9441666, 1.4792736, 0.6751391];

fn ur5_chain() -> SerialChain<6> {
    let robot = Robot::load("ur5").expect("bundled ur5.urdf should load");
    robot
        .serial_chain::<6>("base_link", "ee_link")
        .expect("ur5 reduces to a 6-dof serial chain")
}

/// Solve options with animation pauses disabled.
fn headless() -> SolveOptions {
    SolveOptions {
        frame_delay: Duration::ZERO,
        ..SolveOptions::default()
    }
}

fn point_solve_start() -> (Config<6>, Goal) {
    let q0 = Config::from([0.0, -1.57, 0.0, 0.0, 0.0, 0.0]);
    (q0, Goal::Point(Vec3::new(0.5, 0.1, 0.2)))
}

#[test]
fn test_point_solve_reaches_target() {
    let chain = ur5_chain();
    let (q0, goal) = point_solve_start();
    let solution =
        solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer).expect("solve failed");

    assert!(solution.converged);
    let reached = chain.placement(&solution.q, 6).trans;
    let target = [0.5, 0.1, 0.2];
    for i in 0..3 {
        assert!(
            (reached[i] - target[i]).abs() < 1e-4,
            "axis {}: reached {} vs target {}",
            i,
            reached[i],
            target[i]
        );
    }
}

#[test]
fn test_point_solve_leaves_wrist_untouched() {
    let chain = ur5_chain();
    let (q0, goal) = point_solve_start();
    let solution =
        solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer).expect("solve failed");

    // exact, not approximate: these joints cannot move the wrist origin, so
    // their finite-difference gradient is exactly zero and BFGS never steps
    assert_eq!(solution.q[4], 0.0);
    assert_eq!(solution.q[5], 0.0);
}

#[test]
fn test_point_solve_matches_recorded_reference() {
    let chain = ur5_chain();
    let (q0, goal) = point_solve_start();
    let solution =
        solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer).expect("solve failed");

    for (i, reference) in POINT_REFERENCE.iter().enumerate() {
        assert_relative_eq!(solution.q[i], *reference, epsilon = 1e-3);
    }
}

#[test]
fn test_point_solve_is_deterministic() {
    let chain = ur5_chain();
    let (q0, goal) = point_solve_start();
    let first =
        solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer).expect("solve failed");
    let second =
        solve(&chain, 6, &goal, &q0, &headless(), &mut NullViewer).expect("solve failed");

    assert_eq!(first.q, second.q);
    assert_eq!(first.iterations, second.iterations);
    assert_eq!(first.nfev, second.nfev);
}

#[test]
fn test_pose_solve_reaches_target() {
    let chain = ur5_chain();
    let target = SE3::new(
        SE3::rotation_x(3.14 / 4.0).rot,
        Vec3::new(-0.5, 0.1, 0.2),
    );
    let q0 = Config::from([0.0, -1.57, 0.0, 0.0, 0.0, 0.0]);
    let mut options = headless();
    options.minimize.eps = 1e-9;
    let solution = solve(&chain, 6, &Goal::Pose(target), &q0, &options, &mut NullViewer)
        .expect("solve failed");

    assert!(solution.converged);
    let placement = chain.placement(&solution.q, 6);
    for i in 0..3 {
        assert!(
            (placement.trans[i] - target.trans[i]).abs() < 1e-6,
            "axis {}: reached {} vs target {}",
            i,
            placement.trans[i],
            target.trans[i]
        );
    }
    let residual = (placement.inverse() * target).log();
    for i in 0..3 {
        assert!(residual.lin[i].abs() < 1e-6, "lin[{}] = {}", i, residual.lin[i]);
        assert!(residual.ang[i].abs() < 1e-5, "ang[{}] = {}", i, residual.ang[i]);
    }
}
