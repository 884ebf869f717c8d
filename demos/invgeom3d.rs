//! Reach a point with the UR5 wrist, orientation free.
//!
//! Solves the position-only inverse geometry problem with BFGS and records
//! every iterate into a three.js animation.

use std::error::Error;
use std::thread;
use std::time::Duration;

use invgeom::{
    solve, Config, Goal, HtmlViewer, Robot, SolveOptions, Vec3, Viewer, SE3, TARGET_MARKER,
    TIP_MARKER,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let robot = Robot::load("ur5")?;
    let chain = robot.serial_chain::<6>("base_link", "ee_link")?;

    let mut viewer = HtmlViewer::new("invgeom3d: reach a point");
    viewer.add_sphere(TARGET_MARKER, 0.05, [0.0, 1.0, 0.0, 1.0]);
    viewer.add_box(TIP_MARKER, [0.08, 0.08, 0.08], [0.2, 0.2, 1.0, 0.5]);

    let target = Vec3::new(0.5, 0.1, 0.2);
    let q0 = Config::from([0.0, -3.14 / 2.0, 0.0, 0.0, 0.0, 0.0]);

    viewer.apply_configuration(TARGET_MARKER, &SE3::translation(target));
    viewer.display(q0.as_slice(), &chain.joint_placements(&q0));
    thread::sleep(Duration::from_millis(300));

    let options = SolveOptions::default();
    let solution = solve(&chain, 6, &Goal::Point(target), &q0, &options, &mut viewer)?;

    let reached = chain.placement(&solution.q, 6).trans;
    println!(
        "converged: {} in {} iterations ({} cost evaluations)",
        solution.converged, solution.iterations, solution.nfev
    );
    println!("q* = {:?}", solution.q.as_slice());
    println!("reached {:?}", reached.as_slice());
    println!("target  {:?}", target.as_slice());

    for i in 0..3 {
        assert!(
            (reached[i] - target[i]).abs() < 1e-4,
            "axis {i} missed the target"
        );
    }
    // the wrist cannot move its own origin, so BFGS never touches it
    assert_eq!(solution.q[4], 0.0);
    assert_eq!(solution.q[5], 0.0);

    let path = "invgeom3d.html";
    viewer.save(path)?;
    println!("Open in browser: file://{}", std::fs::canonicalize(path)?.display());
    Ok(())
}
