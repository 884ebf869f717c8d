//! Reach a full pose with the UR5 wrist.
//!
//! Same setup as invgeom3d, but the cost is the norm of the log of the
//! relative transform, so orientation is constrained too. The target and
//! tip boxes line up exactly when the solve is done.

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

    let mut viewer = HtmlViewer::new("invgeom6d: reach a pose");
    viewer.add_box(TARGET_MARKER, [0.05, 0.1, 0.2], [1.0, 0.2, 0.2, 0.5]);
    viewer.add_box(TIP_MARKER, [0.08, 0.08, 0.08], [0.2, 0.2, 1.0, 0.5]);

    let target = SE3::new(
        SE3::rotation_x(3.14 / 4.0).rot,
        Vec3::new(-0.5, 0.1, 0.2),
    );
    let q0 = Config::from([0.0, -3.14 / 2.0, 0.0, 0.0, 0.0, 0.0]);

    viewer.apply_configuration(TARGET_MARKER, &target);
    viewer.display(q0.as_slice(), &chain.joint_placements(&q0));
    thread::sleep(Duration::from_millis(300));

    let mut options = SolveOptions {
        frame_delay: Duration::from_millis(100),
        ..SolveOptions::default()
    };
    // the cost is a cone near the optimum; a smaller finite-difference step
    // lets the line search walk closer to the tip
    options.minimize.eps = 1e-9;
    let solution = solve(&chain, 6, &Goal::Pose(target), &q0, &options, &mut viewer)?;

    let placement = chain.placement(&solution.q, 6);
    let residual = (placement.inverse() * target).log();
    println!(
        "converged: {} in {} iterations ({} cost evaluations)",
        solution.converged, solution.iterations, solution.nfev
    );
    println!("q* = {:?}", solution.q.as_slice());
    println!("placement translation {:?}", placement.trans.as_slice());
    println!("target    translation {:?}", target.trans.as_slice());
    println!("residual log norm {:.3e}", residual.norm());

    for i in 0..3 {
        assert!(
            (placement.trans[i] - target.trans[i]).abs() < 1e-7,
            "axis {i} missed the target"
        );
    }
    assert!(residual.norm() < 1e-6, "pose error did not vanish");

    let path = "invgeom6d.html";
    viewer.save(path)?;
    println!("Open in browser: file://{}", std::fs::canonicalize(path)?.display());
    Ok(())
}
