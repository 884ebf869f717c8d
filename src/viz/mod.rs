//! Viewers for watching a solve converge.
//!
//! The driver only talks to the [`Viewer`] trait. [`HtmlViewer`] renders
//! the recorded solve as a self-contained three.js animation,
//! [`RecordingViewer`] captures the command stream for tests, and
//! [`NullViewer`] drops everything for headless solving.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::lie::SE3;

/// RGBA color, each channel in [0, 1].
pub type Color = [f32; 4];

/// A sink for solve visualization.
pub trait Viewer {
    /// Add a named sphere of the given radius.
    fn add_sphere(&mut self, name: &str, radius: f64, color: Color);
    /// Add a named box with full extents `size`.
    fn add_box(&mut self, name: &str, size: [f64; 3], color: Color);
    /// Move a named object to a pose.
    fn apply_configuration(&mut self, name: &str, pose: &SE3);
    /// Show the robot at a configuration, given its joint frame poses.
    fn display(&mut self, q: &[f64], joint_placements: &[SE3]);
}

/// Viewer that ignores everything.
#[derive(Debug, Default)]
pub struct NullViewer;

impl Viewer for NullViewer {
    fn add_sphere(&mut self, _name: &str, _radius: f64, _color: Color) {}
    fn add_box(&mut self, _name: &str, _size: [f64; 3], _color: Color) {}
    fn apply_configuration(&mut self, _name: &str, _pose: &SE3) {}
    fn display(&mut self, _q: &[f64], _joint_placements: &[SE3]) {}
}

/// One recorded viewer command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddSphere {
        name: String,
        radius: f64,
        color: Color,
    },
    AddBox {
        name: String,
        size: [f64; 3],
        color: Color,
    },
    ApplyConfiguration {
        name: String,
        pose: SE3,
    },
    Display {
        q: Vec<f64>,
    },
}

/// Viewer that records every command, for tests.
#[derive(Debug, Default)]
pub struct RecordingViewer {
    pub commands: Vec<Command>,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of displayed frames.
    pub fn display_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Display { .. }))
            .count()
    }
}

impl Viewer for RecordingViewer {
    fn add_sphere(&mut self, name: &str, radius: f64, color: Color) {
        self.commands.push(Command::AddSphere {
            name: name.to_string(),
            radius,
            color,
        });
    }

    fn add_box(&mut self, name: &str, size: [f64; 3], color: Color) {
        self.commands.push(Command::AddBox {
            name: name.to_string(),
            size,
            color,
        });
    }

    fn apply_configuration(&mut self, name: &str, pose: &SE3) {
        self.commands.push(Command::ApplyConfiguration {
            name: name.to_string(),
            pose: *pose,
        });
    }

    fn display(&mut self, q: &[f64], _joint_placements: &[SE3]) {
        self.commands.push(Command::Display { q: q.to_vec() });
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Shape {
    Sphere { radius: f64 },
    Box { size: [f64; 3] },
}

#[derive(Debug, Clone, Serialize)]
struct SceneObject {
    name: String,
    shape: Shape,
    color: Color,
}

#[derive(Debug, Clone, Serialize)]
struct MarkerPose {
    name: String,
    /// [x, y, z, qx, qy, qz, qw]
    pose: [f64; 7],
}

#[derive(Debug, Clone, Serialize)]
struct FrameRecord {
    q: Vec<f64>,
    markers: Vec<MarkerPose>,
    /// Joint frame origins, base first.
    skeleton: Vec<[f64; 3]>,
}

/// Viewer that accumulates the solve and writes it out as a self-contained
/// HTML page animating the robot skeleton and the markers with three.js.
#[derive(Debug)]
pub struct HtmlViewer {
    title: String,
    objects: Vec<SceneObject>,
    poses: BTreeMap<String, [f64; 7]>,
    frames: Vec<FrameRecord>,
    /// Playback interval of the generated animation.
    pub playback_ms: u64,
}

impl HtmlViewer {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            objects: Vec::new(),
            poses: BTreeMap::new(),
            frames: Vec::new(),
            playback_ms: 60,
        }
    }

    /// Number of recorded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Render the recorded solve as a standalone HTML page.
    pub fn to_html(&self) -> Result<String, serde_json::Error> {
        let objects = serde_json::to_string(&self.objects)?;
        let frames = serde_json::to_string(&self.frames)?;
        Ok(TEMPLATE
            .replace("__TITLE__", &self.title)
            .replace("__OBJECTS__", &objects)
            .replace("__FRAMES__", &frames)
            .replace("__PLAYBACK_MS__", &self.playback_ms.to_string()))
    }

    /// Write the page to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.to_html()?)
    }
}

impl Viewer for HtmlViewer {
    fn add_sphere(&mut self, name: &str, radius: f64, color: Color) {
        self.objects.push(SceneObject {
            name: name.to_string(),
            shape: Shape::Sphere { radius },
            color,
        });
        self.poses
            .insert(name.to_string(), [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    fn add_box(&mut self, name: &str, size: [f64; 3], color: Color) {
        self.objects.push(SceneObject {
            name: name.to_string(),
            shape: Shape::Box { size },
            color,
        });
        self.poses
            .insert(name.to_string(), [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    fn apply_configuration(&mut self, name: &str, pose: &SE3) {
        self.poses.insert(name.to_string(), pose_to_array(pose));
    }

    fn display(&mut self, q: &[f64], joint_placements: &[SE3]) {
        let mut skeleton = Vec::with_capacity(joint_placements.len() + 1);
        skeleton.push([0.0, 0.0, 0.0]);
        for placement in joint_placements {
            skeleton.push([placement.trans.x, placement.trans.y, placement.trans.z]);
        }
        self.frames.push(FrameRecord {
            q: q.to_vec(),
            markers: self
                .poses
                .iter()
                .map(|(name, pose)| MarkerPose {
                    name: name.clone(),
                    pose: *pose,
                })
                .collect(),
            skeleton,
        });
    }
}

fn pose_to_array(pose: &SE3) -> [f64; 7] {
    let quat = pose.unit_quaternion();
    [
        pose.trans.x,
        pose.trans.y,
        pose.trans.z,
        quat.coords[0],
        quat.coords[1],
        quat.coords[2],
        quat.coords[3],
    ]
}

// Scene data is Z-up; the page parents everything under a group rotated to
// three.js' Y-up convention.
const TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<style>
  body { margin: 0; overflow: hidden; background: #14161a; }
  #hud { position: absolute; top: 8px; left: 8px; color: #d0d4da;
         font: 12px monospace; white-space: pre; }
</style>
</head>
<body>
<div id="hud"></div>
<script src="https://cdnjs.cloudflare.com/ajax/libs/three.js/r128/three.min.js"></script>
<script>
const objects = __OBJECTS__;
const frames = __FRAMES__;
const playbackMs = __PLAYBACK_MS__;

const scene = new THREE.Scene();
const camera = new THREE.PerspectiveCamera(50, window.innerWidth / window.innerHeight, 0.01, 100);
camera.position.set(1.6, 1.1, 1.6);
camera.lookAt(0, 0.3, 0);

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(window.innerWidth, window.innerHeight);
document.body.appendChild(renderer.domElement);

scene.add(new THREE.AmbientLight(0xffffff, 0.55));
const sun = new THREE.DirectionalLight(0xffffff, 0.7);
sun.position.set(2, 4, 3);
scene.add(sun);
scene.add(new THREE.GridHelper(2, 20, 0x3a3f46, 0x24282e));

const world = new THREE.Group();
world.rotation.x = -Math.PI / 2;
scene.add(world);
world.add(new THREE.AxesHelper(0.3));

function makeMaterial(color) {
  return new THREE.MeshLambertMaterial({
    color: new THREE.Color(color[0], color[1], color[2]),
    transparent: color[3] < 1.0,
    opacity: color[3],
  });
}

const meshes = {};
for (const o of objects) {
  let geometry;
  if (o.shape.kind === 'sphere') {
    geometry = new THREE.SphereGeometry(o.shape.radius, 24, 16);
  } else {
    geometry = new THREE.BoxGeometry(o.shape.size[0], o.shape.size[1], o.shape.size[2]);
  }
  const mesh = new THREE.Mesh(geometry, makeMaterial(o.color));
  meshes[o.name] = mesh;
  world.add(mesh);
}

const skeletonLine = new THREE.Line(
  new THREE.BufferGeometry(),
  new THREE.LineBasicMaterial({ color: 0xe8b84a })
);
world.add(skeletonLine);

const jointDots = [];
if (frames.length > 0) {
  const dotGeometry = new THREE.SphereGeometry(0.018, 12, 8);
  const dotMaterial = new THREE.MeshLambertMaterial({ color: 0x9aa2ad });
  for (let i = 0; i < frames[0].skeleton.length; i++) {
    const dot = new THREE.Mesh(dotGeometry, dotMaterial);
    jointDots.push(dot);
    world.add(dot);
  }
}

const hud = document.getElementById('hud');

function applyFrame(index) {
  const frame = frames[index];
  for (const m of frame.markers) {
    const mesh = meshes[m.name];
    if (!mesh) continue;
    mesh.position.set(m.pose[0], m.pose[1], m.pose[2]);
    mesh.quaternion.set(m.pose[3], m.pose[4], m.pose[5], m.pose[6]);
  }
  const points = frame.skeleton.map(p => new THREE.Vector3(p[0], p[1], p[2]));
  skeletonLine.geometry.setFromPoints(points);
  for (let i = 0; i < jointDots.length && i < points.length; i++) {
    jointDots[i].position.copy(points[i]);
  }
  const q = frame.q.map(v => v.toFixed(3)).join(', ');
  hud.textContent = 'frame ' + (index + 1) + '/' + frames.length + '\nq = [' + q + ']';
}

let current = 0;
if (frames.length > 0) {
  applyFrame(0);
  setInterval(() => {
    current = (current + 1) % frames.length;
    applyFrame(current);
  }, playbackMs);
}

function render() {
  requestAnimationFrame(render);
  renderer.render(scene, camera);
}
render();

window.addEventListener('resize', () => {
  camera.aspect = window.innerWidth / window.innerHeight;
  camera.updateProjectionMatrix();
  renderer.setSize(window.innerWidth, window.innerHeight);
});
</script>
</body>
</html>
"##;
