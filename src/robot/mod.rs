//! Robot models parsed from URDF and reduced to serial chains.

use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

use log::debug;
use nalgebra as na;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;
use urdf_rs::read_file;

use crate::lie::{Vec3, SE3};

/// Joint configuration of an N-joint chain.
pub type Config<const N: usize> = na::SVector<f64, N>;

/// Environment variable overriding the robot description directory.
pub const DESCRIPTION_DIR_ENV: &str = "INVGEOM_DESCRIPTION_DIR";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("URDF error: {0}")]
    Urdf(#[from] urdf_rs::UrdfError),
    #[error("no robot description named `{name}` under {}", .dir.display())]
    UnknownRobot { name: String, dir: PathBuf },
    #[error("model has no root link")]
    NoRoot,
    #[error("no link named `{0}` in the model")]
    UnknownLink(String),
    #[error("link `{tip}` is not a descendant of link `{base}`")]
    NotConnected { base: String, tip: String },
    #[error("chain has {found} actuated joints, expected {expected}")]
    DofMismatch { expected: usize, found: usize },
    #[error("joint `{name}` has unsupported type {joint_type:?}")]
    UnsupportedJoint {
        name: String,
        joint_type: urdf_rs::JointType,
    },
}

/// A link of the model together with the joint connecting it to its parent.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Joint whose child this link is; `None` for the root.
    pub joint: Option<urdf_rs::Joint>,
    /// Pose of the joint frame in the parent link frame at zero angle.
    pub local_zero_pose: SE3,
    /// Rotation axis in the joint frame, for revolute and continuous joints.
    pub axis: Option<na::Unit<Vec3>>,
}

/// A robot model: the URDF link tree.
#[derive(Debug, Clone)]
pub struct Robot {
    // link index graph
    graph: DiGraphMap<usize, ()>,
    // map index -> link
    links: HashMap<usize, Link>,
    pub root_index: usize,
    pub name: String,
}

impl Robot {
    /// Parse a URDF file into a robot model.
    pub fn from_urdf(path: impl AsRef<Path>) -> Result<Robot, ModelError> {
        let robot = read_file(path)?;
        parse_robot(robot)
    }

    /// Load a bundled robot description by name.
    ///
    /// Resolves `{dir}/{name}.urdf`, where `dir` is the directory named by
    /// `INVGEOM_DESCRIPTION_DIR` when set and the crate's `urdf/` directory
    /// otherwise.
    pub fn load(name: &str) -> Result<Robot, ModelError> {
        let dir = env::var_os(DESCRIPTION_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("urdf"));
        let path = dir.join(format!("{name}.urdf"));
        if !path.is_file() {
            return Err(ModelError::UnknownRobot {
                name: name.to_string(),
                dir,
            });
        }
        debug!("loading robot `{}` from {}", name, path.display());
        Self::from_urdf(path)
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(&index)
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links
            .iter()
            .find(|(_, link)| link.name == name)
            .map(|(index, _)| *index)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .next()
    }

    /// Reduce the base→tip path of the link tree to a serial chain of
    /// exactly `N` actuated joints.
    ///
    /// Fixed joints on the path fold into the next actuated joint's offset,
    /// or into the chain's tail transform when nothing actuated follows.
    pub fn serial_chain<const N: usize>(
        &self,
        base: &str,
        tip: &str,
    ) -> Result<SerialChain<N>, ModelError> {
        let base_index = self
            .link_index(base)
            .ok_or_else(|| ModelError::UnknownLink(base.to_string()))?;
        let tip_index = self
            .link_index(tip)
            .ok_or_else(|| ModelError::UnknownLink(tip.to_string()))?;

        let mut path = vec![tip_index];
        let mut current = tip_index;
        while current != base_index {
            current = self.parent(current).ok_or_else(|| ModelError::NotConnected {
                base: base.to_string(),
                tip: tip.to_string(),
            })?;
            path.push(current);
        }
        path.reverse();

        let mut joints: Vec<ChainJoint> = Vec::new();
        let mut pending = SE3::identity();
        for &index in path.iter().skip(1) {
            let link = &self.links[&index];
            // every non-base link on the path has a connecting joint
            let Some(joint) = &link.joint else { continue };
            match joint.joint_type {
                urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
                    let Some(axis) = link.axis else { continue };
                    joints.push(ChainJoint {
                        origin: pending * link.local_zero_pose,
                        axis,
                        name: joint.name.clone(),
                    });
                    pending = SE3::identity();
                }
                urdf_rs::JointType::Fixed => {
                    pending = pending * link.local_zero_pose;
                }
                _ => {
                    return Err(ModelError::UnsupportedJoint {
                        name: joint.name.clone(),
                        joint_type: joint.joint_type.clone(),
                    });
                }
            }
        }
        if joints.len() != N {
            return Err(ModelError::DofMismatch {
                expected: N,
                found: joints.len(),
            });
        }
        Ok(SerialChain {
            joints,
            tail: pending,
        })
    }
}

/// One actuated joint of a serial chain.
#[derive(Debug, Clone)]
pub(crate) struct ChainJoint {
    /// Fixed offset from the previous joint frame, zero-angle pose included.
    pub(crate) origin: SE3,
    /// Rotation axis in the joint frame.
    pub(crate) axis: na::Unit<Vec3>,
    pub(crate) name: String,
}

/// A base→tip chain of `N` revolute joints extracted from a [`Robot`].
#[derive(Debug, Clone)]
pub struct SerialChain<const N: usize> {
    pub(crate) joints: Vec<ChainJoint>,
    /// Fixed transform from the last joint frame to the tip link frame.
    pub(crate) tail: SE3,
}

impl<const N: usize> SerialChain<N> {
    /// Number of actuated joints.
    pub fn dof(&self) -> usize {
        N
    }

    /// Names of the actuated joints, base first.
    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    /// Fixed transform from the last joint frame to the tip link frame.
    pub fn tail(&self) -> SE3 {
        self.tail
    }
}

fn parse_robot(robot: urdf_rs::Robot) -> Result<Robot, ModelError> {
    let mut graph = DiGraphMap::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (index, link) in robot.links.iter().enumerate() {
        graph.add_node(index);
        index_of.insert(link.name.as_str(), index);
    }

    for joint in &robot.joints {
        let parent = *index_of
            .get(joint.parent.link.as_str())
            .ok_or_else(|| ModelError::UnknownLink(joint.parent.link.clone()))?;
        let child = *index_of
            .get(joint.child.link.as_str())
            .ok_or_else(|| ModelError::UnknownLink(joint.child.link.clone()))?;
        graph.add_edge(parent, child, ());
    }

    let links: HashMap<usize, Link> = robot
        .links
        .iter()
        .enumerate()
        .map(|(index, link)| {
            let joint = robot
                .joints
                .iter()
                .find(|joint| joint.child.link == link.name)
                .cloned();
            let local_zero_pose = joint
                .as_ref()
                .map(|j| origin_to_se3(&j.origin))
                .unwrap_or_else(SE3::identity);
            let axis = joint.as_ref().and_then(joint_axis);
            (
                index,
                Link {
                    name: link.name.clone(),
                    joint,
                    local_zero_pose,
                    axis,
                },
            )
        })
        .collect();

    let root_index = links
        .iter()
        .find(|(_, link)| link.joint.is_none())
        .map(|(index, _)| *index)
        .ok_or(ModelError::NoRoot)?;

    Ok(Robot {
        graph,
        links,
        root_index,
        name: robot.name,
    })
}

fn joint_axis(joint: &urdf_rs::Joint) -> Option<na::Unit<Vec3>> {
    match joint.joint_type {
        urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
            Some(na::Unit::new_normalize(Vec3::new(
                joint.axis.xyz[0],
                joint.axis.xyz[1],
                joint.axis.xyz[2],
            )))
        }
        _ => None,
    }
}

fn origin_to_se3(origin: &urdf_rs::Pose) -> SE3 {
    let rpy = origin.rpy.0;
    let xyz = origin.xyz.0;
    SE3::from_rpy_xyz(rpy, xyz)
}
