use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use thiserror::Error;

use crate::math::Mat4Ext;
use crate::resource_system::file_formats::rigfile::RigFile;

#[derive(Debug, Error)]
pub enum RigError {
    #[error("rig has no root joint")]
    NoRoot,
    #[error("rig has multiple root joints ({0} found)")]
    MultipleRoots(usize),
    #[error("joint {parent} references unknown child {child}")]
    UnknownChild { parent: u32, child: u32 },
    #[error("joint hierarchy is not a tree ({reachable} of {total} joints reachable from root)")]
    NotATree { reachable: usize, total: usize },
    #[error("joint-to-array mapping does not cover every joint uniquely")]
    BadMapping,
    #[error("bind matrix arrays have {binds} entries for {joints} joints")]
    BindCountMismatch { binds: usize, joints: usize },
    #[error("unknown joint \"{0}\"")]
    UnknownJoint(String),
    #[error("joint {0} has no array mapping")]
    UnmappedJoint(u32),
    #[error("hierarchy references joint {0} missing from the joint list")]
    CorruptHierarchy(u32),
    #[error("global bind of joint {0} is inconsistent with its stored inverse")]
    BindInconsistent(u32),
    #[error("animation clip has no frames")]
    EmptyClip,
    #[error("keyframe times are not non-decreasing (frame {0})")]
    UnorderedFrames(usize),
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub index: u32,
    pub children: Vec<u32>,
    pub parent: Option<u32>,
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

#[derive(Debug, Clone)]
pub struct Rig {
    pub joints: Vec<Joint>,
    /// Bind matrix arrays, keyed by array index (see `array_index`).
    pub local_bind: Vec<Mat4>,
    pub inverse_global_bind: Vec<Mat4>,
    joint_to_array: Vec<u32>,
    names: Vec<(u32, String)>,
    index_to_slot: HashMap<u32, usize>,
    root: u32,
}

impl Rig {
    pub fn from_file(file: RigFile) -> Result<Self, RigError> {
        let joints: Vec<Joint> = file
            .joints
            .into_iter()
            .map(|j| Joint {
                index: j.index,
                children: j.children,
                parent: j.parent,
                rotation: j.rotation,
                translation: j.translation,
                scale: j.scale,
            })
            .collect();

        let index_to_slot: HashMap<u32, usize> = joints
            .iter()
            .enumerate()
            .map(|(slot, j)| (j.index, slot))
            .collect();
        if index_to_slot.len() != joints.len() {
            return Err(RigError::BadMapping);
        }

        let roots: Vec<u32> = joints
            .iter()
            .filter(|j| j.parent.is_none())
            .map(|j| j.index)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(RigError::NoRoot),
            [r] => *r,
            many => return Err(RigError::MultipleRoots(many.len())),
        };

        for joint in &joints {
            for &child in &joint.children {
                if !index_to_slot.contains_key(&child) {
                    return Err(RigError::UnknownChild {
                        parent: joint.index,
                        child,
                    });
                }
            }
        }

        // Tree check: every joint reachable from the root exactly once.
        let mut visited = vec![false; joints.len()];
        let mut stack = vec![root];
        let mut reachable = 0usize;
        while let Some(index) = stack.pop() {
            let slot = index_to_slot[&index];
            if visited[slot] {
                return Err(RigError::NotATree {
                    reachable,
                    total: joints.len(),
                });
            }
            visited[slot] = true;
            reachable += 1;
            stack.extend_from_slice(&joints[slot].children);
        }
        if reachable != joints.len() {
            return Err(RigError::NotATree {
                reachable,
                total: joints.len(),
            });
        }

        if file.local_bind.len() != joints.len()
            || file.inverse_global_bind.len() != joints.len()
        {
            return Err(RigError::BindCountMismatch {
                binds: file.local_bind.len(),
                joints: joints.len(),
            });
        }

        let mut seen = vec![false; joints.len()];
        for joint in &joints {
            let mapped = file
                .joint_to_array
                .get(joint.index as usize)
                .copied()
                .ok_or(RigError::BadMapping)? as usize;
            if mapped >= joints.len() || seen[mapped] {
                return Err(RigError::BadMapping);
            }
            seen[mapped] = true;
        }

        Ok(Self {
            joints,
            local_bind: file.local_bind,
            inverse_global_bind: file.inverse_global_bind,
            joint_to_array: file.joint_to_array,
            names: file.names,
            index_to_slot,
            root,
        })
    }

    pub fn root_index(&self) -> u32 {
        self.root
    }

    pub fn joint(&self, index: u32) -> Result<&Joint, RigError> {
        self.index_to_slot
            .get(&index)
            .map(|&slot| &self.joints[slot])
            .ok_or(RigError::CorruptHierarchy(index))
    }

    /// Slot in the bind / skinning matrix arrays for a joint index.
    pub fn array_index(&self, joint_index: u32) -> Result<usize, RigError> {
        self.joint_to_array
            .get(joint_index as usize)
            .map(|&a| a as usize)
            .ok_or(RigError::UnmappedJoint(joint_index))
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_by_name(&self, name: &str) -> Result<&Joint, RigError> {
        let (index, _) = self
            .names
            .iter()
            .find(|(_, n)| n == name)
            .ok_or_else(|| RigError::UnknownJoint(name.to_owned()))?;
        self.joint(*index)
    }

    pub fn joint_name(&self, index: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, n)| n.as_str())
    }

    /// Global bind matrices, array-indexed, composed parent-first.
    pub fn global_bind_matrices(&self) -> Result<Vec<Mat4>, RigError> {
        let mut globals = vec![Mat4::IDENTITY; self.joints.len()];
        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((index, parent_global)) = stack.pop() {
            let joint = self.joint(index)?;
            let ai = self.array_index(index)?;
            let global = parent_global * self.local_bind[ai];
            globals[ai] = global;
            for &child in &joint.children {
                stack.push((child, global));
            }
        }
        Ok(globals)
    }

    /// Cross-checks the composed global binds against the stored
    /// inverses. Asset importers occasionally bake the two out of
    /// different source transforms; catching the drift here is much
    /// cheaper than debugging a folded mesh.
    pub fn verify_bind_consistency(&self) -> Result<(), RigError> {
        let globals = self.global_bind_matrices()?;
        for joint in &self.joints {
            let ai = self.array_index(joint.index)?;
            let product = globals[ai] * self.inverse_global_bind[ai];
            if !product.approx_eq(&Mat4::IDENTITY, 1.0e-4) {
                return Err(RigError::BindInconsistent(joint.index));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_system::file_formats::rigfile::{self, RigFileJoint};

    #[test]
    fn valid_two_bone_rig_loads() {
        let rig = Rig::from_file(rigfile::two_bone_fixture()).unwrap();
        assert_eq!(rig.joint_count(), 2);
        assert_eq!(rig.root_index(), 0);
        assert_eq!(rig.array_index(1).unwrap(), 1);
        assert_eq!(rig.joint_by_name("tip").unwrap().index, 1);
        rig.verify_bind_consistency().unwrap();
    }

    #[test]
    fn unknown_name_is_an_error() {
        let rig = Rig::from_file(rigfile::two_bone_fixture()).unwrap();
        assert!(matches!(
            rig.joint_by_name("pinky"),
            Err(RigError::UnknownJoint(_))
        ));
    }

    #[test]
    fn missing_root_is_rejected() {
        let mut file = rigfile::two_bone_fixture();
        file.joints[0].parent = Some(1);
        assert!(matches!(Rig::from_file(file), Err(RigError::NoRoot)));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut file = rigfile::two_bone_fixture();
        // Tip claims the root as its child.
        file.joints[1].children = vec![0];
        assert!(matches!(
            Rig::from_file(file),
            Err(RigError::NotATree { .. })
        ));
    }

    #[test]
    fn dangling_child_is_rejected() {
        let mut file = rigfile::two_bone_fixture();
        file.joints[0].children.push(99);
        assert!(matches!(
            Rig::from_file(file),
            Err(RigError::UnknownChild { parent: 0, child: 99 })
        ));
    }

    #[test]
    fn duplicate_mapping_is_rejected() {
        let mut file = rigfile::two_bone_fixture();
        file.joint_to_array = vec![0, 0];
        assert!(matches!(Rig::from_file(file), Err(RigError::BadMapping)));
    }

    #[test]
    fn global_binds_compose_parent_first() {
        let rig = Rig::from_file(rigfile::two_bone_fixture()).unwrap();
        let globals = rig.global_bind_matrices().unwrap();
        let tip = globals[rig.array_index(1).unwrap()];
        assert_eq!(tip.w_axis.truncate(), glam::Vec3::new(0.0, 1.5, 0.0));
    }

    #[test]
    fn inconsistent_binds_are_detected() {
        let mut file = rigfile::two_bone_fixture();
        file.inverse_global_bind[1] = Mat4::from_translation(glam::Vec3::splat(3.0));
        let rig = Rig::from_file(file).unwrap();
        assert!(matches!(
            rig.verify_bind_consistency(),
            Err(RigError::BindInconsistent(1))
        ));
    }
}
