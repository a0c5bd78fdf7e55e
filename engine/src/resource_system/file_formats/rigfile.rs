use glam::{Mat4, Quat, Vec3};

use super::reader::{ByteReader, ByteWriter, DecodeError};

pub const NO_PARENT: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct RigFileJoint {
    pub index: u32,
    pub children: Vec<u32>,
    pub parent: Option<u32>,
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

/// As-decoded rig record. Semantic validation (tree shape, mapping
/// coverage) happens when this is turned into a `game::rig::Rig`.
#[derive(Debug, Clone)]
pub struct RigFile {
    pub joints: Vec<RigFileJoint>,
    pub local_bind: Vec<Mat4>,
    pub inverse_global_bind: Vec<Mat4>,
    /// Array index for each joint, positionally keyed by joint index.
    pub joint_to_array: Vec<u32>,
    pub names: Vec<(u32, String)>,
}

// Minimum on-disk sizes used to sanity check count prefixes.
const JOINT_MIN_SIZE: usize = 4 + 4 + 4 + 16 + 12 + 12;
const MAT4_SIZE: usize = 64;
const NAME_MIN_SIZE: usize = 8;

pub fn decode(bytes: &[u8]) -> Result<RigFile, DecodeError> {
    let mut r = ByteReader::new(bytes);

    let joint_count = r.count(JOINT_MIN_SIZE)?;
    let mut joints = Vec::with_capacity(joint_count as usize);
    for _ in 0..joint_count {
        let index = r.u32()?;
        let child_count = r.count(4)?;
        let mut children = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            children.push(r.u32()?);
        }
        let parent = match r.u32()? {
            NO_PARENT => None,
            p => Some(p),
        };
        joints.push(RigFileJoint {
            index,
            children,
            parent,
            rotation: r.quat()?,
            translation: r.vec3()?,
            scale: r.vec3()?,
        });
    }

    let mut read_matrices = |r: &mut ByteReader| -> Result<Vec<Mat4>, DecodeError> {
        let count = r.count(MAT4_SIZE)?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(r.mat4()?);
        }
        Ok(out)
    };
    let local_bind = read_matrices(&mut r)?;
    let inverse_global_bind = read_matrices(&mut r)?;

    let mapping_count = r.count(4)?;
    let mut joint_to_array = Vec::with_capacity(mapping_count as usize);
    for _ in 0..mapping_count {
        joint_to_array.push(r.u32()?);
    }

    let name_count = r.count(NAME_MIN_SIZE)?;
    let mut names = Vec::with_capacity(name_count as usize);
    for _ in 0..name_count {
        let index = r.u32()?;
        let len = r.count(1)?;
        let utf8 = r.bytes(len as usize)?;
        names.push((index, std::str::from_utf8(utf8)?.to_owned()));
    }

    log::debug!(
        "decoded rig: {} joints, {} names, {} bytes",
        joints.len(),
        names.len(),
        bytes.len()
    );
    Ok(RigFile {
        joints,
        local_bind,
        inverse_global_bind,
        joint_to_array,
        names,
    })
}

pub fn encode(rig: &RigFile) -> Vec<u8> {
    let mut w = ByteWriter::new();

    w.u32(rig.joints.len() as u32);
    for joint in &rig.joints {
        w.u32(joint.index);
        w.u32(joint.children.len() as u32);
        for &child in &joint.children {
            w.u32(child);
        }
        w.u32(joint.parent.unwrap_or(NO_PARENT));
        w.quat(joint.rotation);
        w.vec3(joint.translation);
        w.vec3(joint.scale);
    }

    for matrices in [&rig.local_bind, &rig.inverse_global_bind] {
        w.u32(matrices.len() as u32);
        for &m in matrices.iter() {
            w.mat4(m);
        }
    }

    w.u32(rig.joint_to_array.len() as u32);
    for &a in &rig.joint_to_array {
        w.u32(a);
    }

    w.u32(rig.names.len() as u32);
    for (index, name) in &rig.names {
        w.u32(*index);
        w.u32(name.len() as u32);
        w.bytes(name.as_bytes());
    }

    w.into_bytes()
}

#[cfg(test)]
pub(crate) fn two_bone_fixture() -> RigFile {
    let root_local = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
    let child_local = Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0));
    let root_global = root_local;
    let child_global = root_global * child_local;
    RigFile {
        joints: vec![
            RigFileJoint {
                index: 0,
                children: vec![1],
                parent: None,
                rotation: Quat::IDENTITY,
                translation: Vec3::new(0.0, 1.0, 0.0),
                scale: Vec3::ONE,
            },
            RigFileJoint {
                index: 1,
                children: vec![],
                parent: Some(0),
                rotation: Quat::IDENTITY,
                translation: Vec3::new(0.0, 0.5, 0.0),
                scale: Vec3::ONE,
            },
        ],
        local_bind: vec![root_local, child_local],
        inverse_global_bind: vec![root_global.inverse(), child_global.inverse()],
        joint_to_array: vec![0, 1],
        names: vec![(0, "root".to_owned()), (1, "tip".to_owned())],
    }
}
