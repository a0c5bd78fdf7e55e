use glam::{Mat4, Vec3, Vec4};

use crate::game::clip::Clip;
use crate::game::rig::{Rig, RigError};
use crate::math::{lerp_vec4, Mat4Ext};

#[derive(Debug, Clone, Copy)]
pub struct PoseEntry {
    pub joint: u32,
    /// Model-space transform of the animated joint.
    pub total: Mat4,
    /// `total * inverse_global_bind`, ready for vertex skinning.
    pub skinning: Mat4,
}

#[derive(Debug, Clone)]
pub struct Pose {
    pub entries: Vec<PoseEntry>,
    /// Animation offset per joint, array-indexed. Identity where the
    /// clip carries no keyframe for the joint.
    pub local_anim: Vec<Mat4>,
}

/// Matrices answering "where is this named joint" without re-walking
/// the hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct JointMatrices {
    pub local_bind: Mat4,
    pub parent_total: Mat4,
    pub local_anim: Mat4,
}

impl JointMatrices {
    pub fn world_position(&self, root_transform: Mat4, scale: f32) -> Vec3 {
        let m = root_transform * self.parent_total * self.local_bind * self.local_anim;
        m.translation_vec3() * scale
    }
}

/// Interpolated keyframe state between two structural frames.
struct FrameBracket<'a> {
    prev: &'a [crate::resource_system::file_formats::clipfile::AnimFrame],
    next: &'a [crate::resource_system::file_formats::clipfile::AnimFrame],
    pct: f32,
}

impl FrameBracket<'_> {
    /// Animation offset matrix for one joint. Rotation keyframes are
    /// axis-angle vec4s interpolated per component; the axis is fed to
    /// the rotation builder unnormalized, matching how the clips were
    /// baked. Scale keyframes are carried in the data but the offset is
    /// translation * rotation only.
    fn anim_offset(&self, joint: u32) -> Mat4 {
        let prev_kf = self.prev.iter().find(|kf| kf.joint == joint);
        let next_kf = self.next.iter().find(|kf| kf.joint == joint);
        let (prev_kf, next_kf) = match (prev_kf, next_kf) {
            (Some(p), Some(n)) => (p, n),
            _ => return Mat4::IDENTITY,
        };

        let rotation = lerp_vec4(prev_kf.rotation(), next_kf.rotation(), self.pct);
        let translation = lerp_vec4(prev_kf.translation(), next_kf.translation(), self.pct);
        let _scale: Vec4 = lerp_vec4(prev_kf.scale(), next_kf.scale(), self.pct);

        Mat4::from_translation(translation.truncate())
            * Mat4::from_axis_angle(rotation.truncate(), rotation.w)
    }
}

fn bracket(clip: &Clip, time: f32) -> FrameBracket<'_> {
    // First frame whose representative time exceeds the query, clamped
    // so a query past the end holds the last frame.
    let upper = clip.frames.partition_point(|f| f[0].time <= time);
    let next = upper.min(clip.frames.len() - 1);
    let prev = upper.saturating_sub(1);

    let t0 = clip.frame_time(prev);
    let t1 = clip.frame_time(next);
    let pct = if time > 0.0 && t1 > t0 {
        ((time - t0) / (t1 - t0)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    FrameBracket {
        prev: &clip.frames[prev],
        next: &clip.frames[next],
        pct,
    }
}

/// Evaluates the clip at `time` over the whole hierarchy.
///
/// Depth-first from the root with an explicit stack; per joint the
/// composition is `total = parent_total * local_bind * anim_offset`,
/// and the skinning matrix folds in the stored inverse global bind.
pub fn evaluate(rig: &Rig, clip: &Clip, time: f32) -> Result<Pose, RigError> {
    let bracket = bracket(clip, time);

    let mut entries = Vec::with_capacity(rig.joint_count());
    let mut local_anim = vec![Mat4::IDENTITY; rig.joint_count()];

    let mut stack: Vec<(u32, Mat4)> = vec![(rig.root_index(), Mat4::IDENTITY)];
    while let Some((index, parent_total)) = stack.pop() {
        let joint = rig.joint(index)?;
        let ai = rig.array_index(index)?;

        let anim = bracket.anim_offset(index);
        let total = parent_total * rig.local_bind[ai] * anim;
        let skinning = total * rig.inverse_global_bind[ai];

        local_anim[ai] = anim;
        entries.push(PoseEntry {
            joint: index,
            total,
            skinning,
        });

        for &child in &joint.children {
            stack.push((child, total));
        }
    }

    Ok(Pose { entries, local_anim })
}

impl Pose {
    pub fn entry(&self, joint: u32) -> Option<&PoseEntry> {
        self.entries.iter().find(|e| e.joint == joint)
    }

    pub fn joint_matrices(&self, rig: &Rig, name: &str) -> Result<JointMatrices, RigError> {
        let joint = rig.joint_by_name(name)?;
        let ai = rig.array_index(joint.index)?;
        let parent_total = match joint.parent {
            Some(parent) => {
                self.entry(parent)
                    .ok_or(RigError::CorruptHierarchy(parent))?
                    .total
            }
            None => Mat4::IDENTITY,
        };
        Ok(JointMatrices {
            local_bind: rig.local_bind[ai],
            parent_total,
            local_anim: self.local_anim[ai],
        })
    }
}
