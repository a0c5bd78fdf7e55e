use glam::Mat4;

use crate::game::clip::Clip;
use crate::game::pose;
use crate::game::rig::{Rig, RigError};
use crate::math::Mat4Ext;
use crate::resource_system::file_formats::clipfile::AnimFrame;

/// Transfers a clip authored on `src` onto the `dst` hierarchy.
///
/// Works per structural frame in rotation space: for each mapped joint
/// pair the source's animated global rotation is carried across the
/// bind-to-bind relative rotation, then pushed back down into the
/// destination's local frame and emitted as an axis-angle keyframe.
/// The destination hierarchy is re-propagated after every joint so the
/// next pair composes against up-to-date parent totals; pairs are
/// processed parent before child to make that ordering sound.
/// Translation is only transported for the root pair.
pub fn retarget_clip(
    src: &Rig,
    src_clip: &Clip,
    dst: &Rig,
    mapping: &[(String, String)],
) -> Result<Clip, RigError> {
    let src_global_bind = src.global_bind_matrices()?;
    let dst_global_bind = dst.global_bind_matrices()?;

    // The destination rig may carry baked scale; all matching happens
    // against a scale-stripped copy, with its local binds recomputed
    // from the stripped globals.
    let dst_global_scaled: Vec<Mat4> = dst_global_bind.iter().map(|m| m.strip_scale()).collect();
    let mut dst_local_scaled = vec![Mat4::IDENTITY; dst.joint_count()];
    for joint in &dst.joints {
        let ai = dst.array_index(joint.index)?;
        dst_local_scaled[ai] = match joint.parent {
            Some(parent) => {
                let pai = dst.array_index(parent)?;
                dst_global_scaled[pai].inverse_or_max() * dst_global_scaled[ai]
            }
            None => dst_global_scaled[ai],
        };
    }

    let ordered = order_parent_first(src, dst, mapping)?;

    let mut frames = Vec::with_capacity(src_clip.frame_count());
    for f in 0..src_clip.frame_count() {
        let time = src_clip.frame_time(f);
        let src_pose = pose::evaluate(src, src_clip, time)?;

        let mut src_global_anim = vec![Mat4::IDENTITY; src.joint_count()];
        for entry in &src_pose.entries {
            src_global_anim[src.array_index(entry.joint)?] = entry.total;
        }

        let mut dst_local_anim = vec![Mat4::IDENTITY; dst.joint_count()];
        let mut dst_global_anim = propagate(dst, &dst_local_scaled, &dst_local_anim)?;

        let mut keyframes = Vec::with_capacity(ordered.len());
        for &(src_index, dst_index) in &ordered {
            let sai = src.array_index(src_index)?;
            let dai = dst.array_index(dst_index)?;

            let src_gb_rot = src_global_bind[sai].rotation_only();
            let dst_gb_rot = dst_global_scaled[dai].rotation_only();
            let dst_lb_rot = dst_local_scaled[dai].rotation_only();
            let src_ga_rot = src_global_anim[sai].rotation_only();

            let relative = src_gb_rot.inverse_or_max() * dst_gb_rot;
            debug_assert!(
                (src_gb_rot * relative).approx_eq(&dst_gb_rot, 1.0e-4),
                "bind-to-bind relative rotation failed to reproduce the destination bind"
            );

            let dst_anim = src_ga_rot * relative;
            let parent_total_rot = match dst.joint(dst_index)?.parent {
                Some(parent) => dst_global_anim[dst.array_index(parent)?].rotation_only(),
                None => Mat4::IDENTITY,
            };
            let local =
                dst_lb_rot.inverse_or_max() * parent_total_rot.inverse_or_max() * dst_anim;

            let (axis, angle) = local.to_axis_angle();

            let translation = if src.joint(src_index)?.parent.is_none() {
                // Animated root position carried across the relative
                // rotation, minus the destination root's bind position.
                let src_pos = src_global_anim[sai].translation_vec3();
                let delta = relative.transform_point3(src_pos)
                    - dst_global_bind[dai].translation_vec3();
                [delta.x, delta.y, delta.z, 1.0]
            } else {
                [0.0, 0.0, 0.0, 0.0]
            };

            keyframes.push(AnimFrame {
                time,
                joint: dst_index,
                rotation: [axis.x, axis.y, axis.z, angle],
                translation,
                scale: [1.0, 1.0, 1.0, 0.0],
            });

            dst_local_anim[dai] = local;
            dst_global_anim = propagate(dst, &dst_local_scaled, &dst_local_anim)?;
        }

        log::debug!("retargeted frame {f} at t={time:.4}");
        frames.push(keyframes);
    }

    Clip::from_frames(frames)
}

/// Resolves the name pairs to joint indices and sorts them so every
/// parent precedes its descendants in the destination hierarchy.
fn order_parent_first(
    src: &Rig,
    dst: &Rig,
    mapping: &[(String, String)],
) -> Result<Vec<(u32, u32)>, RigError> {
    let depth_of = |mut index: u32| -> Result<u32, RigError> {
        let mut depth = 0;
        while let Some(parent) = dst.joint(index)?.parent {
            depth += 1;
            index = parent;
        }
        Ok(depth)
    };

    let mut ordered = Vec::with_capacity(mapping.len());
    for (src_name, dst_name) in mapping {
        let src_index = src.joint_by_name(src_name)?.index;
        let dst_index = dst.joint_by_name(dst_name)?.index;
        ordered.push((src_index, dst_index, depth_of(dst_index)?));
    }
    ordered.sort_by_key(|&(_, _, depth)| depth);
    Ok(ordered.into_iter().map(|(s, d, _)| (s, d)).collect())
}

/// Global animated transforms for every joint, array-indexed.
fn propagate(
    rig: &Rig,
    local_bind: &[Mat4],
    local_anim: &[Mat4],
) -> Result<Vec<Mat4>, RigError> {
    let mut globals = vec![Mat4::IDENTITY; rig.joint_count()];
    let mut stack = vec![(rig.root_index(), Mat4::IDENTITY)];
    while let Some((index, parent_total)) = stack.pop() {
        let joint = rig.joint(index)?;
        let ai = rig.array_index(index)?;
        let total = parent_total * local_bind[ai] * local_anim[ai];
        globals[ai] = total;
        for &child in &joint.children {
            stack.push((child, total));
        }
    }
    Ok(globals)
}
