use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::reader::{ByteReader, ByteWriter, DecodeError};

/// One keyframe as stored on disk. Rotation is axis-angle packed into a
/// vec4 (xyz axis, w angle); translation and scale only use xyz, the w
/// lane is padding. Kept as plain f32 lanes so the record stays `Pod`
/// with no alignment padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AnimFrame {
    pub time: f32,
    pub joint: u32,
    pub rotation: [f32; 4],
    pub translation: [f32; 4],
    pub scale: [f32; 4],
}

impl AnimFrame {
    pub fn rotation(&self) -> Vec4 {
        Vec4::from_array(self.rotation)
    }

    pub fn translation(&self) -> Vec4 {
        Vec4::from_array(self.translation)
    }

    pub fn scale(&self) -> Vec4 {
        Vec4::from_array(self.scale)
    }
}

pub const FRAME_RECORD_SIZE: usize = std::mem::size_of::<AnimFrame>();

pub fn decode(bytes: &[u8]) -> Result<Vec<Vec<AnimFrame>>, DecodeError> {
    let mut r = ByteReader::new(bytes);
    let frame_count = r.count(4)?;
    let mut frames = Vec::with_capacity(frame_count as usize);
    for _ in 0..frame_count {
        let keyframe_count = r.count(FRAME_RECORD_SIZE)?;
        let mut keyframes = Vec::with_capacity(keyframe_count as usize);
        for _ in 0..keyframe_count {
            keyframes.push(AnimFrame {
                time: r.f32()?,
                joint: r.u32()?,
                rotation: r.vec4()?.to_array(),
                translation: r.vec4()?.to_array(),
                scale: r.vec4()?.to_array(),
            });
        }
        frames.push(keyframes);
    }
    log::debug!("decoded clip: {} frames", frames.len());
    Ok(frames)
}

pub fn encode(frames: &[Vec<AnimFrame>]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(frames.len() as u32);
    for keyframes in frames {
        w.u32(keyframes.len() as u32);
        for kf in keyframes {
            w.f32(kf.time);
            w.u32(kf.joint);
            w.vec4(kf.rotation());
            w.vec4(kf.translation());
            w.vec4(kf.scale());
        }
    }
    w.into_bytes()
}
