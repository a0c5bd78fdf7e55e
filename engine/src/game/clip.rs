use crate::game::rig::RigError;
use crate::resource_system::file_formats::clipfile::AnimFrame;

/// Runtime animation clip. `frames[i]` holds every joint keyframe
/// sampled at structural frame `i`; `frames[i][0].time` is that frame's
/// representative time.
#[derive(Debug, Clone)]
pub struct Clip {
    pub frames: Vec<Vec<AnimFrame>>,
}

impl Clip {
    pub fn from_frames(frames: Vec<Vec<AnimFrame>>) -> Result<Self, RigError> {
        if frames.is_empty() || frames.iter().any(|f| f.is_empty()) {
            return Err(RigError::EmptyClip);
        }
        let mut prev = f32::NEG_INFINITY;
        for (i, frame) in frames.iter().enumerate() {
            let t = frame[0].time;
            if t < prev {
                return Err(RigError::UnorderedFrames(i));
            }
            prev = t;
        }
        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_time(&self, i: usize) -> f32 {
        self.frames[i][0].time
    }

    pub fn duration(&self) -> f32 {
        self.frames.last().map(|f| f[0].time).unwrap_or(0.0)
    }

    /// Divides every keyframe time by `speed`. Clips are authored at
    /// 1x; playback speed is baked in once at load.
    pub fn scale_times(&mut self, speed: f32) {
        for frame in &mut self.frames {
            for kf in frame.iter_mut() {
                kf.time /= speed;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn keyframe(
        time: f32,
        joint: u32,
        rotation: [f32; 4],
        translation: [f32; 3],
    ) -> AnimFrame {
        AnimFrame {
            time,
            joint,
            rotation,
            translation: [translation[0], translation[1], translation[2], 0.0],
            scale: [1.0, 1.0, 1.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::keyframe;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_clip_is_rejected() {
        assert!(matches!(
            Clip::from_frames(vec![]),
            Err(RigError::EmptyClip)
        ));
        assert!(matches!(
            Clip::from_frames(vec![vec![]]),
            Err(RigError::EmptyClip)
        ));
    }

    #[test]
    fn unordered_frames_are_rejected() {
        let frames = vec![
            vec![keyframe(1.0, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
            vec![keyframe(0.5, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
        ];
        assert!(matches!(
            Clip::from_frames(frames),
            Err(RigError::UnorderedFrames(1))
        ));
    }

    #[test]
    fn duration_is_last_frame_time() {
        let frames = vec![
            vec![keyframe(0.0, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
            vec![keyframe(2.5, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
        ];
        let clip = Clip::from_frames(frames).unwrap();
        assert_relative_eq!(clip.duration(), 2.5);
    }

    #[test]
    fn scale_times_divides_by_speed() {
        let frames = vec![
            vec![keyframe(0.0, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
            vec![keyframe(4.0, 0, [1.0, 0.0, 0.0, 0.0], [0.0; 3])],
        ];
        let mut clip = Clip::from_frames(frames).unwrap();
        clip.scale_times(2.0);
        assert_relative_eq!(clip.duration(), 2.0);
    }
}
