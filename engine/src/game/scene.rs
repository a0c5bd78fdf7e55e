use std::collections::VecDeque;

use generational_arena::{Arena, Index};
use glam::{Mat4, Quat, Vec3, Vec4};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use crate::game::clip::Clip;
use crate::game::pose::{self, Pose};
use crate::game::rig::{Rig, RigError};
use crate::math::QuatExt;
use crate::resource_system::file_formats::reader::DecodeError;
use crate::resource_system::file_formats::{clipfile, rigfile};
use crate::resource_system::loader::{BlobLoader, LoadError};
use crate::sim::batted_ball::{BattedBallDesc, BattedBallSimulator};
use crate::sim::pitch::{PitchDesc, PitchSimulator};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Rig(#[from] RigError),
    #[error("bad scene manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

fn default_hand_joint() -> String {
    "mixamorig:LeftHand".to_owned()
}

fn default_hips_joint() -> String {
    "mixamorig:Hips".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct CharacterManifest {
    pub name: String,
    pub rig: String,
    pub clip: String,
    pub anim_speed: f32,
    pub position: [f32; 3],
    #[serde(default = "default_hand_joint")]
    pub hand_joint: String,
    #[serde(default = "default_hips_joint")]
    pub hips_joint: String,
}

#[derive(Debug, Deserialize)]
pub struct SceneManifest {
    pub characters: Vec<CharacterManifest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacterId(pub Index);

pub struct Character {
    pub name: String,
    pub rig: Rig,
    pub clip: Clip,
    pub anim_time: f32,
    pub anim_speed: f32,
    /// First slot of this character's skinning matrices in the flat
    /// upload buffer.
    pub matrix_start: usize,
    pub position: Vec3,
    pub hand_joint: String,
    pub hips_joint: String,
    pose: Option<Pose>,
}

impl Character {
    /// Model transform for rendering; the rigs are authored mirrored
    /// and facing +X.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(-std::f32::consts::FRAC_PI_2)
            * Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))
    }

    pub fn pose(&self) -> Option<&Pose> {
        self.pose.as_ref()
    }
}

/// Keyed global orientations for the bat, sampled against the batter's
/// animation clock. Orientation keys are blended as quaternions; the
/// last key holds past the end of the track.
pub struct BatSwingTrack {
    times: Vec<f32>,
    transforms: Vec<Mat4>,
}

impl BatSwingTrack {
    pub fn new(times: Vec<f32>, transforms: Vec<Mat4>) -> Result<Self, RigError> {
        if times.is_empty() || times.len() != transforms.len() {
            return Err(RigError::EmptyClip);
        }
        Ok(Self { times, transforms })
    }

    pub fn sample(&self, time: f32) -> Mat4 {
        let upper = self.times.partition_point(|&t| t <= time);
        if upper >= self.times.len() {
            return self.transforms[self.times.len() - 1];
        }
        let prev = upper.saturating_sub(1);
        let duration = self.times[upper] - self.times[prev];
        let pct = if duration > 0.0 {
            1.0 - (self.times[upper] - time) / duration
        } else {
            1.0
        };

        let q0 = Quat::from_rotation_mat4(&self.transforms[prev]);
        let q1 = Quat::from_rotation_mat4(&self.transforms[upper]);
        Mat4::from_quat(q0.slerp_shortest(q1, pct))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    PitchWindup,
    PitchBallInFlight,
    HitBallInFlight,
}

const POSITION_SCALE: f32 = 10.0;
const WINDUP_RELEASE_SECONDS: f32 = 14.5;
const PLATE_TRIGGER_Z: f32 = -18.0;
const HOME_PLATE: Vec3 = Vec3::new(0.0, 0.0, -18.44);
const RESET_DISTANCE: f32 = 150.0;
const MAX_ROLL_FRAMES: u32 = 100;
const TRAIL_CAP: usize = 128;
const BATTER_SWING_START_SECONDS: f32 = 1.3;

/// Scene glue: character instances, the flat skinning-matrix buffer
/// and the windup / pitch / hit state machine around the two ball
/// simulators.
pub struct Scene {
    characters: Arena<Character>,
    order: Vec<CharacterId>,
    skinning: Vec<Mat4>,

    phase: GamePhase,
    pitch: PitchSimulator,
    batted: BattedBallSimulator,
    ball_position: Vec3,
    ball_axis_angle: Vec4,
    bat_track: Option<BatSwingTrack>,
    trail: VecDeque<Vec3>,
    frame_counter: u64,
    rng: SmallRng,
}

impl Scene {
    pub fn load(loader: &dyn BlobLoader, manifest_path: &str) -> Result<Self, SceneError> {
        let manifest: SceneManifest =
            serde_json::from_slice(&loader.load_blob(manifest_path)?)?;

        let mut characters = Arena::new();
        let mut order = Vec::new();
        let mut matrix_start = 0usize;
        for entry in manifest.characters {
            let rig = Rig::from_file(rigfile::decode(&loader.load_blob(&entry.rig)?)?)?;
            let mut clip = Clip::from_frames(clipfile::decode(&loader.load_blob(&entry.clip)?)?)?;
            clip.scale_times(entry.anim_speed);

            let joint_count = rig.joint_count();
            log::debug!(
                "scene character \"{}\": {} joints, clip {:.2}s",
                entry.name,
                joint_count,
                clip.duration()
            );
            let id = CharacterId(characters.insert(Character {
                name: entry.name,
                rig,
                clip,
                anim_time: 0.0,
                anim_speed: entry.anim_speed,
                matrix_start,
                position: Vec3::from_array(entry.position),
                hand_joint: entry.hand_joint,
                hips_joint: entry.hips_joint,
                pose: None,
            }));
            order.push(id);
            matrix_start += joint_count;
        }

        Ok(Self {
            characters,
            order,
            skinning: vec![Mat4::IDENTITY; matrix_start],
            phase: GamePhase::PitchWindup,
            pitch: PitchSimulator::new(PitchDesc::default()),
            batted: BattedBallSimulator::new(BattedBallDesc::default()),
            ball_position: Vec3::ZERO,
            ball_axis_angle: Vec4::new(1.0, 0.0, 0.0, 0.0),
            bat_track: None,
            trail: VecDeque::with_capacity(TRAIL_CAP),
            frame_counter: 0,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Deterministic swing randomization for replays and tests.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn update(&mut self, dt: f32) -> Result<(), SceneError> {
        self.frame_counter += 1;

        // Advance clocks and refresh poses before any joint queries.
        for &CharacterId(index) in &self.order {
            let character = &mut self.characters[index];
            character.anim_time += dt;
            if character.anim_time > character.clip.duration() {
                character.anim_time = 0.0;
            }
            let pose = pose::evaluate(&character.rig, &character.clip, character.anim_time)?;
            for entry in &pose.entries {
                let ai = character.rig.array_index(entry.joint)?;
                self.skinning[character.matrix_start + ai] = entry.skinning;
            }
            character.pose = Some(pose);
        }

        match self.phase {
            GamePhase::PitchWindup => self.update_windup()?,
            GamePhase::PitchBallInFlight => self.update_pitch(dt),
            GamePhase::HitBallInFlight => self.update_hit(dt)?,
        }
        Ok(())
    }

    fn update_windup(&mut self) -> Result<(), SceneError> {
        let Some(pitcher) = self.character_by_name("pitcher") else {
            return Ok(());
        };
        let pitcher = &self.characters[pitcher.0];
        let Some(pose) = pitcher.pose() else {
            return Ok(());
        };

        // Ball rides in the throwing hand, nudged off the palm.
        let mut jm = pose.joint_matrices(&pitcher.rig, &pitcher.hand_joint)?;
        jm.local_bind.w_axis.z += 0.02;
        self.ball_position = jm.world_position(Mat4::IDENTITY, POSITION_SCALE) + pitcher.position;

        if pitcher.anim_time > WINDUP_RELEASE_SECONDS / pitcher.anim_speed {
            let desc = PitchDesc {
                initial_position: self.ball_position,
                initial_velocity: Vec3::new(0.0, -3.0, -44.7),
                ..PitchDesc::default()
            };
            self.pitch = PitchSimulator::new(desc);
            self.trail.clear();
            self.phase = GamePhase::PitchBallInFlight;
            log::debug!("pitch released at {:?}", self.ball_position);
        }
        Ok(())
    }

    fn update_pitch(&mut self, dt: f32) {
        self.pitch.simulate(dt);
        self.ball_position = self.pitch.position();
        self.ball_axis_angle = self.pitch.axis_angle();

        if self.ball_position.z <= PLATE_TRIGGER_Z {
            let bat_speed = self.rng.gen_range(30.0..60.0);
            let attack_deg = self.rng.gen_range(-60.0..60.0);
            let horizontal_deg = self.rng.gen_range(-45.0..45.0);
            let vertical_offset = self.rng.gen_range(-0.5..0.5);
            let horizontal_offset = self.rng.gen_range(-0.5..0.5);

            let exit = self.batted.compute_exit_params(
                bat_speed,
                attack_deg,
                horizontal_deg,
                vertical_offset,
                horizontal_offset,
            );
            log::debug!(
                "contact: exit {:.1} m/s, launch {:.1} deg",
                exit.speed,
                exit.launch_angle_deg
            );

            let desc = BattedBallDesc {
                initial_position: self.ball_position,
                initial_velocity: exit.velocity,
                spin_axis: exit.spin.normalize_or_zero(),
                spin_rpm: exit.spin.length() * std::f32::consts::PI / 180.0,
                ..BattedBallDesc::default()
            };
            self.batted = BattedBallSimulator::new(desc);
            self.trail.clear();
            self.phase = GamePhase::HitBallInFlight;
        }
    }

    fn update_hit(&mut self, dt: f32) -> Result<(), SceneError> {
        self.batted.simulate(dt);
        self.ball_position = self.batted.position();
        self.ball_axis_angle = self.batted.axis_angle();

        if self.trail.len() < TRAIL_CAP && self.frame_counter % 2 == 0 {
            self.trail.push_back(self.ball_position);
        }

        let distance = (HOME_PLATE - self.ball_position).length();
        if self.batted.has_stopped()
            || self.batted.bounces() >= MAX_ROLL_FRAMES
            || distance >= RESET_DISTANCE
        {
            log::debug!("play over at {distance:.1} m, back to windup");
            self.phase = GamePhase::PitchWindup;
            if let Some(id) = self.character_by_name("pitcher") {
                self.characters[id.0].anim_time = 0.0;
            }
            if let Some(id) = self.character_by_name("batter") {
                self.characters[id.0].anim_time = BATTER_SWING_START_SECONDS;
            }
        }
        Ok(())
    }

    pub fn character_by_name(&self, name: &str) -> Option<CharacterId> {
        self.order
            .iter()
            .copied()
            .find(|&CharacterId(index)| self.characters[index].name == name)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(id.0)
    }

    pub fn characters(&self) -> impl Iterator<Item = (CharacterId, &Character)> {
        self.order
            .iter()
            .map(move |&id| (id, &self.characters[id.0]))
    }

    /// Flat skinning-matrix buffer, every character concatenated, ready
    /// for a single GPU upload.
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn ball_position(&self) -> Vec3 {
        self.ball_position
    }

    pub fn ball_axis_angle(&self) -> Vec4 {
        self.ball_axis_angle
    }

    pub fn ball_trail(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.trail.iter().copied()
    }

    pub fn set_bat_track(&mut self, track: BatSwingTrack) {
        self.bat_track = Some(track);
    }

    /// World transform of the bat: orientation sampled from the swing
    /// track at the batter's clock, translation pinned to the batter's
    /// hand.
    pub fn bat_matrix(&self) -> Result<Option<Mat4>, SceneError> {
        let (Some(track), Some(id)) = (&self.bat_track, self.character_by_name("batter")) else {
            return Ok(None);
        };
        let batter = &self.characters[id.0];
        let Some(hand) = self.hand_position(id)? else {
            return Ok(None);
        };
        let mut m = track.sample(batter.anim_time);
        m.w_axis = hand.extend(1.0);
        Ok(Some(m))
    }

    /// World position of a character's hand joint, for bat placement.
    pub fn hand_position(&self, id: CharacterId) -> Result<Option<Vec3>, SceneError> {
        let Some(character) = self.characters.get(id.0) else {
            return Ok(None);
        };
        let Some(pose) = character.pose() else {
            return Ok(None);
        };
        let jm = pose.joint_matrices(&character.rig, &character.hand_joint)?;
        Ok(Some(
            jm.world_position(Mat4::IDENTITY, POSITION_SCALE) + character.position,
        ))
    }
}
