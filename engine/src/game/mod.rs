pub mod clip;
pub mod pose;
pub mod retarget;
pub mod rig;
pub mod scene;
