use std::env;
use std::fs;

use serde::Deserialize;

use fastball_engine::game::clip::Clip;
use fastball_engine::game::retarget::retarget_clip;
use fastball_engine::game::rig::Rig;
use fastball_engine::resource_system::file_formats::{clipfile, rigfile};
use fastball_engine::resource_system::loader::{BlobLoader, FsLoader};

#[derive(Deserialize)]
struct MappingEntry {
    name: String,
    joint: String,
}

#[derive(Deserialize)]
struct MappingFile {
    #[serde(rename = "JointMapping")]
    joint_mapping: Vec<MappingEntry>,
}

fn load_rig(loader: &FsLoader, path: &str) -> Result<Rig, Box<dyn std::error::Error>> {
    let rig = Rig::from_file(rigfile::decode(&loader.load_blob(path)?)?)?;
    rig.verify_bind_consistency()?;
    Ok(rig)
}

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let [src_rig_path, src_clip_path, dst_rig_path, mapping_path, output_path] =
        match args.get(1..6) {
            Some([a, b, c, d, e]) => [a, b, c, d, e],
            _ => {
                eprintln!(
                    "usage: retarget_anim <src.rig> <src.clip> <dst.rig> <mapping.json> <out.clip>"
                );
                std::process::exit(2);
            }
        };

    let loader = FsLoader::new(".");

    let src_rig = load_rig(&loader, src_rig_path)?;
    let dst_rig = load_rig(&loader, dst_rig_path)?;
    let src_clip = Clip::from_frames(clipfile::decode(&loader.load_blob(src_clip_path)?)?)?;
    log::info!(
        "retargeting {} frames from \"{}\" ({} joints) onto \"{}\" ({} joints)",
        src_clip.frame_count(),
        src_rig_path,
        src_rig.joint_count(),
        dst_rig_path,
        dst_rig.joint_count()
    );

    let mapping_file: MappingFile = serde_json::from_slice(&loader.load_blob(mapping_path)?)?;
    let mapping: Vec<(String, String)> = mapping_file
        .joint_mapping
        .into_iter()
        .map(|entry| (entry.name, entry.joint))
        .collect();

    let dst_clip = retarget_clip(&src_rig, &src_clip, &dst_rig, &mapping)?;
    fs::write(output_path, clipfile::encode(&dst_clip.frames))?;
    log::info!("wrote {}", output_path);

    Ok(())
}
