use argh::FromArgs;
use std::{path::PathBuf, time::Duration};

use omniphotos::dataset::{
    discovery,
    loader::{DatasetLoader, LoadState},
    prompt::FixedAnswer,
    Settings,
};

#[derive(FromArgs)]
/// List the preprocessed datasets below a folder and load one in the background
struct Args {
    /// folder holding one sub-folder per dataset
    #[argh(positional)]
    root: PathBuf,

    /// index of the dataset to load
    #[argh(option, short = 'i', default = "0")]
    index: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let datasets = discovery::scan_datasets(&args.root)?;
    for (i, info) in datasets.iter().enumerate() {
        let thumbnail = info
            .thumbnail
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("[{}] {} ({}) thumbnail: {}", i, info.name, info.cache_folder.display(), thumbnail);
    }

    let Some(info) = datasets.get(args.index) else {
        println!("No dataset with index {}", args.index);
        return Ok(());
    };

    let settings = Settings::from_file(&info.config_path)?;
    let mut loader = DatasetLoader::new();
    loader.request(settings, Box::new(FixedAnswer(false)))?;

    // stand-in for a render loop polling once per frame
    let mut frames = 0;
    while loader.poll() == LoadState::Loading {
        frames += 1;
        std::thread::sleep(Duration::from_millis(16));
    }
    log::info!("Dataset ready after {} frames", frames);

    let Some(result) = loader.take() else {
        return Ok(());
    };
    let dataset = result?;

    println!("Dataset: {}", dataset.name);
    println!("  cameras: {}", dataset.cameras.len());
    println!(
        "  circle: centre {:?}, radius {} cm",
        dataset.circle.centre, dataset.circle.radius
    );
    println!("  up: {:?}", dataset.circle.normal());
    println!("  optical flow: {}", if dataset.has_flow() { "yes" } else { "no" });
    println!(
        "  points: {}",
        dataset.points.as_ref().map_or(0, |points| points.len())
    );

    Ok(())
}
