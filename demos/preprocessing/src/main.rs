use argh::FromArgs;
use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use omniphotos::dataset::{
    preprocess::{ImageFiles, Preprocessor},
    Prompt, Settings,
};

#[derive(FromArgs)]
/// Fit the capture circle of a reconstruction and write the dataset cache
struct Args {
    /// path to the preprocessing configuration, e.g. Config/<name>-preprocessing.yaml
    #[argh(positional)]
    config_path: PathBuf,

    /// show debug output
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// answer yes to every question
    #[argh(switch, short = 'y')]
    yes: bool,
}

/// Asks on the terminal, or answers yes without asking.
struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    fn read_line(&self, question: &str) -> Option<String> {
        print!("{} ", question);
        std::io::stdout().flush().ok()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        Some(line.trim().to_string())
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        if self.assume_yes {
            log::info!("{} yes", question);
            return true;
        }
        self.read_line(&format!("{} [y/N]", question))
            .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    fn choose_folder(&mut self, title: &str) -> Option<PathBuf> {
        if self.assume_yes {
            return None;
        }
        self.read_line(&format!("{} (empty to give up)", title))
            .filter(|answer| !answer.is_empty())
            .map(PathBuf::from)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = Settings::from_file(&args.config_path)?;
    log::info!("Preprocessing dataset {}", settings.paths().name());

    let mut prompt = TerminalPrompt {
        assume_yes: args.yes,
    };

    // no flow backend is linked into this tool
    let dataset = Preprocessor::new(settings).run(&mut prompt, &mut ImageFiles, None)?;

    println!(
        "Wrote {} cameras to {}",
        dataset.cameras.len(),
        dataset.paths.cache_folder.display()
    );
    println!(
        "Circle radius {} cm, physical scale {}",
        dataset.circle.radius, dataset.physical_scale
    );
    if let Some(points) = &dataset.points {
        println!("Point cloud with {} points", points.len());
    }

    Ok(())
}
