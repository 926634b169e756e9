//! MLD/SMAF Ringtone Renderer CLI
//!
//! Command-line renderer for ringtone files featuring:
//! - i-melody (MLD) and SMAF (MMF) decoding
//! - FM/ADPCM synthesis through the MA-3 style sampler
//! - Loop-aware rendering with optional normalisation and fade-out
//! - 16-bit stereo WAV output

mod args;
mod logger;
mod player_factory;

use std::time::Instant;

use log::info;
use ma3_replayer::export::export_to_wav;
use ma3_sampler::Sampler;

use args::CliArgs;
use player_factory::{create_player, load_config};

fn main() -> ma3_replayer::Result<()> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    if args.show_help || args.file_path.is_none() {
        CliArgs::print_help();
        return if args.show_help && args.file_path.is_none() {
            Ok(())
        } else {
            Err("Invalid arguments".into())
        };
    }
    logger::init(args.verbosity);

    // Configuration file first, then command-line overrides
    let mut config = load_config(args.config_path.as_deref())?;
    if let Some(rate) = args.sample_rate {
        config.export.sample_rate = rate;
    }
    if let Some(seconds) = args.max_seconds {
        config.export.max_seconds = seconds;
    }
    if let Some(loops) = args.loops {
        config.export.loops = loops;
    }

    let (Some(file_path), Some(output_path)) = (args.file_path.as_deref(), args.output_path())
    else {
        return Err("No input file given".into());
    };

    // Create player instance
    let sampler = Sampler::new(config.sampler)?;
    let mut player_info = create_player(file_path, &sampler, config.export.sample_rate)?;

    // Display file information
    println!("File Information:");
    println!("{}\n", player_info.song_info);
    info!("export settings: {:?}", config.export);

    // Render and write
    let render_start = Instant::now();
    let summary = export_to_wav(player_info.player.as_mut(), &output_path, &config.export)?;
    let elapsed = render_start.elapsed();

    println!("=== Render Statistics ===");
    println!("Output:            {}", output_path.display());
    println!("Audio length:      {:.2} seconds", summary.seconds());
    println!("Sample rate:       {} Hz", summary.sample_rate);
    println!("Render time:       {:.2} seconds", elapsed.as_secs_f32());
    if elapsed.as_secs_f64() > 0.0 {
        println!(
            "Speed:             {:.1}x real time",
            summary.seconds() / elapsed.as_secs_f64()
        );
    }

    Ok(())
}
