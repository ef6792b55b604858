//! Overdrive - nonlinear circuit stage as a PCM filter
//!
//! Streams raw mono f32 little-endian audio from stdin to stdout.
//!
//! # Usage
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - | overdrive triode --drive 0.5 --level 0.1 | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```

use clap::Parser;
use overdrive_core::{audio::process_audio, error::Result, StageKind, DEFAULT_SAMPLE_RATE};

/// Real-time overdrive circuit stage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Circuit stage to run
    #[arg(value_enum, value_name = "STAGE")]
    stage: StageKind,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: f64,

    /// Gain applied to the input before the stage
    #[arg(short, long, default_value_t = 1.0)]
    drive: f64,

    /// Gain applied to the stage output
    #[arg(short, long, default_value_t = 1.0)]
    level: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut stage = args.stage.build(args.sample_rate)?;
    log::info!(
        "running {} stage at {} Hz (drive {}, level {})",
        args.stage,
        args.sample_rate,
        args.drive,
        args.level
    );

    let samples = process_audio(stage.as_mut(), args.drive, args.level)?;
    log::info!("processed {samples} samples");

    Ok(())
}
