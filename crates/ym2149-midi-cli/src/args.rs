//! Command-line arguments.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use ym2149_midi::DriverConfig;

#[derive(Parser, Debug)]
#[command(name = "ym2149-midi")]
#[command(version, about = "Drive a YM2149 from note events over a software bus sequencer")]
pub struct Cli {
    /// JSON driver configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Chip master clock in Hz (overrides the configuration)
    #[arg(long, global = true)]
    pub clock: Option<u32>,

    /// Skip the per-write guard delay
    #[arg(long, global = true)]
    pub no_guard: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a scripted note sequence through the voice allocator
    Demo {
        /// Milliseconds between scripted events
        #[arg(long, default_value_t = 120)]
        step_ms: u64,
    },
    /// Play the built-in fixed tune on all three channels
    Tune {
        /// Beat length in milliseconds
        #[arg(long, default_value_t = 250)]
        beat_ms: u64,
        /// Times to repeat the tune
        #[arg(long, default_value_t = 1)]
        loops: u32,
    },
    /// Set up the mixer noise test
    Noise,
    /// Print the bus write program and its timing
    Program,
}

impl Cli {
    /// Resolve the driver configuration from file and flags.
    pub fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => DriverConfig::default(),
        };
        if let Some(clock) = self.clock {
            config = config.clock_hz(clock);
        }
        if self.no_guard {
            config = config.guard_delay_us(0);
        }
        config.validate()?;
        Ok(config)
    }

    /// Log filter for the verbosity flag.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
