//! YM2149 MIDI driver front end
//!
//! Runs the driver against the software bus sequencer, which executes the
//! same timed write program a hardware state machine would, and reports the
//! resulting chip state.

mod args;

use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use ym2149_midi::bus::program::cycles_to_duration;
use ym2149_midi::bus::{BusProgram, PinTrace, ShadowBus, SoftSequencer};
use ym2149_midi::playback::{noise_test_setup, FixedPlayer, Tune};
use ym2149_midi::{ChannelStates, DriverConfig, Engine, NoteEvent, Register, SequencedBus};

use args::{Cli, Command};

type SoftwareBus = ShadowBus<SequencedBus<SoftSequencer<PinTrace>>>;

/// Scripted events for the demo: (source channel, note, velocity), 0 velocity
/// releases.
const DEMO_SCRIPT: &[(u8, u8, u8)] = &[
    (1, 48, 100),
    (2, 55, 90),
    (3, 64, 80),
    (3, 67, 80),
    (3, 67, 0),
    (3, 72, 80),
    (3, 72, 0),
    (3, 64, 0),
    (2, 55, 0),
    (1, 48, 0),
];

/// Frequencies in Hz with lengths in beats; 0 Hz rests.
const DEMO_TUNE: &[(f64, f64)] = &[
    (130.81, 1.0),
    (164.81, 1.0),
    (196.00, 1.0),
    (261.63, 2.0),
    (0.0, 0.5),
    (196.00, 0.5),
    (261.63, 3.0),
];

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let config = cli.driver_config()?;
    match cli.command {
        Command::Demo { step_ms } => run_demo(&config, Duration::from_millis(step_ms)),
        Command::Tune { beat_ms, loops } => {
            run_tune(&config, Duration::from_millis(beat_ms), loops)
        }
        Command::Noise => run_noise(&config),
        Command::Program => {
            print_program(&config);
            Ok(())
        }
    }
}

fn software_bus(config: &DriverConfig) -> SoftwareBus {
    let sequencer =
        SoftSequencer::with_program(PinTrace::new(), BusProgram::ym2149(), config.sequencer_hz);
    ShadowBus::new(SequencedBus::new(sequencer, config.guard_delay()))
}

fn run_demo(config: &DriverConfig, step: Duration) -> Result<()> {
    let bus = software_bus(config);
    let shadow = bus.shadow();
    let engine = Engine::spawn(bus, config)?;

    for &(channel, note, velocity) in DEMO_SCRIPT {
        let event = if velocity == 0 {
            NoteEvent::note_off(channel, note, 0)
        } else {
            NoteEvent::note_on(channel, note, velocity)
        };
        engine.send(event)?;
        thread::sleep(step);
        let regs = *shadow.lock().as_array();
        println!("{event:?}");
        println!("{}\n", ChannelStates::from_registers_with_clock(&regs, config.clock_hz));
    }

    let bus = engine.shutdown()?;
    let regs = *bus.snapshot().as_array();
    let sequenced = bus.into_inner();
    println!(
        "{} register writes, {} pin transitions",
        sequenced.write_count(),
        sequenced.fifo().pins().events().len()
    );
    println!("{}", ChannelStates::from_registers_with_clock(&regs, config.clock_hz));
    if regs[Register::EnvelopeShape.addr() as usize] != 0 {
        bail!("envelope still enabled after every note was released");
    }
    Ok(())
}

fn run_tune(config: &DriverConfig, beat: Duration, loops: u32) -> Result<()> {
    let mut bus = software_bus(config);
    let player = FixedPlayer::new(config.clock_hz)
        .with_beat(beat)
        .with_frequency_multiplier(2.0);
    let tune = Tune::from_pairs(DEMO_TUNE);

    player.setup(&mut bus)?;
    for round in 1..=loops {
        info!("tune pass {round}/{loops}");
        player.play(&mut bus, &tune, thread::sleep)?;
    }

    let regs = *bus.snapshot().as_array();
    println!("{}", ChannelStates::from_registers_with_clock(&regs, config.clock_hz));
    Ok(())
}

fn run_noise(config: &DriverConfig) -> Result<()> {
    let mut bus = software_bus(config);
    noise_test_setup(&mut bus)?;

    let bank = bus.snapshot();
    for reg in Register::ALL {
        println!("{:<28} 0x{:02X}", reg.to_string(), bank.read(reg.addr()));
    }
    Ok(())
}

fn print_program(config: &DriverConfig) {
    let program = BusProgram::ym2149();
    println!("bus program at {} Hz:", config.sequencer_hz);
    for (index, step) in program.steps().iter().enumerate() {
        println!(
            "  {index}: lines {:?} data {:?} for {} cycles ({:?})",
            step.lines,
            step.data,
            step.cycles,
            cycles_to_duration(step.cycles, config.sequencer_hz)
        );
    }
    println!(
        "write: {} cycles ({:?}), guard delay {:?}",
        program.total_cycles(),
        program.write_duration(config.sequencer_hz),
        config.guard_delay()
    );
}
