//! Single-writer execution context.
//!
//! The engine thread owns the dispatcher, and with it the bus and the release
//! timers. Note events are queued to it over a channel and handled strictly
//! in arrival order; release timers are fired from the same loop between
//! events, so bus writes from a timer and from a live note never interleave.
//!
//! A bus fault stops the loop. Later sends fail with
//! [`DriverError::EngineStopped`] and [`EngineHandle::shutdown`] returns the
//! fault.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{error, info};

use crate::bus::RegisterBus;
use crate::config::DriverConfig;
use crate::dispatch::{EventDispatcher, NoteEvent};
use crate::{DriverError, Result};

enum Command {
    Event(NoteEvent),
    Shutdown,
}

/// Spawns the engine thread.
pub struct Engine;

impl Engine {
    /// Initialise the chip on `bus` and start handling events on a new thread.
    ///
    /// The startup sequence runs before this returns, so a bus that faults
    /// during initialisation is reported here.
    pub fn spawn<B: RegisterBus + 'static>(
        bus: B,
        config: &DriverConfig,
    ) -> Result<EngineHandle<B>> {
        config.validate()?;
        let mut dispatcher = EventDispatcher::new(bus, config);
        dispatcher.startup()?;

        let (sender, receiver) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let worker = thread::Builder::new()
            .name("ym2149-engine".into())
            .spawn(move || {
                let result = run_event_loop(&mut dispatcher, &receiver);
                running_clone.store(false, Ordering::Relaxed);
                match result {
                    Ok(()) => Ok(dispatcher.into_allocator().into_bus()),
                    Err(e) => {
                        error!("engine halted: {e}");
                        Err(e)
                    }
                }
            })?;

        info!("engine started");
        Ok(EngineHandle {
            sender,
            worker,
            running,
        })
    }
}

/// Handle to a running engine.
pub struct EngineHandle<B: RegisterBus> {
    sender: Sender<Command>,
    worker: JoinHandle<Result<B>>,
    running: Arc<AtomicBool>,
}

impl<B: RegisterBus> EngineHandle<B> {
    /// Queue an event. Events take effect in the order they are sent.
    pub fn send(&self, event: NoteEvent) -> Result<()> {
        if !self.is_running() {
            return Err(DriverError::EngineStopped);
        }
        self.sender
            .send(Command::Event(event))
            .map_err(|_| DriverError::EngineStopped)
    }

    /// Queue a note-on (1-based source channel).
    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(NoteEvent::note_on(channel, note, velocity))
    }

    /// Queue a note-off (1-based source channel).
    pub fn note_off(&self, channel: u8, note: u8) -> Result<()> {
        self.send(NoteEvent::note_off(channel, note, 0))
    }

    /// Whether the engine is still accepting events.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Handle every queued event, let pending releases expire, stop the
    /// thread and hand back the bus.
    pub fn shutdown(self) -> Result<B> {
        // The worker may already have stopped on a fault; its result says why.
        let _ = self.sender.send(Command::Shutdown);
        let result = self
            .worker
            .join()
            .map_err(|_| DriverError::Other("engine thread panicked".into()))?;
        info!("engine stopped");
        result
    }
}

fn run_event_loop<B: RegisterBus>(
    dispatcher: &mut EventDispatcher<B>,
    receiver: &Receiver<Command>,
) -> Result<()> {
    loop {
        dispatcher.poll_timers(Instant::now())?;

        let command = match dispatcher.allocator().time_until_next(Instant::now()) {
            Some(wait) => match receiver.recv_timeout(wait) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => Command::Shutdown,
            },
            None => receiver.recv().unwrap_or(Command::Shutdown),
        };

        match command {
            Command::Event(event) => dispatcher.dispatch(event, Instant::now())?,
            Command::Shutdown => break,
        }
    }

    // Let released channels ring out so the chip is left silent.
    while let Some(wait) = dispatcher.allocator().time_until_next(Instant::now()) {
        thread::sleep(wait);
        dispatcher.poll_timers(Instant::now())?;
    }
    Ok(())
}
