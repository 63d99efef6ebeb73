//! rodio playback resource
//!
//! The output stream must stay on the thread that opened it, so each
//! resource owns a dedicated audio thread. The coordinator side talks to it
//! over a command channel; the thread reports back through the session
//! mailbox. A fresh `Sink` is built for every prepare.

use crate::error::{Error, Result};
use crate::playback::decoder::{PlaybackResource, ResourceFactory};
use crate::playback::messages::{DecoderEvent, LoadToken, Mailbox};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const TICK_MS: u64 = 100;

enum AudioCommand {
    Prepare {
        token: LoadToken,
        source: String,
        start_ms: u64,
    },
    Play,
    Pause,
    Seek {
        token: LoadToken,
        position_ms: u64,
    },
    SetVolume(f32),
    Stop,
    Shutdown,
}

/// Creates one audio thread per resource
#[derive(Debug, Default)]
pub struct RodioFactory;

impl ResourceFactory for RodioFactory {
    fn create(&mut self, mailbox: Mailbox) -> Result<Box<dyn PlaybackResource>> {
        Ok(Box::new(RodioResource::spawn(mailbox)?))
    }
}

pub struct RodioResource {
    tx: Sender<AudioCommand>,
    position_ms: Arc<AtomicU64>,
}

impl RodioResource {
    /// Start the audio thread and wait for the output stream to open
    pub fn spawn(mailbox: Mailbox) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), String>>(1);
        let position_ms = Arc::new(AtomicU64::new(0));
        let position = Arc::clone(&position_ms);

        std::thread::Builder::new()
            .name("lyre-audio".to_string())
            .spawn(move || {
                let stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                AudioThread::new(stream, mailbox, position).run(rx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio output opened");
                Ok(Self { tx, position_ms })
            }
            Ok(Err(e)) => Err(Error::AudioOutput(format!("Failed to open output stream: {}", e))),
            Err(_) => Err(Error::AudioOutput("Audio thread exited during startup".to_string())),
        }
    }

    fn send(&self, command: AudioCommand) {
        if self.tx.send(command).is_err() {
            warn!("Audio thread is gone, command dropped");
        }
    }
}

impl PlaybackResource for RodioResource {
    fn prepare(&mut self, token: LoadToken, source: &str, start_ms: u64) {
        self.position_ms.store(start_ms, Ordering::Relaxed);
        self.send(AudioCommand::Prepare {
            token,
            source: source.to_string(),
            start_ms,
        });
    }

    fn play(&mut self) {
        self.send(AudioCommand::Play);
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn seek(&mut self, token: LoadToken, position_ms: u64) {
        self.send(AudioCommand::Seek { token, position_ms });
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetVolume(volume));
    }

    fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.send(AudioCommand::Stop);
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        let _ = self.tx.send(AudioCommand::Shutdown);
    }
}

/// Loaded source on the audio thread
struct Loaded {
    token: LoadToken,
    sink: Sink,
    started: bool,
    finished: bool,
}

struct AudioThread {
    // Keep the stream alive for the lifetime of the thread
    stream: OutputStream,
    mailbox: Mailbox,
    position_ms: Arc<AtomicU64>,
    volume: f32,
    loaded: Option<Loaded>,
}

impl AudioThread {
    fn new(stream: OutputStream, mailbox: Mailbox, position_ms: Arc<AtomicU64>) -> Self {
        Self {
            stream,
            mailbox,
            position_ms,
            volume: 1.0,
            loaded: None,
        }
    }

    fn run(mut self, rx: Receiver<AudioCommand>) {
        let tick = Duration::from_millis(TICK_MS);
        loop {
            match rx.recv_timeout(tick) {
                Ok(AudioCommand::Shutdown) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick();
        }
        self.unload();
        debug!("Audio thread finished");
    }

    fn handle(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Prepare {
                token,
                source,
                start_ms,
            } => {
                self.unload();
                match self.open(&source, start_ms) {
                    Ok(sink) => {
                        self.loaded = Some(Loaded {
                            token,
                            sink,
                            started: false,
                            finished: false,
                        });
                        self.mailbox.decoder(DecoderEvent::Prepared { token });
                    }
                    Err(message) => {
                        warn!("Failed to prepare {}: {}", source, message);
                        self.mailbox.decoder(DecoderEvent::Error { token, message });
                    }
                }
            }
            AudioCommand::Play => {
                if let Some(loaded) = self.loaded.as_mut() {
                    loaded.sink.play();
                    loaded.started = true;
                }
            }
            AudioCommand::Pause => {
                if let Some(loaded) = &self.loaded {
                    loaded.sink.pause();
                }
            }
            AudioCommand::Seek { token, position_ms } => {
                let Some(loaded) = self.loaded.as_ref().filter(|l| l.token == token) else {
                    return;
                };
                match loaded.sink.try_seek(Duration::from_millis(position_ms)) {
                    Ok(()) => {
                        self.position_ms.store(position_ms, Ordering::Relaxed);
                        self.mailbox
                            .decoder(DecoderEvent::SeekCompleted { token, position_ms });
                    }
                    Err(e) => {
                        self.mailbox.decoder(DecoderEvent::Error {
                            token,
                            message: format!("Seek failed: {}", e),
                        });
                    }
                }
            }
            AudioCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
                if let Some(loaded) = &self.loaded {
                    loaded.sink.set_volume(self.volume);
                }
            }
            AudioCommand::Stop => self.unload(),
            AudioCommand::Shutdown => {}
        }
    }

    fn open(&self, source: &str, start_ms: u64) -> std::result::Result<Sink, String> {
        let file = File::open(source).map_err(|e| format!("Failed to open file: {}", e))?;
        let decoder =
            Decoder::new(BufReader::new(file)).map_err(|e| format!("Decode failed: {}", e))?;

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(decoder);

        if start_ms > 0 {
            sink.try_seek(Duration::from_millis(start_ms))
                .map_err(|e| format!("Seek to start position failed: {}", e))?;
        }
        Ok(sink)
    }

    fn tick(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if !loaded.started || loaded.finished {
            return;
        }

        self.position_ms
            .store(loaded.sink.get_pos().as_millis() as u64, Ordering::Relaxed);

        if loaded.sink.empty() {
            loaded.finished = true;
            self.mailbox
                .decoder(DecoderEvent::Completed { token: loaded.token });
        }
    }

    fn unload(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            loaded.sink.stop();
        }
    }
}
