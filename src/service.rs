//! Gateway service orchestration.
//!
//! Wires the mailboxes, spawns the actors on the tokio runtime and runs the
//! blocking gateway task until it halts or shutdown is requested.

use crate::actors::{ConsoleSink, DisplayActor, LoggingPins, OutputActor, RECV_TIMEOUT, TerminalActor, ViewTicker, spawn_reader};
use crate::commanders::CommanderRegistry;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::gateway::progress::ProgressView;
use crate::gateway::{GatewayLinks, GatewayState, GatewayTask};
use crate::gsm::{GsmDriver, SerialModem};
use crate::messages::Mailbox;
use crate::storage::JsonFileStore;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const GATEWAY_MAILBOX: usize = 5;
const OUTPUT_MAILBOX: usize = 5;
const TERMINAL_MAILBOX: usize = 10;
const DISPLAY_MAILBOX: usize = 16;
const TICKER_MAILBOX: usize = 5;
const PROGRESS_MAILBOX: usize = 32;

type TerminalIo = (Box<dyn Read + Send>, Box<dyn Write + Send>);

/// Runs one gateway with its actors.
pub struct GatewayService {
    config: GatewayConfig,
}

impl GatewayService {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Forget every enrolled commander.
    pub fn reset_commanders(&self) -> Result<usize> {
        let path = self.config.storage_path();
        let mut registry = CommanderRegistry::new(Box::new(JsonFileStore::new(&path)));
        registry.refresh();
        let removed = registry.len();
        registry.reset()?;
        info!("Removed {removed} commanders from {:?}", path);
        Ok(removed)
    }

    fn open_terminal(&self) -> Result<TerminalIo> {
        match &self.config.terminal.port {
            Some(port_name) => {
                info!("Opening terminal port {} at {} baud", port_name, self.config.terminal.baud_rate);
                let port = serialport::new(port_name, self.config.terminal.baud_rate)
                    .timeout(Duration::from_millis(100))
                    .open()?;
                let reader = port.try_clone()?;
                Ok((Box::new(reader), Box::new(port)))
            }
            None => {
                info!("No terminal port configured, using stdin/stdout");
                Ok((Box::new(std::io::stdin()), Box::new(std::io::stdout())))
            }
        }
    }

    /// Run until shutdown. A halted gateway keeps the actors alive so the
    /// display and terminal stay usable until Ctrl-C.
    pub async fn run(&self, cancel: Arc<AtomicBool>) -> Result<GatewayState> {
        let (gateway, gateway_rx) = Mailbox::channel("gateway", GATEWAY_MAILBOX);
        let (output, output_rx) = Mailbox::channel("output", OUTPUT_MAILBOX);
        let (terminal, terminal_rx) = Mailbox::channel("terminal", TERMINAL_MAILBOX);
        let (display, display_rx) = Mailbox::channel("display", DISPLAY_MAILBOX);
        let (ticker, ticker_rx) = Mailbox::channel("ticker", TICKER_MAILBOX);
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_MAILBOX);

        let (reader, writer) = self.open_terminal()?;
        let (fast, slow) = self.config.view_periods();

        let actors = vec![
            tokio::spawn(DisplayActor::new(ConsoleSink).run(display_rx, cancel.clone())),
            tokio::spawn(
                OutputActor::new(LoggingPins, display.clone(), gateway.clone(), terminal.clone())
                    .run(output_rx, cancel.clone()),
            ),
            tokio::spawn(TerminalActor::new(output.clone(), writer).run(terminal_rx, cancel.clone())),
            tokio::spawn(ViewTicker::new(gateway.clone(), fast, slow).run(ticker_rx, cancel.clone())),
            tokio::spawn(ProgressView::new(display.clone()).run(progress_rx, cancel.clone())),
        ];
        // stdin never returns on cancel, so the reader thread is left detached
        let _reader = spawn_reader(reader, terminal.clone(), cancel.clone());

        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                watcher.store(true, Ordering::Relaxed);
            }
        });

        let modem = SerialModem::new(&self.config.modem.port, self.config.modem.baud_rate)
            .with_power_pulse(Duration::from_millis(self.config.modem.power_pulse_ms));
        let driver = GsmDriver::new(modem)
            .with_timings(self.config.driver_timings())
            .with_progress(progress_tx)
            .with_cancel(cancel.clone());
        let registry = CommanderRegistry::new(Box::new(JsonFileStore::new(self.config.storage_path())));
        let links = GatewayLinks {
            display,
            output,
            terminal,
            ticker,
        };
        let settings = self.config.gateway_settings();
        let task_cancel = cancel.clone();

        info!("Starting gateway on {}", self.config.modem.port);
        // the driver polls the serial line byte by byte
        let state = tokio::task::spawn_blocking(move || {
            let mut task = GatewayTask::new(driver, registry, gateway_rx, links, settings, task_cancel);
            task.run()
        })
        .await?;

        if state == GatewayState::Halted {
            error!("Gateway halted, waiting for shutdown");
            while !cancel.load(Ordering::Relaxed) {
                tokio::time::sleep(RECV_TIMEOUT).await;
            }
        }
        cancel.store(true, Ordering::Relaxed);

        for actor in actors {
            if let Err(e) = actor.await {
                warn!("Actor ended abnormally: {e}");
            }
        }
        info!("Gateway stopped in state {state:?}");
        Ok(state)
    }
}
