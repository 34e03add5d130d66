//! Gateway scenarios against the scripted modem.

use super::{GatewayLinks, GatewaySettings, GatewayState, GatewayTask};
use crate::commanders::CommanderRegistry;
use crate::gsm::GsmDriver;
use crate::gsm::scripted::ScriptedModem;
use crate::literals::{display, sms};
use crate::messages::{
    DisplayKind, DisplayMessage, GatewayMessage, Mailbox, OutputMessage, ShortText, TerminalMessage, TickerCommand,
};
use crate::sms_commands::list_of_commands;
use crate::storage::MemoryStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const SUPREME: &str = "+420111222333";
const OPERATOR: &str = "+420444555666";
const STRANGER: &str = "+420777888999";

type Finished = (GatewayState, GatewayTask<ScriptedModem>);

struct Rig {
    modem: ScriptedModem,
    inbox: Mailbox<GatewayMessage>,
    display: mpsc::Receiver<DisplayMessage>,
    output: mpsc::Receiver<OutputMessage>,
    terminal: mpsc::Receiver<TerminalMessage>,
    _ticker: mpsc::Receiver<TickerCommand>,
    shown: Vec<DisplayMessage>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<Finished>>,
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

impl Rig {
    fn start(modem: ScriptedModem, store: MemoryStore) -> Self {
        Self::start_with(modem, store, GatewaySettings::default())
    }

    fn start_with(modem: ScriptedModem, store: MemoryStore, settings: GatewaySettings) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (inbox, inbox_rx) = Mailbox::channel("gateway", 16);
        let (display, display_rx) = Mailbox::channel("display", 512);
        let (output, output_rx) = Mailbox::channel("output", 16);
        let (terminal, terminal_rx) = Mailbox::channel("terminal", 16);
        let (ticker, ticker_rx) = Mailbox::channel("ticker", 512);

        let driver = GsmDriver::new(modem.clone()).with_cancel(cancel.clone());
        let registry = CommanderRegistry::new(Box::new(store));
        let links = GatewayLinks {
            display,
            output,
            terminal,
            ticker,
        };
        let mut task = GatewayTask::new(driver, registry, inbox_rx, links, settings, cancel.clone());
        let handle = std::thread::spawn(move || {
            let state = task.run();
            (state, task)
        });

        Self {
            modem,
            inbox,
            display: display_rx,
            output: output_rx,
            terminal: terminal_rx,
            _ticker: ticker_rx,
            shown: Vec::new(),
            cancel,
            handle: Some(handle),
        }
    }

    fn collect_display(&mut self) {
        while let Ok(message) = self.display.try_recv() {
            self.shown.push(message);
        }
    }

    fn inits_seen(&self) -> usize {
        self.shown.iter().filter(|m| m.kind == DisplayKind::Init).count()
    }

    /// Wait until the gateway has started its view cycle `count` times.
    fn wait_for_view(&mut self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            self.collect_display();
            if self.inits_seen() >= count {
                return;
            }
            assert!(Instant::now() < deadline, "gateway never reached viewing");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn status_lines(&mut self) -> Vec<String> {
        self.collect_display();
        self.shown
            .iter()
            .filter(|m| m.kind == DisplayKind::Status)
            .map(|m| m.text.as_str().to_string())
            .collect()
    }

    fn wait_for_sms(&self, count: usize) -> Vec<(String, String)> {
        wait_until("SMS replies", || self.modem.sent_sms().len() >= count);
        self.modem.sent_sms()
    }

    fn stop(mut self) -> Finished {
        self.cancel.store(true, Ordering::Relaxed);
        self.handle.take().unwrap().join().unwrap()
    }

    fn join(mut self) -> Finished {
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn incoming_sms(modem: &ScriptedModem, index: u32, sender: &str, body: &str) {
    modem.respond(
        &format!("AT+CMGR={index}"),
        &format!("\r\n+CMGR: \"REC UNREAD\",\"{sender}\",\"\",\"24/05/17,10:15:00+08\"\r\n{body}\r\n\r\nOK\r\n"),
    );
    modem.inject(&format!("\r\n+CMTI: \"SM\",{index}\r\n"));
}

fn incoming_call(modem: &ScriptedModem, caller: &str) {
    modem.inject(&format!("\r\nRING\r\n\r\n+CLIP: \"{caller}\",145,\"\",0,\"\",0\r\n"));
}

#[test]
fn test_boot_reaches_viewing() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    let lines = rig.status_lines();
    assert_eq!(lines, [display::GSM_OK, display::SIM_OK, display::PIN_OK, display::CALLER_ID_OK]);

    let commands = rig.modem.commands();
    let sim_checks = ["AT+CCID", "AT+CPIN?", "AT+CLIP=1", "AT+CMGD=1,4", "AT+CREG?"];
    let positions: Vec<usize> = sim_checks
        .iter()
        .map(|c| commands.iter().position(|x| x == c).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let (state, task) = rig.stop();
    assert_eq!(state, GatewayState::Stopped);
    assert!(!task.is_learning());
}

#[test]
fn test_first_caller_becomes_supreme() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::new());
    rig.wait_for_view(1);

    incoming_call(&rig.modem, SUPREME);
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent, [(SUPREME.to_string(), sms::REGISTRATION_ACCEPTED.to_string())]);
    assert!(rig.modem.commands().contains(&"ATH".to_string()));

    let lines = rig.status_lines();
    assert!(lines.iter().any(|l| l == display::MASTER));

    let (_, task) = rig.stop();
    assert_eq!(task.registry().commanders(), [SUPREME]);
    assert!(task.registry().is_supreme(SUPREME));
    assert!(!task.is_learning());
}

#[test]
fn test_full_registry_refuses_caller() {
    let numbers = ["1", "2", "3", "4", "5"];
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&numbers));
    rig.wait_for_view(1);

    incoming_call(&rig.modem, STRANGER);
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent, [(STRANGER.to_string(), sms::FULL.to_string())]);

    let (_, task) = rig.stop();
    assert_eq!(task.registry().len(), 5);
}

#[test]
fn test_enrollment_can_require_learning() {
    let settings = GatewaySettings {
        enroll_requires_learning: true,
        ..GatewaySettings::default()
    };
    let mut rig = Rig::start_with(
        ScriptedModem::healthy(),
        MemoryStore::with_numbers(&[SUPREME]),
        settings,
    );
    rig.wait_for_view(1);

    incoming_call(&rig.modem, STRANGER);
    wait_until("hang up", || rig.modem.count_commands("ATH") >= 1);
    // a known sms round trip proves the call was fully handled
    incoming_sms(&rig.modem, 1, SUPREME, "STATE");
    let sent = rig.wait_for_sms(1);
    assert!(sent.iter().all(|(to, _)| to == SUPREME));

    let (_, task) = rig.stop();
    assert_eq!(task.registry().commanders(), [SUPREME]);
}

#[test]
fn test_output_command_from_commander() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME, OPERATOR]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 3, OPERATOR, "2 OFF");
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent, [(OPERATOR.to_string(), sms::ACCEPTED.to_string())]);

    assert_eq!(
        rig.output.try_recv().unwrap(),
        OutputMessage::WriteOne { pin: 17, on: false }
    );
    assert!(rig.modem.commands().contains(&"AT+CMGD=3".to_string()));
    rig.stop();
}

#[test]
fn test_all_off_command() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 1, SUPREME, "all off please");
    rig.wait_for_sms(1);
    assert_eq!(rig.output.try_recv().unwrap(), OutputMessage::WriteAllOff);
    rig.stop();
}

#[test]
fn test_admin_command_from_operator_gets_help() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME, OPERATOR]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 2, OPERATOR, "ADD");
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent, [(OPERATOR.to_string(), sms::help(&list_of_commands()))]);

    let (_, task) = rig.stop();
    assert_eq!(task.registry().len(), 2);
    assert!(!task.is_learning());
}

#[test]
fn test_add_from_supreme_starts_learning() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 1, SUPREME, "add");
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent[0].1, sms::ADD);

    let (_, task) = rig.stop();
    assert!(task.is_learning());
}

#[test]
fn test_list_and_unknown_text() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME, OPERATOR]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 1, SUPREME, "LIST");
    let sent = rig.wait_for_sms(1);
    assert_eq!(
        sent[0].1,
        sms::operators(&format!("1: {SUPREME}\n2: {OPERATOR}\n"))
    );

    incoming_sms(&rig.modem, 2, OPERATOR, "open sesame");
    let sent = rig.wait_for_sms(2);
    assert_eq!(sent[1].1, sms::help(&list_of_commands()));
    rig.stop();
}

#[test]
fn test_state_reports_last_output() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    rig.inbox.post(GatewayMessage::State(ShortText::new("O: 1------")));
    // the loop drains one inbox message per poll
    std::thread::sleep(Duration::from_millis(50));

    incoming_sms(&rig.modem, 1, SUPREME, "state");
    let sent = rig.wait_for_sms(1);
    assert_eq!(sent[0].1, sms::state("O: 1------"));
    rig.stop();
}

#[test]
fn test_sms_from_stranger_ignored_but_deleted() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    incoming_sms(&rig.modem, 4, STRANGER, "1 ON");
    wait_until("SMS deleted", || rig.modem.count_commands("AT+CMGD=4") == 1);
    assert!(rig.modem.sent_sms().is_empty());
    assert!(rig.output.try_recv().is_err());
    rig.stop();
}

#[test]
fn test_rtc_view_step_sets_terminal_clock() {
    let mut rig = Rig::start(ScriptedModem::healthy(), MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    rig.inbox.post(GatewayMessage::View(2));
    wait_until("terminal clock", || {
        matches!(rig.terminal.try_recv(), Ok(TerminalMessage::RtcSet(_)))
    });

    rig.collect_display();
    let time = rig
        .shown
        .iter()
        .find(|m| m.kind == DisplayKind::Time)
        .map(|m| m.text.as_str().to_string());
    assert_eq!(time.as_deref(), Some("08:15 GSM  "));
    rig.stop();
}

#[test]
fn test_repeated_failures_restart_modem() {
    let modem = ScriptedModem::healthy();
    let mut rig = Rig::start(modem, MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    rig.modem.silence("AT+COPS?");
    for _ in 0..5 {
        rig.inbox.post(GatewayMessage::View(0));
    }
    wait_until("second boot", || rig.modem.count_commands("ATE0") >= 2);
    rig.wait_for_view(2);

    let (state, _) = rig.stop();
    assert_eq!(state, GatewayState::Stopped);
}

#[test]
fn test_sms_clear_failure_still_boots() {
    let modem = ScriptedModem::healthy();
    modem.respond("AT+CMGD=1,4", "\r\nERROR\r\n");
    let mut rig = Rig::start(modem, MemoryStore::with_numbers(&[SUPREME]));
    rig.wait_for_view(1);

    assert!(rig.modem.commands().contains(&"AT+CMGD=1,4".to_string()));
    let (state, _) = rig.stop();
    assert_eq!(state, GatewayState::Stopped);
}

#[test]
fn test_pin_lock_halts() {
    let modem = ScriptedModem::healthy();
    modem.respond("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
    let mut rig = Rig::start(modem, MemoryStore::new());

    let (state, task) = rig.handle.take().unwrap().join().unwrap();
    assert_eq!(state, GatewayState::Halted);
    assert_eq!(task.state(), GatewayState::Halted);
    assert!(rig.status_lines().iter().any(|l| l == display::PIN_ERROR));
    assert_eq!(rig.modem.count_commands("AT+CLIP"), 0);
}

#[test]
fn test_unregistered_network_halts() {
    let modem = ScriptedModem::healthy();
    modem.respond("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
    let rig = Rig::start(modem, MemoryStore::new());

    let (state, _) = rig.join();
    assert_eq!(state, GatewayState::Halted);
}
