//! Unit tests for the GSM driver against the scripted modem.

use super::scripted::ScriptedModem;
use super::{GsmDriver, GsmError, ModemProgress, is_service_usable};
use crate::at::ResponseStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

fn driver(modem: &ScriptedModem) -> GsmDriver<ScriptedModem> {
    GsmDriver::new(modem.clone())
}

/// Poll until something other than silence shows up.
fn next_status(driver: &mut GsmDriver<ScriptedModem>) -> ResponseStatus {
    for _ in 0..10 {
        let status = driver.check_status(500).unwrap();
        if status != ResponseStatus::Unknown {
            return status;
        }
    }
    ResponseStatus::Unknown
}

#[test]
fn test_ping() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);
    assert!(gsm.ping().is_ok());
    assert_eq!(modem.commands(), ["AT"]);
}

#[test]
fn test_late_answer_is_a_timeout() {
    let modem = ScriptedModem::healthy();
    // valid answer, but only after the 20 s window
    modem.respond_after("AT+CSQ", "\r\n+CSQ: 20,0\r\n\r\nOK\r\n", 25_000);
    let mut gsm = driver(&modem);

    let err = gsm.signal_quality().unwrap_err();
    assert!(matches!(err, GsmError::Timeout(ResponseStatus::Ok)));
}

#[test]
fn test_write_stall() {
    let modem = ScriptedModem::healthy();
    modem.set_stalled(true);
    let mut gsm = driver(&modem);

    let err = gsm.ping().unwrap_err();
    assert!(matches!(err, GsmError::WriteStall { written: 0, total: 4 }));
    assert!(modem.commands().is_empty());
}

#[test]
fn test_unknown_answer_is_unexpected_status() {
    let modem = ScriptedModem::healthy();
    let noise: String = (0..11).map(|i| format!("noise {i}\r\n")).collect();
    modem.respond("AT+CSQ", &noise);
    let mut gsm = driver(&modem);

    let err = gsm.signal_quality().unwrap_err();
    assert!(matches!(
        err,
        GsmError::UnexpectedStatus {
            expected: ResponseStatus::Ok,
            actual: ResponseStatus::Unknown
        }
    ));
}

#[test]
fn test_init_power_cycles_silent_modem() {
    let modem = ScriptedModem::healthy();
    modem.dead_until_power_cycles(2);
    let (tx, mut rx) = mpsc::channel(256);
    let mut gsm = driver(&modem).with_progress(tx);

    assert!(gsm.init(true).is_ok());
    assert_eq!(modem.power_cycles(), 2);
    assert_eq!(modem.bring_ups(), 1);
    assert!(!gsm.is_echo_on());

    let commands = modem.commands();
    assert!(commands.iter().any(|c| c == "ATE0"));
    assert_eq!(commands.last().map(String::as_str), Some("AT+CGNSPWR=1"));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&ModemProgress::HwInit));
    assert_eq!(events.get(1), Some(&ModemProgress::Wait));
    assert!(events.contains(&ModemProgress::Gnss));
}

#[test]
fn test_init_is_cancellable() {
    let modem = ScriptedModem::new();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut gsm = driver(&modem).with_cancel(cancel.clone());

    let handle = std::thread::spawn(move || gsm.init(false));
    std::thread::sleep(Duration::from_millis(50));
    cancel.store(true, Ordering::Relaxed);

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(GsmError::Cancelled)));
    assert!(modem.power_cycles() > 0);
}

#[test]
fn test_check_status_new_sms() {
    let modem = ScriptedModem::healthy();
    modem.inject("\r\n+CMTI: \"SM\",3\r\n");
    let mut gsm = driver(&modem);

    assert_eq!(next_status(&mut gsm), ResponseStatus::NewSms);
    assert_eq!(gsm.incoming_sms_index(), 3);
    assert_eq!(gsm.last_storage(), "SM");

    // transient fields reset on the next poll
    assert_eq!(gsm.check_status(500).unwrap(), ResponseStatus::Unknown);
    assert_eq!(gsm.incoming_sms_index(), 0);
}

#[test]
fn test_check_status_ring_and_caller_id() {
    let modem = ScriptedModem::healthy();
    modem.inject("\r\nRING\r\n\r\n+CLIP: \"+420111222333\",145,\"\",0,\"\",0\r\n");
    let mut gsm = driver(&modem);

    assert_eq!(next_status(&mut gsm), ResponseStatus::Ring);
    assert_eq!(next_status(&mut gsm), ResponseStatus::CallerId);
    assert_eq!(gsm.last_caller_id(), "+420111222333");
}

#[test]
fn test_check_status_silence() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);
    let before = modem.clock_ms();
    assert_eq!(gsm.check_status(500).unwrap(), ResponseStatus::Unknown);
    assert!(modem.clock_ms() - before >= 500);
}

#[test]
fn test_read_sms() {
    let modem = ScriptedModem::healthy();
    modem.respond(
        "AT+CMGR=3",
        "\r\n+CMGR: \"REC UNREAD\",\"+420111222333\",\"\",\"23/03/04,08:22:23+04\"\r\n2 OFF\r\n\r\nOK\r\n",
    );
    let mut gsm = driver(&modem);

    let sms = gsm.read_sms(3).unwrap();
    assert_eq!(sms.body, "2 OFF");
    assert_eq!(sms.sender, "+420111222333");
    assert_eq!(sms.received.to_string(), "2023-03-04 07:22:23");
    assert_eq!(modem.commands(), ["AT+CMGF=1", "AT+CMGR=3"]);
}

#[test]
fn test_send_sms() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    gsm.send_sms("+420111222333", "Command accepted.").unwrap();
    assert_eq!(
        modem.sent_sms(),
        [("+420111222333".to_string(), "Command accepted.".to_string())]
    );
    assert!(modem.commands().contains(&"AT+CMGS=\"+420111222333\"".to_string()));
}

#[test]
fn test_send_sms_keeps_line_breaks() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    gsm.send_sms("+420111222333", "List of operators: \n1: +420111222333\n").unwrap();
    gsm.ping().unwrap();
    assert_eq!(
        modem.sent_sms(),
        [(
            "+420111222333".to_string(),
            "List of operators: \n1: +420111222333\n".to_string()
        )]
    );
    assert_eq!(modem.commands().last().map(String::as_str), Some("AT"));
}

#[test]
fn test_send_sms_rejects_empty_input() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    assert!(matches!(gsm.send_sms("", "text"), Err(GsmError::InvalidArgument(_))));
    assert!(matches!(gsm.send_sms("+420", ""), Err(GsmError::InvalidArgument(_))));
    assert!(modem.commands().is_empty());
}

#[test]
fn test_send_sms_without_prompt_fails() {
    let modem = ScriptedModem::healthy();
    modem.respond("AT+CMGS=", "\r\nERROR\r\n");
    let mut gsm = GsmDriver::new(modem.clone()).with_timings(super::DriverTimings {
        rx_ms: 1_000,
        ..Default::default()
    });

    assert!(gsm.send_sms("+420111222333", "hello").is_err());
    assert!(modem.sent_sms().is_empty());
}

#[test]
fn test_rtc_answer_does_not_leak_into_next_command() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    let rtc = gsm.read_rtc().unwrap();
    assert_eq!(rtc.to_string(), "2024-05-17 08:15:00");
    assert_eq!(gsm.signal_quality().unwrap(), 20);
}

#[test]
fn test_rtc_with_garbled_zone_is_missing_field() {
    let modem = ScriptedModem::healthy();
    modem.respond(
        "AT+CCLK?",
        "\r\n+CCLK: \"23/03/04,08:22:23+1000000000000000\"\r\n\r\nOK\r\n",
    );
    let mut gsm = driver(&modem);

    assert!(matches!(gsm.read_rtc(), Err(GsmError::MissingField("CCLK"))));
    assert_eq!(gsm.signal_quality().unwrap(), 20);
}

#[test]
fn test_registration_and_signal() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    let stat = gsm.registration().unwrap();
    assert_eq!(stat, 1);
    assert!(is_service_usable(stat));
    assert!(is_service_usable(5));
    assert!(!is_service_usable(2));
    assert_eq!(gsm.signal_quality().unwrap(), 20);
}

#[test]
fn test_sim_queries() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    assert_eq!(gsm.iccid().unwrap(), "89420310200012345678");
    assert!(gsm.pin_not_required().unwrap());
    assert_eq!(gsm.operator().unwrap(), "Vodafone CZ");
    assert_eq!(gsm.number_of_sms().unwrap(), (2, 30));
    assert_eq!(gsm.last_storage(), "SM");

    modem.respond("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
    assert!(!gsm.pin_not_required().unwrap());
}

#[test]
fn test_gnss_info() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    let gnss = gsm.gnss_info().unwrap();
    assert_eq!(gnss.time.to_string(), "2024-05-17 08:15:00");
    assert!(gnss.fix);
}

#[test]
fn test_call_control() {
    let modem = ScriptedModem::healthy();
    let mut gsm = driver(&modem);

    gsm.ring("420111222333").unwrap();
    gsm.answer().unwrap();
    gsm.enable_rtc(true).unwrap();
    assert_eq!(
        modem.commands(),
        ["ATH", "ATD+ 420111222333;", "ATA", "AT+CLTS=1", "AT&W"]
    );
}

#[test]
fn test_progress_on_exchange() {
    let modem = ScriptedModem::healthy();
    let (tx, mut rx) = mpsc::channel(256);
    let mut gsm = driver(&modem).with_progress(tx);

    gsm.ping().unwrap();
    assert_eq!(rx.try_recv().ok(), Some(ModemProgress::Tx));
    assert_eq!(rx.try_recv().ok(), Some(ModemProgress::Rx));
}

#[test]
fn test_echo_and_radio_modes() {
    let modem = ScriptedModem::healthy();
    modem.respond("ATE1", "\r\nOK\r\n");
    modem.respond("AT+CFUN=", "\r\nOK\r\n");
    let mut gsm = driver(&modem);

    gsm.echo_off().unwrap();
    assert!(!gsm.is_echo_on());
    gsm.echo_on().unwrap();
    assert!(gsm.is_echo_on());

    gsm.flight_mode().unwrap();
    modem.respond("AT+CFUN=1", "\r\nOK\r\n\r\nRDY\r\n\r\n+CFUN: 1\r\n");
    gsm.phone_mode().unwrap();
    assert_eq!(gsm.signal_quality().unwrap(), 20);
    assert_eq!(
        modem.commands()[..4],
        ["ATE0", "ATE1", "AT+CFUN=0", "AT+CFUN=1"]
    );
}

#[test]
fn test_full_progress_channel_does_not_block() {
    let modem = ScriptedModem::healthy();
    let (tx, mut rx) = mpsc::channel(1);
    let mut gsm = driver(&modem).with_progress(tx);

    gsm.ping().unwrap();
    gsm.ping().unwrap();
    assert_eq!(rx.try_recv().ok(), Some(ModemProgress::Tx));
    assert!(rx.try_recv().is_err());
}
