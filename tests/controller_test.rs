//! End-to-end controller behaviour over the in-memory transport.

use rig_comm::link::mock::{MockDevice, MockOpener};
use rig_comm::{ConnectionState, DeviceController, LinkError, LinkSettings, TelemetryValue};
use std::io;
use std::time::Duration;

fn setup(ports: &[&str]) -> (DeviceController<MockOpener>, MockOpener, Vec<MockDevice>) {
    let opener = MockOpener::new();
    let devices = ports.iter().map(|name| opener.add_port(name)).collect();
    let settings = LinkSettings::default().with_settle_delay(Duration::ZERO);
    let controller = DeviceController::with_opener(opener.clone(), settings);
    (controller, opener, devices)
}

#[test]
fn test_reconnect_never_holds_two_handles() {
    let (mut controller, opener, devices) = setup(&["/dev/ttyACM0", "/dev/ttyACM1"]);

    controller.connect("/dev/ttyACM0", 115_200).unwrap();
    controller.connect("/dev/ttyACM1", 9_600).unwrap();
    controller.connect("/dev/ttyACM1", 9_600).unwrap();

    assert_eq!(opener.peak_handles(), 1);
    assert_eq!(opener.live_handles(), 1);
    assert!(!devices[0].is_open());
    assert!(devices[1].is_open());
    assert_eq!(controller.port_name(), Some("/dev/ttyACM1"));
    assert_eq!(controller.baud_rate(), Some(9_600));
    assert_eq!(
        opener.opens(),
        vec!["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM1"]
    );
}

#[test]
fn test_failed_connect_leaves_controller_closed() {
    let (mut controller, opener, _devices) = setup(&["COM3", "COM4"]);
    opener.set_busy("COM4", true);

    controller.connect("COM3", 115_200).unwrap();
    let err = controller.connect("COM4", 115_200).unwrap_err();

    match err {
        LinkError::ConnectionFailure { port, .. } => assert_eq!(port, "COM4"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.state(), ConnectionState::Closed);
    assert!(!controller.is_connected());
    assert_eq!(opener.live_handles(), 0);

    let err = controller.connect("COM9", 115_200).unwrap_err();
    assert!(matches!(err, LinkError::ConnectionFailure { .. }));
    assert!(!err.is_link_lost());
}

#[test]
fn test_boot_output_is_discarded_on_connect() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    devices[0].push_bytes(b"\x00\xfe boot v1.2\r\nstale: 1\n");

    controller.connect("COM3", 115_200).unwrap();

    assert_eq!(devices[0].pending(), 0);
    assert!(!controller.poll_once().unwrap());
    assert!(controller.values().is_empty());
}

#[test]
#[allow(clippy::approx_constant)]
fn test_telemetry_stream() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    let device = &devices[0];
    controller.connect("COM3", 115_200).unwrap();

    device.push_line("temp: 26, humidity: 10");
    device.push_line("x: 3.14, y: abc, z:");
    device.push_line("a:1, bcolon");

    let mut lines = 0;
    while controller.poll_once().unwrap() {
        lines += 1;
    }
    assert_eq!(lines, 3);

    assert_eq!(controller.value("temp"), Some(&TelemetryValue::Integer(26)));
    assert_eq!(controller.value("humidity"), Some(&TelemetryValue::Integer(10)));
    assert_eq!(controller.value("x"), Some(&TelemetryValue::Float(3.14)));
    assert_eq!(controller.value("y"), Some(&TelemetryValue::Text("abc".into())));
    assert_eq!(controller.value("z"), Some(&TelemetryValue::Text(String::new())));
    assert_eq!(controller.value("a"), Some(&TelemetryValue::Integer(1)));
    assert_eq!(controller.value("bcolon"), None);
    assert_eq!(controller.last_raw_line(), "a:1, bcolon");
}

#[test]
fn test_repeated_line_is_idempotent() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();

    devices[0].push_line("temp: 26, gate: open");
    controller.poll_once().unwrap();
    let once = controller.values();

    devices[0].push_line("temp: 26, gate: open");
    controller.poll_once().unwrap();
    assert_eq!(controller.values(), once);
}

#[test]
fn test_one_line_per_poll() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    devices[0].push_bytes(b"cars: 1\ncars: 2\n");

    assert!(controller.poll_once().unwrap());
    assert_eq!(controller.value("cars"), Some(&TelemetryValue::Integer(1)));
    assert!(devices[0].pending() > 0);

    assert!(controller.poll_once().unwrap());
    assert_eq!(controller.value("cars"), Some(&TelemetryValue::Integer(2)));
}

#[test]
fn test_partial_line_is_taken_as_is() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    devices[0].push_bytes(b"temp: 2");

    assert!(controller.poll_once().unwrap());
    assert_eq!(controller.last_raw_line(), "temp: 2");
    assert_eq!(controller.value("temp"), Some(&TelemetryValue::Integer(2)));
}

#[test]
fn test_invalid_utf8_is_dropped() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    devices[0].push_bytes(b"\xfftemp: 2\xc3\n");

    assert!(controller.poll_once().unwrap());
    assert_eq!(controller.last_raw_line(), "temp: 2");
}

#[test]
fn test_write_appends_terminator_once() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    let device = &devices[0];
    controller.connect("COM3", 115_200).unwrap();

    controller.write("LED_1_ON").unwrap();
    let bare = device.take_written();
    controller.write("LED_1_ON\n").unwrap();
    let terminated = device.take_written();

    assert_eq!(bare, b"LED_1_ON\n");
    assert_eq!(bare, terminated);
    assert_eq!(device.flushes(), 2);
}

#[test]
fn test_write_while_closed_touches_nothing() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);

    let err = controller.write("BARRIER_OPEN").unwrap_err();
    assert!(matches!(err, LinkError::NotConnected));
    assert!(devices[0].written().is_empty());

    controller.connect("COM3", 115_200).unwrap();
    controller.disconnect();
    controller.disconnect();
    assert!(matches!(
        controller.write("BARRIER_OPEN"),
        Err(LinkError::NotConnected)
    ));
    assert!(devices[0].written().is_empty());
}

#[test]
fn test_read_fault_drops_connection() {
    let (mut controller, opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    devices[0].push_line("temp: 26");
    devices[0].set_read_fault(Some(io::ErrorKind::BrokenPipe));

    let err = controller.poll_once().unwrap_err();
    assert!(matches!(err, LinkError::TransientIo { .. }));
    assert!(err.is_link_lost());
    assert!(!controller.is_connected());
    assert_eq!(opener.live_handles(), 0);
    assert!(matches!(controller.poll_once(), Err(LinkError::NotConnected)));
}

#[test]
fn test_write_fault_drops_connection_and_reconnect_recovers() {
    let (mut controller, opener, devices) = setup(&["COM3"]);
    let device = &devices[0];
    controller.connect("COM3", 115_200).unwrap();
    device.set_write_fault(Some(io::ErrorKind::BrokenPipe));

    assert!(matches!(
        controller.write("MOTOR_FORWARD"),
        Err(LinkError::TransientIo { .. })
    ));
    assert!(!controller.is_connected());
    assert_eq!(controller.state(), ConnectionState::Closed);

    device.set_write_fault(None);
    controller.connect("COM3", 115_200).unwrap();
    controller.write("MOTOR_FORWARD").unwrap();
    assert_eq!(device.written_string(), "MOTOR_FORWARD\n");
    assert_eq!(opener.peak_handles(), 1);
}

#[test]
fn test_readings_survive_disconnect() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    devices[0].push_line("temp: 26");
    controller.poll_once().unwrap();

    controller.disconnect();
    assert_eq!(controller.value("temp"), Some(&TelemetryValue::Integer(26)));
    assert_eq!(controller.last_raw_line(), "temp: 26");
}

#[test]
fn test_drop_releases_port() {
    let (mut controller, opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();
    assert_eq!(opener.live_handles(), 1);

    drop(controller);
    assert_eq!(opener.live_handles(), 0);
    assert!(!devices[0].is_open());
}

#[test]
fn test_overlong_line_leaves_no_phantom_labels() {
    let (mut controller, _opener, devices) = setup(&["COM3"]);
    controller.connect("COM3", 115_200).unwrap();

    // The 1024-byte cap falls inside "humidity".
    let filler = "x".repeat(1024 - "note: ".len() - ", humi".len());
    devices[0].push_line(&format!("note: {}, humidity: 10", filler));
    devices[0].push_line("temp: 26");

    assert!(!controller.poll_once().unwrap());
    assert!(controller.poll_once().unwrap());
    assert!(!controller.poll_once().unwrap());

    assert_eq!(controller.telemetry().labels(), vec!["temp"]);
    assert_eq!(controller.value("dity"), None);
    assert_eq!(controller.value("humidity"), None);
    assert_eq!(controller.last_raw_line(), "temp: 26");
}

#[test]
fn test_reconnect_after_unplug() {
    let (mut controller, opener, devices) = setup(&["COM3"]);
    let device = &devices[0];
    controller.connect("COM3", 115_200).unwrap();
    device.unplug();

    assert!(!controller.is_connected());
    assert!(matches!(controller.poll_once(), Err(LinkError::NotConnected)));
    assert!(matches!(
        controller.connect("COM3", 115_200),
        Err(LinkError::ConnectionFailure { .. })
    ));

    device.replug();
    controller.connect("COM3", 115_200).unwrap();
    assert!(controller.is_connected());
    device.push_line("gate: closed");
    assert!(controller.poll_once().unwrap());
    assert_eq!(
        controller.value("gate"),
        Some(&TelemetryValue::Text("closed".into()))
    );
    assert_eq!(opener.live_handles(), 1);
}

#[test]
fn test_settings_are_kept() {
    let opener = MockOpener::new();
    let settings = LinkSettings::default()
        .with_settle_delay(Duration::ZERO)
        .with_read_timeout(Duration::from_millis(250));
    let controller = DeviceController::with_opener(opener, settings);
    assert_eq!(controller.settings(), &settings);
}
