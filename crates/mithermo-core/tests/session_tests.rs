//! Session behaviour against a scripted thermometer.
//!
//! All tests run on paused tokio time, so retry delays, the settle delay and
//! settings timeouts elapse instantly while still being measurable.

use std::sync::Arc;
use std::time::Duration;

use mithermo_core::mock::DEFAULT_SETTINGS_FRAME;
use mithermo_core::{
    AdvertisingType, CharacteristicKind, ConnectionMode, DeviceAddress, DeviceSession, Error,
    MockTransport, ServiceKind, SessionConfig, TransportLock, uuids,
};
use time::OffsetDateTime;
use tokio::time::Instant;

type MockSession = DeviceSession<Arc<MockTransport>>;

fn address() -> DeviceAddress {
    "A4:C1:38:0A:1B:2C".parse().unwrap()
}

fn session(mock: &Arc<MockTransport>, mode: ConnectionMode) -> MockSession {
    DeviceSession::new(address(), Arc::clone(mock), mode).with_lock(TransportLock::new())
}

fn frame_with_advertising_type(kind: AdvertisingType) -> Vec<u8> {
    let mut frame = DEFAULT_SETTINGS_FRAME.to_vec();
    frame[2] = (frame[2] & !0x03) | kind as u8;
    frame
}

fn pvvx_payload(temp_centi: i16, humidity_centi: u16, battery_mv: u16, level: u8) -> Vec<u8> {
    let mut data = vec![18, 0x16, 0x1A, 0x18, 0x2C, 0x1B, 0x0A, 0x38, 0xC1, 0xA4];
    data.extend_from_slice(&temp_centi.to_le_bytes());
    data.extend_from_slice(&humidity_centi.to_le_bytes());
    data.extend_from_slice(&battery_mv.to_le_bytes());
    data.extend_from_slice(&[level, 0x01, 0x05]);
    data
}

fn atc1441_payload(temp_deci: i16, humidity: u8, level: u8, battery_mv: u16) -> Vec<u8> {
    let mut data = vec![0x11, 0x16, 0x1A, 0x18, 0xA4, 0xC1, 0x38, 0x0A, 0x1B, 0x2C];
    data.extend_from_slice(&temp_deci.to_be_bytes());
    data.extend_from_slice(&[humidity, level]);
    data.extend_from_slice(&battery_mv.to_be_bytes());
    data.extend_from_slice(&[0x07, 0x00]);
    data
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

// --- Connection lifecycle ---

#[tokio::test(start_paused = true)]
async fn test_advertising_to_connection_reads_all_four() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);

    session
        .set_connection_mode(ConnectionMode::Connection)
        .await
        .unwrap();

    assert_eq!(session.connection_mode(), ConnectionMode::Connection);
    assert!(session.is_connected().await);
    assert_eq!(mock.connect_count(), 1);
    assert_eq!(mock.read_count(), 4);

    let m = session.measurements();
    assert!(approx(m.temperature, 21.5));
    assert!(approx(m.temperature_precise, 21.47));
    assert!(approx(m.humidity, 55.25));
    assert_eq!(m.battery_level, 87);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_twice_is_safe() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    session.read_all().await.unwrap();
    assert!(session.is_resolved(CharacteristicKind::Humidity));
    assert!(session.is_service_resolved(ServiceKind::Battery));

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();

    assert!(!session.is_connected().await);
    for kind in CharacteristicKind::ALL {
        assert!(!session.is_resolved(kind));
        assert!(!session.is_notifying(kind));
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_replaces_existing_link() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    session.connect().await.unwrap();
    session.ensure_characteristic(CharacteristicKind::Temperature)
        .await
        .unwrap();
    session.connect().await.unwrap();

    assert_eq!(mock.connect_count(), 2);
    assert!(!session.is_resolved(CharacteristicKind::Temperature));
    assert_eq!(mock.last_address(), Some(address()));
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_after_five_attempts() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_should_fail_connect(true);
    let session = session(&mock, ConnectionMode::Connection);

    let start = Instant::now();
    let err = session.connect().await.unwrap_err();

    match err {
        Error::ConnectionFailed { address, attempts } => {
            assert_eq!(address, "A4:C1:38:0A:1B:2C");
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    // four one-second pauses between five attempts
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!session.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_connect_recovers_from_transient_failures() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_connect_failures(2);
    let session = session(&mock, ConnectionMode::Connection);

    session.connect().await.unwrap();
    assert_eq!(mock.connect_count(), 1);
    assert!(session.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_connect_attempts_are_configurable() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_should_fail_connect(true);
    let config = SessionConfig::new().connect_attempts(2);
    let session = DeviceSession::with_config(
        address(),
        Arc::clone(&mock),
        ConnectionMode::Connection,
        config,
    )
    .with_lock(TransportLock::new());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionFailed { attempts: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_connect_retries_when_device_is_not_seen() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_out_of_range(true);
    let session = session(&mock, ConnectionMode::Connection);

    let start = Instant::now();
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, Error::ConnectionFailed { attempts: 5, .. }), "{err}");
    assert_eq!(mock.connect_attempts(), 5);
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(!session.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_connect_succeeds_once_device_wakes_up() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_out_of_range(true);
    let session = session(&mock, ConnectionMode::Connection);

    let waker = {
        let mock = Arc::clone(&mock);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            mock.set_out_of_range(false);
        })
    };

    session.connect().await.unwrap();
    waker.await.unwrap();
    assert!(mock.connect_attempts() >= 2);
    assert_eq!(mock.connect_count(), 1);
}

// --- Handle resolution ---

#[tokio::test(start_paused = true)]
async fn test_missing_service_is_reported_and_not_cached() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.remove_service(uuids::BATTERY_SERVICE);
    let session = session(&mock, ConnectionMode::Connection);

    let err = session.read_all().await.unwrap_err();
    assert!(matches!(err, Error::ServiceNotFound { uuid } if uuid == uuids::BATTERY_SERVICE));
    assert!(err.is_unavailable());
    assert!(!session.is_service_resolved(ServiceKind::Battery));

    // the other three were still read
    assert_eq!(mock.read_count(), 3);
    assert!(approx(session.measurements().humidity, 55.25));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_all_characteristics_reports_first_miss() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.remove_characteristic(uuids::TEMPERATURE);
    let session = session(&mock, ConnectionMode::Connection);
    session.connect().await.unwrap();

    let err = session.resolve_all_characteristics().await.unwrap_err();
    assert!(matches!(err, Error::CharacteristicNotFound { uuid, .. } if uuid == uuids::TEMPERATURE));
    assert!(!session.is_resolved(CharacteristicKind::Temperature));
    assert!(session.is_resolved(CharacteristicKind::TemperaturePrecise));
    assert!(session.is_resolved(CharacteristicKind::Command));
}

// --- Getters ---

#[tokio::test(start_paused = true)]
async fn test_connection_getters_connect_and_read() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    assert!(approx(session.temperature().await, 21.5));
    assert!(session.is_connected().await);
    assert_eq!(mock.read_count(), 1);

    mock.set_value(uuids::HUMIDITY, 4012u16.to_le_bytes().to_vec());
    assert!(approx(session.humidity().await, 40.12));
    assert_eq!(session.battery_level().await, 87);
    assert_eq!(session.battery_voltage().await, 2870);
    assert_eq!(mock.read_count(), 4);
    assert_eq!(mock.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_getter_keeps_last_value_when_read_fails() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    assert_eq!(session.battery_level().await, 87);
    mock.set_value(uuids::BATTERY_LEVEL, Vec::new());
    assert_eq!(session.battery_level().await, 87);
}

#[tokio::test(start_paused = true)]
async fn test_notification_updates_values() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Notification);

    session.init().await.unwrap();
    for kind in CharacteristicKind::DATA {
        assert!(session.is_notifying(kind), "{kind} not notifying");
        assert!(mock.is_subscribed(kind.uuid()));
    }
    assert_eq!(mock.read_count(), 0);

    assert!(mock.notify(uuids::HUMIDITY, &4000u16.to_le_bytes()));
    assert!(mock.notify(uuids::TEMPERATURE_PRECISE, &(-123i16).to_le_bytes()));
    assert!(mock.notify(uuids::BATTERY_LEVEL, &[42]));

    assert!(approx(session.humidity().await, 40.0));
    assert!(approx(session.temperature_precise().await, -1.23));
    assert_eq!(session.battery_level().await, 42);
    assert_eq!(mock.read_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_notification_falls_back_to_reads() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_can_notify(uuids::BATTERY_LEVEL, false);
    let session = session(&mock, ConnectionMode::Notification);

    let err = session.init().await.unwrap_err();
    assert!(matches!(err, Error::NotifyUnsupported { uuid } if uuid == uuids::BATTERY_LEVEL));
    assert!(session.is_notifying(CharacteristicKind::Humidity));
    assert!(!session.is_notifying(CharacteristicKind::BatteryLevel));

    assert_eq!(session.battery_level().await, 87);
    assert_eq!(mock.read_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_notification_to_advertising_unsubscribes() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Notification);
    session.init().await.unwrap();

    session
        .set_connection_mode(ConnectionMode::Advertising)
        .await
        .unwrap();

    assert!(!session.is_connected().await);
    for kind in CharacteristicKind::DATA {
        assert!(!session.is_notifying(kind));
        assert!(!mock.is_subscribed(kind.uuid()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_mode_is_a_no_op() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);

    session
        .set_connection_mode(ConnectionMode::Advertising)
        .await
        .unwrap();

    assert_eq!(mock.connect_attempts(), 0);
    assert!(!session.is_connected().await);
    assert_eq!(session.connection_mode(), ConnectionMode::Advertising);
}

#[tokio::test(start_paused = true)]
async fn test_advertising_to_notification_subscribes() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);

    session
        .set_connection_mode(ConnectionMode::Notification)
        .await
        .unwrap();

    assert_eq!(session.connection_mode(), ConnectionMode::Notification);
    assert!(session.is_connected().await);
    assert_eq!(mock.connect_count(), 1);
    assert_eq!(mock.read_count(), 0);
    for kind in CharacteristicKind::DATA {
        assert!(session.is_notifying(kind), "{kind} not notifying");
        assert!(mock.is_subscribed(kind.uuid()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_connection_to_notification_keeps_link() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);
    session.connect().await.unwrap();

    session
        .set_connection_mode(ConnectionMode::Notification)
        .await
        .unwrap();

    assert_eq!(session.connection_mode(), ConnectionMode::Notification);
    assert!(session.is_connected().await);
    assert_eq!(mock.connect_count(), 1);
    for kind in CharacteristicKind::DATA {
        assert!(mock.is_subscribed(kind.uuid()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_notification_to_connection_unsubscribes_and_reads() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Notification);
    session.init().await.unwrap();
    assert_eq!(mock.read_count(), 0);

    session
        .set_connection_mode(ConnectionMode::Connection)
        .await
        .unwrap();

    assert_eq!(session.connection_mode(), ConnectionMode::Connection);
    assert!(session.is_connected().await);
    assert_eq!(mock.read_count(), 4);
    for kind in CharacteristicKind::DATA {
        assert!(!session.is_notifying(kind));
        assert!(!mock.is_subscribed(kind.uuid()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_connection_to_advertising_releases_link() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);
    session.init().await.unwrap();
    assert!(session.is_connected().await);

    session
        .set_connection_mode(ConnectionMode::Advertising)
        .await
        .unwrap();

    assert_eq!(session.connection_mode(), ConnectionMode::Advertising);
    assert!(!session.is_connected().await);
    for kind in CharacteristicKind::DATA {
        assert!(!session.is_resolved(kind));
        assert!(!mock.is_subscribed(kind.uuid()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_malformed_notification_is_ignored() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Notification);
    session.init().await.unwrap();

    mock.notify(uuids::HUMIDITY, &5000u16.to_le_bytes());
    mock.notify(uuids::HUMIDITY, &[0x01]);
    assert!(approx(session.humidity().await, 50.0));
}

// --- Advertisements ---

#[tokio::test(start_paused = true)]
async fn test_advertising_getters_use_advertisements() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);
    session.init().await.unwrap();
    assert!(!session.is_connected().await);

    session
        .handle_advertisement(&pvvx_payload(2347, 6123, 2950, 91))
        .await
        .unwrap();

    assert!(approx(session.temperature_precise().await, 23.47));
    assert!(approx(session.temperature().await, 23.5));
    assert!(approx(session.humidity().await, 61.23));
    assert_eq!(session.battery_level().await, 91);
    assert_eq!(session.battery_voltage().await, 2950);
    assert_eq!(mock.read_count(), 0);
    assert_eq!(mock.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_atc1441_precise_temperature_falls_back() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_settings_frame(frame_with_advertising_type(AdvertisingType::Atc1441));
    let session = session(&mock, ConnectionMode::Advertising);
    session.init().await.unwrap();

    session
        .handle_advertisement(&atc1441_payload(-35, 48, 77, 2810))
        .await
        .unwrap();

    assert!(approx(session.temperature().await, -3.5));
    assert!(approx(session.temperature_precise().await, -3.5));
    assert!(approx(session.humidity().await, 48.0));
    assert_eq!(session.battery_voltage().await, 2810);
}

#[tokio::test(start_paused = true)]
async fn test_first_advertisement_reads_settings_instead() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);

    session
        .handle_advertisement(&pvvx_payload(2347, 6123, 2950, 91))
        .await
        .unwrap();

    assert!(session.has_read_settings());
    assert_eq!(session.measurements().battery_level, 0);
    assert!(!session.is_connected().await);
    assert_eq!(mock.commands(), vec![vec![0x55]]);

    session
        .handle_advertisement(&pvvx_payload(2347, 6123, 2950, 91))
        .await
        .unwrap();
    assert_eq!(session.measurements().battery_level, 91);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_advertisement_keeps_values() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Advertising);
    session.init().await.unwrap();
    session
        .handle_advertisement(&pvvx_payload(2000, 5000, 3000, 99))
        .await
        .unwrap();

    let mut corrupt = pvvx_payload(9999, 9999, 9999, 1);
    corrupt[2] = 0x1B;
    let err = session.handle_advertisement(&corrupt).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAdvertisement { .. }));
    assert!(session.handle_advertisement(&[0x12, 0x16]).await.is_err());

    let m = session.measurements();
    assert!(approx(m.temperature_precise, 20.0));
    assert_eq!(m.battery_level, 99);
}

#[tokio::test(start_paused = true)]
async fn test_xiaomi_advertisements_are_not_decoded() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_settings_frame(frame_with_advertising_type(AdvertisingType::Xiaomi));
    let session = session(&mock, ConnectionMode::Advertising);
    session.init().await.unwrap();

    assert!(
        session
            .handle_advertisement(&pvvx_payload(2000, 5000, 3000, 99))
            .await
            .is_err()
    );
    assert_eq!(session.measurements().battery_level, 0);
}

// --- Settings ---

#[tokio::test(start_paused = true)]
async fn test_init_reads_settings_once() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    assert!(!session.has_read_settings());
    session.init().await.unwrap();

    assert!(session.has_read_settings());
    assert_eq!(mock.commands(), vec![vec![0x55]]);
    assert!(!mock.is_subscribed(uuids::COMMAND));

    let settings = session.settings().await;
    assert_eq!(settings.advertising_type, AdvertisingType::Pvvx);
    assert!(settings.show_battery);
    assert_eq!(settings.advertising_interval_ms(), 2500);
    assert_eq!(mock.commands().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_settings_timeout_leaves_flag_unset() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_answer_settings(false);
    let session = session(&mock, ConnectionMode::Connection);

    let start = Instant::now();
    let err = session.read_settings().await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert!(!session.has_read_settings());
    assert!(!mock.is_subscribed(uuids::COMMAND));
    // settle delay plus the notification timeout
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_init_retries_settings_with_fresh_links() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_answer_settings(false);
    let config = SessionConfig::new()
        .settings_attempts(3)
        .settings_timeout(Duration::from_secs(1));
    let session = DeviceSession::with_config(
        address(),
        Arc::clone(&mock),
        ConnectionMode::Connection,
        config,
    )
    .with_lock(TransportLock::new());

    let err = session.init().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(mock.connect_count(), 3);
    assert_eq!(mock.commands().len(), 3);
    assert!(!session.has_read_settings());
}

#[tokio::test(start_paused = true)]
async fn test_init_reports_settings_error_when_disconnect_fails() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_answer_settings(false);
    mock.set_fail_disconnect(true);
    let config = SessionConfig::new()
        .settings_attempts(2)
        .settings_timeout(Duration::from_secs(1));
    let session = DeviceSession::with_config(
        address(),
        Arc::clone(&mock),
        ConnectionMode::Connection,
        config,
    )
    .with_lock(TransportLock::new());

    let err = session.init().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err}");
    assert_eq!(mock.commands().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_short_settings_frame_is_ignored() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_settings_frame(DEFAULT_SETTINGS_FRAME[..12].to_vec());
    let session = DeviceSession::with_config(
        address(),
        Arc::clone(&mock),
        ConnectionMode::Connection,
        SessionConfig::new().settings_timeout(Duration::from_secs(1)),
    )
    .with_lock(TransportLock::new());

    assert!(session.read_settings().await.is_err());
    assert!(!session.has_read_settings());
}

#[tokio::test(start_paused = true)]
async fn test_setter_round_trip_adopts_echo() {
    let mut frame = DEFAULT_SETTINGS_FRAME.to_vec();
    frame[11] = 10;
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_settings_frame(frame);
    let session = session(&mock, ConnectionMode::Advertising);

    let settings = session.set_temp_offset(-0.5).await.unwrap();

    assert!(approx(settings.temp_offset, -0.5));
    assert_eq!(settings.hw_version.id(), 10);
    assert!(approx(session.cached_settings().temp_offset, -0.5));

    let commands = mock.commands();
    assert_eq!(commands[0], vec![0x55]);
    assert_eq!(commands[1].len(), 12);
    assert_eq!(commands[1][4], (-5i8) as u8);
    // advertising mode gives the link back
    assert!(!session.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_millisecond_setters_convert_to_steps() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);
    session.init().await.unwrap();

    let settings = session.set_advertising_interval_ms(1000).await.unwrap();
    assert_eq!(settings.advertising_interval, 16);

    let settings = session.set_lcd_update_interval_ms(2000).await.unwrap();
    assert_eq!(settings.lcd_update_interval, 40);

    let settings = session.set_connect_latency_ms(60_000).await.unwrap();
    assert_eq!(settings.connect_latency, 255);

    let settings = session
        .set_advertising_type(AdvertisingType::BtHome)
        .await
        .unwrap();
    assert_eq!(settings.advertising_type, AdvertisingType::BtHome);
    assert_eq!(settings.advertising_interval, 16);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_setter_sends_nothing() {
    let mut frame = DEFAULT_SETTINGS_FRAME.to_vec();
    frame[6] = 0;
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_settings_frame(frame);
    let session = session(&mock, ConnectionMode::Connection);
    session.init().await.unwrap();

    let err = session.set_measure_interval_ms(10_000).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(mock.commands(), vec![vec![0x55]]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_settings_reads_factory_values() {
    let mock = Arc::new(MockTransport::thermometer());
    mock.set_factory_frame(frame_with_advertising_type(AdvertisingType::BtHome));
    let session = session(&mock, ConnectionMode::Connection);
    session.init().await.unwrap();
    assert_eq!(
        session.cached_settings().advertising_type,
        AdvertisingType::Pvvx
    );

    let settings = session.reset_settings().await.unwrap();

    assert_eq!(settings.advertising_type, AdvertisingType::BtHome);
    assert!(session.has_read_settings());
    assert_eq!(mock.commands()[1..], [vec![0x56], vec![0x55]]);
}

// --- Clock ---

#[tokio::test(start_paused = true)]
async fn test_set_clock_writes_epoch_little_endian() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    session.set_clock(0x6543_2100).await.unwrap();
    assert_eq!(mock.commands(), vec![vec![0x23, 0x00, 0x21, 0x43, 0x65]]);

    let datetime = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    session.set_clock_datetime(datetime).await.unwrap();
    let expected = 1_700_000_000u32.to_le_bytes();
    assert_eq!(mock.commands()[1][1..], expected);
}

#[tokio::test(start_paused = true)]
async fn test_set_clock_rejects_pre_epoch() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    let before_epoch = OffsetDateTime::from_unix_timestamp(-1).unwrap();
    let err = session.set_clock_datetime(before_epoch).await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(mock.commands().is_empty());
}

// --- Locking and time tracking ---

#[tokio::test(start_paused = true)]
async fn test_settings_round_trip_holds_transport_lock() {
    let mock = Arc::new(MockTransport::thermometer());
    let lock = TransportLock::new();
    let session = Arc::new(
        DeviceSession::new(address(), Arc::clone(&mock), ConnectionMode::Connection)
            .with_lock(lock.clone()),
    );
    assert!(session.transport_lock().same_as(&lock));

    let task = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.read_settings().await }
    });

    // inside the settle delay
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(lock.is_locked());

    task.await.unwrap().unwrap();
    assert!(!lock.is_locked());
}

#[tokio::test(start_paused = true)]
async fn test_time_tracking_stamps_updates() {
    let mock = Arc::new(MockTransport::thermometer());
    let session = session(&mock, ConnectionMode::Connection);

    session.read_all().await.unwrap();
    assert!(session.last_read_time().is_none());

    session.set_time_tracking(true);
    session.read_all().await.unwrap();
    assert!(session.last_read_time().is_some());
}
