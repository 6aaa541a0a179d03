use solis::config::Config;
use std::io::Write;

#[test]
fn defaults_match_the_solis_register_map() {
    let config = Config::default();
    assert_eq!(config.registers.info_start, 33000);
    assert_eq!(config.registers.info_end, 33286);
    assert_eq!(config.registers.energy_control, 43110);
    assert_eq!(config.registers.discharging_flag, 33135);
    assert_eq!(config.registers.battery_power, 33149);
    assert_eq!(config.registers.serial_number, 33004);
    assert_eq!(config.registers.serial_number_count, 15);
    assert_eq!(config.connection.port, 8899);
}

#[test]
fn load_from_yaml_file_with_partial_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "connection:\n  ip: 10.0.0.7\n  serial: 987654321\npolling:\n  update_attempts: 3\n"
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.connection.ip, "10.0.0.7");
    assert_eq!(config.connection.serial, 987654321);
    assert_eq!(config.polling.update_attempts, 3);
    // Unspecified sections keep their defaults
    assert_eq!(config.registers.info_start, 33000);
    assert_eq!(config.polling.read_chunk_size, 100);
    assert!(config.validate().is_ok());
}

#[test]
fn load_rejects_malformed_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "connection: [not, a, mapping").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn missing_file_is_an_error() {
    assert!(Config::from_file("/nonexistent/solis.yaml").is_err());
}

#[test]
fn save_and_reload_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solis.yaml");

    let mut config = Config::default();
    config.connection.serial = 42424242;
    config.registers.battery_health = 33141;
    config.save_to_file(&path).unwrap();

    let reloaded = Config::from_file(&path).unwrap();
    assert_eq!(reloaded.connection.serial, 42424242);
    assert_eq!(reloaded.registers.battery_health, 33141);
}

#[test]
fn validation_rejects_registers_outside_the_bank() {
    let mut config = Config::default();
    config.connection.serial = 1;
    config.registers.temperature = 33999;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("registers.temperature"));
}
