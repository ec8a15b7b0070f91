use super::*;

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyAMA0".to_string(),
            device_identity: "vacuum/turbovac/1".to_string(),
            hardware_timeout_ms: 1500,
            simulate: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            keepalive_min_interval_secs: 0.2,
            periodic_interval_secs: 5.0,
        }
    }
}

impl Default for SetpointConfig {
    fn default() -> Self {
        Self {
            persist: true,
            apply_on_startup: true,
            store_path: "/data/turbovac_state.json".to_string(),
            store_timeout_ms: 500,
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            service: "com.victronenergy.gauge.pressure_0".to_string(),
            path: "/Pressure".to_string(),
            probe_timeout_ms: 600,
            label: "pressure".to_string(),
            unit: "mbar".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/turbovac.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pump: PumpConfig::default(),
            polling: PollingConfig::default(),
            setpoint: SetpointConfig::default(),
            companion: None,
            state_rules: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}
