// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use texecom_bridge::mqtt::state_confirmed;
use texecom_bridge::transport::serial;
use texecom_bridge::{
    ArmType, DigitalInputs, FileSettingsStore, Gateway, GatewayConfig, GatewayEvent,
    MqttAlarmState, MqttZoneState, Settings, SettingsStore, SharedInputs, SystemClock, Task,
};

const TICK_INTERVAL: Duration = Duration::from_millis(10);
const MIN_CODE_LEN: usize = 4;
const MSG_NOT_READY: &str = "Arm attempted while alarm is not ready";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "texecom2mqtt")]
#[command(about = "Bridge between a Texecom alarm panel and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    serial: SerialToml,
    #[serde(default)]
    panel: PanelToml,
    mqtt: MqttToml,
    #[serde(default = "default_settings_path")]
    settings_path: String,
    #[serde(default, deserialize_with = "deserialize_zone_names")]
    zone_names: HashMap<u16, String>,
}

fn deserialize_zone_names<'de, D>(deserializer: D) -> Result<HashMap<u16, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u16>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone number: {k}")))
        })
        .collect()
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

#[derive(Debug, Deserialize)]
struct SerialToml {
    port: String,
}

/// Panel settings. Anything left out keeps the library default.
#[derive(Debug, Default, Deserialize)]
struct PanelToml {
    first_zone: Option<u8>,
    zone_count: Option<u8>,
    idle_screen_text: Option<String>,
    #[serde(default)]
    user_names: Vec<String>,
    udl_code: Option<String>,
    debug: Option<bool>,
    arm_timeout_secs: Option<u64>,
    disarm_timeout_secs: Option<u64>,
    zone_sync_interval_secs: Option<u64>,
    /// Local time of the daily clock check, "HH:MM"
    time_sync_at: Option<String>,
    time_tolerance_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_topic_prefix")]
    topic_prefix: String,
    #[serde(default = "default_notification_topic")]
    notification_topic: String,
}

fn default_client_id() -> String {
    "texecom2mqtt".to_string()
}
fn default_topic_prefix() -> String {
    "home/security".to_string()
}
fn default_notification_topic() -> String {
    "home/notification/low".to_string()
}

fn build_gateway_config(toml: &PanelToml, settings: &Settings) -> Result<GatewayConfig> {
    let mut builder = GatewayConfig::builder().user_names(toml.user_names.clone());
    if let Some(zone) = toml.first_zone {
        builder = builder.first_zone(zone);
    }
    if let Some(count) = toml.zone_count {
        builder = builder.zone_count(count);
    }
    if let Some(text) = &toml.idle_screen_text {
        builder = builder.idle_screen_text(text);
    }
    if let Some(secs) = toml.arm_timeout_secs {
        builder = builder.arm_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = toml.disarm_timeout_secs {
        builder = builder.disarm_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = toml.zone_sync_interval_secs {
        builder = builder.zone_sync_interval(Duration::from_secs(secs));
    }
    if let Some(at) = &toml.time_sync_at {
        let at = NaiveTime::parse_from_str(at, "%H:%M")
            .with_context(|| format!("Invalid time_sync_at: {at}"))?;
        builder = builder.time_sync_at(at);
    }
    if let Some(secs) = toml.time_tolerance_secs {
        builder = builder.time_tolerance_secs(secs);
    }

    // Persisted settings win over the config file
    let udl_code = if settings.udl_code.is_empty() {
        toml.udl_code.clone().unwrap_or_default()
    } else {
        settings.udl_code.clone()
    };
    Ok(builder
        .udl_code(udl_code)
        .debug(settings.debug || toml.debug.unwrap_or(false))
        .build()?)
}

// ---------------------------------------------------------------------------
// Topics and commands
// ---------------------------------------------------------------------------

struct Topics {
    prefix: String,
    alarm: String,
    state: String,
    trigger: String,
    set: String,
    udl: String,
    debug: String,
    inputs: String,
    notification: String,
}

impl Topics {
    fn new(prefix: &str, notification: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            alarm: format!("{prefix}/alarm"),
            state: format!("{prefix}/alarm/state"),
            trigger: format!("{prefix}/alarm/trigger"),
            set: format!("{prefix}/alarm/set"),
            udl: format!("{prefix}/alarm/udl"),
            debug: format!("{prefix}/alarm/debug"),
            inputs: format!("{prefix}/alarm/inputs"),
            notification: notification.to_string(),
        }
    }

    fn zone(&self, zone: u16) -> String {
        format!("{}/zone/{zone:03}", self.prefix)
    }

    fn subscriptions(&self) -> [&str; 5] {
        [&self.set, &self.udl, &self.debug, &self.inputs, &self.state]
    }
}

/// Work handed to the task that owns the gateway.
enum GatewayCommand {
    Arm { code: String, arm_type: ArmType },
    Disarm { code: String },
    SyncTime,
    SyncZones,
    SetUdlCode(String),
    SetDebug(bool),
    /// The hub's view of the alarm state, echoed back on the state topic
    ConfirmState(String),
}

/// Parse an `action:code` payload from the set topic.
fn parse_set_payload(payload: &str) -> Result<GatewayCommand> {
    let (action, code) = payload.split_once(':').unwrap_or((payload, ""));
    let code = code.trim();
    match action.trim() {
        "sync_time" => return Ok(GatewayCommand::SyncTime),
        "sync_zones" => return Ok(GatewayCommand::SyncZones),
        _ => {}
    }
    if code.len() < MIN_CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("Command received but code is not at least {MIN_CODE_LEN} digits");
    }
    let code = code.to_string();
    match action.trim() {
        "arm_away" => Ok(GatewayCommand::Arm { code, arm_type: ArmType::Full }),
        "arm_home" | "arm_night" => Ok(GatewayCommand::Arm { code, arm_type: ArmType::Night }),
        "disarm" => Ok(GatewayCommand::Disarm { code }),
        other => anyhow::bail!("Unknown action: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn publish_json(
    client: &AsyncClient,
    topic: &str,
    payload: &impl Serialize,
    qos: QoS,
    retain: bool,
) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, qos, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_text(client: &AsyncClient, topic: &str, text: &str, retain: bool) {
    if let Err(e) = client
        .publish(topic, QoS::AtLeastOnce, retain, text.as_bytes().to_vec())
        .await
    {
        error!("Failed to publish to {topic}: {e}");
    }
}

fn zone_label(zone: u16, overrides: &HashMap<u16, String>) -> String {
    overrides
        .get(&zone)
        .cloned()
        .unwrap_or_else(|| format!("Zone {zone}"))
}

// ---------------------------------------------------------------------------
// Gateway event → MQTT
// ---------------------------------------------------------------------------

async fn handle_gateway_event(
    event: GatewayEvent,
    client: &AsyncClient,
    topics: &Topics,
    zone_names: &HashMap<u16, String>,
) {
    match event {
        GatewayEvent::AlarmStateChanged { state, flags } => {
            info!("Alarm: {state}");
            let msg = MqttAlarmState::new(state, flags);
            publish_json(client, &topics.alarm, &msg, QoS::ExactlyOnce, true).await;
        }
        GatewayEvent::ZoneChanged { zone, flags } => {
            debug!("Zone {zone} ({}): {flags:?}", zone_label(zone, zone_names));
            let msg = MqttZoneState::from(flags);
            publish_json(client, &topics.zone(zone), &msg, QoS::AtLeastOnce, true).await;
        }
        GatewayEvent::AlarmTriggered { zone } => {
            let label = zone_label(zone, zone_names);
            warn!("Alarm triggered by zone {zone} ({label})");
            publish_text(client, &topics.notification, &format!("Triggered by zone {zone}"), false)
                .await;
            publish_text(client, &topics.trigger, &label, true).await;
        }
        GatewayEvent::Notification(text) => {
            publish_text(client, &topics.notification, &text, false).await;
        }
        GatewayEvent::TaskFinished { task, success } => {
            info!("{task:?} finished (success={success})");
            if success && matches!(task, Task::Arm | Task::Disarm) {
                publish_text(client, &topics.trigger, "", true).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway task
// ---------------------------------------------------------------------------

async fn handle_command(
    gateway: &mut Gateway,
    command: GatewayCommand,
    store: &FileSettingsStore,
    settings: &mut Settings,
    client: &AsyncClient,
    topics: &Topics,
) {
    let result = match command {
        GatewayCommand::Arm { code, arm_type } => {
            if !gateway.is_ready() {
                error!("{MSG_NOT_READY}");
                publish_text(client, &topics.notification, MSG_NOT_READY, false).await;
                return;
            }
            gateway.request_arm(&code, arm_type)
        }
        GatewayCommand::Disarm { code } => gateway.request_disarm(&code),
        GatewayCommand::SyncTime => gateway.request_time_sync(),
        GatewayCommand::SyncZones => gateway.request_zone_sync(),
        GatewayCommand::SetUdlCode(code) => settings
            .set_udl_code(&code)
            .and_then(|()| gateway.set_udl_code(&code))
            .and_then(|()| store.save(settings)),
        GatewayCommand::SetDebug(enabled) => {
            gateway.set_debug(enabled);
            settings.debug = enabled;
            store.save(settings)
        }
        GatewayCommand::ConfirmState(reported) => {
            let state = gateway.alarm_state();
            if state_confirmed(&reported, state) {
                debug!("Hub confirmed alarm state {state}");
            } else {
                warn!("Hub reports alarm state {:?}, panel is {state}. Republishing", reported.trim());
                let msg = MqttAlarmState::new(state, gateway.alarm_flags());
                publish_json(client, &topics.alarm, &msg, QoS::ExactlyOnce, true).await;
            }
            return;
        }
    };
    if let Err(e) = result {
        warn!("Command rejected: {e}");
    }
}

async fn run_gateway(
    mut gateway: Gateway,
    mut commands: mpsc::Receiver<GatewayCommand>,
    store: FileSettingsStore,
    mut settings: Settings,
    client: AsyncClient,
    topics: Arc<Topics>,
) {
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match gateway.tick() {
                    Ok(()) => {}
                    Err(e) if e.is_retryable() => warn!("Gateway tick failed: {e}"),
                    Err(e) => {
                        error!("Gateway stopped: {e}");
                        break;
                    }
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("Command channel closed");
                    break;
                };
                handle_command(&mut gateway, command, &store, &mut settings, &client, &topics)
                    .await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT → gateway
// ---------------------------------------------------------------------------

async fn route_message(
    topic: &str,
    payload: &[u8],
    topics: &Topics,
    commands: &mpsc::Sender<GatewayCommand>,
    inputs: &SharedInputs,
) {
    let text = String::from_utf8_lossy(payload);
    let command = if topic == topics.set {
        match parse_set_payload(&text) {
            Ok(command) => command,
            Err(e) => {
                error!("{e}");
                return;
            }
        }
    } else if topic == topics.udl {
        GatewayCommand::SetUdlCode(text.trim().to_string())
    } else if topic == topics.debug {
        match text.trim() {
            "true" => GatewayCommand::SetDebug(true),
            "false" => GatewayCommand::SetDebug(false),
            other => {
                warn!("Invalid debug value: {other}");
                return;
            }
        }
    } else if topic == topics.state {
        GatewayCommand::ConfirmState(text.into_owned())
    } else if topic == topics.inputs {
        match serde_json::from_slice::<DigitalInputs>(payload) {
            Ok(levels) => {
                debug!("Digital inputs: {levels:?}");
                inputs.set(levels);
            }
            Err(e) => warn!("Failed to parse digital inputs: {e}"),
        }
        return;
    } else {
        return;
    };
    if commands.send(command).await.is_err() {
        warn!("Gateway task is gone, dropping command");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=texecom_bridge=debug).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    // Load config
    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;

    let store = FileSettingsStore::new(&config.settings_path);
    let settings = store.load().context("Failed to load settings")?;
    let gateway_config = build_gateway_config(&config.panel, &settings)?;
    let topics = Arc::new(Topics::new(&config.mqtt.topic_prefix, &config.mqtt.notification_topic));
    let zone_names = Arc::new(config.zone_names);
    let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;

    let mut sigterm = signal(SignalKind::terminate())?;

    // Open the panel's serial port
    let port = serial::open(&config.serial.port)
        .with_context(|| format!("Failed to open serial port {}", config.serial.port))?;
    let (transport, reader_handle, writer_handle) = serial::spawn_bridge(port);

    let inputs = SharedInputs::default();
    let gateway = Gateway::new(
        gateway_config,
        Box::new(transport),
        Box::new(SystemClock),
        Box::new(inputs.clone()),
    );
    let event_rx = gateway.subscribe();

    // Set up MQTT
    let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
    mqtt_opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

    // Task 1: gateway tick loop and command mailbox
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let gateway_handle = tokio::spawn(run_gateway(
        gateway,
        cmd_rx,
        store,
        settings,
        client.clone(),
        Arc::clone(&topics),
    ));

    // Task 2: gateway events → MQTT
    let client_events = client.clone();
    let topics_events = Arc::clone(&topics);
    let event_handle = tokio::spawn(async move {
        let mut rx = event_rx;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    handle_gateway_event(event, &client_events, &topics_events, &zone_names).await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged, missed {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Task 3: MQTT event loop (receives messages, routes commands)
    let client_cmds = client.clone();
    let topics_cmds = Arc::clone(&topics);
    let mqtt_handle = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // rumqttc does not resubscribe after a broker reconnect
                    for topic in topics_cmds.subscriptions() {
                        info!("MQTT: subscribing to {topic}");
                        if let Err(e) = client_cmds.subscribe(topic, QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to {topic}: {e}");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    route_message(&msg.topic, &msg.payload, &topics_cmds, &cmd_tx, &inputs).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT event loop error: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    // Wait for a signal
    info!("MQTT bridge running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    mqtt_handle.abort();
    gateway_handle.abort();
    event_handle.abort();
    reader_handle.abort();
    writer_handle.abort();

    if let Err(e) = client.disconnect().await {
        debug!("MQTT disconnect: {e}");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str
        .parse()
        .context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}
