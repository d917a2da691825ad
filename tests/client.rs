use camilladsp_client::{
    CamillaClient, CamillaError, ClientOptions, ProcessingState, StandardRate, StopReason, Version,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the engine double does with a request
enum Answer {
    Reply(String),
    /// Reply after a pause; later requests wait behind it
    Delayed(Duration, String),
    Silence,
    Close,
}

fn ok(command: &str, value: &str) -> Answer {
    Answer::Reply(format!(
        r#"{{"{}":{{"result":"Ok","value":{}}}}}"#,
        command, value
    ))
}

fn error(command: &str, value: &str) -> Answer {
    Answer::Reply(format!(
        r#"{{"{}":{{"result":"Error","value":{}}}}}"#,
        command, value
    ))
}

/// In-process websocket server standing in for CamillaDSP
struct MockEngine {
    port: u16,
    frames: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MockEngine {
    /// Engine that reports version 1.0.3 and hands every other command to `handler`
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&Value>) -> Answer + Send + Sync + 'static,
    {
        Self::start_raw(move |command, argument| match command {
            "GetVersion" => ok("GetVersion", r#""1.0.3""#),
            _ => handler(command, argument),
        })
        .await
    }

    async fn start_raw<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&Value>) -> Answer + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else {
                        continue;
                    };
                    let _ = frames_tx.send(text.clone());

                    let request: Value = serde_json::from_str(&text).unwrap();
                    let answer = match &request {
                        Value::String(command) => handler(command.as_str(), None),
                        Value::Object(map) => {
                            let (command, argument) = map.iter().next().unwrap();
                            handler(command.as_str(), Some(argument))
                        }
                        other => panic!("unexpected request {}", other),
                    };

                    match answer {
                        Answer::Reply(reply) => {
                            if ws.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Answer::Delayed(pause, reply) => {
                            tokio::time::sleep(pause).await;
                            if ws.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Answer::Silence => {}
                        Answer::Close => {
                            let _ = ws.close(None).await;
                            break;
                        }
                    }
                }
            }
        });

        Self {
            port,
            frames: Mutex::new(frames_rx),
        }
    }

    /// Next frame the engine received
    async fn next_frame(&self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.frames.lock().await.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn connect(&self) -> CamillaClient {
        let mut client = CamillaClient::new();
        client.connect("127.0.0.1", self.port).await.unwrap();
        assert_eq!(self.next_frame().await, "\"GetVersion\"");
        client
    }
}

/// Answers every getter with a fixed, representative value
fn engine_state(command: &str, _argument: Option<&Value>) -> Answer {
    match command {
        "GetState" => ok(command, r#""Running""#),
        "GetStopReason" => ok(command, r#""CaptureFormatChange""#),
        "GetSignalRange" => ok(command, "1.0"),
        "GetCaptureSignalRms" => ok(command, "[-20.5,-21.0]"),
        "GetPlaybackSignalRms" => ok(command, "[-18.0,-18.5,-40.0,-41.25]"),
        "GetCaptureSignalPeak" => ok(command, "[-3.0,-4.0]"),
        "GetPlaybackSignalPeak" => ok(command, "[-1.5]"),
        "GetVolume" => ok(command, "-12.5"),
        "GetMute" => ok(command, "true"),
        "GetCaptureRate" => ok(command, "44000"),
        "GetUpdateInterval" => ok(command, "100"),
        "GetRateAdjust" => ok(command, "1.0002"),
        "GetBufferLevel" => ok(command, "1024"),
        "GetClippedSamples" => ok(command, "17"),
        "GetConfigName" => ok(command, r#""/home/dsp/camilla.yml""#),
        "GetConfig" => ok(command, r#""devices:\n  samplerate: 44100\n""#),
        "GetPreviousConfig" => ok(command, r#""devices:\n  samplerate: 48000\n""#),
        "GetSupportedDeviceTypes" => ok(command, r#"[["Alsa","File"],["Alsa","Stdin"]]"#),
        _ => Answer::Reply(format!(r#"{{"{}":{{"result":"Ok"}}}}"#, command)),
    }
}

#[tokio::test]
async fn test_connect_reads_engine_version() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    assert!(client.is_connected());
    assert_eq!(client.version(), Some(Version::new(1, 0, 3)));
    assert_eq!(
        CamillaClient::library_version().to_string(),
        env!("CARGO_PKG_VERSION")
    );

    client.disconnect().await;
}

#[tokio::test]
async fn test_command_while_not_connected() {
    let mut client = CamillaClient::new();

    assert!(!client.is_connected());
    assert!(client.version().is_none());
    assert!(matches!(client.get_state().await, Err(CamillaError::NotConnected)));
    assert!(matches!(client.set_volume(-3.0).await, Err(CamillaError::NotConnected)));
    assert!(matches!(client.stop().await, Err(CamillaError::NotConnected)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = CamillaClient::new();
    let err = client.connect("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, CamillaError::WebSocket(_)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_connect_with_bad_version_disconnects() {
    let engine = MockEngine::start_raw(|command, _| ok(command, r#""unknown""#)).await;

    let mut client = CamillaClient::new();
    let err = client.connect("127.0.0.1", engine.port).await.unwrap_err();
    assert!(matches!(err, CamillaError::Decode { field: "GetVersion", .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_scalar_getters() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    assert_eq!(client.get_state().await.unwrap(), ProcessingState::Running);
    assert_eq!(
        client.get_stop_reason().await.unwrap(),
        StopReason::CaptureFormatChange
    );
    assert_eq!(client.get_signal_range().await.unwrap(), 1.0);
    assert_eq!(client.get_volume().await.unwrap(), -12.5);
    assert!(client.get_mute().await.unwrap());
    assert_eq!(client.get_capture_rate_raw().await.unwrap(), 44000);
    assert_eq!(client.get_update_interval().await.unwrap(), 100);
    assert!((client.get_rate_adjust().await.unwrap() - 1.0002).abs() < 1e-6);
    assert_eq!(client.get_buffer_level().await.unwrap(), 1024);
    assert_eq!(client.get_clipped_samples().await.unwrap(), 17);
    assert_eq!(
        client.get_config_name().await.unwrap().as_deref(),
        Some("/home/dsp/camilla.yml")
    );
    assert_eq!(
        client.get_config_raw().await.unwrap(),
        "devices:\n  samplerate: 44100\n"
    );
    assert_eq!(
        client.get_previous_config_raw().await.unwrap().as_deref(),
        Some("devices:\n  samplerate: 48000\n")
    );

    client.disconnect().await;
}

#[tokio::test]
async fn test_signal_levels() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    assert_eq!(client.get_capture_signal_rms().await.unwrap(), vec![-20.5, -21.0]);
    assert_eq!(
        client.get_playback_signal_rms().await.unwrap(),
        vec![-18.0, -18.5, -40.0, -41.25]
    );
    assert_eq!(client.get_capture_signal_peak().await.unwrap(), vec![-3.0, -4.0]);
    assert_eq!(client.get_playback_signal_peak().await.unwrap(), vec![-1.5]);
    assert_eq!(engine.next_frame().await, "\"GetCaptureSignalRms\"");
}

#[tokio::test]
async fn test_supported_device_types() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    let types = client.get_supported_device_types().await.unwrap();
    assert_eq!(types.playback, vec!["Alsa", "File"]);
    assert_eq!(types.capture, vec!["Alsa", "Stdin"]);
}

#[tokio::test]
async fn test_signal_range_db() {
    let engine = MockEngine::start(|command, _| match command {
        "GetSignalRange" => ok(command, "2.0"),
        _ => Answer::Close,
    })
    .await;
    let mut client = engine.connect().await;
    assert!(client.get_signal_range_db().await.unwrap().abs() < 1e-6);

    let engine = MockEngine::start(|command, _| match command {
        "GetSignalRange" => ok(command, "0.0"),
        _ => Answer::Close,
    })
    .await;
    let mut client = engine.connect().await;
    assert_eq!(client.get_signal_range_db().await.unwrap(), -1000.0);
}

#[tokio::test]
async fn test_capture_rate_classification() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;
    assert_eq!(client.get_capture_rate().await.unwrap(), StandardRate::Rate44100);

    let engine = MockEngine::start(|command, _| ok(command, "100000")).await;
    let mut client = engine.connect().await;
    assert!(matches!(
        client.get_capture_rate().await,
        Err(CamillaError::NoStandardRateMatch(100000))
    ));

    let engine = MockEngine::start(|command, _| ok(command, "10000")).await;
    let mut client = engine.connect().await;
    assert!(matches!(
        client.get_capture_rate().await,
        Err(CamillaError::RateOutOfRange(10000))
    ));
}

#[tokio::test]
async fn test_setters_send_json_arguments() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    client.set_volume(-12.3).await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetVolume":-12.3}"#);

    client.set_mute(false).await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetMute":false}"#);

    client.set_update_interval(250).await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetUpdateInterval":250}"#);

    client.set_config_name("/etc/camilla.yml").await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetConfigName":"/etc/camilla.yml"}"#);

    client.set_config_raw("filters: {}\n").await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetConfig":"filters: {}\n"}"#);
}

#[tokio::test]
async fn test_control_commands() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    client.reload().await.unwrap();
    assert_eq!(engine.next_frame().await, "\"Reload\"");
    client.stop().await.unwrap();
    assert_eq!(engine.next_frame().await, "\"Stop\"");
    client.exit().await.unwrap();
    assert_eq!(engine.next_frame().await, "\"Exit\"");
}

#[tokio::test]
async fn test_config_round_trips_through_engine() {
    let engine = MockEngine::start(|command, argument| match (command, argument) {
        ("ValidateConfig", Some(Value::String(config))) => ok(
            command,
            &serde_json::to_string(&format!("{}mixers: {{}}\n", config)).unwrap(),
        ),
        ("ReadConfig", Some(Value::String(config))) => {
            ok(command, &serde_json::to_string(config).unwrap())
        }
        ("ReadConfigFile", Some(Value::String(path))) => {
            ok(command, &serde_json::to_string(&format!("# {}\n", path)).unwrap())
        }
        _ => Answer::Close,
    })
    .await;
    let mut client = engine.connect().await;

    assert_eq!(
        client.validate_config_raw("filters: {}\n").await.unwrap(),
        "filters: {}\nmixers: {}\n"
    );
    assert_eq!(client.read_config_raw("a: 1\n").await.unwrap(), "a: 1\n");
    assert_eq!(
        client.read_config_file_raw("/tmp/x.yml").await.unwrap(),
        "# /tmp/x.yml\n"
    );
}

#[tokio::test]
async fn test_remote_error_clears_exchange() {
    let engine = MockEngine::start(|command, _| match command {
        "SetConfig" => error(command, r#""Config invalid""#),
        "Reload" => error(command, r#""""#),
        _ => engine_state(command, None),
    })
    .await;
    let mut client = engine.connect().await;

    let err = client.set_config_raw("bogus").await.unwrap_err();
    assert!(matches!(err, CamillaError::Remote(ref message) if message == "Config invalid"));

    let err = client.reload().await.unwrap_err();
    assert!(matches!(err, CamillaError::Remote(ref message) if message == "command failed"));

    // Next exchange proceeds normally
    assert_eq!(client.get_volume().await.unwrap(), -12.5);
}

#[tokio::test]
async fn test_mismatched_reply() {
    let engine = MockEngine::start(|command, _| match command {
        "GetVolume" => ok("GetMute", "false"),
        _ => engine_state(command, None),
    })
    .await;
    let mut client = engine.connect().await;

    assert!(matches!(client.get_volume().await, Err(CamillaError::Protocol(_))));
    assert_eq!(client.get_state().await.unwrap(), ProcessingState::Running);
}

#[tokio::test]
async fn test_malformed_reply() {
    let engine = MockEngine::start(|command, _| match command {
        "GetVolume" => Answer::Reply(r#"{"GetVolume":{"result":"Ok","#.to_string()),
        _ => engine_state(command, None),
    })
    .await;
    let mut client = engine.connect().await;

    assert!(matches!(client.get_volume().await, Err(CamillaError::MalformedJson(_))));
}

#[tokio::test]
async fn test_unknown_state() {
    let engine = MockEngine::start(|command, _| ok(command, r#""Bogus""#)).await;
    let mut client = engine.connect().await;

    let err = client.get_state().await.unwrap_err();
    assert!(matches!(
        err,
        CamillaError::UnknownEnumValue { kind: "ProcessingState", ref raw } if raw == "Bogus"
    ));
}

#[tokio::test]
async fn test_wrong_value_shape() {
    let engine = MockEngine::start(|command, _| ok(command, r#""loud""#)).await;
    let mut client = engine.connect().await;

    assert!(matches!(
        client.get_volume().await,
        Err(CamillaError::Decode { field: "GetVolume", .. })
    ));
    assert!(matches!(
        client.get_mute().await,
        Err(CamillaError::Decode { field: "GetMute", .. })
    ));
}

#[tokio::test]
async fn test_connection_lost_mid_exchange() {
    let engine = MockEngine::start(|_, _| Answer::Close).await;
    let mut client = engine.connect().await;

    assert!(matches!(client.get_state().await, Err(CamillaError::ConnectionLost)));
    assert!(!client.is_connected());
    assert!(matches!(client.get_volume().await, Err(CamillaError::ConnectionLost)));

    client.disconnect().await;
    assert!(matches!(client.get_volume().await, Err(CamillaError::NotConnected)));
}

#[tokio::test]
async fn test_request_timeout() {
    let engine = MockEngine::start(|command, _| match command {
        "GetState" => Answer::Silence,
        _ => engine_state(command, None),
    })
    .await;

    let options = ClientOptions::default().with_request_timeout(Some(Duration::from_millis(200)));
    let mut client = CamillaClient::with_options(options);
    client.connect("127.0.0.1", engine.port).await.unwrap();

    let err = client.get_state().await.unwrap_err();
    assert!(matches!(err, CamillaError::Timeout { ref command, .. } if command == "GetState"));

    // The connection survives a timeout
    assert!(client.is_connected());
    assert_eq!(client.get_volume().await.unwrap(), -12.5);
}

fn delayed(answer: Answer, pause: Duration) -> Answer {
    match answer {
        Answer::Reply(reply) => Answer::Delayed(pause, reply),
        other => other,
    }
}

#[tokio::test]
async fn test_late_reply_is_not_given_to_next_command() {
    let engine = MockEngine::start(|command, _| match command {
        "GetState" => delayed(engine_state(command, None), Duration::from_millis(300)),
        _ => engine_state(command, None),
    })
    .await;

    let options = ClientOptions::default().with_request_timeout(Some(Duration::from_millis(200)));
    let mut client = CamillaClient::with_options(options);
    client.connect("127.0.0.1", engine.port).await.unwrap();

    assert!(matches!(client.get_state().await, Err(CamillaError::Timeout { .. })));

    // The GetState reply lands while GetVolume is pending
    assert_eq!(client.get_volume().await.unwrap(), -12.5);
    assert!(client.get_mute().await.unwrap());
}

#[tokio::test]
async fn test_retry_after_timeout_gets_fresh_reply() {
    let calls = AtomicU32::new(0);
    let engine = MockEngine::start(move |command, _| match command {
        "GetSignalRange" => {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let reply = ok(command, &format!("{}.0", n));
            if n == 0 {
                delayed(reply, Duration::from_millis(300))
            } else {
                reply
            }
        }
        _ => engine_state(command, None),
    })
    .await;

    let options = ClientOptions::default().with_request_timeout(Some(Duration::from_millis(200)));
    let mut client = CamillaClient::with_options(options);
    client.connect("127.0.0.1", engine.port).await.unwrap();

    assert!(matches!(
        client.get_signal_range().await,
        Err(CamillaError::Timeout { ref command, .. }) if command == "GetSignalRange"
    ));
    assert_eq!(client.get_signal_range().await.unwrap(), 1.0);
    assert_eq!(client.get_signal_range().await.unwrap(), 2.0);
}

#[tokio::test]
async fn test_missing_config_reads_as_none() {
    let engine = MockEngine::start(|command, _| match command {
        "GetConfigName" | "GetPreviousConfig" => ok(command, "null"),
        _ => engine_state(command, None),
    })
    .await;
    let mut client = engine.connect().await;

    assert_eq!(client.get_config_name().await.unwrap(), None);
    assert_eq!(client.get_previous_config_raw().await.unwrap(), None);
}

#[tokio::test]
async fn test_non_finite_volume_is_not_sent() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    for volume in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        assert!(matches!(
            client.set_volume(volume).await,
            Err(CamillaError::Decode { field: "SetVolume", .. })
        ));
    }

    client.set_volume(-6.0).await.unwrap();
    assert_eq!(engine.next_frame().await, r#"{"SetVolume":-6.0}"#);
}

#[tokio::test]
async fn test_disconnect_and_reconnect() {
    let engine = MockEngine::start(engine_state).await;
    let mut client = engine.connect().await;

    client.disconnect().await;
    assert!(!client.is_connected());
    assert!(client.version().is_none());
    assert!(matches!(client.get_state().await, Err(CamillaError::NotConnected)));

    // Disconnecting twice is harmless
    client.disconnect().await;

    client.connect("127.0.0.1", engine.port).await.unwrap();
    assert!(client.is_connected());
    assert_eq!(client.get_state().await.unwrap(), ProcessingState::Running);
}

#[tokio::test]
async fn test_token_capacity_applies_to_replies() {
    let engine = MockEngine::start(engine_state).await;

    let options = ClientOptions::default().with_token_capacity(10);
    let mut client = CamillaClient::with_options(options);
    client.connect("127.0.0.1", engine.port).await.unwrap();

    // Envelope plus four levels exceeds ten tokens
    assert!(matches!(
        client.get_playback_signal_rms().await,
        Err(CamillaError::MalformedJson(_))
    ));
    assert_eq!(client.get_capture_signal_peak().await.unwrap(), vec![-3.0, -4.0]);
}
