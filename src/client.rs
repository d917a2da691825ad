use crate::config::ClientOptions;
use crate::connection::Connection;
use crate::error::{CamillaError, Result};
use crate::extract::Fragment;
use crate::protocol::{Command, Reply, Request};
use crate::types::{
    signal_range_to_db, Decibels, ProcessingState, StandardRate, StopReason,
    SupportedDeviceTypes, Version,
};

/// Client for controlling a CamillaDSP engine
///
/// The client holds at most one websocket connection. Every command sends one
/// request and waits for its reply before returning; methods take `&mut self`
/// so a second command can't be issued while one is pending.
///
/// # Example
///
/// ```no_run
/// use camilladsp_client::CamillaClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = CamillaClient::new();
///     client.connect("127.0.0.1", 1234).await?;
///
///     println!("State: {}", client.get_state().await?);
///     client.set_volume(-20.0).await?;
///
///     client.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct CamillaClient {
    options: ClientOptions,
    connection: Option<Connection>,
    version: Option<Version>,
}

impl Default for CamillaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CamillaClient {
    /// Create a disconnected client with default options
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Self {
            options,
            connection: None,
            version: None,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Connect to the engine at `host:port` and read its version
    ///
    /// An existing connection is closed first.
    pub async fn connect(&mut self, host: impl AsRef<str>, port: u16) -> Result<()> {
        self.disconnect().await;

        let connection = Connection::connect(host.as_ref(), port, &self.options).await?;
        self.connection = Some(connection);

        let version = match self.query_string(Command::GetVersion).await {
            Ok(raw) => raw.parse::<Version>(),
            Err(e) => Err(e),
        };
        match version {
            Ok(version) => {
                tracing::info!("Connected to CamillaDSP {}", version);
                self.version = Some(version);
                Ok(())
            }
            Err(e) => {
                self.disconnect().await;
                Err(e)
            }
        }
    }

    /// Close the connection
    ///
    /// The connection is released even if the close handshake fails.
    pub async fn disconnect(&mut self) {
        self.version = None;
        if let Some(connection) = self.connection.take() {
            match connection.close().await {
                Ok(()) => tracing::info!("Disconnected from CamillaDSP"),
                Err(e) => tracing::warn!("Error while closing connection: {}", e),
            }
        }
    }

    /// Is the websocket connected?
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_open)
    }

    /// Engine version, read when the connection was made
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Version of this library
    pub fn library_version() -> Version {
        Version::library()
    }

    async fn query(&mut self, request: Request) -> Result<Reply> {
        let connection = self.connection.as_ref().ok_or(CamillaError::NotConnected)?;
        let frame = request.to_frame()?;
        connection.exchange(request.command, frame).await
    }

    /// Run a command without argument and return the raw value of its reply
    async fn query_value(&mut self, command: Command) -> Result<String> {
        Ok(self.query(Request::new(command)).await?.value)
    }

    fn fragment<'a>(&self, command: Command, value: &'a str) -> Result<Fragment<'a>> {
        Fragment::parse(command.as_str(), value, self.options.token_capacity)
    }

    async fn query_string(&mut self, command: Command) -> Result<String> {
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.string()
    }

    async fn query_optional_string(&mut self, command: Command) -> Result<Option<String>> {
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.optional_string()
    }

    async fn query_number<T>(&mut self, command: Command) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.number()
    }

    async fn query_levels(&mut self, command: Command) -> Result<Vec<Decibels>> {
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.numbers()
    }

    async fn command<T: serde::Serialize + ?Sized>(
        &mut self,
        command: Command,
        argument: &T,
    ) -> Result<()> {
        self.query(Request::with_argument(command, argument)?).await?;
        Ok(())
    }

    async fn command_with_reply<T: serde::Serialize + ?Sized>(
        &mut self,
        command: Command,
        argument: &T,
    ) -> Result<String> {
        let reply = self.query(Request::with_argument(command, argument)?).await?;
        self.fragment(command, &reply.value)?.string()
    }

    // ========== Engine Info ==========

    /// Device types the engine supports, playback list first
    pub async fn get_supported_device_types(&mut self) -> Result<SupportedDeviceTypes> {
        let command = Command::GetSupportedDeviceTypes;
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.device_types()
    }

    /// Current processing state
    pub async fn get_state(&mut self) -> Result<ProcessingState> {
        self.query_string(Command::GetState).await?.parse()
    }

    /// Reason processing last stopped
    pub async fn get_stop_reason(&mut self) -> Result<StopReason> {
        self.query_string(Command::GetStopReason).await?.parse()
    }

    // ========== Signal Levels ==========

    /// Current signal range, at most 2.0
    pub async fn get_signal_range(&mut self) -> Result<f32> {
        self.query_number(Command::GetSignalRange).await
    }

    /// Current signal range in dB, full scale is 0 dB
    ///
    /// A silent signal reads as -1000 dB.
    pub async fn get_signal_range_db(&mut self) -> Result<Decibels> {
        Ok(signal_range_to_db(self.get_signal_range().await?))
    }

    /// Capture RMS level per channel in dB
    pub async fn get_capture_signal_rms(&mut self) -> Result<Vec<Decibels>> {
        self.query_levels(Command::GetCaptureSignalRms).await
    }

    /// Playback RMS level per channel in dB
    pub async fn get_playback_signal_rms(&mut self) -> Result<Vec<Decibels>> {
        self.query_levels(Command::GetPlaybackSignalRms).await
    }

    /// Capture peak level per channel in dB
    pub async fn get_capture_signal_peak(&mut self) -> Result<Vec<Decibels>> {
        self.query_levels(Command::GetCaptureSignalPeak).await
    }

    /// Playback peak level per channel in dB
    pub async fn get_playback_signal_peak(&mut self) -> Result<Vec<Decibels>> {
        self.query_levels(Command::GetPlaybackSignalPeak).await
    }

    // ========== Volume Control ==========

    pub async fn get_volume(&mut self) -> Result<Decibels> {
        self.query_number(Command::GetVolume).await
    }

    /// Set the main volume in dB
    ///
    /// The pipeline needs Volume filters for this to have an effect.
    ///
    /// NaN and infinite values are rejected without contacting the engine.
    pub async fn set_volume(&mut self, volume: Decibels) -> Result<()> {
        if !volume.is_finite() {
            return Err(CamillaError::decode(
                Command::SetVolume.as_str(),
                format!("{} is not a finite volume", volume),
            ));
        }
        self.command(Command::SetVolume, &volume).await
    }

    pub async fn get_mute(&mut self) -> Result<bool> {
        let command = Command::GetMute;
        let value = self.query_value(command).await?;
        self.fragment(command, &value)?.boolean()
    }

    pub async fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.command(Command::SetMute, &mute).await
    }

    // ========== Rates & Buffers ==========

    /// Measured capture rate in Hz
    pub async fn get_capture_rate_raw(&mut self) -> Result<u32> {
        self.query_number(Command::GetCaptureRate).await
    }

    /// Capture rate rounded to the standard rate within ±4% of the measured value
    pub async fn get_capture_rate(&mut self) -> Result<StandardRate> {
        StandardRate::nearest(self.get_capture_rate_raw().await?)
    }

    /// Update interval of the level meters, in ms
    pub async fn get_update_interval(&mut self) -> Result<u32> {
        self.query_number(Command::GetUpdateInterval).await
    }

    pub async fn set_update_interval(&mut self, interval_ms: u32) -> Result<()> {
        self.command(Command::SetUpdateInterval, &interval_ms).await
    }

    /// Current rate adjust factor, 1.0 means 1:1 resampling
    pub async fn get_rate_adjust(&mut self) -> Result<f32> {
        self.query_number(Command::GetRateAdjust).await
    }

    /// Buffer level of the playback device
    pub async fn get_buffer_level(&mut self) -> Result<i64> {
        self.query_number(Command::GetBufferLevel).await
    }

    /// Clipped samples since the config was loaded
    pub async fn get_clipped_samples(&mut self) -> Result<u64> {
        self.query_number(Command::GetClippedSamples).await
    }

    // ========== Processing Control ==========

    /// Stop processing and wait for a new config if wait mode is active, else exit
    pub async fn stop(&mut self) -> Result<()> {
        self.query(Request::new(Command::Stop)).await.map(|_| ())
    }

    /// Stop processing and exit
    pub async fn exit(&mut self) -> Result<()> {
        self.query(Request::new(Command::Exit)).await.map(|_| ())
    }

    /// Reload the config file from disk
    pub async fn reload(&mut self) -> Result<()> {
        self.query(Request::new(Command::Reload)).await.map(|_| ())
    }

    // ========== Configuration ==========

    /// Path of the current config file, `None` if no file is loaded
    pub async fn get_config_name(&mut self) -> Result<Option<String>> {
        self.query_optional_string(Command::GetConfigName).await
    }

    pub async fn set_config_name(&mut self, path: &str) -> Result<()> {
        self.command(Command::SetConfigName, path).await
    }

    /// Active config as YAML text
    pub async fn get_config_raw(&mut self) -> Result<String> {
        self.query_string(Command::GetConfig).await
    }

    /// Upload and apply a new config given as YAML text
    pub async fn set_config_raw(&mut self, config: &str) -> Result<()> {
        self.command(Command::SetConfig, config).await
    }

    /// Previously active config as YAML text, `None` if there is none
    pub async fn get_previous_config_raw(&mut self) -> Result<Option<String>> {
        self.query_optional_string(Command::GetPreviousConfig).await
    }

    /// Have the engine parse a YAML config and return it with defaults filled in
    pub async fn read_config_raw(&mut self, config: &str) -> Result<String> {
        self.command_with_reply(Command::ReadConfig, config).await
    }

    /// Have the engine read a config file from its disk
    pub async fn read_config_file_raw(&mut self, path: &str) -> Result<String> {
        self.command_with_reply(Command::ReadConfigFile, path).await
    }

    /// Validate a YAML config without applying it
    ///
    /// Returns the validated config with all optional fields filled with
    /// defaults; a rejected config surfaces as [`CamillaError::Remote`].
    pub async fn validate_config_raw(&mut self, config: &str) -> Result<String> {
        self.command_with_reply(Command::ValidateConfig, config).await
    }
}
