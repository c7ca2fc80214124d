//! Native serial port implementation using `tokio-serial`.
//!
//! This module provides the serial port implementation for native platforms
//! (Linux, macOS, Windows). The stream must be opened from within a tokio
//! runtime because it registers with the reactor.

use {
    crate::{
        error::{Error, Result},
        port::{Port, SerialConfig, Signals},
    },
    log::trace,
    std::time::Duration,
    tokio::io::{AsyncReadExt, AsyncWriteExt},
    tokio_serial::{SerialPort as _, SerialPortBuilderExt, SerialStream},
};

/// Native serial port implementation.
pub struct NativePort {
    stream: SerialStream,
    name: String,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let stream = tokio_serial::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;

        Ok(Self {
            stream,
            name: config
                .port_name
                .clone(),
            baud_rate: config.baud_rate,
        })
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig::new(port_name, baud_rate);
        Self::open(&config)
    }

    /// Get the configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Port for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_signals(&mut self, signals: Signals) -> Result<()> {
        trace!("Setting {signals} on {}", self.name);
        if let Some(level) = signals.dtr {
            self.stream
                .write_data_terminal_ready(level)
                .map_err(|e| Error::SignalFailed(format!("DTR={level}: {e}")))?;
        }
        if let Some(level) = signals.rts {
            self.stream
                .write_request_to_send(level)
                .map_err(|e| Error::SignalFailed(format!("RTS={level}: {e}")))?;
        }
        Ok(())
    }

    async fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await?;
        self.stream
            .flush()
            .await?;
        Ok(())
    }

    async fn read_up_to(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];

        // `AsyncReadExt::read` is cancel-safe: if the timer wins, no bytes
        // have been taken from the stream.
        match tokio::time::timeout(timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            },
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Ok(Vec::new()),
        }
    }
}
