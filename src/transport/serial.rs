//! Serial transport for the modem UART

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::transport::traits::{TransportConnector, TransportStream};

impl TransportStream for SerialStream {}

/// Opens the modem serial port
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud: u32,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
        }
    }
}

#[async_trait]
impl TransportConnector for SerialConnector {
    type Stream = SerialStream;

    async fn connect(&self) -> Result<Self::Stream> {
        tokio_serial::new(&self.port, self.baud)
            .open_native_async()
            .with_context(|| format!("Failed to open modem port {} at {} baud", self.port, self.baud))
    }

    fn name(&self) -> &'static str {
        "Modem"
    }
}
