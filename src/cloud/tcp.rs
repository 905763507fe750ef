//! Location service client over TCP
//!
//! Each request opens a connection, writes one JSON line and waits for one
//! JSON reply line.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cellfix_shared::codec::LineDecoder;
use cellfix_shared::wire::{LocationReply, LocationRequestBody, LteCell, WifiBody};
use cellfix_shared::{LocationError, LocationResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::cloud::{CellQuery, LocationClient, LocationQuery};
use crate::transport::{TcpConnector, TransportConnector, TransportStream};

pub struct TcpLocationClient {
    connector: TcpConnector,
    device_id: String,
    request_timeout: Duration,
}

impl TcpLocationClient {
    pub fn new(connector: TcpConnector, device_id: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            connector,
            device_id: device_id.into(),
            request_timeout,
        }
    }

    fn request_body(&self, query: &LocationQuery) -> LocationRequestBody {
        let lte = match &query.cells {
            None => Vec::new(),
            Some(CellQuery::SingleCell(cell)) => LteCell::new(cell, &[]).into_iter().collect(),
            Some(CellQuery::MultiCell(report)) => LteCell::from_report(report),
        };
        LocationRequestBody {
            device_id: self.device_id.clone(),
            lte,
            wifi: query.wifi.as_ref().map(WifiBody::from),
        }
    }

    async fn round_trip(&self, line: String) -> Result<String, LocationError> {
        let mut stream = self
            .connector
            .connect()
            .await
            .map_err(|e| LocationError::Transport(format!("{e:#}")))?;

        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LocationError::Transport(e.to_string()))?;

        let mut decoder = LineDecoder::new();
        let mut read_buf = vec![0u8; 1024];
        let reply = loop {
            if let Some(reply) = decoder
                .decode_next()
                .map_err(|e| LocationError::InvalidReply(e.to_string()))?
            {
                break reply;
            }
            match stream.read(&mut read_buf).await {
                Ok(0) => {
                    return Err(LocationError::Transport(
                        "connection closed before reply".into(),
                    ))
                }
                Ok(n) => decoder.extend(&read_buf[..n]),
                Err(e) => return Err(LocationError::Transport(e.to_string())),
            }
        };

        // The reply is complete; a failed close does not affect it
        if let Err(e) = TransportStream::shutdown(&mut stream).await {
            debug!("[CLOUD] Shutdown after reply failed: {}", e);
        }
        Ok(reply)
    }
}

#[async_trait]
impl LocationClient for TcpLocationClient {
    async fn check_reachable(&self) -> Result<()> {
        let mut stream = self.connector.connect().await?;
        TransportStream::shutdown(&mut stream).await?;
        info!("[CLOUD] Location service reachable at {}", self.connector.address());
        Ok(())
    }

    async fn locate(&self, query: LocationQuery) -> Result<LocationResult, LocationError> {
        let body = self.request_body(&query);
        let mut line = serde_json::to_string(&body)
            .map_err(|e| LocationError::InvalidReply(format!("request encoding: {e}")))?;
        line.push('\n');

        debug!(
            "[CLOUD] Requesting location: {} LTE cells, {} access points",
            body.lte.len(),
            body.wifi.as_ref().map_or(0, |w| w.access_points.len())
        );

        let reply = timeout(self.request_timeout, self.round_trip(line))
            .await
            .map_err(|_| LocationError::Transport("request timed out".into()))??;

        match serde_json::from_str::<LocationReply>(&reply) {
            Ok(LocationReply::Fix(fix)) => Ok(fix.into()),
            Ok(LocationReply::Error(err)) => Err(LocationError::Cloud { code: err.error }),
            Err(e) => Err(LocationError::InvalidReply(e.to_string())),
        }
    }
}
