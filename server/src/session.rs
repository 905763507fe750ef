//! One location client connection
//!
//! Requests and replies are single JSON lines. A connection may carry any
//! number of requests; it ends when the client closes it.

use cellfix_shared::codec::{CodecError, LineDecoder};
use cellfix_shared::wire::{ErrorBody, FulfilledWith, LocationFix, LocationReply, LocationRequestBody};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Status returned for requests the service cannot resolve
pub const ERROR_BAD_REQUEST: i32 = 400;

/// Position handed out to every resolvable request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub uncertainty: u32,
}

/// Answer one request
///
/// Access points win over cells; a serving cell with neighbors counts as
/// multi-cell.
pub fn reply_for(request: &LocationRequestBody, position: &Position) -> LocationReply {
    let has_aps = request
        .wifi
        .as_ref()
        .is_some_and(|w| !w.access_points.is_empty());

    let fulfilled_with = if has_aps {
        FulfilledWith::Wifi
    } else if request.lte.iter().any(|c| !c.nmr.is_empty()) {
        FulfilledWith::Mcell
    } else if !request.lte.is_empty() {
        FulfilledWith::Scell
    } else {
        return LocationReply::Error(ErrorBody {
            error: ERROR_BAD_REQUEST,
        });
    };

    LocationReply::Fix(LocationFix {
        lat: position.lat,
        lon: position.lon,
        uncertainty: position.uncertainty,
        fulfilled_with,
    })
}

/// Serve one connection until the peer closes it
pub async fn serve<S>(mut stream: S, peer: &str, position: Position) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Client disconnected: {}", peer);
            return Ok(());
        }
        decoder.extend(&buf[..n]);

        loop {
            let line = match decoder.decode_next() {
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(CodecError::LineTooLong(len)) => {
                    warn!("[{}] Dropped request of {} bytes", peer, len);
                    continue;
                }
            };

            let reply = match serde_json::from_str::<LocationRequestBody>(&line) {
                Ok(request) => {
                    let reply = reply_for(&request, &position);
                    info!(
                        "[{}] {}: {} LTE cells, {} access points -> {:?}",
                        peer,
                        request.device_id,
                        request.lte.len(),
                        request.wifi.as_ref().map_or(0, |w| w.access_points.len()),
                        reply
                    );
                    reply
                }
                Err(e) => {
                    warn!("[{}] Malformed request: {}", peer, e);
                    LocationReply::Error(ErrorBody {
                        error: ERROR_BAD_REQUEST,
                    })
                }
            };

            let mut out = serde_json::to_string(&reply)?;
            out.push('\n');
            stream.write_all(out.as_bytes()).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, BufReader};

    const POSITION: Position = Position {
        lat: 61.5,
        lon: 23.75,
        uncertainty: 150,
    };

    fn request(json: &str) -> LocationRequestBody {
        serde_json::from_str(json).unwrap()
    }

    const CELL: &str = r#"{"mcc":262,"mnc":95,"eci":72455,"tac":183,"earfcn":7300,"rsrp":63,"rsrq":-8}"#;
    const CELL_WITH_NMR: &str = r#"{"mcc":262,"mnc":95,"eci":72455,"tac":183,"earfcn":7300,"rsrp":63,"rsrq":-8,
        "nmr":[{"earfcn":6400,"pci":309,"rsrp":55,"rsrq":-10,"timeDiff":20}]}"#;
    const WIFI: &str = r#"{"accessPoints":[{"macAddress":"AA:BB:CC:DD:EE:FF"},{"macAddress":"11:22:33:44:55:66"}]}"#;

    fn fulfilled_with(reply: LocationReply) -> Option<FulfilledWith> {
        match reply {
            LocationReply::Fix(fix) => Some(fix.fulfilled_with),
            LocationReply::Error(_) => None,
        }
    }

    #[test]
    fn test_method_follows_request_content() {
        let single = request(&format!(r#"{{"deviceId":"d","lte":[{CELL}]}}"#));
        assert_eq!(fulfilled_with(reply_for(&single, &POSITION)), Some(FulfilledWith::Scell));

        let multi = request(&format!(r#"{{"deviceId":"d","lte":[{CELL_WITH_NMR}]}}"#));
        assert_eq!(fulfilled_with(reply_for(&multi, &POSITION)), Some(FulfilledWith::Mcell));

        let wifi = request(&format!(r#"{{"deviceId":"d","lte":[{CELL}],"wifi":{WIFI}}}"#));
        assert_eq!(fulfilled_with(reply_for(&wifi, &POSITION)), Some(FulfilledWith::Wifi));
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let empty = request(r#"{"deviceId":"d"}"#);
        assert_eq!(
            reply_for(&empty, &POSITION),
            LocationReply::Error(ErrorBody { error: 400 })
        );
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let (client, server) = tokio::io::duplex(4096);
        let handle = tokio::spawn(async move { serve(server, "test", POSITION).await });

        let (reader, mut writer) = tokio::io::split(client);
        let mut lines = BufReader::new(reader).lines();

        let single = format!("{{\"deviceId\":\"d\",\"lte\":[{CELL}]}}\n");
        writer.write_all(single.as_bytes()).await.unwrap();
        let reply: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply["fulfilledWith"], "SCELL");
        assert_eq!(reply["uncertainty"], 150);

        writer.write_all(b"garbage\r\n").await.unwrap();
        let reply: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply["error"], 400);

        drop(writer);
        drop(lines);
        handle.await.unwrap().unwrap();
    }
}
