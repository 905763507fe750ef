//! Serving cell lookup over the modem link
//!
//! Sends `AT%XMONITOR` on the modem command channel and waits for the reply.
//! Modem lines are read by the main loop, which offers each one to
//! [`ModemCellSource::on_modem_line`] first; lines that belong to an ongoing
//! lookup are consumed there and never reach the host.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cellfix_shared::{xmonitor, Cell, LocationError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cloud::CellInfoSource;

/// Lookup waiting for the modem
struct PendingLookup {
    reply: Option<String>,
    /// `None` when the modem answered with an error
    done: oneshot::Sender<Option<String>>,
}

pub struct ModemCellSource {
    modem_tx: mpsc::Sender<String>,
    response_timeout: Duration,
    pending: Mutex<Option<PendingLookup>>,
    /// One `AT%XMONITOR` in flight at a time
    serial: tokio::sync::Mutex<()>,
}

fn lock(pending: &Mutex<Option<PendingLookup>>) -> MutexGuard<'_, Option<PendingLookup>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_error_response(line: &str) -> bool {
    line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR")
}

impl ModemCellSource {
    pub fn new(modem_tx: mpsc::Sender<String>, response_timeout: Duration) -> Self {
        Self {
            modem_tx,
            response_timeout,
            pending: Mutex::new(None),
            serial: tokio::sync::Mutex::new(()),
        }
    }

    /// Offer a line read from the modem. Returns `true` if it answered the
    /// ongoing lookup.
    ///
    /// A final `OK` is only taken once the `%XMONITOR` line has been seen,
    /// so the result of a forwarded host command is left alone.
    pub fn on_modem_line(&self, line: &str) -> bool {
        let mut slot = lock(&self.pending);
        let Some(lookup) = slot.as_mut() else {
            return false;
        };

        let line = line.trim();
        if xmonitor::is_reply(line) {
            lookup.reply = Some(line.to_string());
            return true;
        }

        let finished = match lookup.reply {
            Some(_) => line == "OK",
            None => is_error_response(line),
        };
        if !finished {
            return false;
        }
        if let Some(lookup) = slot.take() {
            // The requester may have timed out already
            let _ = lookup.done.send(lookup.reply);
        }
        true
    }

    async fn query(&self) -> Result<String, LocationError> {
        let (done_tx, done_rx) = oneshot::channel();
        *lock(&self.pending) = Some(PendingLookup {
            reply: None,
            done: done_tx,
        });

        if self.modem_tx.send(xmonitor::COMMAND.to_string()).await.is_err() {
            lock(&self.pending).take();
            return Err(LocationError::CellLookup("modem link closed".into()));
        }
        debug!("[MODEM] {} sent", xmonitor::COMMAND);

        let outcome = tokio::time::timeout(self.response_timeout, done_rx).await;
        lock(&self.pending).take();

        match outcome {
            Ok(Ok(Some(reply))) => Ok(reply),
            Ok(Ok(None)) => Err(LocationError::CellLookup(format!(
                "modem rejected {}",
                xmonitor::COMMAND
            ))),
            Ok(Err(_)) => Err(LocationError::CellLookup("lookup abandoned".into())),
            Err(_) => Err(LocationError::CellLookup(format!(
                "no reply within {:?}",
                self.response_timeout
            ))),
        }
    }
}

#[async_trait]
impl CellInfoSource for ModemCellSource {
    async fn serving_cell(&self) -> Result<Cell, LocationError> {
        let _serial = self.serial.lock().await;
        let reply = self.query().await?;

        match xmonitor::decode(&reply) {
            Ok(Some(cell)) if cell.has_valid_id() => {
                debug!("[MODEM] Serving cell {:08X}", cell.id);
                Ok(cell)
            }
            Ok(_) => Err(LocationError::CellLookup("not registered to a cell".into())),
            Err(e) => {
                warn!("[MODEM] Unreadable reply {:?}: {}", reply, e);
                Err(LocationError::CellLookup(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const REGISTERED: &str = "%XMONITOR: 1,\"EDAV\",\"EDAV\",\"26295\",\"00B7\",7,4,\"00011B07\",\
        7,2300,63,39,\"\",\"11100000\",\"00010011\",\"01001001\"";

    /// Answers `commands` commands with `lines`, recording whether each line
    /// was consumed
    fn fake_modem(
        source: Arc<ModemCellSource>,
        mut modem_rx: mpsc::Receiver<String>,
        lines: Vec<&'static str>,
        commands: usize,
    ) -> tokio::task::JoinHandle<Vec<bool>> {
        tokio::spawn(async move {
            let mut consumed = Vec::new();
            for _ in 0..commands {
                let Some(command) = modem_rx.recv().await else {
                    break;
                };
                assert_eq!(command, "AT%XMONITOR");
                for line in &lines {
                    consumed.push(source.on_modem_line(line));
                }
            }
            consumed
        })
    }

    fn source(timeout: Duration) -> (Arc<ModemCellSource>, mpsc::Receiver<String>) {
        let (modem_tx, modem_rx) = mpsc::channel(4);
        (Arc::new(ModemCellSource::new(modem_tx, timeout)), modem_rx)
    }

    #[tokio::test]
    async fn test_lookup_reads_serving_cell_from_reply() {
        let (source, modem_rx) = source(Duration::from_secs(2));
        let modem = fake_modem(source.clone(), modem_rx, vec![REGISTERED, "OK"], 2);

        let cell = source.serving_cell().await.expect("lookup failed");
        assert_eq!(cell.id, 0x11B07);
        assert_eq!((cell.mcc, cell.mnc), (262, 95));
        assert_eq!(cell.tac, 0xB7);
        assert_eq!(cell.rsrp, 63);

        // Second lookup sends the command again
        assert_eq!(source.serving_cell().await.unwrap().id, 0x11B07);

        assert_eq!(modem.await.unwrap(), vec![true; 4]);
    }

    #[tokio::test]
    async fn test_unrelated_lines_are_not_consumed() {
        let (source, modem_rx) = source(Duration::from_secs(2));
        let modem = fake_modem(
            source.clone(),
            modem_rx,
            vec!["OK", "%NCELLMEAS: 1", REGISTERED, "+CEREG: 5", "OK"],
            1,
        );

        source.serving_cell().await.expect("lookup failed");
        assert_eq!(modem.await.unwrap(), vec![false, false, true, false, true]);
    }

    #[tokio::test]
    async fn test_modem_error_fails_lookup() {
        let (source, modem_rx) = source(Duration::from_secs(2));
        let _modem = fake_modem(source.clone(), modem_rx, vec!["+CME ERROR: 14"], 1);

        let err = source.serving_cell().await.unwrap_err();
        assert!(matches!(err, LocationError::CellLookup(_)));
        assert_eq!(err.code(), -1);
    }

    #[tokio::test]
    async fn test_unregistered_modem_has_no_serving_cell() {
        let (source, modem_rx) = source(Duration::from_secs(2));
        let _modem = fake_modem(source.clone(), modem_rx, vec!["%XMONITOR: 2", "OK"], 1);

        assert!(matches!(
            source.serving_cell().await,
            Err(LocationError::CellLookup(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_modem_times_out() {
        let (source, mut modem_rx) = source(Duration::from_millis(50));

        let err = source.serving_cell().await.unwrap_err();
        assert!(matches!(err, LocationError::CellLookup(_)));
        assert_eq!(modem_rx.recv().await.as_deref(), Some("AT%XMONITOR"));

        // A late reply no longer belongs to any lookup
        assert!(!source.on_modem_line(REGISTERED));
        assert!(!source.on_modem_line("OK"));
    }

    #[tokio::test]
    async fn test_closed_modem_link_fails_lookup() {
        let (source, modem_rx) = source(Duration::from_secs(2));
        drop(modem_rx);
        assert!(source.serving_cell().await.is_err());
    }

    #[test]
    fn test_lines_without_lookup_pass_through() {
        let (modem_tx, _modem_rx) = mpsc::channel(1);
        let source = ModemCellSource::new(modem_tx, Duration::from_secs(1));
        assert!(!source.on_modem_line(REGISTERED));
        assert!(!source.on_modem_line("ERROR"));
    }
}
