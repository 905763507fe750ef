//! Command executor - classifies host lines and dispatches them

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::handlers::{self, code, HandlerContext};
use super::parse::{parse_host_line, HostCommand};
use crate::cloud::{CloudState, LocationClient};
use crate::location::LocationOrchestrator;
use crate::notification::{MonitorOutcome, NotificationMonitor};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed; `lines` precede the final `OK`
    Completed { lines: Vec<String> },
    /// Command rejected; the host only sees `ERROR`
    Rejected { code: i32, message: String },
    /// Forwarded to the modem, which sends the final response itself
    Pending,
    /// Not a command; nothing is sent back
    Consumed,
}

impl CommandResult {
    /// Lines to send to the host
    pub fn into_response(self) -> Vec<String> {
        match self {
            Self::Completed { mut lines } => {
                lines.push("OK".into());
                lines
            }
            Self::Rejected { .. } => vec!["ERROR".into()],
            Self::Pending | Self::Consumed => Vec::new(),
        }
    }
}

/// Executes commands received on the host link
pub struct CommandExecutor {
    device_id: String,
    cloud_state: Arc<CloudState>,
    client: Arc<dyn LocationClient>,
    monitor: Arc<NotificationMonitor>,
    orchestrator: Arc<LocationOrchestrator>,
    modem_tx: Option<mpsc::Sender<String>>,
}

impl CommandExecutor {
    pub fn new(
        device_id: String,
        cloud_state: Arc<CloudState>,
        client: Arc<dyn LocationClient>,
        monitor: Arc<NotificationMonitor>,
        orchestrator: Arc<LocationOrchestrator>,
        modem_tx: Option<mpsc::Sender<String>>,
    ) -> Self {
        Self {
            device_id,
            cloud_state,
            client,
            monitor,
            orchestrator,
            modem_tx,
        }
    }

    /// Execute one host line
    pub async fn execute(&self, line: &str) -> CommandResult {
        let command = parse_host_line(line);
        debug!("[HOST] {:?}", command);

        let ctx = HandlerContext {
            device_id: &self.device_id,
            cloud_state: &self.cloud_state,
            client: self.client.as_ref(),
            monitor: &self.monitor,
            orchestrator: &self.orchestrator,
            modem_tx: self.modem_tx.as_ref(),
        };

        let result = match command {
            HostCommand::CloudPos(cmd) => handlers::handle_cloud_pos(&ctx, cmd),
            HostCommand::Cloud(cmd) => handlers::handle_cloud(&ctx, cmd).await,
            HostCommand::NcellmeasSet(cmd) => handlers::handle_ncellmeas(&ctx, cmd, line.trim()),
            HostCommand::NcellmeasStop => handlers::handle_ncellmeas_stop(&ctx, line.trim()),
            HostCommand::Notification(text) => {
                match self.monitor.on_notification(&text) {
                    MonitorOutcome::Published { measured } => {
                        debug!("[HOST] Replayed notification stored, measured: {}", measured);
                    }
                    MonitorOutcome::Rejected(e) => {
                        debug!("[HOST] Replayed notification rejected: {}", e);
                    }
                    MonitorOutcome::Ignored | MonitorOutcome::Paused => {}
                }
                CommandResult::Consumed
            }
            HostCommand::Unknown(text) => CommandResult::Rejected {
                code: code::ENOTSUP,
                message: format!("Unknown command {text:?}"),
            },
        };

        if let CommandResult::Rejected { code, message } = &result {
            warn!("[HOST] Command rejected: {} ({})", message, code);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationEvent;
    use crate::notification::MeasurementStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use cellfix_shared::{DecodeLimits, LocationError, LocationResult, LocationType, SearchType};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::cloud::LocationQuery;

    const STANDARD: &str = "%NCELLMEAS: 0,\"00011B07\",\"26295\",\"00B7\",10,7300,0,63,-8,13584,\
        6400,309,55,-10,20,13590";

    struct MockClient {
        reachable: AtomicBool,
    }

    #[async_trait]
    impl LocationClient for MockClient {
        async fn check_reachable(&self) -> Result<()> {
            if !self.reachable.load(Ordering::SeqCst) {
                bail!("connection refused");
            }
            Ok(())
        }

        async fn locate(&self, query: LocationQuery) -> Result<LocationResult, LocationError> {
            let kind = match query.cells {
                Some(crate::cloud::CellQuery::MultiCell(_)) => LocationType::MultiCell,
                _ => LocationType::SingleCell,
            };
            Ok(LocationResult {
                kind,
                latitude: 61.5,
                longitude: 23.75,
                uncertainty: 420,
            })
        }
    }

    struct Harness {
        executor: CommandExecutor,
        events: mpsc::Receiver<LocationEvent>,
        client: Arc<MockClient>,
        monitor: Arc<NotificationMonitor>,
        store: MeasurementStore,
    }

    fn harness(modem_tx: Option<mpsc::Sender<String>>) -> Harness {
        let store = MeasurementStore::new();
        let cloud_state = CloudState::new();
        let client = Arc::new(MockClient {
            reachable: AtomicBool::new(true),
        });
        let monitor = Arc::new(NotificationMonitor::new(store.clone(), DecodeLimits::default()));
        let (orchestrator, events) = LocationOrchestrator::new(
            store.clone(),
            cloud_state.clone(),
            Arc::new(store.clone()),
            client.clone(),
            2,
        );
        let executor = CommandExecutor::new(
            "cellfix-test".into(),
            cloud_state,
            client.clone(),
            monitor.clone(),
            Arc::new(orchestrator),
            modem_tx,
        );
        Harness {
            executor,
            events,
            client,
            monitor,
            store,
        }
    }

    #[tokio::test]
    async fn test_location_flow_over_host_lines() {
        let mut h = harness(None);

        let result = h.executor.execute("AT#XNRFCLOUDPOS=2,0").await;
        assert!(matches!(result, CommandResult::Rejected { code: -107, .. }));

        // Monitoring is paused until the link is up
        assert_eq!(h.executor.execute(STANDARD).await, CommandResult::Consumed);
        assert!(!h.store.is_measured());

        let result = h.executor.execute("AT#XNRFCLOUD=1").await;
        assert_eq!(result.into_response(), vec!["#XNRFCLOUD: 1,0", "OK"]);
        assert!(!h.monitor.is_paused());

        assert_eq!(h.executor.execute(STANDARD).await, CommandResult::Consumed);
        assert!(h.store.is_measured());

        let result = h.executor.execute("AT#XNRFCLOUDPOS=2,0").await;
        assert_eq!(result.into_response(), vec!["OK"]);

        let event = timeout(Duration::from_secs(2), h.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.response(), "#XNRFCLOUDPOS: 1,61.500000,23.750000,420");
    }

    #[tokio::test]
    async fn test_single_cell_without_modem_uses_stored_serving_cell() {
        let mut h = harness(None);
        h.executor.execute("AT#XNRFCLOUD=1").await;

        // Accepted without a measurement, but there is no cell to send
        let result = h.executor.execute("AT#XNRFCLOUDPOS=1,0").await;
        assert_eq!(result.into_response(), vec!["OK"]);
        let event = timeout(Duration::from_secs(2), h.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.response(), "#XNRFCLOUDPOS: -1");

        h.executor.execute(STANDARD).await;
        assert_eq!(
            h.executor.execute("AT#XNRFCLOUDPOS=1,0").await.into_response(),
            vec!["OK"]
        );
        let event = timeout(Duration::from_secs(2), h.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.response(), "#XNRFCLOUDPOS: 0,61.500000,23.750000,420");
        assert!(!h.store.is_measured());
    }

    #[tokio::test]
    async fn test_cloud_read_and_test_forms() {
        let h = harness(None);
        assert_eq!(
            h.executor.execute("AT#XNRFCLOUD?").await.into_response(),
            vec!["#XNRFCLOUD: 0,0,\"cellfix-test\"", "OK"]
        );
        assert_eq!(
            h.executor.execute("AT#XNRFCLOUD=?").await.into_response(),
            vec!["#XNRFCLOUD: (0,1),<send_location>", "OK"]
        );

        h.executor.execute("AT#XNRFCLOUD=1,1").await;
        assert_eq!(
            h.executor.execute("AT#XNRFCLOUD?").await.into_response(),
            vec!["#XNRFCLOUD: 1,1,\"cellfix-test\"", "OK"]
        );
    }

    #[tokio::test]
    async fn test_cloud_connect_errors() {
        let h = harness(None);

        h.client.reachable.store(false, Ordering::SeqCst);
        let result = h.executor.execute("AT#XNRFCLOUD=1").await;
        assert!(matches!(result, CommandResult::Rejected { code: -5, .. }));
        assert!(h.monitor.is_paused());

        h.client.reachable.store(true, Ordering::SeqCst);
        let result = h.executor.execute("AT#XNRFCLOUD=1,2").await;
        assert!(matches!(result, CommandResult::Rejected { code: -22, .. }));

        h.executor.execute("AT#XNRFCLOUD=1").await;
        let result = h.executor.execute("AT#XNRFCLOUD=1").await;
        assert!(matches!(result, CommandResult::Rejected { code: -22, .. }));

        let result = h.executor.execute("AT#XNRFCLOUD=0").await;
        assert_eq!(result.into_response(), vec!["#XNRFCLOUD: 0,0", "OK"]);
        assert!(h.monitor.is_paused());
    }

    #[tokio::test]
    async fn test_cloud_pos_read_form_is_unsupported() {
        let h = harness(None);
        let result = h.executor.execute("AT#XNRFCLOUDPOS?").await;
        assert!(matches!(result, CommandResult::Rejected { code: -95, .. }));
        assert_eq!(result.into_response(), vec!["ERROR"]);
    }

    #[tokio::test]
    async fn test_search_type_interception() {
        let h = harness(None);

        assert_eq!(h.executor.execute("AT%NCELLMEAS=4").await.into_response(), vec!["OK"]);
        assert_eq!(h.monitor.search_type(), SearchType::GciExtendedLight);

        // Test form and rejected values leave it unchanged
        h.executor.execute("AT%NCELLMEAS=?").await;
        assert!(matches!(
            h.executor.execute("AT%NCELLMEAS=9").await,
            CommandResult::Rejected { .. }
        ));
        assert_eq!(h.monitor.search_type(), SearchType::GciExtendedLight);

        h.executor.execute("AT%NCELLMEAS").await;
        assert_eq!(h.monitor.search_type(), SearchType::Default);
        assert_eq!(h.executor.execute("AT%NCELLMEASSTOP").await.into_response(), vec!["OK"]);
    }

    #[tokio::test]
    async fn test_modem_commands_are_forwarded() {
        let (modem_tx, mut modem_rx) = mpsc::channel(4);
        let h = harness(Some(modem_tx));

        assert_eq!(h.executor.execute("AT%NCELLMEAS=1\r").await, CommandResult::Pending);
        assert_eq!(modem_rx.recv().await.as_deref(), Some("AT%NCELLMEAS=1"));
        assert_eq!(h.monitor.search_type(), SearchType::ExtendedLight);

        assert_eq!(h.executor.execute("AT%NCELLMEASSTOP").await, CommandResult::Pending);
        assert_eq!(modem_rx.recv().await.as_deref(), Some("AT%NCELLMEASSTOP"));
    }

    #[tokio::test]
    async fn test_quoted_rssi_is_not_an_rssi() {
        let mut h = harness(None);
        h.executor.execute("AT#XNRFCLOUD=1").await;

        let result = h
            .executor
            .execute("AT#XNRFCLOUDPOS=0,1,\"AA:BB:CC:DD:EE:FF\",\"-70\",\"11:22:33:44:55:66\"")
            .await;
        assert!(matches!(result, CommandResult::Rejected { code: -74, .. }));

        let result = h
            .executor
            .execute("AT#XNRFCLOUDPOS=0,1,\"AA:BB:CC:DD:EE:FF\",-70,\"11:22:33:44:55:66\"")
            .await;
        assert_eq!(result.into_response(), vec!["OK"]);
        let event = timeout(Duration::from_secs(2), h.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, LocationEvent::Resolved(_)));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let h = harness(None);
        assert_eq!(h.executor.execute("AT+CGMR").await.into_response(), vec!["ERROR"]);
    }
}
