//! SubnetScanner: finds devices on the local /24.
//!
//! A scan picks one local interface, derives the /24 around it, and probes
//! every other address in fixed-size batches.  Inside a batch all probes run
//! concurrently and are awaited together; batches run one after another so
//! the number of sockets open at once never exceeds the batch size.
//!
//! Each candidate gets a primary-port probe.  Only if that answers is the
//! secondary port probed as well.  Probe failures of any kind count as
//! "closed"; nothing a single host does can fail the scan.
//!
//! # Architecture
//!
//! The scanner depends only on the [`InterfaceSource`] and [`PortProber`]
//! traits.  The infrastructure layer supplies `pnet`- and tokio-backed
//! implementations; tests supply mocks.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use relay_core::{
    select_interface, DeliveryEvent, DevicePort, InterfaceSelectionError, LiveHost,
    LocalInterface, ScanTarget,
};
use tracing::{debug, info};

use crate::application::broadcaster::EventBroadcaster;
use crate::domain::config::ScanConfig;

/// Source of the machine's IPv4 interfaces.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceSource: Send + Sync {
    /// Non-loopback IPv4 interfaces, freshly enumerated on every call.
    fn interfaces(&self) -> Vec<LocalInterface>;
}

/// A bounded-time TCP reachability check.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Returns `true` if a TCP connect to `ip:port` completes within
    /// `timeout`.  Never fails: every error is reported as `false`.
    async fn probe(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Every interface that was available, not just the selected one.
    pub local_interfaces: Vec<LocalInterface>,
    /// The interface the sweep was derived from.
    pub selected: LocalInterface,
    pub target: ScanTarget,
    /// Hosts whose primary port answered, grouped in batch order.
    pub live_hosts: Vec<LiveHost>,
}

/// Sweeps the local /24 for devices listening on the primary port.
pub struct SubnetScanner {
    interfaces: Arc<dyn InterfaceSource>,
    prober: Arc<dyn PortProber>,
    events: Arc<EventBroadcaster>,
    batch_size: usize,
    probe_timeout: Duration,
}

impl SubnetScanner {
    pub fn new(
        interfaces: Arc<dyn InterfaceSource>,
        prober: Arc<dyn PortProber>,
        events: Arc<EventBroadcaster>,
        config: &ScanConfig,
    ) -> Self {
        Self {
            interfaces,
            prober,
            events,
            // A zero batch would never make progress.
            batch_size: config.batch_size.max(1),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// The interfaces a scan would choose from.
    pub fn local_interfaces(&self) -> Vec<LocalInterface> {
        self.interfaces.interfaces()
    }

    /// Runs one sweep.
    ///
    /// # Errors
    ///
    /// - [`InterfaceSelectionError::NoInterfaces`] if the machine has no
    ///   usable IPv4 interface.
    /// - [`InterfaceSelectionError::InterfaceNotFound`] if `interface` names
    ///   an interface that does not exist.
    pub async fn scan(&self, interface: Option<&str>) -> Result<ScanReport, InterfaceSelectionError> {
        let local_interfaces = self.interfaces.interfaces();
        let selected = select_interface(&local_interfaces, interface)?.clone();
        let target = ScanTarget::from_interface(&selected);
        let candidates = target.candidates();

        info!(
            "scanning {target} on {} ({} candidates, batches of {})",
            selected.name,
            candidates.len(),
            self.batch_size
        );
        self.events.publish(&DeliveryEvent::status(format!(
            "Scanning {target} on {}",
            selected.name
        )));

        let mut live_hosts = Vec::new();
        for (index, batch) in candidates.chunks(self.batch_size).enumerate() {
            let results = join_all(batch.iter().map(|&ip| self.probe_host(ip))).await;
            let before = live_hosts.len();
            live_hosts.extend(results.into_iter().flatten());
            debug!(
                "batch {index}: probed {} hosts, {} live",
                batch.len(),
                live_hosts.len() - before
            );
        }

        info!("scan complete: {} device(s) on {target}", live_hosts.len());
        self.events.publish(&DeliveryEvent::status(format!(
            "Scan complete. Found {} device(s)",
            live_hosts.len()
        )));

        Ok(ScanReport {
            local_interfaces,
            selected,
            target,
            live_hosts,
        })
    }

    async fn probe_host(&self, ip: Ipv4Addr) -> Option<LiveHost> {
        if !self
            .prober
            .probe(ip, DevicePort::PRIMARY_PORT, self.probe_timeout)
            .await
        {
            return None;
        }
        let secondary = self
            .prober
            .probe(ip, DevicePort::SECONDARY_PORT, self.probe_timeout)
            .await;
        Some(LiveHost::new(ip, secondary))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn eth0() -> LocalInterface {
        LocalInterface::new(
            "eth0",
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }

    fn source_with(interfaces: Vec<LocalInterface>) -> Arc<dyn InterfaceSource> {
        let mut source = MockInterfaceSource::new();
        source
            .expect_interfaces()
            .returning(move || interfaces.clone());
        Arc::new(source)
    }

    /// Prober where `primary` hosts answer on the primary port and
    /// `secondary` hosts answer on the secondary port.
    fn prober_with(primary: &[u8], secondary: &[u8]) -> MockPortProber {
        let primary: HashSet<u8> = primary.iter().copied().collect();
        let secondary: HashSet<u8> = secondary.iter().copied().collect();
        let mut prober = MockPortProber::new();
        prober.expect_probe().returning(move |ip, port, _| {
            let last = ip.octets()[3];
            match port {
                DevicePort::PRIMARY_PORT => primary.contains(&last),
                DevicePort::SECONDARY_PORT => secondary.contains(&last),
                _ => false,
            }
        });
        prober
    }

    fn scanner(source: Arc<dyn InterfaceSource>, prober: MockPortProber) -> SubnetScanner {
        SubnetScanner::new(
            source,
            Arc::new(prober),
            Arc::new(EventBroadcaster::new()),
            &ScanConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_scan_reports_only_hosts_with_primary_open() {
        // Arrange: .50 has both ports, .60 only primary, .70 only secondary
        let scanner = scanner(source_with(vec![eth0()]), prober_with(&[50, 60], &[50, 70]));

        // Act
        let report = scanner.scan(None).await.unwrap();

        // Assert
        assert_eq!(
            report.live_hosts,
            vec![
                LiveHost::new(Ipv4Addr::new(192, 168, 1, 50), true),
                LiveHost::new(Ipv4Addr::new(192, 168, 1, 60), false),
            ]
        );
        assert_eq!(report.selected, eth0());
        assert_eq!(report.target.prefix(), [192, 168, 1]);
    }

    #[tokio::test]
    async fn test_secondary_is_probed_only_after_primary_answers() {
        // Arrange: exactly two hosts answer on the primary port, so exactly
        // two secondary probes may happen.
        let mut prober = MockPortProber::new();
        prober
            .expect_probe()
            .withf(|_, port, _| *port == DevicePort::PRIMARY_PORT)
            .times(253)
            .returning(|ip, _, _| matches!(ip.octets()[3], 5 | 6));
        prober
            .expect_probe()
            .withf(|ip, port, _| {
                *port == DevicePort::SECONDARY_PORT && matches!(ip.octets()[3], 5 | 6)
            })
            .times(2)
            .returning(|ip, _, _| ip.octets()[3] == 5);
        let scanner = scanner(source_with(vec![eth0()]), prober);

        // Act
        let report = scanner.scan(None).await.unwrap();

        // Assert
        assert_eq!(report.live_hosts.len(), 2);
        assert!(report.live_hosts[0].has_port(DevicePort::Secondary));
        assert!(!report.live_hosts[1].has_port(DevicePort::Secondary));
    }

    #[tokio::test]
    async fn test_local_address_is_never_probed() {
        let mut prober = MockPortProber::new();
        prober
            .expect_probe()
            .withf(|ip, _, _| *ip == Ipv4Addr::new(192, 168, 1, 20))
            .never();
        prober.expect_probe().returning(|_, _, _| false);
        let scanner = scanner(source_with(vec![eth0()]), prober);

        let report = scanner.scan(None).await.unwrap();

        assert!(report.live_hosts.is_empty());
    }

    #[tokio::test]
    async fn test_probes_use_configured_timeout() {
        let mut prober = MockPortProber::new();
        prober
            .expect_probe()
            .withf(|_, _, timeout| *timeout == Duration::from_millis(250))
            .returning(|_, _, _| false);
        let config = ScanConfig {
            batch_size: 7,
            probe_timeout_ms: 250,
        };
        let scanner = SubnetScanner::new(
            source_with(vec![eth0()]),
            Arc::new(prober),
            Arc::new(EventBroadcaster::new()),
            &config,
        );

        assert!(scanner.scan(None).await.unwrap().live_hosts.is_empty());
    }

    /// Records how many probes overlap and the order they start and finish.
    #[derive(Default)]
    struct TrackingProber {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
        trace: std::sync::Mutex<Vec<(bool, Ipv4Addr)>>,
    }

    #[async_trait]
    impl PortProber for TrackingProber {
        async fn probe(&self, ip: Ipv4Addr, _port: u16, _timeout: Duration) -> bool {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.trace.lock().unwrap().push((true, ip));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.trace.lock().unwrap().push((false, ip));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_are_bounded_by_batch_size_and_batches_do_not_overlap() {
        // Arrange
        let prober = Arc::new(TrackingProber::default());
        let config = ScanConfig {
            batch_size: 10,
            probe_timeout_ms: 100,
        };
        let scanner = SubnetScanner::new(
            source_with(vec![eth0()]),
            Arc::clone(&prober) as Arc<dyn PortProber>,
            Arc::new(EventBroadcaster::new()),
            &config,
        );
        let candidates = ScanTarget::from_interface(&eth0()).candidates();
        let batch_of = |ip: Ipv4Addr| {
            candidates.iter().position(|c| *c == ip).unwrap() / config.batch_size
        };
        let batch_len = |batch: usize| {
            candidates
                .chunks(config.batch_size)
                .nth(batch)
                .map_or(0, <[Ipv4Addr]>::len)
        };

        // Act
        scanner.scan(None).await.unwrap();

        // Assert: never more than one batch in flight, and a full batch runs together
        assert_eq!(prober.peak.load(std::sync::atomic::Ordering::SeqCst), 10);

        // Assert: batch k+1 starts only after every probe of batch k returned
        let trace = prober.trace.lock().unwrap();
        assert_eq!(trace.len(), candidates.len() * 2);
        let mut finished = vec![0usize; candidates.len() / config.batch_size + 1];
        for &(started, ip) in trace.iter() {
            let batch = batch_of(ip);
            if started {
                if batch > 0 {
                    assert_eq!(
                        finished[batch - 1],
                        batch_len(batch - 1),
                        "{ip} started before batch {} finished",
                        batch - 1
                    );
                }
            } else {
                finished[batch] += 1;
            }
        }
    }

    #[tokio::test]
    async fn test_repeated_scans_yield_the_same_hosts() {
        let scanner = scanner(
            source_with(vec![eth0()]),
            prober_with(&[1, 99, 254], &[99]),
        );

        let first = scanner.scan(None).await.unwrap();
        let second = scanner.scan(None).await.unwrap();

        let as_set = |r: &ScanReport| r.live_hosts.iter().cloned().map(|h| h.ip()).collect::<HashSet<_>>();
        assert_eq!(as_set(&first), as_set(&second));
        assert_eq!(first.live_hosts, second.live_hosts);
    }

    #[tokio::test]
    async fn test_scan_with_no_interfaces_fails() {
        let scanner = scanner(source_with(Vec::new()), MockPortProber::new());

        let result = scanner.scan(None).await;

        assert_eq!(result.unwrap_err(), InterfaceSelectionError::NoInterfaces);
    }

    #[tokio::test]
    async fn test_scan_with_unknown_interface_name_fails() {
        let scanner = scanner(source_with(vec![eth0()]), MockPortProber::new());

        let result = scanner.scan(Some("wlan7")).await;

        assert_eq!(
            result.unwrap_err(),
            InterfaceSelectionError::InterfaceNotFound("wlan7".to_string())
        );
    }

    #[tokio::test]
    async fn test_scan_prefers_non_link_local_interface() {
        let link_local = LocalInterface::new(
            "usb0",
            Ipv4Addr::new(169, 254, 10, 10),
            Ipv4Addr::new(255, 255, 0, 0),
        );
        let scanner = scanner(
            source_with(vec![link_local, eth0()]),
            prober_with(&[], &[]),
        );

        let report = scanner.scan(None).await.unwrap();

        assert_eq!(report.selected.name, "eth0");
        assert_eq!(report.local_interfaces.len(), 2);
    }

    #[tokio::test]
    async fn test_scan_publishes_start_and_completion_status() {
        // Arrange
        let events = Arc::new(EventBroadcaster::new());
        let mut sub = events.subscribe();
        let scanner = SubnetScanner::new(
            source_with(vec![eth0()]),
            Arc::new(prober_with(&[50], &[])),
            Arc::clone(&events),
            &ScanConfig::default(),
        );

        // Act
        scanner.scan(None).await.unwrap();

        // Assert
        assert_eq!(
            sub.try_recv(),
            Some(DeliveryEvent::status("Scanning 192.168.1.x on eth0"))
        );
        assert_eq!(
            sub.try_recv(),
            Some(DeliveryEvent::status("Scan complete. Found 1 device(s)"))
        );
    }
}
