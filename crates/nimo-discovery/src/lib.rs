//! mDNS-based discovery of the Registry's command endpoint (C4).
//!
//! A process hosting the Registry [`announce`]s a service of type
//! [`SERVICE_TYPE`]; every other process calls [`Discovery::find_registry`]
//! to locate it. The lookup waits for two independent observations — an
//! address from the TXT record, a port from the SRV record — which arrive
//! on their own schedule from the mDNS responder, hence the pair of atomic
//! flags rather than a single "found" bit.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

pub const SERVICE_TYPE: &str = "_nimo_registry._tcp.local.";
pub const TXT_KEY_REGISTRY_ADDRESS: &str = "registry_address";
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum DiscoveryError {
    Daemon(mdns_sd::Error),
    Service(mdns_sd::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::Daemon(e) => write!(f, "failed to start mDNS daemon: {e}"),
            DiscoveryError::Service(e) => write!(f, "failed to register/browse mDNS service: {e}"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// The resolved Registry command endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

/// Threads the two process-wide flags the original design notes call out
/// as singletons (§9): whether this process should even bother waiting for
/// the Registry (a process that *is* the Registry skips the wait; tests
/// disable it globally) is held here instead, as an explicit value rather
/// than a bare global.
#[derive(Clone, Default)]
pub struct DiscoveryContext {
    skip_wait: Arc<AtomicBool>,
}

impl DiscoveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks that the current process never needs to wait for the
    /// Registry (it is the Registry itself, or it is a test harness).
    pub fn disable_wait(&self) {
        self.skip_wait.store(true, Ordering::SeqCst);
    }

    pub fn wait_disabled(&self) -> bool {
        self.skip_wait.load(Ordering::SeqCst)
    }
}

/// Publishes the Registry's command endpoint over mDNS. The returned
/// [`ServiceInfo`] keeps the registration alive; dropping the daemon (or
/// calling `unregister`) withdraws it.
pub fn announce(
    daemon: &ServiceDaemon,
    node_name: &str,
    hostname: &str,
    command_address: Ipv4Addr,
    port: u16,
) -> Result<ServiceInfo, DiscoveryError> {
    let mut properties = std::collections::HashMap::new();
    properties.insert(TXT_KEY_REGISTRY_ADDRESS.to_string(), command_address.to_string());
    let info = ServiceInfo::new(
        SERVICE_TYPE,
        node_name,
        hostname,
        command_address,
        port,
        Some(properties),
    )
    .map_err(DiscoveryError::Service)?;
    daemon
        .register(info.clone())
        .map_err(DiscoveryError::Service)?;
    tracing::info!(%node_name, %command_address, port, "announced registry endpoint over mDNS");
    Ok(info)
}

struct Observed {
    address: Mutex<Option<Ipv4Addr>>,
    port: Mutex<Option<u16>>,
    address_seen: AtomicBool,
    port_seen: AtomicBool,
}

impl Default for Observed {
    fn default() -> Self {
        Self {
            address: Mutex::new(None),
            port: Mutex::new(None),
            address_seen: AtomicBool::new(false),
            port_seen: AtomicBool::new(false),
        }
    }
}

/// A running browse session for the Registry's service record. Construct
/// one per process; [`Discovery::find_registry`] may be called repeatedly
/// and returns instantly once both flags are set, since the browser thread
/// keeps refreshing observations in the background.
pub struct Discovery {
    context: DiscoveryContext,
    observed: Arc<Observed>,
    daemon: ServiceDaemon,
}

impl Discovery {
    pub fn new(context: DiscoveryContext) -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(DiscoveryError::Daemon)?;
        Ok(Self {
            context,
            observed: Arc::new(Observed::default()),
            daemon,
        })
    }

    /// Starts the background browse thread. Safe to call more than once;
    /// only the first call has an effect.
    pub fn start_browser(&self) -> Result<(), DiscoveryError> {
        let receiver = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(DiscoveryError::Service)?;
        let observed = Arc::clone(&self.observed);
        std::thread::spawn(move || {
            while let Ok(event) = receiver.recv() {
                if let ServiceEvent::ServiceResolved(info) = event {
                    if let Some(addr) = info.get_addresses().iter().next() {
                        *observed.address.lock().unwrap() = Some(*addr);
                        observed.address_seen.store(true, Ordering::SeqCst);
                    }
                    if let Some(addr_txt) = info.get_property_val_str(TXT_KEY_REGISTRY_ADDRESS) {
                        if let Ok(parsed) = addr_txt.parse() {
                            *observed.address.lock().unwrap() = Some(parsed);
                            observed.address_seen.store(true, Ordering::SeqCst);
                        }
                    }
                    let port = info.get_port();
                    if port != 0 {
                        *observed.port.lock().unwrap() = Some(port);
                        observed.port_seen.store(true, Ordering::SeqCst);
                    }
                }
            }
        });
        Ok(())
    }

    /// Waits up to `timeout` for both an address and a port observation.
    /// A process whose [`DiscoveryContext`] has disabled waiting returns
    /// `None` immediately.
    pub fn find_registry(&self, timeout: Duration) -> Option<RegistryEndpoint> {
        if self.context.wait_disabled() {
            return None;
        }
        let _ = self.start_browser();
        let deadline = Instant::now() + timeout;
        loop {
            if self.observed.address_seen.load(Ordering::SeqCst)
                && self.observed.port_seen.load(Ordering::SeqCst)
            {
                let address = (*self.observed.address.lock().unwrap())?;
                let port = (*self.observed.port.lock().unwrap())?;
                return Some(RegistryEndpoint { address, port });
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_to_waiting() {
        let ctx = DiscoveryContext::new();
        assert!(!ctx.wait_disabled());
        ctx.disable_wait();
        assert!(ctx.wait_disabled());
    }

    #[test]
    fn find_registry_returns_immediately_when_wait_disabled() {
        let ctx = DiscoveryContext::new();
        ctx.disable_wait();
        let discovery = Discovery::new(ctx).expect("daemon should start");
        let started = Instant::now();
        let result = discovery.find_registry(Duration::from_secs(5));
        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn find_registry_times_out_with_no_registry_running() {
        let discovery = Discovery::new(DiscoveryContext::new()).expect("daemon should start");
        let started = Instant::now();
        let result = discovery.find_registry(Duration::from_millis(200));
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
