// agent/src/ports.rs
//
// Keeps inbound firewall allowances in step with the configured game ports.

use std::sync::Arc;
use tracing::{error, warn};

use crate::sys::traits::{FirewallManager, Protocol};

/// An option whose value is also a port the firewall must admit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub option_name: &'static str,
    pub protocol: Protocol,
    pub description: String,
}

/// The server's port-definition list, described with the app's display name.
pub fn port_definitions(app_desc: &str) -> Vec<PortBinding> {
    vec![
        PortBinding { option_name: "Default Port", protocol: Protocol::Udp, description: format!("{} data port", app_desc) },
        PortBinding { option_name: "UDP Port", protocol: Protocol::Udp, description: format!("{} game port", app_desc) },
        PortBinding { option_name: "RCON Port", protocol: Protocol::Tcp, description: format!("{} RCON port", app_desc) },
    ]
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

pub struct PortReconciler {
    bindings: Vec<PortBinding>,
    firewall: Arc<dyn FirewallManager>,
}

impl PortReconciler {
    pub fn new(bindings: Vec<PortBinding>, firewall: Arc<dyn FirewallManager>) -> Self {
        Self { bindings, firewall }
    }

    pub fn bindings(&self) -> &[PortBinding] {
        &self.bindings
    }

    pub fn binding_for(&self, option_name: &str) -> Option<&PortBinding> {
        self.bindings.iter().find(|b| b.option_name.eq_ignore_ascii_case(option_name))
    }

    /// Reacts to one option transition. Removal of the old allowance runs first,
    /// and the new allowance is attempted even when removal fails. A new value
    /// that is not a port leaves the existing allowance in place.
    pub async fn on_option_changed(&self, option_name: &str, previous_value: Option<&str>, new_value: &str) {
        let Some(binding) = self.binding_for(option_name) else {
            return;
        };
        let Some(new_port) = parse_port(new_value) else {
            error!(option = binding.option_name, value = new_value, "refusing to move firewall allowance to a non-port value");
            return;
        };

        if let Some(previous) = previous_value.filter(|v| !v.trim().is_empty()) {
            match parse_port(previous) {
                Some(port) => {
                    if let Err(e) = self.firewall.remove(port, binding.protocol).await {
                        warn!(option = binding.option_name, port, error = %e, "could not remove old firewall allowance, continuing");
                    }
                }
                None => warn!(option = binding.option_name, previous, "previous value is not a port, nothing to remove"),
            }
        }

        self.allow_port(binding, new_port).await;
    }

    /// Admits the current value of a port option without touching old rules.
    pub async fn allow_current(&self, option_name: &str, value: &str) {
        if let Some(binding) = self.binding_for(option_name) {
            self.allow(binding, value).await;
        }
    }

    async fn allow(&self, binding: &PortBinding, value: &str) {
        match parse_port(value) {
            Some(port) => self.allow_port(binding, port).await,
            None => error!(option = binding.option_name, value, "refusing to open firewall for a non-port value"),
        }
    }

    async fn allow_port(&self, binding: &PortBinding, port: u16) {
        if let Err(e) = self.firewall.allow(port, binding.protocol, &binding.description).await {
            error!(option = binding.option_name, port, error = %e, "firewall allow failed");
        }
    }
}
