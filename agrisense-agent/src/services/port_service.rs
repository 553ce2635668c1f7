use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serialport::{available_ports, SerialPortType};

use crate::configs::{Resolver, Sensors, UsbId};
use crate::errors::LinkError;
use crate::models::SensorRole;
use crate::services::{Connector, LinkSettings, FIELD_COUNT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub usb: Option<UsbId>,
}

impl PortInfo {
    pub fn usb<S: Into<String>>(name: S, vid: u16, pid: u16) -> Self {
        Self {
            name: name.into(),
            usb: Some(UsbId { vid, pid }),
        }
    }
}

pub trait PortEnumerator: Send + Sync {
    fn ports(&self) -> Result<Vec<PortInfo>, LinkError>;
}

/// Serial devices currently attached to this host.
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> Result<Vec<PortInfo>, LinkError> {
        Ok(available_ports()?
            .into_iter()
            .map(|port| PortInfo {
                usb: match port.port_type {
                    SerialPortType::UsbPort(info) => Some(UsbId {
                        vid: info.vid,
                        pid: info.pid,
                    }),
                    _ => None,
                },
                name: port.port_name,
            })
            .collect())
    }
}

/// Maps a sensor role to the port it is attached to.
pub trait PortResolver: Send + Sync {
    fn resolve(&self, role: SensorRole) -> Option<String>;
}

pub fn create_resolver(
    sensors: &Sensors,
    enumerator: Box<dyn PortEnumerator>,
    connector: Arc<dyn Connector>,
) -> Box<dyn PortResolver> {
    match &sensors.resolver {
        Resolver::Static { soil, environmental } => Box::new(StaticResolver {
            soil: soil.clone(),
            environmental: environmental.clone(),
        }),
        Resolver::Vendor { soil, environmental, generic } => Box::new(VendorResolver {
            enumerator,
            soil: *soil,
            environmental: *environmental,
            generic: generic.clone(),
        }),
        Resolver::Probe { usb_id } => Box::new(ProbeResolver::new(
            enumerator,
            connector,
            *usb_id,
            LinkSettings::from(&sensors.soil),
            LinkSettings::from(&sensors.environmental),
        )),
    }
}

pub struct StaticResolver {
    pub soil: Option<String>,
    pub environmental: Option<String>,
}

impl PortResolver for StaticResolver {
    fn resolve(&self, role: SensorRole) -> Option<String> {
        let port = match role {
            SensorRole::Soil => self.soil.clone(),
            SensorRole::Environmental => self.environmental.clone(),
        }?;

        // device nodes only exist as files on unix, COM names are taken as is
        if cfg!(unix) && !Path::new(&port).exists() {
            tracing::warn!("Configured {} port {} does not exist", role, port);
            return None;
        }

        Some(port)
    }
}

pub struct VendorResolver {
    pub enumerator: Box<dyn PortEnumerator>,
    pub soil: Option<UsbId>,
    pub environmental: Option<UsbId>,
    pub generic: Vec<UsbId>,
}

impl PortResolver for VendorResolver {
    fn resolve(&self, role: SensorRole) -> Option<String> {
        let ports = match self.enumerator.ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };

        let wanted = match role {
            SensorRole::Soil => self.soil,
            SensorRole::Environmental => self.environmental,
        };

        if let Some(id) = wanted {
            let matches: Vec<&PortInfo> = ports.iter().filter(|port| port.usb == Some(id)).collect();

            return match matches.as_slice() {
                [port] => Some(port.name.clone()),
                [] => {
                    tracing::warn!("No {} sensor with id {:04X}:{:04X}", role, id.vid, id.pid);
                    None
                }
                _ => {
                    tracing::warn!(
                        "{} devices share id {:04X}:{:04X}, cannot tell which is the {} sensor",
                        matches.len(),
                        id.vid,
                        id.pid,
                        role
                    );
                    None
                }
            };
        }

        ports
            .into_iter()
            .find(|port| port.usb.is_some_and(|usb| self.generic.contains(&usb)))
            .map(|port| {
                tracing::info!("Using generic adapter {} for the {} sensor", port.name, role);
                port.name
            })
    }
}

/// Asks every adapter with a shared id whether it answers like a sensor.
///
/// A nine-field answer only proves a sensor is attached; which role it has is
/// inferred from probe order, so the first role resolved claims the first
/// responding adapter.
pub struct ProbeResolver {
    enumerator: Box<dyn PortEnumerator>,
    connector: Arc<dyn Connector>,
    usb_id: UsbId,
    soil: LinkSettings,
    environmental: LinkSettings,
    claimed: Mutex<HashSet<String>>,
}

impl ProbeResolver {
    pub fn new(
        enumerator: Box<dyn PortEnumerator>,
        connector: Arc<dyn Connector>,
        usb_id: UsbId,
        soil: LinkSettings,
        environmental: LinkSettings,
    ) -> Self {
        Self {
            enumerator,
            connector,
            usb_id,
            soil,
            environmental,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    fn probe(&self, port: &str, role: SensorRole, settings: &LinkSettings) -> bool {
        let mut link = match self.connector.open(port, settings) {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("Probe skipped {}: {}", port, e);
                return false;
            }
        };

        let line = match link.send(role.command()) {
            Ok(()) => link.receive(),
            Err(e) => {
                tracing::warn!("Probe write to {} failed: {}", port, e);
                String::new()
            }
        };
        link.close();

        let fields = line.split(',').count();
        tracing::debug!("Probe {} with {}: {:?} ({} fields)", port, role.command(), line, fields);

        !line.is_empty() && fields == FIELD_COUNT
    }
}

impl PortResolver for ProbeResolver {
    fn resolve(&self, role: SensorRole) -> Option<String> {
        let ports = match self.enumerator.ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };

        let settings = match role {
            SensorRole::Soil => &self.soil,
            SensorRole::Environmental => &self.environmental,
        };

        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);

        let found = ports
            .into_iter()
            .filter(|port| port.usb == Some(self.usb_id) && !claimed.contains(&port.name))
            .find(|port| self.probe(&port.name, role, settings))?;

        tracing::info!("Probe assigned {} to the {} sensor", found.name, role);
        claimed.insert(found.name.clone());

        Some(found.name)
    }
}
