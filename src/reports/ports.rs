use k8s_openapi::api::core::v1::{Container, ContainerPort, EphemeralContainer};

use crate::builder::{BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

const DEFAULT_PROTOCOL: &str = "TCP";

/// Ports declared on each container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ports;

impl Ports {
    fn rows(ports: Option<&[ContainerPort]>) -> Vec<Row> {
        ports
            .unwrap_or_default()
            .iter()
            .map(|port| {
                let host_port = match port.host_port {
                    Some(value) if value > 0 => Cell::number(value),
                    _ => Cell::blank(),
                };
                vec![
                    Cell::text(port.name.clone().unwrap_or_default()),
                    Cell::number(port.container_port),
                    Cell::text(port.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL)),
                    host_port,
                ]
            })
            .collect()
    }
}

impl Strategy for Ports {
    fn headers(&self) -> Vec<&'static str> {
        vec!["PORTNAME", "PORT", "PROTO", "HOSTPORT"]
    }

    fn build_container_spec(
        &self,
        container: &Container,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Self::rows(container.ports.as_deref()))
    }

    fn build_ephemeral_container_spec(
        &self,
        container: &EphemeralContainer,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Self::rows(container.ports.as_deref()))
    }
}
