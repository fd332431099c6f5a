use k8s_openapi::api::core::v1::{
    Container, EphemeralContainer, Lifecycle as LifecycleHooks, LifecycleHandler,
};

use super::port_as_string;
use crate::builder::{BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

/// postStart and preStop hooks declared on each container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle;

impl Lifecycle {
    fn rows(hooks: Option<&LifecycleHooks>) -> Vec<Row> {
        let Some(hooks) = hooks else {
            return Vec::new();
        };

        [
            ("postStart", hooks.post_start.as_ref()),
            ("preStop", hooks.pre_stop.as_ref()),
        ]
        .into_iter()
        .filter_map(|(stage, handler)| {
            let (kind, action) = describe_handler(handler?)?;
            Some(vec![Cell::text(stage), Cell::text(kind), Cell::text(action)])
        })
        .collect()
    }
}

impl Strategy for Lifecycle {
    fn headers(&self) -> Vec<&'static str> {
        vec!["LIFECYCLE", "HANDLER", "ACTION"]
    }

    fn build_container_spec(
        &self,
        container: &Container,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Self::rows(container.lifecycle.as_ref()))
    }

    fn build_ephemeral_container_spec(
        &self,
        container: &EphemeralContainer,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Self::rows(container.lifecycle.as_ref()))
    }
}

// handler with none of the known actions set yields no row
fn describe_handler(handler: &LifecycleHandler) -> Option<(&'static str, String)> {
    if let Some(exec) = handler.exec.as_ref() {
        let command = exec.command.as_deref().unwrap_or_default().join(" ");
        return Some(("Exec", command));
    }

    if let Some(http) = handler.http_get.as_ref() {
        let mut action = String::new();
        if let Some(scheme) = http.scheme.as_deref().filter(|scheme| !scheme.is_empty()) {
            action.push_str(&scheme.to_lowercase());
            action.push_str("://");
        }
        action.push_str(http.host.as_deref().unwrap_or_default());
        action.push_str(&port_as_string(&http.port));
        action.push_str(http.path.as_deref().unwrap_or_default());
        return Some(("HTTPGet", action));
    }

    if let Some(tcp) = handler.tcp_socket.as_ref() {
        let action = format!(
            "{}{}",
            tcp.host.as_deref().unwrap_or_default(),
            port_as_string(&tcp.port)
        );
        return Some(("TCPSocket", action));
    }

    handler
        .sleep
        .as_ref()
        .map(|sleep| ("Sleep", format!("{}s", sleep.seconds)))
}
