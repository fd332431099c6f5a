mod commands;
mod lifecycle;
mod ports;
mod restarts;
mod security;
mod status;

pub use commands::Commands;
pub use lifecycle::Lifecycle;
pub use ports::Ports;
pub use restarts::Restarts;
pub use security::Security;
pub use status::Status;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::builder::{BuilderOptions, Strategy};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A selected report together with its per-report switches.
#[derive(Debug, Clone)]
pub enum Report {
    Commands(Commands),
    Lifecycle(Lifecycle),
    Ports(Ports),
    Restarts(Restarts),
    Security(Security),
    Status(Status),
}

impl Report {
    /// Key used for per-report defaults in the config file.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Commands(_) => "commands",
            Self::Lifecycle(_) => "lifecycle",
            Self::Ports(_) => "ports",
            Self::Restarts(_) => "restarts",
            Self::Security(_) => "security",
            Self::Status(_) => "status",
        }
    }

    pub fn strategy(&self) -> &dyn Strategy {
        match self {
            Self::Commands(report) => report,
            Self::Lifecycle(report) => report,
            Self::Ports(report) => report,
            Self::Restarts(report) => report,
            Self::Security(report) => report,
            Self::Status(report) => report,
        }
    }

    /// Traversal switches for this report. Display switches are left off
    /// for the caller to fill in.
    pub fn builder_options(&self) -> BuilderOptions {
        let spec_walk = BuilderOptions {
            loop_spec: true,
            show_init_containers: true,
            show_pod_name: true,
            ..BuilderOptions::default()
        };
        let status_walk = BuilderOptions {
            loop_status: true,
            show_init_containers: true,
            show_pod_name: true,
            ..BuilderOptions::default()
        };

        match self {
            Self::Commands(_) | Self::Ports(_) | Self::Security(_) => spec_walk,
            Self::Lifecycle(_) => BuilderOptions {
                show_ephemeral_containers: true,
                ..spec_walk
            },
            Self::Restarts(_) => BuilderOptions {
                show_ephemeral_containers: true,
                ..status_walk
            },
            Self::Status(_) => status_walk,
        }
    }
}

pub(crate) fn format_timestamp(time: &Time) -> String {
    DateTime::<Utc>::from_timestamp(time.0.as_second(), 0)
        .map(|moment| moment.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

pub(crate) fn human_age(time: &Time) -> String {
    let elapsed_seconds = (Utc::now().timestamp() - time.0.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

pub(crate) fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

/// `:port` suffix for a probe or hook target; empty when no port is set.
pub(crate) fn port_as_string(port: &IntOrString) -> String {
    match port {
        IntOrString::Int(0) => String::new(),
        IntOrString::Int(value) => format!(":{value}"),
        IntOrString::String(value) if value.is_empty() => String::new(),
        IntOrString::String(value) => format!(":{value}"),
    }
}
