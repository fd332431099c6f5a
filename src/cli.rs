use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::reports::{Commands, Lifecycle, Ports, Report, Restarts, Security, Status};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "podscope",
    version,
    about = "Container level reports for Kubernetes pods."
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Namespace to read pods from
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// List pods across all namespaces
    #[arg(short = 'A', long, global = true)]
    pub all_namespaces: bool,

    /// Label selector, for example app=web
    #[arg(short = 'l', long, global = true)]
    pub selector: Option<String>,

    /// Only show containers with this exact name
    #[arg(short, long, global = true)]
    pub container: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Sort by column names, comma separated; prefix a name with ! for descending
    #[arg(long, global = true)]
    pub sort: Vec<String>,

    /// Nest containers under their pod
    #[arg(short, long, global = true)]
    pub tree: bool,

    /// Add a NAMESPACE column
    #[arg(long, global = true)]
    pub show_namespace: bool,

    /// Add a NODE column
    #[arg(long, global = true)]
    pub show_node: bool,

    /// Add a column with this label's value from each pod's node
    #[arg(long, global = true, value_name = "KEY")]
    pub node_label: Option<String>,

    /// Add a column with this label's value from each pod
    #[arg(long, global = true, value_name = "KEY")]
    pub pod_label: Option<String>,

    /// Hide rows whose value is an outlier
    #[arg(long, global = true, conflicts_with = "oddities")]
    pub suppress_outliers: bool,

    /// Only show rows whose value is an outlier
    #[arg(long, global = true)]
    pub oddities: bool,

    /// tracing filter (for example: warn,podscope=debug)
    #[arg(long, default_value = "warn", global = true)]
    pub log_filter: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Command and arguments each container starts with
    #[command(visible_aliases = ["commands", "cmd"])]
    Command(PodArg),

    /// postStart and preStop hooks
    Lifecycle(PodArg),

    /// Declared container ports
    #[command(visible_alias = "port")]
    Ports(PodArg),

    /// Restart counts
    #[command(visible_alias = "restart")]
    Restarts(PodArg),

    /// Security context settings
    #[command(visible_alias = "sec")]
    Security {
        #[command(flatten)]
        pod: PodArg,

        /// Show SELinux options instead of privilege settings
        #[arg(long)]
        selinux: bool,
    },

    /// Container state, readiness and exit details
    #[command(visible_alias = "st")]
    Status {
        #[command(flatten)]
        pod: PodArg,

        /// Show the last terminated state instead of the current one
        #[arg(short, long)]
        previous: bool,

        /// Show timestamp and message columns
        #[arg(short, long)]
        details: bool,

        /// Show the container ID column
        #[arg(long)]
        id: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PodArg {
    /// Only report on this pod
    #[arg(value_name = "POD")]
    pub name: Option<String>,
}

impl ReportCommand {
    pub fn pod_name(&self) -> Option<&str> {
        let pod = match self {
            Self::Command(pod)
            | Self::Lifecycle(pod)
            | Self::Ports(pod)
            | Self::Restarts(pod)
            | Self::Security { pod, .. }
            | Self::Status { pod, .. } => pod,
        };
        pod.name.as_deref()
    }

    pub fn report(&self) -> Report {
        match self {
            Self::Command(_) => Report::Commands(Commands),
            Self::Lifecycle(_) => Report::Lifecycle(Lifecycle),
            Self::Ports(_) => Report::Ports(Ports),
            Self::Restarts(_) => Report::Restarts(Restarts),
            Self::Security { selinux, .. } => Report::Security(Security::new(*selinux)),
            Self::Status {
                previous,
                details,
                id,
                ..
            } => Report::Status(Status::new(*previous, *details, *id)),
        }
    }
}
