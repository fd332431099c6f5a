use k8s_openapi::api::core::v1::{Container, EphemeralContainer};

use crate::builder::{BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

/// Command line each container starts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Commands;

impl Commands {
    fn row(command: Option<&[String]>, args: Option<&[String]>) -> Row {
        vec![
            Cell::text(command.unwrap_or_default().join(" ")),
            Cell::text(args.unwrap_or_default().join(" ")),
        ]
    }
}

impl Strategy for Commands {
    fn headers(&self) -> Vec<&'static str> {
        vec!["COMMAND", "ARGUMENTS"]
    }

    fn build_container_spec(
        &self,
        container: &Container,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(vec![Self::row(
            container.command.as_deref(),
            container.args.as_deref(),
        )])
    }

    fn build_ephemeral_container_spec(
        &self,
        container: &EphemeralContainer,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(vec![Self::row(
            container.command.as_deref(),
            container.args.as_deref(),
        )])
    }
}
