use k8s_openapi::api::core::v1::{
    Container, EphemeralContainer, PodSecurityContext, SELinuxOptions, SecurityContext,
};

use crate::builder::{BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

/// Effective security settings per container. The pod security context
/// supplies defaults and the container's own context overrides them field
/// by field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Security {
    pub show_selinux: bool,
}

impl Security {
    pub fn new(show_selinux: bool) -> Self {
        Self { show_selinux }
    }

    fn row(&self, container: Option<&SecurityContext>, pod: Option<&PodSecurityContext>) -> Row {
        if self.show_selinux {
            selinux_row(
                container.and_then(|context| context.se_linux_options.as_ref()),
                pod.and_then(|context| context.se_linux_options.as_ref()),
            )
        } else {
            privilege_row(container, pod)
        }
    }
}

impl Strategy for Security {
    fn headers(&self) -> Vec<&'static str> {
        if self.show_selinux {
            vec!["USER", "ROLE", "TYPE", "LEVEL"]
        } else {
            vec![
                "ALLOW_PRIVILEGE_ESCALATION",
                "PRIVILEGED",
                "RO_ROOT_FS",
                "RUN_AS_NON_ROOT",
                "RUN_AS_USER",
                "RUN_AS_GROUP",
            ]
        }
    }

    fn build_container_spec(
        &self,
        container: &Container,
        info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(vec![self.row(
            container.security_context.as_ref(),
            info.pod_security_context(),
        )])
    }

    fn build_ephemeral_container_spec(
        &self,
        container: &EphemeralContainer,
        info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(vec![self.row(
            container.security_context.as_ref(),
            info.pod_security_context(),
        )])
    }
}

fn privilege_row(container: Option<&SecurityContext>, pod: Option<&PodSecurityContext>) -> Row {
    let flag = |value: Option<bool>| value.map(Cell::flag).unwrap_or_default();
    let id = |value: Option<i64>| value.map(Cell::number).unwrap_or_default();

    let run_as_non_root = container
        .and_then(|context| context.run_as_non_root)
        .or_else(|| pod.and_then(|context| context.run_as_non_root));
    let run_as_user = container
        .and_then(|context| context.run_as_user)
        .or_else(|| pod.and_then(|context| context.run_as_user));
    let run_as_group = container
        .and_then(|context| context.run_as_group)
        .or_else(|| pod.and_then(|context| context.run_as_group));

    vec![
        flag(container.and_then(|context| context.allow_privilege_escalation)),
        flag(container.and_then(|context| context.privileged)),
        flag(container.and_then(|context| context.read_only_root_filesystem)),
        flag(run_as_non_root),
        id(run_as_user),
        id(run_as_group),
    ]
}

fn selinux_row(container: Option<&SELinuxOptions>, pod: Option<&SELinuxOptions>) -> Row {
    let pick = |field: fn(&SELinuxOptions) -> Option<&String>| {
        container
            .and_then(field)
            .filter(|value| !value.is_empty())
            .or_else(|| pod.and_then(field).filter(|value| !value.is_empty()))
            .map(|value| Cell::text(value.as_str()))
            .unwrap_or_default()
    };

    vec![
        pick(|options| options.user.as_ref()),
        pick(|options| options.role.as_ref()),
        pick(|options| options.type_.as_ref()),
        pick(|options| options.level.as_ref()),
    ]
}
