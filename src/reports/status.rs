use k8s_openapi::api::core::v1::{ContainerState, ContainerStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::BTreeSet;

use super::{format_timestamp, human_age};
use crate::builder::{BranchBuilder, BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

const READY: usize = 0;
const STARTED: usize = 1;
const RESTARTS: usize = 2;
const STATE: usize = 3;
const REASON: usize = 4;
const ID: usize = 7;
const TIMESTAMP: usize = 8;
const AGE: usize = 9;
const MESSAGE: usize = 10;

/// Current (or last terminated) state of every container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status {
    pub previous: bool,
    pub details: bool,
    pub show_id: bool,
}

impl Status {
    pub fn new(previous: bool, details: bool, show_id: bool) -> Self {
        Self {
            previous,
            details,
            show_id,
        }
    }
}

#[derive(Default)]
struct StateView {
    name: &'static str,
    reason: String,
    message: String,
    exit_code: Cell,
    signal: Cell,
    started_at: Option<Time>,
}

impl StateView {
    fn from_state(state: Option<&ContainerState>) -> Self {
        let mut view = Self::default();
        let Some(state) = state else {
            return view;
        };

        if let Some(waiting) = state.waiting.as_ref() {
            view.name = "Waiting";
            view.reason = waiting.reason.clone().unwrap_or_default();
            view.message = waiting.message.clone().unwrap_or_default();
        }

        if let Some(terminated) = state.terminated.as_ref() {
            view.name = "Terminated";
            view.reason = terminated.reason.clone().unwrap_or_default();
            view.message = terminated.message.clone().unwrap_or_default();
            view.exit_code = Cell::number(terminated.exit_code);
            view.signal = Cell::number(terminated.signal.unwrap_or_default());
            view.started_at = terminated.started_at.clone();
        }

        if let Some(running) = state.running.as_ref() {
            view.name = "Running";
            view.started_at = running.started_at.clone();
        }

        view
    }
}

impl Strategy for Status {
    fn headers(&self) -> Vec<&'static str> {
        vec![
            "READY",
            "STARTED",
            "RESTARTS",
            "STATE",
            "REASON",
            "EXIT-CODE",
            "SIGNAL",
            "ID",
            "TIMESTAMP",
            "AGE",
            "MESSAGE",
        ]
    }

    fn build_container_status(
        &self,
        status: &ContainerStatus,
        info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        let state = if self.previous {
            status.last_state.as_ref()
        } else {
            status.state.as_ref()
        };
        let view = StateView::from_state(state);

        // a waiting container has no start time to age from
        let (timestamp, age) = match view.started_at.as_ref() {
            Some(started_at) if view.name != "Waiting" => {
                (format_timestamp(started_at), human_age(started_at))
            }
            _ => (String::new(), String::new()),
        };

        Ok(vec![vec![
            Cell::flag(status.ready),
            status.started.map(Cell::flag).unwrap_or_default(),
            Cell::number(status.restart_count),
            Cell::text(view.name),
            Cell::text(view.reason),
            view.exit_code,
            view.signal,
            Cell::text(status.container_id.clone().unwrap_or_default()),
            Cell::text(timestamp),
            Cell::text(age),
            Cell::text(trim_status_message(&view.message, &info.pod_name, &info.name)),
        ]])
    }

    fn hide_columns(&self, _info: &BuilderInformation<'_>) -> BTreeSet<usize> {
        let mut hidden = BTreeSet::new();
        if self.details {
            hidden.extend([ID, AGE]);
        }
        if self.previous {
            hidden.extend([READY, STARTED, RESTARTS, ID, AGE]);
        }
        if hidden.is_empty() {
            hidden.extend([ID, TIMESTAMP, MESSAGE]);
        }
        if self.show_id {
            hidden.remove(&ID);
        }
        hidden
    }

    fn branch(&self) -> Option<&dyn BranchBuilder> {
        Some(self)
    }

    fn outlier_column(&self) -> Option<usize> {
        // previous state carries no meaningful restart count
        (!self.previous).then_some(RESTARTS)
    }
}

impl BranchBuilder for Status {
    fn build_branch(&self, info: &BuilderInformation<'_>, rows: &[Row]) -> Result<Row> {
        let mut out = vec![Cell::blank(); self.headers().len()];

        let all_ready = rows
            .iter()
            .all(|row| row.get(READY).is_none_or(|cell| cell.display() != "false"));
        let all_started = rows
            .iter()
            .all(|row| row.get(STARTED).is_none_or(|cell| cell.display() != "false"));
        let restarts = rows
            .iter()
            .filter_map(|row| row.get(RESTARTS).and_then(Cell::as_number))
            .sum::<i64>();

        out[READY] = Cell::flag(all_ready);
        out[STARTED] = Cell::flag(all_started);
        out[RESTARTS] = Cell::number(restarts);

        let Some(pod) = info.pod else {
            return Ok(out);
        };

        let phase = if pod.metadata.deletion_timestamp.is_some() {
            "Terminating".to_string()
        } else {
            pod.status
                .as_ref()
                .and_then(|status| status.phase.clone())
                .unwrap_or_default()
        };
        out[STATE] = Cell::text(phase);
        if let Some(status) = pod.status.as_ref() {
            out[REASON] = Cell::text(status.reason.clone().unwrap_or_default());
            out[MESSAGE] = Cell::text(status.message.clone().unwrap_or_default());
        }
        if let Some(created) = pod.metadata.creation_timestamp.as_ref() {
            out[TIMESTAMP] = Cell::text(format_timestamp(created));
            out[AGE] = Cell::text(human_age(created));
        }
        Ok(out)
    }
}

/// Drops the `container=<name>` and `pod=<pod>_...` tokens kubelet embeds in
/// messages, since both already have their own columns.
fn trim_status_message(message: &str, pod_name: &str, container_name: &str) -> String {
    let container_token = format!("container={container_name}");
    let pod_prefix = format!("pod={pod_name}_");
    message
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter(|token| container_name.is_empty() || *token != container_token)
        .filter(|token| pod_name.is_empty() || !token.starts_with(&pod_prefix))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{Status, trim_status_message};
    use crate::builder::{BranchBuilder, BuilderInformation, BuilderOptions, RowBuilder, Strategy};
    use crate::k8s::{ClusterSnapshot, PodQuery};
    use crate::model::Cell;
    use crate::reports::Report;
    use chrono::{Duration, Utc};
    use k8s_openapi::api::core::v1::Pod;
    use serde_json::{Value, json};
    use std::collections::BTreeSet;

    fn hidden(status: Status) -> Vec<usize> {
        status
            .hide_columns(&BuilderInformation::detached(false))
            .into_iter()
            .collect()
    }

    fn pod(statuses: Value, extra_status: Value) -> Pod {
        let mut status = json!({ "phase": "Running", "containerStatuses": statuses });
        if let (Some(target), Some(extra)) = (status.as_object_mut(), extra_status.as_object()) {
            target.extend(extra.clone());
        }
        serde_json::from_value(json!({
            "metadata": { "name": "web-1", "creationTimestamp": "2024-05-01T10:00:00Z" },
            "spec": { "containers": [] },
            "status": status
        }))
        .unwrap()
    }

    fn rows(status: Status, pod: Pod) -> Vec<Vec<Cell>> {
        let mut builder = RowBuilder::new(
            Report::Status(status).builder_options(),
            PodQuery::default(),
        );
        builder.build(&ClusterSnapshot::new(vec![pod]), &status).unwrap();
        builder
            .table()
            .rows()
            .iter()
            .map(|row| row[3..].to_vec())
            .collect()
    }

    #[test]
    fn default_view_hides_id_timestamp_and_message() {
        assert_eq!(hidden(Status::default()), vec![7, 8, 10]);
        assert_eq!(hidden(Status::new(false, false, true)), vec![8, 10]);
    }

    #[test]
    fn details_and_previous_hide_rules() {
        assert_eq!(hidden(Status::new(false, true, false)), vec![7, 9]);
        assert_eq!(hidden(Status::new(true, false, false)), vec![0, 1, 2, 7, 9]);
        assert_eq!(hidden(Status::new(true, true, true)), vec![0, 1, 2, 9]);
    }

    #[test]
    fn running_container_row() {
        let started = (Utc::now() - Duration::minutes(5)).to_rfc3339();
        let pod = pod(
            json!([{
                "name": "app", "image": "nginx", "imageID": "", "ready": true, "started": true,
                "restartCount": 1, "containerID": "containerd://abc",
                "state": { "running": { "startedAt": started } }
            }]),
            json!({}),
        );

        let row = &rows(Status::default(), pod)[0];
        assert_eq!(row[0], Cell::text("true"));
        assert_eq!(row[1], Cell::text("true"));
        assert_eq!(row[2], Cell::number(1));
        assert_eq!(row[3], Cell::text("Running"));
        assert_eq!(row[5], Cell::blank());
        assert_eq!(row[7], Cell::text("containerd://abc"));
        assert_eq!(row[9], Cell::text("5m"));
    }

    #[test]
    fn waiting_container_has_no_age() {
        let pod = pod(
            json!([{
                "name": "app", "image": "nginx", "imageID": "", "ready": false, "restartCount": 7,
                "state": { "waiting": { "reason": "CrashLoopBackOff", "message": "back-off 5m0s restarting failed container=app pod=web-1_shop(1234)" } }
            }]),
            json!({}),
        );

        let row = &rows(Status::default(), pod)[0];
        assert_eq!(row[1], Cell::blank());
        assert_eq!(row[3], Cell::text("Waiting"));
        assert_eq!(row[4], Cell::text("CrashLoopBackOff"));
        assert_eq!(row[8], Cell::blank());
        assert_eq!(row[9], Cell::blank());
        assert_eq!(row[10], Cell::text("back-off 5m0s restarting failed"));
    }

    #[test]
    fn previous_reads_last_termination() {
        let pod = pod(
            json!([{
                "name": "app", "image": "nginx", "imageID": "", "ready": true, "restartCount": 2,
                "state": { "running": { "startedAt": "2024-05-02T00:00:00Z" } },
                "lastState": { "terminated": {
                    "exitCode": 137, "signal": 9, "reason": "OOMKilled",
                    "startedAt": "2024-05-01T11:00:00Z", "finishedAt": "2024-05-01T23:59:00Z"
                } }
            }]),
            json!({}),
        );

        let status = Status::new(true, false, false);
        assert_eq!(status.outlier_column(), None);
        let row = &rows(status, pod)[0];
        assert_eq!(row[3], Cell::text("Terminated"));
        assert_eq!(row[4], Cell::text("OOMKilled"));
        assert_eq!(row[5], Cell::number(137));
        assert_eq!(row[6], Cell::number(9));
        assert_eq!(row[8], Cell::text("2024-05-01 11:00:00"));
    }

    #[test]
    fn branch_folds_readiness_and_restarts() {
        let pod = pod(
            json!([
                { "name": "a", "image": "x", "imageID": "", "ready": true, "started": true, "restartCount": 2 },
                { "name": "b", "image": "x", "imageID": "", "ready": false, "started": true, "restartCount": 0 },
                { "name": "c", "image": "x", "imageID": "", "ready": true, "started": true, "restartCount": 3 }
            ]),
            json!({ "reason": "Evicted", "message": "low on memory" }),
        );
        let status = Status::default();
        let options = BuilderOptions {
            show_tree_view: true,
            ..Report::Status(status).builder_options()
        };
        let mut builder = RowBuilder::new(options, PodQuery::default());
        builder.build(&ClusterSnapshot::new(vec![pod]), &status).unwrap();

        let pod_row = &builder.table().rows()[0][2..];
        assert_eq!(pod_row[0], Cell::text("false"));
        assert_eq!(pod_row[1], Cell::text("true"));
        assert_eq!(pod_row[2], Cell::number(5));
        assert_eq!(pod_row[3], Cell::text("Running"));
        assert_eq!(pod_row[4], Cell::text("Evicted"));
        assert_eq!(pod_row[8], Cell::text("2024-05-01 10:00:00"));
        assert_eq!(pod_row[10], Cell::text("low on memory"));
        assert_eq!(builder.table().hidden_columns(), &BTreeSet::from([9, 10, 12]));
    }

    #[test]
    fn deleted_pod_is_terminating() {
        let mut pod = pod(json!([]), json!({}));
        pod.metadata.deletion_timestamp = pod.metadata.creation_timestamp.clone();
        let status = Status::default();
        let info = BuilderInformation::for_pod(&pod, true);

        let row = status.branch().unwrap().build_branch(&info, &[]).unwrap();
        assert_eq!(row[3], Cell::text("Terminating"));
        assert_eq!(row[0], Cell::text("true"));
        assert_eq!(row[2], Cell::number(0));
    }

    #[test]
    fn message_trimming_keeps_other_tokens() {
        assert_eq!(
            trim_status_message("failed container=web pod=web-1_ns(uid) again", "web-1", "web"),
            "failed again"
        );
        assert_eq!(trim_status_message("container=web2 ok", "web-1", "web"), "container=web2 ok");
        assert_eq!(trim_status_message("", "web-1", "web"), "");
    }
}
