use k8s_openapi::api::core::v1::ContainerStatus;

use crate::builder::{BranchBuilder, BuilderInformation, Strategy};
use crate::error::Result;
use crate::model::{Cell, Row};

/// Restart count per container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Restarts;

impl Strategy for Restarts {
    fn headers(&self) -> Vec<&'static str> {
        vec!["RESTARTS"]
    }

    fn build_container_status(
        &self,
        status: &ContainerStatus,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(vec![vec![Cell::number(status.restart_count)]])
    }

    fn branch(&self) -> Option<&dyn BranchBuilder> {
        Some(self)
    }

    fn outlier_column(&self) -> Option<usize> {
        Some(0)
    }
}

impl BranchBuilder for Restarts {
    fn build_branch(&self, _info: &BuilderInformation<'_>, rows: &[Row]) -> Result<Row> {
        let total = rows
            .iter()
            .filter_map(|row| row.first().and_then(Cell::as_number))
            .sum::<i64>();
        Ok(vec![Cell::number(total)])
    }
}

#[cfg(test)]
mod tests {
    use super::Restarts;
    use crate::builder::{BuilderOptions, RowBuilder};
    use crate::k8s::{ClusterSnapshot, PodQuery};
    use crate::model::Cell;
    use crate::reports::Report;
    use k8s_openapi::api::core::v1::Pod;
    use serde_json::{Value, json};

    fn status(name: &str, restarts: i32) -> Value {
        json!({ "name": name, "image": "img", "imageID": "", "ready": true, "restartCount": restarts })
    }

    fn pod(name: &str, restarts: &[i32]) -> Pod {
        let statuses = restarts
            .iter()
            .enumerate()
            .map(|(index, count)| status(&format!("c{index}"), *count))
            .collect::<Vec<_>>();
        serde_json::from_value(json!({
            "metadata": { "name": name },
            "spec": { "containers": [] },
            "status": { "containerStatuses": statuses }
        }))
        .unwrap()
    }

    fn build(options: BuilderOptions, pods: Vec<Pod>) -> RowBuilder {
        let mut builder = RowBuilder::new(options, PodQuery::default());
        builder
            .build(&ClusterSnapshot::new(pods), &Restarts)
            .unwrap();
        builder
    }

    #[test]
    fn reports_restart_counts_including_ephemeral() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "web-1" },
            "spec": { "containers": [] },
            "status": {
                "containerStatuses": [status("app", 4)],
                "initContainerStatuses": [status("init", 0)],
                "ephemeralContainerStatuses": [status("debug", 1)]
            }
        }))
        .unwrap();
        let builder = build(Report::Restarts(Restarts).builder_options(), vec![pod]);

        let rows = builder.table().rows();
        let tags = rows.iter().map(|row| row[0].display().into_owned()).collect::<Vec<_>>();
        assert_eq!(tags, vec!["S", "I", "E"]);
        let counts = rows.iter().map(|row| row[3].clone()).collect::<Vec<_>>();
        assert_eq!(counts, vec![Cell::number(4), Cell::number(0), Cell::number(1)]);
    }

    #[test]
    fn tree_view_sums_children_into_pod_row() {
        let options = BuilderOptions {
            show_tree_view: true,
            ..Report::Restarts(Restarts).builder_options()
        };
        let builder = build(options, vec![pod("web-1", &[2, 0, 3])]);

        let pod_row = &builder.table().rows()[0];
        assert_eq!(pod_row[1], Cell::text("Pod/web-1"));
        assert_eq!(pod_row[2], Cell::number(5));
    }

    #[test]
    fn spike_is_the_only_outlier() {
        let pods = [0, 1, 0, 1, 0, 40]
            .iter()
            .enumerate()
            .map(|(index, count)| pod(&format!("p{index}"), &[*count]))
            .collect();
        let builder = build(Report::Restarts(Restarts).builder_options(), pods);

        let column = builder.default_header_len();
        let outliers = builder.table().list_out_of_range(column).unwrap();
        assert_eq!(outliers.into_iter().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn sorting_descending_by_restarts() {
        let pods = vec![pod("a", &[1]), pod("b", &[9]), pod("c", &[3])];
        let mut table = build(Report::Restarts(Restarts).builder_options(), pods).into_table();
        table.sort_by_names(&["!restarts"]).unwrap();

        let names = table
            .rows()
            .iter()
            .map(|row| row[1].display().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b", "c", "a"]);
    }
}
