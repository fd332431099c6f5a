mod builder;
mod cli;
mod config;
mod error;
mod k8s;
mod model;
mod output;
mod reports;

use anyhow::{Context, Result};
use builder::{BuilderOptions, RowBuilder};
use clap::Parser;
use cli::{CliArgs, GlobalArgs};
use config::{ReportDefaults, split_sort_tokens};
use error::ReportError;
use k8s::{KubeGateway, PodQuery, PodSource, resolve_namespace};
use model::Table;
use reports::Report;
use std::collections::BTreeSet;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
enum OutlierMode {
    #[default]
    Keep,
    Suppress,
    Only,
}

impl OutlierMode {
    fn from_flags(suppress_outliers: bool, oddities: bool) -> Self {
        match (suppress_outliers, oddities) {
            (true, _) => Self::Suppress,
            (false, true) => Self::Only,
            (false, false) => Self::Keep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.global.log_filter)?;

    let defaults = ReportDefaults::discover()?;
    if let Some(source) = defaults.source() {
        debug!(config = %source.display(), "loaded defaults");
    }

    let report = args.command.report();
    let gateway = KubeGateway::new(args.global.context.clone()).await?;
    debug!(context = gateway.context(), report = report.name(), "starting report");

    if args.global.all_namespaces && args.global.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }
    let query = pod_query(&args, gateway.default_namespace());
    let options = builder_options(&report, &args.global, &defaults);
    let snapshot = gateway
        .fetch_snapshot(&query, options.label_node_name.is_some())
        .await?;

    let sort = if args.global.sort.is_empty() {
        defaults.sort_for(report.name())
    } else {
        split_sort_tokens(args.global.sort.as_slice())
    };
    let outliers = OutlierMode::from_flags(args.global.suppress_outliers, args.global.oddities);
    let table = build_table(&snapshot, &report, options, query, &sort, outliers)?;

    let format = args.global.output.or(defaults.output).unwrap_or_default();
    let rendered = output::render(&table, format)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

fn pod_query(args: &CliArgs, default_namespace: &str) -> PodQuery {
    PodQuery {
        namespace: resolve_namespace(args.global.namespace.as_deref(), default_namespace),
        all_namespaces: args.global.all_namespaces,
        pod_name: args.command.pod_name().map(str::to_string),
        selector: args.global.selector.clone(),
        container: args.global.container.clone(),
    }
}

fn builder_options(report: &Report, args: &GlobalArgs, defaults: &ReportDefaults) -> BuilderOptions {
    BuilderOptions {
        show_tree_view: args.tree || defaults.tree,
        show_namespace: args.show_namespace || defaults.show_namespace,
        show_node_name: args.show_node || defaults.show_node,
        label_node_name: args.node_label.clone(),
        label_pod_name: args.pod_label.clone(),
        ..report.builder_options()
    }
}

fn build_table(
    source: &dyn PodSource,
    report: &Report,
    options: BuilderOptions,
    query: PodQuery,
    sort: &[String],
    outliers: OutlierMode,
) -> Result<Table, ReportError> {
    let strategy = report.strategy();
    let mut builder = RowBuilder::new(options, query);
    builder.build(source, strategy)?;

    let tree_view = builder.tree_view();
    let offset = builder.default_header_len();
    let hidden = match (strategy.outlier_column(), outliers) {
        (_, OutlierMode::Keep) | (None, _) => BTreeSet::new(),
        (Some(_), _) if tree_view => {
            warn!("outlier filtering does not apply to the tree view, showing every row");
            BTreeSet::new()
        }
        (Some(column), OutlierMode::Suppress) => {
            builder.table().list_out_of_range(offset + column)?
        }
        (Some(column), OutlierMode::Only) => builder.table().list_in_range(offset + column)?,
    };

    let mut table = builder.into_table();
    table.hide_rows(hidden);

    if tree_view && !sort.is_empty() {
        warn!("sorting does not apply to the tree view, keeping pod order");
    } else {
        table.sort_by_names(sort)?;
    }
    debug!(
        rows = table.row_count(),
        hidden_rows = table.hidden_rows().len(),
        hidden_columns = table.hidden_columns().len(),
        sort = ?table.sort_order(),
        "table ready"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::{OutlierMode, build_table, builder_options, pod_query};
    use crate::cli::CliArgs;
    use crate::config::ReportDefaults;
    use crate::error::ReportError;
    use crate::k8s::{ClusterSnapshot, PodQuery};
    use crate::model::Table;
    use crate::reports::{Report, Restarts};
    use clap::Parser;
    use k8s_openapi::api::core::v1::Pod;
    use serde_json::json;

    fn pod(name: &str, restarts: i32) -> Pod {
        serde_json::from_value(json!({
            "metadata": { "name": name, "namespace": "shop" },
            "spec": { "containers": [{ "name": "app" }] },
            "status": { "containerStatuses": [
                { "name": "app", "image": "x", "imageID": "", "ready": true, "restartCount": restarts }
            ] }
        }))
        .unwrap()
    }

    fn two_containers(name: &str, restarts: [i32; 2]) -> Pod {
        serde_json::from_value(json!({
            "metadata": { "name": name, "namespace": "shop" },
            "spec": { "containers": [{ "name": "one" }, { "name": "two" }] },
            "status": { "containerStatuses": [
                { "name": "one", "image": "x", "imageID": "", "ready": true, "restartCount": restarts[0] },
                { "name": "two", "image": "x", "imageID": "", "ready": true, "restartCount": restarts[1] }
            ] }
        }))
        .unwrap()
    }

    fn fleet() -> ClusterSnapshot {
        ClusterSnapshot::new(
            [0, 1, 0, 1, 0, 40]
                .iter()
                .enumerate()
                .map(|(index, restarts)| pod(&format!("web-{index}"), *restarts))
                .collect(),
        )
    }

    fn restarts_table(outliers: OutlierMode, tree: bool, sort: &[&str]) -> Table {
        let report = Report::Restarts(Restarts);
        let mut options = report.builder_options();
        options.show_tree_view = tree;
        let sort = sort.iter().map(|token| token.to_string()).collect::<Vec<_>>();
        build_table(&fleet(), &report, options, PodQuery::default(), &sort, outliers).unwrap()
    }

    fn visible_pods(table: &Table) -> Vec<String> {
        table
            .visible_rows()
            .iter()
            .map(|row| row[1].display().into_owned())
            .collect()
    }

    #[test]
    fn suppress_hides_the_spike() {
        let table = restarts_table(OutlierMode::Suppress, false, &[]);
        assert_eq!(table.visible_rows().len(), 5);
        assert!(!visible_pods(&table).contains(&"web-5".to_string()));
    }

    #[test]
    fn oddities_show_only_the_spike() {
        let table = restarts_table(OutlierMode::Only, false, &[]);
        assert_eq!(visible_pods(&table), vec!["web-5"]);
    }

    #[test]
    fn tree_view_ignores_outlier_flags() {
        let table = restarts_table(OutlierMode::Suppress, true, &[]);
        assert!(table.hidden_rows().is_empty());
    }

    #[test]
    fn sort_uses_every_key_in_order() {
        let table = restarts_table(OutlierMode::Keep, false, &["!RESTARTS", "PODNAME"]);
        let pods = visible_pods(&table);
        assert_eq!(pods[0], "web-5");
        assert_eq!(pods[1..3], ["web-1", "web-3"]);
    }

    #[test]
    fn tree_view_keeps_children_under_their_pod_when_sorting() {
        let report = Report::Restarts(Restarts);
        let mut options = report.builder_options();
        options.show_tree_view = true;
        let snapshot = ClusterSnapshot::new(vec![
            two_containers("a", [1, 2]),
            two_containers("b", [9, 0]),
        ]);
        let table = build_table(
            &snapshot,
            &report,
            options,
            PodQuery::default(),
            &["!RESTARTS".to_string()],
            OutlierMode::Keep,
        )
        .unwrap();

        let names = visible_pods(&table);
        assert_eq!(
            names,
            vec![
                "Pod/a",
                "├─Container/one",
                "└─Container/two",
                "Pod/b",
                "├─Container/one",
                "└─Container/two",
            ]
        );
    }

    #[test]
    fn unknown_sort_column_is_reported() {
        let report = Report::Restarts(Restarts);
        let error = build_table(
            &fleet(),
            &report,
            report.builder_options(),
            PodQuery::default(),
            &["UPTIME".to_string()],
            OutlierMode::Keep,
        )
        .unwrap_err();
        assert!(matches!(error, ReportError::UnknownSortColumn(name) if name == "UPTIME"));
    }

    #[test]
    fn query_and_options_from_flags() {
        let args = CliArgs::try_parse_from([
            "podscope", "restarts", "web-1", "-c", "app", "--node-label", "zone",
        ])
        .unwrap();
        let query = pod_query(&args, "team");
        assert_eq!(query.namespace, "team");
        assert_eq!(query.pod_name.as_deref(), Some("web-1"));
        assert_eq!(query.container.as_deref(), Some("app"));

        let defaults = ReportDefaults::parse("tree: true\nshow_namespace: true\n").unwrap();
        let report = args.command.report();
        let options = builder_options(&report, &args.global, &defaults);
        assert!(options.show_tree_view);
        assert!(options.show_namespace);
        assert!(options.loop_status);
        assert_eq!(options.label_node_name.as_deref(), Some("zone"));
    }

    #[test]
    fn outlier_mode_from_flags() {
        assert_eq!(OutlierMode::from_flags(false, false), OutlierMode::Keep);
        assert_eq!(OutlierMode::from_flags(true, false), OutlierMode::Suppress);
        assert_eq!(OutlierMode::from_flags(false, true), OutlierMode::Only);
    }
}
