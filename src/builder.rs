use k8s_openapi::api::core::v1::{
    Container, ContainerStatus, EphemeralContainer, Pod, PodSecurityContext,
};
use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::k8s::{PodQuery, PodSource};
use crate::model::{Cell, Row, Table};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ContainerKind {
    Standard,
    Init,
    Ephemeral,
}

impl ContainerKind {
    pub fn letter(self) -> &'static str {
        match self {
            Self::Standard => "S",
            Self::Init => "I",
            Self::Ephemeral => "E",
        }
    }
}

/// What a traversal step is looking at.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Entry {
    Pod,
    Container(ContainerKind),
}

impl Entry {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Container(_) => "Container",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Pod => "",
            Self::Container(kind) => kind.letter(),
        }
    }
}

/// Context handed to every strategy call. Built fresh per traversal step.
#[derive(Debug, Clone)]
pub struct BuilderInformation<'a> {
    pub pod: Option<&'a Pod>,
    pub pod_name: String,
    pub namespace: String,
    pub node_name: String,
    pub name: String,
    pub entry: Entry,
    pub tree_view: bool,
    pub node_label_value: String,
    pub pod_label_value: String,
}

impl<'a> BuilderInformation<'a> {
    pub fn for_pod(pod: &'a Pod, tree_view: bool) -> Self {
        let pod_name = pod.name_any();
        Self {
            pod: Some(pod),
            namespace: pod.namespace().unwrap_or_default(),
            node_name: pod
                .spec
                .as_ref()
                .and_then(|spec| spec.node_name.clone())
                .unwrap_or_default(),
            name: pod_name.clone(),
            pod_name,
            entry: Entry::Pod,
            tree_view,
            node_label_value: String::new(),
            pod_label_value: String::new(),
        }
    }

    /// Context with no pod attached, for table wide decisions.
    pub fn detached(tree_view: bool) -> Self {
        Self {
            pod: None,
            pod_name: String::new(),
            namespace: String::new(),
            node_name: String::new(),
            name: String::new(),
            entry: Entry::Pod,
            tree_view,
            node_label_value: String::new(),
            pod_label_value: String::new(),
        }
    }

    pub fn for_container(&self, name: &str, kind: ContainerKind) -> Self {
        Self {
            name: name.to_string(),
            entry: Entry::Container(kind),
            ..self.clone()
        }
    }

    pub fn pod_security_context(&self) -> Option<&'a PodSecurityContext> {
        self.pod
            .and_then(|pod| pod.spec.as_ref())
            .and_then(|spec| spec.security_context.as_ref())
    }
}

/// One report's view of a pod. Every `build_*` method returns rows holding
/// exactly `headers().len()` cells; the engine prepends the structural columns.
pub trait Strategy {
    fn headers(&self) -> Vec<&'static str>;

    fn build_pod(&self, _pod: &Pod, _info: &BuilderInformation<'_>) -> Result<Row> {
        Ok(vec![Cell::blank(); self.headers().len()])
    }

    fn build_container_spec(
        &self,
        _container: &Container,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn build_ephemeral_container_spec(
        &self,
        _container: &EphemeralContainer,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn build_container_status(
        &self,
        _status: &ContainerStatus,
        _info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn build_ephemeral_container_status(
        &self,
        status: &ContainerStatus,
        info: &BuilderInformation<'_>,
    ) -> Result<Vec<Row>> {
        self.build_container_status(status, info)
    }

    /// Indices are relative to `headers()`.
    fn hide_columns(&self, _info: &BuilderInformation<'_>) -> BTreeSet<usize> {
        BTreeSet::new()
    }

    /// Reports that fold child rows into their pod row return themselves here.
    fn branch(&self) -> Option<&dyn BranchBuilder> {
        None
    }

    /// Report relative index of the numeric column used for outlier handling.
    fn outlier_column(&self) -> Option<usize> {
        None
    }
}

pub trait BranchBuilder {
    fn build_branch(&self, info: &BuilderInformation<'_>, rows: &[Row]) -> Result<Row>;
}

#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    pub loop_spec: bool,
    pub loop_status: bool,
    pub show_init_containers: bool,
    pub show_ephemeral_containers: bool,
    pub show_pod_name: bool,
    pub show_tree_view: bool,
    pub show_namespace: bool,
    pub show_node_name: bool,
    pub label_node_name: Option<String>,
    pub label_pod_name: Option<String>,
}

pub struct RowBuilder {
    options: BuilderOptions,
    query: PodQuery,
    table: Table,
    default_header_len: usize,
}

struct ChildMeta {
    name: String,
    kind: ContainerKind,
}

impl RowBuilder {
    pub fn new(options: BuilderOptions, query: PodQuery) -> Self {
        Self {
            options,
            query,
            table: Table::default(),
            default_header_len: 0,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Number of structural columns ahead of the report's own columns.
    pub fn default_header_len(&self) -> usize {
        self.default_header_len
    }

    pub fn tree_view(&self) -> bool {
        self.options.show_tree_view
    }

    pub fn build(&mut self, source: &dyn PodSource, strategy: &dyn Strategy) -> Result<()> {
        let structural = self.structural_header();
        self.default_header_len = structural.len();
        self.table = Table::with_header(
            structural
                .into_iter()
                .chain(strategy.headers().into_iter().map(str::to_string)),
        );

        let pods = source.list_pods(&self.query)?;
        debug!(pods = pods.len(), tree = self.options.show_tree_view, "building rows");
        for pod in &pods {
            self.build_pod_rows(source, strategy, pod)?;
        }

        let info = BuilderInformation::detached(self.options.show_tree_view);
        let offset = self.default_header_len;
        self.table.hide_columns(
            strategy
                .hide_columns(&info)
                .into_iter()
                .map(|column| column + offset),
        );
        Ok(())
    }

    fn build_pod_rows(
        &mut self,
        source: &dyn PodSource,
        strategy: &dyn Strategy,
        pod: &Pod,
    ) -> Result<()> {
        let mut pod_info = BuilderInformation::for_pod(pod, self.options.show_tree_view);
        if let Some(key) = self.options.label_node_name.as_deref() {
            pod_info.node_label_value = source
                .node_label_value(&pod_info.node_name, key)
                .unwrap_or_default();
        }
        if let Some(key) = self.options.label_pod_name.as_deref() {
            pod_info.pod_label_value = source.pod_label_value(pod, key).unwrap_or_default();
        }

        let expected = strategy.headers().len();
        let pod_cells = if pod_info.tree_view {
            let cells = strategy
                .build_pod(pod, &pod_info)
                .and_then(|cells| check_arity(cells, expected))
                .map_err(|error| error.within(&pod_info.pod_name, "-"))?;
            Some(cells)
        } else {
            None
        };

        let mut meta = Vec::new();
        let mut rows = Vec::new();
        let mut collector = Collector {
            query: &self.query,
            pod_info: &pod_info,
            expected,
            meta: &mut meta,
            rows: &mut rows,
        };

        if self.options.loop_spec
            && let Some(spec) = pod.spec.as_ref()
        {
            collector.collect(
                ContainerKind::Standard,
                &spec.containers,
                |container| container.name.as_str(),
                |container, info| strategy.build_container_spec(container, info),
            )?;
            if self.options.show_init_containers {
                collector.collect(
                    ContainerKind::Init,
                    spec.init_containers.as_deref().unwrap_or_default(),
                    |container| container.name.as_str(),
                    |container, info| strategy.build_container_spec(container, info),
                )?;
            }
            if self.options.show_ephemeral_containers {
                collector.collect(
                    ContainerKind::Ephemeral,
                    spec.ephemeral_containers.as_deref().unwrap_or_default(),
                    |container| container.name.as_str(),
                    |container, info| strategy.build_ephemeral_container_spec(container, info),
                )?;
            }
        }

        if self.options.loop_status
            && let Some(status) = pod.status.as_ref()
        {
            collector.collect(
                ContainerKind::Standard,
                status.container_statuses.as_deref().unwrap_or_default(),
                |status| status.name.as_str(),
                |status, info| strategy.build_container_status(status, info),
            )?;
            if self.options.show_init_containers {
                collector.collect(
                    ContainerKind::Init,
                    status.init_container_statuses.as_deref().unwrap_or_default(),
                    |status| status.name.as_str(),
                    |status, info| strategy.build_container_status(status, info),
                )?;
            }
            if self.options.show_ephemeral_containers {
                collector.collect(
                    ContainerKind::Ephemeral,
                    status
                        .ephemeral_container_statuses
                        .as_deref()
                        .unwrap_or_default(),
                    |status| status.name.as_str(),
                    |status, info| strategy.build_ephemeral_container_status(status, info),
                )?;
            }
        }

        let Some(mut pod_cells) = pod_cells else {
            for (child, cells) in meta.into_iter().zip(rows) {
                let info = pod_info.for_container(&child.name, child.kind);
                let mut row = self.structural_cells(&info, None);
                row.extend(cells);
                self.table.add_row(row)?;
            }
            return Ok(());
        };

        if let Some(branch) = strategy.branch() {
            pod_cells = branch
                .build_branch(&pod_info, &rows)
                .and_then(|cells| check_arity(cells, expected))
                .map_err(|error| error.within(&pod_info.pod_name, "-"))?;
        }
        let mut pod_row =
            self.structural_cells(&pod_info, Some(format!("Pod/{}", pod_info.pod_name)));
        pod_row.extend(pod_cells);
        self.table.add_row(pod_row)?;

        let last = meta.len().saturating_sub(1);
        for (index, (child, cells)) in meta.into_iter().zip(rows).enumerate() {
            let info = pod_info.for_container(&child.name, child.kind);
            let branch = if index == last { "└─" } else { "├─" };
            let label = format!("{branch}{}/{}", info.entry.type_name(), child.name);
            let mut row = self.structural_cells(&info, Some(label));
            row.extend(cells);
            self.table.add_row(row)?;
        }
        Ok(())
    }

    fn shows_pod_name(&self) -> bool {
        self.options.show_pod_name && self.query.pod_name().is_none()
    }

    fn shows_namespace(&self) -> bool {
        self.options.show_namespace || self.query.all_namespaces
    }

    fn structural_header(&self) -> Vec<String> {
        let mut header = vec!["T".to_string()];
        if self.shows_namespace() {
            header.push("NAMESPACE".to_string());
        }
        if self.options.show_node_name {
            header.push("NODE".to_string());
        }
        if let Some(key) = self.options.label_node_name.as_deref() {
            header.push(key.to_string());
        }
        if let Some(key) = self.options.label_pod_name.as_deref() {
            header.push(key.to_string());
        }
        if self.options.show_tree_view {
            header.push("NAME".to_string());
        } else {
            if self.shows_pod_name() {
                header.push("PODNAME".to_string());
            }
            header.push("CONTAINER".to_string());
        }
        header
    }

    // `tree_label` carries the NAME cell in tree view and is ignored otherwise
    fn structural_cells(&self, info: &BuilderInformation<'_>, tree_label: Option<String>) -> Row {
        let mut cells = vec![Cell::text(info.entry.tag())];
        if self.shows_namespace() {
            cells.push(Cell::text(info.namespace.as_str()));
        }
        if self.options.show_node_name {
            cells.push(Cell::text(info.node_name.as_str()));
        }
        if self.options.label_node_name.is_some() {
            cells.push(Cell::text(info.node_label_value.as_str()));
        }
        if self.options.label_pod_name.is_some() {
            cells.push(Cell::text(info.pod_label_value.as_str()));
        }
        if info.tree_view {
            cells.push(Cell::text(tree_label.unwrap_or_default()));
        } else {
            if self.shows_pod_name() {
                cells.push(Cell::text(info.pod_name.as_str()));
            }
            cells.push(Cell::text(info.name.as_str()));
        }
        cells
    }
}

struct Collector<'c, 'a> {
    query: &'c PodQuery,
    pod_info: &'c BuilderInformation<'a>,
    expected: usize,
    meta: &'c mut Vec<ChildMeta>,
    rows: &'c mut Vec<Row>,
}

impl Collector<'_, '_> {
    fn collect<T>(
        &mut self,
        kind: ContainerKind,
        items: &[T],
        name_of: impl Fn(&T) -> &str,
        build: impl Fn(&T, &BuilderInformation<'_>) -> Result<Vec<Row>>,
    ) -> Result<()> {
        for item in items {
            let name = name_of(item);
            if self.query.skips_container(name) {
                debug!(container = name, "skipped by container filter");
                continue;
            }

            let info = self.pod_info.for_container(name, kind);
            let rows = build(item, &info).map_err(|error| error.within(&info.pod_name, name))?;
            for cells in rows {
                let cells = check_arity(cells, self.expected)
                    .map_err(|error| error.within(&info.pod_name, name))?;
                self.meta.push(ChildMeta {
                    name: name.to_string(),
                    kind,
                });
                self.rows.push(cells);
            }
        }
        Ok(())
    }
}

fn check_arity(cells: Row, expected: usize) -> Result<Row> {
    if cells.len() != expected {
        return Err(ReportError::MalformedRow {
            expected,
            actual: cells.len(),
        });
    }
    Ok(cells)
}
