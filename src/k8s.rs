use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::ReportError;

const DEFAULT_NAMESPACE: &str = "default";

/// Which pods and containers a report should look at.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PodQuery {
    pub namespace: String,
    pub all_namespaces: bool,
    pub pod_name: Option<String>,
    pub selector: Option<String>,
    pub container: Option<String>,
}

impl PodQuery {
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.pod_name().is_some() && self.selector().is_some() {
            return Err(ReportError::InvalidSelector);
        }
        Ok(())
    }

    pub fn pod_name(&self) -> Option<&str> {
        non_empty(self.pod_name.as_deref())
    }

    pub fn selector(&self) -> Option<&str> {
        non_empty(self.selector.as_deref())
    }

    pub fn namespace_label(&self) -> &str {
        if self.all_namespaces {
            "all namespaces"
        } else {
            &self.namespace
        }
    }

    /// Containers are matched on their exact name.
    pub fn skips_container(&self, name: &str) -> bool {
        non_empty(self.container.as_deref()).is_some_and(|wanted| wanted != name)
    }
}

/// The pod data a report is built from. Label lookups never fail; a missing
/// node, pod or key simply yields `None`.
pub trait PodSource {
    fn list_pods(&self, query: &PodQuery) -> Result<Vec<Pod>, ReportError>;

    fn node_label_value(&self, node_name: &str, key: &str) -> Option<String>;

    fn pod_label_value(&self, pod: &Pod, key: &str) -> Option<String> {
        pod.labels().get(key).cloned()
    }
}

/// Pods and node labels fetched once, ahead of row building.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pods: Vec<Pod>,
    node_labels: HashMap<String, BTreeMap<String, String>>,
}

impl ClusterSnapshot {
    pub fn new(pods: Vec<Pod>) -> Self {
        Self {
            pods,
            node_labels: HashMap::new(),
        }
    }

    pub fn with_node_labels(
        mut self,
        node: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        self.node_labels.insert(node.into(), labels);
        self
    }
}

impl PodSource for ClusterSnapshot {
    fn list_pods(&self, query: &PodQuery) -> Result<Vec<Pod>, ReportError> {
        query.validate()?;

        if let Some(name) = query.pod_name() {
            let mut matches = self.pods.iter().filter(|pod| pod.name_any() == name).cloned();
            let named = if query.all_namespaces {
                matches.collect::<Vec<_>>()
            } else {
                matches.next().into_iter().collect()
            };
            if named.is_empty() {
                return Err(ReportError::PodNotFound {
                    namespace: query.namespace_label().to_string(),
                    name: name.to_string(),
                });
            }
            return Ok(named);
        }

        if self.pods.is_empty() {
            return Err(ReportError::NotFound {
                namespace: query.namespace_label().to_string(),
            });
        }
        Ok(self.pods.clone())
    }

    fn node_label_value(&self, node_name: &str, key: &str) -> Option<String> {
        self.node_labels
            .get(node_name)
            .and_then(|labels| labels.get(key))
            .cloned()
    }
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new(context: Option<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context is unavailable in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let active_context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());
        debug!(context = %active_context, namespace = %default_namespace, "connected");

        Ok(Self {
            client,
            context: active_context,
            default_namespace,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub async fn fetch_snapshot(
        &self,
        query: &PodQuery,
        with_node_labels: bool,
    ) -> Result<ClusterSnapshot, ReportError> {
        query.validate()?;

        let pods = self.fetch_pods(query).await?;
        let mut snapshot = ClusterSnapshot::new(pods);
        if with_node_labels {
            snapshot = self
                .fetch_node_labels()
                .await
                .into_iter()
                .fold(snapshot, |snapshot, (node, labels)| {
                    snapshot.with_node_labels(node, labels)
                });
        }
        Ok(snapshot)
    }

    async fn fetch_pods(&self, query: &PodQuery) -> Result<Vec<Pod>, ReportError> {
        let pods: Api<Pod> = if query.all_namespaces {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), &query.namespace)
        };

        if let Some(name) = query.pod_name() {
            debug!(pod = name, namespace = query.namespace_label(), "fetching single pod");
            if query.all_namespaces {
                // a get needs a namespace, so match the name across namespaces
                let params = ListParams::default().fields(&format!("metadata.name={name}"));
                let list = pods.list(&params).await.map_err(|error| {
                    ReportError::upstream(format!("failed to retrieve pod {name} from server"), error)
                })?;
                if list.items.is_empty() {
                    return Err(ReportError::PodNotFound {
                        namespace: query.namespace_label().to_string(),
                        name: name.to_string(),
                    });
                }
                return Ok(list.items);
            }

            let pod = pods.get_opt(name).await.map_err(|error| {
                ReportError::upstream(format!("failed to retrieve pod {name} from server"), error)
            })?;
            return pod.map(|pod| vec![pod]).ok_or_else(|| ReportError::PodNotFound {
                namespace: query.namespace_label().to_string(),
                name: name.to_string(),
            });
        }

        let mut params = ListParams::default();
        if let Some(selector) = query.selector() {
            params = params.labels(selector);
        }
        let list = pods.list(&params).await.map_err(|error| {
            ReportError::upstream("failed to retrieve pod list from server", error)
        })?;
        debug!(count = list.items.len(), namespace = query.namespace_label(), "listed pods");

        if list.items.is_empty() {
            return Err(ReportError::NotFound {
                namespace: query.namespace_label().to_string(),
            });
        }
        Ok(list.items)
    }

    async fn fetch_node_labels(&self) -> HashMap<String, BTreeMap<String, String>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        match nodes.list(&ListParams::default()).await {
            Ok(list) => list
                .items
                .into_iter()
                .map(|node| {
                    let name = node.name_any();
                    let labels = node.metadata.labels.unwrap_or_default();
                    (name, labels)
                })
                .collect(),
            Err(error) => {
                warn!("node labels unavailable, node label column will be blank: {error}");
                HashMap::new()
            }
        }
    }
}

/// An explicit namespace wins, then the kube context's namespace, then `default`.
pub fn resolve_namespace(explicit: Option<&str>, context_default: &str) -> String {
    non_empty(explicit)
        .or_else(|| non_empty(Some(context_default)))
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
