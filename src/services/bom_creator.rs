use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use crate::models::bom::{
    BomCreatorItem, BomCreatorRecord, BomNode, DocStatus, Item, DEFAULT_UOM,
};
use crate::models::job::{BomFailure, JobStatus};
use crate::services::bom_tree::{self, BomTreeError};
use crate::services::documents::DocumentStore;
use crate::services::inventory::Inventory;
use crate::services::jobs::JobStore;
use crate::services::queue::QueuedJob;
use crate::services::RepositoryError;

/// Why a single finished good could not be turned into a BOM Creator record.
#[derive(Debug, thiserror::Error)]
pub enum BomError {
    #[error("Item Group Master {0} does not exist in the system. Please create it before importing BOM.")]
    MissingItemGroup(String),

    #[error("Operation Master {0} does not exist in the system. Please create it before importing BOM")]
    MissingOperation(String),

    #[error("Row {row}: Quantity {value:?} is invalid.")]
    InvalidQuantity { row: usize, value: String },

    #[error("Rows with non-integer quantities when UOM is 'Nos': {}. Please change the UOM in the Item master for the given rows.", join_rows(.0))]
    FractionalQuantity(Vec<usize>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn join_rows(rows: &[usize]) -> String {
    rows.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
}

/// What happened to one finished good.
#[derive(Debug, Clone, PartialEq)]
pub enum BomOutcome {
    Created(String),
    /// A submitted BOM already exists for the item.
    Skipped(String),
}

/// The background work of a job: creates BOM Creator records for every finished good
/// of a document and reports progress on the job.
pub struct BomCreator {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    inventory: Arc<dyn Inventory>,
    company: String,
    timeout: Option<Duration>,
}

impl BomCreator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentStore>,
        inventory: Arc<dyn Inventory>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            documents,
            inventory,
            company: company.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a queued job to its terminal status.
    ///
    /// Failures never propagate: they end the job as `Failed` and are only visible
    /// through the job record.
    pub async fn process(&self, queued: &QueuedJob) -> JobStatus {
        match self.jobs.mark_started(queued.job_id).await {
            Ok(()) => {}
            Err(RepositoryError::NotRunning(_)) => {
                // Failed by housekeeping or a dispatch error before a worker got to it.
                warn!(job_id = %queued.job_id, "Job is no longer running, skipping");
                return JobStatus::Failed;
            }
            Err(e) => {
                error!(job_id = %queued.job_id, error = %e, "Failed to start BOM import");
                self.fail(queued, &e.to_string()).await;
                return JobStatus::Failed;
            }
        }

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(queued)).await {
                Ok(result) => result,
                Err(_) => {
                    let reason = format!("BOM import timed out after {limit:?}");
                    self.fail(queued, &reason).await;
                    return JobStatus::Failed;
                }
            },
            None => self.run(queued).await,
        };

        match result {
            Ok(status) => {
                match status {
                    JobStatus::Completed => metrics::counter!("bom_jobs_completed").increment(1),
                    _ => metrics::counter!("bom_jobs_failed").increment(1),
                }
                status
            }
            Err(e) => {
                error!(job_id = %queued.job_id, error = %e, "BOM import aborted");
                self.fail(queued, &e.to_string()).await;
                JobStatus::Failed
            }
        }
    }

    async fn fail(&self, queued: &QueuedJob, reason: &str) {
        metrics::counter!("bom_jobs_failed").increment(1);
        if let Err(e) = self.jobs.finish(queued.job_id, JobStatus::Failed, Some(reason)).await {
            warn!(job_id = %queued.job_id, error = %e, "Failed to record job failure");
        }
    }

    async fn run(&self, queued: &QueuedJob) -> Result<JobStatus, RepositoryError> {
        let job_id = queued.job_id;

        info!(
            job_id = %job_id,
            document_reference = %queued.document_reference,
            "Processing BOM import job"
        );

        let tree = match self.load_tree(&queued.document_reference).await? {
            Ok(tree) => tree,
            Err(reason) => {
                warn!(job_id = %job_id, reason = %reason, "Document is no longer importable");
                self.jobs.finish(job_id, JobStatus::Failed, Some(&reason)).await?;
                return Ok(JobStatus::Failed);
            }
        };

        let total = i32::try_from(tree.len()).unwrap_or(i32::MAX);
        let mut failed = false;

        for (index, root) in tree.iter().enumerate() {
            match self.create_from_hierarchy(root).await {
                Ok(BomOutcome::Created(name)) => {
                    metrics::counter!("bom_records_created_total").increment(1);
                    debug!(job_id = %job_id, bom = %name, "BOM Creator record created");
                }
                Ok(BomOutcome::Skipped(name)) => {
                    debug!(job_id = %job_id, bom = %name, "Submitted BOM exists, skipping");
                }
                Err(e) => {
                    failed = true;
                    warn!(job_id = %job_id, item_code = %root.item, row = root.row, error = %e, "Creation of BOM failed");
                    let failure = BomFailure {
                        item_code: root.item.clone(),
                        row: root.row,
                        reason: format!("Creation of {} failed: {}", root.item, e),
                    };
                    self.jobs.record_failure(job_id, &failure).await?;
                }
            }

            let processed = i32::try_from(index + 1).unwrap_or(i32::MAX);
            self.jobs.record_progress(job_id, processed, total).await?;
        }

        let status = if failed { JobStatus::Failed } else { JobStatus::Completed };
        self.jobs.finish(job_id, status, None).await?;

        info!(job_id = %job_id, status = %status, total = total, "BOM import job finished");
        Ok(status)
    }

    async fn load_tree(
        &self,
        reference: &str,
    ) -> Result<Result<Vec<BomNode>, String>, RepositoryError> {
        let Some(document) = self.documents.get(reference).await? else {
            return Ok(Err(format!("Document {reference} no longer exists")));
        };
        Ok(bom_tree::prepare(&document).map_err(|e: BomTreeError| e.to_string()))
    }

    /// Create the BOM Creator record for one finished good and its sub-tree.
    pub async fn create_from_hierarchy(&self, root: &BomNode) -> Result<BomOutcome, BomError> {
        if let Some(existing) = self.inventory.find_bom(&root.item).await? {
            if existing.docstatus == DocStatus::Submitted {
                return Ok(BomOutcome::Skipped(existing.name));
            }
            self.inventory.delete_bom(&existing.name).await?;
        }

        let item = self.get_or_create_item(root).await?;
        let items = self.sub_assembly_rows(root).await?;

        let record = BomCreatorRecord {
            name: item.item_code.clone(),
            item_code: item.item_code.clone(),
            item_name: item.description.clone(),
            company: self.company.clone(),
            qty: 1.0,
            uom: DEFAULT_UOM.to_string(),
            docstatus: DocStatus::Draft,
            items,
        };
        self.inventory.insert_bom(&record).await?;
        Ok(BomOutcome::Created(record.name))
    }

    async fn get_or_create_item(&self, node: &BomNode) -> Result<Item, BomError> {
        if let Some(item) = self.inventory.get_item(&node.item).await? {
            return Ok(item);
        }

        for operation in bom_tree::parse_operations(&node.operation) {
            if !self.inventory.operation_exists(operation).await? {
                return Err(BomError::MissingOperation(operation.to_string()));
            }
        }
        if !self.inventory.item_group_exists(&node.material).await? {
            return Err(BomError::MissingItemGroup(node.material.clone()));
        }

        let item = Item {
            item_code: node.item.clone(),
            item_name: node.item.clone(),
            description: if node.description.is_empty() {
                node.item.clone()
            } else {
                node.description.clone()
            },
            item_group: node.material.clone(),
            stock_uom: DEFAULT_UOM.to_string(),
            is_stock_item: false,
        };
        self.inventory.insert_item(&item).await?;
        Ok(item)
    }

    /// Flatten the sub-tree of a finished good into BOM Creator rows, depth first.
    async fn sub_assembly_rows(&self, root: &BomNode) -> Result<Vec<BomCreatorItem>, BomError> {
        let mut pairs = Vec::new();
        flatten(&root.children, root, &mut pairs);

        let mut rows: Vec<BomCreatorItem> = Vec::with_capacity(pairs.len());
        for (child, parent) in pairs {
            let item = self.get_or_create_item(child).await?;
            let qty = child
                .qty_per_set
                .parse::<f64>()
                .map_err(|_| BomError::InvalidQuantity {
                    row: child.row,
                    value: child.qty_per_set.clone(),
                })?;
            // Direct children of the finished good have no parent row.
            let parent_row_no = rows
                .iter()
                .position(|r| r.item_code == parent.item)
                .map(|i| i + 1);

            rows.push(BomCreatorItem {
                item_code: item.item_code,
                item_name: item.item_name,
                description: item.description,
                qty,
                uom: item.stock_uom,
                is_expandable: false,
                fg_item: parent.item.clone(),
                parent_row_no,
            });
        }

        mark_expandable(&mut rows);
        validate_row_uoms(&rows)?;
        Ok(rows)
    }
}

fn flatten<'a>(children: &'a [BomNode], parent: &'a BomNode, out: &mut Vec<(&'a BomNode, &'a BomNode)>) {
    for child in children {
        out.push((child, parent));
        flatten(&child.children, child, out);
    }
}

/// A row is expandable when another row names it as its parent row.
fn mark_expandable(rows: &mut [BomCreatorItem]) {
    let parents: Vec<usize> = rows.iter().filter_map(|r| r.parent_row_no).collect();
    for (idx, row) in rows.iter_mut().enumerate() {
        row.is_expandable = parents.contains(&(idx + 1));
    }
}

fn validate_row_uoms(rows: &[BomCreatorItem]) -> Result<(), BomError> {
    let fractional: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.uom == DEFAULT_UOM && r.qty.fract() != 0.0)
        .map(|(idx, _)| idx + 1)
        .collect();
    if fractional.is_empty() {
        Ok(())
    } else {
        Err(BomError::FractionalQuantity(fractional))
    }
}

/// Process jobs from an in-process channel until every sender is dropped.
pub async fn run_embedded_worker(creator: Arc<BomCreator>, mut receiver: mpsc::Receiver<QueuedJob>) {
    info!("Embedded BOM worker started");
    while let Some(job) = receiver.recv().await {
        let span = tracing::info_span!(
            "bom_import_job",
            job_id = %job.job_id,
            document_reference = %job.document_reference,
        );
        creator.process(&job).instrument(span).await;
    }
    info!("Embedded BOM worker stopped: channel closed");
}
