//! Workflow Configuration Module
//!
//! Declarative workflow configurations describe the assistants of a workflow,
//! their tools and their datasources. Applying a new configuration diffs it
//! against the last applied one and converges the persisted entities.
//!
//! # Pipeline
//!
//! 1. `schema::parse` validates the YAML document
//! 2. `diff` classifies each position of the assistant and tool lists, and
//!    the datasource URL sets
//! 3. `transform` maps declarative fields onto persistence fields
//! 4. `reconciler` issues the gateway calls in dependency order
//! 5. `service` appends the applied configuration to the history
//!
//! # Usage
//!
//! ```ignore
//! let service = WorkflowConfigService::new(gateway, transformer);
//! let outcome = service.reconcile(&workflow_config_id, yaml, &caller).await?;
//! println!("history: {}", outcome.history_id);
//! ```

pub mod diff;
pub mod reconciler;
pub mod schema;
pub mod service;
pub mod sniff;
pub mod transform;

pub use diff::{compare_dicts, diff_entries, diff_urls, EntryChange, UrlDiff};
pub use reconciler::{EntityCounts, ReconcileReport, Reconciler, Scope};
pub use schema::{
    parse, AssistantEntry, AssistantSpec, DatasourceSpec, EncoderSpec, Tagged, ToolEntry,
    ToolSpec, WorkflowConfig,
};
pub use service::{ReconcileOutcome, WorkflowConfigService};
pub use sniff::{ContentTypeSniffer, HttpContentTypeSniffer};
pub use transform::{DataTransformer, TransformMappings, TransformedDatasource};
