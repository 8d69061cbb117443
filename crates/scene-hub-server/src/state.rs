// crates/scene-hub-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: Shared handles wiring the graph, control plane, and testlab.
// Purpose: Build the one state value every handler and task clones.
// Dependencies: scene-hub-core, scene-hub-testlab, crate::{config, stream, telemetry}
// ============================================================================

//! ## Overview
//! The server owns one scene graph behind a write-serializing `RwLock`, one
//! derived cache, one command executor, one test manager, and one stream
//! hub. Post-commit side effects flow through the hub (live frames) and the
//! audit sink (projection callback contract); nothing here blocks while a
//! lock is held.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use scene_hub_core::CommandExecutor;
use scene_hub_core::IdempotencyCache;
use scene_hub_core::LockManager;
use scene_hub_core::MutationRecord;
use scene_hub_core::SceneGraph;
use scene_hub_core::Timestamp;
use scene_hub_core::graph::DerivedCache;
use scene_hub_core::interfaces::LiveUpdateSink;
use scene_hub_core::interfaces::ProjectionSink;
use scene_hub_testlab::EditorBridge;
use scene_hub_testlab::TestManager;
use serde_json::json;

use crate::config::ServerConfig;
use crate::stream::StreamHub;
use crate::telemetry::AuditEvent;
use crate::telemetry::AuditSink;
use crate::telemetry::NoopMetrics;
use crate::telemetry::ServerMetrics;
use crate::telemetry::StderrAuditSink;

// ============================================================================
// SECTION: Projection Seam
// ============================================================================

/// Projection callback that records the contract through the audit sink.
/// The on-disk projection rules live outside this process; this seam only
/// proves the post-commit callback fires with the committed records.
struct AuditProjectionSink {
    /// Downstream audit sink.
    audit: Arc<dyn AuditSink>,
}

impl ProjectionSink for AuditProjectionSink {
    fn project(&self, records: &[MutationRecord]) {
        let labels: Vec<&'static str> = records.iter().map(MutationRecord::type_label).collect();
        self.audit.emit(&AuditEvent::new(
            "projection_callback",
            Timestamp::now().as_unix_millis(),
            json!({"records": labels.len(), "types": labels}),
        ));
    }
}

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration.
    pub config: Arc<ServerConfig>,
    /// Canonical scene graph.
    pub graph: Arc<RwLock<SceneGraph>>,
    /// Revision-scoped derived views.
    pub cache: Arc<DerivedCache>,
    /// Agent command executor.
    pub executor: Arc<CommandExecutor>,
    /// Test orchestrator.
    pub tests: Arc<TestManager>,
    /// Live-stream hub.
    pub stream: Arc<StreamHub>,
    /// Request metrics sink.
    pub metrics: Arc<dyn ServerMetrics>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Process start time.
    pub started_at: Timestamp,
}

impl AppState {
    /// Wires the full state graph from configuration.
    #[must_use]
    pub fn build(config: ServerConfig) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(StderrAuditSink);
        let stream = Arc::new(StreamHub::new());
        let graph = Arc::new(RwLock::new(SceneGraph::new()));
        let cache = Arc::new(DerivedCache::new());
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&graph),
            Arc::clone(&cache),
            Arc::new(LockManager::new()),
            Arc::new(IdempotencyCache::new()),
            Arc::clone(&stream) as Arc<dyn LiveUpdateSink>,
            Arc::new(AuditProjectionSink {
                audit: Arc::clone(&audit),
            }),
        ));
        let tests = Arc::new(TestManager::new(
            Arc::clone(&stream) as Arc<dyn EditorBridge>,
            &config.workspace,
        ));
        Self {
            config: Arc::new(config),
            graph,
            cache,
            executor,
            tests,
            stream,
            metrics: Arc::new(NoopMetrics),
            audit,
            started_at: Timestamp::now(),
        }
    }

    /// Read-locks the graph, recovering from poisoning.
    #[must_use]
    pub fn read_graph(&self) -> RwLockReadGuard<'_, SceneGraph> {
        match self.graph.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Write-locks the graph, recovering from poisoning.
    #[must_use]
    pub fn write_graph(&self) -> RwLockWriteGuard<'_, SceneGraph> {
        match self.graph.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
