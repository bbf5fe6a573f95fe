//! Reconciliation orchestration.
//!
//! One call resolves, plans, applies and optionally propagates. The engine
//! keeps no record cache between calls; MEMORY is re-read every time.

use serde_json::Value;
use uuid::Uuid;

use crate::channel::AdminChannel;
use crate::config::PropagationConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::propagation::{ConfigSettings, Controller, Layer, PropagationOutcome, PropagationRequest};
use crate::reconcile::applier::{self, AppliedResult};
use crate::reconcile::planner;
use crate::reconcile::request::{ReconcileRequest, State, VariableRequest};
use crate::reconcile::resolver;
use crate::schema::{Attributes, ClassSchema, ObjectClass, ObjectRecord, Registry};

/// Label used for a global-variable read.
pub const READ: &str = "read";

/// Everything a reconcile call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub class: ObjectClass,
    pub state: State,
    /// Plan kind, or [`READ`].
    pub plan: &'static str,
    pub applied: AppliedResult,
    /// Propagation statements issued after the mutation.
    pub propagated: Vec<PropagationOutcome>,
    pub dry_run: bool,
}

/// Options that follow a request from planning to propagation.
struct RunOptions {
    state: State,
    force_multi_delete: bool,
    save_to_disk: bool,
    load_to_runtime: bool,
    dry_run: bool,
}

/// The reconciliation-and-propagation engine over one channel session.
pub struct Engine<C: AdminChannel> {
    channel: C,
    registry: Registry,
    defaults: PropagationConfig,
}

impl<C: AdminChannel> Engine<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            registry: Registry::builtin(),
            defaults: PropagationConfig::default(),
        }
    }

    /// Toggles used when a request leaves them unset.
    pub fn with_propagation_defaults(mut self, defaults: PropagationConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Drive one object, or a filtered set, to the requested state.
    pub fn reconcile(&mut self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let span = tracing::info_span!(
            "reconcile",
            invocation_id = %Uuid::new_v4(),
            class = %request.class,
            state = %request.state
        );
        let _enter = span.enter();

        let schema = self.registry.get(request.class);
        let result = request.validate(schema).and_then(|()| {
            let desired = schema.normalize(&request.params)?;
            let options = RunOptions {
                state: request.state,
                force_multi_delete: request.force_multi_delete,
                save_to_disk: request.save_to_disk.unwrap_or(self.defaults.save_to_disk),
                load_to_runtime: request.load_to_runtime.unwrap_or(self.defaults.load_to_runtime),
                dry_run: request.dry_run,
            };
            self.run(schema, &desired, &options)
        });
        finish(request.class, result)
    }

    /// Read a global variable, or set it when a value is supplied.
    pub fn variable(&mut self, request: &VariableRequest) -> Result<ReconcileOutcome> {
        let span = tracing::info_span!(
            "variable",
            invocation_id = %Uuid::new_v4(),
            variable = %request.variable
        );
        let _enter = span.enter();

        let schema = self.registry.get(ObjectClass::GlobalVariables);
        let result = self.variable_inner(schema, request);
        finish(ObjectClass::GlobalVariables, result)
    }

    fn variable_inner(&mut self, schema: &'static ClassSchema, request: &VariableRequest) -> Result<ReconcileOutcome> {
        let mut params = serde_json::Map::new();
        params.insert("variable_name".into(), Value::String(request.variable.clone()));

        let Some(value) = &request.value else {
            let criteria = schema.normalize(&params)?;
            let record = resolver::resolve(&mut self.channel, schema, &criteria)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::schema(format!("unknown variable \"{}\"", request.variable)))?;
            return Ok(ReconcileOutcome {
                class: schema.class,
                state: State::Present,
                plan: READ,
                applied: AppliedResult {
                    changed: false,
                    before: Some(record.clone()),
                    after: Some(record),
                    deleted: Vec::new(),
                },
                propagated: Vec::new(),
                dry_run: request.dry_run,
            });
        };

        params.insert("variable_value".into(), scalar_text(value));
        let desired = schema.normalize(&params)?;
        let options = RunOptions {
            state: State::Present,
            force_multi_delete: false,
            save_to_disk: request.save_to_disk.unwrap_or(self.defaults.save_to_disk),
            load_to_runtime: request.load_to_runtime.unwrap_or(self.defaults.load_to_runtime),
            dry_run: request.dry_run,
        };
        self.run(schema, &desired, &options)
    }

    fn run(&mut self, schema: &'static ClassSchema, desired: &Attributes, options: &RunOptions) -> Result<ReconcileOutcome> {
        let criteria = schema.criteria(desired)?;
        let existing = resolver::resolve(&mut self.channel, schema, &criteria)?;
        let plan = planner::plan(schema, desired, options.state, options.force_multi_delete, existing)?;
        let kind = plan.kind();
        tracing::debug!(plan = kind, "Planned mutation");

        if options.dry_run {
            return Ok(ReconcileOutcome {
                class: schema.class,
                state: options.state,
                plan: kind,
                applied: AppliedResult::preview(&plan),
                propagated: Vec::new(),
                dry_run: true,
            });
        }

        let applied = applier::apply(&mut self.channel, schema, plan)?;
        let propagated = if applied.changed {
            self.propagate_change(schema.settings_for(desired), options)?
        } else {
            Vec::new()
        };

        Ok(ReconcileOutcome {
            class: schema.class,
            state: options.state,
            plan: kind,
            applied,
            propagated,
            dry_run: false,
        })
    }

    /// Issue the post-mutation toggles, outside the committed transaction.
    fn propagate_change(&mut self, settings: ConfigSettings, options: &RunOptions) -> Result<Vec<PropagationOutcome>> {
        let mut requests = Vec::with_capacity(2);
        if options.save_to_disk {
            requests.push(PropagationRequest::save_to_disk(settings));
        }
        if options.load_to_runtime {
            requests.push(PropagationRequest::load_to_runtime(settings));
        }

        requests
            .iter()
            .map(|request| Controller::propagate(&mut self.channel, request))
            .collect()
    }

    /// Move a settings group between layers.
    pub fn propagate(&mut self, request: &PropagationRequest) -> Result<PropagationOutcome> {
        let span = tracing::info_span!("propagate", invocation_id = %Uuid::new_v4());
        let _enter = span.enter();

        Controller::propagate(&mut self.channel, request).inspect_err(|e| {
            tracing::warn!(statement = %request, error = %e, "Propagation rejected");
        })
    }

    /// Records of `class` in `layer` matching `criteria`.
    pub fn show(&mut self, class: ObjectClass, criteria: &Attributes, layer: Layer) -> Result<Vec<ObjectRecord>> {
        let schema = self.registry.get(class);
        resolver::resolve_in(&mut self.channel, schema, criteria, layer)
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// Variable values are stored as text; booleans and numbers are spelled out.
fn scalar_text(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => other.clone(),
    }
}

fn finish(class: ObjectClass, result: Result<ReconcileOutcome>) -> Result<ReconcileOutcome> {
    match &result {
        Ok(outcome) => {
            tracing::info!(plan = outcome.plan, changed = outcome.applied.changed, "Reconcile finished");
            metrics::record_reconcile(class, outcome.plan);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Reconcile request rejected");
            metrics::record_reconcile(class, e.kind());
        }
    }
    result
}
