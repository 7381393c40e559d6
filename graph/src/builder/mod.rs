//! One module per stage kind, each turning a config block into draft tasks.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::{Map, Value};
use workflow::{Errors, Output, Slots, StageBlock, StageKind};

use crate::{BuildContext, Error, Graph, Resolver, TaskNode};

mod aggregate;
mod analyse;
mod biascor;
mod classify;
mod cosmofit;
mod create_cov;
mod dataprep;
mod lcfit;
mod merge;
mod sim;

/// A task a builder wants to add to the graph, before it has an id.
#[derive(Debug)]
pub(crate) struct Draft {
    pub name: String,
    pub slots: Slots,
    pub options: Map<String, Value>,
    pub output: Output,
}

impl Draft {
    pub fn new(name: String, options: Map<String, Value>) -> Self {
        Self {
            name,
            slots: Slots::default(),
            options,
            output: Output::default(),
        }
    }
}

/// State for building the tasks of one config block.
pub(crate) struct BlockCx<'g> {
    pub block: &'g StageBlock,
    pub graph: &'g Graph,
    pub ctx: &'g BuildContext,
    /// problems found so far; one block may report several.
    pub errors: Errors,
}

impl<'g> BlockCx<'g> {
    pub fn new(block: &'g StageBlock, graph: &'g Graph, ctx: &'g BuildContext) -> Self {
        Self {
            block,
            graph,
            ctx,
            errors: Errors::default(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.block.kind
    }

    pub fn label(&self) -> &'g str {
        &self.block.label
    }

    pub fn task_dir(&self, name: &str) -> PathBuf {
        self.ctx.task_dir(self.kind(), name)
    }

    /// Record the error (if any) and carry on.
    pub fn check<T, E: Into<anyhow::Error>>(&mut self, r: Result<T, E>) -> Option<T> {
        match r {
            Ok(t) => Some(t),
            Err(e) => {
                self.errors.add(e);
                None
            }
        }
    }

    /// Every task of the given kinds built so far, in build order.
    pub fn upstream(&self, kinds: &[StageKind]) -> Vec<&'g TaskNode> {
        self.graph
            .nodes()
            .filter(|n| kinds.contains(&n.kind))
            .collect()
    }

    /// Tasks of the given kinds whose names match every listed mask field.
    /// An absent mask matches everything.
    pub fn masked(&mut self, kinds: &[StageKind], fields: &[&str]) -> Vec<&'g TaskNode> {
        let mut masks = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(mask) = self.check(self.block.get_strs(field)) {
                masks.push(mask);
            }
        }
        self.upstream(kinds)
            .into_iter()
            .filter(|n| masks.iter().all(|m| mask_matches(m, &n.name)))
            .collect()
    }

    pub fn resolve(&mut self, resolver: &Resolver<'g>, reference: &str) -> Option<&'g TaskNode> {
        let r = resolver.resolve(reference);
        self.check(r)
    }

    pub fn empty_fan_out(&self, fields: &[&str]) -> Error {
        Error::EmptyFanOut {
            kind: self.kind(),
            label: self.label().to_owned(),
            masks: fields
                .iter()
                .map(|f| match self.block.get_strs(f) {
                    Ok(m) if !m.is_empty() => format!("{f}={}", m.join("|")),
                    _ => format!("{f}=*"),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// True if `mask` is empty or any of its entries is a substring of `name`.
pub(crate) fn mask_matches(mask: &[String], name: &str) -> bool {
    mask.is_empty() || mask.iter().any(|m| name.contains(m.as_str()))
}

/// Build draft tasks for the block in `cx`.
pub(crate) fn build_block(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    match cx.kind() {
        StageKind::DataPrep => dataprep::build(cx),
        StageKind::Sim => sim::build(cx),
        StageKind::LcFit => lcfit::build(cx),
        StageKind::Classify => classify::build(cx),
        StageKind::Aggregate => aggregate::build(cx),
        StageKind::Merge => merge::build(cx),
        StageKind::BiasCor => biascor::build(cx),
        StageKind::CreateCov => create_cov::build(cx),
        StageKind::CosmoFit => cosmofit::build(cx),
        StageKind::Analyse => analyse::build(cx),
    }
}

/// Path as a json string value.
pub(crate) fn path_value(path: PathBuf) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

/// Copy the values every data/sim derived task carries forward.
pub(crate) fn inherit_sim_output(out: &mut Output, upstream: &TaskNode) {
    for key in ["sim_name", "genversion", "is_data", "blind"] {
        if let Some(v) = upstream.output.get(key) {
            out.set(key, v.clone());
        }
    }
}
