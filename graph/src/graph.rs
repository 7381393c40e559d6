use anyhow::Result;
use serde_json::{Map, Value};
use util::IdVec;
use workflow::{Errors, PipelineConfig, StageBlock, StageKind, TaskId};

use crate::builder::{self, BlockCx, Draft};
use crate::{BuildContext, Error, ResolvedConfig, TaskNode, SUB_JOB_SEPARATOR};

/// Every task of a pipeline, in build order: stage kinds in their fixed order,
/// and within a kind, config blocks in declaration order.
/// A task's dependencies always come before it.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: IdVec<TaskId, TaskNode>,
}

impl Graph {
    /// Build tasks for every kind up to and including `finish` (or all kinds).
    /// Configuration errors are collected and reported together; building stops
    /// after the first kind that has any, since later kinds would only
    /// report knock-on errors.
    pub fn build(
        config: &PipelineConfig,
        ctx: &BuildContext,
        finish: Option<StageKind>,
    ) -> Result<Self> {
        let mut graph = Graph {
            nodes: IdVec::with_capacity(config.len()),
        };
        let mut errors = Errors::default();

        for kind in StageKind::ALL {
            if finish.is_some_and(|f| kind > f) {
                log::debug!("not building {kind} or later");
                break;
            }
            for block in config.blocks(kind) {
                let context = format!("while building {kind}.{}", block.label);
                let mut cx = BlockCx::new(block, &graph, ctx);
                let result = builder::build_block(&mut cx);
                let block_errors = cx.errors;

                match result {
                    Ok(drafts) if block_errors.is_empty() => {
                        log::debug!("{kind}.{} produced {} tasks", block.label, drafts.len());
                        for draft in drafts {
                            if let Err(e) = graph.push(block, draft, ctx) {
                                errors.add_context(e, context.clone());
                            }
                        }
                    }
                    result => {
                        for e in block_errors.into_inner().into_iter().chain(result.err()) {
                            errors.add_context(e, context.clone());
                        }
                    }
                }
            }
            if !errors.is_empty() {
                log::debug!("stopping graph build after errors in {kind}");
                break;
            }
        }

        errors.print_recap("building task graph")?;
        Ok(graph)
    }

    /// Give `draft` an id, wire up its dependencies, and add it to the graph.
    fn push(&mut self, block: &StageBlock, draft: Draft, ctx: &BuildContext) -> Result<TaskId> {
        let kind = block.kind;
        if self.nodes.len() >= usize::from(TaskId::MAX) {
            return Err(Error::TooManyTasks(self.nodes.len()).into());
        }
        if draft.name.contains(SUB_JOB_SEPARATOR) {
            return Err(Error::InvalidName {
                kind,
                name: draft.name,
            }
            .into());
        }
        if self.find(kind, &draft.name).is_some() {
            return Err(Error::DuplicateName {
                kind,
                name: draft.name,
            }
            .into());
        }
        let num_jobs = block.get_usize("NUM_JOBS", 1)?.max(1);

        // each dependency's published output, keyed by role and then by name:
        let mut inputs = Map::new();
        for (role, dep) in draft.slots.iter() {
            let dep = self.nodes.get(*dep);
            let entry = inputs
                .entry(role.name())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(by_name) = entry {
                by_name.insert(dep.name.clone(), Value::Object(dep.output.as_map().clone()));
            }
        }

        let id = self.nodes.next_id();
        let node = TaskNode {
            id,
            kind,
            label: block.label.clone(),
            job_name: ctx.job_name(kind, &draft.name),
            output_dir: ctx.task_dir(kind, &draft.name),
            deps: draft.slots.ids(),
            slots: draft.slots,
            config: ResolvedConfig {
                options: draft.options,
                inputs,
            },
            output: draft.output,
            name: draft.name,
            num_jobs,
        };
        log::trace!("built {} with deps {:?}", node.display_name(), node.deps);
        Ok(self.nodes.push(node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: TaskId) -> &TaskNode {
        self.nodes.get(id)
    }

    /// All nodes, in build order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn of_kind(&self, kind: StageKind) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn find(&self, kind: StageKind, name: &str) -> Option<&TaskNode> {
        self.of_kind(kind).find(|n| n.name == name)
    }

    /// Nodes of any kind with the given name.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TaskNode> {
        self.nodes.iter().filter(move |n| n.name == name)
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use workflow::{AggregatedErrors, Role};

    use super::*;

    const PIPELINE: &str = "
DATAPREP:
  DATA_DES:
    OPTS:
      RAW_DIR: /data/des
SIM:
  SIM_IA:
    NUM_VERSIONS: 2
    OPTS: {NGEN: 10}
  SIM_CC:
LCFIT:
  FIT:
    OPTS: {BATCH_INFO: sbatch 4}
CLASSIFICATION:
  SNN_TRAIN:
    MODE: train
    MASK_SIM: SIM_IA
  SNN:
    MODE: predict
    MODEL: SNN_TRAIN
AGGREGATION:
  AGG:
MERGE:
  MERGE:
BIASCOR:
  BCOR:
    DATA: [FIT_DATA_DES]
    SIMFILE_BIASCOR: FIT_SIM_IA
    SIMFILE_CCPRIOR: FIT_SIM_CC
    CLASSIFIER: SNN
    MUOPTS:
      NO_CCPRIOR:
        SIMFILE_CCPRIOR: FIT_SIM_IA
CREATE_COV:
  COV:
    COVOPTS: ['[NOSYS] [=DEFAULT,=DEFAULT]']
COSMOFIT:
  WFIT:
    MASK: COV
ANALYSE:
  ALL_OMW:
    MASK_COSMOFIT: WFIT
    MASK_BIASCOR: BCOR
";

    fn ctx() -> BuildContext {
        BuildContext::new(Path::new("out"), Path::new("test.yml")).unwrap()
    }

    fn build(yaml: &str) -> Result<Graph> {
        let config = PipelineConfig::from_yaml(yaml)?;
        Graph::build(&config, &ctx(), None)
    }

    fn names(graph: &Graph, kind: StageKind) -> Vec<&str> {
        graph.of_kind(kind).map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_full_pipeline() -> Result<()> {
        let graph = build(PIPELINE)?;

        assert_eq!(
            names(&graph, StageKind::LcFit),
            vec!["FIT_DATA_DES", "FIT_SIM_IA", "FIT_SIM_CC"]
        );
        assert_eq!(names(&graph, StageKind::Classify), vec![
            "SNN_TRAIN_SIM_IA",
            "SNN_DATA_DES",
            "SNN_SIM_IA",
            "SNN_SIM_CC",
        ]);

        let fit = graph.find(StageKind::LcFit, "FIT_SIM_IA").unwrap();
        assert_eq!(fit.output.get_strs("fitres_dirs").len(), 2);
        assert_eq!(fit.job_name, "BF_test_LCFIT_FIT_SIM_IA");
        assert_eq!(
            fit.output_dir,
            Path::new("out/test/2_LCFIT/FIT_SIM_IA").to_path_buf()
        );

        // predicting classifiers depend on the trained model:
        let trained = graph.find(StageKind::Classify, "SNN_TRAIN_SIM_IA").unwrap();
        let predict = graph.find(StageKind::Classify, "SNN_DATA_DES").unwrap();
        assert_eq!(predict.slots.first(Role::Model), Some(trained.id));

        let bcor = graph.find(StageKind::BiasCor, "BCOR").unwrap();
        assert_eq!(bcor.output.get_str("prob_column_name"), Some("PROB_SNN"));
        let merge_names: Vec<&str> = bcor
            .slots
            .all(Role::Merge)
            .map(|id| graph.get(id).name.as_str())
            .collect();
        assert_eq!(merge_names, vec!["MERGE_FIT_DATA_DES_AGG_DATA_DES"]);
        // the overlay's ccprior sim adds an edge of its own:
        let ccprior: Vec<&str> = bcor
            .slots
            .all(Role::SimCcPrior)
            .map(|id| graph.get(id).name.as_str())
            .collect();
        assert_eq!(ccprior, vec!["MERGE_FIT_SIM_CC_AGG_SIM_CC", "MERGE_FIT_SIM_IA_AGG_SIM_IA"]);

        let covs = names(&graph, StageKind::CreateCov);
        assert_eq!(covs, vec!["COV_BCOR"]);
        let cov = graph.find(StageKind::CreateCov, "COV_BCOR").unwrap();
        assert_eq!(cov.output.get("covopts").unwrap()["NOSYS"], Value::from(1));
        assert_eq!(cov.output.get_bool("blind"), Some(true));

        let analyse = graph.find(StageKind::Analyse, "ALL_OMW").unwrap();
        assert_eq!(analyse.deps.len(), 2);

        // dependencies always come before their dependents:
        for node in graph.nodes() {
            for dep in &node.deps {
                assert!(*dep < node.id, "{} depends on later task", node.name);
            }
        }
        Ok(())
    }

    #[test]
    fn test_overlay_inherits_unset_refs() -> Result<()> {
        let graph = build(PIPELINE)?;
        let bcor = graph.find(StageKind::BiasCor, "BCOR").unwrap();
        let muopts = bcor.config.options["MUOPTS"].as_array().unwrap();
        assert_eq!(muopts.len(), 1);
        let overlay = &muopts[0];
        assert_eq!(overlay["label"], Value::from("NO_CCPRIOR"));
        // classifier and biascor sims come from the base block:
        assert_eq!(overlay["classifier"], Value::from("SNN"));
        assert_eq!(
            overlay["sim_biascor"],
            serde_json::json!(["MERGE_FIT_SIM_IA_AGG_SIM_IA"])
        );
        assert_eq!(
            overlay["sim_ccprior"],
            serde_json::json!(["MERGE_FIT_SIM_IA_AGG_SIM_IA"])
        );
        Ok(())
    }

    #[test]
    fn test_finish_stops_early() -> Result<()> {
        let config = PipelineConfig::from_yaml(PIPELINE)?;
        let graph = Graph::build(&config, &ctx(), Some(StageKind::LcFit))?;
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.of_kind(StageKind::Classify).count(), 0);
        Ok(())
    }

    #[test]
    fn test_every_bad_reference_reported() {
        let yaml = "
SIM:
  SIM_IA:
LCFIT:
  FIT:
AGGREGATION:
  AGG:
MERGE:
  MERGE:
BIASCOR:
  BCOR:
    DATA: [FIT_NOPE]
    SIMFILE_BIASCOR: FIT_ALSO_NOPE
";
        let err = build(yaml).unwrap_err();
        let agg = err.downcast_ref::<AggregatedErrors>().unwrap();
        assert_eq!(agg.1, 2);
    }

    #[test]
    fn test_missing_required_fields() {
        let yaml = "
DATAPREP:
  NO_RAW_DIR: {OPTS: {}}
CLASSIFICATION:
  NO_MODE:
";
        let err = build(yaml).unwrap_err();
        // classification is never reached once dataprep fails:
        assert_eq!(err.downcast_ref::<AggregatedErrors>().unwrap().1, 1);

        let err = build("CLASSIFICATION:\n  BAD: {MODE: guess}\n").unwrap_err();
        assert_eq!(err.downcast_ref::<AggregatedErrors>().unwrap().1, 1);
    }

    #[test]
    fn test_empty_fan_out_is_error() {
        let yaml = "
SIM:
  SIM_IA:
LCFIT:
  FIT:
    MASK: NOTHING_MATCHES
";
        assert!(build(yaml).is_err());
    }

    #[test]
    fn test_dotted_names_rejected() {
        let err = build("SIM:\n  SIM.2:\n  SIM_B:\n").unwrap_err();
        assert_eq!(err.downcast_ref::<AggregatedErrors>().unwrap().1, 1);

        let graph = build("SIM:\n  SIM:\n  SIM_B:\n").unwrap();
        let sim = graph.find(StageKind::Sim, "SIM").unwrap();
        let sim_b = graph.find(StageKind::Sim, "SIM_B").unwrap();
        assert!(!sim.owns_job(&sim_b.job_name));
    }

    #[test]
    fn test_analyse_needs_dependencies() {
        let yaml = "
SIM:
  SIM_IA:
LCFIT:
  FIT:
ANALYSE:
  NOTHING:
";
        assert!(build(yaml).is_err());

        let yaml = "
SIM:
  SIM_IA:
LCFIT:
  FIT:
ANALYSE:
  FITS:
    MASK_LCFIT: ''
";
        let graph = build(yaml).unwrap();
        assert_eq!(graph.find(StageKind::Analyse, "FITS").unwrap().deps.len(), 1);
    }

    #[test]
    fn test_mask_excluded_from_options() -> Result<()> {
        let with_mask = build("SIM:\n  SIM_IA:\nLCFIT:\n  FIT:\n    MASK: SIM\n")?;
        let without = build("SIM:\n  SIM_IA:\nLCFIT:\n  FIT:\n")?;
        let a = with_mask.find(StageKind::LcFit, "FIT_SIM_IA").unwrap();
        let b = without.find(StageKind::LcFit, "FIT_SIM_IA").unwrap();
        assert_eq!(a.config, b.config);
        Ok(())
    }
}
