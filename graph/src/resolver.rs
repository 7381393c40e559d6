use crate::TaskNode;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("No {what} task matches \"{reference}\"; valid choices are: [{}]", .choices.join(", "))]
    NoSuchTask {
        what: String,
        reference: String,
        choices: Vec<String>,
    },
    #[error("Reference \"{reference}\" to {what} is ambiguous; it could mean any of: [{}]", .choices.join(", "))]
    Ambiguous {
        what: String,
        reference: String,
        choices: Vec<String>,
    },
}

/// Which value of a task a reference is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    /// label of the config block that produced the task
    Label,
    /// task name, unique within its kind
    Name,
    /// a string value the task publishes in its output
    Output(&'static str),
}

impl Attr {
    fn of<'n>(self, node: &'n TaskNode) -> Option<&'n str> {
        match self {
            Attr::Label => Some(&node.label),
            Attr::Name => Some(&node.name),
            Attr::Output(key) => node.output.get_str(key),
        }
    }
}

/// Resolves named references to one upstream task from a fixed candidate set.
///
/// A reference first matches on the primary attribute. Several primary matches
/// that all share one secondary value count as a single logical match, and the
/// first of them is returned. With no primary match, the secondary attribute
/// (if any) is tried instead.
pub struct Resolver<'g> {
    what: String,
    candidates: Vec<&'g TaskNode>,
    primary: Attr,
    secondary: Option<Attr>,
}

impl<'g> Resolver<'g> {
    /// `what` names the referenced thing in error messages, e.g. "CLASSIFICATION".
    pub fn new(
        what: impl Into<String>,
        candidates: impl IntoIterator<Item = &'g TaskNode>,
        primary: Attr,
    ) -> Self {
        Self {
            what: what.into(),
            candidates: candidates.into_iter().collect(),
            primary,
            secondary: None,
        }
    }

    /// Fall back to matching against `attr` when nothing matches the primary attribute.
    pub fn with_fallback(mut self, attr: Attr) -> Self {
        self.secondary = Some(attr);
        self
    }

    /// Resolve `reference` to exactly one task.
    pub fn resolve(&self, reference: &str) -> Result<&'g TaskNode, Error> {
        let exact = self.matching(self.primary, reference);

        match exact.len() {
            1 => return Ok(exact[0]),
            0 => (),
            _ => {
                if let Some(secondary) = self.secondary {
                    let first = secondary.of(exact[0]);
                    if first.is_some() && exact.iter().all(|n| secondary.of(n) == first) {
                        log::debug!(
                            "{} matches for {reference} share a {secondary:?}; using {}",
                            exact.len(),
                            exact[0].name,
                        );
                        return Ok(exact[0]);
                    }
                }
                return Err(self.ambiguous(
                    reference,
                    exact.iter().map(|n| Some(n.name.as_str())),
                ));
            }
        }

        if let Some(secondary) = self.secondary {
            let fallback = self.matching(secondary, reference);
            let primaries = distinct(fallback.iter().map(|n| self.primary.of(n)));
            match primaries.len() {
                0 => (),
                1 => return Ok(fallback[0]),
                _ => {
                    return Err(self.ambiguous(
                        reference,
                        fallback.iter().map(|n| self.primary.of(n)),
                    ))
                }
            }
        }

        Err(Error::NoSuchTask {
            what: self.what.clone(),
            reference: reference.to_owned(),
            choices: distinct(self.candidates.iter().map(|n| self.primary.of(n)))
                .into_iter()
                .map(str::to_owned)
                .collect(),
        })
    }

    fn matching(&self, attr: Attr, reference: &str) -> Vec<&'g TaskNode> {
        self.candidates
            .iter()
            .copied()
            .filter(|n| attr.of(n) == Some(reference))
            .collect()
    }

    fn ambiguous<'a>(
        &self,
        reference: &str,
        choices: impl Iterator<Item = Option<&'a str>>,
    ) -> Error {
        Error::Ambiguous {
            what: self.what.clone(),
            reference: reference.to_owned(),
            choices: distinct(choices).into_iter().map(str::to_owned).collect(),
        }
    }
}

/// Distinct non-empty values, in first-seen order.
fn distinct<'a>(vals: impl Iterator<Item = Option<&'a str>>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for v in vals.flatten() {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::test_node;
    use workflow::StageKind;

    fn classifier(id: usize, label: &str, sim: &str, prob: &str) -> TaskNode {
        let mut node = test_node(id, StageKind::Classify, label, &format!("{label}_{sim}"));
        node.output.set("prob_column_name", prob);
        node
    }

    #[test]
    fn test_exact_match() {
        let nodes = [
            classifier(0, "SNN", "SIM_A", "PROB_SNN"),
            classifier(1, "FITPROB", "SIM_A", "PROB_FITPROB"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label);
        assert_eq!(r.resolve("FITPROB").unwrap().name, "FITPROB_SIM_A");
    }

    #[test]
    fn test_collapse_on_shared_secondary() {
        let nodes = [
            classifier(0, "SNN", "SIM_A", "PROB_SNN"),
            classifier(1, "SNN", "SIM_B", "PROB_SNN"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label)
            .with_fallback(Attr::Output("prob_column_name"));
        assert_eq!(r.resolve("SNN").unwrap().name, "SNN_SIM_A");

        // without a secondary attr, two matches can't be collapsed:
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label);
        assert_eq!(
            r.resolve("SNN"),
            Err(Error::Ambiguous {
                what: "CLASSIFICATION".to_owned(),
                reference: "SNN".to_owned(),
                choices: vec!["SNN_SIM_A".to_owned(), "SNN_SIM_B".to_owned()],
            })
        );
    }

    #[test]
    fn test_ambiguous_exact_with_different_secondary() {
        let nodes = [
            classifier(0, "SNN", "SIM_A", "PROB_SNN_A"),
            classifier(1, "SNN", "SIM_B", "PROB_SNN_B"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label)
            .with_fallback(Attr::Output("prob_column_name"));
        assert!(matches!(r.resolve("SNN"), Err(Error::Ambiguous { .. })));
    }

    #[test]
    fn test_fallback_to_secondary() {
        let nodes = [
            classifier(0, "SNN", "SIM_A", "PROB_SNN"),
            classifier(1, "FITPROB", "SIM_A", "PROB_FP"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label)
            .with_fallback(Attr::Output("prob_column_name"));
        assert_eq!(r.resolve("PROB_FP").unwrap().label, "FITPROB");
    }

    #[test]
    fn test_fallback_ambiguous_lists_both() {
        let nodes = [
            classifier(0, "SNN_V1", "SIM_A", "PROB_SNN"),
            classifier(1, "SNN_V2", "SIM_A", "PROB_SNN"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label)
            .with_fallback(Attr::Output("prob_column_name"));
        let err = r.resolve("PROB_SNN").unwrap_err();
        assert_eq!(
            err,
            Error::Ambiguous {
                what: "CLASSIFICATION".to_owned(),
                reference: "PROB_SNN".to_owned(),
                choices: vec!["SNN_V1".to_owned(), "SNN_V2".to_owned()],
            }
        );
        assert!(err.to_string().contains("[SNN_V1, SNN_V2]"), "{err}");
    }

    #[test]
    fn test_no_match_lists_choices() {
        let nodes = [
            classifier(0, "SNN", "SIM_A", "PROB_SNN"),
            classifier(1, "SNN", "SIM_B", "PROB_SNN"),
            classifier(2, "FITPROB", "SIM_A", "PROB_FP"),
        ];
        let r = Resolver::new("CLASSIFICATION", &nodes, Attr::Label)
            .with_fallback(Attr::Output("prob_column_name"));
        match r.resolve("NOPE") {
            Err(Error::NoSuchTask { choices, .. }) => {
                assert_eq!(choices, vec!["SNN".to_owned(), "FITPROB".to_owned()])
            }
            other => panic!("expected NoSuchTask, got {other:?}"),
        }
    }
}
