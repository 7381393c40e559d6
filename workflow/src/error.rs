use colored::Colorize;

/// For re-throwing after we've printed a list of errors to the user.
#[derive(Debug, thiserror::Error)]
#[error("{0} failed due to {1} errors")]
pub struct AggregatedErrors(pub String, pub usize);

// in future we can add a `warnings` field, too.
#[derive(Debug)]
pub struct Errors {
    errors: Vec<anyhow::Error>,
}

impl Default for Errors {
    fn default() -> Self {
        Self {
            // ideally we won't have any,
            // and we don't mind reallocating if we're already in an error state:
            errors: Vec::with_capacity(0),
        }
    }
}

impl Errors {
    pub fn add_context(&mut self, e: impl Into<anyhow::Error>, msg: String) {
        let e = e.into();
        log::trace!("{msg}: {e:?}");
        self.errors.push(e.context(msg));
    }

    pub fn add(&mut self, e: impl Into<anyhow::Error>) {
        let e = e.into();
        log::trace!("error: {e:?}");
        self.errors.push(e);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collected errors, in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    /// Consume self and return the collected errors.
    pub fn into_inner(self) -> Vec<anyhow::Error> {
        self.errors
    }

    /// Print full list of errors to stderr, fail w/ an aggregated error
    /// if there were one or more errors.
    pub fn print_recap(&self, label: &str) -> Result<(), AggregatedErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            eprintln!("\n{} {}:\n", "Encountered errors while".red(), label.red());
            for e in &self.errors {
                recap(e);
            }
            Err(AggregatedErrors(label.to_owned(), self.errors.len()))
        }
    }
}

fn recap(e: &anyhow::Error) {
    eprint!("{}: {}", "ERROR".red(), e);
    for cause in e.chain().skip(1) {
        eprint!("\nCaused by:\n\t{cause}");
    }
    eprintln!();
}
