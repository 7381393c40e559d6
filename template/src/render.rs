use std::borrow::Borrow;
use std::collections::BTreeMap;

use anyhow::Result;

use crate::parse::{parse, Piece};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Template variables not defined: {}", .0.join(", "))]
    Unbound(Vec<String>),
}

/// Anything that can supply values for template placeholders.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl<K: Borrow<str> + Ord> Lookup for BTreeMap<K, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A parsed job-script template. Rendering is a pure function of the
/// values supplied, so the same values always produce the same script.
#[derive(Debug, Clone)]
pub struct Template<'a> {
    pieces: Vec<Piece<'a>>,
}

impl<'a> Template<'a> {
    pub fn parse(text: &'a str) -> Result<Self> {
        Ok(Self {
            pieces: parse(text)?,
        })
    }

    /// Names of all placeholders, in order of appearance (may repeat).
    pub fn vars(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Var(name) => Some(*name),
            Piece::Text(_) => None,
        })
    }

    /// Substitute every placeholder. Fails listing every unbound name.
    pub fn render(&self, vars: &impl Lookup) -> Result<String, Error> {
        let mut out = String::with_capacity(self.len_hint());
        let mut unbound: Vec<String> = Vec::with_capacity(0);
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => match vars.lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        if !unbound.iter().any(|u| u == name) {
                            unbound.push((*name).to_owned());
                        }
                    }
                },
            }
        }
        if unbound.is_empty() {
            Ok(out)
        } else {
            Err(Error::Unbound(unbound))
        }
    }

    fn len_hint(&self) -> usize {
        self.pieces
            .iter()
            .map(|p| match p {
                Piece::Text(text) => text.len(),
                Piece::Var(_) => 32,
            })
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_render() -> Result<()> {
        let template = Template::parse("#!/bin/bash\ncd {dir}\necho {{ok}} > {dir}/done.txt\n")?;
        let mut vars = BTreeMap::new();
        vars.insert("dir", "/out/task".to_owned());
        assert_eq!(
            template.render(&vars)?,
            "#!/bin/bash\ncd /out/task\necho {ok} > /out/task/done.txt\n"
        );
        assert_eq!(template.vars().collect::<Vec<_>>(), vec!["dir", "dir"]);
        Ok(())
    }
    #[test]
    fn test_unbound() -> Result<()> {
        let template = Template::parse("{a} {b} {a} {c}")?;
        let mut vars: BTreeMap<String, String> = BTreeMap::new();
        vars.insert("b".to_owned(), "x".to_owned());
        match template.render(&vars) {
            Err(Error::Unbound(names)) => assert_eq!(names, vec!["a", "c"]),
            Ok(s) => panic!("expected unbound error, got {s}"),
        }
        Ok(())
    }
}
