//! Named SQL snippets composed into CTE chains.

use crate::db::{closest_match, IdentifierQuoting};
use crate::error::{CellError, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use tracing::debug;

/// A saved query fragment and the snippets it reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub name: String,
    pub body: String,
    pub dependencies: Vec<String>,
}

/// Session-wide collection of snippets, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SnippetStore {
    snippets: IndexMap<String, Snippet>,
}

impl SnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves (or overwrites) a snippet.
    pub fn store(&mut self, name: &str, body: &str, dependencies: &[String]) -> Result<()> {
        if name.contains('-') {
            return Err(CellError::usage(
                "Using hyphens (-) in save argument isn't allowed. Please use underscores (_) instead",
            ));
        }
        validate_dependency_names(dependencies)?;
        if dependencies.iter().any(|dep| dep == name) {
            return Err(CellError::usage(format!(
                "Script name ('{name}') cannot appear in with_ argument"
            )));
        }
        if self.reaches(dependencies, name) {
            return Err(CellError::usage(format!(
                "circular dependency: saving '{name}' would make it depend on itself"
            )));
        }

        debug!("Saving snippet '{}' with {} dependencies", name, dependencies.len());
        self.snippets.insert(
            name.to_string(),
            Snippet {
                name: name.to_string(),
                body: body.to_string(),
                dependencies: dependencies.to_vec(),
            },
        );
        Ok(())
    }

    /// Looks up a snippet, suggesting a close name when it is missing.
    pub fn get(&self, name: &str) -> Result<&Snippet> {
        if self.snippets.is_empty() {
            return Err(CellError::usage("No saved SQL"));
        }

        if let Some(snippet) = self.snippets.get(name) {
            return Ok(snippet);
        }

        let error = format!("\"{name}\" is not a valid snippet identifier.");
        match closest_match(name, self.snippets.keys().map(String::as_str)) {
            Some(close) => Err(CellError::usage(format!("{error} Did you mean \"{close}\"?"))),
            None => {
                let valid = self
                    .snippets
                    .keys()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(CellError::usage(format!("{error} Valid identifiers are {valid}.")))
            }
        }
    }

    /// Removes a snippet, returning it.
    pub fn remove(&mut self, name: &str) -> Result<Snippet> {
        self.get(name)?;
        self.snippets
            .shift_remove(name)
            .ok_or_else(|| CellError::internal(format!("snippet '{name}' vanished")))
    }

    /// Snippet names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.snippets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snippets.contains_key(name)
    }

    /// Returns every snippet needed to define `names`, dependencies first.
    ///
    /// Duplicates keep their first position, so each name is emitted once and
    /// always after the names it depends on.
    pub fn resolve_dependencies(&self, names: &[String]) -> Result<Vec<String>> {
        let mut ordered: IndexSet<String> = IndexSet::new();
        let mut in_progress: Vec<String> = Vec::new();

        for name in names {
            self.collect(name, &mut in_progress, &mut ordered)?;
        }
        for name in names {
            ordered.insert(name.clone());
        }

        Ok(ordered.into_iter().collect())
    }

    fn collect(
        &self,
        name: &str,
        in_progress: &mut Vec<String>,
        ordered: &mut IndexSet<String>,
    ) -> Result<()> {
        if in_progress.iter().any(|n| n == name) {
            in_progress.push(name.to_string());
            return Err(CellError::usage(format!(
                "circular dependency: {}",
                in_progress.join(" -> ")
            )));
        }

        let snippet = self.get(name)?;
        in_progress.push(name.to_string());
        for dep in &snippet.dependencies {
            self.collect(dep, in_progress, ordered)?;
            ordered.insert(dep.clone());
        }
        in_progress.pop();
        Ok(())
    }

    /// Whether walking the stored graph from `start` reaches `target`.
    fn reaches(&self, start: &[String], target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = start.iter().map(String::as_str).collect();

        while let Some(name) = stack.pop() {
            if name == target {
                return true;
            }
            if !visited.insert(name) {
                continue;
            }
            if let Some(snippet) = self.snippets.get(name) {
                stack.extend(snippet.dependencies.iter().map(String::as_str));
            }
        }
        false
    }

    /// Prefixes `query` with a `WITH` clause defining `dependencies` and everything they need.
    ///
    /// With no dependencies the query is returned unchanged.
    pub fn render(
        &self,
        query: &str,
        dependencies: &[String],
        quoting: IdentifierQuoting,
    ) -> Result<String> {
        validate_dependency_names(dependencies)?;
        if dependencies.is_empty() {
            return Ok(query.to_string());
        }

        let ordered = self.resolve_dependencies(dependencies)?;
        let ctes = ordered
            .iter()
            .map(|name| {
                let snippet = self.get(name)?;
                Ok(format!("{} AS ({})", quoting.quote(name), snippet.body))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!("WITH {} {}", ctes.join(", "), query))
    }

    /// Renders a stored snippet together with its dependencies.
    pub fn render_snippet(&self, name: &str, quoting: IdentifierQuoting) -> Result<String> {
        let snippet = self.get(name)?;
        self.render(&snippet.body, &snippet.dependencies, quoting)
    }
}

fn validate_dependency_names(dependencies: &[String]) -> Result<()> {
    if dependencies.iter().any(|dep| dep.contains('-')) {
        return Err(CellError::usage(format!(
            "Using hyphens is not allowed. Please use {} instead for the with argument.",
            dependencies.join(", ").replace('-', "_")
        )));
    }
    Ok(())
}
