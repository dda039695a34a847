//! # Build Step Graph
//!
//! A build proceeds through an ordered list of steps, one per component category.  A step may
//! depend on earlier steps; it is *locked* until every step it directly depends on has a
//! selection, and it is a *dependent* of every step it reaches through `depends_on`
//! transitively.
//!
//! Dependencies may only point at steps defined earlier in the list.  That keeps the graph
//! acyclic and lets definition order double as a topological order.
//!
//! ```
//! use pcbuilder::{ComponentCategory, ComponentId, Selections, StepGraph};
//!
//! let graph = StepGraph::standard();
//! let mut selections = Selections::new();
//! assert!(graph.is_locked(&selections, ComponentCategory::Ram));
//!
//! selections.insert(ComponentCategory::Cpu, ComponentId(1));
//! selections.insert(ComponentCategory::Motherboard, ComponentId(10));
//! assert!(!graph.is_locked(&selections, ComponentCategory::Ram));
//!
//! assert_eq!(
//!     graph.dependents_of(ComponentCategory::Cpu),
//!     vec![
//!         ComponentCategory::Motherboard,
//!         ComponentCategory::Ram,
//!         ComponentCategory::Cooling,
//!         ComponentCategory::Case,
//!     ]
//! );
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ComponentCategory, Selections};

/// One step of the build flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// The category this step selects; also the step's key.
    pub category: ComponentCategory,
    /// Display label.  Defaults to the category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Short help text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Whether a build is complete without this step.
    #[serde(default)]
    pub required: bool,
    /// Steps that must have a selection before this one unlocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ComponentCategory>,
}

impl BuildStep {
    /// A step with no dependencies and the default label.
    pub fn new(category: ComponentCategory, required: bool) -> Self {
        Self {
            category,
            label: None,
            description: String::new(),
            required,
            depends_on: Vec::new(),
        }
    }

    /// Builder-style dependency list.
    pub fn depends_on(mut self, depends_on: impl IntoIterator<Item = ComponentCategory>) -> Self {
        self.depends_on = depends_on.into_iter().collect();
        self
    }

    /// Builder-style description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The step's key, e.g. `"motherboard"`.
    pub fn key(&self) -> &'static str {
        self.category.key()
    }

    /// The label shown for this step.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.category.label())
    }
}

/// Reasons a step list does not form a valid graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No steps were given.
    #[error("a build needs at least one step")]
    Empty,
    /// Two steps select the same category.
    #[error("step {0} is defined more than once")]
    DuplicateStep(ComponentCategory),
    /// A step depends on itself.
    #[error("step {0} depends on itself")]
    SelfDependency(ComponentCategory),
    /// A step depends on a category that is not a step.
    #[error("step {step} depends on {dependency}, which is not a step")]
    UnknownDependency {
        /// The dependent step.
        step: ComponentCategory,
        /// The missing dependency.
        dependency: ComponentCategory,
    },
    /// A step depends on a step defined after it.
    #[error("step {step} depends on {dependency}, which is defined after it")]
    ForwardDependency {
        /// The dependent step.
        step: ComponentCategory,
        /// The later dependency.
        dependency: ComponentCategory,
    },
}

/// An ordered, acyclic set of build steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BuildStep>", into = "Vec<BuildStep>")]
pub struct StepGraph {
    steps: Vec<BuildStep>,
}

impl StepGraph {
    /// Validates and wraps a step list.
    pub fn new(steps: Vec<BuildStep>) -> Result<Self, GraphError> {
        if steps.is_empty() {
            return Err(GraphError::Empty);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            for dep in &step.depends_on {
                if *dep == step.category {
                    return Err(GraphError::SelfDependency(step.category));
                }
                if !seen.contains(dep) {
                    let error = if steps.iter().any(|s| s.category == *dep) {
                        GraphError::ForwardDependency {
                            step: step.category,
                            dependency: *dep,
                        }
                    } else {
                        GraphError::UnknownDependency {
                            step: step.category,
                            dependency: *dep,
                        }
                    };
                    return Err(error);
                }
            }
            if !seen.insert(step.category) {
                return Err(GraphError::DuplicateStep(step.category));
            }
        }
        Ok(Self { steps })
    }

    /// The default eight-step PC build.
    pub fn standard() -> Self {
        use ComponentCategory::*;
        Self {
            steps: vec![
                BuildStep::new(Cpu, true).describe("Choose your processor"),
                BuildStep::new(Motherboard, true)
                    .depends_on([Cpu])
                    .describe("Select a compatible motherboard"),
                BuildStep::new(Ram, true)
                    .depends_on([Motherboard])
                    .describe("Add memory to your build"),
                BuildStep::new(Gpu, false).describe("Choose a graphics card (optional)"),
                BuildStep::new(Storage, true).describe("Select storage drives"),
                BuildStep::new(Psu, true).describe("Choose a power supply"),
                BuildStep::new(Cooling, false)
                    .depends_on([Cpu])
                    .describe("Select a CPU cooler (optional)"),
                BuildStep::new(Case, true)
                    .depends_on([Motherboard])
                    .describe("Choose a case for your build"),
            ],
        }
    }

    /// Steps in definition order.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// The number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; a graph has at least one step.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at `index`.
    pub fn get(&self, index: usize) -> Option<&BuildStep> {
        self.steps.get(index)
    }

    /// The step selecting `category`.
    pub fn step(&self, category: ComponentCategory) -> Option<&BuildStep> {
        self.steps.iter().find(|s| s.category == category)
    }

    /// Position of the step selecting `category`.
    pub fn index_of(&self, category: ComponentCategory) -> Option<usize> {
        self.steps.iter().position(|s| s.category == category)
    }

    /// Direct dependencies of `category` that have no selection.
    ///
    /// Categories that are not steps report no missing dependencies.
    pub fn missing_dependencies(
        &self,
        selections: &Selections,
        category: ComponentCategory,
    ) -> Vec<ComponentCategory> {
        self.step(category)
            .map(|step| {
                step.depends_on
                    .iter()
                    .copied()
                    .filter(|dep| !selections.contains_key(dep))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True iff some direct dependency of `category` has no selection.
    pub fn is_locked(&self, selections: &Selections, category: ComponentCategory) -> bool {
        !self.missing_dependencies(selections, category).is_empty()
    }

    /// Every step whose dependencies reach `category`, in definition order.
    pub fn dependents_of(&self, category: ComponentCategory) -> Vec<ComponentCategory> {
        let Some(start) = self.index_of(category) else {
            return Vec::new();
        };
        let mut reached = HashSet::from([category]);
        let mut dependents = Vec::new();
        for step in &self.steps[start + 1..] {
            if step.depends_on.iter().any(|dep| reached.contains(dep)) {
                reached.insert(step.category);
                dependents.push(step.category);
            }
        }
        dependents
    }

    /// Steps a build must fill before it can be completed.
    pub fn required_steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter().filter(|s| s.required)
    }
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<BuildStep>> for StepGraph {
    type Error = GraphError;

    fn try_from(steps: Vec<BuildStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<StepGraph> for Vec<BuildStep> {
    fn from(graph: StepGraph) -> Self {
        graph.steps
    }
}
