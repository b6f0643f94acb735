use crate::error::{BuildError, Result};
use crate::format::Format;
use crate::registry::{RunnerId, RunnerRegistry};
use std::collections::HashMap;

/// One conversion of a tool chain: the `index`-th runner turning `input`
/// into `output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    pub input: Format,
    pub output: Format,
    pub index: usize,
}

const fn step(input: Format, output: Format, index: usize) -> PlanStep {
    PlanStep { input, output, index }
}

/// Tool chains producing each output format, in alternative order.
const CHAINS: &[(Format, &[PlanStep])] = &[
    (Format::Dvi, &[step(Format::Tex, Format::Dvi, 0)]),
    (
        Format::Ps,
        &[step(Format::Tex, Format::Dvi, 0), step(Format::Dvi, Format::Ps, 0)],
    ),
    (Format::Ps, &[step(Format::Tex, Format::Ps, 0)]),
    (Format::Pdf, &[step(Format::Tex, Format::Pdf, 0)]),
    (
        Format::Pdf,
        &[step(Format::Tex, Format::Dvi, 0), step(Format::Dvi, Format::Pdf, 0)],
    ),
    (
        Format::Pdf,
        &[
            step(Format::Tex, Format::Dvi, 0),
            step(Format::Dvi, Format::Ps, 0),
            step(Format::Ps, Format::Pdf, 0),
        ],
    ),
    (Format::Pdf, &[step(Format::Tex, Format::Pdf, 1)]),
    (Format::Pdf, &[step(Format::Tex, Format::Pdf, 2)]),
];

/// The chain of runners that turns the main file into the requested output.
///
/// The first step is the LaTeX pass the build cycle repeats; the rest are
/// converters run once afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    format: Format,
    steps: Vec<PlanStep>,
}

impl BuildPlan {
    pub fn new(format: Format, steps: Vec<PlanStep>) -> Self {
        Self { format, steps }
    }

    /// The `index`-th built-in chain for `format`.
    pub fn for_format(format: Format, index: usize) -> Result<Self> {
        CHAINS
            .iter()
            .filter(|(output, _)| *output == format)
            .nth(index)
            .map(|(_, steps)| Self::new(format, steps.to_vec()))
            .ok_or_else(|| {
                BuildError::Config(format!(
                    "no tool chain #{index} for {format} ({} available)",
                    Self::alternatives(format)
                ))
            })
    }

    /// How many built-in chains produce `format`.
    pub fn alternatives(format: Format) -> usize {
        CHAINS.iter().filter(|(output, _)| *output == format).count()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Checks that the chain starts at the main file, that every step
    /// consumes what the previous one produced, that it ends in the
    /// requested format and that no format is produced twice.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(BuildError::Config(format!("invalid tool chain: {reason}")));

        let Some(first) = self.steps.first() else {
            return invalid("no steps".into());
        };
        if first.input != Format::Tex {
            return invalid(format!("starts from {} instead of tex", first.input));
        }

        let mut edges: HashMap<Format, Vec<Format>> = HashMap::new();
        for (i, step) in self.steps.iter().enumerate() {
            if step.input == step.output {
                return invalid(format!("step {} converts {} into itself", i + 1, step.input));
            }
            if let Some(next) = self.steps.get(i + 1) {
                if next.input != step.output {
                    return invalid(format!(
                        "step {} produces {} but step {} expects {}",
                        i + 1,
                        step.output,
                        i + 2,
                        next.input
                    ));
                }
            }
            edges.entry(step.input).or_default().push(step.output);
        }

        // Unvisited, visiting, visited.
        let mut state: HashMap<Format, u8> = HashMap::new();
        fn has_cycle(current: Format, edges: &HashMap<Format, Vec<Format>>, state: &mut HashMap<Format, u8>) -> bool {
            match state.get(&current) {
                Some(1) => return true,
                Some(2) => return false,
                _ => {}
            }
            state.insert(current, 1);
            if let Some(next) = edges.get(&current) {
                if next.iter().any(|format| has_cycle(*format, edges, state)) {
                    return true;
                }
            }
            state.insert(current, 2);
            false
        }
        if has_cycle(Format::Tex, &edges, &mut state) {
            return invalid("a format is produced more than once".into());
        }

        let last = self.steps.last().map_or(first.output, |s| s.output);
        if last != self.format {
            return invalid(format!("ends in {last} instead of {}", self.format));
        }
        Ok(())
    }

    /// The runners for each step.
    pub fn resolve(&self, registry: &RunnerRegistry) -> Result<Vec<RunnerId>> {
        self.steps
            .iter()
            .map(|s| {
                registry.get(s.input, s.output, s.index).ok_or_else(|| {
                    BuildError::Config(format!("no runner #{} for {} -> {}", s.index, s.input, s.output))
                })
            })
            .collect()
    }

    /// Runner names joined with arrows, for messages.
    pub fn describe(&self, registry: &RunnerRegistry) -> String {
        match self.resolve(registry) {
            Ok(ids) => ids
                .iter()
                .map(|id| registry.runner(*id).name())
                .collect::<Vec<_>>()
                .join(" -> "),
            Err(_) => format!("unresolved chain for {}", self.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    #[test]
    fn every_builtin_chain_is_valid() {
        for format in [Format::Dvi, Format::Ps, Format::Pdf] {
            for index in 0..BuildPlan::alternatives(format) {
                let plan = BuildPlan::for_format(format, index).unwrap();
                assert!(plan.validate().is_ok(), "{format} #{index}");
            }
        }
        assert_eq!(BuildPlan::alternatives(Format::Pdf), 5);
        assert!(BuildPlan::for_format(Format::Dvi, 1).is_err());
        assert!(BuildPlan::for_format(Format::Bib, 0).is_err());
    }

    #[test]
    fn chains_resolve_to_runners() {
        let registry = RunnerRegistry::with_defaults(&BuildConfig::default());
        let describe = |format, index| BuildPlan::for_format(format, index).unwrap().describe(&registry);

        assert_eq!(describe(Format::Pdf, 0), "pdflatex");
        assert_eq!(describe(Format::Pdf, 2), "latex -> dvips -> ps2pdf");
        assert_eq!(describe(Format::Pdf, 4), "lualatex");
        assert_eq!(describe(Format::Ps, 1), "pslatex");
    }

    #[test]
    fn broken_chains_are_rejected() {
        let gap = BuildPlan::new(
            Format::Pdf,
            vec![step(Format::Tex, Format::Dvi, 0), step(Format::Ps, Format::Pdf, 0)],
        );
        assert!(matches!(gap.validate(), Err(BuildError::Config(_))));

        let wrong_start = BuildPlan::new(Format::Pdf, vec![step(Format::Dvi, Format::Pdf, 0)]);
        assert!(wrong_start.validate().is_err());

        let self_loop = BuildPlan::new(Format::Dvi, vec![step(Format::Tex, Format::Tex, 0)]);
        assert!(self_loop.validate().is_err());

        let cycle = BuildPlan::new(
            Format::Ps,
            vec![
                step(Format::Tex, Format::Dvi, 0),
                step(Format::Dvi, Format::Tex, 0),
                step(Format::Tex, Format::Ps, 0),
            ],
        );
        assert!(cycle.validate().is_err());

        let wrong_end = BuildPlan::new(Format::Pdf, vec![step(Format::Tex, Format::Dvi, 0)]);
        assert!(wrong_end.validate().is_err());

        assert!(BuildPlan::new(Format::Pdf, Vec::new()).validate().is_err());
    }
}
