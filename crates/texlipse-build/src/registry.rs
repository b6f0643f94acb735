use crate::config::BuildConfig;
use crate::format::Format;
use crate::parsers::{
    BibtexOutputParser, BiberOutputParser, LatexOutputParser, MakeindexOutputParser, NoOutputParser,
};
use crate::runner::{OutputParser, ProgramRunner, RunnerDescriptor};
use std::path::PathBuf;

/// Handle to a runner inside a [`RunnerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunnerId(pub usize);

/// Text after which TeX engines wait for a file name on stdin.
const LATEX_PROMPTS: &[&str] = &["Please type another input file name:", "Enter file name:"];

const ENGINE_ARGS: &str = "-interaction=nonstopmode -synctex=1 %input";

struct Builtin {
    name: &'static str,
    input: Format,
    output: Format,
    arguments: &'static str,
    parser: fn() -> Box<dyn OutputParser>,
    triggers: &'static [&'static str],
}

fn latex_parser() -> Box<dyn OutputParser> {
    Box::new(LatexOutputParser)
}

fn bibtex_parser() -> Box<dyn OutputParser> {
    Box::new(BibtexOutputParser)
}

fn biber_parser() -> Box<dyn OutputParser> {
    Box::new(BiberOutputParser)
}

fn makeindex_parser() -> Box<dyn OutputParser> {
    Box::new(MakeindexOutputParser)
}

fn no_parser() -> Box<dyn OutputParser> {
    Box::new(NoOutputParser)
}

/// Registration order decides the alternative index of runners sharing a
/// conversion, so the pdf engines stay in this order.
const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "latex",
        input: Format::Tex,
        output: Format::Dvi,
        arguments: "-interaction=nonstopmode --src-specials %input",
        parser: latex_parser,
        triggers: &[],
    },
    Builtin {
        name: "pslatex",
        input: Format::Tex,
        output: Format::Ps,
        arguments: "-interaction=nonstopmode %input",
        parser: latex_parser,
        triggers: &[],
    },
    Builtin {
        name: "pdflatex",
        input: Format::Tex,
        output: Format::Pdf,
        arguments: ENGINE_ARGS,
        parser: latex_parser,
        triggers: &[],
    },
    Builtin {
        name: "xelatex",
        input: Format::Tex,
        output: Format::Pdf,
        arguments: ENGINE_ARGS,
        parser: latex_parser,
        triggers: &[],
    },
    Builtin {
        name: "lualatex",
        input: Format::Tex,
        output: Format::Pdf,
        arguments: ENGINE_ARGS,
        parser: latex_parser,
        triggers: &[],
    },
    Builtin {
        name: "bibtex",
        input: Format::Bib,
        output: Format::Aux,
        arguments: "%output",
        parser: bibtex_parser,
        triggers: &[],
    },
    Builtin {
        name: "biber",
        input: Format::Bib,
        output: Format::Bcf,
        arguments: "%output",
        parser: biber_parser,
        triggers: &["bcf"],
    },
    Builtin {
        name: "makeindex",
        input: Format::Idx,
        output: Format::Idx,
        arguments: "%input",
        parser: makeindex_parser,
        triggers: &[],
    },
    Builtin {
        name: "makeindex-nomencl",
        input: Format::Nomencl,
        output: Format::Idx,
        arguments: "%input -s nomencl.ist -o %base.nls",
        parser: makeindex_parser,
        triggers: &[],
    },
    Builtin {
        name: "dvips",
        input: Format::Dvi,
        output: Format::Ps,
        arguments: "-o %output %input",
        parser: no_parser,
        triggers: &[],
    },
    Builtin {
        name: "dvipdf",
        input: Format::Dvi,
        output: Format::Pdf,
        arguments: "%input %output",
        parser: no_parser,
        triggers: &[],
    },
    Builtin {
        name: "ps2pdf",
        input: Format::Ps,
        output: Format::Pdf,
        arguments: "%input %output",
        parser: no_parser,
        triggers: &[],
    },
];

/// All known runners, looked up by conversion or by the file extension that
/// calls for them.
#[derive(Debug, Default)]
pub struct RunnerRegistry {
    runners: Vec<ProgramRunner>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in runners with program paths and arguments taken from
    /// `config`, or from `PATH` when not configured.
    pub fn with_defaults(config: &BuildConfig) -> Self {
        let mut registry = Self::new();
        for builtin in BUILTINS {
            let program_name = builtin.name.split('-').next().unwrap_or(builtin.name);
            let overrides = config.program(builtin.name);
            let program = overrides
                .and_then(|p| p.path.clone())
                .or_else(|| which::which(program_name).ok())
                .unwrap_or_else(|| PathBuf::from(program_name));
            let arguments = overrides
                .and_then(|p| p.arguments.as_deref())
                .unwrap_or(builtin.arguments);

            let mut runner = ProgramRunner::new(
                builtin.name,
                RunnerDescriptor {
                    input: builtin.input,
                    output: builtin.output,
                },
                program,
                arguments,
                (builtin.parser)(),
            )
            .with_triggers(builtin.triggers);
            if builtin.input == Format::Tex {
                runner = runner.with_prompts(LATEX_PROMPTS);
            }
            log::debug!("registered {} -> {}", builtin.name, runner.program().display());
            registry.register(runner);
        }
        registry
    }

    pub fn register(&mut self, runner: ProgramRunner) -> RunnerId {
        self.runners.push(runner);
        RunnerId(self.runners.len() - 1)
    }

    /// # Panics
    ///
    /// If `id` was not handed out by this registry.
    pub fn runner(&self, id: RunnerId) -> &ProgramRunner {
        &self.runners[id.0]
    }

    /// The `index`-th runner converting `input` into `output`.
    pub fn get(&self, input: Format, output: Format, index: usize) -> Option<RunnerId> {
        self.iter()
            .filter(|(_, r)| r.input_format() == input && r.output_format() == output)
            .nth(index)
            .map(|(id, _)| id)
    }

    pub fn by_name(&self, name: &str) -> Option<RunnerId> {
        self.iter().find(|(_, r)| r.name() == name).map(|(id, _)| id)
    }

    /// bibtex, or biber when `biblatex` is set.
    pub fn bibliography_runner(&self, biblatex: bool) -> Option<RunnerId> {
        let output = if biblatex { Format::Bcf } else { Format::Aux };
        self.get(Format::Bib, output, 0)
    }

    /// The auxiliary runner to schedule when a file with `extension`
    /// changed. Of the bibliography tools only the one matching `biblatex`
    /// qualifies. LaTeX engines and format converters never do.
    pub fn runner_for_extension(&self, extension: &str, biblatex: bool) -> Option<RunnerId> {
        let bibliography = self.bibliography_runner(biblatex);
        self.iter()
            .filter(|(_, r)| is_auxiliary(r) && r.handles_extension(extension))
            .find(|(id, r)| r.input_format() != Format::Bib || Some(*id) == bibliography)
            .map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RunnerId, &ProgramRunner)> {
        self.runners.iter().enumerate().map(|(i, r)| (RunnerId(i), r))
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

fn is_auxiliary(runner: &ProgramRunner) -> bool {
    let input = runner.input_format();
    input != Format::Tex && !input.is_output()
}
