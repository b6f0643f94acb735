use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed vocabulary of file formats runners convert between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Tex,
    Dvi,
    Ps,
    Pdf,
    Bib,
    Aux,
    Bbl,
    Bcf,
    Idx,
    Nomencl,
}

impl Format {
    pub const ALL: [Format; 10] = [
        Format::Tex,
        Format::Dvi,
        Format::Ps,
        Format::Pdf,
        Format::Bib,
        Format::Aux,
        Format::Bbl,
        Format::Bcf,
        Format::Idx,
        Format::Nomencl,
    ];

    /// The name used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Format::Tex => "tex",
            Format::Dvi => "dvi",
            Format::Ps => "ps",
            Format::Pdf => "pdf",
            Format::Bib => "bib",
            Format::Aux => "aux",
            Format::Bbl => "bbl",
            Format::Bcf => "bcf",
            Format::Idx => "idx",
            Format::Nomencl => "nomencl",
        }
    }

    /// File extension of files in this format. Nomenclature input is
    /// written by the `nomencl` package as `.nlo`.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Nomencl => "nlo",
            other => other.name(),
        }
    }

    /// Whether the format is a final document a build can produce.
    pub fn is_output(self) -> bool {
        matches!(self, Format::Dvi | Format::Ps | Format::Pdf)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown format '{s}'"))
    }
}
