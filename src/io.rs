use std::{
    error::Error,
    fmt::Display,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use serde::Deserialize;

#[derive(Debug)]
#[non_exhaustive]
pub struct FromFileError {
    path: PathBuf,
    kind: FromFileErrorKind,
}

impl FromFileError {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self.kind, FromFileErrorKind::Parse(_))
    }
}

impl Display for FromFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FromFileErrorKind::Open(_) => write!(f, "unable to open file {:?}", self.path),
            FromFileErrorKind::Read(_) => write!(f, "unable to read file {:?}", self.path),
            FromFileErrorKind::Parse(_) => write!(f, "unable to parse file {:?}", self.path),
        }
    }
}

impl Error for FromFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            FromFileErrorKind::Open(err) => Some(err),
            FromFileErrorKind::Read(err) => Some(err),
            FromFileErrorKind::Parse(err) => Some(err),
        }
    }
}

#[derive(Debug)]
pub enum FromFileErrorKind {
    #[non_exhaustive]
    Open(io::Error),
    #[non_exhaustive]
    Read(io::Error),
    #[non_exhaustive]
    Parse(serde_json::Error),
}

pub(crate) fn read_file_to_string<P: AsRef<Path>>(path: P) -> Result<String, FromFileError> {
    fn inner(path: &Path) -> Result<String, FromFileError> {
        (|| {
            let mut string = String::new();
            File::open(path)
                .map_err(FromFileErrorKind::Open)?
                .read_to_string(&mut string)
                .map_err(FromFileErrorKind::Read)?;
            Ok(string)
        })()
        .map_err(|kind| FromFileError {
            path: path.to_owned(),
            kind,
        })
    }
    inner(path.as_ref())
}

/// Read a tsconfig-flavored JSON file. tsconfig.json is JSONC: the compiler
/// tolerates `//` and `/* */` comments and trailing commas, so both are
/// normalized away before handing the text to Serde.
pub(crate) fn read_jsonc_from_file<P, T>(path: P) -> Result<T, FromFileError>
where
    P: AsRef<Path>,
    for<'de> T: Deserialize<'de>,
{
    fn inner<T>(path: &Path) -> Result<T, FromFileError>
    where
        for<'de> T: Deserialize<'de>,
    {
        // Reading a file into a string before invoking Serde is faster than
        // invoking Serde from a BufReader, see
        // https://github.com/serde-rs/json/issues/160
        (|| {
            let mut string = String::new();
            File::open(path)
                .map_err(FromFileErrorKind::Open)?
                .read_to_string(&mut string)
                .map_err(FromFileErrorKind::Read)?;
            let normalized = remove_trailing_commas(&strip_jsonc_comments(&string));
            let json = serde_json::from_str(&normalized).map_err(FromFileErrorKind::Parse)?;
            Ok(json)
        })()
        .map_err(|kind| FromFileError {
            path: path.to_owned(),
            kind,
        })
    }
    inner(path.as_ref())
}

fn strip_jsonc_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push(ch);
            }
            continue;
        }

        if in_block_comment {
            if ch == '*' {
                if let Some('/') = chars.peek().copied() {
                    chars.next();
                    in_block_comment = false;
                }
            } else if ch == '\n' {
                out.push(ch);
            }
            continue;
        }

        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == '/' {
            match chars.peek().copied() {
                Some('/') => {
                    chars.next();
                    in_line_comment = true;
                    continue;
                }
                Some('*') => {
                    chars.next();
                    in_block_comment = true;
                    continue;
                }
                _ => {}
            }
        }

        out.push(ch);
    }

    out
}

fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == ',' {
            let next_significant = chars.clone().find(|next| !next.is_whitespace());
            if matches!(next_significant, Some('}') | Some(']')) {
                continue;
            }
        }

        out.push(ch);
    }

    out
}
