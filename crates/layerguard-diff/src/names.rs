use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Plain listing without status information (`--name-only`, `--files-from`).
    Listed,
    Added,
    Modified,
    Deleted,
    TypeChanged,
    Unmerged,
    /// Destination of a rename.
    Renamed,
    /// Source of a rename; the path no longer exists at head.
    RenamedFrom,
    Copied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    pub status: ChangeStatus,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChangeListError {
    #[error("line {line}: unknown change status '{status}'")]
    UnknownStatus { line: usize, status: String },

    #[error("line {line}: status '{status}' expects {expected} path(s), found {found}")]
    WrongPathCount {
        line: usize,
        status: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unterminated quoted path")]
    UnterminatedQuote { line: usize },
}

/// Parse a changed-path listing and return paths in input order, de-duplicated.
///
/// Accepts, line by line:
/// - `git diff --name-status` output (`M\tpath`, `R100\told\tnew`)
/// - `git diff --name-only` output or any plain list (one path per line)
///
/// Paths are normalized to forward slashes with any leading `./` removed.
/// Blank lines are ignored.
pub fn parse_changed_paths(text: &str) -> Result<Vec<ChangedPath>, ChangeListError> {
    let mut out: Vec<ChangedPath> = Vec::new();
    let mut seen = HashSet::<String>::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let entries = if line.contains('\t') {
            parse_status_line(line, line_no)?
        } else {
            vec![ChangedPath {
                path: unquote_path(line.trim(), line_no)?,
                status: ChangeStatus::Listed,
            }]
        };

        for entry in entries {
            let path = normalize_path(&entry.path);
            if path.is_empty() {
                continue;
            }
            // First occurrence keeps its position.
            if seen.insert(path.clone()) {
                out.push(ChangedPath {
                    path,
                    status: entry.status,
                });
            }
        }
    }

    Ok(out)
}

/// Paths given one per item, such as command-line arguments.
///
/// Each item is taken as a single path: nothing is unquoted, split on
/// newlines, or read as a status line. Separators and leading `./` are
/// normalized and duplicates dropped, as in [`parse_changed_paths`].
pub fn listed_paths<S: AsRef<str>>(items: &[S]) -> Vec<ChangedPath> {
    let mut out: Vec<ChangedPath> = Vec::new();
    let mut seen = HashSet::<String>::new();

    for item in items {
        if item.as_ref().trim().is_empty() {
            continue;
        }
        let path = normalize_separators(item.as_ref());
        if !path.is_empty() && seen.insert(path.clone()) {
            out.push(ChangedPath {
                path,
                status: ChangeStatus::Listed,
            });
        }
    }

    out
}

fn parse_status_line(line: &str, line_no: usize) -> Result<Vec<ChangedPath>, ChangeListError> {
    let mut fields = line.split('\t');
    let status = fields.next().unwrap_or("").trim();
    let paths = fields
        .map(|f| unquote_path(f, line_no))
        .collect::<Result<Vec<_>, _>>()?;

    let mut chars = status.chars();
    let letter = chars.next();
    let score = chars.as_str();
    if !score.chars().all(|c| c.is_ascii_digit()) {
        return Err(ChangeListError::UnknownStatus {
            line: line_no,
            status: status.to_string(),
        });
    }

    let expect = |expected: usize| -> Result<(), ChangeListError> {
        if paths.len() == expected {
            Ok(())
        } else {
            Err(ChangeListError::WrongPathCount {
                line: line_no,
                status: status.to_string(),
                expected,
                found: paths.len(),
            })
        }
    };

    let single = |status: ChangeStatus| -> Result<Vec<ChangedPath>, ChangeListError> {
        expect(1)?;
        Ok(vec![ChangedPath {
            path: paths[0].clone(),
            status,
        }])
    };

    match letter {
        Some('A') => single(ChangeStatus::Added),
        Some('M') => single(ChangeStatus::Modified),
        Some('D') => single(ChangeStatus::Deleted),
        Some('T') => single(ChangeStatus::TypeChanged),
        Some('U') => single(ChangeStatus::Unmerged),
        Some('R') => {
            expect(2)?;
            Ok(vec![
                ChangedPath {
                    path: paths[0].clone(),
                    status: ChangeStatus::RenamedFrom,
                },
                ChangedPath {
                    path: paths[1].clone(),
                    status: ChangeStatus::Renamed,
                },
            ])
        }
        Some('C') => {
            // The copy source is untouched; only the destination changed.
            expect(2)?;
            Ok(vec![ChangedPath {
                path: paths[1].clone(),
                status: ChangeStatus::Copied,
            }])
        }
        _ => Err(ChangeListError::UnknownStatus {
            line: line_no,
            status: status.to_string(),
        }),
    }
}

/// Undo git's C-style quoting (`core.quotePath`) when the path is wrapped in quotes.
fn unquote_path(field: &str, line_no: usize) -> Result<String, ChangeListError> {
    let Some(inner) = field.strip_prefix('"') else {
        return Ok(field.to_string());
    };
    let Some(inner) = inner.strip_suffix('"') else {
        return Err(ChangeListError::UnterminatedQuote { line: line_no });
    };

    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let raw = inner.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' || i + 1 >= raw.len() {
            bytes.push(b);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        match next {
            b'n' => bytes.push(b'\n'),
            b't' => bytes.push(b'\t'),
            b'r' => bytes.push(b'\r'),
            b'"' => bytes.push(b'"'),
            b'\\' => bytes.push(b'\\'),
            b'0'..=b'7' if is_octal_triplet(&raw[i + 1..]) => {
                let value = (raw[i + 1] - b'0') as u32 * 64
                    + (raw[i + 2] - b'0') as u32 * 8
                    + (raw[i + 3] - b'0') as u32;
                bytes.push(value as u8);
                i += 4;
                continue;
            }
            other => {
                bytes.push(b'\\');
                bytes.push(other);
            }
        }
        i += 2;
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn is_octal_triplet(s: &[u8]) -> bool {
    s.len() >= 3 && s[..3].iter().all(|b| (b'0'..=b'7').contains(b))
}

fn normalize_path(p: &str) -> String {
    normalize_separators(p.trim())
}

fn normalize_separators(p: &str) -> String {
    let replaced = p.replace('\\', "/");
    let mut rest = replaced.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}
