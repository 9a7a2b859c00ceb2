//! Just enough mmCIF to pull `_atom_site` rows out of a result file.
//!
//! Handles whitespace separated values, `'...'`/`"..."` quoting (a quote only
//! closes when followed by whitespace, so `"O5'"` is one value), `;` text fields
//! and `#` comments. Only `loop_` blocks are collected; single key/value items
//! are skipped.

#[derive(Debug, thiserror::Error)]
pub enum MmcifError {
    #[error("no `{0}` loop found")]
    MissingCategory(&'static str),

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("loop `{category}` has {values} values, not a multiple of its {columns} columns")]
    RaggedLoop { category: String, values: usize, columns: usize },

    #[error("invalid value `{value}` for `{tag}`")]
    InvalidValue { tag: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    quoted: bool,
}

impl<'a> Token<'a> {
    fn is_tag(&self) -> bool {
        !self.quoted && self.text.starts_with('_')
    }

    /// Ends the values of a loop
    fn is_reserved(&self) -> bool {
        if self.quoted {
            return false;
        }
        let lower = self.text.to_ascii_lowercase();
        self.text.starts_with('_')
            || lower == "loop_"
            || lower.starts_with("data_")
            || lower.starts_with("save_")
            || lower == "global_"
            || lower == "stop_"
    }
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let n = bytes.len();
    let mut tokens = Vec::with_capacity(n / 6);
    let mut i = 0;
    while i < n {
        let b = bytes[i];
        let line_start = i == 0 || bytes[i - 1] == b'\n';

        if line_start && b == b';' {
            // Text field runs until a line starting with ';'
            let start = i + 1;
            match text[start..].find("\n;") {
                Some(off) => {
                    tokens.push(Token { text: text[start..start + off].trim_end_matches('\r'), quoted: true });
                    i = start + off + 2;
                }
                None => {
                    tokens.push(Token { text: &text[start..], quoted: true });
                    i = n;
                }
            }
            continue;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'#' {
            while i < n && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if b == b'\'' || b == b'"' {
            let start = i + 1;
            let mut j = start;
            while j < n && bytes[j] != b'\n' {
                if bytes[j] == b && (j + 1 >= n || bytes[j + 1].is_ascii_whitespace()) {
                    break;
                }
                j += 1;
            }
            tokens.push(Token { text: &text[start..j], quoted: true });
            // Step over the closing quote if there was one
            i = if j < n && bytes[j] == b { j + 1 } else { j };
            continue;
        }
        let start = i;
        while i < n && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        tokens.push(Token { text: &text[start..i], quoted: false });
    }
    tokens
}

/// A `loop_` block: column tags plus values in row-major order.
#[derive(Debug, Clone)]
pub struct Loop<'a> {
    tags: Vec<&'a str>,
    values: Vec<&'a str>,
}

impl<'a> Loop<'a> {
    pub fn tags(&self) -> &[&'a str] {
        &self.tags
    }

    /// Column index of `{category}.{name}`, ignoring case.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|t| {
            t.split_once('.').is_some_and(|(_, field)| field.eq_ignore_ascii_case(name))
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = &[&'a str]> {
        self.values.chunks(self.tags.len())
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn in_category(tag: &str, category: &str) -> bool {
    tag.split_once('.').is_some_and(|(cat, _)| cat.eq_ignore_ascii_case(category))
}

/// Find the first loop whose tags belong to `category` (e.g. `_atom_site`).
pub fn find_loop<'a>(text: &'a str, category: &str) -> Result<Option<Loop<'a>>, MmcifError> {
    let tokens = tokenize(text);
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        i += 1;
        if tok.quoted || !tok.text.eq_ignore_ascii_case("loop_") {
            continue;
        }
        let mut tags = Vec::new();
        while i < tokens.len() && tokens[i].is_tag() {
            tags.push(tokens[i].text);
            i += 1;
        }
        let mut values = Vec::new();
        while i < tokens.len() && !tokens[i].is_reserved() {
            values.push(tokens[i].text);
            i += 1;
        }
        if !tags.first().is_some_and(|t| in_category(t, category)) {
            continue;
        }
        if values.len() % tags.len() != 0 {
            return Err(MmcifError::RaggedLoop {
                category: category.into(),
                values: values.len(),
                columns: tags.len(),
            });
        }
        return Ok(Some(Loop { tags, values }));
    }
    Ok(None)
}

/// One row of the `_atom_site` category.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSite {
    pub group: String,
    pub id: String,
    pub type_symbol: String,
    pub atom_name: String,
    pub alt_id: String,
    pub comp_id: String,
    pub label_asym_id: String,
    pub label_seq_id: String,
    pub auth_asym_id: String,
    pub auth_seq_id: String,
    pub ins_code: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `?` and `.` both mean "no value".
pub fn is_null(value: &str) -> bool {
    value == "?" || value == "."
}

pub fn read_atom_sites(text: &str) -> Result<Vec<AtomSite>, MmcifError> {
    let atoms = find_loop(text, "_atom_site")?.ok_or(MmcifError::MissingCategory("_atom_site"))?;

    let required = |name: &str| {
        atoms.column(name).ok_or_else(|| MmcifError::MissingColumn(format!("_atom_site.{name}")))
    };
    let c_id = required("id")?;
    let c_atom = required("label_atom_id")?;
    let c_comp = required("label_comp_id")?;
    let c_label_asym = required("label_asym_id")?;
    let c_label_seq = required("label_seq_id")?;
    let c_x = required("Cartn_x")?;
    let c_y = required("Cartn_y")?;
    let c_z = required("Cartn_z")?;
    let c_group = atoms.column("group_PDB");
    let c_type = atoms.column("type_symbol");
    let c_alt = atoms.column("label_alt_id");
    let c_ins = atoms.column("pdbx_PDB_ins_code");
    let c_auth_asym = atoms.column("auth_asym_id").unwrap_or(c_label_asym);
    let c_auth_seq = atoms.column("auth_seq_id").unwrap_or(c_label_seq);

    let coord = |row: &[&str], col: usize, name: &str| -> Result<f64, MmcifError> {
        row[col].parse::<f64>().map_err(|_| MmcifError::InvalidValue {
            tag: format!("_atom_site.{name}"),
            value: row[col].into(),
        })
    };
    let opt = |row: &[&str], col: Option<usize>| col.map(|c| row[c].to_string()).unwrap_or_default();

    let mut out = Vec::with_capacity(atoms.len());
    for row in atoms.rows() {
        out.push(AtomSite {
            group: c_group.map(|c| row[c].to_string()).unwrap_or_else(|| "ATOM".into()),
            id: row[c_id].into(),
            type_symbol: opt(row, c_type),
            atom_name: row[c_atom].into(),
            alt_id: opt(row, c_alt),
            comp_id: row[c_comp].into(),
            label_asym_id: row[c_label_asym].into(),
            label_seq_id: row[c_label_seq].into(),
            auth_asym_id: row[c_auth_asym].into(),
            auth_seq_id: row[c_auth_seq].into(),
            ins_code: opt(row, c_ins),
            x: coord(row, c_x, "Cartn_x")?,
            y: coord(row, c_y, "Cartn_y")?,
            z: coord(row, c_z, "Cartn_z")?,
        });
    }
    Ok(out)
}
