//! PQR output: PDB-style atom records with the partial charge and a radius in
//! place of occupancy and B-factor.

use std::io::{self, Write};

use crate::{
    charges::{Charge, ChargeRecord},
    mmcif::{is_null, AtomSite},
};

const DEFAULT_RADIUS: f64 = 1.8;

/// Van der Waals radii (Bondi) for elements common in biomolecular structures.
const VDW_RADII: &[(&str, f64)] = &[
    ("H", 1.20),
    ("C", 1.70),
    ("N", 1.55),
    ("O", 1.52),
    ("F", 1.47),
    ("P", 1.80),
    ("S", 1.80),
    ("CL", 1.75),
    ("BR", 1.85),
    ("I", 1.98),
    ("SE", 1.90),
    ("NA", 2.27),
    ("MG", 1.73),
    ("K", 2.75),
    ("CA", 2.31),
    ("NI", 1.63),
    ("CU", 1.40),
    ("ZN", 1.39),
];

#[derive(Debug, thiserror::Error)]
pub enum PqrError {
    #[error("structure has {atoms} atoms but {charges} charges")]
    AtomCountMismatch { atoms: usize, charges: usize },
    #[error("failed to write pqr: {0}")]
    Io(#[from] io::Error),
}

/// Element of an atom, from `type_symbol` or else the leading letter of its name.
fn element(atom: &AtomSite) -> String {
    if !atom.type_symbol.is_empty() && !is_null(&atom.type_symbol) {
        return atom.type_symbol.to_ascii_uppercase();
    }
    atom.atom_name
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

pub fn radius(element: &str) -> f64 {
    VDW_RADII
        .iter()
        .find(|(e, _)| *e == element)
        .map(|(_, r)| *r)
        .unwrap_or(DEFAULT_RADIUS)
}

/// Single-character column value, blank for mmCIF nulls.
fn flag(value: &str) -> char {
    if is_null(value) {
        ' '
    } else {
        value.chars().next().unwrap_or(' ')
    }
}

fn atom_name_field(name: &str, element: &str) -> String {
    let name: String = name.chars().take(4).collect();
    // Two-letter elements and 4-character names start in column 13
    if name.len() >= 4 || element.len() == 2 {
        format!("{name:<4}")
    } else {
        format!(" {name:<3}")
    }
}

fn format_record(atom: &AtomSite, charge: &Charge) -> String {
    let element = element(atom);
    let record = if atom.group.eq_ignore_ascii_case("HETATM") { "HETATM" } else { "ATOM" };
    let chain = if is_null(&atom.auth_asym_id) { " " } else { atom.auth_asym_id.as_str() };
    let res_seq = if is_null(&atom.auth_seq_id) { "" } else { atom.auth_seq_id.as_str() };
    format!(
        "{:<6}{:>5} {}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>8}{:>7.4}",
        record,
        atom.id,
        atom_name_field(&atom.atom_name, &element),
        flag(&atom.alt_id),
        atom.comp_id,
        chain,
        res_seq,
        flag(&atom.ins_code),
        atom.x,
        atom.y,
        atom.z,
        charge.to_string(),
        radius(&element),
    )
}

/// Write one record per atom, pairing atoms with charges in file order.
pub fn write_pqr<W: Write>(mut out: W, atoms: &[AtomSite], charges: &ChargeRecord) -> Result<(), PqrError> {
    if atoms.len() != charges.len() {
        return Err(PqrError::AtomCountMismatch { atoms: atoms.len(), charges: charges.len() });
    }
    for (atom, charge) in atoms.iter().zip(charges.charges()) {
        writeln!(out, "{}", format_record(atom, charge))?;
    }
    writeln!(out, "END")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fixtures::RESULT_CIF, mmcif::read_atom_sites};

    fn render() -> String {
        let atoms = read_atom_sites(RESULT_CIF).unwrap();
        let charges = ChargeRecord::parse(RESULT_CIF).unwrap();
        let mut out = Vec::new();
        write_pqr(&mut out, &atoms, &charges).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_columns() {
        let pqr = render();
        let lines: Vec<&str> = pqr.lines().collect();
        assert_eq!(lines.len(), 4);

        let first = lines[0];
        assert_eq!(&first[0..6], "ATOM  ");
        assert_eq!(&first[6..11], "    1");
        assert_eq!(&first[12..16], " N  ");
        assert_eq!(&first[16..17], " ");
        assert_eq!(&first[17..20], "GLY");
        assert_eq!(&first[21..22], "A");
        assert_eq!(&first[22..26], "  10");
        assert_eq!(&first[30..38], "   1.000");
        assert_eq!(&first[38..46], "   2.000");
        assert_eq!(&first[46..54], "   3.000");
        assert_eq!(&first[54..62], "  1.5000");
        assert_eq!(&first[62..69], " 1.5500");

        assert_eq!(&lines[1][12..16], " CA ");
        assert_eq!(&lines[1][54..62], "       ?");
        assert_eq!(&lines[1][62..69], " 1.7000");

        let zinc = lines[2];
        assert_eq!(&zinc[0..6], "HETATM");
        assert_eq!(&zinc[12..16], "ZN  ");
        assert_eq!(&zinc[22..26], " 201");
        assert_eq!(&zinc[30..38], "  -4.250");
        assert_eq!(&zinc[54..62], " -0.5000");
        assert_eq!(&zinc[62..69], " 1.3900");

        assert_eq!(lines[3], "END");
    }

    #[test]
    fn test_count_mismatch() {
        let atoms = read_atom_sites(RESULT_CIF).unwrap();
        let charges = ChargeRecord::parse(&format!("{}1 4 0.1\n", RESULT_CIF)).unwrap();
        let err = write_pqr(Vec::new(), &atoms, &charges).unwrap_err();
        assert!(matches!(err, PqrError::AtomCountMismatch { atoms: 3, charges: 4 }));
    }

    #[test]
    fn test_radius_defaults() {
        assert_eq!(radius("C"), 1.70);
        assert_eq!(radius("FE"), DEFAULT_RADIUS);
    }
}
