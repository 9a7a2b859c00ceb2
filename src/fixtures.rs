//! Small result files shared by the unit tests.

pub const RESULT_CIF: &str = concat!(
    "data_1tst\n",
    "#\n",
    "_entry.id 1TST\n",
    "#\n",
    "loop_\n",
    "_atom_site.group_PDB\n",
    "_atom_site.id\n",
    "_atom_site.type_symbol\n",
    "_atom_site.label_atom_id\n",
    "_atom_site.label_alt_id\n",
    "_atom_site.label_comp_id\n",
    "_atom_site.label_asym_id\n",
    "_atom_site.label_seq_id\n",
    "_atom_site.pdbx_PDB_ins_code\n",
    "_atom_site.Cartn_x\n",
    "_atom_site.Cartn_y\n",
    "_atom_site.Cartn_z\n",
    "_atom_site.auth_seq_id\n",
    "_atom_site.auth_asym_id\n",
    "ATOM   1 N  N   . GLY A 1 ? 1.000 2.000 3.000 10 A\n",
    "ATOM   2 C  CA  . GLY A 1 ? 1.500 2.500 3.500 10 A\n",
    "HETATM 3 ZN ZN  . ZN  B . ? -4.25 0.125 7.000 201 A\n",
    "#\n",
    "loop_\n",
    "_sb_ncbr_partial_atomic_charges.type_id\n",
    "_sb_ncbr_partial_atomic_charges.atom_id\n",
    "_sb_ncbr_partial_atomic_charges.charge\n",
    "1 1 1.5\n",
    "1 2 ?\n",
    "1 3 -0.5\n",
);

pub const RESULT_WARNINGS: &str = r#"[
    {"chain_id": "A", "residue_id": 10, "residue_name": "GLY", "warning": "Missing hydrogens"},
    {"chain_id": "A", "residue_id": 201, "residue_name": "ZN", "warning": "Unusual coordination"},
    {"chain_id": "X", "residue_id": 10, "residue_name": "GLY", "warning": "No such chain"}
]"#;
