//! Residue alphabets, atom ordering and per-residue atom tables.
//!
//! Two residue orders are in use. The MSA and template search tools emit
//! alphabetical one-letter order (`ACDEFGHIKLMNPQRSTVWY`, X=20, gap=21), while
//! model features use the three-letter alphabetical order (`ARNDCQEGHILKMFPSTWYV`, X=20).
use ndarray::Array2;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Model residue order.
pub const RESTYPES: [char; 20] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W', 'Y',
    'V',
];
pub const RESTYPE_NUM: usize = 20;
pub const UNKNOWN_RESTYPE: usize = 20;
/// Gap id in the HHblits alphabet.
pub const HHBLITS_GAP: i32 = 21;
pub const ATOM_TYPE_NUM: usize = 37;

/// Reorders an HHblits id (`ACDEFGHIKLMNPQRSTVWYX-`) into model residue order.
#[rustfmt::skip]
pub const MAP_HHBLITS_AATYPE_TO_OUR_AATYPE: [i32; 22] = [
    0, 4, 3, 6, 13, 7, 8, 9, 11, 10,
    12, 2, 14, 5, 1, 15, 16, 19, 17, 18,
    20, 21,
];

#[rustfmt::skip]
pub fn aa3to1(aa: &str) -> char {
    match aa {
        "ALA" => 'A', "CYS" => 'C', "ASP" => 'D',
        "GLU" => 'E', "PHE" => 'F', "GLY" => 'G',
        "HIS" => 'H', "ILE" => 'I', "LYS" => 'K',
        "LEU" => 'L', "MET" => 'M', "ASN" => 'N',
        "PRO" => 'P', "GLN" => 'Q', "ARG" => 'R',
        "SER" => 'S', "THR" => 'T', "VAL" => 'V',
        "TRP" => 'W', "TYR" => 'Y', "MSE" => 'M',
        _     => 'X',
    }
}

/// HHblits id for an alignment character. Ambiguity codes fold onto their closest residue.
#[rustfmt::skip]
pub fn hhblits_aa_to_id(aa: char) -> i32 {
    match aa {
        'A' => 0,  'B' => 2,  'C' => 1,  'D' => 2,
        'E' => 3,  'F' => 4,  'G' => 5,  'H' => 6,
        'I' => 7,  'J' => 20, 'K' => 8,  'L' => 9,
        'M' => 10, 'N' => 11, 'O' => 20, 'P' => 12,
        'Q' => 13, 'R' => 14, 'S' => 15, 'T' => 16,
        'U' => 1,  'V' => 17, 'W' => 18, 'X' => 20,
        'Y' => 19, 'Z' => 3,  '-' => 21,
        _   => 20,
    }
}

/// Index in model residue order; anything non-standard is `UNKNOWN_RESTYPE`.
pub fn restype_order(aa: char) -> usize {
    RESTYPES
        .iter()
        .position(|&r| r == aa)
        .unwrap_or(UNKNOWN_RESTYPE)
}

/// Atom names in the 37-slot layout shared by all residue types.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum AAAtom {
    N = 0,    CA = 1,   C = 2,    CB = 3,   O = 4,
    CG = 5,   CG1 = 6,  CG2 = 7,  OG = 8,   OG1 = 9,
    SG = 10,  CD = 11,  CD1 = 12, CD2 = 13, ND1 = 14,
    ND2 = 15, OD1 = 16, OD2 = 17, SD = 18,  CE = 19,
    CE1 = 20, CE2 = 21, CE3 = 22, NE = 23,  NE1 = 24,
    NE2 = 25, OE1 = 26, OE2 = 27, CH2 = 28, NH1 = 29,
    NH2 = 30, OH = 31,  CZ = 32,  CZ2 = 33, CZ3 = 34,
    NZ = 35,  OXT = 36,
    Unknown = -1,
}

impl AAAtom {
    /// Slot in the 37-atom layout, `None` for `Unknown`.
    pub fn slot(&self) -> Option<usize> {
        match self {
            AAAtom::Unknown => None,
            atom => Some(*atom as usize),
        }
    }

    /// Look up an atom by its PDB name. Selenium of MSE maps onto SD.
    pub fn from_name(name: &str) -> AAAtom {
        match name.trim() {
            "SE" => AAAtom::SD,
            other => other.parse().unwrap_or(AAAtom::Unknown),
        }
    }
}

macro_rules! define_residues {
    ($($name:ident: $code3:expr, $code1:expr, $idx:expr, $atoms14:expr),* $(,)?) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
        pub enum Residue {
            $($name),*
        }

        impl Residue {
            pub const fn code3(&self) -> &'static str {
                match self {
                    $(Self::$name => $code3),*
                }
            }
            pub const fn code1(&self) -> char {
                match self {
                    $(Self::$name => $code1),*
                }
            }
            pub const fn atoms14(&self) -> [AAAtom; 14] {
                match self {
                    $(Self::$name => $atoms14),*
                }
            }
            pub fn from_int(value: usize) -> Self {
                match value {
                    $($idx => Self::$name,)*
                    _ => Self::UNK
                }
            }
            pub fn to_int(&self) -> usize {
                match self {
                    $(Self::$name => $idx),*
                }
            }
        }
    }
}

use AAAtom::{Unknown as __, *};

// Model residue order.
#[rustfmt::skip]
define_residues! {
    ALA: "ALA", 'A', 0,  [N, CA, C, O, CB, __,  __,  __,  __,  __,  __,  __,  __,  __],
    ARG: "ARG", 'R', 1,  [N, CA, C, O, CB, CG,  CD,  NE,  CZ,  NH1, NH2, __,  __,  __],
    ASN: "ASN", 'N', 2,  [N, CA, C, O, CB, CG,  OD1, ND2, __,  __,  __,  __,  __,  __],
    ASP: "ASP", 'D', 3,  [N, CA, C, O, CB, CG,  OD1, OD2, __,  __,  __,  __,  __,  __],
    CYS: "CYS", 'C', 4,  [N, CA, C, O, CB, SG,  __,  __,  __,  __,  __,  __,  __,  __],
    GLN: "GLN", 'Q', 5,  [N, CA, C, O, CB, CG,  CD,  OE1, NE2, __,  __,  __,  __,  __],
    GLU: "GLU", 'E', 6,  [N, CA, C, O, CB, CG,  CD,  OE1, OE2, __,  __,  __,  __,  __],
    GLY: "GLY", 'G', 7,  [N, CA, C, O, __, __,  __,  __,  __,  __,  __,  __,  __,  __],
    HIS: "HIS", 'H', 8,  [N, CA, C, O, CB, CG,  ND1, CD2, CE1, NE2, __,  __,  __,  __],
    ILE: "ILE", 'I', 9,  [N, CA, C, O, CB, CG1, CG2, CD1, __,  __,  __,  __,  __,  __],
    LEU: "LEU", 'L', 10, [N, CA, C, O, CB, CG,  CD1, CD2, __,  __,  __,  __,  __,  __],
    LYS: "LYS", 'K', 11, [N, CA, C, O, CB, CG,  CD,  CE,  NZ,  __,  __,  __,  __,  __],
    MET: "MET", 'M', 12, [N, CA, C, O, CB, CG,  SD,  CE,  __,  __,  __,  __,  __,  __],
    PHE: "PHE", 'F', 13, [N, CA, C, O, CB, CG,  CD1, CD2, CE1, CE2, CZ,  __,  __,  __],
    PRO: "PRO", 'P', 14, [N, CA, C, O, CB, CG,  CD,  __,  __,  __,  __,  __,  __,  __],
    SER: "SER", 'S', 15, [N, CA, C, O, CB, OG,  __,  __,  __,  __,  __,  __,  __,  __],
    THR: "THR", 'T', 16, [N, CA, C, O, CB, OG1, CG2, __,  __,  __,  __,  __,  __,  __],
    TRP: "TRP", 'W', 17, [N, CA, C, O, CB, CG,  CD1, CD2, CE2, CE3, NE1, CZ2, CZ3, CH2],
    TYR: "TYR", 'Y', 18, [N, CA, C, O, CB, CG,  CD1, CD2, CE1, CE2, CZ,  OH,  __,  __],
    VAL: "VAL", 'V', 19, [N, CA, C, O, CB, CG1, CG2, __,  __,  __,  __,  __,  __,  __],
    UNK: "UNK", 'X', 20, [__, __, __, __, __, __, __, __, __, __, __, __, __, __],
}

/// `[21, 37]` mask of the heavy atoms each residue type has; the unknown row is empty.
pub fn standard_atom_mask() -> Array2<f32> {
    let mut mask = Array2::<f32>::zeros((RESTYPE_NUM + 1, ATOM_TYPE_NUM));
    for residue in Residue::iter() {
        for slot in residue.atoms14().iter().filter_map(AAAtom::slot) {
            mask[[residue.to_int(), slot]] = 1.0;
        }
    }
    mask
}

/// Chain labels in assignment order.
pub const PDB_CHAIN_IDS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Spreadsheet style id: 1 -> "A", 26 -> "Z", 27 -> "AA".
pub fn int_id_to_str_id(num: usize) -> String {
    let mut num = num;
    let mut output = Vec::new();
    while num > 0 {
        num -= 1;
        output.push((b'A' + (num % 26) as u8) as char);
        num /= 26;
    }
    output.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residue_codes() {
        let ala = Residue::ALA;
        assert_eq!(ala.code3(), "ALA");
        assert_eq!(ala.code1(), 'A');
        assert_eq!(ala.to_int(), 0);
        for residue in Residue::iter() {
            assert_eq!(restype_order(residue.code1()), residue.to_int());
            assert_eq!(aa3to1(residue.code3()), residue.code1());
        }
    }

    #[test]
    fn test_residue_from_int() {
        assert!(matches!(Residue::from_int(0), Residue::ALA));
        assert!(matches!(Residue::from_int(1), Residue::ARG));
        assert!(matches!(Residue::from_int(999), Residue::UNK));
    }

    #[test]
    fn test_residue_atoms() {
        let atoms = Residue::TRP.atoms14();
        assert_eq!(atoms[0], AAAtom::N);
        assert_eq!(atoms[13], AAAtom::CH2);
        assert_eq!(Residue::GLY.atoms14()[4], AAAtom::Unknown);
    }

    #[test]
    fn test_hhblits_map_agrees_with_alphabets() {
        let hhblits = "ACDEFGHIKLMNPQRSTVWY";
        for (id, aa) in hhblits.chars().enumerate() {
            assert_eq!(hhblits_aa_to_id(aa), id as i32);
            assert_eq!(
                MAP_HHBLITS_AATYPE_TO_OUR_AATYPE[id] as usize,
                restype_order(aa)
            );
        }
        assert_eq!(hhblits_aa_to_id('-'), HHBLITS_GAP);
        assert_eq!(MAP_HHBLITS_AATYPE_TO_OUR_AATYPE[21], 21);
    }

    #[test]
    fn test_standard_atom_mask() {
        let mask = standard_atom_mask();
        assert_eq!(mask.shape(), &[21, 37]);
        assert_eq!(mask.row(Residue::GLY.to_int()).sum(), 4.0);
        assert_eq!(mask.row(Residue::TRP.to_int()).sum(), 14.0);
        assert_eq!(mask.row(Residue::UNK.to_int()).sum(), 0.0);
        assert_eq!(mask[[Residue::ALA.to_int(), AAAtom::CB as usize]], 1.0);
    }

    #[test]
    fn test_atom_names() {
        assert_eq!(AAAtom::from_name("CA"), AAAtom::CA);
        assert_eq!(AAAtom::from_name(" OXT"), AAAtom::OXT);
        assert_eq!(AAAtom::from_name("SE"), AAAtom::SD);
        assert_eq!(AAAtom::from_name("H1"), AAAtom::Unknown);
    }

    #[test]
    fn test_int_id_to_str_id() {
        assert_eq!(int_id_to_str_id(1), "A");
        assert_eq!(int_id_to_str_id(26), "Z");
        assert_eq!(int_id_to_str_id(27), "AA");
        assert_eq!(int_id_to_str_id(28), "AB");
    }
}
