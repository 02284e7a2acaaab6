//! Template chain coordinates read with pdbtbx.
use crate::error::{Error, Result};
use crate::residue_constants::{aa3to1, AAAtom, ATOM_TYPE_NUM};
use std::path::{Path, PathBuf};

/// Polymer residues of one chain in file order with atoms in the 37-slot layout.
#[derive(Debug, Clone)]
pub struct TemplateChain {
    pub sequence: Vec<char>,
    pub positions: Vec<[[f32; 3]; ATOM_TYPE_NUM]>,
    pub masks: Vec<[f32; ATOM_TYPE_NUM]>,
}

impl TemplateChain {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence_string(&self) -> String {
        self.sequence.iter().collect()
    }
}

/// `{dir}/{pdb_id}.cif`, falling back to `{dir}/{pdb_id}.pdb`.
pub fn find_structure(dir: &Path, pdb_id: &str) -> Option<PathBuf> {
    ["cif", "pdb"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", pdb_id, ext)))
        .find(|path| path.is_file())
}

pub fn load_chain(path: &Path, chain_id: &str) -> Result<TemplateChain> {
    let (pdb, _warnings) = pdbtbx::open(&*path.to_string_lossy()).map_err(|errors| {
        Error::Structure {
            path: path.to_path_buf(),
            reason: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        }
    })?;
    let chain = pdb
        .chains()
        .find(|chain| chain.id() == chain_id)
        .ok_or_else(|| Error::Structure {
            path: path.to_path_buf(),
            reason: format!("no chain {}", chain_id),
        })?;

    let mut template = TemplateChain {
        sequence: Vec::new(),
        positions: Vec::new(),
        masks: Vec::new(),
    };
    for residue in chain.residues() {
        let name = residue.name().unwrap_or_default();
        if name != "MSE" && residue.atoms().all(|atom| atom.hetero()) {
            continue;
        }
        let mut positions = [[0f32; 3]; ATOM_TYPE_NUM];
        let mut mask = [0f32; ATOM_TYPE_NUM];
        for atom in residue.atoms() {
            if let Some(slot) = AAAtom::from_name(atom.name()).slot() {
                let (x, y, z) = atom.pos();
                positions[slot] = [x as f32, y as f32, z as f32];
                mask[slot] = 1.0;
            }
        }
        template.sequence.push(aa3to1(name));
        template.positions.push(positions);
        template.masks.push(mask);
    }
    Ok(template)
}
