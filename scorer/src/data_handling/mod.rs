pub mod detectability;
pub mod peptide_table;
pub mod protein_weights;
pub mod proteome;
