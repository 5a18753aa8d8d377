//! Genetic codes and coding-sequence translation
//!
//! Amino-acid maps use NCBI codon ordering (first, second, third base each
//! iterating T, C, A, G). `*` marks a stop codon.

use bio::alphabets::dna;
use thiserror::Error;

/// A recognized translation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneticCode {
    pub id: u8,
    pub description: &'static str,
    amino_acids: &'static str,
    starts: &'static [&'static str],
}

/// Translation tables accepted for schema creation
pub const GENETIC_CODES: &[GeneticCode] = &[
    GeneticCode {
        id: 1,
        description: "Standard",
        amino_acids: concat!("FFLLSSSSYY**CC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "CTG", "ATG"],
    },
    GeneticCode {
        id: 2,
        description: "Vertebrate Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIMMTTTTNNKKSS**", "VVVVAAAADDEEGGGG"),
        starts: &["ATT", "ATC", "ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 3,
        description: "Yeast Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "TTTTPPPPHHQQRRRR", "IIMMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 4,
        description: "Mold Mitochondrial; Protozoan Mitochondrial; Coelenterate Mitochondrial; Mycoplasma; Spiroplasma",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["TTA", "TTG", "CTG", "ATT", "ATC", "ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 5,
        description: "Invertebrate Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIMMTTTTNNKKSSSS", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "ATT", "ATC", "ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 6,
        description: "Ciliate Nuclear; Dasycladacean Nuclear; Hexamita Nuclear",
        amino_acids: concat!("FFLLSSSSYYQQCC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATG"],
    },
    GeneticCode {
        id: 9,
        description: "Echinoderm Mitochondrial; Flatworm Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNNKSSSS", "VVVVAAAADDEEGGGG"),
        starts: &["ATG", "GTG"],
    },
    GeneticCode {
        id: 10,
        description: "Euplotid Nuclear",
        amino_acids: concat!("FFLLSSSSYY**CCCW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATG"],
    },
    GeneticCode {
        id: 11,
        description: "Bacterial, Archaeal and Plant Plastid",
        amino_acids: concat!("FFLLSSSSYY**CC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "CTG", "ATT", "ATC", "ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 12,
        description: "Alternative Yeast Nuclear",
        amino_acids: concat!("FFLLSSSSYY**CC*W", "LLLSPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["CTG", "ATG"],
    },
    GeneticCode {
        id: 13,
        description: "Ascidian Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIMMTTTTNNKKSSGG", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "ATA", "ATG", "GTG"],
    },
    GeneticCode {
        id: 14,
        description: "Alternative Flatworm Mitochondrial",
        amino_acids: concat!("FFLLSSSSYYY*CCWW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNNKSSSS", "VVVVAAAADDEEGGGG"),
        starts: &["ATG"],
    },
    GeneticCode {
        id: 16,
        description: "Chlorophycean Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY*LCC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATG"],
    },
    GeneticCode {
        id: 21,
        description: "Trematode Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIMMTTTTNNNKSSSS", "VVVVAAAADDEEGGGG"),
        starts: &["ATG", "GTG"],
    },
    GeneticCode {
        id: 22,
        description: "Scenedesmus obliquus Mitochondrial",
        amino_acids: concat!("FFLLSS*SYY*LCC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATG"],
    },
    GeneticCode {
        id: 23,
        description: "Thraustochytrium Mitochondrial",
        amino_acids: concat!("FF*LSSSSYY**CC*W", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["ATT", "ATG", "GTG"],
    },
    GeneticCode {
        id: 24,
        description: "Pterobranchia Mitochondrial",
        amino_acids: concat!("FFLLSSSSYY**CCWW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSSK", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "CTG", "ATG", "GTG"],
    },
    GeneticCode {
        id: 25,
        description: "Candidate Division SR1 and Gracilibacteria",
        amino_acids: concat!("FFLLSSSSYY**CCGW", "LLLLPPPPHHQQRRRR", "IIIMTTTTNNKKSSRR", "VVVVAAAADDEEGGGG"),
        starts: &["TTG", "ATG", "GTG"],
    },
];

/// Look up a translation table by NCBI identifier
pub fn genetic_code(id: u8) -> Option<&'static GeneticCode> {
    GENETIC_CODES.iter().find(|code| code.id == id)
}

/// Why a coding sequence did not translate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("ambiguous or invalid characters")]
    InvalidCharacters,

    #[error("sequence length is not a multiple of 3")]
    IncompleteCodon,

    #[error("sequence shorter than {0} nucleotides")]
    TooShort(usize),

    #[error("translation error: first codon '{0}' is not a start codon")]
    MissingStart(String),

    #[error("translation error: final codon '{0}' is not a stop codon")]
    MissingStop(String),

    #[error("translation error: in frame stop codon '{0}' found")]
    InternalStop(String),
}

/// Strand that produced a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    ReverseComplement,
}

/// A successfully translated coding sequence (terminal stop removed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub protein: String,
    pub strand: Strand,
}

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

impl GeneticCode {
    /// Amino acid for one codon; `None` for non-ACGT input
    pub fn amino_acid(&self, codon: &[u8]) -> Option<char> {
        if codon.len() != 3 {
            return None;
        }
        let idx = base_index(codon[0])? * 16 + base_index(codon[1])? * 4 + base_index(codon[2])?;
        self.amino_acids.as_bytes().get(idx).map(|b| *b as char)
    }

    pub fn is_start(&self, codon: &str) -> bool {
        self.starts.contains(&codon)
    }

    pub fn is_stop(&self, codon: &[u8]) -> bool {
        self.amino_acid(codon) == Some('*')
    }

    /// Translate a complete CDS on one strand
    fn translate_strand(&self, sequence: &str) -> Result<String, TranslationError> {
        let bytes = sequence.as_bytes();
        let codon_count = bytes.len() / 3;

        let first = &sequence[..3];
        if !self.is_start(first) {
            return Err(TranslationError::MissingStart(first.to_string()));
        }

        let last = &sequence[bytes.len() - 3..];
        if !self.is_stop(last.as_bytes()) {
            return Err(TranslationError::MissingStop(last.to_string()));
        }

        let mut protein = String::with_capacity(codon_count - 1);
        protein.push('M');

        for i in 1..codon_count - 1 {
            let codon = &bytes[i * 3..i * 3 + 3];
            match self.amino_acid(codon) {
                Some('*') => {
                    return Err(TranslationError::InternalStop(
                        String::from_utf8_lossy(codon).into_owned(),
                    ))
                }
                Some(aa) => protein.push(aa),
                None => return Err(TranslationError::InvalidCharacters),
            }
        }

        Ok(protein)
    }

    /// Translate a coding sequence, trying the reverse complement second
    ///
    /// Rejects non-ACGT input, partial codons and sequences shorter than
    /// `min_length` before attempting either strand. When both strands fail
    /// the forward strand's reason is returned.
    pub fn translate_cds(&self, sequence: &str, min_length: usize) -> Result<Translation, TranslationError> {
        if sequence.is_empty() || !sequence.bytes().all(|b| base_index(b).is_some()) {
            return Err(TranslationError::InvalidCharacters);
        }

        if sequence.len() % 3 != 0 {
            return Err(TranslationError::IncompleteCodon);
        }

        // start + stop is the shortest possible CDS
        if sequence.len() < min_length.max(6) {
            return Err(TranslationError::TooShort(min_length.max(6)));
        }

        match self.translate_strand(sequence) {
            Ok(protein) => Ok(Translation {
                protein,
                strand: Strand::Forward,
            }),
            Err(forward_err) => {
                let reverse = reverse_complement(sequence);
                self.translate_strand(&reverse)
                    .map(|protein| Translation {
                        protein,
                        strand: Strand::ReverseComplement,
                    })
                    .map_err(|_| forward_err)
            }
        }
    }
}

/// Reverse complement of an ACGT string
pub fn reverse_complement(sequence: &str) -> String {
    String::from_utf8_lossy(&dna::revcomp(sequence.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_is_complete() {
        for code in GENETIC_CODES {
            assert_eq!(code.amino_acids.len(), 64, "table {}", code.id);
            assert!(!code.starts.is_empty(), "table {}", code.id);
            assert!(code.amino_acids.contains('*') || code.id == 0, "table {}", code.id);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(genetic_code(11).unwrap().description, "Bacterial, Archaeal and Plant Plastid");
        assert!(genetic_code(7).is_none());
        assert!(genetic_code(8).is_none());
    }

    #[test]
    fn test_standard_codons() {
        let code = genetic_code(1).unwrap();
        assert_eq!(code.amino_acid(b"ATG"), Some('M'));
        assert_eq!(code.amino_acid(b"TGG"), Some('W'));
        assert_eq!(code.amino_acid(b"TGA"), Some('*'));
        assert_eq!(code.amino_acid(b"GGG"), Some('G'));
        assert_eq!(code.amino_acid(b"NNN"), None);
    }

    #[test]
    fn test_mitochondrial_tga_is_tryptophan() {
        let code = genetic_code(2).unwrap();
        assert_eq!(code.amino_acid(b"TGA"), Some('W'));
        assert_eq!(code.amino_acid(b"AGA"), Some('*'));
    }

    #[test]
    fn test_translate_forward() {
        let code = genetic_code(11).unwrap();
        let t = code.translate_cds("ATGAAAGGGTAA", 0).unwrap();
        assert_eq!(t.protein, "MKG");
        assert_eq!(t.strand, Strand::Forward);
    }

    #[test]
    fn test_alternative_start_translates_as_methionine() {
        let code = genetic_code(11).unwrap();
        let t = code.translate_cds("GTGAAATAA", 0).unwrap();
        assert_eq!(t.protein, "MK");
    }

    #[test]
    fn test_translate_reverse_complement() {
        let code = genetic_code(11).unwrap();
        let reverse = reverse_complement("ATGAAAGGGTAA");
        let t = code.translate_cds(&reverse, 0).unwrap();
        assert_eq!(t.protein, "MKG");
        assert_eq!(t.strand, Strand::ReverseComplement);
    }

    #[test]
    fn test_rejections() {
        let code = genetic_code(11).unwrap();
        assert_eq!(code.translate_cds("ATGNAATAA", 0), Err(TranslationError::InvalidCharacters));
        assert_eq!(code.translate_cds("ATGAATA", 0), Err(TranslationError::IncompleteCodon));
        assert_eq!(code.translate_cds("ATGAAATAA", 201), Err(TranslationError::TooShort(201)));
        assert_eq!(
            code.translate_cds("ATGTAAAAATAA", 0),
            Err(TranslationError::InternalStop("TAA".to_string()))
        );
        assert_eq!(
            code.translate_cds("CCCAAATAA", 0),
            Err(TranslationError::MissingStart("CCC".to_string()))
        );
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ATGC"), "GCAT");
        assert_eq!(reverse_complement(""), "");
    }
}
