//! Assembly report parsing
//!
//! Reports are `#`-commented tab-separated streams, one row per sequence:
//! Sequence-Name, Sequence-Role, Assigned-Molecule, Location/Type,
//! GenBank-Accn, Relationship, RefSeq-Accn, Assembly-Unit, Sequence-Length,
//! UCSC-style-name. Only `assembled-molecule` rows become chromosomes.

use annotarium_bio::alias::expand_aliases;
use annotarium_store::GenomicSequence;

pub fn parse_report(
    text: &str,
    assembly_accession: &str,
    assembly_name: &str,
) -> Vec<GenomicSequence> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| parse_row(line, assembly_accession, assembly_name))
        .collect()
}

fn parse_row(
    line: &str,
    assembly_accession: &str,
    assembly_name: &str,
) -> Option<GenomicSequence> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < 9 {
        return None;
    }
    if fields[1] != "assembled-molecule" {
        return None;
    }

    let sequence_name = fields[0];
    let assigned_molecule = present(fields[2]);
    let insdc_accession = present(fields[4]);
    let refseq_accession = present(fields[6]);
    let length = fields[8].parse().ok();
    let ucsc_style_name = fields.get(9).copied().and_then(present);

    let aliases = expand_aliases(
        [insdc_accession, refseq_accession].iter().flatten().copied(),
        [Some(sequence_name), assigned_molecule, ucsc_style_name]
            .iter()
            .flatten()
            .copied(),
    );

    Some(GenomicSequence {
        assembly_accession: assembly_accession.to_string(),
        assembly_name: assembly_name.to_string(),
        insdc_accession: insdc_accession.map(String::from),
        refseq_accession: refseq_accession.map(String::from),
        ucsc_style_name: ucsc_style_name.map(String::from),
        assigned_molecule: assigned_molecule.map(String::from),
        sequence_name: sequence_name.to_string(),
        length,
        aliases,
    })
}

fn present(value: &str) -> Option<&str> {
    if value.is_empty() || value.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
# Assembly name:  GRCh38
# Sequence-Name\tSequence-Role\tAssigned-Molecule\tAssigned-Molecule-Location/Type\tGenBank-Accn\tRelationship\tRefSeq-Accn\tAssembly-Unit\tSequence-Length\tUCSC-style-name
1\tassembled-molecule\t1\tChromosome\tCM000663.2\t=\tNC_000001.11\tPrimary Assembly\t248956422\tchr1
MT\tassembled-molecule\tMT\tMitochondrion\tJ01415.2\t=\tNC_012920.1\tnon-nuclear\t16569\tchrM
KI270706.1\tunlocalized-scaffold\t1\tChromosome\tKI270706.1\t=\tNT_187361.1\tPrimary Assembly\t175055\tchr1_KI270706v1_random
";

    #[test]
    fn test_only_assembled_molecules() {
        let sequences = parse_report(REPORT, "GCA_000001405.15", "GRCh38");
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].sequence_name, "1");
        assert_eq!(sequences[1].sequence_name, "MT");
    }

    #[test]
    fn test_row_fields_and_aliases() {
        let sequences = parse_report(REPORT, "GCA_000001405.15", "GRCh38");
        let chr1 = &sequences[0];
        assert_eq!(chr1.insdc_accession.as_deref(), Some("CM000663.2"));
        assert_eq!(chr1.refseq_accession.as_deref(), Some("NC_000001.11"));
        assert_eq!(chr1.ucsc_style_name.as_deref(), Some("chr1"));
        assert_eq!(chr1.length, Some(248956422));

        for alias in ["1", "01", "chr1", "chr01", "CM000663", "NC_000001.11"] {
            assert!(chr1.aliases.contains(alias), "missing alias {alias}");
        }
    }

    #[test]
    fn test_short_rows_skipped() {
        let sequences = parse_report("1\tassembled-molecule\n", "GCA_1", "asm");
        assert!(sequences.is_empty());
    }
}
