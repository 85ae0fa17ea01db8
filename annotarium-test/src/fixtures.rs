//! Shared fixtures: GFF content, catalog rows, external-service payloads,
//! entity builders, temp stores

use annotarium_bio::{FeatureOverview, FeatureStatistics};
use annotarium_core::Md5Digest;
use annotarium_store::{
    Annotation, IndexedFileInfo, MetadataStore, SourceFileInfo,
};
use chrono::{NaiveDate, Utc};
use tempfile::TempDir;

/// Catalog header used by the ingestion fixtures.
pub const CATALOG_HEADER: &str = "source_database\tannotation_provider\trelease_date\tlast_modified_date\tmd5_checksum\taccess_url\ttaxon_id\torganism_name\tpipeline_name\tpipeline_version\tpipeline_method\tassembly_accession\tassembly_name";

/// One catalog row with the fixture taxon/assembly context.
pub fn catalog_row(md5: &str, access_url: &str) -> String {
    format!(
        "ensembl\tensembl\t2024-05-01\t2024-04-20\t{md5}\t{access_url}\t9606\tHomo sapiens\tgenebuild\t1.0\tfull\tGCA_000001405.15\tGRCh38"
    )
}

/// A small unsorted human-like GFF covering all three gene categories.
pub fn unsorted_gff() -> String {
    "##gff-version 3\n\
     2\tensembl\tgene\t500\t900\t.\t+\t.\tID=g3;biotype=protein_coding\n\
     2\tensembl\tmRNA\t500\t900\t.\t+\t.\tID=t3;Parent=g3;biotype=protein_coding\n\
     2\tensembl\texon\t500\t900\t.\t+\t.\tParent=t3\n\
     2\tensembl\tCDS\t550\t880\t.\t+\t0\tParent=t3\n\
     1\tensembl\tgene\t100\t1000\t.\t+\t.\tID=g1;biotype=protein_coding\n\
     1\tensembl\tmRNA\t100\t1000\t.\t+\t.\tID=t1;Parent=g1;biotype=protein_coding\n\
     1\tensembl\texon\t100\t400\t.\t+\t.\tParent=t1\n\
     1\tensembl\texon\t600\t1000\t.\t+\t.\tParent=t1\n\
     1\tensembl\tCDS\t150\t400\t.\t+\t0\tParent=t1\n\
     1\thavana\tpseudogene\t2000\t2400\t.\t-\t.\tID=g2;biotype=processed_pseudogene\n\
     1\thavana\tpseudogenic_transcript\t2000\t2400\t.\t-\t.\tID=t2;Parent=g2\n\
     1\thavana\texon\t2000\t2400\t.\t-\t.\tParent=t2\n"
        .to_string()
}

/// The declared-MD5 of [`unsorted_gff`] is irrelevant to content identity;
/// this is the MD5 the pipeline computes over the *sorted* bytes.
pub fn sorted_gff_md5() -> String {
    let unsorted = unsorted_gff();
    let mut headers = Vec::new();
    let mut data: Vec<&str> = Vec::new();
    for line in unsorted.lines() {
        if line.starts_with('#') {
            headers.push(line);
        } else {
            data.push(line);
        }
    }
    data.sort_by_key(|line| {
        let cols: Vec<&str> = line.split('\t').collect();
        (cols[0].to_string(), cols[3].parse::<u64>().unwrap_or(0))
    });
    let mut sorted = String::new();
    for line in headers.into_iter().chain(data) {
        sorted.push_str(line);
        sorted.push('\n');
    }
    Md5Digest::of_bytes(sorted.as_bytes()).to_string()
}

/// NCBI-style taxonomy JSON for the fixture lineage (9606 under 9605/2759).
pub fn taxonomy_leaf_json() -> &'static str {
    r#"{"taxonomy_nodes":[{"taxonomy":{"tax_id":9606,"organism_name":"Homo sapiens","rank":"SPECIES","lineage":[1,2759,9605]}}]}"#
}

pub fn taxonomy_ancestors_json() -> &'static str {
    r#"{"taxonomy_nodes":[
        {"taxonomy":{"tax_id":2759,"organism_name":"Eukaryota","rank":"SUPERKINGDOM"}},
        {"taxonomy":{"tax_id":9605,"organism_name":"Homo","rank":"GENUS"}}
    ]}"#
}

/// Assembly dataset-report JSON for GCA_000001405.15.
pub fn assembly_summary_json() -> &'static str {
    r#"{"reports":[{
        "accession":"GCA_000001405.15",
        "paired_accession":"GCF_000001405.26",
        "assembly_info":{"assembly_name":"GRCh38","submitter":"Genome Reference Consortium","release_date":"2013-12-17"},
        "organism":{"tax_id":9606,"organism_name":"Homo sapiens"},
        "assembly_stats":{"total_sequence_length":"3099734149","contig_n50":56413054,"gc_percent":"41.0"}
    }]}"#
}

/// Assembly report text with chromosomes 1 and 2.
pub fn assembly_report_text() -> &'static str {
    "# Assembly name:  GRCh38\n\
     # Sequence-Name\tSequence-Role\tAssigned-Molecule\tAssigned-Molecule-Location/Type\tGenBank-Accn\tRelationship\tRefSeq-Accn\tAssembly-Unit\tSequence-Length\tUCSC-style-name\n\
     1\tassembled-molecule\t1\tChromosome\tCM000663.2\t=\tNC_000001.11\tPrimary Assembly\t248956422\tchr1\n\
     2\tassembled-molecule\t2\tChromosome\tCM000664.2\t=\tNC_000002.12\tPrimary Assembly\t242193529\tchr2\n\
     KI270706.1\tunlocalized-scaffold\t1\tChromosome\tKI270706.1\t=\tNT_187361.1\tPrimary Assembly\t175055\tchr1_KI270706v1_random\n"
}

/// Fresh metadata store in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn temp_store() -> (TempDir, MetadataStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = MetadataStore::open(&dir.path().join("store")).expect("open store");
    (dir, store)
}

/// Minimal stored annotation for store/server tests.
pub fn annotation(annotation_id: &str, url_path: &str, declared_md5: &str) -> Annotation {
    Annotation {
        annotation_id: annotation_id.to_string(),
        taxid: 9606,
        organism_name: "Homo sapiens".to_string(),
        taxon_lineage: vec![9606, 9605, 2759],
        assembly_accession: "GCA_000001405.15".to_string(),
        assembly_name: "GRCh38".to_string(),
        source_file_info: SourceFileInfo {
            source_db: "ensembl".to_string(),
            provider: "ensembl".to_string(),
            url_path: url_path.to_string(),
            release_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            last_modified_date: NaiveDate::from_ymd_opt(2024, 4, 20),
            uncompressed_md5: declared_md5.to_string(),
            pipeline_name: None,
            pipeline_version: None,
            pipeline_method: None,
        },
        indexed_file_info: IndexedFileInfo {
            bgzipped_path: format!("9606/GCA_000001405.15/ensembl_{annotation_id}.gff.gz"),
            csi_path: format!("9606/GCA_000001405.15/ensembl_{annotation_id}.gff.gz.csi"),
            file_size: 1024,
            processed_at: Utc::now(),
        },
        mapped_regions: vec!["1".to_string(), "2".to_string()],
        features_summary: FeatureOverview::default(),
        features_statistics: FeatureStatistics::default(),
    }
}
