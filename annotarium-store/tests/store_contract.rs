//! Contract tests for the metadata store: batch atomicity, unique indexes,
//! queries, projections, aggregations, atomic modify, cascading deletes.

use annotarium_core::AnnotariumError;
use annotarium_store::{
    Annotation, AnnotationSequenceMap, Filter, FindOptions, MetadataStore, Modify, TaxonNode,
};
use annotarium_test::fixtures::{annotation, temp_store};
use pretty_assertions::assert_eq;
use serde_json::json;

fn three_annotations(store: &MetadataStore) {
    let mut b = annotation("bbb", "https://x/b.gff.gz", "md5-b");
    b.taxid = 10090;
    b.assembly_accession = "GCA_000001635.9".to_string();
    let annotations = vec![
        annotation("aaa", "https://x/a.gff.gz", "md5-a"),
        b,
        annotation("ccc", "https://x/c.gff.gz", "md5-c"),
    ];
    store.insert_many(&annotations).unwrap();
}

#[test]
fn insert_and_get_roundtrip() {
    let (_dir, store) = temp_store();
    let original = annotation("aaa", "https://x/a.gff.gz", "md5-a");
    store.insert_many(std::slice::from_ref(&original)).unwrap();

    let loaded: Annotation = store.get("aaa").unwrap().unwrap();
    assert_eq!(loaded, original);
    assert!(store.get::<Annotation>("zzz").unwrap().is_none());
}

#[test]
fn duplicate_primary_key_fails_whole_batch() {
    let (_dir, store) = temp_store();
    store
        .insert_many(&[annotation("aaa", "https://x/a.gff.gz", "md5-a")])
        .unwrap();

    let batch = vec![
        annotation("new", "https://x/new.gff.gz", "md5-new"),
        annotation("aaa", "https://x/other.gff.gz", "md5-other"),
    ];
    let err = store.insert_many(&batch).unwrap_err();
    assert!(matches!(err, AnnotariumError::AlreadyExists(_)));

    // all-or-nothing: the first element of the failed batch is absent too
    assert!(store.get::<Annotation>("new").unwrap().is_none());
}

#[test]
fn unique_field_conflict_fails_batch() {
    let (_dir, store) = temp_store();
    store
        .insert_many(&[annotation("aaa", "https://x/a.gff.gz", "md5-a")])
        .unwrap();

    // same url_path, different id and md5
    let err = store
        .insert_many(&[annotation("bbb", "https://x/a.gff.gz", "md5-b")])
        .unwrap_err();
    assert!(matches!(err, AnnotariumError::AlreadyExists(_)));

    // same declared md5
    let err = store
        .insert_many(&[annotation("ccc", "https://x/c.gff.gz", "md5-a")])
        .unwrap_err();
    assert!(matches!(err, AnnotariumError::AlreadyExists(_)));
}

#[test]
fn find_by_unique_uses_the_index() {
    let (_dir, store) = temp_store();
    three_annotations(&store);

    let found: Annotation = store
        .find_by_unique("url_path", "https://x/b.gff.gz")
        .unwrap()
        .unwrap();
    assert_eq!(found.annotation_id, "bbb");
    assert!(store
        .find_by_unique::<Annotation>("url_path", "https://x/nope.gff.gz")
        .unwrap()
        .is_none());
}

#[test]
fn find_with_filter_sort_and_pagination() {
    let (_dir, store) = temp_store();
    three_annotations(&store);

    let human: Vec<Annotation> = store
        .find(&Filter::eq("taxid", 9606), &Default::default())
        .unwrap();
    assert_eq!(human.len(), 2);

    let sorted: Vec<Annotation> = store
        .find(&Filter::All, &FindOptions::sorted_by("annotation_id", true))
        .unwrap();
    let ids: Vec<&str> = sorted.iter().map(|a| a.annotation_id.as_str()).collect();
    assert_eq!(ids, vec!["ccc", "bbb", "aaa"]);

    let page: Vec<Annotation> = store
        .find(
            &Filter::All,
            &FindOptions {
                sort_by: Some("annotation_id".to_string()),
                descending: false,
                skip: 1,
                limit: Some(1),
            },
        )
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].annotation_id, "bbb");
}

#[test]
fn projections_and_count_by() {
    let (_dir, store) = temp_store();
    three_annotations(&store);

    let urls = store
        .project_field::<Annotation>(&Filter::All, "source_file_info.url_path")
        .unwrap();
    assert_eq!(urls.len(), 3);

    let rows = store
        .project_fields::<Annotation>(&Filter::eq("taxid", 9606), &["annotation_id", "taxid"])
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], json!(9606));

    let by_assembly = store
        .count_by::<Annotation>(&Filter::All, "assembly_accession")
        .unwrap();
    assert_eq!(by_assembly.get("GCA_000001405.15"), Some(&2));
    assert_eq!(by_assembly.get("GCA_000001635.9"), Some(&1));
}

#[test]
fn group_max_aggregation() {
    let (_dir, store) = temp_store();
    let mut a = annotation("aaa", "https://x/a.gff.gz", "md5-a");
    a.indexed_file_info.file_size = 100;
    let mut b = annotation("bbb", "https://x/b.gff.gz", "md5-b");
    b.indexed_file_info.file_size = 900;
    let mut c = annotation("ccc", "https://x/c.gff.gz", "md5-c");
    c.taxid = 10090;
    c.indexed_file_info.file_size = 50;
    store.insert_many(&[a, b, c]).unwrap();

    let maxima = store
        .group_max::<Annotation>(&Filter::All, "taxid", "indexed_file_info.file_size")
        .unwrap();
    assert_eq!(maxima.get("9606"), Some(&json!(900)));
    assert_eq!(maxima.get("10090"), Some(&json!(50)));
}

#[test]
fn modify_set_and_add_to_set() {
    let (_dir, store) = temp_store();
    let node = TaxonNode {
        taxid: 9605,
        scientific_name: "Homo".to_string(),
        rank: Some("genus".to_string()),
        children: Default::default(),
        annotations_count: 0,
        assemblies_count: 0,
        organisms_count: 0,
    };
    store.insert_many(&[node]).unwrap();

    store
        .modify::<TaxonNode>(
            "9605",
            &[
                Modify::Set("annotations_count".to_string(), json!(3)),
                Modify::AddToSet("children".to_string(), json!(9606)),
            ],
        )
        .unwrap();
    // add-to-set is idempotent
    store
        .modify::<TaxonNode>(
            "9605",
            &[Modify::AddToSet("children".to_string(), json!(9606))],
        )
        .unwrap();

    let node: TaxonNode = store.get("9605").unwrap().unwrap();
    assert_eq!(node.annotations_count, 3);
    assert_eq!(node.children.len(), 1);
    assert!(node.children.contains(&9606));
}

#[test]
fn modify_missing_document_errors() {
    let (_dir, store) = temp_store();
    let err = store
        .modify::<TaxonNode>("404", &[Modify::Set("rank".to_string(), json!("species"))])
        .unwrap_err();
    assert!(matches!(err, AnnotariumError::NotFound(_)));
}

#[test]
fn delete_where_releases_unique_keys() {
    let (_dir, store) = temp_store();
    three_annotations(&store);

    let deleted = store
        .delete_where::<Annotation>(&Filter::eq("taxid", 9606))
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.count::<Annotation>(&Filter::All).unwrap(), 1);

    // the unique keys are free again
    store
        .insert_many(&[annotation("aaa2", "https://x/a.gff.gz", "md5-a")])
        .unwrap();
}

#[test]
fn delete_cascade_for_sequence_maps() {
    let (_dir, store) = temp_store();
    let rows = vec![
        AnnotationSequenceMap {
            annotation_id: "aaa".to_string(),
            sequence_id: "1".to_string(),
            aliases: ["1", "chr1"].iter().map(|s| s.to_string()).collect(),
        },
        AnnotationSequenceMap {
            annotation_id: "aaa".to_string(),
            sequence_id: "2".to_string(),
            aliases: ["2", "chr2"].iter().map(|s| s.to_string()).collect(),
        },
        AnnotationSequenceMap {
            annotation_id: "bbb".to_string(),
            sequence_id: "1".to_string(),
            aliases: ["1"].iter().map(|s| s.to_string()).collect(),
        },
    ];
    store.insert_many(&rows).unwrap();

    let deleted = store
        .delete_where::<AnnotationSequenceMap>(&Filter::eq("annotation_id", "aaa"))
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining: Vec<AnnotationSequenceMap> =
        store.find(&Filter::All, &Default::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].annotation_id, "bbb");
}

#[test]
fn upsert_replaces_and_keeps_unique_keys_consistent() {
    let (_dir, store) = temp_store();
    let original = annotation("aaa", "https://x/a.gff.gz", "md5-a");
    store.insert_many(&[original]).unwrap();

    let mut updated = annotation("aaa", "https://x/moved.gff.gz", "md5-a");
    updated.organism_name = "Homo sapiens sapiens".to_string();
    store.upsert(&updated).unwrap();

    let loaded: Annotation = store.get("aaa").unwrap().unwrap();
    assert_eq!(loaded.source_file_info.url_path, "https://x/moved.gff.gz");
    // the old url_path key was released
    store
        .insert_many(&[annotation("bbb", "https://x/a.gff.gz", "md5-b")])
        .unwrap();
}

#[test]
fn readers_see_only_committed_batches() {
    let (_dir, store) = temp_store();
    let failing = vec![
        annotation("aaa", "https://x/a.gff.gz", "md5-a"),
        annotation("dup", "https://x/a.gff.gz", "md5-dup"),
    ];
    assert!(store.insert_many(&failing).is_err());
    assert_eq!(store.count::<Annotation>(&Filter::All).unwrap(), 0);
}
