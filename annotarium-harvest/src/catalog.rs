//! Catalog fetcher: remote TSV rows streamed into candidate records
//!
//! Catalogs are tab-separated with a header row. Rows are forwarded through
//! a channel as they arrive off the wire; a failing catalog URL is logged
//! and skipped, never failing the whole run.

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One normalized catalog row, not yet admitted to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_db: String,
    pub provider: String,
    pub release_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
    /// MD5 of the uncompressed source as declared by the catalog
    pub md5_checksum: String,
    pub access_url: String,
    pub taxon_id: u32,
    pub organism_name: String,
    pub pipeline_name: Option<String>,
    pub pipeline_version: Option<String>,
    pub pipeline_method: Option<String>,
    pub assembly_accession: String,
    pub assembly_name: String,
}

const REQUIRED_COLUMNS: &[&str] = &[
    "source_database",
    "annotation_provider",
    "release_date",
    "last_modified_date",
    "md5_checksum",
    "access_url",
    "taxon_id",
    "organism_name",
    "assembly_accession",
    "assembly_name",
];

/// Stream every configured catalog into `tx`, in order. Returns how many
/// candidates were forwarded.
pub async fn stream_catalogs(
    client: &reqwest::Client,
    urls: &[String],
    tx: mpsc::Sender<Candidate>,
) -> Result<usize> {
    let mut forwarded = 0usize;
    for url in urls {
        match stream_one_catalog(client, url, &tx).await {
            Ok(count) => {
                info!(url, count, "catalog streamed");
                forwarded += count;
            }
            Err(e) => {
                warn!(url, error = %e, "skipping catalog");
            }
        }
    }
    Ok(forwarded)
}

async fn stream_one_catalog(
    client: &reqwest::Client,
    url: &str,
    tx: &mpsc::Sender<Candidate>,
) -> Result<usize> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("{} returned HTTP {}", url, response.status());
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut header: Option<HashMap<String, usize>> = None;
    let mut count = 0usize;

    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
        // forward complete lines, keep the partial tail buffered
        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if forward_line(&line, &mut header, tx, &mut count).await? {
                return Ok(count);
            }
        }
    }
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        forward_line(&line, &mut header, tx, &mut count).await?;
    }
    Ok(count)
}

/// Returns `true` when the receiver is gone and streaming should stop.
async fn forward_line(
    line: &str,
    header: &mut Option<HashMap<String, usize>>,
    tx: &mpsc::Sender<Candidate>,
    count: &mut usize,
) -> Result<bool> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return Ok(false);
    }
    match header {
        None => {
            *header = Some(parse_header(line)?);
            Ok(false)
        }
        Some(columns) => match Candidate::from_row(columns, line) {
            Some(candidate) => {
                *count += 1;
                Ok(tx.send(candidate).await.is_err())
            }
            None => {
                warn!(line, "skipping malformed catalog row");
                Ok(false)
            }
        },
    }
}

fn parse_header(line: &str) -> Result<HashMap<String, usize>> {
    let columns: HashMap<String, usize> = line
        .split('\t')
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();
    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(*required) {
            anyhow::bail!("catalog header missing column: {required}");
        }
    }
    Ok(columns)
}

impl Candidate {
    fn from_row(columns: &HashMap<String, usize>, line: &str) -> Option<Candidate> {
        let fields: Vec<&str> = line.split('\t').collect();
        let get = |name: &str| -> Option<&str> {
            columns
                .get(name)
                .and_then(|&i| fields.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };
        let optional = |name: &str| get(name).map(String::from);

        Some(Candidate {
            source_db: get("source_database")?.to_string(),
            provider: get("annotation_provider")?.to_string(),
            release_date: get("release_date").and_then(parse_date),
            last_modified_date: get("last_modified_date").and_then(parse_date),
            md5_checksum: get("md5_checksum")?.to_lowercase(),
            access_url: get("access_url")?.to_string(),
            taxon_id: get("taxon_id")?.parse().ok()?,
            organism_name: get("organism_name")?.to_string(),
            pipeline_name: optional("pipeline_name"),
            pipeline_version: optional("pipeline_version"),
            pipeline_method: optional("pipeline_method"),
            assembly_accession: get("assembly_accession")?.to_string(),
            assembly_name: get("assembly_name")?.to_string(),
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEADER: &str = "source_database\tannotation_provider\trelease_date\tlast_modified_date\tmd5_checksum\taccess_url\ttaxon_id\torganism_name\tpipeline_name\tpipeline_version\tpipeline_method\tassembly_accession\tassembly_name";

    fn row(md5: &str, url: &str) -> String {
        format!(
            "ensembl\tensembl\t2024-05-01\t2024-04-20\t{md5}\t{url}\t9606\tHomo sapiens\tgenebuild\t1.0\tfull\tGCA_000001405.15\tGRCh38"
        )
    }

    async fn collect(urls: Vec<String>) -> Vec<Candidate> {
        let client = crate::fetch::build_client(10).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { stream_catalogs(&client, &urls, tx).await });
        let mut out = Vec::new();
        while let Some(candidate) = rx.recv().await {
            out.push(candidate);
        }
        handle.await.unwrap().unwrap();
        out
    }

    #[tokio::test]
    async fn test_streams_rows() {
        let server = MockServer::start().await;
        let body = format!("{HEADER}\n{}\n{}\n", row("aaa", "https://x/1"), row("bbb", "https://x/2"));
        Mock::given(method("GET"))
            .and(path("/catalog.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let candidates = collect(vec![format!("{}/catalog.tsv", server.uri())]).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].md5_checksum, "aaa");
        assert_eq!(candidates[0].taxon_id, 9606);
        assert_eq!(
            candidates[0].release_date,
            Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        assert_eq!(candidates[1].access_url, "https://x/2");
    }

    #[tokio::test]
    async fn test_failing_catalog_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.tsv"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let body = format!("{HEADER}\n{}\n", row("ccc", "https://x/3"));
        Mock::given(method("GET"))
            .and(path("/good.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let candidates = collect(vec![
            format!("{}/broken.tsv", server.uri()),
            format!("{}/good.tsv", server.uri()),
        ])
        .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].md5_checksum, "ccc");
    }

    #[tokio::test]
    async fn test_malformed_rows_skipped() {
        let server = MockServer::start().await;
        let body = format!("{HEADER}\nnot\tenough\tcolumns\n{}\n", row("ddd", "https://x/4"));
        Mock::given(method("GET"))
            .and(path("/catalog.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let candidates = collect(vec![format!("{}/catalog.tsv", server.uri())]).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].md5_checksum, "ddd");
    }

    #[tokio::test]
    async fn test_unknown_columns_ignored_and_header_required() {
        let server = MockServer::start().await;
        // missing md5_checksum column
        Mock::given(method("GET"))
            .and(path("/bad-header.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a\tb\tc\nrow\trow\trow\n"))
            .mount(&server)
            .await;

        let candidates = collect(vec![format!("{}/bad-header.tsv", server.uri())]).await;
        assert!(candidates.is_empty());
    }
}
