//! ENA taxonomy sources: browser XML and portal JSON

use super::{LineageEntry, LineageSource};
use crate::fetch::fetch_text;
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;

/// ENA browser XML service: `GET {base}/xml/{taxid}`.
pub struct EnaBrowserSource {
    base_url: String,
}

impl EnaBrowserSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LineageSource for EnaBrowserSource {
    fn name(&self) -> &'static str {
        "ena-browser"
    }

    async fn lineage(
        &self,
        client: &reqwest::Client,
        taxid: u32,
    ) -> Result<Vec<LineageEntry>> {
        let url = format!("{}/xml/{}", self.base_url, taxid);
        let body = fetch_text(client, &url).await?;
        parse_taxon_xml(&body, taxid)
    }
}

/// The `<lineage>` children are ordered nearest-ancestor first; the stored
/// chain is root -> leaf with the universal root dropped.
fn parse_taxon_xml(xml: &str, taxid: u32) -> Result<Vec<LineageEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut leaf: Option<LineageEntry> = None;
    let mut ancestors: Vec<LineageEntry> = Vec::new();
    let mut in_lineage = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"lineage" => in_lineage = true,
                b"taxon" => {
                    if let Some(entry) = taxon_entry(&e)? {
                        if in_lineage {
                            ancestors.push(entry);
                        } else if leaf.is_none() {
                            leaf = Some(entry);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"lineage" {
                    in_lineage = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("invalid taxonomy XML: {e}"),
            _ => {}
        }
    }

    let leaf = leaf.with_context(|| format!("taxon {taxid} missing from XML"))?;
    anyhow::ensure!(leaf.taxid == taxid, "XML returned unexpected taxon {}", leaf.taxid);

    let mut chain: Vec<LineageEntry> = ancestors
        .into_iter()
        .filter(|e| e.taxid > 1)
        .rev()
        .collect();
    chain.push(leaf);
    Ok(chain)
}

fn taxon_entry(element: &BytesStart<'_>) -> Result<Option<LineageEntry>> {
    let mut taxid: Option<u32> = None;
    let mut name: Option<String> = None;
    let mut rank: Option<String> = None;

    for attr in element.attributes() {
        let attr = attr.context("invalid XML attribute")?;
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.as_ref() {
            b"taxId" => taxid = value.parse().ok(),
            b"scientificName" => name = Some(value),
            b"rank" => rank = Some(value),
            _ => {}
        }
    }

    Ok(taxid.map(|taxid| LineageEntry {
        taxid,
        scientific_name: name.unwrap_or_else(|| format!("taxon {taxid}")),
        rank,
    }))
}

/// ENA portal JSON service:
/// `GET {base}/search?result=taxon&query=tax_eq({taxid})&fields=...&format=json`.
pub struct EnaPortalSource {
    base_url: String,
}

impl EnaPortalSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PortalTaxon {
    tax_id: String,
    scientific_name: Option<String>,
    rank: Option<String>,
    /// Semicolon-separated ancestor taxids, root first
    #[serde(default)]
    tax_lineage: String,
}

#[async_trait]
impl LineageSource for EnaPortalSource {
    fn name(&self) -> &'static str {
        "ena-portal"
    }

    async fn lineage(
        &self,
        client: &reqwest::Client,
        taxid: u32,
    ) -> Result<Vec<LineageEntry>> {
        let url = format!(
            "{}/search?result=taxon&query=tax_eq({})&fields=tax_id,scientific_name,rank,tax_lineage&format=json",
            self.base_url, taxid
        );
        let body = fetch_text(client, &url).await?;
        let rows: Vec<PortalTaxon> =
            serde_json::from_str(&body).context("invalid portal response")?;
        let row = rows
            .into_iter()
            .find(|r| r.tax_id.parse() == Ok(taxid))
            .with_context(|| format!("taxon {taxid} missing from portal response"))?;

        let mut chain: Vec<LineageEntry> = row
            .tax_lineage
            .split(';')
            .filter_map(|part| part.trim().parse::<u32>().ok())
            .filter(|&id| id > 1)
            .map(|id| LineageEntry {
                taxid: id,
                scientific_name: format!("taxon {id}"),
                rank: None,
            })
            .collect();
        chain.push(LineageEntry {
            taxid,
            scientific_name: row
                .scientific_name
                .unwrap_or_else(|| format!("taxon {taxid}")),
            rank: row.rank,
        });
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TAXON_SET>
  <taxon scientificName="Homo sapiens" taxId="9606" rank="species">
    <lineage>
      <taxon scientificName="Homo" taxId="9605" rank="genus"/>
      <taxon scientificName="Eukaryota" taxId="2759" rank="superkingdom"/>
      <taxon scientificName="cellular organisms" taxId="131567"/>
      <taxon scientificName="root" taxId="1"/>
    </lineage>
  </taxon>
</TAXON_SET>"#;

    #[test]
    fn test_parse_taxon_xml() {
        let chain = parse_taxon_xml(XML, 9606).unwrap();
        let ids: Vec<u32> = chain.iter().map(|e| e.taxid).collect();
        // reversed lineage (root dropped) then the leaf
        assert_eq!(ids, vec![131567, 2759, 9605, 9606]);
        assert_eq!(chain.last().unwrap().scientific_name, "Homo sapiens");
        assert_eq!(chain[2].rank.as_deref(), Some("genus"));
    }

    #[test]
    fn test_parse_wrong_taxon_rejected() {
        assert!(parse_taxon_xml(XML, 10090).is_err());
    }

    #[tokio::test]
    async fn test_browser_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xml/9606"))
            .respond_with(ResponseTemplate::new(200).set_body_string(XML))
            .mount(&server)
            .await;

        let source = EnaBrowserSource::new(server.uri());
        let client = build_client(10).unwrap();
        let chain = source.lineage(&client, 9606).await.unwrap();
        assert_eq!(chain.last().unwrap().taxid, 9606);
    }

    #[tokio::test]
    async fn test_portal_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"tax_id":"9606","scientific_name":"Homo sapiens","rank":"species","tax_lineage":"1;131567;2759;9605"}]"#,
            ))
            .mount(&server)
            .await;

        let source = EnaPortalSource::new(server.uri());
        let client = build_client(10).unwrap();
        let chain = source.lineage(&client, 9606).await.unwrap();
        let ids: Vec<u32> = chain.iter().map(|e| e.taxid).collect();
        assert_eq!(ids, vec![131567, 2759, 9605, 9606]);
    }
}
