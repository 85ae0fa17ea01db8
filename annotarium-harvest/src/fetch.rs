//! Shared HTTP client and streaming download helpers

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use futures_util::StreamExt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = concat!("Annotarium/", env!("CARGO_PKG_VERSION"));

/// Write buffer size for streamed downloads.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// Build the pipeline's HTTP client: every call carries a timeout so a hung
/// provider surfaces as a per-item failure, never a stuck run.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")
}

/// Outcome of a streamed download.
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
    /// `Last-Modified` response header parsed to a calendar date
    pub last_modified: Option<NaiveDate>,
}

/// Stream `url` into `dest` through a `.tmp` file, renaming only once the
/// body is fully written.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<Downloaded> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request failed: {url}"))?;

    if !response.status().is_success() {
        bail!("{} returned HTTP {}", url, response.status());
    }

    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    let temp_path = PathBuf::from(format!("{}.tmp", dest.display()));
    let mut file = BufWriter::with_capacity(
        DOWNLOAD_CHUNK_SIZE,
        File::create(&temp_path).with_context(|| format!("cannot create {}", temp_path.display()))?,
    );

    let mut bytes = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("failed to read chunk")?;
        file.write_all(&chunk).context("failed to write chunk")?;
        bytes += chunk.len() as u64;
    }
    file.flush()?;
    drop(file);

    std::fs::rename(&temp_path, dest)
        .with_context(|| format!("cannot move download into {}", dest.display()))?;

    Ok(Downloaded {
        path: dest.to_path_buf(),
        bytes,
        last_modified,
    })
}

/// Fetch a small text body (assembly reports, summaries).
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request failed: {url}"))?;
    if !response.status().is_success() {
        bail!("{} returned HTTP {}", url, response.status());
    }
    response.text().await.context("failed to read body")
}

/// Parse an HTTP `Last-Modified` header to its calendar date.
fn parse_http_date(raw: &str) -> Option<NaiveDate> {
    chrono::DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Move a file across filesystems if a plain rename is not possible.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)
                .with_context(|| format!("cannot copy {} to {}", from.display(), to.display()))?;
            std::fs::remove_file(from)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_http_date() {
        let date = parse_http_date("Wed, 01 May 2024 10:30:00 GMT").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(parse_http_date("not a date").is_none());
    }

    #[tokio::test]
    async fn test_download_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.gff"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"line1\nline2\n".to_vec())
                    .insert_header("last-modified", "Wed, 01 May 2024 10:30:00 GMT"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("file.gff");
        let client = build_client(10).unwrap();
        let downloaded = download_to_file(&client, &format!("{}/file.gff", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(downloaded.bytes, 12);
        assert_eq!(
            downloaded.last_modified,
            Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "line1\nline2\n");
        assert!(!dir.path().join("file.gff.tmp").exists());
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let client = build_client(10).unwrap();
        let result = download_to_file(
            &client,
            &format!("{}/missing", server.uri()),
            &dir.path().join("x"),
        )
        .await;
        assert!(result.is_err());
    }
}
