use reqwest::Url;
use reqwest::blocking::Client;
use std::fs;
use std::io;
use std::path::Path;

use super::error::{IoContext, Result, UpdateError};

/// Download `url` to `dest` over https.
///
/// Anything other than an `https` locator is refused before a connection is
/// made. There are no retries: the first failure ends the attempt.
pub fn fetch(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    ensure_https(url)?;
    stream_to_file(client, url, dest)
}

pub(crate) fn ensure_https(url: &str) -> Result<()> {
    match Url::parse(url.trim()) {
        // `Url` lowercases the scheme, so `HTTPS://` passes too.
        Ok(u) if u.scheme() == "https" && u.host_str().is_some() => Ok(()),
        _ => Err(UpdateError::InsecureUrl(url.to_string())),
    }
}

/// Stream a response body to disk. Read failures are network errors,
/// write failures are filesystem errors.
pub(crate) fn stream_to_file(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let mut resp = client
        .get(url)
        .send()
        .map_err(|e| UpdateError::network(url, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(UpdateError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mut out =
        fs::File::create(dest).fs_context(|| format!("creating {}", dest.display()))?;
    let total = io::copy(&mut resp, &mut out).map_err(|e| {
        if is_body_error(&e) {
            UpdateError::network(url, e)
        } else {
            UpdateError::fs(format!("writing {}", dest.display()), e)
        }
    })?;
    out.sync_all()
        .fs_context(|| format!("flushing {}", dest.display()))?;
    Ok(total)
}

/// The blocking body reader reports transport failures as an `io::Error`
/// wrapping the `reqwest::Error`.
fn is_body_error(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
        || e.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[test]
    fn only_https_locators_are_accepted() {
        assert!(ensure_https("https://github.com/o/r/releases/download/v1/x.tar.gz").is_ok());
        assert!(ensure_https("HTTPS://example.com/x").is_ok());
        for bad in [
            "http://example.com/x",
            "ftp://example.com/x",
            "file:///etc/passwd",
            "example.com/x",
            "",
        ] {
            assert!(
                matches!(ensure_https(bad), Err(UpdateError::InsecureUrl(ref u)) if u == bad),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn fetch_refuses_plain_http_without_connecting() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/asset");
            then.status(200).body("payload");
        });
        let td = tempdir().unwrap();
        let dest = td.path().join("asset");

        let err = fetch(&client(), &server.url("/asset"), &dest).unwrap_err();
        assert!(matches!(err, UpdateError::InsecureUrl(_)));
        m.assert_hits(0);
        assert!(!dest.exists());
    }

    #[test]
    fn body_is_streamed_to_disk() {
        let server = MockServer::start();
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let body = payload.clone();
        server.mock(move |when, then| {
            when.method(GET).path("/archive.tar.gz");
            then.status(200).body(body.clone());
        });
        let td = tempdir().unwrap();
        let dest = td.path().join("archive.tar.gz");

        let n = stream_to_file(&client(), &server.url("/archive.tar.gz"), &dest).unwrap();
        assert_eq!(n, payload.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn non_success_status_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(410);
        });
        let td = tempdir().unwrap();
        let dest = td.path().join("gone");

        match stream_to_file(&client(), &server.url("/gone"), &dest) {
            Err(UpdateError::HttpStatus { status, .. }) => assert_eq!(status, 410),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn body_error_classification() {
        let disk = io::Error::new(io::ErrorKind::StorageFull, "no space left");
        assert!(!is_body_error(&disk));
        assert!(is_body_error(&io::Error::new(io::ErrorKind::TimedOut, "slow")));
    }
}
