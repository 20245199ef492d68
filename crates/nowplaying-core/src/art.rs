//! Album art resolution.
//!
//! Players report art as `file://` URIs, `http(s)://` URLs or bare paths.
//! Palette extraction needs a local file, so remote art is downloaded once
//! into the art cache under the SHA-256 of its URL. Downloads block, so the
//! resolver only describes them; a [`DownloadRunner`] decides where they run.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Timeout for art downloads, in seconds.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Cached downloads kept after each new download.
pub const MAX_CACHED_ART: usize = 64;

/// Suffix of a download that has not finished writing.
const PARTIAL_SUFFIX: &str = ".part";

/// Result of looking up an art location.
#[derive(Debug)]
pub enum ArtLookup {
    /// A local file (or the reason there is none).
    Ready(Result<PathBuf>),
    /// Remote art that still has to be fetched.
    Download(ArtDownload),
}

/// Turns a reported art location into a readable local file.
pub trait ArtResolver {
    fn resolve(&self, location: &str) -> ArtLookup;
}

/// Runs art downloads and reports the result on the calling thread's loop.
pub trait DownloadRunner {
    fn run(&self, download: ArtDownload, done: Box<dyn FnOnce(Result<PathBuf>)>);
}

/// Runs downloads synchronously on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRunner;

impl DownloadRunner for InlineRunner {
    fn run(&self, download: ArtDownload, done: Box<dyn FnOnce(Result<PathBuf>)>) {
        done(download.run());
    }
}

/// One pending download into the art cache. `Send`, so it can move to a
/// worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDownload {
    url: String,
    path: PathBuf,
    cache_dir: PathBuf,
}

impl ArtDownload {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where the art will be cached.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch the art and store it in the cache. Blocks for up to the fetch
    /// timeout.
    pub fn run(self) -> Result<PathBuf> {
        debug!("Fetching album art from {}", self.url);
        let response = minreq::get(&self.url)
            .with_timeout(FETCH_TIMEOUT_SECS)
            .send()
            .map_err(|e| Error::ArtFetch {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        if !(200..300).contains(&response.status_code) {
            return Err(Error::ArtFetch {
                url: self.url,
                reason: format!("HTTP {}", response.status_code),
            });
        }

        fs::create_dir_all(&self.cache_dir)?;
        let mut partial = self.path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        fs::write(&partial, response.as_bytes())?;
        fs::rename(&partial, &self.path)?;

        if let Err(e) = prune_art_cache(&self.cache_dir, MAX_CACHED_ART) {
            warn!("Failed to prune art cache {}: {}", self.cache_dir.display(), e);
        }
        Ok(self.path)
    }
}

/// Resolver that decodes file URIs and caches remote art on disk.
#[derive(Debug, Clone)]
pub struct CachingArtResolver {
    cache_dir: PathBuf,
}

impl CachingArtResolver {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where a remote URL is cached.
    pub fn cached_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.cache_dir.join(name)
    }
}

impl ArtResolver for CachingArtResolver {
    fn resolve(&self, location: &str) -> ArtLookup {
        if let Some(rest) = location.strip_prefix("file://") {
            return ArtLookup::Ready(Ok(PathBuf::from(file_uri_path(rest))));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            let path = self.cached_path(location);
            if path.exists() {
                return ArtLookup::Ready(Ok(path));
            }
            return ArtLookup::Download(ArtDownload {
                url: location.to_string(),
                path,
                cache_dir: self.cache_dir.clone(),
            });
        }
        if location.contains("://") {
            return ArtLookup::Ready(Err(Error::ArtFetch {
                url: location.to_string(),
                reason: "unsupported URI scheme".to_string(),
            }));
        }
        ArtLookup::Ready(Ok(PathBuf::from(location)))
    }
}

/// Delete the oldest cached downloads so at most `keep` remain.
///
/// Unfinished downloads are left alone. Returns how many files were removed.
pub fn prune_art_cache(cache_dir: &Path, keep: usize) -> Result<usize> {
    let mut files = Vec::new();
    for entry in fs::read_dir(cache_dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let is_partial = entry.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX);
        if metadata.is_file() && !is_partial {
            files.push((metadata.modified()?, entry.path()));
        }
    }
    if files.len() <= keep {
        return Ok(0);
    }

    files.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in files.into_iter().skip(keep) {
        fs::remove_file(&path)?;
        removed += 1;
    }
    debug!("Pruned {} cached art file(s) from {}", removed, cache_dir.display());
    Ok(removed)
}

/// `file://` URI for a local path, safe to quote inside CSS `url("...")`.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 7);
    uri.push_str("file://");
    for &byte in raw.as_bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'/' | b'-' | b'_' | b'.' | b'~') {
            uri.push(byte as char);
        } else {
            uri.push_str(&format!("%{byte:02X}"));
        }
    }
    uri
}

/// Path component of a `file://` URI (without the scheme), percent-decoded.
fn file_uri_path(rest: &str) -> String {
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    percent_decode(path)
}

/// Decode `%xx` escapes. Malformed escapes are kept verbatim.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, SystemTime};

    fn ready(lookup: ArtLookup) -> PathBuf {
        match lookup {
            ArtLookup::Ready(result) => result.unwrap(),
            ArtLookup::Download(download) => panic!("unexpected download of {}", download.url()),
        }
    }

    /// Answer one HTTP request on a local port and return its URL.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let header = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{addr}/cover")
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("/music/My%20Album/cover.jpg"), "/music/My Album/cover.jpg");
        assert_eq!(percent_decode("%E2%99%AB"), "♫");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn test_file_uri_escapes_css_and_uri_specials() {
        assert_eq!(
            file_uri(Path::new("/music/50% \"off\" #1.png")),
            "file:///music/50%25%20%22off%22%20%231.png"
        );
        assert_eq!(file_uri(Path::new("/tmp/a-b_c.~png")), "file:///tmp/a-b_c.~png");
    }

    #[test]
    fn test_file_uri_roundtrips_through_resolve() {
        let resolver = CachingArtResolver::new("/tmp/art");
        let path = Path::new("/home/me/My Album #2/50%.jpg");
        assert_eq!(ready(resolver.resolve(&file_uri(path))), path);
    }

    #[test]
    fn test_resolve_file_uri() {
        let resolver = CachingArtResolver::new("/tmp/art");
        assert_eq!(
            ready(resolver.resolve("file:///home/me/Cover%20Art.png")),
            PathBuf::from("/home/me/Cover Art.png")
        );
        assert_eq!(
            ready(resolver.resolve("file://localhost/tmp/a.png")),
            PathBuf::from("/tmp/a.png")
        );
    }

    #[test]
    fn test_resolve_plain_path() {
        let resolver = CachingArtResolver::new("/tmp/art");
        assert_eq!(
            ready(resolver.resolve("/opt/art.jpg")),
            PathBuf::from("/opt/art.jpg")
        );
    }

    #[test]
    fn test_resolve_rejects_unknown_scheme() {
        let resolver = CachingArtResolver::new("/tmp/art");
        assert!(matches!(
            resolver.resolve("data://abc"),
            ArtLookup::Ready(Err(Error::ArtFetch { .. }))
        ));
    }

    #[test]
    fn test_remote_art_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CachingArtResolver::new(dir.path());
        let url = "https://example.invalid/cover.jpg";
        let cached = resolver.cached_path(url);
        fs::write(&cached, b"cached").unwrap();

        assert_eq!(ready(resolver.resolve(url)), cached);
    }

    #[test]
    fn test_uncached_remote_art_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CachingArtResolver::new(dir.path());
        let url = "https://example.invalid/cover.jpg";

        match resolver.resolve(url) {
            ArtLookup::Download(download) => {
                assert_eq!(download.url(), url);
                assert_eq!(download.path(), resolver.cached_path(url));
            }
            other => panic!("expected a download, got {other:?}"),
        }
    }

    #[test]
    fn test_download_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CachingArtResolver::new(dir.path().join("art"));
        let url = serve_once("200 OK", b"\x89PNG fake art");

        let ArtLookup::Download(download) = resolver.resolve(&url) else {
            panic!("expected a download");
        };
        let path = download.run().unwrap();

        assert_eq!(path, resolver.cached_path(&url));
        assert_eq!(fs::read(&path).unwrap(), b"\x89PNG fake art");
        assert_eq!(ready(resolver.resolve(&url)), path);
    }

    #[test]
    fn test_download_http_error_leaves_no_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CachingArtResolver::new(dir.path().join("art"));
        let url = serve_once("404 Not Found", b"missing");

        let ArtLookup::Download(download) = resolver.resolve(&url) else {
            panic!("expected a download");
        };
        match download.run() {
            Err(Error::ArtFetch { reason, .. }) => assert_eq!(reason, "HTTP 404"),
            other => panic!("expected a fetch error, got {other:?}"),
        }
        assert!(!resolver.cached_path(&url).exists());
    }

    #[test]
    fn test_inline_runner_reports_result() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CachingArtResolver::new(dir.path());
        let url = serve_once("200 OK", b"art");
        let ArtLookup::Download(download) = resolver.resolve(&url) else {
            panic!("expected a download");
        };

        let result = std::rc::Rc::new(std::cell::RefCell::new(None));
        let slot = result.clone();
        InlineRunner.run(download, Box::new(move |r: Result<PathBuf>| *slot.borrow_mut() = Some(r)));

        let path = result.borrow_mut().take().unwrap().unwrap();
        assert_eq!(path, resolver.cached_path(&url));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for i in 0..5u64 {
            let path = dir.path().join(format!("art{i}"));
            fs::write(&path, b"x").unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i * 60)).unwrap();
        }
        fs::write(dir.path().join("art9.part"), b"x").unwrap();

        assert_eq!(prune_art_cache(dir.path(), 2).unwrap(), 3);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["art3", "art4", "art9.part"]);
        assert_eq!(prune_art_cache(dir.path(), 2).unwrap(), 0);
    }

    #[test]
    fn test_cached_paths_differ_per_url() {
        let resolver = CachingArtResolver::new("/tmp/art");
        assert_ne!(
            resolver.cached_path("https://a.example/1.jpg"),
            resolver.cached_path("https://a.example/2.jpg")
        );
    }
}
