//! Schema document loading.
//!
//! The IEA Task 43 schema ships with the crate; callers may swap in another
//! revision from a file, a string or an HTTP URL.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Schema downloads give up after this long.
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw text of the bundled IEA Task 43 WRA data model schema.
pub const BUNDLED_SCHEMA: &str = include_str!("../schemas/iea43_wra_data_model.schema.json");

/// Parse the bundled IEA Task 43 schema.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` only if the bundled artifact is corrupt.
pub fn bundled_schema() -> Result<Value, LoadError> {
    load_schema_str(BUNDLED_SCHEMA)
}

/// Read and parse a schema file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(&content)
}

/// Parse schema text.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Download a schema revision, e.g. straight from the Task 43 repository.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the body
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;
    let response = response.error_for_status().map_err(network)?;

    response.json().map_err(network)
}

/// True for `http://` and `https://` sources.
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load from `source`, treating HTTP(S) sources as URLs and anything else as a path.
///
/// Without the `remote` feature a URL source reports `FileNotFound`.
pub fn load_schema_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_schema(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn bundled_schema_parses() {
        let schema = bundled_schema().unwrap();
        assert_eq!(schema["type"], "object");
        assert!(schema["definitions"]["measurement_location"].is_object());
    }

    #[test]
    fn schema_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(&dir, "wra.json", r#"{ "required": ["author", "version"] }"#);
        let schema = load_schema(&path).unwrap();
        assert_eq!(schema["required"][1], "version");
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_schema(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn file_with_broken_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(&dir, "broken.json", "{ \"type\": ");
        let err = load_schema(&path).unwrap_err();
        assert!(matches!(err, LoadError::InvalidJson { .. }));
        assert!(!err.is_io());
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://raw.githubusercontent.com/IEA-Task-43/schema.json"));
        assert!(is_url("http://localhost:8080/wra.json"));
        assert!(!is_url("schemas/iea43_wra_data_model.schema.json"));
        assert!(!is_url("ftp://example.org/wra.json"));
    }

    #[test]
    fn auto_picks_file_for_plain_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(&dir, "wra.json", BUNDLED_SCHEMA);
        let schema = load_schema_auto(path.to_str().unwrap()).unwrap();
        assert_eq!(schema, bundled_schema().unwrap());
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn fetches_schema_over_http() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/iea43.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(BUNDLED_SCHEMA)
                .create();

            let schema = load_schema_auto(&format!("{}/iea43.json", server.url())).unwrap();
            assert_eq!(schema["required"][0], "author");
            mock.assert();
        }

        #[test]
        fn http_error_status_is_a_network_error() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/gone.json").with_status(410).create();

            let err = load_schema_url(&format!("{}/gone.json", server.url())).unwrap_err();
            assert!(matches!(err, LoadError::NetworkError { .. }));
            assert!(err.is_io());
        }
    }
}
