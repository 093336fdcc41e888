//! Mapping between an MSP credential bundle and flat secret entries.
//!
//! A bundle is a directory tree one level deep:
//!
//! ```text
//! IssuerRevocationPublicKey      (optional)
//! signcerts/<file>
//! keystore/<file>
//! cacerts/<file>
//! ```
//!
//! Each file becomes one [`FlatSecretEntry`] whose path is `category/filename`,
//! or the bare name for the singleton. Content travels base64-encoded because
//! the secret store only holds text.

use crate::errors::MapperError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use tracing::debug;

type Result<T> = std::result::Result<T, MapperError>;

/// Name of the optional singleton artifact at the bundle root
pub const ISSUER_REVOCATION_PUBLIC_KEY: &str = "IssuerRevocationPublicKey";

/// Fixed bundle folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Signcerts,
    Keystore,
    Cacerts,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Signcerts, Category::Keystore, Category::Cacerts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Signcerts => "signcerts",
            Category::Keystore => "keystore",
            Category::Cacerts => "cacerts",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "signcerts" => Some(Category::Signcerts),
            "keystore" => Some(Category::Keystore),
            "cacerts" => Some(Category::Cacerts),
            _ => None,
        }
    }
}

/// Location of one artifact inside a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPath {
    File(Category, String),
    IssuerRevocationPublicKey,
}

impl EntryPath {
    /// Relative secret path of this artifact
    pub fn to_path(&self) -> String {
        match self {
            EntryPath::File(category, name) => format!("{}/{}", category.as_str(), name),
            EntryPath::IssuerRevocationPublicKey => ISSUER_REVOCATION_PUBLIC_KEY.to_string(),
        }
    }

    /// Parse a relative secret path
    ///
    /// Returns `Ok(None)` for directory markers.
    pub fn parse(path: &str) -> Result<Option<Self>> {
        if path.ends_with('/') {
            return Ok(None);
        }
        if path == ISSUER_REVOCATION_PUBLIC_KEY {
            return Ok(Some(EntryPath::IssuerRevocationPublicKey));
        }

        let (segment, name) = path
            .split_once('/')
            .ok_or_else(|| MapperError::MalformedEntry(format!("not in a category: {}", path)))?;
        let category = Category::from_segment(segment)
            .ok_or_else(|| MapperError::MalformedEntry(format!("unknown category: {}", path)))?;
        validate_file_name(name)?;

        Ok(Some(EntryPath::File(category, name.to_string())))
    }
}

/// One flattened artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatSecretEntry {
    pub path: String,
    pub content: Vec<u8>,
}

/// MSP credential bundle as produced by enrollment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub signcerts: BTreeMap<String, Vec<u8>>,
    pub keystore: BTreeMap<String, Vec<u8>>,
    pub cacerts: BTreeMap<String, Vec<u8>>,
    pub issuer_revocation_public_key: Option<Vec<u8>>,
}

impl CredentialBundle {
    pub fn files(&self, category: Category) -> &BTreeMap<String, Vec<u8>> {
        match category {
            Category::Signcerts => &self.signcerts,
            Category::Keystore => &self.keystore,
            Category::Cacerts => &self.cacerts,
        }
    }

    pub fn files_mut(&mut self, category: Category) -> &mut BTreeMap<String, Vec<u8>> {
        match category {
            Category::Signcerts => &mut self.signcerts,
            Category::Keystore => &mut self.keystore,
            Category::Cacerts => &mut self.cacerts,
        }
    }

    fn insert(&mut self, path: EntryPath, content: Vec<u8>) {
        match path {
            EntryPath::File(category, name) => {
                self.files_mut(category).insert(name, content);
            }
            EntryPath::IssuerRevocationPublicKey => {
                self.issuer_revocation_public_key = Some(content);
            }
        }
    }

    /// Fail with `CategoryMissing` on the first empty category
    pub fn ensure_complete(&self) -> Result<()> {
        self.ensure_categories(&Category::ALL)
    }

    /// Fail with `CategoryMissing` on the first of `required` that is empty
    pub fn ensure_categories(&self, required: &[Category]) -> Result<()> {
        for &category in required {
            if self.files(category).is_empty() {
                return Err(MapperError::CategoryMissing(category.as_str()));
            }
        }
        Ok(())
    }

    /// Read a bundle from an MSP directory
    ///
    /// Only regular files directly inside each category folder are taken;
    /// nested folders are ignored.
    pub fn from_msp_dir(dir: &Path) -> Result<Self> {
        let mut bundle = CredentialBundle::default();

        let singleton = dir.join(ISSUER_REVOCATION_PUBLIC_KEY);
        if singleton.is_file() {
            bundle.issuer_revocation_public_key = Some(std::fs::read(singleton)?);
        }

        for category in Category::ALL {
            let folder = dir.join(category.as_str());
            if !folder.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&folder)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name().into_string().map_err(|name| {
                    MapperError::MalformedEntry(format!("non UTF-8 file name {:?}", name))
                })?;
                validate_file_name(&name)?;
                bundle
                    .files_mut(category)
                    .insert(name, std::fs::read(entry.path())?);
            }
        }

        bundle.ensure_complete()?;
        Ok(bundle)
    }
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(MapperError::MalformedEntry(format!(
            "invalid file name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Flatten a bundle into entries ordered by path
pub fn flatten(bundle: &CredentialBundle) -> Vec<FlatSecretEntry> {
    let mut entries: Vec<FlatSecretEntry> = Category::ALL
        .iter()
        .flat_map(|category| {
            bundle.files(*category).iter().map(|(name, content)| FlatSecretEntry {
                path: EntryPath::File(*category, name.clone()).to_path(),
                content: content.clone(),
            })
        })
        .collect();

    if let Some(content) = &bundle.issuer_revocation_public_key {
        entries.push(FlatSecretEntry {
            path: EntryPath::IssuerRevocationPublicKey.to_path(),
            content: content.clone(),
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

/// Encode artifact bytes for the secret store
pub fn encode_content(content: &[u8]) -> String {
    BASE64.encode(content)
}

/// Decode artifact bytes read from the secret store
pub fn decode_content(path: &str, encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| MapperError::MalformedEntry(format!("{}: {}", path, e)))
}

/// Rebuild a bundle from a listing of relative paths
///
/// `fetch` returns the encoded content stored at a listed path. Directory
/// markers in `listing` are skipped. Each category in `required` must yield
/// at least one file; the others may come back empty.
pub async fn unflatten<F, Fut, E>(
    listing: &[String],
    required: &[Category],
    mut fetch: F,
) -> std::result::Result<CredentialBundle, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = std::result::Result<Option<String>, E>>,
    E: From<MapperError>,
{
    let mut bundle = CredentialBundle::default();

    for path in listing {
        let Some(entry) = EntryPath::parse(path)? else {
            debug!("Skipping directory marker {}", path);
            continue;
        };
        let encoded = fetch(path.clone()).await?.ok_or_else(|| {
            MapperError::MalformedEntry(format!("listed entry has no content: {}", path))
        })?;
        bundle.insert(entry, decode_content(path, &encoded)?);
    }

    bundle.ensure_categories(required)?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bundle() -> CredentialBundle {
        let mut bundle = CredentialBundle::default();
        bundle.signcerts.insert("cert.pem".into(), b"CERT".to_vec());
        bundle.keystore.insert("key.pem".into(), b"KEY".to_vec());
        bundle.cacerts.insert("ca.pem".into(), b"CA".to_vec());
        bundle
    }

    fn encoded_map(entries: &[FlatSecretEntry]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|e| (e.path.clone(), encode_content(&e.content)))
            .collect()
    }

    async fn rebuild(
        listing: &[String],
        store: &BTreeMap<String, String>,
    ) -> std::result::Result<CredentialBundle, MapperError> {
        rebuild_requiring(listing, &Category::ALL, store).await
    }

    async fn rebuild_requiring(
        listing: &[String],
        required: &[Category],
        store: &BTreeMap<String, String>,
    ) -> std::result::Result<CredentialBundle, MapperError> {
        unflatten(listing, required, |path| {
            let content = store.get(&path).cloned();
            async move { Ok::<_, MapperError>(content) }
        })
        .await
    }

    #[test]
    fn test_category_vocabulary() {
        for category in Category::ALL {
            assert_eq!(Category::from_segment(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_segment("admincerts"), None);
    }

    #[test]
    fn test_flatten_paths() {
        let mut bundle = bundle();
        bundle.issuer_revocation_public_key = Some(b"REV".to_vec());

        let paths: Vec<String> = flatten(&bundle).into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "IssuerRevocationPublicKey",
                "cacerts/ca.pem",
                "keystore/key.pem",
                "signcerts/cert.pem",
            ]
        );
    }

    #[test]
    fn test_entry_path_parse() {
        assert_eq!(EntryPath::parse("keystore/").unwrap(), None);
        assert_eq!(
            EntryPath::parse("signcerts/cert.pem").unwrap(),
            Some(EntryPath::File(Category::Signcerts, "cert.pem".into()))
        );
        assert!(EntryPath::parse("cert.pem").is_err());
        assert!(EntryPath::parse("admincerts/cert.pem").is_err());
        assert!(EntryPath::parse("signcerts/nested/cert.pem").is_err());
    }

    #[tokio::test]
    async fn test_unflatten_skips_directory_markers() {
        let mut bundle = CredentialBundle::default();
        bundle.signcerts.insert("cert.pem".into(), b"CERT".to_vec());
        bundle.keystore.insert("key.pem".into(), b"KEY".to_vec());

        let entries = flatten(&bundle);
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["keystore/key.pem", "signcerts/cert.pem"]);

        let store = encoded_map(&entries);
        let listing: Vec<String> = vec![
            "signcerts/cert.pem".into(),
            "keystore/".into(),
            "keystore/key.pem".into(),
        ];
        let rebuilt = rebuild_requiring(&listing, &[], &store).await.unwrap();
        assert_eq!(rebuilt, bundle);

        let rebuilt = rebuild_requiring(
            &listing,
            &[Category::Signcerts, Category::Keystore],
            &store,
        )
        .await
        .unwrap();
        assert_eq!(rebuilt, bundle);
    }

    #[tokio::test]
    async fn test_unflatten_only_checks_required_categories() {
        let mut store = BTreeMap::new();
        store.insert("signcerts/cert.pem".to_string(), encode_content(b"CERT"));
        let listing = vec!["signcerts/cert.pem".to_string()];

        assert!(matches!(
            rebuild_requiring(&listing, &[Category::Cacerts], &store).await,
            Err(MapperError::CategoryMissing("cacerts"))
        ));
        let rebuilt = rebuild_requiring(&listing, &[Category::Signcerts], &store)
            .await
            .unwrap();
        assert_eq!(rebuilt.signcerts.len(), 1);
        assert!(rebuilt.keystore.is_empty());
    }

    #[tokio::test]
    async fn test_unflatten_missing_category() {
        let store = encoded_map(&flatten(&bundle()));
        let listing: Vec<String> = vec!["signcerts/cert.pem".into(), "cacerts/ca.pem".into()];

        assert!(matches!(
            rebuild(&listing, &store).await,
            Err(MapperError::CategoryMissing("keystore"))
        ));
    }

    #[tokio::test]
    async fn test_unflatten_malformed_content() {
        let mut store = encoded_map(&flatten(&bundle()));
        store.insert("keystore/key.pem".into(), "not base64!".into());
        let listing: Vec<String> = store.keys().cloned().collect();

        assert!(matches!(
            rebuild(&listing, &store).await,
            Err(MapperError::MalformedEntry(_))
        ));

        // Listed but gone by the time it is fetched.
        let listing = vec!["signcerts/other.pem".to_string()];
        assert!(matches!(
            rebuild(&listing, &store).await,
            Err(MapperError::MalformedEntry(_))
        ));
    }

    #[test]
    fn test_from_msp_dir() {
        let dir = tempfile::tempdir().unwrap();
        for (folder, file, content) in [
            ("signcerts", "cert.pem", "CERT"),
            ("keystore", "abc_sk", "KEY"),
            ("cacerts", "ca.pem", "CA"),
        ] {
            std::fs::create_dir_all(dir.path().join(folder)).unwrap();
            std::fs::write(dir.path().join(folder).join(file), content).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("keystore/nested")).unwrap();
        std::fs::write(dir.path().join("IssuerRevocationPublicKey"), "REV").unwrap();
        std::fs::write(dir.path().join("fabric-ca-client-config.yaml"), "x").unwrap();

        let bundle = CredentialBundle::from_msp_dir(dir.path()).unwrap();
        assert_eq!(bundle.keystore.len(), 1);
        assert_eq!(bundle.keystore["abc_sk"], b"KEY");
        assert_eq!(bundle.issuer_revocation_public_key.as_deref(), Some(&b"REV"[..]));
    }

    #[test]
    fn test_from_msp_dir_requires_categories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("signcerts")).unwrap();
        std::fs::write(dir.path().join("signcerts/cert.pem"), "CERT").unwrap();

        assert!(matches!(
            CredentialBundle::from_msp_dir(dir.path()),
            Err(MapperError::CategoryMissing(_))
        ));
    }

    fn file_map() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
        prop::collection::btree_map("[a-zA-Z0-9_.-]{1,16}", prop::collection::vec(any::<u8>(), 0..64), 1..4)
            .prop_filter("dot names", |m| m.keys().all(|k| k != "." && k != ".."))
    }

    proptest! {
        #[test]
        fn prop_unflatten_inverts_flatten(
            signcerts in file_map(),
            keystore in file_map(),
            cacerts in file_map(),
            revocation in prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
        ) {
            let bundle = CredentialBundle {
                signcerts,
                keystore,
                cacerts,
                issuer_revocation_public_key: revocation,
            };

            let entries = flatten(&bundle);
            let store = encoded_map(&entries);
            let listing: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let rebuilt = runtime.block_on(rebuild(&listing, &store)).unwrap();
            prop_assert_eq!(rebuilt, bundle);
        }
    }
}
